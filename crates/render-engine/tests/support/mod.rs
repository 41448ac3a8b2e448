//! Shared helpers for render-engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_render_engine::{CommandRunner, FfmpegCommand};
use image::{ImageBuffer, Rgb};

pub const FAKE_VERSION: &str = "ffmpeg version 6.1-fake";

/// Records every command and writes a small deterministic file to the
/// command's output path instead of encoding.
#[derive(Default)]
pub struct FakeRunner {
    calls: AtomicUsize,
    commands: Mutex<Vec<FfmpegCommand>>,
    fail: bool,
}

impl FakeRunner {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_command(&self) -> Option<FfmpegCommand> {
        self.commands.lock().unwrap().last().cloned()
    }
}

impl CommandRunner for FakeRunner {
    fn run(
        &self,
        command: &FfmpegCommand,
        total_duration_ms: u64,
        on_progress: &mut dyn FnMut(u8),
        _timeout_secs: u64,
    ) -> BeatreelResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.commands.lock().unwrap().push(command.clone());
        if self.fail {
            return Err(BeatreelError::Encoder {
                status: "exit status: 1".to_string(),
                stderr_tail: "fake failure".to_string(),
            });
        }
        let output = command
            .output_path()
            .ok_or_else(|| BeatreelError::render("command has no output"))?;
        std::fs::write(output, format!("fake render {total_duration_ms} ms"))?;
        on_progress(100);
        Ok(())
    }

    fn encoder_version(&self, _program: &str) -> BeatreelResult<String> {
        Ok(FAKE_VERSION.to_string())
    }
}

/// Write a small solid PNG.
pub fn write_png(path: &Path, shade: u8) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    ImageBuffer::from_pixel(16, 9, Rgb([shade, shade / 2, 255 - shade]))
        .save(path)
        .unwrap();
}

/// Value following `flag` in an argument vector, for each occurrence.
pub fn flag_values(argv: &[String], flag: &str) -> Vec<String> {
    argv.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}
