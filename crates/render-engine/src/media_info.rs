//! Encoder discovery and media duration lookup.

use std::path::Path;
use std::process::{Command, Stdio};

use beatreel_common::error::{BeatreelError, BeatreelResult};

/// Whether `binary` resolves on `PATH` (or is an existing path).
pub fn command_exists(binary: &str) -> bool {
    if binary.contains('/') {
        return Path::new(binary).is_file();
    }
    Command::new("sh")
        .arg("-c")
        .arg("command -v \"$1\" >/dev/null 2>&1")
        .arg("sh")
        .arg(binary)
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// First line of `<program> -version`, e.g. `ffmpeg version 6.1.1 ...`.
pub fn encoder_version(program: &str) -> BeatreelResult<String> {
    let output = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BeatreelError::EncoderNotFound {
                    binary: program.to_string(),
                }
            } else {
                BeatreelError::render(format!("Failed to run {program} -version: {e}"))
            }
        })?;

    if !output.status.success() {
        return Err(BeatreelError::Encoder {
            status: output.status.to_string(),
            stderr_tail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    parse_version_banner(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| BeatreelError::render(format!("{program} -version printed nothing")))
}

fn parse_version_banner(stdout: &str) -> Option<String> {
    let line = stdout.lines().next()?.trim();
    // Drop the copyright tail so the banner stays stable across builds of
    // the same release.
    let banner = line.split(" Copyright").next().unwrap_or(line).trim();
    (!banner.is_empty()).then(|| banner.to_string())
}

/// Container duration in milliseconds via `ffprobe`.
pub fn media_duration_ms(ffprobe: &str, path: &Path) -> Option<u64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let raw = String::from_utf8(output.stdout).ok()?;
    let secs: f64 = raw.lines().next()?.trim().parse().ok()?;
    if !secs.is_finite() || secs <= 0.0 {
        return None;
    }
    Some((secs * 1000.0).round() as u64)
}
