//! Encoder argument-vector builder.
//!
//! Commands are always an explicit program plus `Vec<String>` arguments;
//! nothing goes through a shell.

use std::fmt;
use std::path::Path;
use std::process::Command;

use beatreel_common::clock::format_secs;
use beatreel_common::config::EncoderConfig;

/// One encoder invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FfmpegCommand {
    program: String,
    args: Vec<String>,
    output: Option<String>,
}

impl FfmpegCommand {
    /// An `ffmpeg` command with quiet logging and a machine-readable
    /// progress stream on stdout.
    pub fn new(program: impl Into<String>) -> Self {
        let mut cmd = Self::bare(program);
        cmd.push_all([
            "-hide_banner",
            "-nostdin",
            "-nostats",
            "-loglevel",
            "error",
            "-y",
            "-progress",
            "pipe:1",
        ]);
        cmd
    }

    /// A command with no preset arguments.
    pub fn bare(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            output: None,
        }
    }

    pub fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_all(args);
        self
    }

    /// A still image looped at `fps` for exactly `duration_ms`.
    pub fn looped_image(&mut self, path: &Path, fps: u32, duration_ms: u64) -> &mut Self {
        self.args([
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            fps.to_string(),
            "-t".to_string(),
            format_secs(duration_ms),
            "-i".to_string(),
            path_arg(path),
        ])
    }

    /// A media file read from `start_ms` for `duration_ms`.
    pub fn trimmed_input(&mut self, path: &Path, start_ms: u64, duration_ms: u64) -> &mut Self {
        self.args([
            "-ss".to_string(),
            format_secs(start_ms),
            "-t".to_string(),
            format_secs(duration_ms),
            "-i".to_string(),
            path_arg(path),
        ])
    }

    pub fn input(&mut self, path: &Path) -> &mut Self {
        self.args(["-i".to_string(), path_arg(path)])
    }

    pub fn video_filter(&mut self, filter: impl Into<String>) -> &mut Self {
        self.arg("-vf").arg(filter)
    }

    pub fn filter_complex(&mut self, graph: impl Into<String>) -> &mut Self {
        self.arg("-filter_complex").arg(graph)
    }

    /// Map a filter-graph label such as `vout` (brackets added).
    pub fn map_label(&mut self, label: &str) -> &mut Self {
        self.arg("-map").arg(format!("[{label}]"))
    }

    /// Exact number of video frames to emit.
    pub fn frames(&mut self, count: u64) -> &mut Self {
        self.arg("-frames:v").arg(count.to_string())
    }

    /// Cap the output length.
    pub fn duration(&mut self, duration_ms: u64) -> &mut Self {
        self.arg("-t").arg(format_secs(duration_ms))
    }

    /// x264 with fixed rate control, preset and pixel format.
    pub fn deterministic_video(&mut self, encoder: &EncoderConfig) -> &mut Self {
        self.args([
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            encoder.preset.clone(),
            "-crf".to_string(),
            encoder.crf.to_string(),
            "-pix_fmt".to_string(),
            encoder.pixel_format.clone(),
            "-flags:v".to_string(),
            "+bitexact".to_string(),
        ])
    }

    /// AAC at a fixed bitrate.
    pub fn deterministic_audio(&mut self, encoder: &EncoderConfig) -> &mut Self {
        self.args([
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", encoder.audio_bitrate_kbps.max(64)),
            "-flags:a".to_string(),
            "+bitexact".to_string(),
        ])
    }

    pub fn no_audio(&mut self) -> &mut Self {
        self.arg("-an")
    }

    /// Strip metadata and fix the MP4 atom layout.
    pub fn deterministic_container(&mut self) -> &mut Self {
        self.args([
            "-map_metadata",
            "-1",
            "-fflags",
            "+bitexact",
            "-movflags",
            "+faststart",
        ])
    }

    /// Final output path; always the last argument.
    pub fn output(&mut self, path: &Path) -> &mut Self {
        self.output = Some(path_arg(path));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Full argument vector, output last.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        if let Some(output) = &self.output {
            argv.push(output.clone());
        }
        argv
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output.as_deref().map(Path::new)
    }

    /// A `std::process::Command` with program and arguments set.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.argv());
        cmd
    }

    fn push_all<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }
}

impl fmt::Display for FfmpegCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.argv() {
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'') {
                write!(f, " '{}'", arg.replace('\'', "'\\''"))?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_flags_present() {
        let cmd = FfmpegCommand::new("ffmpeg");
        let argv = cmd.argv();
        let pos = argv.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(argv[pos + 1], "pipe:1");
        assert!(argv.contains(&"-nostdin".to_string()));
    }

    #[test]
    fn test_output_is_last() {
        let mut cmd = FfmpegCommand::new("ffmpeg");
        cmd.output(Path::new("/tmp/out.mp4"))
            .looped_image(Path::new("a.png"), 30, 2500)
            .no_audio();
        let argv = cmd.argv();
        assert_eq!(argv.last().map(String::as_str), Some("/tmp/out.mp4"));
        assert_eq!(cmd.output_path(), Some(Path::new("/tmp/out.mp4")));

        let t = argv.iter().position(|a| a == "-t").unwrap();
        assert_eq!(argv[t + 1], "2.500");
    }

    #[test]
    fn test_determinism_flags() {
        let encoder = EncoderConfig::default();
        let mut cmd = FfmpegCommand::new("ffmpeg");
        cmd.deterministic_video(&encoder)
            .deterministic_audio(&encoder)
            .deterministic_container();
        let joined = cmd.argv().join(" ");
        assert!(joined.contains("-c:v libx264 -preset medium -crf 20 -pix_fmt yuv420p"));
        assert!(joined.contains("-flags:v +bitexact"));
        assert!(joined.contains("-flags:a +bitexact"));
        assert!(joined.contains("-map_metadata -1"));
        assert!(joined.contains("-fflags +bitexact"));
        assert!(joined.contains("-movflags +faststart"));
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let mut cmd = FfmpegCommand::bare("ffmpeg");
        cmd.arg("-i").arg("my clip.mp4");
        assert_eq!(cmd.to_string(), "ffmpeg -i 'my clip.mp4'");
    }
}
