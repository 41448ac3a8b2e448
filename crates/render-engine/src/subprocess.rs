//! Encoder subprocess orchestration.
//!
//! The encoder runs in its own process group and reports progress as
//! `key=value` lines on stdout (`-progress pipe:1`). A wall-clock deadline
//! kills the whole group; a stalled progress stream is only logged.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use beatreel_common::clock::{parse_clock_ms, Deadline, StallWatch};
use beatreel_common::config::EncoderConfig;
use beatreel_common::error::{BeatreelError, BeatreelResult};

use crate::command::FfmpegCommand;
use crate::media_info;

/// Bytes of stderr kept for error reports.
pub const STDERR_TAIL_BYTES: usize = 4096;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Runs encoder commands. The motion engine and the assembler only see
/// this trait.
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion.
    ///
    /// `on_progress` receives percentages in `1..=100`, strictly increasing;
    /// 100 only after the encoder signals the end of its stream.
    fn run(
        &self,
        command: &FfmpegCommand,
        total_duration_ms: u64,
        on_progress: &mut dyn FnMut(u8),
        timeout_secs: u64,
    ) -> BeatreelResult<()>;

    /// Version banner of the encoder binary `program`.
    fn encoder_version(&self, program: &str) -> BeatreelResult<String>;
}

/// Production runner backed by `std::process`.
#[derive(Debug, Clone)]
pub struct SubprocessOrchestrator {
    exit_grace: Duration,
    stall_warn: Duration,
}

impl SubprocessOrchestrator {
    pub fn new(encoder: &EncoderConfig) -> Self {
        Self {
            exit_grace: Duration::from_secs(encoder.exit_grace_secs),
            stall_warn: Duration::from_secs(encoder.stall_warn_secs.max(1)),
        }
    }

    pub fn with_limits(exit_grace: Duration, stall_warn: Duration) -> Self {
        Self {
            exit_grace,
            stall_warn,
        }
    }

    fn spawn(&self, command: &FfmpegCommand) -> BeatreelResult<Child> {
        let mut cmd = command.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BeatreelError::EncoderNotFound {
                    binary: command.program().to_string(),
                }
            } else {
                BeatreelError::render(format!("Failed to start {}: {e}", command.program()))
            }
        })
    }

    fn wait_for_exit(
        &self,
        child: &mut Child,
        deadline: &Deadline,
        timeout_secs: u64,
    ) -> BeatreelResult<ExitStatus> {
        let grace = Deadline::start(self.exit_grace);
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if deadline.expired() {
                kill_process_group(child);
                return Err(BeatreelError::timeout(timeout_secs, "encoding"));
            }
            if grace.expired() {
                kill_process_group(child);
                return Err(BeatreelError::timeout(
                    self.exit_grace.as_secs(),
                    "waiting for exit after progress stream closed",
                ));
            }
            thread::sleep(EXIT_POLL_INTERVAL);
        }
    }
}

impl Default for SubprocessOrchestrator {
    fn default() -> Self {
        Self::new(&EncoderConfig::default())
    }
}

impl CommandRunner for SubprocessOrchestrator {
    fn run(
        &self,
        command: &FfmpegCommand,
        total_duration_ms: u64,
        on_progress: &mut dyn FnMut(u8),
        timeout_secs: u64,
    ) -> BeatreelResult<()> {
        debug!(command = %command, "Running encoder");
        let deadline = Deadline::start(Duration::from_secs(timeout_secs));
        let mut child = self.spawn(command)?;

        info!(
            pid = child.id(),
            program = command.program(),
            total_duration_ms,
            timeout_secs,
            "Encoder process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BeatreelError::render("Failed to capture encoder stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BeatreelError::render("Failed to capture encoder stderr"))?;

        // Drain stderr concurrently so the encoder never blocks on a full pipe.
        let stderr_task = thread::spawn(move || read_tail(stderr, STDERR_TAIL_BYTES));

        let (tx, rx) = mpsc::channel::<String>();
        let stdout_task = thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });

        let mut tracker = ProgressTracker::new(total_duration_ms);
        let mut stall = StallWatch::new(self.stall_warn);

        loop {
            if deadline.expired() {
                kill_process_group(&mut child);
                warn!(timeout_secs, "Encoder exceeded its time budget; process group killed");
                return Err(BeatreelError::timeout(timeout_secs, "encoding"));
            }

            match rx.recv_timeout(deadline.remaining().min(POLL_INTERVAL)) {
                Ok(line) => {
                    if let Some(percent) = tracker.feed(&line) {
                        on_progress(percent);
                    }
                    stall.observe(tracker.current_ms());
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if stall.check() {
                warn!(
                    out_time_ms = stall.last_value(),
                    stall_secs = self.stall_warn.as_secs(),
                    "No encoder progress"
                );
            }
        }

        let status = self.wait_for_exit(&mut child, &deadline, timeout_secs)?;
        let _ = stdout_task.join();
        let stderr_tail = stderr_task
            .join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(BeatreelError::Encoder {
                status: status.to_string(),
                stderr_tail: stderr_tail.trim().to_string(),
            });
        }

        info!(
            elapsed_ms = deadline.elapsed().as_millis() as u64,
            "Encoder finished"
        );
        Ok(())
    }

    fn encoder_version(&self, program: &str) -> BeatreelResult<String> {
        media_info::encoder_version(program)
    }
}

/// SIGKILL the child's whole process group, then reap the child.
fn kill_process_group(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        // SAFETY: killpg only sends a signal; the group was created for this
        // child by `process_group(0)`.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}

/// Read a stream to the end, keeping only its last `limit` bytes.
fn read_tail(mut reader: impl Read, limit: usize) -> String {
    let mut tail: Vec<u8> = Vec::with_capacity(limit * 2);
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > limit * 2 {
                    tail.drain(..tail.len() - limit);
                }
            }
            Err(err) => {
                tail.extend_from_slice(format!("<failed to read stderr: {err}>").as_bytes());
                break;
            }
        }
    }
    let start = tail.len().saturating_sub(limit);
    String::from_utf8_lossy(&tail[start..]).into_owned()
}

/// Turns `-progress` lines into monotonically increasing percentages.
#[derive(Debug)]
pub struct ProgressTracker {
    total_ms: u64,
    block_us: Option<u64>,
    block_ms_field: Option<u64>,
    block_clock: Option<u64>,
    current_ms: u64,
    last_reported: u8,
    ended: bool,
}

impl ProgressTracker {
    pub fn new(total_ms: u64) -> Self {
        Self {
            total_ms,
            block_us: None,
            block_ms_field: None,
            block_clock: None,
            current_ms: 0,
            last_reported: 0,
            ended: false,
        }
    }

    /// Feed one line; returns a percentage to report, if any.
    pub fn feed(&mut self, line: &str) -> Option<u8> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key.trim() {
            "out_time_us" => self.block_us = parse_micros(value),
            // ffmpeg writes microseconds under this key too.
            "out_time_ms" => self.block_ms_field = parse_micros(value),
            "out_time" => self.block_clock = parse_clock_ms(value),
            "progress" => return self.close_block(value == "end"),
            _ => {}
        }
        None
    }

    /// Latest resolved output timestamp.
    pub fn current_ms(&self) -> u64 {
        self.current_ms
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    fn close_block(&mut self, end: bool) -> Option<u8> {
        let resolved = self
            .block_us
            .or(self.block_ms_field)
            .or(self.block_clock);
        if let Some(ms) = resolved {
            self.current_ms = ms;
        }
        self.block_us = None;
        self.block_ms_field = None;
        self.block_clock = None;

        if end {
            self.ended = true;
            return self.report(100);
        }
        if self.total_ms == 0 {
            return None;
        }
        let percent = (self.current_ms.saturating_mul(100) / self.total_ms).min(99) as u8;
        self.report(percent)
    }

    fn report(&mut self, percent: u8) -> Option<u8> {
        if percent > self.last_reported {
            self.last_reported = percent;
            Some(percent)
        } else {
            None
        }
    }
}

/// Microsecond counter to milliseconds; `N/A` and negatives are ignored.
fn parse_micros(value: &str) -> Option<u64> {
    let us: i64 = value.parse().ok()?;
    u64::try_from(us).ok().map(|us| us / 1000)
}
