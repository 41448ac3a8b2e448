//! Beat selection and pulse-frame placement for Ken Burns clips.

use beatreel_edit_model::{BeatGrid, BeatSyncMode};

/// Beat-sync inputs for one clip.
#[derive(Debug, Clone, Copy)]
pub struct BeatSync<'a> {
    pub mode: BeatSyncMode,
    pub grid: Option<&'a BeatGrid>,
    /// Where the clip starts, in the beat grid's time base.
    pub clip_start_ms: u64,
}

impl<'a> BeatSync<'a> {
    pub fn off() -> Self {
        Self {
            mode: BeatSyncMode::Off,
            grid: None,
            clip_start_ms: 0,
        }
    }

    pub fn new(mode: BeatSyncMode, grid: Option<&'a BeatGrid>, clip_start_ms: u64) -> Self {
        Self {
            mode,
            grid,
            clip_start_ms,
        }
    }

    /// Frames (relative to the clip start) where a pulse begins.
    pub fn pulse_frames(&self, duration_ms: u64, fps: u32) -> Vec<u64> {
        let Some(grid) = self.grid else {
            return Vec::new();
        };
        pulse_frames(
            &select_beats(grid, self.mode),
            self.clip_start_ms,
            duration_ms,
            fps,
        )
    }

    /// Cache-key field: mode label plus the selected pulse frames.
    pub fn key_label(&self, duration_ms: u64, fps: u32) -> String {
        if self.mode == BeatSyncMode::Off {
            return self.mode.label();
        }
        let frames = self
            .pulse_frames(duration_ms, fps)
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}:{frames}", self.mode.label())
    }
}

/// Candidate beat timestamps (seconds) for a mode.
///
/// `downbeat` uses explicit downbeats, falling back to bar starts;
/// `every_n_beats` takes every Nth entry of the full beat list.
pub fn select_beats(grid: &BeatGrid, mode: BeatSyncMode) -> Vec<f64> {
    match mode {
        BeatSyncMode::Off => Vec::new(),
        BeatSyncMode::Downbeat => grid.bar_starts(),
        BeatSyncMode::EveryNBeats { n } => grid
            .beats
            .iter()
            .step_by(n.max(1) as usize)
            .copied()
            .collect(),
    }
}

/// Frame numbers for beats inside `[clip_start, clip_start + duration)`.
pub fn pulse_frames(beats_secs: &[f64], clip_start_ms: u64, duration_ms: u64, fps: u32) -> Vec<u64> {
    let start = clip_start_ms as f64 / 1000.0;
    let end = (clip_start_ms + duration_ms) as f64 / 1000.0;

    let mut frames: Vec<u64> = beats_secs
        .iter()
        .filter(|&&t| t >= start && t < end)
        .map(|&t| ((t - start) * fps as f64).round() as u64)
        .collect();
    frames.dedup();
    frames
}

/// Pulse decay length in frames (at least one).
pub fn decay_frames(decay_ms: u64, fps: u32) -> u64 {
    ((decay_ms as f64 * fps as f64 / 1000.0).round() as u64).max(1)
}
