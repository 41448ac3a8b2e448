//! Beat grid produced by the external beat analyzer.
//!
//! Timestamps are seconds from the start of the audio file. A grid is
//! immutable once loaded; consumers only read it.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{read_json, ModelError};

/// A musical bar: its start time and how many beats it spans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub start: f64,
    #[serde(default = "default_beats_per_bar")]
    pub beats: u32,
}

fn default_beats_per_bar() -> u32 {
    4
}

/// Beat grid document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    /// Analyzed tempo in beats per minute.
    pub bpm: f64,

    /// Every beat, ascending.
    pub beats: Vec<f64>,

    /// Bar-start beats, ascending. May be empty.
    #[serde(default)]
    pub downbeats: Vec<f64>,

    /// Optional bar groupings.
    #[serde(default)]
    pub bars: Vec<Bar>,
}

impl BeatGrid {
    /// Load and validate a grid from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let grid: BeatGrid = read_json(path)?;
        grid.validate()?;
        Ok(grid)
    }

    /// Constant-tempo grid covering `duration_ms`, with bars of
    /// `beats_per_bar` beats. Used when no analyzer result is available.
    pub fn constant_tempo(bpm: f64, duration_ms: u64, beats_per_bar: u32) -> Self {
        let beats_per_bar = beats_per_bar.max(1);
        let beat_secs = 60.0 / bpm;
        let duration_secs = duration_ms as f64 / 1000.0;

        let mut beats = Vec::new();
        let mut i = 0u64;
        loop {
            let t = round6(i as f64 * beat_secs);
            if t >= duration_secs {
                break;
            }
            beats.push(t);
            i += 1;
        }

        let downbeats: Vec<f64> = beats
            .iter()
            .step_by(beats_per_bar as usize)
            .copied()
            .collect();
        let bars = downbeats
            .iter()
            .map(|&start| Bar {
                start,
                beats: beats_per_bar,
            })
            .collect();

        Self {
            bpm,
            beats,
            downbeats,
            bars,
        }
    }

    /// Check tempo and timestamp sanity.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(ModelError::invalid(format!(
                "beat grid bpm must be positive, got {}",
                self.bpm
            )));
        }
        for (label, list) in [("beats", &self.beats), ("downbeats", &self.downbeats)] {
            if list.iter().any(|t| !t.is_finite() || *t < 0.0) {
                return Err(ModelError::invalid(format!(
                    "beat grid {label} contains a negative or non-finite timestamp"
                )));
            }
            if list.windows(2).any(|w| w[1] < w[0]) {
                return Err(ModelError::invalid(format!(
                    "beat grid {label} must be non-decreasing"
                )));
            }
        }
        Ok(())
    }

    /// Duration of one beat in milliseconds.
    pub fn beat_ms(&self) -> f64 {
        60_000.0 / self.bpm
    }

    /// Bar-start timestamps: explicit downbeats, else bar starts.
    pub fn bar_starts(&self) -> Vec<f64> {
        if !self.downbeats.is_empty() {
            return self.downbeats.clone();
        }
        self.bars.iter().map(|bar| bar.start).collect()
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_tempo_grid() {
        let grid = BeatGrid::constant_tempo(120.0, 4000, 4);
        assert_eq!(grid.beats, vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5]);
        assert_eq!(grid.downbeats, vec![0.0, 2.0]);
        assert_eq!(grid.bars.len(), 2);
        assert!((grid.beat_ms() - 500.0).abs() < 1e-9);
        grid.validate().unwrap();
    }

    #[test]
    fn test_bar_starts_fall_back_to_bars() {
        let grid = BeatGrid {
            bpm: 100.0,
            beats: vec![0.0, 0.6, 1.2, 1.8, 2.4],
            downbeats: vec![],
            bars: vec![
                Bar {
                    start: 0.0,
                    beats: 4,
                },
                Bar {
                    start: 2.4,
                    beats: 4,
                },
            ],
        };
        assert_eq!(grid.bar_starts(), vec![0.0, 2.4]);
    }

    #[test]
    fn test_validate_rejects_bad_tempo_and_order() {
        let mut grid = BeatGrid::constant_tempo(90.0, 2000, 4);
        grid.bpm = 0.0;
        assert!(grid.validate().is_err());

        let mut grid = BeatGrid::constant_tempo(90.0, 2000, 4);
        grid.beats.swap(0, 1);
        assert!(grid.validate().is_err());
    }

    #[test]
    fn test_parses_analyzer_json() {
        let json = r#"{"bpm":128.0,"beats":[0.0,0.46875],"downbeats":[0.0],"bars":[{"start":0.0,"beats":4}]}"#;
        let grid: BeatGrid = serde_json::from_str(json).unwrap();
        assert_eq!(grid.beats.len(), 2);
        assert_eq!(grid.bars[0].beats, 4);

        let minimal: BeatGrid = serde_json::from_str(r#"{"bpm":90,"beats":[]}"#).unwrap();
        assert!(minimal.downbeats.is_empty());
        assert!(minimal.bars.is_empty());
    }
}
