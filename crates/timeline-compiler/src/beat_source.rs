//! Beat grid sources with a synthetic fallback.
//!
//! The analyzer itself runs elsewhere; here we only locate its output, or
//! fall back to a constant-tempo grid so beat-synced motion still has
//! something to lock onto.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_edit_model::BeatGrid;

/// Tempo of the synthesized grid when every source fails.
pub const FALLBACK_BPM: f64 = 120.0;

/// Beats per bar of the synthesized grid.
pub const FALLBACK_BEATS_PER_BAR: u32 = 4;

/// Something that can produce a beat grid for an audio file.
pub trait BeatGridSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Produce a grid for `audio_path`.
    fn analyze(&self, audio_path: &Path) -> BeatreelResult<BeatGrid>;
}

/// Reads a pre-computed analyzer result from disk.
///
/// Without an explicit path, looks for `<audio file>.beats.json` next to
/// the audio.
#[derive(Debug, Clone, Default)]
pub struct SidecarGridSource {
    path: Option<PathBuf>,
}

impl SidecarGridSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// The sidecar file consulted for `audio_path`.
    pub fn sidecar_for(&self, audio_path: &Path) -> PathBuf {
        match &self.path {
            Some(path) => path.clone(),
            None => {
                let mut name = audio_path.as_os_str().to_owned();
                name.push(".beats.json");
                PathBuf::from(name)
            }
        }
    }
}

impl BeatGridSource for SidecarGridSource {
    fn name(&self) -> &str {
        "sidecar"
    }

    fn analyze(&self, audio_path: &Path) -> BeatreelResult<BeatGrid> {
        let path = self.sidecar_for(audio_path);
        if !path.exists() {
            return Err(BeatreelError::MissingAsset { path });
        }
        BeatGrid::load(&path).map_err(|e| BeatreelError::validation(e.to_string()))
    }
}

/// A known tempo, e.g. an edit's BPM override.
#[derive(Debug, Clone)]
pub struct FixedTempoSource {
    bpm: f64,
    duration_ms: u64,
    beats_per_bar: u32,
}

impl FixedTempoSource {
    pub fn new(bpm: f64, duration_ms: u64) -> Self {
        Self {
            bpm,
            duration_ms,
            beats_per_bar: FALLBACK_BEATS_PER_BAR,
        }
    }

    pub fn beats_per_bar(mut self, beats_per_bar: u32) -> Self {
        self.beats_per_bar = beats_per_bar;
        self
    }
}

impl BeatGridSource for FixedTempoSource {
    fn name(&self) -> &str {
        "fixed-tempo"
    }

    fn analyze(&self, _audio_path: &Path) -> BeatreelResult<BeatGrid> {
        if !self.bpm.is_finite() || self.bpm <= 0.0 {
            return Err(BeatreelError::validation(format!(
                "fixed tempo must be positive, got {}",
                self.bpm
            )));
        }
        Ok(BeatGrid::constant_tempo(
            self.bpm,
            self.duration_ms,
            self.beats_per_bar,
        ))
    }
}

/// Where a resolved grid came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridOrigin {
    /// Named source that succeeded.
    Source(String),
    /// Synthesized after every source failed.
    Fallback,
}

/// A grid plus its origin.
#[derive(Debug, Clone)]
pub struct ResolvedGrid {
    pub grid: BeatGrid,
    pub origin: GridOrigin,
}

/// Ordered list of sources tried until one succeeds.
pub struct BeatGridChain {
    sources: Vec<Box<dyn BeatGridSource>>,
    fallback_bpm: f64,
}

impl Default for BeatGridChain {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatGridChain {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            fallback_bpm: FALLBACK_BPM,
        }
    }

    /// Append a source; earlier sources win.
    pub fn with_source(mut self, source: Box<dyn BeatGridSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn fallback_bpm(mut self, bpm: f64) -> Self {
        if bpm.is_finite() && bpm > 0.0 {
            self.fallback_bpm = bpm;
        }
        self
    }

    /// Names of the configured sources, in order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// First successful grid, else a constant-tempo grid covering
    /// `duration_ms`.
    pub fn resolve(&self, audio_path: &Path, duration_ms: u64) -> ResolvedGrid {
        for source in &self.sources {
            match source.analyze(audio_path) {
                Ok(grid) => {
                    info!(
                        source = source.name(),
                        bpm = grid.bpm,
                        beats = grid.beats.len(),
                        "Beat grid resolved"
                    );
                    return ResolvedGrid {
                        grid,
                        origin: GridOrigin::Source(source.name().to_string()),
                    };
                }
                Err(e) => {
                    warn!(source = source.name(), error = %e, "Beat grid source failed");
                }
            }
        }

        warn!(
            bpm = self.fallback_bpm,
            audio = %audio_path.display(),
            "No beat grid available; synthesizing constant tempo"
        );
        ResolvedGrid {
            grid: BeatGrid::constant_tempo(self.fallback_bpm, duration_ms, FALLBACK_BEATS_PER_BAR),
            origin: GridOrigin::Fallback,
        }
    }
}
