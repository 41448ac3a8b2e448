//! Edit Decision List: the fully time-resolved segment sequence.
//!
//! Produced only by the timeline compiler. Positions and durations are
//! integer milliseconds on the output timeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::MediaKind;
use crate::edit::{OutputSettings, RepeatMode, SegmentEffect, TransitionKind, TransitionSpec};
use crate::error::{read_json, write_json, ModelError};

/// Current EDL schema version.
pub const EDL_VERSION: &str = "1.0";

/// EDL document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edl {
    pub version: String,

    /// `sha256:<hex>` over the timing-relevant content.
    pub edl_hash: String,

    /// Compile time (RFC 3339). Not part of the hash.
    pub generated_at: String,

    pub total_duration_ms: u64,

    pub segment_count: usize,

    /// Render size and frame rate carried over from the edit.
    #[serde(default)]
    pub output: OutputSettings,

    /// BPM used for beat-based durations, if any was available.
    pub effective_bpm: Option<f64>,

    /// Edit-wide default transition type.
    pub transition_type: TransitionKind,

    pub repeat_mode: RepeatMode,

    /// Soundtrack window, when the edit has audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<EdlAudio>,

    pub segments: Vec<Segment>,

    /// Non-fatal compile diagnostics.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Resolved soundtrack window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdlAudio {
    pub asset_id: String,
    /// Offset into the track where playback starts.
    pub start_offset_ms: u64,
    /// Usable track length after head and tail trims, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// One resolved segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_index: usize,
    pub asset_id: String,
    pub media_type: MediaKind,
    pub timeline_in_ms: u64,
    pub timeline_out_ms: u64,
    pub render_duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_out_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<SegmentEffect>,
    /// Effective transition from the previous segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_in: Option<TransitionSpec>,
    /// Effective transition into the next segment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_out: Option<TransitionSpec>,
}

impl Segment {
    /// Shorten the segment to end at `timeline_out_ms`, keeping its source
    /// trim consistent.
    pub fn truncate_to(&mut self, timeline_out_ms: u64) {
        let out = timeline_out_ms.clamp(self.timeline_in_ms, self.timeline_out_ms);
        self.timeline_out_ms = out;
        self.render_duration_ms = out - self.timeline_in_ms;
        if let (Some(source_in), Some(_)) = (self.source_in_ms, self.source_out_ms) {
            self.source_out_ms = Some(source_in + self.render_duration_ms);
        }
        self.transition_out = None;
    }
}

impl Edl {
    /// Load an EDL and check its invariants.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let edl: Edl = read_json(path)?;
        edl.validate()?;
        Ok(edl)
    }

    /// Save the EDL as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        write_json(path, self)
    }

    /// Check structural invariants.
    ///
    /// - segment indices run 0..n without gaps
    /// - `timeline_out_ms` is non-decreasing
    /// - each segment's duration equals `out - in`
    /// - `source_out_ms > source_in_ms` when a trim is present
    /// - header counts agree with the segment list
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.segment_count != self.segments.len() {
            return Err(ModelError::invalid(format!(
                "segment_count {} does not match {} segments",
                self.segment_count,
                self.segments.len()
            )));
        }

        let mut prev_out = 0u64;
        for (i, seg) in self.segments.iter().enumerate() {
            if seg.segment_index != i {
                return Err(ModelError::invalid(format!(
                    "segment at position {i} has index {}",
                    seg.segment_index
                )));
            }
            if seg.timeline_out_ms < seg.timeline_in_ms {
                return Err(ModelError::invalid(format!(
                    "segment {i} ends before it starts"
                )));
            }
            if seg.render_duration_ms != seg.timeline_out_ms - seg.timeline_in_ms {
                return Err(ModelError::invalid(format!(
                    "segment {i} render duration disagrees with its bounds"
                )));
            }
            if seg.timeline_out_ms < prev_out {
                return Err(ModelError::invalid(format!(
                    "segment {i} timeline_out_ms decreases"
                )));
            }
            if let (Some(source_in), Some(source_out)) = (seg.source_in_ms, seg.source_out_ms) {
                if source_out <= source_in {
                    return Err(ModelError::invalid(format!(
                        "segment {i} source_out_ms must exceed source_in_ms"
                    )));
                }
            }
            prev_out = seg.timeline_out_ms;
        }

        let last_out = self.segments.last().map(|s| s.timeline_out_ms).unwrap_or(0);
        if self.total_duration_ms != last_out {
            return Err(ModelError::invalid(format!(
                "total_duration_ms {} does not match final segment end {last_out}",
                self.total_duration_ms
            )));
        }
        Ok(())
    }

    /// Sum of all segment render durations (ignores overlaps).
    pub fn summed_render_duration_ms(&self) -> u64 {
        self.segments.iter().map(|s| s.render_duration_ms).sum()
    }
}
