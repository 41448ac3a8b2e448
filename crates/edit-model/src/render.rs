//! Render plan (shot list) and the terminal render manifest.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::edit::BeatSyncMode;
use crate::error::{read_json, write_json, ModelError};

/// Current render manifest schema version.
pub const RENDER_OUTPUT_SCHEMA_VERSION: &str = "1.0";

/// Named output profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderProfile {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self {
            name: "1080p30".to_string(),
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }
}

/// Ken Burns request on a plan shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotMotion {
    pub preset: String,
    #[serde(default = "default_strength")]
    pub strength: f64,
    #[serde(default)]
    pub beat_sync: BeatSyncMode,
}

fn default_strength() -> f64 {
    1.0
}

/// One shot in a render plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub shot_id: String,
    pub duration_ms: u64,
    /// Candidate visual assets; role decides which one is used.
    #[serde(default)]
    pub asset_ids: Vec<String>,
    /// Start offset into a video asset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_in_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<ShotMotion>,
}

/// A spoken line attached to a shot, rendered as a caption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechLine {
    pub shot_id: String,
    pub text: String,
}

/// Render plan document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub request_id: String,
    #[serde(default)]
    pub profile: RenderProfile,
    /// Caller-supplied lock over shot timing; derived when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_lock_hash: Option<String>,
    pub shots: Vec<Shot>,
    #[serde(default)]
    pub speech: Vec<SpeechLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<String>,
}

impl RenderPlan {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        read_json(path)
    }

    /// Sum of shot durations.
    pub fn total_duration_ms(&self) -> u64 {
        self.shots.iter().map(|s| s.duration_ms).sum()
    }
}

/// Content hashes of the delivered artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputHashes {
    pub video_sha256: String,
    pub captions_sha256: String,
}

/// How and with what the artifact was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub render_profile: String,
    pub timing_lock_hash: String,
    pub rendered_at: String,
    pub encoder_version: String,
    pub placeholder_count: usize,
}

/// Hashes of the canonicalized input documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub asset_manifest_hash: String,
    pub render_plan_hash: String,
}

/// Terminal render manifest (`render_output.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    pub schema_version: String,
    pub output_id: String,
    pub request_id: String,
    pub video_uri: String,
    pub captions_uri: String,
    pub hashes: OutputHashes,
    pub provenance: Provenance,
    pub lineage: Lineage,
}

impl RenderOutput {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        read_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        write_json(path, self)
    }

    /// Copy with the only time-dependent field blanked, for reproducibility
    /// comparisons.
    pub fn without_timestamp(&self) -> Self {
        let mut copy = self.clone();
        copy.provenance.rendered_at = String::new();
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_defaults() {
        let json = r#"{"request_id":"req-1","shots":[{"shot_id":"s1","duration_ms":2000}]}"#;
        let plan: RenderPlan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.profile, RenderProfile::default());
        assert!(plan.speech.is_empty());
        assert!(plan.shots[0].asset_ids.is_empty());
        assert_eq!(plan.total_duration_ms(), 2000);
    }

    #[test]
    fn test_without_timestamp_blanks_only_rendered_at() {
        let output = RenderOutput {
            schema_version: RENDER_OUTPUT_SCHEMA_VERSION.to_string(),
            output_id: "out_1".to_string(),
            request_id: "req".to_string(),
            video_uri: "render.mp4".to_string(),
            captions_uri: "captions.srt".to_string(),
            hashes: OutputHashes {
                video_sha256: "v".to_string(),
                captions_sha256: "c".to_string(),
            },
            provenance: Provenance {
                render_profile: "1080p30".to_string(),
                timing_lock_hash: "t".to_string(),
                rendered_at: "2026-01-01T00:00:00Z".to_string(),
                encoder_version: "ffmpeg 6.1".to_string(),
                placeholder_count: 1,
            },
            lineage: Lineage {
                asset_manifest_hash: "a".to_string(),
                render_plan_hash: "p".to_string(),
            },
        };
        let blank = output.without_timestamp();
        assert_eq!(blank.provenance.rendered_at, "");
        assert_eq!(blank.provenance.placeholder_count, 1);
        assert_eq!(blank.output_id, output.output_id);
    }
}
