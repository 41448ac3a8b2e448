//! Edit description: the authored (by UI or AI planner) input to the
//! timeline compiler.
//!
//! Loosely-shaped authoring input is parsed into closed enums here, so the
//! compiler never inspects ad hoc keys.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assets::MediaKind;
use crate::error::{read_json, ModelError};

/// Top-level edit description document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditDescription {
    /// Schema version.
    #[serde(default = "default_version")]
    pub version: String,

    /// Owning project identifier.
    #[serde(default)]
    pub project_id: String,

    /// Output resolution and frame rate.
    #[serde(default)]
    pub output: OutputSettings,

    /// Fallbacks for segments that leave fields unset.
    #[serde(default)]
    pub defaults: EditDefaults,

    /// Soundtrack settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioSettings>,

    /// Ordered segments; authored order is render order.
    pub timeline: Vec<TimelineEntry>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl EditDescription {
    /// Load an edit description from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        read_json(path)
    }
}

/// Output resolution and frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: 30,
        }
    }
}

/// Edit-wide defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditDefaults {
    /// Beats per image when a beat grid or BPM override is available.
    pub beats_per_cut: f64,

    /// Transition between segments that do not set their own.
    pub transition: TransitionSpec,

    /// Effect for segments that do not set their own.
    pub effect: Option<SegmentEffect>,
}

impl Default for EditDefaults {
    fn default() -> Self {
        Self {
            beats_per_cut: 4.0,
            transition: TransitionSpec::cut(),
            effect: None,
        }
    }
}

/// One authored segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub asset_id: String,

    pub media_type: MediaKind,

    #[serde(default)]
    pub duration: DurationSpec,

    /// Source trim start (video only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_in_ms: Option<u64>,

    /// Source trim end (video only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_out_ms: Option<u64>,

    /// Transition from the previous segment into this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition_in: Option<TransitionSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<SegmentEffect>,
}

/// How long a segment lasts.
///
/// JSON: `{"ms": 4000}`, `{"beats": 2}`, or `"natural"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationSpec {
    /// Explicit milliseconds.
    Ms(u64),
    /// A number of beats at the effective BPM.
    Beats(f64),
    /// The media's own length (video) or a default hold (image).
    #[default]
    Natural,
}

/// Transition type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    #[default]
    Cut,
    Crossfade,
    Fade,
}

impl TransitionKind {
    pub fn is_cut(self) -> bool {
        self == TransitionKind::Cut
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransitionKind::Cut => "cut",
            TransitionKind::Crossfade => "crossfade",
            TransitionKind::Fade => "fade",
        }
    }
}

/// A transition with its requested (or, on EDL segments, effective) length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionSpec {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    #[serde(default)]
    pub duration_ms: u64,
}

impl TransitionSpec {
    pub fn cut() -> Self {
        Self {
            kind: TransitionKind::Cut,
            duration_ms: 0,
        }
    }

    pub fn crossfade(duration_ms: u64) -> Self {
        Self {
            kind: TransitionKind::Crossfade,
            duration_ms,
        }
    }
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self::cut()
    }
}

/// Visual effect applied to a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SegmentEffect {
    /// Pan/zoom over a still image.
    KenBurns {
        /// Motion preset name.
        preset: String,
        /// Damping in `[0.0, 1.0]`; 0 holds the frame still.
        #[serde(default = "default_strength")]
        strength: f64,
        #[serde(default)]
        beat_sync: BeatSyncMode,
    },
    /// Explicitly no effect (overrides the edit default).
    None,
}

fn default_strength() -> f64 {
    1.0
}

/// Which beats drive zoom pulses in a Ken Burns clip.
///
/// JSON: `{"mode": "off"}`, `{"mode": "downbeat"}`,
/// `{"mode": "every_n_beats", "n": 2}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BeatSyncMode {
    #[default]
    Off,
    Downbeat,
    EveryNBeats {
        n: u32,
    },
}

impl BeatSyncMode {
    /// Stable label used in cache keys and logs.
    pub fn label(self) -> String {
        match self {
            BeatSyncMode::Off => "off".to_string(),
            BeatSyncMode::Downbeat => "downbeat".to_string(),
            BeatSyncMode::EveryNBeats { n } => format!("every_{n}_beats"),
        }
    }
}

/// Soundtrack settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub asset_id: String,

    /// Tempo to use instead of the analyzed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm_override: Option<f64>,

    /// Skip this much of the track's head.
    #[serde(default)]
    pub start_offset_ms: u64,

    /// Ignore this much of the track's tail.
    #[serde(default)]
    pub trim_end_ms: u64,

    /// Fit the timeline to the (trimmed) track length.
    #[serde(default)]
    pub end_at_audio_end: bool,

    #[serde(default)]
    pub repeat: RepeatSettings,
}

/// Repeat behavior when fitting the timeline to the audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RepeatSettings {
    #[serde(default)]
    pub mode: RepeatMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Keep the authored sequence; warn if it ends before the audio.
    #[default]
    Stop,
    /// Loop the whole sequence until the audio ends.
    RepeatAll,
    /// Hold the last segment until the audio ends.
    RepeatLast,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_spec_json_forms() {
        let ms: DurationSpec = serde_json::from_str(r#"{"ms":4000}"#).unwrap();
        let beats: DurationSpec = serde_json::from_str(r#"{"beats":2.5}"#).unwrap();
        let natural: DurationSpec = serde_json::from_str(r#""natural""#).unwrap();
        assert_eq!(ms, DurationSpec::Ms(4000));
        assert_eq!(beats, DurationSpec::Beats(2.5));
        assert_eq!(natural, DurationSpec::Natural);
    }

    #[test]
    fn test_effect_json_forms() {
        let kb: SegmentEffect = serde_json::from_str(
            r#"{"type":"ken_burns","preset":"zoom_in","beat_sync":{"mode":"every_n_beats","n":2}}"#,
        )
        .unwrap();
        assert_eq!(
            kb,
            SegmentEffect::KenBurns {
                preset: "zoom_in".to_string(),
                strength: 1.0,
                beat_sync: BeatSyncMode::EveryNBeats { n: 2 },
            }
        );

        let none: SegmentEffect = serde_json::from_str(r#"{"type":"none"}"#).unwrap();
        assert_eq!(none, SegmentEffect::None);
    }

    #[test]
    fn test_minimal_edit_description_defaults() {
        let json = r#"{
            "timeline": [
                {"asset_id": "img1", "media_type": "image"},
                {"asset_id": "clip1", "media_type": "video", "duration": {"ms": 1500},
                 "transition_in": {"type": "crossfade", "duration_ms": 250}}
            ],
            "audio": {"asset_id": "song", "end_at_audio_end": true, "repeat": {"mode": "repeat_all"}}
        }"#;
        let edit: EditDescription = serde_json::from_str(json).unwrap();
        assert_eq!(edit.version, "1.0");
        assert_eq!(edit.output, OutputSettings::default());
        assert_eq!(edit.defaults.beats_per_cut, 4.0);
        assert!(edit.defaults.transition.kind.is_cut());
        assert_eq!(edit.timeline[0].duration, DurationSpec::Natural);
        assert_eq!(
            edit.timeline[1].transition_in,
            Some(TransitionSpec::crossfade(250))
        );

        let audio = edit.audio.unwrap();
        assert_eq!(audio.repeat.mode, RepeatMode::RepeatAll);
        assert_eq!(audio.start_offset_ms, 0);
    }

    #[test]
    fn test_beat_sync_labels() {
        assert_eq!(BeatSyncMode::Off.label(), "off");
        assert_eq!(BeatSyncMode::Downbeat.label(), "downbeat");
        assert_eq!(BeatSyncMode::EveryNBeats { n: 3 }.label(), "every_3_beats");
    }
}
