//! Edit description to EDL.
//!
//! # Algorithm
//!
//! 1. **Resolve** each authored entry against the asset manifest: duration,
//!    source trim, effective effect and requested transition.
//! 2. **Lay out** segments back-to-back, pulling each one back by its
//!    clamped transition overlap.
//! 3. **Fit** to the soundtrack when `end_at_audio_end` is set (trim, or
//!    extend per repeat mode).
//! 4. **Hash** the timing-relevant content and validate the result.
//!
//! No I/O happens here: assets, beat grid and edit all arrive as data.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use beatreel_common::clock::now_rfc3339;
use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_edit_model::{
    AssetEntry, AssetManifest, AudioSettings, BeatGrid, BeatSyncMode, EditDefaults,
    EditDescription, Edl, EdlAudio, MediaKind, SegmentEffect, TimelineEntry, EDL_VERSION,
};

use crate::audio_fit::fit_to_audio;
use crate::duration::{effective_bpm, resolve_timing, DEFAULT_IMAGE_DURATION_MS};
use crate::hash::edl_hash;
use crate::transitions::{lay_out, SegmentDraft};

/// Compiler tuning.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    /// Hold time for "natural" images when no BPM is known.
    pub default_image_ms: u64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            default_image_ms: DEFAULT_IMAGE_DURATION_MS,
        }
    }
}

/// Compiles edit descriptions into EDLs. Stateless between calls.
#[derive(Debug, Clone, Default)]
pub struct TimelineCompiler {
    config: CompilerConfig,
}

impl TimelineCompiler {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Compile `edit` into a validated EDL.
    ///
    /// Fails with a validation error when an asset id is unknown, a beat
    /// duration has no BPM to resolve against, a source trim is out of range,
    /// or an effect is malformed.
    pub fn compile(
        &self,
        edit: &EditDescription,
        assets: &AssetManifest,
        beat_grid: Option<&BeatGrid>,
    ) -> BeatreelResult<Edl> {
        if edit.timeline.is_empty() {
            return Err(BeatreelError::validation("timeline has no segments"));
        }
        if let Some(grid) = beat_grid {
            grid.validate()
                .map_err(|e| BeatreelError::validation(e.to_string()))?;
        }

        let index = assets.index();
        let bpm = effective_bpm(edit.audio.as_ref(), beat_grid)?;
        debug!(?bpm, segments = edit.timeline.len(), "Compiling timeline");

        let drafts = edit
            .timeline
            .iter()
            .enumerate()
            .map(|(i, entry)| self.draft(i, entry, &index, &edit.defaults, bpm))
            .collect::<BeatreelResult<Vec<_>>>()?;

        let mut segments = lay_out(&drafts);
        let mut warnings = Vec::new();

        let audio = match &edit.audio {
            Some(settings) => {
                let track = lookup(&index, &settings.asset_id, "audio")?;
                if track.kind != MediaKind::Audio {
                    return Err(BeatreelError::validation(format!(
                        "audio asset '{}' is not an audio file",
                        settings.asset_id
                    )));
                }
                let window = audio_window(settings, track)?;

                if settings.end_at_audio_end {
                    let audio_ms = window.duration_ms.ok_or_else(|| {
                        BeatreelError::validation(format!(
                            "end_at_audio_end needs the duration of audio asset '{}'",
                            settings.asset_id
                        ))
                    })?;
                    let outcome = fit_to_audio(segments, audio_ms, settings.repeat.mode);
                    segments = outcome.segments;
                    if let Some(w) = outcome.warning {
                        warn!(audio_ms, "{w}");
                        warnings.push(w);
                    }
                }
                Some(window)
            }
            None => None,
        };

        let repeat_mode = edit
            .audio
            .as_ref()
            .map(|a| a.repeat.mode)
            .unwrap_or_default();
        let transition_type = edit.defaults.transition.kind;
        let hash = edl_hash(
            &segments,
            audio.as_ref().map(|a| a.asset_id.as_str()),
            transition_type,
            repeat_mode,
        )?;

        let total_duration_ms = segments.last().map(|s| s.timeline_out_ms).unwrap_or(0);
        let edl = Edl {
            version: EDL_VERSION.to_string(),
            edl_hash: hash,
            generated_at: now_rfc3339(),
            total_duration_ms,
            segment_count: segments.len(),
            output: edit.output,
            effective_bpm: bpm,
            transition_type,
            repeat_mode,
            audio,
            segments,
            warnings,
        };
        edl.validate()
            .map_err(|e| BeatreelError::validation(e.to_string()))?;

        info!(
            segments = edl.segment_count,
            total_ms = edl.total_duration_ms,
            edl_hash = %edl.edl_hash,
            "Timeline compiled"
        );
        Ok(edl)
    }

    fn draft(
        &self,
        index: usize,
        entry: &TimelineEntry,
        assets: &HashMap<&str, &AssetEntry>,
        defaults: &EditDefaults,
        bpm: Option<f64>,
    ) -> BeatreelResult<SegmentDraft> {
        let asset = lookup(assets, &entry.asset_id, "segment")?;
        let timing = resolve_timing(
            index,
            entry,
            asset,
            bpm,
            defaults.beats_per_cut,
            self.config.default_image_ms,
        )?;
        let effect = resolve_effect(index, entry, defaults)?;

        Ok(SegmentDraft {
            asset_id: entry.asset_id.clone(),
            media_type: entry.media_type,
            duration_ms: timing.duration_ms,
            source_in_ms: timing.source_in_ms,
            source_out_ms: timing.source_out_ms,
            effect,
            transition: entry.transition_in.unwrap_or(defaults.transition),
        })
    }
}

fn lookup<'a>(
    assets: &HashMap<&str, &'a AssetEntry>,
    asset_id: &str,
    what: &str,
) -> BeatreelResult<&'a AssetEntry> {
    assets.get(asset_id).copied().ok_or_else(|| {
        BeatreelError::validation(format!("{what} references unknown asset '{asset_id}'"))
    })
}

/// Usable soundtrack window after head offset and tail trim.
fn audio_window(settings: &AudioSettings, track: &AssetEntry) -> BeatreelResult<EdlAudio> {
    let duration_ms = match track.duration_ms {
        Some(track_ms) => {
            let usable = track_ms
                .saturating_sub(settings.start_offset_ms)
                .saturating_sub(settings.trim_end_ms);
            if usable == 0 {
                return Err(BeatreelError::validation(format!(
                    "audio '{}' has no playable length after offsets ({} ms track, {} ms start, {} ms trim)",
                    settings.asset_id, track_ms, settings.start_offset_ms, settings.trim_end_ms
                )));
            }
            Some(usable)
        }
        None => None,
    };
    Ok(EdlAudio {
        asset_id: settings.asset_id.clone(),
        start_offset_ms: settings.start_offset_ms,
        duration_ms,
    })
}

/// Effect for one entry: its own, else the edit default.
///
/// Effects only apply to still images. A default effect is silently skipped
/// for video; an explicit one is an error.
fn resolve_effect(
    index: usize,
    entry: &TimelineEntry,
    defaults: &EditDefaults,
) -> BeatreelResult<Option<SegmentEffect>> {
    let (effect, explicit) = match &entry.effect {
        Some(effect) => (Some(effect), true),
        None => (defaults.effect.as_ref(), false),
    };

    match effect {
        None | Some(SegmentEffect::None) => Ok(None),
        Some(SegmentEffect::KenBurns {
            preset,
            strength,
            beat_sync,
        }) => {
            if entry.media_type != MediaKind::Image {
                if explicit {
                    return Err(BeatreelError::validation(format!(
                        "segment {index}: ken_burns applies to images only"
                    )));
                }
                return Ok(None);
            }
            if preset.trim().is_empty() {
                return Err(BeatreelError::validation(format!(
                    "segment {index}: ken_burns preset name is empty"
                )));
            }
            if !strength.is_finite() || !(0.0..=1.0).contains(strength) {
                return Err(BeatreelError::validation(format!(
                    "segment {index}: motion strength must be within [0, 1], got {strength}"
                )));
            }
            if let BeatSyncMode::EveryNBeats { n: 0 } = beat_sync {
                return Err(BeatreelError::validation(format!(
                    "segment {index}: every_n_beats needs n >= 1"
                )));
            }
            Ok(Some(SegmentEffect::KenBurns {
                preset: preset.clone(),
                strength: *strength,
                beat_sync: *beat_sync,
            }))
        }
    }
}
