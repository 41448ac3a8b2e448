//! Per-segment duration and source-trim resolution.
//!
//! Priority: explicit milliseconds, then beats at the effective BPM, then
//! the media's natural length (video) or a fixed hold (image).

use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_edit_model::{
    AssetEntry, AudioSettings, BeatGrid, DurationSpec, MediaKind, TimelineEntry,
};

/// Hold time for an image with "natural" duration and no BPM.
pub const DEFAULT_IMAGE_DURATION_MS: u64 = 4000;

/// Timing resolved for one authored segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTiming {
    pub duration_ms: u64,
    pub source_in_ms: Option<u64>,
    pub source_out_ms: Option<u64>,
}

/// Effective BPM: explicit override, else the analyzed grid's tempo.
pub fn effective_bpm(
    audio: Option<&AudioSettings>,
    beat_grid: Option<&BeatGrid>,
) -> BeatreelResult<Option<f64>> {
    if let Some(bpm) = audio.and_then(|a| a.bpm_override) {
        if !bpm.is_finite() || bpm <= 0.0 {
            return Err(BeatreelError::validation(format!(
                "bpm_override must be positive, got {bpm}"
            )));
        }
        return Ok(Some(bpm));
    }
    Ok(beat_grid.map(|grid| grid.bpm).filter(|bpm| bpm.is_finite() && *bpm > 0.0))
}

/// Convert a beat count to whole milliseconds (rounded).
pub fn beats_to_ms(beats: f64, bpm: f64) -> u64 {
    (beats * 60_000.0 / bpm).round() as u64
}

/// Resolve render duration and source trim for segment `index`.
pub fn resolve_timing(
    index: usize,
    entry: &TimelineEntry,
    asset: &AssetEntry,
    bpm: Option<f64>,
    beats_per_cut: f64,
    default_image_ms: u64,
) -> BeatreelResult<ResolvedTiming> {
    check_kind(index, entry, asset)?;

    let (source_in, authored_out) = match entry.media_type {
        MediaKind::Video => check_video_trim(index, entry, asset)?,
        _ => {
            if entry.source_in_ms.is_some() || entry.source_out_ms.is_some() {
                return Err(BeatreelError::validation(format!(
                    "segment {index}: source trim is only valid on video segments"
                )));
            }
            (0, None)
        }
    };

    let duration_ms = match entry.duration {
        DurationSpec::Ms(ms) => ms,
        DurationSpec::Beats(beats) => {
            if !beats.is_finite() || beats <= 0.0 {
                return Err(BeatreelError::validation(format!(
                    "segment {index}: beat count must be positive, got {beats}"
                )));
            }
            let bpm = bpm.ok_or_else(|| {
                BeatreelError::validation(format!(
                    "segment {index}: duration in beats needs a BPM (set bpm_override or supply a beat grid)"
                ))
            })?;
            beats_to_ms(beats, bpm)
        }
        DurationSpec::Natural => match entry.media_type {
            MediaKind::Video => match authored_out {
                Some(out) => out - source_in,
                None => {
                    let total = asset.duration_ms.ok_or_else(|| {
                        BeatreelError::validation(format!(
                            "segment {index}: natural duration needs the video's length for asset '{}'",
                            asset.asset_id
                        ))
                    })?;
                    total.saturating_sub(source_in)
                }
            },
            _ => match bpm {
                Some(bpm) => beats_to_ms(beats_per_cut, bpm),
                None => default_image_ms,
            },
        },
    };

    if duration_ms == 0 {
        return Err(BeatreelError::validation(format!(
            "segment {index}: resolved duration is zero"
        )));
    }

    Ok(match entry.media_type {
        MediaKind::Video => ResolvedTiming {
            duration_ms,
            source_in_ms: Some(source_in),
            source_out_ms: Some(check_video_window(
                index,
                source_in,
                authored_out,
                duration_ms,
                asset,
            )?),
        },
        _ => ResolvedTiming {
            duration_ms,
            source_in_ms: None,
            source_out_ms: None,
        },
    })
}

fn check_kind(index: usize, entry: &TimelineEntry, asset: &AssetEntry) -> BeatreelResult<()> {
    if !entry.media_type.is_visual() {
        return Err(BeatreelError::validation(format!(
            "segment {index}: media_type must be image or video"
        )));
    }
    if asset.kind != entry.media_type {
        return Err(BeatreelError::validation(format!(
            "segment {index}: asset '{}' is {:?} but the segment declares {:?}",
            asset.asset_id, asset.kind, entry.media_type
        )));
    }
    Ok(())
}

/// Returns `(source_in, authored source_out)`.
fn check_video_trim(
    index: usize,
    entry: &TimelineEntry,
    asset: &AssetEntry,
) -> BeatreelResult<(u64, Option<u64>)> {
    let source_in = entry.source_in_ms.unwrap_or(0);

    if let Some(source_out) = entry.source_out_ms {
        if source_out <= source_in {
            return Err(BeatreelError::validation(format!(
                "segment {index}: source_out_ms ({source_out}) must exceed source_in_ms ({source_in})"
            )));
        }
    }

    if let Some(total) = asset.duration_ms {
        if source_in >= total {
            return Err(BeatreelError::validation(format!(
                "segment {index}: source_in_ms ({source_in}) is beyond the video length ({total})"
            )));
        }
        if let Some(source_out) = entry.source_out_ms {
            if source_out > total {
                return Err(BeatreelError::validation(format!(
                    "segment {index}: source_out_ms ({source_out}) is beyond the video length ({total})"
                )));
            }
        }
    }

    Ok((source_in, entry.source_out_ms))
}

/// Out point actually played for a video segment.
///
/// An authored `source_out_ms` is an upper bound: a longer render duration
/// is rejected, a shorter one ends playback early. Without an authored out
/// point, the media length (when known) bounds the window instead.
fn check_video_window(
    index: usize,
    source_in: u64,
    authored_out: Option<u64>,
    duration_ms: u64,
    asset: &AssetEntry,
) -> BeatreelResult<u64> {
    let out = source_in + duration_ms;
    if let Some(authored) = authored_out {
        if out > authored {
            return Err(BeatreelError::validation(format!(
                "segment {index}: duration {duration_ms} ms exceeds the trim window \
                 {source_in}..{authored} ms"
            )));
        }
    }
    if let Some(total) = asset.duration_ms {
        if out > total {
            return Err(BeatreelError::validation(format!(
                "segment {index}: playing {duration_ms} ms from {source_in} ms runs past the \
                 video length ({total} ms) of asset '{}'",
                asset.asset_id
            )));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use beatreel_edit_model::AssetRole;

    fn asset(kind: MediaKind, duration_ms: Option<u64>) -> AssetEntry {
        AssetEntry {
            asset_id: "a".to_string(),
            kind,
            uri: None,
            role: AssetRole::Background,
            duration_ms,
            width: None,
            height: None,
        }
    }

    fn entry(kind: MediaKind, duration: DurationSpec) -> TimelineEntry {
        TimelineEntry {
            asset_id: "a".to_string(),
            media_type: kind,
            duration,
            source_in_ms: None,
            source_out_ms: None,
            transition_in: None,
            effect: None,
        }
    }

    #[test]
    fn test_explicit_ms_wins() {
        let t = resolve_timing(
            0,
            &entry(MediaKind::Image, DurationSpec::Ms(2500)),
            &asset(MediaKind::Image, None),
            Some(120.0),
            4.0,
            DEFAULT_IMAGE_DURATION_MS,
        )
        .unwrap();
        assert_eq!(t.duration_ms, 2500);
        assert_eq!(t.source_in_ms, None);
    }

    #[test]
    fn test_beats_need_bpm() {
        let e = entry(MediaKind::Image, DurationSpec::Beats(2.0));
        let a = asset(MediaKind::Image, None);
        let err = resolve_timing(0, &e, &a, None, 4.0, 4000).unwrap_err();
        assert!(matches!(err, BeatreelError::Validation { .. }));

        let t = resolve_timing(0, &e, &a, Some(128.0), 4.0, 4000).unwrap();
        // 2 * 60000 / 128 = 937.5 -> 938
        assert_eq!(t.duration_ms, 938);
    }

    #[test]
    fn test_natural_image_uses_default_or_beats_per_cut() {
        let e = entry(MediaKind::Image, DurationSpec::Natural);
        let a = asset(MediaKind::Image, None);
        assert_eq!(
            resolve_timing(0, &e, &a, None, 4.0, 4000)
                .unwrap()
                .duration_ms,
            4000
        );
        assert_eq!(
            resolve_timing(0, &e, &a, Some(120.0), 4.0, 4000)
                .unwrap()
                .duration_ms,
            2000
        );
    }

    #[test]
    fn test_natural_video_respects_trim() {
        let mut e = entry(MediaKind::Video, DurationSpec::Natural);
        e.source_in_ms = Some(1000);
        e.source_out_ms = Some(3500);
        let t = resolve_timing(0, &e, &asset(MediaKind::Video, Some(10_000)), None, 4.0, 4000)
            .unwrap();
        assert_eq!(t.duration_ms, 2500);
        assert_eq!(t.source_in_ms, Some(1000));
        assert_eq!(t.source_out_ms, Some(3500));

        let untrimmed = entry(MediaKind::Video, DurationSpec::Natural);
        let t = resolve_timing(
            0,
            &untrimmed,
            &asset(MediaKind::Video, Some(7000)),
            None,
            4.0,
            4000,
        )
        .unwrap();
        assert_eq!(t.duration_ms, 7000);
    }

    #[test]
    fn test_trim_out_of_range_rejected() {
        let mut e = entry(MediaKind::Video, DurationSpec::Natural);
        e.source_in_ms = Some(1000);
        e.source_out_ms = Some(12_000);
        let err = resolve_timing(0, &e, &asset(MediaKind::Video, Some(10_000)), None, 4.0, 4000);
        assert!(err.is_err());

        e.source_out_ms = Some(500);
        let err = resolve_timing(0, &e, &asset(MediaKind::Video, Some(10_000)), None, 4.0, 4000);
        assert!(err.is_err());
    }

    #[test]
    fn test_explicit_duration_past_video_end_rejected() {
        let video = asset(MediaKind::Video, Some(10_000));
        let mut e = entry(MediaKind::Video, DurationSpec::Ms(5000));
        e.source_in_ms = Some(6000);
        let err = resolve_timing(0, &e, &video, None, 4.0, 4000).unwrap_err();
        assert!(matches!(err, BeatreelError::Validation { .. }));

        e.duration = DurationSpec::Beats(8.0);
        let err = resolve_timing(0, &e, &video, Some(120.0), 4.0, 4000).unwrap_err();
        assert!(matches!(err, BeatreelError::Validation { .. }));

        e.duration = DurationSpec::Ms(4000);
        let t = resolve_timing(0, &e, &video, None, 4.0, 4000).unwrap();
        assert_eq!(t.source_out_ms, Some(10_000));
    }

    #[test]
    fn test_explicit_duration_bounded_by_authored_out() {
        let video = asset(MediaKind::Video, Some(10_000));
        let mut e = entry(MediaKind::Video, DurationSpec::Ms(8000));
        e.source_in_ms = Some(6000);
        e.source_out_ms = Some(9000);
        let err = resolve_timing(0, &e, &video, None, 4.0, 4000).unwrap_err();
        assert!(matches!(err, BeatreelError::Validation { .. }));

        e.duration = DurationSpec::Ms(2000);
        let t = resolve_timing(0, &e, &video, None, 4.0, 4000).unwrap();
        assert_eq!(t.duration_ms, 2000);
        assert_eq!(t.source_in_ms, Some(6000));
        assert_eq!(t.source_out_ms, Some(8000));
    }

    #[test]
    fn test_trim_on_image_rejected() {
        let mut e = entry(MediaKind::Image, DurationSpec::Ms(1000));
        e.source_in_ms = Some(10);
        assert!(resolve_timing(0, &e, &asset(MediaKind::Image, None), None, 4.0, 4000).is_err());
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let e = entry(MediaKind::Video, DurationSpec::Ms(1000));
        assert!(resolve_timing(0, &e, &asset(MediaKind::Image, None), None, 4.0, 4000).is_err());
    }

    #[test]
    fn test_override_beats_analyzed_bpm() {
        let grid = BeatGrid::constant_tempo(120.0, 1000, 4);
        let audio = AudioSettings {
            asset_id: "song".to_string(),
            bpm_override: Some(90.0),
            start_offset_ms: 0,
            trim_end_ms: 0,
            end_at_audio_end: false,
            repeat: Default::default(),
        };
        assert_eq!(effective_bpm(Some(&audio), Some(&grid)).unwrap(), Some(90.0));
        assert_eq!(effective_bpm(None, Some(&grid)).unwrap(), Some(120.0));
        assert_eq!(effective_bpm(None, None).unwrap(), None);

        let bad = AudioSettings {
            bpm_override: Some(-1.0),
            ..audio
        };
        assert!(effective_bpm(Some(&bad), None).is_err());
    }
}
