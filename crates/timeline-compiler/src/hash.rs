//! Content hash of a compiled EDL.
//!
//! Covers what decides the rendered result: per-segment asset, duration and
//! effect, plus the audio asset, default transition type and repeat mode.
//! Timeline positions and the generation timestamp are excluded.

use serde::Serialize;

use beatreel_common::error::BeatreelResult;
use beatreel_common::hashing::{canonical_hash, prefixed};
use beatreel_edit_model::{RepeatMode, Segment, SegmentEffect, TransitionKind};

#[derive(Serialize)]
struct HashedSegment<'a> {
    asset_id: &'a str,
    render_duration_ms: u64,
    effect: Option<&'a SegmentEffect>,
}

#[derive(Serialize)]
struct HashedEdl<'a> {
    segments: Vec<HashedSegment<'a>>,
    audio_asset_id: Option<&'a str>,
    transition_type: TransitionKind,
    repeat_mode: RepeatMode,
}

/// `sha256:<hex>` over the canonical JSON of the hashed fields.
pub fn edl_hash(
    segments: &[Segment],
    audio_asset_id: Option<&str>,
    transition_type: TransitionKind,
    repeat_mode: RepeatMode,
) -> BeatreelResult<String> {
    let doc = HashedEdl {
        segments: segments
            .iter()
            .map(|s| HashedSegment {
                asset_id: &s.asset_id,
                render_duration_ms: s.render_duration_ms,
                effect: s.effect.as_ref(),
            })
            .collect(),
        audio_asset_id,
        transition_type,
        repeat_mode,
    };
    Ok(prefixed(&canonical_hash(&doc)?))
}
