//! Back-to-back segment layout with transition overlap.
//!
//! Each non-cut transition pulls the incoming segment's start backward by
//! `min(requested, incoming_duration / 2, previous_duration)`. The incoming
//! segment keeps its resolved duration, so total length only ever shrinks
//! by the overlaps.

use beatreel_edit_model::{MediaKind, Segment, SegmentEffect, TransitionSpec};

/// A segment with resolved timing but no timeline position yet.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDraft {
    pub asset_id: String,
    pub media_type: MediaKind,
    pub duration_ms: u64,
    pub source_in_ms: Option<u64>,
    pub source_out_ms: Option<u64>,
    pub effect: Option<SegmentEffect>,
    /// Requested transition from the previous segment. Ignored on the first.
    pub transition: TransitionSpec,
}

/// Effective overlap between the previous segment and `current_ms`.
///
/// The half-duration cap reads against the incoming segment (`current_ms`),
/// not the outgoing one: `min(requested, current_ms / 2)`. The result is
/// further capped at the whole previous segment (`previous_ms`), so a short
/// outgoing segment is never overlapped past its own start. Together the
/// caps keep `timeline_out_ms` non-decreasing and every `timeline_in_ms` at
/// or after its predecessor's. Cuts always overlap by zero.
pub fn effective_overlap_ms(transition: &TransitionSpec, previous_ms: u64, current_ms: u64) -> u64 {
    if transition.kind.is_cut() {
        return 0;
    }
    transition
        .duration_ms
        .min(current_ms / 2)
        .min(previous_ms)
}

/// Lay drafts out on the output timeline.
pub fn lay_out(drafts: &[SegmentDraft]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::with_capacity(drafts.len());

    for (index, draft) in drafts.iter().enumerate() {
        let mut transition_in = None;
        let timeline_in_ms = match segments.last_mut() {
            None => 0,
            Some(prev) => {
                let overlap =
                    effective_overlap_ms(&draft.transition, prev.render_duration_ms, draft.duration_ms);
                if overlap > 0 {
                    let effective = TransitionSpec {
                        kind: draft.transition.kind,
                        duration_ms: overlap,
                    };
                    prev.transition_out = Some(effective);
                    transition_in = Some(effective);
                }
                prev.timeline_out_ms - overlap
            }
        };

        segments.push(Segment {
            segment_index: index,
            asset_id: draft.asset_id.clone(),
            media_type: draft.media_type,
            timeline_in_ms,
            timeline_out_ms: timeline_in_ms + draft.duration_ms,
            render_duration_ms: draft.duration_ms,
            source_in_ms: draft.source_in_ms,
            source_out_ms: draft.source_out_ms,
            effect: draft.effect.clone(),
            transition_in,
            transition_out: None,
        });
    }

    segments
}

/// Total length a planner expects for `durations` joined by transitions of
/// `transition_ms`: `Σ − (N−1) × transition_ms`.
///
/// Agrees with [`lay_out`] only while no segment is shorter than twice the
/// transition; shorter segments get a smaller clamped overlap there.
pub fn expected_total_duration_ms(durations: &[u64], transition_ms: u64) -> u64 {
    let sum: u64 = durations.iter().sum();
    let joins = durations.len().saturating_sub(1) as u64;
    sum.saturating_sub(joins.saturating_mul(transition_ms))
}
