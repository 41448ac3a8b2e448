//! Fit a laid-out timeline to the soundtrack length.

use beatreel_edit_model::{RepeatMode, Segment};

/// Result of fitting: the new segment list plus an optional diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct FitOutcome {
    pub segments: Vec<Segment>,
    pub warning: Option<String>,
}

/// Make the timeline end exactly at `audio_ms`.
///
/// A timeline that already reaches the audio end is cut at the boundary in
/// every mode. A shorter one is extended by `repeat_all` (the whole sequence
/// cycles) or `repeat_last` (the final segment holds), and left alone by
/// `stop` with a warning.
pub fn fit_to_audio(segments: Vec<Segment>, audio_ms: u64, mode: RepeatMode) -> FitOutcome {
    let total = segments.last().map(|s| s.timeline_out_ms).unwrap_or(0);

    if total >= audio_ms {
        return FitOutcome {
            segments: trim_to(segments, audio_ms),
            warning: None,
        };
    }

    match mode {
        RepeatMode::Stop => FitOutcome {
            segments,
            warning: Some(format!(
                "timeline ends at {total} ms, before the audio ends at {audio_ms} ms"
            )),
        },
        RepeatMode::RepeatAll => {
            let pattern = segments.clone();
            FitOutcome {
                segments: extend_cycling(segments, &pattern, audio_ms),
                warning: None,
            }
        }
        RepeatMode::RepeatLast => {
            let pattern: Vec<Segment> = segments.last().cloned().into_iter().collect();
            FitOutcome {
                segments: extend_cycling(segments, &pattern, audio_ms),
                warning: None,
            }
        }
    }
}

/// Drop segments after `end_ms` and truncate the one straddling it.
fn trim_to(mut segments: Vec<Segment>, end_ms: u64) -> Vec<Segment> {
    if let Some(cut) = segments.iter().position(|s| s.timeline_out_ms >= end_ms) {
        segments.truncate(cut + 1);
        if let Some(last) = segments.last_mut() {
            last.truncate_to(end_ms);
        }
    }
    segments
}

/// Append back-to-back copies of `pattern` until the timeline reaches
/// `end_ms`, truncating the final copy.
fn extend_cycling(mut segments: Vec<Segment>, pattern: &[Segment], end_ms: u64) -> Vec<Segment> {
    let mut cursor = segments.last().map(|s| s.timeline_out_ms).unwrap_or(0);

    for template in pattern.iter().cycle() {
        if cursor >= end_ms || template.render_duration_ms == 0 {
            break;
        }
        let duration = template.render_duration_ms.min(end_ms - cursor);

        let mut copy = template.clone();
        copy.segment_index = segments.len();
        copy.timeline_in_ms = cursor;
        copy.timeline_out_ms = cursor + duration;
        copy.render_duration_ms = duration;
        copy.transition_in = None;
        copy.transition_out = None;
        if let (Some(source_in), Some(_)) = (copy.source_in_ms, copy.source_out_ms) {
            copy.source_out_ms = Some(source_in + duration);
        }

        cursor += duration;
        segments.push(copy);
    }

    segments
}
