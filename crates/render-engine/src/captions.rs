//! Caption cues and SRT output.

use std::collections::HashMap;
use std::path::Path;

use tracing::warn;

use beatreel_common::error::BeatreelResult;
use beatreel_edit_model::RenderPlan;

/// One caption on the output timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionCue {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// SRT document for `cues`. No cues yields an empty document.
pub fn generate_srt(cues: &[CaptionCue]) -> String {
    let mut output = String::new();

    for (i, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(cue.start_ms),
            format_srt_time(cue.end_ms),
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

/// Write `cues` as SRT to `path` and return the written text.
pub fn write_srt(path: &Path, cues: &[CaptionCue]) -> BeatreelResult<String> {
    let text = generate_srt(cues);
    std::fs::write(path, &text)?;
    Ok(text)
}

/// Cues for a plan's speech lines.
///
/// Shots play back-to-back. Lines on the same shot split its window evenly
/// in their listed order. Lines naming an unknown shot are skipped.
pub fn cues_from_plan(plan: &RenderPlan) -> Vec<CaptionCue> {
    let mut lines_by_shot: HashMap<&str, Vec<&str>> = HashMap::new();
    for line in &plan.speech {
        let text = line.text.trim();
        if text.is_empty() {
            continue;
        }
        lines_by_shot.entry(line.shot_id.as_str()).or_default().push(text);
    }

    let mut cues = Vec::new();
    let mut cursor = 0u64;
    for shot in &plan.shots {
        let start = cursor;
        cursor += shot.duration_ms;
        let Some(lines) = lines_by_shot.remove(shot.shot_id.as_str()) else {
            continue;
        };
        let n = lines.len() as u64;
        for (i, text) in lines.into_iter().enumerate() {
            let i = i as u64;
            cues.push(CaptionCue {
                start_ms: start + shot.duration_ms * i / n,
                end_ms: start + shot.duration_ms * (i + 1) / n,
                text: text.to_string(),
            });
        }
    }

    for shot_id in lines_by_shot.keys() {
        warn!(shot_id, "Speech line references unknown shot, skipping");
    }
    cues
}

/// `HH:MM:SS,mmm`
fn format_srt_time(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}
