//! Filter graph for the final assembly.
//!
//! Every input is normalized on its own (scale, pad, SAR, fps, pixel
//! format, zeroed timestamps), then runs of cuts are concatenated and the
//! runs are joined with `xfade` at their timeline positions.

use beatreel_common::clock::format_secs;
use beatreel_edit_model::{TransitionKind, TransitionSpec};

/// Output label of the composed video stream.
pub const VIDEO_OUT: &str = "vout";
/// Output label of the trimmed soundtrack.
pub const AUDIO_OUT: &str = "aout";

/// Output canvas shared by every input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub pixel_format: String,
}

/// One visual input, in timeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeClip {
    /// `-i` index in the encoder command.
    pub input_index: usize,
    pub duration_ms: u64,
    pub timeline_in_ms: u64,
    /// Effective transition from the previous clip.
    pub transition_in: Option<TransitionSpec>,
}

impl CompositeClip {
    /// A hard-cut clip at `timeline_in_ms`.
    pub fn cut(input_index: usize, timeline_in_ms: u64, duration_ms: u64) -> Self {
        Self {
            input_index,
            duration_ms,
            timeline_in_ms,
            transition_in: None,
        }
    }

    fn blend(&self) -> Option<(&'static str, u64)> {
        let t = self.transition_in?;
        if t.duration_ms == 0 {
            return None;
        }
        match t.kind {
            TransitionKind::Cut => None,
            TransitionKind::Crossfade => Some(("fade", t.duration_ms)),
            TransitionKind::Fade => Some(("fadeblack", t.duration_ms)),
        }
    }
}

/// Soundtrack window mapped from a separate input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrack {
    pub input_index: usize,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Build the full `-filter_complex` graph. Outputs `[vout]` and, with a
/// soundtrack, `[aout]`.
pub fn build_filter_graph(clips: &[CompositeClip], canvas: &Canvas, audio: Option<AudioTrack>) -> String {
    let mut chains: Vec<String> = clips
        .iter()
        .enumerate()
        .map(|(i, clip)| normalize_chain(clip.input_index, i, canvas))
        .collect();

    chains.extend(join_chains(clips));

    if let Some(track) = audio {
        chains.push(format!(
            "[{idx}:a]atrim=start={start}:duration={dur},asetpts=PTS-STARTPTS[{AUDIO_OUT}]",
            idx = track.input_index,
            start = format_secs(track.start_ms),
            dur = format_secs(track.duration_ms),
        ));
    }

    chains.join(";")
}

fn normalize_chain(input_index: usize, position: usize, canvas: &Canvas) -> String {
    let Canvas {
        width: w,
        height: h,
        fps,
        pixel_format,
    } = canvas;
    format!(
        "[{input_index}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
pad={w}:{h}:(ow-iw)/2:(oh-ih)/2,setsar=1,fps={fps},format={pixel_format},\
setpts=PTS-STARTPTS[v{position}]"
    )
}

/// Concat runs of cuts, then xfade between runs.
fn join_chains(clips: &[CompositeClip]) -> Vec<String> {
    if clips.is_empty() {
        return Vec::new();
    }
    if clips.len() == 1 {
        return vec![format!("[v0]null[{VIDEO_OUT}]")];
    }

    // Runs of clip positions separated by blended transitions.
    let mut runs: Vec<Vec<usize>> = vec![vec![0]];
    let mut blends = Vec::new();
    for (i, clip) in clips.iter().enumerate().skip(1) {
        match clip.blend() {
            Some(blend) => {
                blends.push((blend, clip.timeline_in_ms));
                runs.push(vec![i]);
            }
            None => {
                if let Some(run) = runs.last_mut() {
                    run.push(i);
                }
            }
        }
    }

    let mut chains = Vec::new();
    let single_run = runs.len() == 1;
    let mut run_labels = Vec::with_capacity(runs.len());
    for (ri, run) in runs.iter().enumerate() {
        if run.len() == 1 && !single_run {
            run_labels.push(format!("v{}", run[0]));
            continue;
        }
        let label = if single_run {
            VIDEO_OUT.to_string()
        } else {
            format!("run{ri}")
        };
        let pads: String = run.iter().map(|i| format!("[v{i}]")).collect();
        chains.push(format!("{pads}concat=n={}:v=1:a=0[{label}]", run.len()));
        run_labels.push(label);
    }
    if single_run {
        return chains;
    }

    let mut current = run_labels[0].clone();
    for (bi, ((transition, duration_ms), offset_ms)) in blends.iter().enumerate() {
        let out = if bi + 1 == blends.len() {
            VIDEO_OUT.to_string()
        } else {
            format!("x{bi}")
        };
        chains.push(format!(
            "[{current}][{next}]xfade=transition={transition}:duration={dur}:offset={off}[{out}]",
            next = run_labels[bi + 1],
            dur = format_secs(*duration_ms),
            off = format_secs(*offset_ms),
        ));
        current = out;
    }
    chains
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Canvas {
        Canvas {
            width: 1280,
            height: 720,
            fps: 30,
            pixel_format: "yuv420p".to_string(),
        }
    }

    fn crossfaded(input_index: usize, timeline_in_ms: u64, duration_ms: u64, overlap: u64) -> CompositeClip {
        CompositeClip {
            input_index,
            duration_ms,
            timeline_in_ms,
            transition_in: Some(TransitionSpec::crossfade(overlap)),
        }
    }

    #[test]
    fn test_single_clip_passes_through() {
        let graph = build_filter_graph(&[CompositeClip::cut(0, 0, 2000)], &canvas(), None);
        assert_eq!(
            graph,
            "[0:v]scale=1280:720:force_original_aspect_ratio=decrease,pad=1280:720:(ow-iw)/2:(oh-ih)/2,\
setsar=1,fps=30,format=yuv420p,setpts=PTS-STARTPTS[v0];[v0]null[vout]"
        );
    }

    #[test]
    fn test_all_cuts_use_one_concat() {
        let clips = [
            CompositeClip::cut(0, 0, 2000),
            CompositeClip::cut(1, 2000, 2000),
            CompositeClip::cut(2, 4000, 1000),
        ];
        let graph = build_filter_graph(&clips, &canvas(), None);
        assert!(graph.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[vout]"));
        assert!(!graph.contains("xfade"));
    }

    #[test]
    fn test_crossfade_offsets_follow_timeline() {
        let clips = [
            CompositeClip::cut(0, 0, 4000),
            crossfaded(1, 3500, 4000, 500),
            crossfaded(2, 7000, 4000, 500),
        ];
        let graph = build_filter_graph(&clips, &canvas(), None);
        assert!(graph.contains("[v0][v1]xfade=transition=fade:duration=0.500:offset=3.500[x0]"));
        assert!(graph.ends_with("[x0][v2]xfade=transition=fade:duration=0.500:offset=7.000[vout]"));
    }

    #[test]
    fn test_mixed_runs_concat_then_blend() {
        let mut dip = crossfaded(2, 3750, 2000, 250);
        dip.transition_in = Some(TransitionSpec {
            kind: TransitionKind::Fade,
            duration_ms: 250,
        });
        let clips = [
            CompositeClip::cut(0, 0, 2000),
            CompositeClip::cut(1, 2000, 2000),
            dip,
            CompositeClip::cut(3, 5750, 1000),
        ];
        let graph = build_filter_graph(&clips, &canvas(), None);
        assert!(graph.contains("[v0][v1]concat=n=2:v=1:a=0[run0]"));
        assert!(graph.contains("[v2][v3]concat=n=2:v=1:a=0[run1]"));
        assert!(graph.ends_with("[run0][run1]xfade=transition=fadeblack:duration=0.250:offset=3.750[vout]"));
    }

    #[test]
    fn test_zero_length_transition_is_a_cut() {
        let clips = [CompositeClip::cut(0, 0, 2000), crossfaded(1, 2000, 2000, 0)];
        let graph = build_filter_graph(&clips, &canvas(), None);
        assert!(graph.ends_with("[v0][v1]concat=n=2:v=1:a=0[vout]"));
    }

    #[test]
    fn test_audio_window_is_trimmed() {
        let graph = build_filter_graph(
            &[CompositeClip::cut(0, 0, 2000)],
            &canvas(),
            Some(AudioTrack {
                input_index: 1,
                start_ms: 500,
                duration_ms: 2000,
            }),
        );
        assert!(graph.ends_with(";[1:a]atrim=start=0.500:duration=2.000,asetpts=PTS-STARTPTS[aout]"));
    }
}
