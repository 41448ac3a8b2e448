use proptest::prelude::*;

use beatreel_edit_model::{
    AssetEntry, AssetManifest, AssetRole, AudioSettings, DurationSpec, EditDefaults,
    EditDescription, MediaKind, RepeatMode, RepeatSettings, TimelineEntry, TransitionSpec,
};
use beatreel_timeline::{expected_total_duration_ms, TimelineCompiler};

fn asset(id: &str, kind: MediaKind, duration_ms: Option<u64>) -> AssetEntry {
    AssetEntry {
        asset_id: id.to_string(),
        kind,
        uri: None,
        role: if kind == MediaKind::Audio {
            AssetRole::Audio
        } else {
            AssetRole::Background
        },
        duration_ms,
        width: None,
        height: None,
    }
}

fn images(durations: &[u64]) -> (AssetManifest, Vec<TimelineEntry>) {
    let mut assets = Vec::new();
    let mut timeline = Vec::new();
    for (i, &ms) in durations.iter().enumerate() {
        let id = format!("img{i}");
        assets.push(asset(&id, MediaKind::Image, None));
        timeline.push(TimelineEntry {
            asset_id: id,
            media_type: MediaKind::Image,
            duration: DurationSpec::Ms(ms),
            source_in_ms: None,
            source_out_ms: None,
            transition_in: None,
            effect: None,
        });
    }
    (AssetManifest::new(assets), timeline)
}

fn edit(timeline: Vec<TimelineEntry>, transition: TransitionSpec) -> EditDescription {
    EditDescription {
        version: "1.0".to_string(),
        project_id: "props".to_string(),
        output: Default::default(),
        defaults: EditDefaults {
            transition,
            ..EditDefaults::default()
        },
        audio: None,
        timeline,
    }
}

#[test]
fn test_three_images_with_crossfade_total_eleven_seconds() {
    let (assets, timeline) = images(&[4000, 4000, 4000]);
    let edl = TimelineCompiler::with_defaults()
        .compile(&edit(timeline, TransitionSpec::crossfade(500)), &assets, None)
        .unwrap();
    assert_eq!(edl.total_duration_ms, 11_000);
}

#[test]
fn test_repeat_all_fills_audio_exactly() {
    let (mut assets, timeline) = images(&[4000, 4000]);
    assets.assets.push(asset("song", MediaKind::Audio, Some(10_000)));
    let mut e = edit(timeline, TransitionSpec::cut());
    e.audio = Some(AudioSettings {
        asset_id: "song".to_string(),
        bpm_override: None,
        start_offset_ms: 0,
        trim_end_ms: 0,
        end_at_audio_end: true,
        repeat: RepeatSettings {
            mode: RepeatMode::RepeatAll,
        },
    });

    let edl = TimelineCompiler::with_defaults()
        .compile(&e, &assets, None)
        .unwrap();
    let summed: u64 = edl.segments.iter().map(|s| s.render_duration_ms).sum();
    assert_eq!(summed, 10_000);
    assert_eq!(edl.total_duration_ms, 10_000);

    let last = edl.segments.last().unwrap();
    assert_eq!((last.timeline_in_ms, last.timeline_out_ms), (8000, 10_000));
    assert_eq!(last.render_duration_ms, 2000);
}

/// The planner's flat formula and the compiler's per-pair clamp disagree
/// once a segment is shorter than twice the transition.
#[test]
fn test_planner_formula_diverges_on_short_segments() {
    let durations = [4000, 600, 4000];
    let (assets, timeline) = images(&durations);
    let edl = TimelineCompiler::with_defaults()
        .compile(&edit(timeline, TransitionSpec::crossfade(1000)), &assets, None)
        .unwrap();

    // Overlaps: 300 (half of the short segment), then 600 (all of it).
    assert_eq!(edl.total_duration_ms, 8600 - 300 - 600);
    assert_eq!(expected_total_duration_ms(&durations, 1000), 6600);
    assert_ne!(edl.total_duration_ms, expected_total_duration_ms(&durations, 1000));
}

proptest! {
    #[test]
    fn test_cut_total_equals_sum(durations in prop::collection::vec(1u64..20_000, 1..12)) {
        let (assets, timeline) = images(&durations);
        let edl = TimelineCompiler::with_defaults()
            .compile(&edit(timeline, TransitionSpec::cut()), &assets, None)
            .unwrap();
        let summed = edl.summed_render_duration_ms();
        prop_assert_eq!(edl.total_duration_ms, summed);
        prop_assert_eq!(summed, durations.iter().sum::<u64>());
    }

    #[test]
    fn test_crossfade_total_matches_flat_formula_when_segments_are_long(
        transition in 1u64..1000,
        extra in prop::collection::vec(0u64..10_000, 2..10),
    ) {
        let durations: Vec<u64> = extra.iter().map(|e| 2 * transition + e).collect();
        let (assets, timeline) = images(&durations);
        let edl = TimelineCompiler::with_defaults()
            .compile(&edit(timeline, TransitionSpec::crossfade(transition)), &assets, None)
            .unwrap();
        prop_assert_eq!(
            edl.total_duration_ms,
            expected_total_duration_ms(&durations, transition)
        );
    }

    #[test]
    fn test_timeline_out_never_decreases(
        transition in 0u64..3000,
        durations in prop::collection::vec(1u64..8000, 1..10),
    ) {
        let (assets, timeline) = images(&durations);
        let edl = TimelineCompiler::with_defaults()
            .compile(&edit(timeline, TransitionSpec::crossfade(transition)), &assets, None)
            .unwrap();
        for pair in edl.segments.windows(2) {
            prop_assert!(pair[1].timeline_out_ms >= pair[0].timeline_out_ms);
            prop_assert!(pair[1].timeline_in_ms >= pair[0].timeline_in_ms);
        }
        prop_assert!(edl.total_duration_ms <= durations.iter().sum::<u64>());
    }

    #[test]
    fn test_hash_is_stable_across_compiles(durations in prop::collection::vec(1u64..10_000, 1..8)) {
        let (assets, timeline) = images(&durations);
        let e = edit(timeline, TransitionSpec::crossfade(200));
        let compiler = TimelineCompiler::with_defaults();
        let a = compiler.compile(&e, &assets, None).unwrap();
        let b = compiler.compile(&e, &assets, None).unwrap();
        prop_assert_eq!(a.edl_hash, b.edl_hash);
    }
}
