use std::path::PathBuf;

use beatreel_edit_model::{AssetManifest, BeatGrid, EditDescription, Edl, RepeatMode};
use beatreel_timeline::TimelineCompiler;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("fixtures")
        .join("edit")
        .join(name)
}

fn compile_fixture() -> Edl {
    let edit = EditDescription::load(&fixture("music_video.json")).expect("edit fixture should parse");
    let assets = AssetManifest::load(&fixture("assets.json")).expect("asset fixture should parse");
    let grid = BeatGrid::load(&fixture("beats.json")).expect("beat fixture should parse");
    TimelineCompiler::with_defaults()
        .compile(&edit, &assets, Some(&grid))
        .expect("fixture should compile")
}

#[test]
fn test_music_video_fixture_layout_is_stable() {
    let edl = compile_fixture();

    let layout: Vec<(&str, u64, u64)> = edl
        .segments
        .iter()
        .map(|s| (s.asset_id.as_str(), s.timeline_in_ms, s.timeline_out_ms))
        .collect();
    assert_eq!(
        layout,
        vec![
            ("intro", 0, 2000),
            ("city", 1750, 3750),
            ("clip", 3750, 6750),
            ("outro", 6500, 8000),
            ("intro", 8000, 10_000),
            ("city", 10_000, 12_000),
            ("clip", 12_000, 15_000),
            ("outro", 15_000, 16_500),
            ("intro", 16_500, 18_000),
        ]
    );
    assert_eq!(edl.total_duration_ms, 18_000);
    assert_eq!(edl.segment_count, 9);
    assert_eq!(edl.effective_bpm, Some(120.0));
    assert_eq!(edl.repeat_mode, RepeatMode::RepeatAll);

    // Repeated copies carry no transitions; the video keeps its trim.
    assert!(edl.segments[4].transition_in.is_none());
    assert_eq!(edl.segments[6].source_in_ms, Some(1000));
    assert_eq!(edl.segments[6].source_out_ms, Some(4000));
    assert!(edl.segments[2].effect.is_none());
    assert!(edl.segments[3].effect.is_none());

    let audio = edl.audio.as_ref().expect("audio window");
    assert_eq!(audio.start_offset_ms, 500);
    assert_eq!(audio.duration_ms, Some(18_000));
}

#[test]
fn test_music_video_fixture_hash_is_pinned() {
    let edl = compile_fixture();
    assert_eq!(
        edl.edl_hash,
        "sha256:25af594cc7fee2671ac5f51e879232f8ac946ee6cc627e87333fc5d35a2037d4"
    );
}

#[test]
fn test_compiling_twice_yields_identical_hash() {
    let first = compile_fixture();
    let second = compile_fixture();
    assert_eq!(first.edl_hash, second.edl_hash);
    assert_eq!(first.segments, second.segments);
}

#[test]
fn test_compiled_edl_survives_disk_round_trip() {
    let edl = compile_fixture();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edl.json");
    edl.save(&path).unwrap();
    let loaded = Edl::load(&path).unwrap();
    assert_eq!(loaded, edl);
}
