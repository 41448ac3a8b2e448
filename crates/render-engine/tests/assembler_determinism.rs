mod support;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use beatreel_common::config::{EncoderConfig, MotionConfig};
use beatreel_common::error::BeatreelError;
use beatreel_edit_model::{
    AssetEntry, AssetManifest, AssetRole, BeatGrid, EditDescription, Edl, MediaKind, RenderOutput,
    RenderPlan, RenderProfile, Shot, ShotMotion, SpeechLine,
};
use beatreel_render_engine::{
    DeterministicAssembler, MotionClipCache, MotionEngine, CAPTIONS_FILE, MANIFEST_FILE, VIDEO_FILE,
};
use beatreel_timeline::TimelineCompiler;

use support::{flag_values, write_png, FakeRunner, FAKE_VERSION};

fn asset(id: &str, kind: MediaKind, uri: Option<&Path>, role: AssetRole) -> AssetEntry {
    AssetEntry {
        asset_id: id.to_string(),
        kind,
        uri: uri.map(|p| p.display().to_string()),
        role,
        duration_ms: None,
        width: None,
        height: None,
    }
}

fn shot(id: &str, ms: u64, assets: &[&str]) -> Shot {
    Shot {
        shot_id: id.to_string(),
        duration_ms: ms,
        asset_ids: assets.iter().map(|a| a.to_string()).collect(),
        source_in_ms: None,
        motion: None,
    }
}

struct PlanFixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    manifest: AssetManifest,
    plan: RenderPlan,
}

fn plan_fixture() -> PlanFixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let bg = root.join("media/bg.png");
    let hero = root.join("media/hero.png");
    let song = root.join("media/song.wav");
    write_png(&bg, 30);
    write_png(&hero, 200);
    std::fs::write(&song, b"RIFF-not-really").unwrap();

    let manifest = AssetManifest::new(vec![
        asset("bg", MediaKind::Image, Some(bg.as_path()), AssetRole::Background),
        asset("hero", MediaKind::Image, Some(hero.as_path()), AssetRole::Character),
        asset("gone", MediaKind::Image, Some(root.join("media/gone.png").as_path()), AssetRole::Background),
        asset("song", MediaKind::Audio, Some(song.as_path()), AssetRole::Audio),
    ]);

    let mut moving = shot("s4", 1500, &["bg"]);
    moving.motion = Some(ShotMotion {
        preset: "zoom_in".to_string(),
        strength: 0.6,
        beat_sync: Default::default(),
    });

    let plan = RenderPlan {
        request_id: "req-42".to_string(),
        profile: RenderProfile {
            name: "preview".to_string(),
            width: 640,
            height: 360,
            fps: 24,
        },
        timing_lock_hash: None,
        shots: vec![
            shot("s1", 2000, &["hero", "bg"]),
            shot("s2", 1000, &["gone"]),
            shot("s3", 1000, &[]),
            moving,
        ],
        speech: vec![
            SpeechLine {
                shot_id: "s1".to_string(),
                text: "Hello there".to_string(),
            },
            SpeechLine {
                shot_id: "s4".to_string(),
                text: "Goodbye".to_string(),
            },
        ],
        background_music: Some("song".to_string()),
    };

    PlanFixture {
        _dir: dir,
        root,
        manifest,
        plan,
    }
}

fn assembler(root: &Path, runner: Arc<FakeRunner>) -> DeterministicAssembler {
    let motion = MotionEngine::new(
        MotionClipCache::new(root.join("cache")),
        runner.clone(),
        EncoderConfig::default(),
        MotionConfig::default(),
    );
    DeterministicAssembler::new(EncoderConfig::default(), runner).with_motion_engine(motion)
}

#[test]
fn test_plan_renders_are_reproducible() {
    let fx = plan_fixture();
    let runner = Arc::new(FakeRunner::default());
    let assembler = assembler(&fx.root, runner.clone());

    let first = assembler
        .render(&fx.manifest, &fx.plan, &fx.root.join("out1"))
        .unwrap();
    let second = assembler
        .render(&fx.manifest, &fx.plan, &fx.root.join("out2"))
        .unwrap();

    assert_eq!(first.without_timestamp(), second.without_timestamp());

    let on_disk_1 = RenderOutput::load(&fx.root.join("out1").join(MANIFEST_FILE)).unwrap();
    let on_disk_2 = RenderOutput::load(&fx.root.join("out2").join(MANIFEST_FILE)).unwrap();
    assert_eq!(
        serde_json::to_string(&on_disk_1.without_timestamp()).unwrap(),
        serde_json::to_string(&on_disk_2.without_timestamp()).unwrap()
    );

    // One motion clip plus the final encode, then only the final encode.
    assert_eq!(runner.calls(), 3);
}

#[test]
fn test_plan_manifest_records_provenance_and_lineage() {
    let fx = plan_fixture();
    let runner = Arc::new(FakeRunner::default());
    let out = fx.root.join("out");
    let output = assembler(&fx.root, runner.clone())
        .render(&fx.manifest, &fx.plan, &out)
        .unwrap();

    assert!(output.output_id.starts_with("out_"));
    assert_eq!(output.request_id, "req-42");
    assert_eq!(output.video_uri, VIDEO_FILE);
    assert_eq!(output.captions_uri, CAPTIONS_FILE);
    assert_eq!(output.provenance.placeholder_count, 2);
    assert_eq!(output.provenance.encoder_version, FAKE_VERSION);
    assert_eq!(output.provenance.render_profile, "preview");
    assert_eq!(output.provenance.timing_lock_hash.len(), 64);
    assert_eq!(output.lineage.asset_manifest_hash.len(), 64);

    let captions = std::fs::read_to_string(out.join(CAPTIONS_FILE)).unwrap();
    assert_eq!(
        captions,
        "1\n00:00:00,000 --> 00:00:02,000\nHello there\n\n2\n00:00:04,000 --> 00:00:05,500\nGoodbye\n\n"
    );
    assert_eq!(
        output.hashes.captions_sha256,
        beatreel_common::hashing::sha256_hex(captions.as_bytes())
    );
    assert_eq!(
        output.hashes.video_sha256,
        beatreel_common::hashing::sha256_file(&out.join(VIDEO_FILE)).unwrap()
    );

    // No stray temp files or work directories are left behind.
    let mut names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![CAPTIONS_FILE, VIDEO_FILE, MANIFEST_FILE]);
}

#[test]
fn test_final_command_prefers_background_and_maps_music() {
    let fx = plan_fixture();
    let runner = Arc::new(FakeRunner::default());
    assembler(&fx.root, runner.clone())
        .render(&fx.manifest, &fx.plan, &fx.root.join("out"))
        .unwrap();

    let argv = runner.last_command().unwrap().argv();
    let inputs = flag_values(&argv, "-i");
    assert_eq!(inputs.len(), 5);
    assert!(inputs[0].ends_with("media/bg.png"));
    assert!(inputs[1].contains("placeholder_s2_"));
    assert!(inputs[2].contains("placeholder_s3_"));
    assert!(inputs[3].ends_with(".mp4"));
    assert!(inputs[4].ends_with("media/song.wav"));

    let graph = &flag_values(&argv, "-filter_complex")[0];
    assert!(graph.contains("[v0][v1][v2][v3]concat=n=4:v=1:a=0[vout]"));
    assert!(graph.contains("[4:a]atrim=start=0.000:duration=5.500,asetpts=PTS-STARTPTS[aout]"));
    assert_eq!(flag_values(&argv, "-map"), vec!["[vout]", "[aout]"]);
    assert_eq!(flag_values(&argv, "-t").last().map(String::as_str), Some("5.500"));
    assert!(argv.contains(&"-map_metadata".to_string()));
}

#[test]
fn test_resolved_path_beats_manifest_uri() {
    let fx = plan_fixture();
    let replacement = fx.root.join("resolved/gone.png");
    write_png(&replacement, 90);

    let runner = Arc::new(FakeRunner::default());
    let output = assembler(&fx.root, runner.clone())
        .with_resolved_path("gone", &replacement)
        .render(&fx.manifest, &fx.plan, &fx.root.join("out"))
        .unwrap();

    assert_eq!(output.provenance.placeholder_count, 1);
    let inputs = flag_values(&runner.last_command().unwrap().argv(), "-i");
    assert_eq!(PathBuf::from(&inputs[1]), replacement);
}

#[test]
fn test_encoder_failure_leaves_no_render() {
    let fx = plan_fixture();
    let runner = Arc::new(FakeRunner::failing());
    let out = fx.root.join("out");
    let err = DeterministicAssembler::new(EncoderConfig::default(), runner)
        .render(&fx.manifest, &fx.plan, &out)
        .unwrap_err();

    assert!(matches!(err, BeatreelError::Encoder { .. }));
    assert!(!out.join(VIDEO_FILE).exists());
    assert!(!out.join(MANIFEST_FILE).exists());
}

#[test]
fn test_empty_plan_is_rejected() {
    let mut fx = plan_fixture();
    fx.plan.shots.clear();
    let runner = Arc::new(FakeRunner::default());
    let err = assembler(&fx.root, runner.clone())
        .render(&fx.manifest, &fx.plan, &fx.root.join("out"))
        .unwrap_err();
    assert!(matches!(err, BeatreelError::Validation { .. }));
    assert_eq!(runner.calls(), 0);
}

fn edit_fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/edit")
        .join(name)
}

fn compiled_edl() -> (Edl, AssetManifest, BeatGrid) {
    let edit = EditDescription::load(&edit_fixture("music_video.json")).unwrap();
    let manifest = AssetManifest::load(&edit_fixture("assets.json")).unwrap();
    let grid = BeatGrid::load(&edit_fixture("beats.json")).unwrap();
    let edl = TimelineCompiler::with_defaults()
        .compile(&edit, &manifest, Some(&grid))
        .unwrap();
    (edl, manifest, grid)
}

/// Create the fixture media the asset manifest points at, under `root`.
fn stage_media(root: &Path, with_clip: bool) {
    write_png(&root.join("fixtures/media/intro.png"), 10);
    write_png(&root.join("fixtures/media/city.png"), 120);
    std::fs::write(root.join("fixtures/media/song.wav"), b"song").unwrap();
    if with_clip {
        std::fs::write(root.join("fixtures/media/clip.mp4"), b"clip").unwrap();
    }
}

#[test]
fn test_edl_render_joins_transitions_and_audio_window() {
    let (edl, manifest, grid) = compiled_edl();
    let dir = tempfile::tempdir().unwrap();
    stage_media(dir.path(), true);
    let runner = Arc::new(FakeRunner::default());

    let output = assembler(dir.path(), runner.clone())
        .with_asset_root(dir.path())
        .render_edl(&edl, &manifest, Some(&grid), &dir.path().join("out"))
        .unwrap();

    assert_eq!(output.request_id, edl.edl_hash);
    assert_eq!(output.provenance.timing_lock_hash, edl.edl_hash);
    assert_eq!(output.provenance.render_profile, "1280x720@30");
    // `outro` is declared without a file.
    assert_eq!(output.provenance.placeholder_count, 2);

    let argv = runner.last_command().unwrap().argv();
    let graph = &flag_values(&argv, "-filter_complex")[0];
    assert!(graph.contains("xfade=transition=fade:duration=0.250:offset=1.750"));
    assert!(graph.contains("xfade=transition=fade:duration=0.250:offset=6.500"));
    assert!(graph.contains("atrim=start=0.500:duration=18.000"));
    assert_eq!(flag_values(&argv, "-t").last().map(String::as_str), Some("18.000"));

    let captions = std::fs::read_to_string(dir.path().join("out").join(CAPTIONS_FILE)).unwrap();
    assert!(captions.is_empty());
}

#[test]
fn test_edl_render_is_reproducible() {
    let (edl, manifest, grid) = compiled_edl();
    let dir = tempfile::tempdir().unwrap();
    stage_media(dir.path(), true);
    let runner = Arc::new(FakeRunner::default());
    let assembler = assembler(dir.path(), runner).with_asset_root(dir.path());

    let a = assembler
        .render_edl(&edl, &manifest, Some(&grid), &dir.path().join("a"))
        .unwrap();
    let mut recompiled = edl.clone();
    recompiled.generated_at = "2030-01-01T00:00:00Z".to_string();
    let b = assembler
        .render_edl(&recompiled, &manifest, Some(&grid), &dir.path().join("b"))
        .unwrap();

    assert_eq!(a.without_timestamp(), b.without_timestamp());
}

#[test]
fn test_edl_render_fails_on_declared_but_absent_file() {
    let (edl, manifest, grid) = compiled_edl();
    let dir = tempfile::tempdir().unwrap();
    stage_media(dir.path(), false);

    let err = assembler(dir.path(), Arc::new(FakeRunner::default()))
        .with_asset_root(dir.path())
        .render_edl(&edl, &manifest, Some(&grid), &dir.path().join("out"))
        .unwrap_err();
    match err {
        BeatreelError::MissingAsset { path } => assert!(path.ends_with("fixtures/media/clip.mp4")),
        other => panic!("unexpected error: {other}"),
    }
}
