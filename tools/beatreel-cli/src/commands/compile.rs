//! Compile an edit description into an EDL.

use std::path::{Path, PathBuf};

use anyhow::Context;

use beatreel_common::config::AppConfig;
use beatreel_edit_model::{AssetManifest, BeatGrid, EditDescription, Edl};
use beatreel_render_engine::media_info::media_duration_ms;
use beatreel_timeline::beat_source::GridOrigin;
use beatreel_timeline::{BeatGridChain, FixedTempoSource, SidecarGridSource, TimelineCompiler};

pub fn run(
    config: &AppConfig,
    edit_path: PathBuf,
    assets_path: PathBuf,
    beats: Option<PathBuf>,
    fallback_bpm: f64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let edit = EditDescription::load(&edit_path)
        .with_context(|| format!("Failed to load edit {}", edit_path.display()))?;
    let assets = AssetManifest::load(&assets_path)
        .with_context(|| format!("Failed to load assets {}", assets_path.display()))?;

    let edl = compile_edit(config, &edit, &assets, beats.as_deref(), fallback_bpm)?;

    match output {
        Some(path) => {
            edl.save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("EDL written: {}", path.display());
            eprintln!("  Hash:     {}", edl.edl_hash);
            eprintln!("  Segments: {}", edl.segment_count);
            eprintln!("  Duration: {} ms", edl.total_duration_ms);
            for warning in &edl.warnings {
                eprintln!("  [WARN] {warning}");
            }
        }
        None => println!("{}", serde_json::to_string_pretty(&edl)?),
    }

    Ok(())
}

/// Compile `edit` with the grid from `beats`, else whatever the
/// soundtrack's sources yield.
pub fn compile_edit(
    config: &AppConfig,
    edit: &EditDescription,
    assets: &AssetManifest,
    beats: Option<&Path>,
    fallback_bpm: f64,
) -> anyhow::Result<Edl> {
    let grid = match beats {
        Some(path) => Some(
            BeatGrid::load(path)
                .with_context(|| format!("Failed to load beat grid {}", path.display()))?,
        ),
        None => analyzed_grid(config, edit, assets, fallback_bpm),
    };
    Ok(TimelineCompiler::with_defaults().compile(edit, assets, grid.as_ref())?)
}

/// Beat grid for the edit's soundtrack from the audio's sidecar or the
/// edit's BPM override.
///
/// A synthesized fallback grid is never returned: its tempo is a guess,
/// and beat durations or natural image holds must not be derived from it.
fn analyzed_grid(
    config: &AppConfig,
    edit: &EditDescription,
    assets: &AssetManifest,
    fallback_bpm: f64,
) -> Option<BeatGrid> {
    let settings = edit.audio.as_ref()?;
    let entry = assets.get(&settings.asset_id)?;
    let audio_path = entry.local_path()?;
    let duration_ms = entry
        .duration_ms
        .or_else(|| media_duration_ms(&config.encoder.ffprobe, audio_path));

    let mut chain = BeatGridChain::new()
        .with_source(Box::new(SidecarGridSource::new()))
        .fallback_bpm(fallback_bpm);
    if let (Some(bpm), Some(duration_ms)) = (settings.bpm_override, duration_ms) {
        chain = chain.with_source(Box::new(FixedTempoSource::new(bpm, duration_ms)));
    }

    let resolved = chain.resolve(audio_path, duration_ms.unwrap_or(0));
    match resolved.origin {
        GridOrigin::Source(_) => Some(resolved.grid),
        GridOrigin::Fallback => {
            eprintln!(
                "[WARN] No beat grid for {}; beat durations need bpm_override or --beats",
                audio_path.display()
            );
            None
        }
    }
}
