//! Render one Ken Burns clip through the motion cache.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use beatreel_common::config::AppConfig;
use beatreel_edit_model::{BeatGrid, BeatSyncMode};
use beatreel_render_engine::{
    BeatSync, ClipGeometry, MotionClipCache, MotionEngine, SubprocessOrchestrator,
};

const BEATS_PER_BAR: u32 = 4;

pub struct MotionArgs {
    pub image: PathBuf,
    pub preset: String,
    pub duration_ms: u64,
    pub strength: f64,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub beat_sync: String,
    pub bpm: f64,
}

pub async fn run(config: AppConfig, args: MotionArgs) -> anyhow::Result<()> {
    let mode = parse_beat_sync(&args.beat_sync)?;
    println!(
        "Motion clip: {} ({}, {} ms, strength {})",
        args.image.display(),
        args.preset,
        args.duration_ms,
        args.strength
    );

    let path = tokio::task::spawn_blocking(move || -> anyhow::Result<PathBuf> {
        let runner = Arc::new(SubprocessOrchestrator::new(&config.encoder));
        let engine = MotionEngine::new(
            MotionClipCache::new(config.cache.root.clone()),
            runner,
            config.encoder.clone(),
            config.motion.clone(),
        );
        let geometry = ClipGeometry {
            width: args.width,
            height: args.height,
            fps: args.fps,
        };
        let grid = match mode {
            BeatSyncMode::Off => None,
            _ => Some(BeatGrid::constant_tempo(
                args.bpm,
                args.duration_ms,
                BEATS_PER_BAR,
            )),
        };
        let sync = BeatSync::new(mode, grid.as_ref(), 0);
        Ok(engine.render_with_cache(
            &args.image,
            &args.preset,
            args.duration_ms,
            geometry,
            &sync,
            args.strength,
        )?)
    })
    .await
    .context("Motion task panicked")??;

    println!("[OK] {}", path.display());
    Ok(())
}

/// `off`, `downbeat`, or a positive beat interval.
fn parse_beat_sync(value: &str) -> anyhow::Result<BeatSyncMode> {
    match value {
        "off" => Ok(BeatSyncMode::Off),
        "downbeat" => Ok(BeatSyncMode::Downbeat),
        other => match other.parse::<u32>() {
            Ok(n) if n > 0 => Ok(BeatSyncMode::EveryNBeats { n }),
            _ => anyhow::bail!("beat sync must be off, downbeat, or a beat interval; got '{other}'"),
        },
    }
}
