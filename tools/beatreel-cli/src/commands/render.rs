//! Render a plan or an EDL to video.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use beatreel_common::config::AppConfig;
use beatreel_edit_model::{AssetManifest, BeatGrid, Edl, RenderOutput, RenderPlan};
use beatreel_render_engine::{
    DeterministicAssembler, MotionClipCache, MotionEngine, SubprocessOrchestrator,
};

/// What to render.
pub enum Source {
    Plan(PathBuf),
    Edl { edl: PathBuf, beats: Option<PathBuf> },
}

pub struct RenderOptions {
    pub assets: PathBuf,
    pub asset_root: Option<PathBuf>,
    pub out: PathBuf,
    pub motion: bool,
}

pub async fn run(config: AppConfig, source: Source, options: RenderOptions) -> anyhow::Result<()> {
    println!("Rendering into: {}", options.out.display());

    let out = options.out.clone();
    let output = tokio::task::spawn_blocking(move || render_blocking(&config, &source, &options))
        .await
        .context("Render task panicked")??;

    println!("{}", "=".repeat(50));
    println!("[OK] Output id:    {}", output.output_id);
    println!("     Video:        {}", out.join(&output.video_uri).display());
    println!("     Captions:     {}", out.join(&output.captions_uri).display());
    println!("     Video sha256: {}", output.hashes.video_sha256);
    println!("     Encoder:      {}", output.provenance.encoder_version);
    if output.provenance.placeholder_count > 0 {
        println!(
            "[WARN] {} shot(s) rendered as placeholders",
            output.provenance.placeholder_count
        );
    }

    Ok(())
}

/// Build an assembler from `config` and run one render on this thread.
pub fn render_blocking(
    config: &AppConfig,
    source: &Source,
    options: &RenderOptions,
) -> anyhow::Result<RenderOutput> {
    let manifest = AssetManifest::load(&options.assets)
        .with_context(|| format!("Failed to load assets {}", options.assets.display()))?;
    let assembler = assembler(config, options.asset_root.clone(), options.motion, None);

    let output = match source {
        Source::Plan(path) => {
            let plan = RenderPlan::load(path)
                .with_context(|| format!("Failed to load plan {}", path.display()))?;
            assembler.render(&manifest, &plan, &options.out)?
        }
        Source::Edl { edl, beats } => {
            let edl = Edl::load(edl)
                .with_context(|| format!("Failed to load EDL {}", edl.display()))?;
            let grid = beats
                .as_ref()
                .map(|path| {
                    BeatGrid::load(path)
                        .with_context(|| format!("Failed to load beat grid {}", path.display()))
                })
                .transpose()?;
            assembler.render_edl(&edl, &manifest, grid.as_ref(), &options.out)?
        }
    };
    Ok(output)
}

/// Assembler wired to the real encoder. `cache_root` overrides the
/// configured motion cache location.
pub fn assembler(
    config: &AppConfig,
    asset_root: Option<PathBuf>,
    motion: bool,
    cache_root: Option<PathBuf>,
) -> DeterministicAssembler {
    let runner = Arc::new(SubprocessOrchestrator::new(&config.encoder));
    let mut assembler = DeterministicAssembler::new(config.encoder.clone(), runner.clone());
    if let Some(root) = asset_root {
        assembler = assembler.with_asset_root(root);
    }
    if motion {
        let cache = MotionClipCache::new(cache_root.unwrap_or_else(|| config.cache.root.clone()));
        assembler = assembler.with_motion_engine(MotionEngine::new(
            cache,
            runner,
            config.encoder.clone(),
            config.motion.clone(),
        ));
    }
    assembler
}
