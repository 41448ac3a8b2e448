//! Beatreel CLI: compile edits, render videos, and manage the motion cache.
//!
//! Usage:
//!   beatreel compile <EDIT> --assets <FILE>    Compile an edit into an EDL
//!   beatreel render <PLAN> --assets <FILE>     Render a shot-list plan
//!   beatreel render --edl <EDL> --assets <FILE>
//!   beatreel motion <IMAGE> --preset <NAME>    Render one Ken Burns clip
//!   beatreel presets                           List motion presets
//!   beatreel cache stats|evict|clear           Inspect the motion clip cache
//!   beatreel check                             Check encoder availability
//!   beatreel verify                            Run the determinism check

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use beatreel_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "beatreel",
    about = "Deterministic beat-synced video assembly",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/beatreel/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile an edit description into an EDL
    Compile {
        /// Edit description JSON
        edit: PathBuf,

        /// Asset manifest JSON
        #[arg(short, long)]
        assets: PathBuf,

        /// Beat grid JSON (otherwise the soundtrack's sidecar or a fixed tempo)
        #[arg(short, long)]
        beats: Option<PathBuf>,

        /// Tempo used when no beat grid can be found
        #[arg(long, default_value = "120")]
        fallback_bpm: f64,

        /// Where to write the EDL (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a shot-list plan or a compiled EDL
    Render {
        /// Render plan JSON
        #[arg(required_unless_present = "edl", conflicts_with = "edl")]
        plan: Option<PathBuf>,

        /// Compiled EDL JSON
        #[arg(long)]
        edl: Option<PathBuf>,

        /// Asset manifest JSON
        #[arg(short, long)]
        assets: PathBuf,

        /// Beat grid JSON for beat-synced motion (EDL mode)
        #[arg(short, long)]
        beats: Option<PathBuf>,

        /// Base directory for relative asset URIs
        #[arg(long)]
        asset_root: Option<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,

        /// Loop still images without Ken Burns motion
        #[arg(long)]
        no_motion: bool,
    },

    /// Render a single Ken Burns clip through the cache
    Motion {
        /// Source still image
        image: PathBuf,

        /// Motion preset name
        #[arg(short, long, default_value = "zoom_in")]
        preset: String,

        /// Clip duration (milliseconds)
        #[arg(short, long, default_value = "3000")]
        duration_ms: u64,

        /// Motion strength [0.0, 1.0]
        #[arg(short, long, default_value = "1.0")]
        strength: f64,

        /// Clip width
        #[arg(long, default_value = "1920")]
        width: u32,

        /// Clip height
        #[arg(long, default_value = "1080")]
        height: u32,

        /// Clip frame rate
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Beat pulses: off, downbeat, or a beat interval such as 2
        #[arg(long, default_value = "off")]
        beat_sync: String,

        /// Tempo of the constant grid driving beat pulses
        #[arg(long, default_value = "120")]
        bpm: f64,
    },

    /// List the built-in motion presets
    Presets,

    /// Inspect or prune the motion clip cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Check that ffmpeg and ffprobe are usable
    Check,

    /// Render the verification fixture twice and compare the results
    Verify {
        /// Fixture directory holding plan.json and manifest.json
        #[arg(long, default_value = "fixtures/verify")]
        fixture: PathBuf,

        /// Pinned content hashes
        #[arg(long, default_value = "fixtures/verify/pins.json")]
        pins: PathBuf,

        /// Write the observed hashes to the pins file
        #[arg(long)]
        record: bool,

        /// Treat a video hash mismatch as a failure
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Entry count and total size
    Stats,
    /// Remove one entry by key
    Evict {
        /// 64-character cache key
        key: String,
    },
    /// Remove every entry
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    beatreel_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Compile {
            edit,
            assets,
            beats,
            fallback_bpm,
            output,
        } => commands::compile::run(&config, edit, assets, beats, fallback_bpm, output),
        Commands::Render {
            plan,
            edl,
            assets,
            beats,
            asset_root,
            out,
            no_motion,
        } => {
            let source = match (plan, edl) {
                (_, Some(edl)) => commands::render::Source::Edl { edl, beats },
                (Some(plan), None) => commands::render::Source::Plan(plan),
                (None, None) => anyhow::bail!("either a plan or --edl is required"),
            };
            let options = commands::render::RenderOptions {
                assets,
                asset_root,
                out,
                motion: !no_motion,
            };
            commands::render::run(config, source, options).await
        }
        Commands::Motion {
            image,
            preset,
            duration_ms,
            strength,
            width,
            height,
            fps,
            beat_sync,
            bpm,
        } => {
            commands::motion::run(
                config,
                commands::motion::MotionArgs {
                    image,
                    preset,
                    duration_ms,
                    strength,
                    width,
                    height,
                    fps,
                    beat_sync,
                    bpm,
                },
            )
            .await
        }
        Commands::Presets => commands::presets::run(),
        Commands::Cache { action } => match action {
            CacheAction::Stats => commands::cache::stats(&config),
            CacheAction::Evict { key } => commands::cache::evict(&config, &key),
            CacheAction::Clear => commands::cache::clear(&config),
        },
        Commands::Check => commands::check::run(&config),
        Commands::Verify {
            fixture,
            pins,
            record,
            strict,
        } => commands::verify::run(config, fixture, pins, record, strict).await,
    }
}
