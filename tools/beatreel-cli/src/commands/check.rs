//! Check encoder availability.

use beatreel_common::config::AppConfig;
use beatreel_render_engine::media_info::{command_exists, encoder_version};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Beatreel System Check");
    println!("{}", "=".repeat(50));

    let mut all_ok = true;
    for binary in [&config.encoder.ffmpeg, &config.encoder.ffprobe] {
        if !command_exists(binary) {
            println!("[MISSING] {binary}: not found on PATH");
            all_ok = false;
            continue;
        }
        match encoder_version(binary) {
            Ok(version) => println!("[OK] {version}"),
            Err(e) => {
                println!("[WARN] {binary}: {e}");
                all_ok = false;
            }
        }
    }

    println!("[OK] Motion cache: {}", config.cache.root.display());
    println!(
        "[OK] Encoder: crf {} preset {} {} timeout {}s",
        config.encoder.crf,
        config.encoder.preset,
        config.encoder.pixel_format,
        config.encoder.timeout_secs
    );

    println!();
    if all_ok {
        println!("Encoder and ffprobe are available. Beatreel is ready.");
    } else {
        println!("Install ffmpeg (with ffprobe) or point the config at it.");
    }

    Ok(())
}
