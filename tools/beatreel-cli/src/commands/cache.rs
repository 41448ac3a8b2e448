//! Motion clip cache maintenance.

use beatreel_common::config::AppConfig;
use beatreel_render_engine::MotionClipCache;

fn open(config: &AppConfig) -> MotionClipCache {
    MotionClipCache::new(config.cache.root.clone())
}

pub fn stats(config: &AppConfig) -> anyhow::Result<()> {
    let cache = open(config);
    let stats = cache.stats()?;

    println!("Motion clip cache: {}", cache.root().display());
    println!("  Entries: {}", stats.entries);
    println!("  Size:    {:.1} MiB", stats.bytes as f64 / (1024.0 * 1024.0));
    Ok(())
}

pub fn evict(config: &AppConfig, key: &str) -> anyhow::Result<()> {
    if open(config).evict(key)? {
        println!("[OK] Evicted {key}");
    } else {
        println!("[WARN] No cache entry for {key}");
    }
    Ok(())
}

pub fn clear(config: &AppConfig) -> anyhow::Result<()> {
    let removed = open(config).clear()?;
    println!("[OK] Removed {removed} cached clip(s)");
    Ok(())
}
