//! Content-addressed motion clip cache.
//!
//! Layout: `root/<key[0..2]>/<key>.mp4`. An entry is written to a hidden
//! temp file in its shard and renamed into place, so readers never see a
//! partial clip. A zero-byte entry counts as a miss.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_common::hashing::canonical_hash;

const TEMP_PREFIX: &str = ".render-";
const CLIP_EXTENSION: &str = "mp4";

/// Every input that changes a motion clip's bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheKeyInput {
    /// Partial content hash of the source image.
    pub content_hash: String,
    pub preset: String,
    pub duration_ms: u64,
    /// `"WxH"`.
    pub resolution: String,
    pub fps: u32,
    /// Beat-sync label with its pulse frames.
    pub beat_sync: String,
    /// Motion strength, fixed to three decimals.
    pub strength: String,
}

impl CacheKeyInput {
    /// Strength as it enters the key.
    pub fn format_strength(strength: f64) -> String {
        format!("{:.3}", strength)
    }

    /// SHA-256 hex over the canonical JSON of all fields.
    pub fn key(&self) -> BeatreelResult<String> {
        canonical_hash(self)
    }
}

/// Entry count and total size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
}

/// Clip cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct MotionClipCache {
    root: PathBuf,
}

impl MotionClipCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path of `key`.
    pub fn path_for(&self, key: &str) -> BeatreelResult<PathBuf> {
        validate_key(key)?;
        Ok(self
            .root
            .join(&key[..2])
            .join(format!("{key}.{CLIP_EXTENSION}")))
    }

    /// Path of a usable entry, if present and non-empty.
    pub fn lookup(&self, key: &str) -> BeatreelResult<Option<PathBuf>> {
        let path = self.path_for(key)?;
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(Some(path)),
            Ok(_) => {
                debug!(key, "Empty cache entry treated as miss");
                Ok(None)
            }
            Err(_) => Ok(None),
        }
    }

    /// Produce an entry by letting `render` write to a temp path, then
    /// renaming it into place.
    ///
    /// On a render error the temp file is removed and the error is returned
    /// unchanged.
    pub fn store_with<F>(&self, key: &str, render: F) -> BeatreelResult<PathBuf>
    where
        F: FnOnce(&Path) -> BeatreelResult<()>,
    {
        let final_path = self.path_for(key)?;
        let shard = final_path
            .parent()
            .ok_or_else(|| BeatreelError::cache("cache entry has no parent directory"))?;
        fs::create_dir_all(shard)?;

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(&format!(".{CLIP_EXTENSION}"))
            .tempfile_in(shard)?
            .into_temp_path();

        render(&temp)?;

        let size = fs::metadata(&temp)?.len();
        if size == 0 {
            return Err(BeatreelError::cache(format!(
                "render for {key} produced an empty file"
            )));
        }

        temp.persist(&final_path).map_err(|e| {
            BeatreelError::cache(format!(
                "failed to move clip into {}: {}",
                final_path.display(),
                e.error
            ))
        })?;
        debug!(key, bytes = size, "Cache entry stored");
        Ok(final_path)
    }

    /// Remove one entry. Returns whether it existed.
    pub fn evict(&self, key: &str) -> BeatreelResult<bool> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> BeatreelResult<usize> {
        let mut removed = 0;
        for path in self.entries()? {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }

    pub fn stats(&self) -> BeatreelResult<CacheStats> {
        let mut stats = CacheStats::default();
        for path in self.entries()? {
            stats.entries += 1;
            stats.bytes += fs::metadata(&path)?.len();
        }
        Ok(stats)
    }

    /// Committed entry files (temp files excluded).
    fn entries(&self) -> BeatreelResult<Vec<PathBuf>> {
        let mut out = Vec::new();
        let shards = match fs::read_dir(&self.root) {
            Ok(shards) => shards,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        for shard in shards {
            let shard = shard?;
            if !shard.file_type()?.is_dir() {
                continue;
            }
            for entry in fs::read_dir(shard.path())? {
                let path = entry?.path();
                let is_clip = path.extension().and_then(|e| e.to_str()) == Some(CLIP_EXTENSION);
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(true);
                if is_clip && !hidden && path.is_file() {
                    out.push(path);
                }
            }
        }
        out.sort();
        Ok(out)
    }
}

fn validate_key(key: &str) -> BeatreelResult<()> {
    let valid = key.len() == 64
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(BeatreelError::cache(format!(
            "invalid cache key '{key}' (expected 64 lowercase hex characters)"
        )))
    }
}
