//! Asset manifest: the resolved media available to an edit.
//!
//! The same document feeds the timeline compiler (kinds and durations) and
//! the assembler (URIs and roles).

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{read_json, ModelError};

/// Kind of media an asset holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl MediaKind {
    pub fn is_visual(self) -> bool {
        matches!(self, MediaKind::Image | MediaKind::Video)
    }
}

/// Compositing role of a visual asset within a shot.
///
/// When a shot references several assets, the lowest-ranked role wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    #[default]
    Background,
    Character,
    Overlay,
    Audio,
}

impl AssetRole {
    /// Preference rank when picking one visual per shot (lower is better).
    pub fn visual_rank(self) -> u8 {
        match self {
            AssetRole::Background => 0,
            AssetRole::Character => 1,
            AssetRole::Overlay => 2,
            AssetRole::Audio => u8::MAX,
        }
    }
}

/// One asset entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Stable asset identifier referenced by edits and plans.
    pub asset_id: String,

    /// Media kind.
    pub kind: MediaKind,

    /// Declared location (filesystem path or `file://` URI).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Compositing role.
    #[serde(default)]
    pub role: AssetRole,

    /// Media duration in milliseconds (video and audio).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    /// Pixel dimensions, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl AssetEntry {
    /// The declared URI as a filesystem path (`file://` prefix stripped).
    pub fn local_path(&self) -> Option<&Path> {
        self.uri
            .as_deref()
            .map(|uri| Path::new(uri.strip_prefix("file://").unwrap_or(uri)))
    }
}

/// Top-level asset manifest document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetManifest {
    pub assets: Vec<AssetEntry>,
}

impl AssetManifest {
    pub fn new(assets: Vec<AssetEntry>) -> Self {
        Self { assets }
    }

    /// Load a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        read_json(path)
    }

    /// Look up an asset by id. The first entry wins on duplicates.
    pub fn get(&self, asset_id: &str) -> Option<&AssetEntry> {
        self.assets.iter().find(|a| a.asset_id == asset_id)
    }

    /// Id → entry map for repeated lookups.
    pub fn index(&self) -> HashMap<&str, &AssetEntry> {
        let mut map = HashMap::with_capacity(self.assets.len());
        for asset in &self.assets {
            map.entry(asset.asset_id.as_str()).or_insert(asset);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, role: AssetRole) -> AssetEntry {
        AssetEntry {
            asset_id: id.to_string(),
            kind: MediaKind::Image,
            uri: Some(format!("file:///media/{id}.png")),
            role,
            duration_ms: None,
            width: None,
            height: None,
        }
    }

    #[test]
    fn test_local_path_strips_file_scheme() {
        let a = entry("bg", AssetRole::Background);
        assert_eq!(a.local_path(), Some(Path::new("/media/bg.png")));
    }

    #[test]
    fn test_background_outranks_character_and_overlay() {
        assert!(AssetRole::Background.visual_rank() < AssetRole::Character.visual_rank());
        assert!(AssetRole::Character.visual_rank() < AssetRole::Overlay.visual_rank());
    }

    #[test]
    fn test_manifest_role_defaults_to_background() {
        let json = r#"{"assets":[{"asset_id":"a","kind":"image","uri":"a.png"}]}"#;
        let manifest: AssetManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.assets[0].role, AssetRole::Background);
        assert!(manifest.get("a").is_some());
        assert!(manifest.get("b").is_none());
    }

    #[test]
    fn test_index_keeps_first_duplicate() {
        let mut second = entry("dup", AssetRole::Overlay);
        second.uri = Some("second.png".to_string());
        let manifest = AssetManifest::new(vec![entry("dup", AssetRole::Background), second]);
        assert_eq!(manifest.index()["dup"].role, AssetRole::Background);
    }
}
