//! Ken Burns motion for still images.
//!
//! - `presets`: immutable zoom/pan paths with easing
//! - `beat_sync`: which beats pulse, and on which frames
//! - `filter`: the ffmpeg expression for one clip
//! - `cache`: content-addressed, atomically written clip store
//! - `engine`: ties them together behind `render_with_cache`

pub mod beat_sync;
pub mod cache;
pub mod engine;
pub mod filter;
pub mod presets;

pub use beat_sync::BeatSync;
pub use cache::{CacheKeyInput, CacheStats, MotionClipCache};
pub use engine::MotionEngine;
pub use filter::ClipGeometry;
pub use presets::{Easing, MotionPreset, PresetLibrary};
