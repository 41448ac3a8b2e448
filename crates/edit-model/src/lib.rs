//! Beatreel Edit Model
//!
//! Defines the data contracts exchanged by the render pipeline:
//! - **Edit:** the authored edit description (segments, defaults, audio)
//! - **Beat grid:** pre-computed beat and downbeat timestamps
//! - **Assets:** the asset manifest shared by compiler and assembler
//! - **EDL:** the fully time-resolved edit decision list
//! - **Render:** render plans and the terminal render manifest
//!
//! All timeline positions are integer milliseconds. Beat grid timestamps
//! stay in seconds as produced by the analyzer.

pub mod assets;
pub mod beat_grid;
pub mod edit;
pub mod edl;
pub mod error;
pub mod render;

pub use assets::*;
pub use beat_grid::*;
pub use edit::*;
pub use edl::*;
pub use error::*;
pub use render::*;
