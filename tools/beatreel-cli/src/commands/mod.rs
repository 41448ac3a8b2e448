pub mod cache;
pub mod check;
pub mod compile;
pub mod motion;
pub mod presets;
pub mod render;
pub mod verify;
