//! Beatreel Render Engine
//!
//! Turns a compiled EDL (or a shot-list render plan) into a delivered
//! video with captions and a hashed provenance manifest.
//!
//! # Pipeline Architecture
//!
//! ```text
//! still.png ──► MotionEngine ──► cache/ab/ab…cd.mp4 ──┐
//!                 (Ken Burns, beat pulses)            │
//! clip.mp4 ──────────────── -ss/-t ───────────────────┤
//! missing asset ──► placeholder.png ──────────────────┤
//!                                                     ▼
//!                                   filter_complex (normalize, concat/xfade)
//! song.wav ──── atrim ────────────────────────────────┤
//!                                                     ▼
//!                                  ffmpeg (bit-exact x264/aac, one process)
//!                                                     │
//!                                                     ▼
//!                          render.mp4 + captions.srt + render_output.json
//! ```
//!
//! Every encoder invocation goes through [`CommandRunner`]; the production
//! [`SubprocessOrchestrator`] enforces the wall-clock timeout by killing
//! the encoder's process group.

pub mod assembler;
pub mod captions;
pub mod command;
pub mod compositor;
pub mod media_info;
pub mod motion;
pub mod placeholder;
pub mod subprocess;

pub use assembler::{DeterministicAssembler, CAPTIONS_FILE, MANIFEST_FILE, VIDEO_FILE};
pub use captions::{generate_srt, CaptionCue};
pub use command::FfmpegCommand;
pub use motion::{BeatSync, ClipGeometry, MotionClipCache, MotionEngine, PresetLibrary};
pub use subprocess::{CommandRunner, ProgressTracker, SubprocessOrchestrator};
