//! Beatreel Timeline Compiler
//!
//! Turns an authored edit description into an Edit Decision List with
//! millisecond-exact timing:
//! - **Duration:** explicit ms, beats at the effective BPM, or natural length
//! - **Transitions:** clamped overlap between adjacent segments
//! - **Audio fit:** trim or repeat the sequence to end with the soundtrack
//! - **Hash:** content hash independent of generation time
//! - **Beat sources:** locate an analyzer grid, or synthesize one
//!
//! The compiler itself is pure computation: no I/O, no subprocesses.
//! `beat_source` is the only module that touches the filesystem.

pub mod audio_fit;
pub mod beat_source;
pub mod compiler;
pub mod duration;
pub mod hash;
pub mod transitions;

pub use beat_source::{BeatGridChain, BeatGridSource, FixedTempoSource, SidecarGridSource};
pub use compiler::{CompilerConfig, TimelineCompiler};
pub use transitions::expected_total_duration_ms;
