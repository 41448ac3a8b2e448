//! Beatreel Common Utilities
//!
//! Shared infrastructure for all Beatreel crates:
//! - Error types and result aliases
//! - Deadline and stall clocks for bounded subprocess runs
//! - SHA-256 and canonical JSON hashing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod hashing;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
