//! Ken Burns clip rendering through the cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use beatreel_common::config::{EncoderConfig, MotionConfig};
use beatreel_common::error::{BeatreelError, BeatreelResult};
use beatreel_common::hashing::partial_content_hash;

use super::beat_sync::{decay_frames, BeatSync};
use super::cache::{CacheKeyInput, MotionClipCache};
use super::filter::{ken_burns_filter, ClipGeometry, PulseShape};
use super::presets::PresetLibrary;
use crate::command::FfmpegCommand;
use crate::subprocess::CommandRunner;

/// Renders still images into motion clips, at most once per cache key.
pub struct MotionEngine {
    presets: PresetLibrary,
    cache: MotionClipCache,
    runner: Arc<dyn CommandRunner>,
    encoder: EncoderConfig,
    motion: MotionConfig,
}

impl MotionEngine {
    pub fn new(
        cache: MotionClipCache,
        runner: Arc<dyn CommandRunner>,
        encoder: EncoderConfig,
        motion: MotionConfig,
    ) -> Self {
        Self {
            presets: PresetLibrary::builtin(),
            cache,
            runner,
            encoder,
            motion,
        }
    }

    pub fn presets(&self) -> &PresetLibrary {
        &self.presets
    }

    pub fn cache(&self) -> &MotionClipCache {
        &self.cache
    }

    /// Cache key for a clip request, without rendering anything.
    pub fn cache_key(
        &self,
        image: &Path,
        preset: &str,
        duration_ms: u64,
        geometry: ClipGeometry,
        beat_sync: &BeatSync<'_>,
        strength: f64,
    ) -> BeatreelResult<String> {
        CacheKeyInput {
            content_hash: partial_content_hash(image)?,
            preset: preset.to_string(),
            duration_ms,
            resolution: geometry.resolution(),
            fps: geometry.fps,
            beat_sync: beat_sync.key_label(duration_ms, geometry.fps),
            strength: CacheKeyInput::format_strength(strength),
        }
        .key()
    }

    /// Path of a clip of `image` moved by `preset`, rendering it on a miss.
    ///
    /// Inputs are validated before any subprocess runs. A failed render
    /// leaves the cache untouched and returns the runner's error.
    pub fn render_with_cache(
        &self,
        image: &Path,
        preset_name: &str,
        duration_ms: u64,
        geometry: ClipGeometry,
        beat_sync: &BeatSync<'_>,
        strength: f64,
    ) -> BeatreelResult<PathBuf> {
        let preset = self.presets.get(preset_name)?;
        validate_request(image, duration_ms, geometry, strength)?;

        let key = self.cache_key(image, preset_name, duration_ms, geometry, beat_sync, strength)?;
        if let Some(path) = self.cache.lookup(&key)? {
            debug!(key = %key, preset = preset_name, "Motion clip cache hit");
            return Ok(path);
        }

        let pulse_frames = beat_sync.pulse_frames(duration_ms, geometry.fps);
        let shape = PulseShape {
            amplitude: self.motion.pulse_amplitude,
            decay_frames: decay_frames(self.motion.pulse_decay_ms, geometry.fps),
        };
        let filter = ken_burns_filter(
            preset,
            strength,
            geometry,
            duration_ms,
            &pulse_frames,
            shape,
            &self.encoder.pixel_format,
        );
        let frames = geometry.frame_count(duration_ms);

        info!(
            key = %key,
            preset = preset_name,
            duration_ms,
            pulses = pulse_frames.len(),
            "Rendering motion clip"
        );

        self.cache.store_with(&key, |tmp| {
            let mut cmd = FfmpegCommand::new(&self.encoder.ffmpeg);
            cmd.looped_image(image, geometry.fps, duration_ms)
                .video_filter(filter)
                .frames(frames)
                .no_audio()
                .deterministic_video(&self.encoder)
                .deterministic_container()
                .output(tmp);

            self.runner.run(
                &cmd,
                duration_ms,
                &mut |percent| debug!(percent, "Motion clip progress"),
                self.encoder.timeout_secs,
            )
        })
    }
}

fn validate_request(
    image: &Path,
    duration_ms: u64,
    geometry: ClipGeometry,
    strength: f64,
) -> BeatreelResult<()> {
    if duration_ms == 0 {
        return Err(BeatreelError::validation("motion clip duration must be positive"));
    }
    if !strength.is_finite() || !(0.0..=1.0).contains(&strength) {
        return Err(BeatreelError::validation(format!(
            "motion strength must be within [0, 1], got {strength}"
        )));
    }
    if geometry.fps == 0 || geometry.width == 0 || geometry.height == 0 {
        return Err(BeatreelError::validation(format!(
            "invalid clip geometry {}@{}",
            geometry.resolution(),
            geometry.fps
        )));
    }
    if geometry.width % 2 != 0 || geometry.height % 2 != 0 {
        return Err(BeatreelError::validation(format!(
            "clip resolution {} must be even for yuv420p",
            geometry.resolution()
        )));
    }
    if !image.is_file() {
        return Err(BeatreelError::MissingAsset {
            path: image.to_path_buf(),
        });
    }
    Ok(())
}
