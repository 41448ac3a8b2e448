//! Ken Burns filter expressions.
//!
//! The source is upscaled to twice the target size so sub-pixel pan steps
//! stay smooth, driven through `zoompan` one output frame per input frame
//! (`on` is the frame counter), then scaled back down with a fixed SAR,
//! frame rate and pixel format.

use super::presets::MotionPreset;

/// Output geometry of a motion clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl ClipGeometry {
    /// `"WxH"`, as used in cache keys.
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    /// Frames needed to cover `duration_ms` (at least one).
    pub fn frame_count(&self, duration_ms: u64) -> u64 {
        ((duration_ms as f64 * self.fps as f64 / 1000.0).round() as u64).max(1)
    }
}

/// Beat pulse shape in frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseShape {
    pub amplitude: f64,
    pub decay_frames: u64,
}

/// Normalized clip progress as an expression over `on`.
fn progress_expr(frames: u64) -> String {
    if frames <= 1 {
        return "0".to_string();
    }
    format!("min(1,on/{})", frames - 1)
}

/// Additive zoom term: one decaying pulse per beat frame.
pub fn beat_pulse_expr(pulse_frames: &[u64], shape: PulseShape) -> Option<String> {
    if pulse_frames.is_empty() || shape.amplitude == 0.0 {
        return None;
    }
    let decay = shape.decay_frames.max(1);
    let terms: Vec<String> = pulse_frames
        .iter()
        .map(|&bf| {
            format!(
                "if(between(on,{bf},{end}),{amp:.6}*exp(-3*(on-{bf})/{decay}),0)",
                end = bf + decay,
                amp = shape.amplitude,
            )
        })
        .collect();
    Some(terms.join("+"))
}

/// Zoom expression: eased preset zoom, damped by `strength`, plus pulses.
pub fn zoom_expr(preset: &MotionPreset, strength: f64, frames: u64, pulses: Option<&str>) -> String {
    let (z0, z1) = preset.zoom();
    let eased = preset.easing().expr(&format!("({})", progress_expr(frames)));
    let base = format!(
        "1+(({z0:.6}+({dz:.6})*({eased}))-1)*{strength:.6}",
        dz = z1 - z0,
    );
    match pulses {
        Some(pulses) => format!("max(1,{base}+{pulses})"),
        None => format!("max(1,{base})"),
    }
}

/// Pan expression for one axis. `axis` is 0 for x, 1 for y.
fn pan_expr(preset: &MotionPreset, strength: f64, frames: u64, axis: usize) -> String {
    let (start, end) = preset.pan();
    let (c0, c1) = if axis == 0 {
        (start.0, end.0)
    } else {
        (start.1, end.1)
    };
    let dim = if axis == 0 { "iw" } else { "ih" };
    let eased = preset.easing().expr(&format!("({})", progress_expr(frames)));
    let center = format!("0.5+(({c0:.6}+({dc:.6})*({eased}))-0.5)*{strength:.6}", dc = c1 - c0);
    format!("min(max(0,{dim}*({center})-{dim}/zoom/2),{dim}-{dim}/zoom)")
}

/// Full `-vf` chain for one Ken Burns clip.
pub fn ken_burns_filter(
    preset: &MotionPreset,
    strength: f64,
    geometry: ClipGeometry,
    duration_ms: u64,
    pulse_frames: &[u64],
    shape: PulseShape,
    pixel_format: &str,
) -> String {
    let frames = geometry.frame_count(duration_ms);
    let (w2, h2) = (geometry.width * 2, geometry.height * 2);
    let pulses = beat_pulse_expr(pulse_frames, shape);

    format!(
        "scale={w2}:{h2}:force_original_aspect_ratio=increase,crop={w2}:{h2},\
zoompan=z='{z}':x='{x}':y='{y}':d=1:s={w2}x{h2}:fps={fps},\
scale={w}:{h}:flags=lanczos,setsar=1,fps={fps},format={pixel_format}",
        z = zoom_expr(preset, strength, frames, pulses.as_deref()),
        x = pan_expr(preset, strength, frames, 0),
        y = pan_expr(preset, strength, frames, 1),
        fps = geometry.fps,
        w = geometry.width,
        h = geometry.height,
    )
}
