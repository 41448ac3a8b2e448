//! Ken Burns motion presets.
//!
//! A preset interpolates zoom and the visible-window center from a start to
//! an end value along an easing curve. Centers are normalized to the source
//! frame; `(0.5, 0.5)` is the middle.

use serde::{Deserialize, Serialize};

use beatreel_common::error::{BeatreelError, BeatreelResult};

/// Allowed zoom range for preset endpoints.
pub const ZOOM_RANGE: (f64, f64) = (0.5, 2.0);

/// Easing curve applied to normalized clip progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// The curve as an ffmpeg expression over progress `p` in `[0, 1]`.
    pub fn expr(self, p: &str) -> String {
        match self {
            Easing::Linear => p.to_string(),
            Easing::EaseIn => format!("{p}*{p}"),
            Easing::EaseOut => format!("1-(1-{p})*(1-{p})"),
            Easing::EaseInOut => format!("if(lt({p},0.5),2*{p}*{p},1-pow(-2*{p}+2,2)/2)"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::EaseIn => "ease_in",
            Easing::EaseOut => "ease_out",
            Easing::EaseInOut => "ease_in_out",
        }
    }
}

/// An immutable zoom/pan path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MotionPreset {
    name: String,
    start_zoom: f64,
    end_zoom: f64,
    pan_start: (f64, f64),
    pan_end: (f64, f64),
    easing: Easing,
}

impl MotionPreset {
    /// Build a preset, rejecting zooms outside [`ZOOM_RANGE`] and pan
    /// centers outside the unit square.
    pub fn new(
        name: impl Into<String>,
        (start_zoom, end_zoom): (f64, f64),
        pan_start: (f64, f64),
        pan_end: (f64, f64),
        easing: Easing,
    ) -> BeatreelResult<Self> {
        let name = name.into();
        for zoom in [start_zoom, end_zoom] {
            if !zoom.is_finite() || zoom < ZOOM_RANGE.0 || zoom > ZOOM_RANGE.1 {
                return Err(BeatreelError::validation(format!(
                    "preset '{name}': zoom {zoom} outside [{}, {}]",
                    ZOOM_RANGE.0, ZOOM_RANGE.1
                )));
            }
        }
        for v in [pan_start.0, pan_start.1, pan_end.0, pan_end.1] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(BeatreelError::validation(format!(
                    "preset '{name}': pan coordinate {v} outside [0, 1]"
                )));
            }
        }
        Ok(Self {
            name,
            start_zoom,
            end_zoom,
            pan_start,
            pan_end,
            easing,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zoom(&self) -> (f64, f64) {
        (self.start_zoom, self.end_zoom)
    }

    pub fn pan(&self) -> ((f64, f64), (f64, f64)) {
        (self.pan_start, self.pan_end)
    }

    pub fn easing(&self) -> Easing {
        self.easing
    }
}

/// The built-in preset set, created once and shared read-only.
#[derive(Debug, Clone)]
pub struct PresetLibrary {
    presets: Vec<MotionPreset>,
}

impl PresetLibrary {
    /// Built-in presets.
    pub fn builtin() -> Self {
        let defs: [(&str, (f64, f64), (f64, f64), (f64, f64), Easing); 10] = [
            ("static", (1.0, 1.0), (0.5, 0.5), (0.5, 0.5), Easing::Linear),
            ("zoom_in", (1.0, 1.25), (0.5, 0.5), (0.5, 0.5), Easing::EaseInOut),
            ("zoom_out", (1.25, 1.0), (0.5, 0.5), (0.5, 0.5), Easing::EaseInOut),
            ("pan_left", (1.15, 1.15), (0.65, 0.5), (0.35, 0.5), Easing::Linear),
            ("pan_right", (1.15, 1.15), (0.35, 0.5), (0.65, 0.5), Easing::Linear),
            ("pan_up", (1.15, 1.15), (0.5, 0.65), (0.5, 0.35), Easing::Linear),
            ("pan_down", (1.15, 1.15), (0.5, 0.35), (0.5, 0.65), Easing::Linear),
            ("zoom_in_left", (1.0, 1.3), (0.5, 0.5), (0.35, 0.45), Easing::EaseOut),
            ("zoom_in_right", (1.0, 1.3), (0.5, 0.5), (0.65, 0.45), Easing::EaseOut),
            ("drift", (1.05, 1.12), (0.45, 0.52), (0.55, 0.48), Easing::EaseInOut),
        ];

        let presets = defs
            .into_iter()
            .filter_map(|(name, zoom, start, end, easing)| {
                MotionPreset::new(name, zoom, start, end, easing).ok()
            })
            .collect();
        Self { presets }
    }

    /// Look up a preset by name.
    pub fn get(&self, name: &str) -> BeatreelResult<&MotionPreset> {
        self.presets.iter().find(|p| p.name == name).ok_or_else(|| {
            BeatreelError::validation(format!(
                "unknown motion preset '{name}' (available: {})",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.presets.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MotionPreset> {
        self.presets.iter()
    }
}

impl Default for PresetLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}
