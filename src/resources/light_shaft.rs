//! Light-Shaft Configuration
//!
//! Pure data describing one light-shaft pass: ray-march quality, scattering
//! response, tint, blur radius and the optional transparent-color tinting.
//! Nothing here touches the GPU; the pass reads a [`PassSettings`] at
//! construction and binds it once per camera in Setup.
//!
//! Settings are usually authored in an editor and stored as JSON:
//!
//! ```rust,ignore
//! let settings = PassSettings::from_json_str(r#"{
//!     "down_sample": "half",
//!     "blur_intensity": 0.5,
//!     "transparent": { "enabled": false }
//! }"#)?;
//! assert_eq!(settings.effective_blur_radius(), 16.0);
//! ```
//!
//! Fields left out of the JSON keep their defaults.
//!
//! # Ranges
//!
//! | Field | Range |
//! |-------|-------|
//! | `step_count`, `transparent.step_count` | `1..=16` |
//! | `max_distance`, `transparent.max_distance` | `0..=1000` |
//! | `hg_coefficient` | `-1..=1` |
//! | `transmittance_factor` | `0..=1` |
//! | `height_from_sea_level` | `0..=1200` |
//! | `brightness` | `0..=2` |
//! | `blur_intensity` | `0..=1` |
//! | `blur_max_radius` | `0..=255` |
//! | `transparent.color_intensity` | `0..=5` |

use std::ops::RangeInclusive;
use std::path::Path;

use glam::Vec4;
use serde::{Deserialize, Serialize};

use crate::errors::{LightShaftError, Result};
use crate::renderer::graph::commands::ExternalTextureId;
use crate::renderer::graph::stage::RenderPassEvent;
use crate::renderer::program::ProgramSource;

const STEP_RANGE: RangeInclusive<u32> = 1..=16;
const DISTANCE_RANGE: RangeInclusive<f32> = 0.0..=1000.0;
const HG_RANGE: RangeInclusive<f32> = -1.0..=1.0;
const TRANSMITTANCE_RANGE: RangeInclusive<f32> = 0.0..=1.0;
const HEIGHT_RANGE: RangeInclusive<f32> = 0.0..=1200.0;
const BRIGHTNESS_RANGE: RangeInclusive<f32> = 0.0..=2.0;
const BLUR_INTENSITY_RANGE: RangeInclusive<f32> = 0.0..=1.0;
const BLUR_RADIUS_RANGE: RangeInclusive<f32> = 0.0..=255.0;
const COLOR_INTENSITY_RANGE: RangeInclusive<f32> = 0.0..=5.0;

// ============================================================================
// DownSample
// ============================================================================

/// Resolution divisor of the light-shaft buffers relative to the camera.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum DownSample {
    #[default]
    Off = 1,
    Half = 2,
    Third = 3,
    Fourth = 4,
}

impl DownSample {
    #[inline]
    #[must_use]
    pub const fn factor(self) -> u32 {
        self as u32
    }
}

// ============================================================================
// TransparentSettings
// ============================================================================

/// Tinting of light shafts seen through transparent geometry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransparentSettings {
    /// Drives the `_TRANSPARENT_COLOR_ON` program feature.
    ///
    /// Default: `true`
    pub enabled: bool,
    /// Default: `8`
    pub step_count: u32,
    /// Default: `50.0`
    pub max_distance: f32,
    /// Default: `1.0`
    pub color_intensity: f32,
}

impl Default for TransparentSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            step_count: 8,
            max_distance: 50.0,
            color_intensity: 1.0,
        }
    }
}

// ============================================================================
// PassSettings
// ============================================================================

/// Configuration of a light-shaft pass. Read-only while rendering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassSettings {
    /// Name of the profiling scope wrapping Execute.
    pub profiler_tag: String,
    /// Where the host schedules the pass.
    pub insertion_point: RenderPassEvent,
    /// Custom shading program asset. `None` selects the builtin program.
    pub program: Option<String>,
    /// Format of the light-shaft and blur buffers.
    pub light_shaft_format: wgpu::TextureFormat,

    pub down_sample: DownSample,
    /// Ray-march steps per pixel.
    pub step_count: u32,
    pub max_distance: f32,
    /// Henyey–Greenstein anisotropy.
    pub hg_coefficient: f32,
    pub transmittance_factor: f32,
    pub height_from_sea_level: f32,
    /// Dither texture for the ray-march start offset. Black when unset.
    pub blue_noise: Option<ExternalTextureId>,
    /// Linear RGBA tint.
    pub light_shaft_color: Vec4,
    pub brightness: f32,

    pub blur_intensity: f32,
    pub blur_max_radius: f32,

    pub transparent: TransparentSettings,
}

impl Default for PassSettings {
    fn default() -> Self {
        Self {
            profiler_tag: "LightShaft Pass".to_owned(),
            insertion_point: RenderPassEvent::AfterRenderingTransparents,
            program: None,
            light_shaft_format: wgpu::TextureFormat::Rgba16Float,
            down_sample: DownSample::Off,
            step_count: 16,
            max_distance: 400.0,
            hg_coefficient: 1.0,
            transmittance_factor: 0.0,
            height_from_sea_level: 0.0,
            blue_noise: None,
            light_shaft_color: Vec4::ONE,
            brightness: 1.0,
            blur_intensity: 1.0,
            blur_max_radius: 32.0,
            transparent: TransparentSettings::default(),
        }
    }
}

impl PassSettings {
    /// `blur_intensity × blur_max_radius`.
    #[inline]
    #[must_use]
    pub fn effective_blur_radius(&self) -> f32 {
        self.blur_intensity * self.blur_max_radius
    }

    #[must_use]
    pub fn program_source(&self) -> ProgramSource {
        match &self.program {
            Some(name) => ProgramSource::Custom(name.clone()),
            None => ProgramSource::Builtin,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every ranged field, reporting all violations at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        check_steps(&mut problems, "step_count", self.step_count);
        check(&mut problems, "max_distance", self.max_distance, &DISTANCE_RANGE);
        check(&mut problems, "hg_coefficient", self.hg_coefficient, &HG_RANGE);
        check(
            &mut problems,
            "transmittance_factor",
            self.transmittance_factor,
            &TRANSMITTANCE_RANGE,
        );
        check(
            &mut problems,
            "height_from_sea_level",
            self.height_from_sea_level,
            &HEIGHT_RANGE,
        );
        check(&mut problems, "brightness", self.brightness, &BRIGHTNESS_RANGE);
        check(
            &mut problems,
            "blur_intensity",
            self.blur_intensity,
            &BLUR_INTENSITY_RANGE,
        );
        check(
            &mut problems,
            "blur_max_radius",
            self.blur_max_radius,
            &BLUR_RADIUS_RANGE,
        );
        check_steps(
            &mut problems,
            "transparent.step_count",
            self.transparent.step_count,
        );
        check(
            &mut problems,
            "transparent.max_distance",
            self.transparent.max_distance,
            &DISTANCE_RANGE,
        );
        check(
            &mut problems,
            "transparent.color_intensity",
            self.transparent.color_intensity,
            &COLOR_INTENSITY_RANGE,
        );
        if self.profiler_tag.is_empty() {
            problems.push("profiler_tag is empty".to_owned());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(LightShaftError::InvalidSettings(problems.join("; ")))
        }
    }

    /// Copy with every ranged field clamped into range. NaN becomes the
    /// lower bound.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        out.step_count = clamp_steps(self.step_count);
        out.max_distance = clamp(self.max_distance, &DISTANCE_RANGE);
        out.hg_coefficient = clamp(self.hg_coefficient, &HG_RANGE);
        out.transmittance_factor = clamp(self.transmittance_factor, &TRANSMITTANCE_RANGE);
        out.height_from_sea_level = clamp(self.height_from_sea_level, &HEIGHT_RANGE);
        out.brightness = clamp(self.brightness, &BRIGHTNESS_RANGE);
        out.blur_intensity = clamp(self.blur_intensity, &BLUR_INTENSITY_RANGE);
        out.blur_max_radius = clamp(self.blur_max_radius, &BLUR_RADIUS_RANGE);
        out.transparent.step_count = clamp_steps(self.transparent.step_count);
        out.transparent.max_distance = clamp(self.transparent.max_distance, &DISTANCE_RANGE);
        out.transparent.color_intensity =
            clamp(self.transparent.color_intensity, &COLOR_INTENSITY_RANGE);
        out
    }
}

fn check(problems: &mut Vec<String>, field: &str, value: f32, range: &RangeInclusive<f32>) {
    if !range.contains(&value) {
        problems.push(format!(
            "{field} = {value} is outside [{}, {}]",
            range.start(),
            range.end()
        ));
    }
}

fn check_steps(problems: &mut Vec<String>, field: &str, value: u32) {
    if !STEP_RANGE.contains(&value) {
        problems.push(format!(
            "{field} = {value} is outside [{}, {}]",
            STEP_RANGE.start(),
            STEP_RANGE.end()
        ));
    }
}

#[inline]
fn clamp(value: f32, range: &RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}

#[inline]
fn clamp_steps(value: u32) -> u32 {
    value.clamp(*STEP_RANGE.start(), *STEP_RANGE.end())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = PassSettings::default();
        assert_eq!(s.profiler_tag, "LightShaft Pass");
        assert_eq!(s.down_sample.factor(), 1);
        assert_eq!(s.step_count, 16);
        assert_eq!(s.effective_blur_radius(), 32.0);
        assert!(s.transparent.enabled);
        assert_eq!(s.program_source(), ProgramSource::Builtin);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_down_sample_factors() {
        assert_eq!(DownSample::Half.factor(), 2);
        assert_eq!(DownSample::Third.factor(), 3);
        assert_eq!(DownSample::Fourth.factor(), 4);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let s = PassSettings {
            step_count: 0,
            brightness: 3.0,
            ..PassSettings::default()
        };
        let err = s.validate().unwrap_err().to_string();
        assert!(err.contains("step_count"));
        assert!(err.contains("brightness"));
    }

    #[test]
    fn test_clamped_is_valid() {
        let s = PassSettings {
            step_count: 40,
            hg_coefficient: -7.0,
            blur_intensity: f32::NAN,
            transparent: TransparentSettings {
                step_count: 0,
                ..TransparentSettings::default()
            },
            ..PassSettings::default()
        };
        let c = s.clamped();
        assert_eq!(c.step_count, 16);
        assert_eq!(c.hg_coefficient, -1.0);
        assert_eq!(c.blur_intensity, 0.0);
        assert_eq!(c.transparent.step_count, 1);
        assert!(c.validate().is_ok());
    }
}
