//! Parameter Binder
//!
//! Pushes the per-frame uniforms of the light-shaft program in one go. The
//! binder builds a [`ParameterBlock`] (an ordered list of name/value pairs)
//! from [`PassSettings`] and the [`FrameContext`], then writes it into the
//! program. It must run before any sub-pass that reads these parameters.
//!
//! | Parameter | Value |
//! |-----------|-------|
//! | `_StepCount`, `_MaxDistance`, `_HGCoff` | ray-march settings |
//! | `_TransmittanceFactor`, `_HeightFromSeaLevel` | medium settings |
//! | `_LightShaftColor`, `_Brightness` | tint |
//! | `_TexParams` | low-res size as `(w, h, 1/w, 1/h)` |
//! | `_BlueNoiseTex` | dither texture, black when unset |
//! | `_Transparent*` | transparent tinting settings |
//! | `_ViewProjection`, `_PrevViewProjection` | reprojection matrices |

use glam::{UVec2, Vec4};
use smallvec::SmallVec;

use crate::renderer::graph::commands::TextureRef;
use crate::renderer::graph::frame::FrameContext;
use crate::renderer::program::{ParamValue, ShadingProgram};
use crate::renderer::registry::{ParamId, ShaderIds};
use crate::resources::light_shaft::PassSettings;

/// Packs a texture size as `(width, height, 1/width, 1/height)`.
///
/// A zero dimension yields a zero reciprocal instead of infinity.
#[inline]
#[must_use]
pub fn texel_size_params(size: UVec2) -> Vec4 {
    let recip = |v: u32| if v == 0 { 0.0 } else { 1.0 / v as f32 };
    Vec4::new(size.x as f32, size.y as f32, recip(size.x), recip(size.y))
}

/// Ordered uniform values for one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterBlock {
    values: SmallVec<[(ParamId, ParamValue); 16]>,
}

impl ParameterBlock {
    #[inline]
    pub fn push(&mut self, name: ParamId, value: ParamValue) {
        self.values.push((name, value));
    }

    /// Last value pushed under `name`.
    #[must_use]
    pub fn get(&self, name: ParamId) -> Option<ParamValue> {
        self.values
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(ParamId, ParamValue)> {
        self.values.iter()
    }

    /// Writes every value into `program`, in push order.
    pub fn apply(&self, program: &mut dyn ShadingProgram) {
        for (name, value) in &self.values {
            program.set_param(*name, *value);
        }
    }
}

/// Builds and applies the light-shaft program's parameter block.
#[derive(Clone, Copy, Debug)]
pub struct ParameterBinder {
    ids: ShaderIds,
}

impl ParameterBinder {
    #[must_use]
    pub fn new(ids: ShaderIds) -> Self {
        Self { ids }
    }

    #[must_use]
    pub fn block(&self, settings: &PassSettings, frame: &FrameContext) -> ParameterBlock {
        let ids = &self.ids;
        let transparent = &settings.transparent;
        let blue_noise = settings
            .blue_noise
            .map_or(TextureRef::Black, TextureRef::External);

        let mut block = ParameterBlock::default();
        block.push(
            ids.step_count,
            ParamValue::Int(i32::try_from(settings.step_count).unwrap_or(i32::MAX)),
        );
        block.push(ids.max_distance, ParamValue::Float(settings.max_distance));
        block.push(ids.hg_coefficient, ParamValue::Float(settings.hg_coefficient));
        block.push(
            ids.transmittance_factor,
            ParamValue::Float(settings.transmittance_factor),
        );
        block.push(
            ids.height_from_sea_level,
            ParamValue::Float(settings.height_from_sea_level),
        );
        block.push(ids.brightness, ParamValue::Float(settings.brightness));
        block.push(
            ids.light_shaft_color,
            ParamValue::Color(settings.light_shaft_color),
        );
        block.push(
            ids.tex_params,
            ParamValue::Vector(texel_size_params(frame.low_res_size)),
        );
        block.push(ids.blue_noise_tex, ParamValue::Texture(blue_noise));

        block.push(
            ids.transparent_step_count,
            ParamValue::Int(i32::try_from(transparent.step_count).unwrap_or(i32::MAX)),
        );
        block.push(
            ids.transparent_max_distance,
            ParamValue::Float(transparent.max_distance),
        );
        block.push(
            ids.transparent_color_intensity,
            ParamValue::Float(transparent.color_intensity),
        );

        block.push(ids.view_projection, ParamValue::Matrix(frame.view_projection));
        block.push(
            ids.prev_view_projection,
            ParamValue::Matrix(frame.previous_view_projection),
        );
        block
    }

    /// Builds the block for this frame and writes it into `program`.
    pub fn bind(
        &self,
        program: &mut dyn ShadingProgram,
        settings: &PassSettings,
        frame: &FrameContext,
    ) -> ParameterBlock {
        let block = self.block(settings, frame);
        block.apply(program);
        log::trace!("bound {} light shaft parameters", block.len());
        block
    }
}
