//! Shader Parameter Registry
//!
//! Maps shader parameter / global texture names to compact integer ids.
//! Ids compare and hash in O(1), so render targets, uniforms and feature
//! flags are keyed by [`ParamId`] everywhere in the pass.
//!
//! The registry is an owned value: the [`TexturePool`] holds it, and the
//! pass hands out `&`/`&mut` references. There is no process-wide table.
//!
//! ```rust,ignore
//! let mut registry = ParamRegistry::new();
//! let a = registry.intern("_LightShaftTex");
//! let b = registry.intern("_LightShaftTex");
//! assert_eq!(a, b);
//! assert_eq!(registry.resolve(a), "_LightShaftTex");
//! ```
//!
//! [`TexturePool`]: crate::renderer::graph::TexturePool

use lasso::{Rodeo, Spur};

/// Compact identifier of an interned shader parameter name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ParamId(Spur);

/// Owned name → [`ParamId`] table.
#[derive(Debug, Default)]
pub struct ParamRegistry {
    names: Rodeo,
}

impl ParamRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            names: Rodeo::default(),
        }
    }

    /// Interns `name`, returning the existing id if it is already known.
    #[inline]
    pub fn intern(&mut self, name: &str) -> ParamId {
        ParamId(self.names.get_or_intern(name))
    }

    /// Looks up an already-interned name without allocating.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ParamId> {
        self.names.get(name).map(ParamId)
    }

    /// Resolves an id back to its name.
    ///
    /// # Panics
    /// Panics if `id` was produced by a different registry.
    #[inline]
    #[must_use]
    pub fn resolve(&self, id: ParamId) -> &str {
        self.names.resolve(&id.0)
    }

    /// Number of interned names.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ─── Well-known ids ───────────────────────────────────────────────────────────

/// Ids of every named parameter the light-shaft pass touches, interned once
/// at construction.
#[derive(Debug, Clone, Copy)]
pub struct ShaderIds {
    // Program uniforms
    pub step_count: ParamId,
    pub max_distance: ParamId,
    pub hg_coefficient: ParamId,
    pub transmittance_factor: ParamId,
    pub height_from_sea_level: ParamId,
    pub brightness: ParamId,
    pub light_shaft_color: ParamId,
    pub tex_params: ParamId,
    pub blue_noise_tex: ParamId,
    pub transparent_step_count: ParamId,
    pub transparent_max_distance: ParamId,
    pub transparent_color_intensity: ParamId,
    pub view_projection: ParamId,
    pub prev_view_projection: ParamId,

    // Program feature flags
    pub transparent_color_on: ParamId,

    // Global textures
    pub camera_color: ParamId,
    pub camera_depth: ParamId,
    pub source_tex: ParamId,
    pub light_shaft_tex: ParamId,
    pub low_res_depth_tex: ParamId,

    // Per-frame render targets
    pub working_color: ParamId,
    pub light_shaft_buffer: ParamId,
    pub low_res_depth_buffer: ParamId,
}

impl ShaderIds {
    /// Interns all well-known names into `registry`.
    pub fn new(registry: &mut ParamRegistry) -> Self {
        Self {
            step_count: registry.intern("_StepCount"),
            max_distance: registry.intern("_MaxDistance"),
            hg_coefficient: registry.intern("_HGCoff"),
            transmittance_factor: registry.intern("_TransmittanceFactor"),
            height_from_sea_level: registry.intern("_HeightFromSeaLevel"),
            brightness: registry.intern("_Brightness"),
            light_shaft_color: registry.intern("_LightShaftColor"),
            tex_params: registry.intern("_TexParams"),
            blue_noise_tex: registry.intern("_BlueNoiseTex"),
            transparent_step_count: registry.intern("_TransparentStepCounts"),
            transparent_max_distance: registry.intern("_TransparentMaxDistance"),
            transparent_color_intensity: registry.intern("_TransparentColorIntensity"),
            view_projection: registry.intern("_ViewProjection"),
            prev_view_projection: registry.intern("_PrevViewProjection"),

            transparent_color_on: registry.intern("_TRANSPARENT_COLOR_ON"),

            camera_color: registry.intern("_CameraColorTexture"),
            camera_depth: registry.intern("_CameraDepthTexture"),
            source_tex: registry.intern("_SourceTex"),
            light_shaft_tex: registry.intern("_LightShaftTex"),
            low_res_depth_tex: registry.intern("_LowResDepthTex"),

            working_color: registry.intern("_OddBuffer"),
            light_shaft_buffer: registry.intern("_EvenBuffer"),
            low_res_depth_buffer: registry.intern("_LowResDepthTexture"),
        }
    }
}
