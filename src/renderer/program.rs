//! Shading-Program Capability
//!
//! The light-scattering math lives in a host-compiled shading program that
//! exposes several fixed sub-passes. The pass never inspects that program:
//! it pushes named parameters, toggles feature flags and selects a
//! [`SubPass`] when recording a blit.

use glam::{Mat4, Vec4};

use crate::renderer::graph::commands::TextureRef;
use crate::renderer::registry::ParamId;

/// Name of the program the host builds when no custom source is configured.
pub const BUILTIN_PROGRAM_NAME: &str = "LightShaft";

/// Named sub-passes of the light-shaft program.
///
/// The discriminant is the index the host program uses for the pass.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u32)]
pub enum SubPass {
    /// Ray-marches the scattering contribution into the light-shaft buffer.
    LightContribution = 0,
    /// Combines the working color, blurred shafts and low-res depth into
    /// the camera target.
    Composite = 1,
    /// Downsamples scene depth into the low-res depth buffer.
    LowResDepth = 2,
}

impl SubPass {
    pub const ALL: [Self; 3] = [Self::LightContribution, Self::Composite, Self::LowResDepth];

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::LightContribution => "LightContribution",
            Self::Composite => "Composite",
            Self::LowResDepth => "LowResDepth",
        }
    }
}

/// A uniform value pushed into a program.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    /// Linear RGBA.
    Color(Vec4),
    Vector(Vec4),
    Matrix(Mat4),
    Texture(TextureRef),
}

/// Where the program comes from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ProgramSource {
    /// The engine's built-in light-shaft program.
    Builtin,
    /// A user-supplied program, by asset name.
    Custom(String),
}

impl ProgramSource {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin => BUILTIN_PROGRAM_NAME,
            Self::Custom(name) => name,
        }
    }
}

/// A constructed shading-program instance.
pub trait ShadingProgram {
    /// Sets a named uniform.
    fn set_param(&mut self, name: ParamId, value: ParamValue);

    /// Enables or disables a compile-time feature variant.
    fn set_feature(&mut self, flag: ParamId, enabled: bool);
}

/// Host service that builds programs from a source.
pub trait ProgramFactory {
    /// Returns `None` if the program cannot be constructed.
    fn create_program(&self, source: &ProgramSource) -> Option<Box<dyn ShadingProgram>>;
}
