//! Render Pass Insertion Points
//!
//! `RenderPassEvent` names the point in the host pipeline at which a camera
//! pass is queued, relative to the built-in rendering stages.

use serde::{Deserialize, Serialize};

/// Insertion point of a camera pass.
///
/// Variants are declared in execution order; the derived `Ord` is the order
/// in which a host runs passes queued at different events.
///
/// | Event | Runs |
/// |-------|------|
/// | `BeforeRendering` | before anything else for the camera |
/// | `BeforeRenderingShadows` / `AfterRenderingShadows` | around shadow maps |
/// | `BeforeRenderingPrePasses` / `AfterRenderingPrePasses` | around depth/normal prepass |
/// | `BeforeRenderingOpaques` / `AfterRenderingOpaques` | around opaque geometry |
/// | `BeforeRenderingSkybox` / `AfterRenderingSkybox` | around the skybox |
/// | `BeforeRenderingTransparents` / `AfterRenderingTransparents` | around translucent geometry |
/// | `BeforeRenderingPostProcessing` / `AfterRenderingPostProcessing` | around post effects |
/// | `AfterRendering` | after everything else |
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum RenderPassEvent {
    BeforeRendering = 0,
    BeforeRenderingShadows = 1,
    AfterRenderingShadows = 2,
    BeforeRenderingPrePasses = 3,
    AfterRenderingPrePasses = 4,
    BeforeRenderingOpaques = 5,
    AfterRenderingOpaques = 6,
    BeforeRenderingSkybox = 7,
    AfterRenderingSkybox = 8,
    BeforeRenderingTransparents = 9,
    /// Light shafts default here so translucent geometry is already in the
    /// color buffer when it is tinted.
    #[default]
    AfterRenderingTransparents = 10,
    BeforeRenderingPostProcessing = 11,
    AfterRenderingPostProcessing = 12,
    AfterRendering = 13,
}

impl RenderPassEvent {
    /// Returns the numeric index of the event (used for sorting).
    #[inline]
    #[must_use]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Event name (for debugging).
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BeforeRendering => "BeforeRendering",
            Self::BeforeRenderingShadows => "BeforeRenderingShadows",
            Self::AfterRenderingShadows => "AfterRenderingShadows",
            Self::BeforeRenderingPrePasses => "BeforeRenderingPrePasses",
            Self::AfterRenderingPrePasses => "AfterRenderingPrePasses",
            Self::BeforeRenderingOpaques => "BeforeRenderingOpaques",
            Self::AfterRenderingOpaques => "AfterRenderingOpaques",
            Self::BeforeRenderingSkybox => "BeforeRenderingSkybox",
            Self::AfterRenderingSkybox => "AfterRenderingSkybox",
            Self::BeforeRenderingTransparents => "BeforeRenderingTransparents",
            Self::AfterRenderingTransparents => "AfterRenderingTransparents",
            Self::BeforeRenderingPostProcessing => "BeforeRenderingPostProcessing",
            Self::AfterRenderingPostProcessing => "AfterRenderingPostProcessing",
            Self::AfterRendering => "AfterRendering",
        }
    }
}
