//! Per-Camera Frame State
//!
//! [`FrameInfo`] is what the host hands to a camera pass each frame;
//! [`FrameContext`] is what the light-shaft pass derives from it in Setup.
//! A context lives from Setup to Cleanup and is then discarded.

use glam::{Mat4, UVec2};

use crate::renderer::graph::commands::TextureRef;
use crate::resources::light_shaft::DownSample;

/// Descriptor of the camera's color target.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CameraTargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl CameraTargetDesc {
    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }
}

/// Host input for one camera's frame.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FrameInfo {
    pub camera: CameraTargetDesc,
    pub view_projection: Mat4,
}

impl FrameInfo {
    #[must_use]
    pub fn new(width: u32, height: u32, format: wgpu::TextureFormat, view_projection: Mat4) -> Self {
        Self {
            camera: CameraTargetDesc {
                width,
                height,
                format,
            },
            view_projection,
        }
    }
}

/// Resolution of the light-shaft buffers: `max(1, base / factor)` per axis.
#[inline]
#[must_use]
pub fn low_res_size(base: UVec2, down_sample: DownSample) -> UVec2 {
    (base / down_sample.factor()).max(UVec2::ONE)
}

/// State derived in Setup and consumed by Execute.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct FrameContext {
    pub camera_color: TextureRef,
    pub camera_depth: TextureRef,
    pub camera_format: wgpu::TextureFormat,
    /// Full camera resolution.
    pub base_size: UVec2,
    /// Resolution of the light-shaft, blur and low-res depth buffers.
    pub low_res_size: UVec2,
    pub view_projection: Mat4,
    /// Last frame's view-projection (this frame's on the first frame).
    pub previous_view_projection: Mat4,
}

impl FrameContext {
    #[must_use]
    pub fn new(info: &FrameInfo, down_sample: DownSample, previous_view_projection: Option<Mat4>) -> Self {
        let base_size = info.camera.size();
        Self {
            camera_color: TextureRef::CameraColor,
            camera_depth: TextureRef::CameraDepth,
            camera_format: info.camera.format,
            base_size,
            low_res_size: low_res_size(base_size, down_sample),
            view_projection: info.view_projection,
            previous_view_projection: previous_view_projection.unwrap_or(info.view_projection),
        }
    }
}
