//! Shared fixtures for the integration tests.
//!
//! - [`RecordingFactory`] / [`RecordingProgram`]: a shading program that
//!   logs every parameter and feature write.
//! - [`MockCompute`]: a compute capability with configurable thread-group
//!   sizes and optionally missing kernels.
//! - [`CpuExecutor`]: replays a [`CommandList`] on small RGBA images so
//!   tests can compare actual pixel output.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use glam::{Mat4, UVec2, UVec3, Vec4};
use rustc_hash::FxHashMap;

use lightshafts::renderer::compute::{BlurKernel, ComputeKernels, KernelHandle};
use lightshafts::renderer::graph::{
    CommandList, FrameInfo, PhysicalTextureId, RenderCommand, TextureRef,
};
use lightshafts::renderer::program::{
    ParamValue, ProgramFactory, ProgramSource, ShadingProgram, SubPass,
};
use lightshafts::renderer::registry::{ParamId, ShaderIds};

pub const CAMERA_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn frame(width: u32, height: u32) -> FrameInfo {
    FrameInfo::new(width, height, CAMERA_FORMAT, Mat4::IDENTITY)
}

// ============================================================================
// Shading program
// ============================================================================

#[derive(Debug, Default)]
pub struct ProgramLog {
    pub created: Vec<ProgramSource>,
    pub params: Vec<(ParamId, ParamValue)>,
    pub features: Vec<(ParamId, bool)>,
}

impl ProgramLog {
    /// Last value written under `name`.
    pub fn param(&self, name: ParamId) -> Option<ParamValue> {
        self.params
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

pub struct RecordingProgram {
    log: Rc<RefCell<ProgramLog>>,
}

impl ShadingProgram for RecordingProgram {
    fn set_param(&mut self, name: ParamId, value: ParamValue) {
        self.log.borrow_mut().params.push((name, value));
    }

    fn set_feature(&mut self, flag: ParamId, enabled: bool) {
        self.log.borrow_mut().features.push((flag, enabled));
    }
}

pub struct RecordingFactory {
    pub log: Rc<RefCell<ProgramLog>>,
    available: bool,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self {
            log: Rc::default(),
            available: true,
        }
    }

    /// A factory whose programs never construct.
    pub fn failing() -> Self {
        Self {
            log: Rc::default(),
            available: false,
        }
    }
}

impl ProgramFactory for RecordingFactory {
    fn create_program(&self, source: &ProgramSource) -> Option<Box<dyn ShadingProgram>> {
        self.log.borrow_mut().created.push(source.clone());
        self.available.then(|| {
            Box::new(RecordingProgram {
                log: Rc::clone(&self.log),
            }) as Box<dyn ShadingProgram>
        })
    }
}

// ============================================================================
// Compute
// ============================================================================

pub struct MockCompute {
    group_sizes: [UVec3; 3],
    missing: Option<BlurKernel>,
}

impl MockCompute {
    pub fn new() -> Self {
        Self {
            group_sizes: [UVec3::new(8, 8, 1); 3],
            missing: None,
        }
    }

    pub fn with_group_size(mut self, kernel: BlurKernel, size: UVec3) -> Self {
        self.group_sizes[kernel_index(kernel)] = size;
        self
    }

    pub fn without(mut self, kernel: BlurKernel) -> Self {
        self.missing = Some(kernel);
        self
    }
}

fn kernel_index(kernel: BlurKernel) -> usize {
    BlurKernel::ALL
        .iter()
        .position(|k| *k == kernel)
        .unwrap_or_default()
}

impl ComputeKernels for MockCompute {
    fn find_kernel(&self, name: &str) -> Option<KernelHandle> {
        BlurKernel::ALL
            .iter()
            .copied()
            .filter(|k| Some(*k) != self.missing)
            .find(|k| k.name() == name)
            .map(|k| KernelHandle(kernel_index(k) as u32 + 100))
    }

    fn thread_group_size(&self, kernel: KernelHandle) -> UVec3 {
        self.group_sizes[(kernel.0 - 100) as usize]
    }
}

// ============================================================================
// CPU executor
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub size: UVec2,
    pub pixels: Vec<Vec4>,
}

impl Image {
    pub fn filled(size: UVec2, value: Vec4) -> Self {
        Self {
            size,
            pixels: vec![value; (size.x * size.y) as usize],
        }
    }

    /// A deterministic, non-uniform test pattern.
    pub fn pattern(size: UVec2) -> Self {
        let mut image = Self::filled(size, Vec4::ZERO);
        for y in 0..size.y {
            for x in 0..size.x {
                let fx = x as f32 / size.x as f32;
                let fy = y as f32 / size.y as f32;
                let spot = if (x / 4 + y / 3) % 5 == 0 { 1.0 } else { 0.0 };
                image.set(x, y, Vec4::new(fx, fy, spot, 1.0));
            }
        }
        image
    }

    pub fn get(&self, x: u32, y: u32) -> Vec4 {
        let x = x.min(self.size.x - 1);
        let y = y.min(self.size.y - 1);
        self.pixels[(y * self.size.x + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.size.x + x) as usize;
        self.pixels[index] = value;
    }

    /// Nearest sample at texel-space position `p` (clamped).
    pub fn sample(&self, p: glam::Vec2) -> Vec4 {
        let x = p.x.floor().max(0.0) as u32;
        let y = p.y.floor().max(0.0) as u32;
        self.get(x, y)
    }

    /// Nearest resample to `size`, mapping each target pixel to `f`.
    pub fn resample(&self, size: UVec2, f: impl Fn(glam::Vec2, Vec4) -> Vec4) -> Self {
        let mut out = Self::filled(size, Vec4::ZERO);
        let scale = self.size.as_vec2() / size.as_vec2();
        for y in 0..size.y {
            for x in 0..size.x {
                let uv = (glam::Vec2::new(x as f32, y as f32) + 0.5) / size.as_vec2();
                let p = (glam::Vec2::new(x as f32, y as f32) + 0.5) * scale;
                out.set(x, y, f(uv, self.sample(p)));
            }
        }
        out
    }

    /// Four-tap dual-filter stand-in: averages taps at `±offset` source
    /// texels around each target pixel's footprint centre.
    pub fn dual_sample(&self, size: UVec2, offset: f32) -> Self {
        let mut out = Self::filled(size, Vec4::ZERO);
        let scale = self.size.as_vec2() / size.as_vec2();
        for y in 0..size.y {
            for x in 0..size.x {
                let c = (glam::Vec2::new(x as f32, y as f32) + 0.5) * scale;
                let sum = self.sample(c + glam::Vec2::new(-offset, -offset))
                    + self.sample(c + glam::Vec2::new(offset, -offset))
                    + self.sample(c + glam::Vec2::new(-offset, offset))
                    + self.sample(c + glam::Vec2::new(offset, offset));
                out.set(x, y, sum * 0.25);
            }
        }
        out
    }

    pub fn max_abs_diff(&self, other: &Self) -> f32 {
        assert_eq!(self.size, other.size, "image sizes differ");
        self.pixels
            .iter()
            .zip(&other.pixels)
            .map(|(a, b)| (*a - *b).abs().max_element())
            .fold(0.0, f32::max)
    }
}

/// Replays recorded commands on CPU images.
///
/// Sub-pass stand-ins:
/// - `LightContribution`: half the source color
/// - `LowResDepth`: source red channel
/// - `Composite`: source plus the `_LightShaftTex` global
///
/// Pooled textures keep their contents across releases and frames, like
/// GPU memory would.
pub struct CpuExecutor {
    pub camera_color: Image,
    pub camera_depth: Image,
    pooled: FxHashMap<PhysicalTextureId, Image>,
    globals: FxHashMap<ParamId, TextureRef>,
    ids: ShaderIds,
    black: Image,
}

impl CpuExecutor {
    pub fn new(ids: ShaderIds, camera_color: Image) -> Self {
        let size = camera_color.size;
        Self {
            camera_color,
            camera_depth: Image::filled(size, Vec4::splat(0.5)),
            pooled: FxHashMap::default(),
            globals: FxHashMap::default(),
            ids,
            black: Image::filled(UVec2::ONE, Vec4::ZERO),
        }
    }

    pub fn image(&self, texture: TextureRef) -> &Image {
        match texture {
            TextureRef::CameraColor => &self.camera_color,
            TextureRef::CameraDepth => &self.camera_depth,
            TextureRef::Pooled(id) => self
                .pooled
                .get(&id)
                .unwrap_or_else(|| panic!("texture {id:?} was never allocated")),
            TextureRef::External(_) | TextureRef::Black => &self.black,
        }
    }

    fn image_mut(&mut self, texture: TextureRef) -> &mut Image {
        match texture {
            TextureRef::CameraColor => &mut self.camera_color,
            TextureRef::CameraDepth => &mut self.camera_depth,
            TextureRef::Pooled(id) => self
                .pooled
                .get_mut(&id)
                .unwrap_or_else(|| panic!("texture {id:?} was never allocated")),
            other => panic!("cannot write to {other:?}"),
        }
    }

    /// Image currently bound as global `name`.
    pub fn global(&self, name: ParamId) -> Option<&Image> {
        self.globals.get(&name).map(|t| self.image(*t))
    }

    pub fn run(&mut self, cmd: &CommandList) {
        for command in cmd {
            match command {
                RenderCommand::BeginSample(_) | RenderCommand::EndSample(_) => {}
                RenderCommand::AllocateTarget { id, texture, desc } => {
                    self.pooled
                        .entry(*texture)
                        .or_insert_with(|| Image::filled(desc.size(), Vec4::ZERO));
                    self.globals.insert(id.name(), TextureRef::Pooled(*texture));
                }
                RenderCommand::ReleaseTarget { id, .. } => {
                    self.globals.remove(&id.name());
                }
                RenderCommand::SetGlobalTexture { name, texture } => {
                    self.globals.insert(*name, *texture);
                }
                RenderCommand::Blit {
                    source,
                    target,
                    pass,
                } => {
                    let size = self.image(*target).size;
                    let src = self.image(*source);
                    let out = match pass {
                        None => src.resample(size, |_, c| c),
                        Some(SubPass::LightContribution) => src.resample(size, |_, c| c * 0.5),
                        Some(SubPass::LowResDepth) => {
                            src.resample(size, |_, c| Vec4::new(c.x, 0.0, 0.0, 1.0))
                        }
                        Some(SubPass::Composite) => {
                            let shafts = self
                                .global(self.ids.light_shaft_tex)
                                .unwrap_or(&self.black);
                            src.resample(size, |uv, c| c + shafts.sample(uv * shafts.size.as_vec2()))
                        }
                    };
                    *self.image_mut(*target) = out;
                }
                RenderCommand::Dispatch(dispatch) => {
                    let source = dispatch.source().expect("dispatch without source");
                    let target = dispatch.target().expect("dispatch without target");
                    let size = self.image(target).size;
                    let out = match dispatch.kernel {
                        BlurKernel::DownSample | BlurKernel::UpSample => self
                            .image(source)
                            .dual_sample(size, dispatch.uniforms.blur_offset),
                        BlurKernel::Lerp => {
                            let ratio = dispatch.uniforms.blur_offset;
                            let src = self.image(source);
                            let mut dst = self.image(target).clone();
                            for (d, s) in dst.pixels.iter_mut().zip(&src.pixels) {
                                *d = *d * (1.0 - ratio) + *s * ratio;
                            }
                            dst
                        }
                    };
                    *self.image_mut(target) = out;
                }
            }
        }
    }
}
