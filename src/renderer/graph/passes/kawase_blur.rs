//! Kawase Dual-Blur Pyramid
//!
//! Approximates a Gaussian blur of radius `R` by halving resolution a
//! number of times and upsampling back, blending the last step by the
//! fractional part of `log2(R + 1)` so the apparent radius changes
//! smoothly instead of popping at powers of two.
//!
//! # Schedule
//!
//! ```text
//! amount = log2(R + 1)
//! count  = floor(amount)        (capped at MAX_PYRAMID_DEPTH)
//! ratio  = amount - count       ∈ [0, 1)
//! ```
//!
//! # Levels
//!
//! ```text
//! index   name              size
//! ─────   ───────────────   ──────────────────────
//!   0     _KawaseRT         source size (scratch, holds the result)
//!   1     _KawaseRT0        half(source)
//!   2     _KawaseRT1        half(level 1)
//!   …
//! count+1 _KawaseRT{count}  coarsest
//! ```
//!
//! `count + 2` levels are allocated per invocation. When `count > 0` one
//! more target, `_KawaseRT{count+1}`, is allocated as the upsample
//! intermediate at the size of level `count`.
//!
//! # Passes
//!
//! 1. **Downsample** source → level 1 → … → level `count+1`, offset `1.0`.
//! 2. **Upsample**, two cases:
//!    - `count == 0`: level 1 → level 0, then blend source into level 0 by
//!      `ratio`.
//!    - otherwise: level `count+1` → intermediate, blend level `count` into
//!      the intermediate by `ratio` and swap the two (see [`DoubleBuffer`]),
//!      then level `i` → level `i-1` down to level 0.
//!
//! Each source level is released right after it is consumed, so at most
//! about two levels are live during the upsample walk. Level 0 is the only
//! allocation still live when [`KawaseBlur::record`] returns; the caller
//! releases it after copying the result out.
//!
//! Without a compute capability nothing is recorded or allocated.

use glam::UVec2;
use log::{debug, warn};
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::binding::texel_size_params;
use crate::renderer::compute::{BlurKernel, BlurKernels, ComputeKernels};
use crate::renderer::graph::commands::{
    Access, BlurUniforms, CommandList, DispatchCommand, TextureBinding,
};
use crate::renderer::graph::transient_pool::{
    RenderTarget, RenderTargetId, TargetDesc, TargetScope,
};
use crate::renderer::registry::ParamId;

/// Upper bound on the number of downsample steps.
pub const MAX_PYRAMID_DEPTH: u32 = 16;

/// Kernel offset used by every downsample and upsample dispatch.
pub const BLUR_OFFSET: f32 = 1.0;

/// Name of the level-0 scratch target. Level `k ≥ 1` is `_KawaseRT{k-1}`.
pub const SCRATCH_LEVEL_NAME: &str = "_KawaseRT";

// ─── Schedule ─────────────────────────────────────────────────────────────────

/// How many levels a blur of a given radius needs.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BlurSchedule {
    /// Effective radius after sanitising (finite, non-negative).
    pub radius: f32,
    /// Number of downsample steps beyond the first; `floor(log2(R + 1))`.
    pub count: u32,
    /// Fractional blend weight of the last upsample step, in `[0, 1)`.
    pub ratio: f32,
}

impl BlurSchedule {
    /// Builds the schedule for radius `radius`.
    ///
    /// Negative and non-finite radii are treated as `0`. Radii deep enough
    /// to exceed [`MAX_PYRAMID_DEPTH`] are capped with a zero blend.
    #[must_use]
    pub fn from_radius(radius: f32) -> Self {
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        let amount = (radius + 1.0).log2();
        let floor = amount.floor();

        if floor >= MAX_PYRAMID_DEPTH as f32 {
            return Self {
                radius,
                count: MAX_PYRAMID_DEPTH,
                ratio: 0.0,
            };
        }

        Self {
            radius,
            count: floor as u32,
            ratio: (amount - floor).clamp(0.0, 1.0 - f32::EPSILON),
        }
    }

    /// Pyramid levels allocated, including the level-0 scratch.
    #[inline]
    #[must_use]
    pub fn level_count(&self) -> u32 {
        self.count + 2
    }

    /// Whether the upsample walk needs the extra intermediate target.
    #[inline]
    #[must_use]
    pub fn uses_intermediate(&self) -> bool {
        self.count > 0
    }

    /// Every target allocated by one invocation.
    #[inline]
    #[must_use]
    pub fn total_allocations(&self) -> u32 {
        self.level_count() + u32::from(self.uses_intermediate())
    }

    /// Compute dispatches recorded by one invocation.
    #[inline]
    #[must_use]
    pub fn dispatch_count(&self) -> u32 {
        // downsamples + upsamples + one blend
        (self.count + 1) * 2 + 1
    }

    /// Size of every level, index 0 first.
    #[must_use]
    pub fn level_sizes(&self, base: UVec2) -> SmallVec<[UVec2; 18]> {
        let mut sizes = SmallVec::new();
        sizes.push(base);
        let mut size = base;
        for _ in 0..=self.count {
            size = half_size(size);
            sizes.push(size);
        }
        sizes
    }
}

/// Next pyramid level size: `((w + 1) / 2, (h + 1) / 2)`.
#[inline]
#[must_use]
pub fn half_size(size: UVec2) -> UVec2 {
    (size + UVec2::ONE) / 2
}

// ─── Double buffer ────────────────────────────────────────────────────────────

/// Two slots whose roles are exchanged with [`swap`](Self::swap).
///
/// The upsample walk writes its first result into `back` while `front`
/// still holds the coarse level it is blended against; after the blend the
/// pair is swapped so `front` is the blended result and `back` is the
/// retired level, which is released once the walk finishes.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DoubleBuffer<T> {
    front: T,
    back: T,
}

impl<T> DoubleBuffer<T> {
    #[inline]
    pub const fn new(front: T, back: T) -> Self {
        Self { front, back }
    }

    #[inline]
    pub const fn front(&self) -> &T {
        &self.front
    }

    #[inline]
    pub const fn back(&self) -> &T {
        &self.back
    }

    #[inline]
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.front, &mut self.back);
    }

}

// ─── Pass ─────────────────────────────────────────────────────────────────────

/// Result of one recorded blur.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BlurOutput {
    /// Level 0, still live. Holds the blurred image at the source size.
    pub result: RenderTarget,
    pub schedule: BlurSchedule,
    /// Pyramid levels allocated (`count + 2`).
    pub levels_allocated: u32,
    pub intermediate_allocated: bool,
    pub dispatches: u32,
}

/// Records the dual-blur pyramid into a [`TargetScope`].
///
/// Names are interned through the scope on every recording, so one
/// `KawaseBlur` can record into scopes over different pools.
pub struct KawaseBlur {
    kernels: Option<BlurKernels>,
}

/// Kernel texture slots, interned in the registry of the recording pool.
#[derive(Clone, Copy)]
struct KernelSlots {
    source_tex: ParamId,
    target_tex: ParamId,
}

impl KawaseBlur {
    /// Resolves the blur kernels from `compute`.
    ///
    /// A missing capability or kernel is logged once here; the blur then
    /// records nothing.
    pub fn new(compute: Option<&dyn ComputeKernels>) -> Self {
        let kernels = match compute.map(BlurKernels::resolve) {
            Some(Ok(kernels)) => Some(kernels),
            Some(Err(err)) => {
                warn!("{err}; light shafts will not be blurred");
                None
            }
            None => {
                warn!("No blur compute program assigned; light shafts will not be blurred");
                None
            }
        };

        Self { kernels }
    }

    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.kernels.is_some()
    }

    #[inline]
    #[must_use]
    pub fn kernels(&self) -> Option<&BlurKernels> {
        self.kernels.as_ref()
    }

    /// Records a blur of `source` with radius `radius`.
    ///
    /// Levels are allocated from `desc` resized per level. Returns `None`
    /// when the compute capability is unavailable.
    pub fn record(
        &self,
        scope: &mut TargetScope<'_>,
        source: &RenderTarget,
        desc: &TargetDesc,
        radius: f32,
    ) -> Result<Option<BlurOutput>> {
        let Some(kernels) = self.kernels else {
            return Ok(None);
        };

        let schedule = BlurSchedule::from_radius(radius);
        let count = schedule.count as usize;
        let slots = KernelSlots {
            source_tex: scope.param_id("_SourceTex"),
            target_tex: scope.param_id("_RW_TargetTex"),
        };
        // `[_KawaseRT, _KawaseRT0, …, _KawaseRT{count+1}]`
        let level_ids: SmallVec<[RenderTargetId; 19]> = (0..count + 3)
            .map(|i| match i {
                0 => scope.target_id(SCRATCH_LEVEL_NAME),
                n => scope.target_id(&format!("{SCRATCH_LEVEL_NAME}{}", n - 1)),
            })
            .collect();

        debug!(
            "kawase blur: radius {:.2} → {} levels (count {}, ratio {:.3}) from {}×{}",
            schedule.radius,
            schedule.level_count(),
            schedule.count,
            schedule.ratio,
            source.size.x,
            source.size.y,
        );

        // Downsample chain. Level 0 is only written by the upsample walk.
        let mut levels: SmallVec<[RenderTarget; 18]> = SmallVec::new();
        levels.push(scope.allocate(level_ids[0], &desc.with_size(source.size))?);

        let mut last = *source;
        for i in 1..=count + 1 {
            let level = scope.allocate(level_ids[i], &desc.with_size(half_size(last.size)))?;
            slots.sample(scope.commands(), &kernels, BlurKernel::DownSample, &last, &level);
            levels.push(level);
            last = level;
        }

        // Upsample walk.
        if count == 0 {
            slots.sample(
                scope.commands(),
                &kernels,
                BlurKernel::UpSample,
                &levels[1],
                &levels[0],
            );
            slots.blend(scope.commands(), &kernels, source, &levels[0], schedule.ratio);
            scope.release(levels[1].id)?;
        } else {
            let coarsest = count + 1;
            let intermediate = scope.allocate(
                level_ids[count + 2],
                &desc.with_size(levels[count].size),
            )?;
            let mut pair = DoubleBuffer::new(levels[count], intermediate);

            for i in (1..=coarsest).rev() {
                let src = levels[i];
                if i == coarsest {
                    slots.sample(
                        scope.commands(),
                        &kernels,
                        BlurKernel::UpSample,
                        &src,
                        pair.back(),
                    );
                    slots.blend(
                        scope.commands(),
                        &kernels,
                        pair.front(),
                        pair.back(),
                        schedule.ratio,
                    );
                    pair.swap();
                    levels[count] = *pair.front();
                } else {
                    slots.sample(
                        scope.commands(),
                        &kernels,
                        BlurKernel::UpSample,
                        &src,
                        &levels[i - 1],
                    );
                }
                scope.release(src.id)?;
            }
            scope.release(pair.back().id)?;
        }

        Ok(Some(BlurOutput {
            result: levels[0],
            schedule,
            levels_allocated: schedule.level_count(),
            intermediate_allocated: schedule.uses_intermediate(),
            dispatches: schedule.dispatch_count(),
        }))
    }

}

impl KernelSlots {
    /// Records a downsample or upsample dispatch from `source` into `target`.
    fn sample(
        &self,
        cmd: &mut CommandList,
        kernels: &BlurKernels,
        kernel: BlurKernel,
        source: &RenderTarget,
        target: &RenderTarget,
    ) {
        let resolved = kernels.get(kernel);
        cmd.dispatch(DispatchCommand {
            kernel,
            handle: resolved.handle,
            textures: smallvec::smallvec![
                TextureBinding {
                    name: self.source_tex,
                    texture: source.texture_ref(),
                    access: Access::Read,
                },
                TextureBinding {
                    name: self.target_tex,
                    texture: target.texture_ref(),
                    access: Access::Write,
                },
            ],
            uniforms: BlurUniforms {
                source_size: texel_size_params(source.size),
                target_size: texel_size_params(target.size),
                blur_offset: BLUR_OFFSET,
                ..Default::default()
            },
            groups: resolved.groups_for(target.size),
        });
    }

    /// Records `target = lerp(target, source, ratio)` over the source size.
    fn blend(
        &self,
        cmd: &mut CommandList,
        kernels: &BlurKernels,
        source: &RenderTarget,
        target: &RenderTarget,
        ratio: f32,
    ) {
        let resolved = kernels.get(BlurKernel::Lerp);
        let size = texel_size_params(source.size);
        cmd.dispatch(DispatchCommand {
            kernel: BlurKernel::Lerp,
            handle: resolved.handle,
            textures: smallvec::smallvec![
                TextureBinding {
                    name: self.source_tex,
                    texture: source.texture_ref(),
                    access: Access::Read,
                },
                TextureBinding {
                    name: self.target_tex,
                    texture: target.texture_ref(),
                    access: Access::ReadWrite,
                },
            ],
            uniforms: BlurUniforms {
                source_size: size,
                target_size: size,
                blur_offset: ratio,
                ..Default::default()
            },
            groups: resolved.groups_for(source.size),
        });
    }
}
