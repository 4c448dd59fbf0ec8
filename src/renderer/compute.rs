//! Compute-Kernel Capability
//!
//! The blur pyramid runs on a compute program that exposes three named
//! kernels. The host supplies a [`ComputeKernels`] implementation; the pass
//! only looks kernels up by name and queries their thread-group size.
//! Dispatches are recorded into the command list, never issued directly.
//!
//! Group counts are the ceiling division of the target resolution by the
//! kernel's thread-group size:
//!
//! ```text
//! groups = (ceil(w / gx), ceil(h / gy), 1)
//! ```

use glam::{UVec2, UVec3};

use crate::errors::{LightShaftError, Result};

/// Opaque handle of a kernel inside the host's compute program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct KernelHandle(pub u32);

/// The kernels the dual blur needs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BlurKernel {
    /// Dual-filter downsample (reads a level, writes the next half-size one).
    DownSample,
    /// Dual-filter upsample (reads a level, writes the next double-size one).
    UpSample,
    /// Linear blend of two equally-sized levels by the fractional radius.
    Lerp,
}

impl BlurKernel {
    pub const ALL: [Self; 3] = [Self::DownSample, Self::UpSample, Self::Lerp];

    /// Kernel entry-point name in the compute program.
    #[inline]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::DownSample => "DualBlurDownSample",
            Self::UpSample => "DualBlurUpSample",
            Self::Lerp => "LerpDownUpTex",
        }
    }
}

/// Host-provided compute capability.
pub trait ComputeKernels {
    /// Looks up a kernel by entry-point name.
    fn find_kernel(&self, name: &str) -> Option<KernelHandle>;

    /// Thread-group size declared by `kernel`.
    fn thread_group_size(&self, kernel: KernelHandle) -> UVec3;
}

/// Ceiling-divides `size` by the x/y thread-group size.
///
/// Zero-sized group dimensions are treated as 1.
#[inline]
#[must_use]
pub fn dispatch_group_count(size: UVec2, group_size: UVec3) -> UVec3 {
    let gx = group_size.x.max(1);
    let gy = group_size.y.max(1);
    UVec3::new(size.x.div_ceil(gx), size.y.div_ceil(gy), 1)
}

/// A kernel handle together with its thread-group size.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResolvedKernel {
    pub handle: KernelHandle,
    pub group_size: UVec3,
}

impl ResolvedKernel {
    #[inline]
    #[must_use]
    pub fn groups_for(&self, size: UVec2) -> UVec3 {
        dispatch_group_count(size, self.group_size)
    }
}

/// The three blur kernels, looked up once.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlurKernels {
    pub down_sample: ResolvedKernel,
    pub up_sample: ResolvedKernel,
    pub lerp: ResolvedKernel,
}

impl BlurKernels {
    /// Resolves every [`BlurKernel`] against `compute`.
    pub fn resolve(compute: &dyn ComputeKernels) -> Result<Self> {
        let find = |kernel: BlurKernel| -> Result<ResolvedKernel> {
            let handle = compute.find_kernel(kernel.name()).ok_or_else(|| {
                LightShaftError::MissingComputeCapability(format!(
                    "kernel '{}' not found",
                    kernel.name()
                ))
            })?;
            Ok(ResolvedKernel {
                handle,
                group_size: compute.thread_group_size(handle),
            })
        };

        Ok(Self {
            down_sample: find(BlurKernel::DownSample)?,
            up_sample: find(BlurKernel::UpSample)?,
            lerp: find(BlurKernel::Lerp)?,
        })
    }

    #[inline]
    #[must_use]
    pub fn get(&self, kernel: BlurKernel) -> &ResolvedKernel {
        match kernel {
            BlurKernel::DownSample => &self.down_sample,
            BlurKernel::UpSample => &self.up_sample,
            BlurKernel::Lerp => &self.lerp,
        }
    }
}
