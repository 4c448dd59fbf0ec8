//! Command Recording
//!
//! Every operation of the light-shaft pass is *recorded* into a
//! [`CommandList`] in program order and executed later by the host's GPU
//! scheduler. Nothing here blocks or touches the device.
//!
//! # Resource references
//!
//! Commands address textures through [`TextureRef`]:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | `CameraColor` / `CameraDepth` | the camera's own attachments |
//! | `Pooled(id)` | a physical texture owned by the [`TexturePool`] |
//! | `External(id)` | an asset texture provided by the host (e.g. blue noise) |
//! | `Black` | the default texture bound when a resource is missing |
//!
//! Pool allocations and releases are recorded too
//! ([`RenderCommand::AllocateTarget`] / [`RenderCommand::ReleaseTarget`]) so
//! an executor can replay lifetimes and the implicit global binding each
//! allocation performs.
//!
//! [`TexturePool`]: super::transient_pool::TexturePool

use bytemuck::{Pod, Zeroable};
use glam::{UVec3, Vec4};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::renderer::compute::{BlurKernel, KernelHandle};
use crate::renderer::graph::transient_pool::{RenderTargetId, TargetDesc};
use crate::renderer::program::SubPass;
use crate::renderer::registry::ParamId;

// ─── Texture references ───────────────────────────────────────────────────────

/// Identity of a physical texture owned by the transient pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct PhysicalTextureId(pub(crate) u32);

/// Identity of a host-provided asset texture.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ExternalTextureId(pub u64);

/// Texture addressed by a recorded command.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TextureRef {
    CameraColor,
    CameraDepth,
    Pooled(PhysicalTextureId),
    External(ExternalTextureId),
    /// Default texture bound in place of a missing resource.
    Black,
}

impl TextureRef {
    #[inline]
    #[must_use]
    pub fn pooled(self) -> Option<PhysicalTextureId> {
        match self {
            Self::Pooled(id) => Some(id),
            _ => None,
        }
    }
}

// ─── Compute dispatch ─────────────────────────────────────────────────────────

/// How a dispatch touches a bound texture.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Access {
    Read,
    Write,
    /// Read then written in place (e.g. the fractional blend target).
    ReadWrite,
}

/// Texture bound to a named kernel parameter.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TextureBinding {
    pub name: ParamId,
    pub texture: TextureRef,
    pub access: Access,
}

/// Uniform block shared by the dual-blur kernels.
///
/// Sizes are packed as `(width, height, 1/width, 1/height)`.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Debug, Default, Pod, Zeroable)]
pub struct BlurUniforms {
    pub source_size: Vec4,
    pub target_size: Vec4,
    pub blur_offset: f32,
    pub __pad: [f32; 3],
}

/// A recorded compute dispatch.
#[derive(Clone, PartialEq, Debug)]
pub struct DispatchCommand {
    pub kernel: BlurKernel,
    pub handle: KernelHandle,
    pub textures: SmallVec<[TextureBinding; 2]>,
    pub uniforms: BlurUniforms,
    /// Thread-group counts; `z` is always 1.
    pub groups: UVec3,
}

impl DispatchCommand {
    /// The texture bound with read-only access.
    #[must_use]
    pub fn source(&self) -> Option<TextureRef> {
        self.textures
            .iter()
            .find(|b| b.access == Access::Read)
            .map(|b| b.texture)
    }

    /// The texture the dispatch writes to.
    #[must_use]
    pub fn target(&self) -> Option<TextureRef> {
        self.textures
            .iter()
            .find(|b| matches!(b.access, Access::Write | Access::ReadWrite))
            .map(|b| b.texture)
    }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// One recorded GPU operation.
#[derive(Clone, PartialEq, Debug)]
pub enum RenderCommand {
    /// Opens a named profiling scope.
    BeginSample(String),
    /// Closes the profiling scope opened with the same name.
    EndSample(String),
    /// A logical id was bound to a physical texture and registered as a
    /// global texture under its own name.
    AllocateTarget {
        id: RenderTargetId,
        texture: PhysicalTextureId,
        desc: TargetDesc,
    },
    /// A logical id was unbound; the physical texture returns to the pool.
    ReleaseTarget {
        id: RenderTargetId,
        texture: PhysicalTextureId,
    },
    /// Binds `texture` as a global texture under `name`.
    SetGlobalTexture { name: ParamId, texture: TextureRef },
    /// Full-screen copy, optionally through a shading-program sub-pass.
    Blit {
        source: TextureRef,
        target: TextureRef,
        pass: Option<SubPass>,
    },
    Dispatch(DispatchCommand),
}

impl RenderCommand {
    /// Textures this command reads explicitly (globals bound to a program
    /// are not included).
    #[must_use]
    pub fn reads(&self) -> SmallVec<[TextureRef; 2]> {
        match self {
            Self::Blit { source, .. } => smallvec::smallvec![*source],
            Self::Dispatch(dispatch) => dispatch
                .textures
                .iter()
                .filter(|b| matches!(b.access, Access::Read | Access::ReadWrite))
                .map(|b| b.texture)
                .collect(),
            _ => SmallVec::new(),
        }
    }

    /// Texture this command writes, if any.
    #[must_use]
    pub fn writes(&self) -> Option<TextureRef> {
        match self {
            Self::Blit { target, .. } => Some(*target),
            Self::Dispatch(dispatch) => dispatch.target(),
            _ => None,
        }
    }
}

/// A pooled texture read before anything wrote it in its current lease.
///
/// The GPU returns undefined (in practice black) data for such reads. This
/// is reported for diagnostics only and never treated as an error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ReadBeforeWrite {
    /// Index of the offending command.
    pub command: usize,
    pub texture: PhysicalTextureId,
}

/// Ordered sequence of recorded commands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CommandList {
    commands: Vec<RenderCommand>,
}

impl CommandList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, command: RenderCommand) {
        self.commands.push(command);
    }

    pub fn begin_sample(&mut self, tag: &str) {
        self.push(RenderCommand::BeginSample(tag.to_owned()));
    }

    pub fn end_sample(&mut self, tag: &str) {
        self.push(RenderCommand::EndSample(tag.to_owned()));
    }

    pub fn set_global_texture(&mut self, name: ParamId, texture: TextureRef) {
        self.push(RenderCommand::SetGlobalTexture { name, texture });
    }

    pub fn blit(&mut self, source: TextureRef, target: TextureRef, pass: Option<SubPass>) {
        self.push(RenderCommand::Blit {
            source,
            target,
            pass,
        });
    }

    pub fn dispatch(&mut self, dispatch: DispatchCommand) {
        self.push(RenderCommand::Dispatch(dispatch));
    }

    #[inline]
    #[must_use]
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RenderCommand> {
        self.commands.iter()
    }

    /// All recorded dispatches, in order.
    pub fn dispatches(&self) -> impl Iterator<Item = &DispatchCommand> {
        self.commands.iter().filter_map(|c| match c {
            RenderCommand::Dispatch(d) => Some(d),
            _ => None,
        })
    }

    /// Number of dispatches of `kernel`.
    #[must_use]
    pub fn dispatch_count(&self, kernel: BlurKernel) -> usize {
        self.dispatches().filter(|d| d.kernel == kernel).count()
    }

    /// Sub-passes invoked through blits, in order.
    pub fn sub_passes(&self) -> impl Iterator<Item = SubPass> + '_ {
        self.commands.iter().filter_map(|c| match c {
            RenderCommand::Blit { pass, .. } => *pass,
            _ => None,
        })
    }

    /// Scans the list for pooled textures sampled before being written
    /// since their most recent allocation.
    #[must_use]
    pub fn read_before_write(&self) -> Vec<ReadBeforeWrite> {
        let mut unwritten: FxHashSet<PhysicalTextureId> = FxHashSet::default();
        let mut hazards = Vec::new();

        for (index, command) in self.commands.iter().enumerate() {
            if let RenderCommand::AllocateTarget { texture, .. } = command {
                unwritten.insert(*texture);
                continue;
            }
            for read in command.reads() {
                if let Some(texture) = read.pooled()
                    && unwritten.contains(&texture)
                {
                    hazards.push(ReadBeforeWrite {
                        command: index,
                        texture,
                    });
                }
            }
            if let Some(texture) = command.writes().and_then(TextureRef::pooled) {
                unwritten.remove(&texture);
            }
        }
        hazards
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a RenderCommand;
    type IntoIter = std::slice::Iter<'a, RenderCommand>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}
