//! Transient Texture Pool
//!
//! Frame-scoped render targets keyed by a logical id. A pass allocates a
//! target under an id, records commands that use it, and releases it; any id
//! still live at [`TexturePool::end_frame`] is released implicitly.
//!
//! # Design
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      TexturePool                          │
//! │                                                           │
//! │  registry: ParamRegistry      (name ↔ id, owned)          │
//! │  live:     id → RenderTarget  (logical bindings)          │
//! │  physical: [TargetDesc]       (textures ever created)     │
//! │  free:     PoolKey → [PhysicalTextureId]                  │
//! │                                                           │
//! │  allocate(id, desc) → RenderTarget   records Allocate     │
//! │  release(id)                          records Release     │
//! │  scope(cmd) → TargetScope             releases on drop    │
//! │  end_frame()                          implicit release    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Memory Strategy
//!
//! - Releasing an id returns its physical texture to the free list straight
//!   away, so later allocations in the same frame alias it in program order.
//!   This is what keeps the blur pyramid's peak footprint at roughly two
//!   levels.
//! - Physical textures are never destroyed during normal rendering. Call
//!   [`TexturePool::trim`] after resolution changes to drop stale ones.
//! - An allocation also registers the target as a global texture under the
//!   id's name (see [`RenderCommand::AllocateTarget`]).
//!
//! Reading a target before anything wrote to it is the caller's problem;
//! the pool does not track contents.

use glam::UVec2;
use log::trace;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::{LightShaftError, Result};
use crate::renderer::graph::commands::{CommandList, PhysicalTextureId, RenderCommand, TextureRef};
use crate::renderer::registry::{ParamId, ParamRegistry};

// ─── Public Types ─────────────────────────────────────────────────────────────

/// Logical render-target id: the [`ParamId`] of its global texture name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RenderTargetId(ParamId);

impl RenderTargetId {
    #[inline]
    #[must_use]
    pub const fn new(name: ParamId) -> Self {
        Self(name)
    }

    /// The global texture name this target is bound under.
    #[inline]
    #[must_use]
    pub const fn name(self) -> ParamId {
        self.0
    }
}

impl From<ParamId> for RenderTargetId {
    fn from(name: ParamId) -> Self {
        Self(name)
    }
}

/// Sampling filter requested for a target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum FilterMode {
    #[default]
    Point,
    Bilinear,
}

/// Descriptor for requesting a render target.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TargetDesc {
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub mip_level_count: u32,
    pub filter: FilterMode,
    pub label: &'static str,
}

impl TargetDesc {
    #[inline]
    #[must_use]
    pub fn size(&self) -> UVec2 {
        UVec2::new(self.width, self.height)
    }

    /// Same descriptor at another resolution.
    #[inline]
    #[must_use]
    pub fn with_size(&self, size: UVec2) -> Self {
        Self {
            width: size.x,
            height: size.y,
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_format(&self, format: wgpu::TextureFormat) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }

    #[inline]
    #[must_use]
    pub fn with_label(&self, label: &'static str) -> Self {
        Self {
            label,
            ..self.clone()
        }
    }
}

/// A live allocation: logical id, bound physical texture and its size.
///
/// Valid from the `allocate` call until the id is released.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct RenderTarget {
    pub id: RenderTargetId,
    pub texture: PhysicalTextureId,
    pub size: UVec2,
}

impl RenderTarget {
    #[inline]
    #[must_use]
    pub fn texture_ref(&self) -> TextureRef {
        TextureRef::Pooled(self.texture)
    }
}

/// Allocation counters for one frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PoolStats {
    pub allocations: u32,
    pub releases: u32,
    /// Ids released implicitly by `end_frame`.
    pub implicit_releases: u32,
    pub peak_live: u32,
    /// Physical textures created this frame (pool misses).
    pub physical_created: u32,
}

// ─── Internal Types ───────────────────────────────────────────────────────────

/// Key for texture recycling. Usage is part of the key because mismatched
/// usages would fail GPU validation.
#[derive(Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    mip_level_count: u32,
    filter: FilterMode,
}

impl PoolKey {
    fn from_desc(desc: &TargetDesc) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
            mip_level_count: desc.mip_level_count,
            filter: desc.filter,
        }
    }
}

struct PhysicalTexture {
    desc: TargetDesc,
    /// Frames spent in the free list without reuse; see [`TexturePool::trim`].
    idle_frames: u32,
}

struct LiveTarget {
    target: RenderTarget,
    /// Allocation order, so implicit releases happen deterministically.
    serial: u64,
}

// ─── Pool Implementation ──────────────────────────────────────────────────────

/// Frame-scoped render-target pool.
pub struct TexturePool {
    registry: ParamRegistry,
    live: FxHashMap<RenderTargetId, LiveTarget>,
    physical: FxHashMap<PhysicalTextureId, PhysicalTexture>,
    free: FxHashMap<PoolKey, Vec<PhysicalTextureId>>,
    next_physical: u32,
    next_serial: u64,
    frame: PoolStats,
    last_frame: PoolStats,
}

impl TexturePool {
    /// Creates an empty pool with a fresh registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(ParamRegistry::new())
    }

    /// Creates an empty pool that takes ownership of `registry`.
    #[must_use]
    pub fn with_registry(registry: ParamRegistry) -> Self {
        Self {
            registry,
            live: FxHashMap::default(),
            physical: FxHashMap::default(),
            free: FxHashMap::default(),
            next_physical: 0,
            next_serial: 0,
            frame: PoolStats::default(),
            last_frame: PoolStats::default(),
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &ParamRegistry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut ParamRegistry {
        &mut self.registry
    }

    /// Interns `name` and returns it as a target id.
    pub fn target_id(&mut self, name: &str) -> RenderTargetId {
        RenderTargetId(self.registry.intern(name))
    }

    // ── Allocation ─────────────────────────────────────────────────────────

    /// Binds `id` to a render target matching `desc`.
    ///
    /// A compatible free physical texture is reused when available;
    /// otherwise a new one is created. Fails with `DuplicateAllocation` if
    /// `id` is already live.
    pub fn allocate(
        &mut self,
        cmd: &mut CommandList,
        id: RenderTargetId,
        desc: &TargetDesc,
    ) -> Result<RenderTarget> {
        if self.live.contains_key(&id) {
            return Err(LightShaftError::DuplicateAllocation {
                id: self.registry.resolve(id.name()).to_owned(),
            });
        }

        let key = PoolKey::from_desc(desc);
        let texture = match self.free.get_mut(&key).and_then(Vec::pop) {
            Some(texture) => {
                if let Some(physical) = self.physical.get_mut(&texture) {
                    physical.idle_frames = 0;
                    physical.desc.label = desc.label;
                }
                texture
            }
            None => {
                let texture = PhysicalTextureId(self.next_physical);
                self.next_physical += 1;
                self.physical.insert(
                    texture,
                    PhysicalTexture {
                        desc: desc.clone(),
                        idle_frames: 0,
                    },
                );
                self.frame.physical_created += 1;
                texture
            }
        };

        let target = RenderTarget {
            id,
            texture,
            size: desc.size(),
        };
        self.live.insert(
            id,
            LiveTarget {
                target,
                serial: self.next_serial,
            },
        );
        self.next_serial += 1;

        self.frame.allocations += 1;
        self.frame.peak_live = self.frame.peak_live.max(self.live.len() as u32);

        trace!(
            "allocate {} → #{} ({}×{} {:?})",
            self.registry.resolve(id.name()),
            texture.0,
            desc.width,
            desc.height,
            desc.format,
        );
        cmd.push(RenderCommand::AllocateTarget {
            id,
            texture,
            desc: desc.clone(),
        });
        Ok(target)
    }

    /// Unbinds `id` and returns its physical texture to the free list.
    pub fn release(&mut self, cmd: &mut CommandList, id: RenderTargetId) -> Result<()> {
        let Some(live) = self.live.remove(&id) else {
            return Err(LightShaftError::UnknownTarget {
                id: self.registry.resolve(id.name()).to_owned(),
            });
        };
        self.recycle(cmd, live.target);
        self.frame.releases += 1;
        Ok(())
    }

    fn recycle(&mut self, cmd: &mut CommandList, target: RenderTarget) {
        if let Some(physical) = self.physical.get(&target.texture) {
            self.free
                .entry(PoolKey::from_desc(&physical.desc))
                .or_default()
                .push(target.texture);
        }
        trace!(
            "release {} (#{})",
            self.registry.resolve(target.id.name()),
            target.texture.0
        );
        cmd.push(RenderCommand::ReleaseTarget {
            id: target.id,
            texture: target.texture,
        });
    }

    /// Opens a scope whose allocations are released when it is dropped.
    pub fn scope<'a>(&'a mut self, cmd: &'a mut CommandList) -> TargetScope<'a> {
        TargetScope {
            pool: self,
            cmd,
            owned: SmallVec::new(),
        }
    }

    // ── Queries ────────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub fn get(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.live.get(&id).map(|l| &l.target)
    }

    #[inline]
    #[must_use]
    pub fn is_live(&self, id: RenderTargetId) -> bool {
        self.live.contains_key(&id)
    }

    #[inline]
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Descriptor a physical texture was created with.
    #[must_use]
    pub fn physical_desc(&self, texture: PhysicalTextureId) -> Option<&TargetDesc> {
        self.physical.get(&texture).map(|p| &p.desc)
    }

    /// Number of physical textures held (live and free).
    #[must_use]
    pub fn physical_texture_count(&self) -> usize {
        self.physical.len()
    }

    /// Counters for the frame in progress.
    #[inline]
    #[must_use]
    pub fn frame_stats(&self) -> PoolStats {
        self.frame
    }

    /// Counters of the most recently ended frame.
    #[inline]
    #[must_use]
    pub fn last_frame_stats(&self) -> PoolStats {
        self.last_frame
    }

    // ── Frame boundary ─────────────────────────────────────────────────────

    /// Releases every id still live and closes the frame's counters.
    ///
    /// Returns the ids that had to be released implicitly, in allocation
    /// order.
    pub fn end_frame(&mut self, cmd: &mut CommandList) -> Vec<RenderTargetId> {
        let mut leaked: Vec<LiveTarget> = self.live.drain().map(|(_, l)| l).collect();
        leaked.sort_by_key(|l| l.serial);

        let ids = leaked.iter().map(|l| l.target.id).collect();
        for live in leaked {
            self.recycle(cmd, live.target);
            self.frame.implicit_releases += 1;
        }

        self.last_frame = std::mem::take(&mut self.frame);
        ids
    }

    /// Drops free physical textures that have been idle for more than
    /// `max_idle_frames` calls.
    pub fn trim(&mut self, max_idle_frames: u32) {
        let mut dropped = Vec::new();
        for bucket in self.free.values_mut() {
            bucket.retain(|texture| {
                let Some(physical) = self.physical.get_mut(texture) else {
                    return false;
                };
                physical.idle_frames += 1;
                if physical.idle_frames > max_idle_frames {
                    dropped.push(*texture);
                    false
                } else {
                    true
                }
            });
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
        for texture in dropped {
            self.physical.remove(&texture);
        }
    }
}

impl Default for TexturePool {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Scoped acquisition ───────────────────────────────────────────────────────

/// Allocation scope over a [`TexturePool`] and the command list it records
/// into.
///
/// Ids allocated through the scope and not released explicitly are
/// released, with their release recorded, when the scope is dropped.
pub struct TargetScope<'a> {
    pool: &'a mut TexturePool,
    cmd: &'a mut CommandList,
    owned: SmallVec<[RenderTargetId; 12]>,
}

impl TargetScope<'_> {
    pub fn allocate(&mut self, id: RenderTargetId, desc: &TargetDesc) -> Result<RenderTarget> {
        let target = self.pool.allocate(self.cmd, id, desc)?;
        self.owned.push(id);
        Ok(target)
    }

    pub fn release(&mut self, id: RenderTargetId) -> Result<()> {
        self.pool.release(self.cmd, id)?;
        self.owned.retain(|owned| *owned != id);
        Ok(())
    }

    /// Interns `name` as a target id.
    pub fn target_id(&mut self, name: &str) -> RenderTargetId {
        self.pool.target_id(name)
    }

    /// Interns `name` in the pool's registry.
    pub fn param_id(&mut self, name: &str) -> ParamId {
        self.pool.registry_mut().intern(name)
    }

    /// The command list this scope records into.
    #[inline]
    pub fn commands(&mut self) -> &mut CommandList {
        &mut *self.cmd
    }

    /// Ends the scope, leaving every id it allocated live.
    pub fn keep(mut self) {
        self.owned.clear();
    }

    /// Ids allocated through this scope that are still live.
    #[inline]
    #[must_use]
    pub fn outstanding(&self) -> &[RenderTargetId] {
        &self.owned
    }
}

impl Drop for TargetScope<'_> {
    fn drop(&mut self) {
        for id in std::mem::take(&mut self.owned) {
            if let Err(err) = self.pool.release(self.cmd, id) {
                log::error!("TargetScope: {err}");
            }
        }
    }
}
