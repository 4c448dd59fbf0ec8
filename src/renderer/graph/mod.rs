//! Per-camera pass recording
//!
//! Provides:
//! - CommandList / RenderCommand: ordered command recording
//! - TexturePool / TargetScope: frame-scoped render targets
//! - FrameInfo / FrameContext: host input and derived per-frame state
//! - CameraPass: the three host hooks
//! - RenderPassEvent: insertion points
//! - passes: Kawase blur pyramid and the light-shaft pass

pub mod commands;
pub mod frame;
pub mod node;
pub mod passes;
pub mod stage;
pub mod transient_pool;

pub use commands::{
    Access, BlurUniforms, CommandList, DispatchCommand, ExternalTextureId, PhysicalTextureId,
    ReadBeforeWrite, RenderCommand, TextureBinding, TextureRef,
};
pub use frame::{CameraTargetDesc, FrameContext, FrameInfo};
pub use node::CameraPass;
pub use stage::RenderPassEvent;
pub use transient_pool::{
    FilterMode, PoolStats, RenderTarget, RenderTargetId, TargetDesc, TargetScope, TexturePool,
};
