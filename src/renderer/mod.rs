//! Light-shaft renderer
//!
//! - `registry`: shader parameter names ↔ ids
//! - `program` / `compute`: host capabilities the pass drives
//! - `binding`: per-frame parameter binding
//! - `graph`: command recording, texture pool and the passes

pub mod binding;
pub mod compute;
pub mod graph;
pub mod program;
pub mod registry;

pub use binding::{ParameterBinder, ParameterBlock, texel_size_params};
pub use compute::{BlurKernel, BlurKernels, ComputeKernels, KernelHandle, dispatch_group_count};
pub use program::{ParamValue, ProgramFactory, ProgramSource, ShadingProgram, SubPass};
pub use registry::{ParamId, ParamRegistry, ShaderIds};
