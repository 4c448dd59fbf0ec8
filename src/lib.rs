#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! Volumetric light shafts for the Myth renderer.
//!
//! The pass records everything into a [`CommandList`]: a ray-marched
//! light contribution at reduced resolution, a Kawase dual-blur pyramid
//! over it and a composite back onto the camera color.
//!
//! ```rust,ignore
//! let mut pass = LightShaftPass::new(PassSettings::default(), &programs, Some(&compute));
//! let mut cmd = CommandList::new();
//! pass.on_camera_setup(&frame, &mut cmd)?;
//! pass.execute(&frame, &mut cmd)?;
//! pass.on_camera_cleanup(&mut cmd)?;
//! ```

pub mod errors;
pub mod renderer;
pub mod resources;

pub use errors::{LightShaftError, Result};
pub use renderer::graph::passes::{BlurSchedule, KawaseBlur, LightShaftPass};
pub use renderer::graph::{CameraPass, CommandList, FrameInfo, RenderPassEvent, TexturePool};
pub use renderer::{ComputeKernels, ProgramFactory, ShadingProgram, SubPass};
pub use resources::{DownSample, PassSettings, TransparentSettings};
