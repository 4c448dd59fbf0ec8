//! Camera Pass Trait
//!
//! The host drives a camera pass through three hooks, once per camera per
//! frame and always in this order:
//!
//! ```text
//! on_camera_setup ──► execute ──► on_camera_cleanup
//! ```
//!
//! Every hook records into the host's [`CommandList`]; none of them touches
//! the device directly.

use crate::errors::Result;
use crate::renderer::graph::commands::CommandList;
use crate::renderer::graph::frame::FrameInfo;
use crate::renderer::graph::stage::RenderPassEvent;

/// A pass the host queues per camera.
pub trait CameraPass {
    /// Returns the pass name, used for debugging and profiling.
    fn name(&self) -> &str;

    /// Where the host should schedule the pass.
    fn event(&self) -> RenderPassEvent;

    /// Derives per-frame state, allocates frame targets and binds parameters.
    fn on_camera_setup(&mut self, frame: &FrameInfo, cmd: &mut CommandList) -> Result<()>;

    /// Records the pass's GPU work.
    fn execute(&mut self, frame: &FrameInfo, cmd: &mut CommandList) -> Result<()>;

    /// Releases everything the frame allocated.
    fn on_camera_cleanup(&mut self, cmd: &mut CommandList) -> Result<()>;
}
