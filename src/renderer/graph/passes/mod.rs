//! Render pass implementations

mod kawase_blur;
mod light_shaft;

pub use kawase_blur::{
    BLUR_OFFSET, BlurOutput, BlurSchedule, DoubleBuffer, KawaseBlur, MAX_PYRAMID_DEPTH,
    SCRATCH_LEVEL_NAME, half_size,
};
pub use light_shaft::{LOW_RES_DEPTH_FORMAT, LightShaftPass, PassPhase};
