//! Pass configuration

pub mod light_shaft;

pub use light_shaft::{DownSample, PassSettings, TransparentSettings};
