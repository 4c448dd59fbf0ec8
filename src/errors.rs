//! Error Types
//!
//! This module defines the error types used by the light-shaft pass.
//!
//! # Overview
//!
//! The main error type [`LightShaftError`] covers:
//! - Capability failures (shading program / compute kernels unavailable)
//! - Texture pool bookkeeping errors (duplicate allocation, unknown ids, leaks)
//! - Host protocol errors (hooks invoked out of order)
//! - Configuration loading and validation errors
//!
//! Only configuration and pool bookkeeping errors ever reach the caller as
//! `Err`. A missing program or compute capability is logged once and the
//! pass degrades (pass-through output, unblurred shafts respectively).
//!
//! ```rust,ignore
//! use lightshafts::errors::Result;
//! use lightshafts::PassSettings;
//!
//! fn load() -> Result<PassSettings> {
//!     PassSettings::from_json_file("light_shaft.json")
//! }
//! ```

use thiserror::Error;

/// The main error type for the light-shaft pass.
#[derive(Error, Debug)]
pub enum LightShaftError {
    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// The shading program could not be constructed from its source.
    #[error("Shading program unavailable: {source_name}")]
    MissingProgram {
        /// Name of the program source that failed to construct
        source_name: String,
    },

    /// The blur compute capability (or one of its kernels) is absent.
    #[error("Blur compute capability unavailable: {0}")]
    MissingComputeCapability(String),

    // ========================================================================
    // Texture Pool Errors
    // ========================================================================
    /// A logical texture id was allocated twice without an intervening release.
    #[error("Render target '{id}' allocated twice within a frame")]
    DuplicateAllocation {
        /// Global texture name of the offending id
        id: String,
    },

    /// A logical texture id was released or queried while not allocated.
    #[error("Render target '{id}' is not allocated")]
    UnknownTarget {
        /// Global texture name of the offending id
        id: String,
    },

    /// Logical ids were still live at the end of the frame.
    ///
    /// The pool has already released them by the time this is reported.
    #[error("{} render target(s) leaked past cleanup: {}", .ids.len(), .ids.join(", "))]
    LeakedTargets {
        /// Global texture names of the leaked ids
        ids: Vec<String>,
    },

    // ========================================================================
    // Host Protocol Errors
    // ========================================================================
    /// A camera hook was invoked out of the `setup → execute → cleanup` order.
    #[error("Camera hook out of order: expected {expected}, found {found}")]
    PhaseOrder {
        /// The hook the pass expected next
        expected: &'static str,
        /// The hook that was actually invoked
        found: &'static str,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A settings field is outside its accepted range.
    #[error("Invalid light shaft settings: {0}")]
    InvalidSettings(String),

    /// File I/O error while loading settings.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error while loading settings.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for `Result<T, LightShaftError>`.
pub type Result<T> = std::result::Result<T, LightShaftError>;
