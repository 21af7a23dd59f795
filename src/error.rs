//! Errors raised while configuring or initializing the force
//!
//! Resolution itself never fails; everything here is caught before the
//! first tick.

use thiserror::Error;

/// Error type for force initialization and settings/scene loading.
#[derive(Debug, Error)]
pub enum CollideError {
    /// A size function produced a negative or non-finite dimension.
    #[error("node {index} has invalid footprint {width} x {height}")]
    InvalidFootprint { index: usize, width: f64, height: f64 },
    /// A node's stable index does not match its position in the list.
    #[error("node at position {position} carries index {index}")]
    IndexMismatch { position: usize, index: usize },
    /// I/O error while reading settings or a scene.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed settings or scene JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
