//! Error types for geometry validation and pass control.

use thiserror::Error;

/// A primitive that breaks the buffer invariants.
///
/// Rejection is local: the producing widget is skipped for the pass and
/// everything else still composes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("attribute length mismatch: {positions} positions, {uvs} uvs, {colors} colors")]
    LengthMismatch {
        positions: usize,
        uvs: usize,
        colors: usize,
    },
    #[error("index count {0} is not a multiple of 3")]
    PartialTriangle(usize),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("vertex count {count} exceeds per-mesh limit {limit}")]
    TooManyVertices { count: usize, limit: usize },
}

/// Conditions that end a composition pass early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    /// Something the in-flight geometry depends on changed (for example a
    /// glyph atlas was resized). The pass is discarded and rerun.
    #[error("composition invalidated mid-pass: {0}")]
    Invalidated(String),
}
