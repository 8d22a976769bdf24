//! Composition constants to avoid magic numbers throughout the codebase.

/// Triangles the clipper's working buffers are pre-sized for.
/// Each plane can at most double a triangle, so this covers ten planes.
pub const CLIP_TRIANGLE_CAPACITY: usize = 1024;

/// Largest vertex count a single primitive may carry (16-bit index meshes).
pub const MAX_VERTICES_PER_PRIMITIVE: usize = 65_535;

/// Effective opacity at or below which a widget subtree is skipped.
pub const OPACITY_EPSILON: f32 = 0.001;

/// Released objects a pool keeps around for reuse.
pub const DEFAULT_POOL_MAX_IDLE: usize = 256;

/// Denominators below this are treated as an edge parallel to the plane.
pub const PARALLEL_EPSILON: f32 = 1e-6;
