//! CPU-side preparation of UI geometry.
//!
//! Leaf first: [`RenderPrimitive`] buffers are filled by widgets, cut down
//! by the [`Clipper`] against the active [`ClipRegion`], merged into
//! [`DrawBatch`]es and packed by the [`MeshCompiler`]. The [`Compositor`]
//! drives all of it once per frame.

mod batch;
mod checksum;
mod clip;
mod clipper;
mod compositor;
pub mod constants;
mod mesh;
mod pool;
mod primitive;

pub use batch::{BatchList, DrawBatch};
pub use checksum::Checksum;
pub use clip::{Classification, ClipCache, ClipCacheEntry, ClipRegion, Plane};
pub use clipper::Clipper;
pub use compositor::{
    ComposeResources, ComposeStatus, Compositor, CompositorConfig, GeometryContext,
    PassInvalidator,
};
pub use mesh::{CompiledMesh, MeshCompiler, Submesh};
pub use pool::{Pool, Poolable, Pooled};
pub use primitive::{MaterialId, MaterialKey, RenderPrimitive, ShaderId, TextureId};
