//! Retained-mode UI compositor core.
//!
//! Each frame a [`Compositor`](renderer::Compositor) walks a [`Tree`](tree::Tree)
//! of widgets, clips their triangle geometry against the clip regions of
//! clipping ancestors, groups it into as few draw batches as shading state
//! allows and compiles the batches into one vertex/index buffer with
//! per-batch index ranges. Uploading and drawing that buffer is left to the
//! host.
//!
//! ```
//! use stratum::prelude::*;
//!
//! let mut tree = Tree::new();
//! let root = tree.register(Box::new(
//!     Panel::new(Rect::new(0.0, 0.0, 200.0, 100.0)).clip_children(true),
//! ));
//! tree.add_child(
//!     root,
//!     Box::new(
//!         Panel::new(Rect::new(150.0, 0.0, 100.0, 50.0))
//!             .fill(Color::WHITE)
//!             .material(MaterialKey::solid(1)),
//!     ),
//! );
//!
//! let mut compositor = Compositor::new(CompositorConfig::default(), ComposeResources::new());
//! let mut cache = ClipCache::new();
//! assert_eq!(compositor.compose(&tree, root, &mut cache), ComposeStatus::Published);
//! assert_eq!(compositor.batch_count(), 1);
//! ```

pub mod compose_stats;
pub mod error;
pub mod renderer;
pub mod transform;
pub mod tree;
pub mod widgets;

pub mod prelude {
    pub use crate::error::{ComposeError, GeometryError};
    pub use crate::renderer::{
        ClipCache, CompiledMesh, ComposeResources, ComposeStatus, Compositor, CompositorConfig,
        GeometryContext, MaterialId, MaterialKey, PassInvalidator, RenderPrimitive, ShaderId,
        Submesh, TextureId,
    };
    pub use crate::transform::Transform;
    pub use crate::tree::{Tree, WidgetId};
    pub use crate::widgets::{Border, Color, Panel, Rect, Widget, WidgetFlags};
}
