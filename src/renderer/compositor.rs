//! The per-frame composition pass.
//!
//! A pass walks the widget tree from a root, asks every visible widget for
//! its geometry, clips it against the regions inherited from clipping
//! ancestors, sorts it into draw batches and finally compiles the batches
//! into one mesh. Output is only published when the whole walk succeeds;
//! an aborted pass leaves the previous mesh untouched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::ComposeError;
use crate::transform::Transform;
use crate::tree::{Tree, WidgetId};
use crate::widgets::{Rect, Widget, WidgetFlags};

use super::batch::BatchList;
use super::checksum::Checksum;
use super::clip::{Classification, ClipCache, ClipRegion, Plane};
use super::clipper::Clipper;
use super::constants::{
    CLIP_TRIANGLE_CAPACITY, DEFAULT_POOL_MAX_IDLE, MAX_VERTICES_PER_PRIMITIVE, OPACITY_EPSILON,
};
use super::mesh::{CompiledMesh, MeshCompiler};
use super::pool::{Pool, Poolable, Pooled};
use super::primitive::{MaterialKey, RenderPrimitive};

#[derive(Debug, Clone)]
pub struct CompositorConfig {
    /// Reuse the most recent batch with a matching key instead of only the
    /// last one. Fewer draw calls, but draw order across materials is lost.
    pub merge_materials: bool,
    pub max_vertices_per_primitive: usize,
    pub clip_triangle_capacity: usize,
    /// Subtrees at or below this effective opacity are skipped.
    pub opacity_epsilon: f32,
    /// Base clip for the whole pass; `None` clips nothing at the root.
    pub root_clip: Option<Rect>,
    /// Applied to the compiled mesh and to occluder rectangles.
    pub world_to_local: Transform,
    /// Passes slower than this are logged.
    pub frame_budget: Option<Duration>,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            merge_materials: false,
            max_vertices_per_primitive: MAX_VERTICES_PER_PRIMITIVE,
            clip_triangle_capacity: CLIP_TRIANGLE_CAPACITY,
            opacity_epsilon: OPACITY_EPSILON,
            root_clip: None,
            world_to_local: Transform::IDENTITY,
            frame_budget: None,
        }
    }
}

impl CompositorConfig {
    pub fn merge_materials(mut self, merge: bool) -> Self {
        self.merge_materials = merge;
        self
    }

    pub fn max_vertices_per_primitive(mut self, max: usize) -> Self {
        self.max_vertices_per_primitive = max;
        self
    }

    pub fn clip_triangle_capacity(mut self, triangles: usize) -> Self {
        self.clip_triangle_capacity = triangles;
        self
    }

    pub fn opacity_epsilon(mut self, epsilon: f32) -> Self {
        self.opacity_epsilon = epsilon;
        self
    }

    pub fn root_clip(mut self, rect: Rect) -> Self {
        self.root_clip = Some(rect);
        self
    }

    pub fn world_to_local(mut self, transform: Transform) -> Self {
        self.world_to_local = transform;
        self
    }

    pub fn frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = Some(budget);
        self
    }
}

/// Pools shared by every compositor drawing from the same resources.
///
/// Cloning shares the pools, so several roots can compose on different
/// threads while recycling the same buffers.
#[derive(Clone, Default)]
pub struct ComposeResources {
    pub primitives: Pool<RenderPrimitive>,
    pub regions: Pool<ClipRegion>,
}

impl ComposeResources {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_POOL_MAX_IDLE)
    }

    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            primitives: Pool::with_max_idle(max_idle),
            regions: Pool::with_max_idle(max_idle),
        }
    }
}

/// Handle that lets outside dependencies cancel an in-flight pass.
///
/// The compositor samples the generation when a pass starts and aborts as
/// soon as it sees a different value.
#[derive(Clone, Debug, Default)]
pub struct PassInvalidator {
    generation: Arc<AtomicU64>,
}

impl PassInvalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Outcome of [`Compositor::compose`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeStatus {
    /// A new mesh, rendered list and occluder list are available.
    Published,
    /// The pass was abandoned; previous output is still current and the
    /// compositor is flagged as needing another pass.
    NeedsRetry,
}

/// Sink handed to [`Widget::geometry`].
pub struct GeometryContext<'a> {
    pool: &'a Pool<RenderPrimitive>,
    alpha: f32,
    out: &'a mut Vec<Pooled<RenderPrimitive>>,
}

impl<'a> GeometryContext<'a> {
    pub fn new(
        pool: &'a Pool<RenderPrimitive>,
        alpha: f32,
        out: &'a mut Vec<Pooled<RenderPrimitive>>,
    ) -> Self {
        Self { pool, alpha, out }
    }

    /// Effective opacity of the widget (own times every ancestor's).
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    /// Start a new primitive with `material` and return it for filling.
    pub fn primitive(&mut self, material: MaterialKey) -> &mut RenderPrimitive {
        let mut primitive = self.pool.obtain();
        primitive.material = material;
        self.out.push(primitive);
        let last = self.out.len() - 1;
        &mut self.out[last]
    }

    /// Primitives emitted so far.
    pub fn len(&self) -> usize {
        self.out.len()
    }

    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }
}

pub struct Compositor {
    config: CompositorConfig,
    resources: ComposeResources,
    batches: BatchList,
    clipper: Clipper,
    /// Clipper output for one primitive, moved into a batch only if
    /// something survives.
    clipped: RenderPrimitive,
    invalidator: PassInvalidator,

    // Published output
    mesh: CompiledMesh,
    rendered: Vec<WidgetId>,
    occluders: Vec<Rect>,

    // Filled during a pass, swapped in on publish
    staged_rendered: Vec<WidgetId>,
    staged_occluders: Vec<Rect>,

    root_clip_version: u64,
    needs_compose: bool,
    last_pass: Option<Duration>,
}

impl Compositor {
    pub fn new(config: CompositorConfig, resources: ComposeResources) -> Self {
        let batches = BatchList::new(resources.primitives.clone(), config.merge_materials);
        let clipper = Clipper::with_capacity(config.clip_triangle_capacity);
        Self {
            config,
            resources,
            batches,
            clipper,
            clipped: RenderPrimitive::default(),
            invalidator: PassInvalidator::new(),
            mesh: CompiledMesh::new(),
            rendered: Vec::new(),
            occluders: Vec::new(),
            staged_rendered: Vec::new(),
            staged_occluders: Vec::new(),
            root_clip_version: 0,
            needs_compose: true,
            last_pass: None,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Clonable handle for cancelling passes from outside.
    pub fn invalidator(&self) -> PassInvalidator {
        self.invalidator.clone()
    }

    pub fn mesh(&self) -> &CompiledMesh {
        &self.mesh
    }

    /// Widgets that contributed geometry to the published mesh, in draw order.
    pub fn rendered_widgets(&self) -> &[WidgetId] {
        &self.rendered
    }

    /// Visible area of each rendered widget, parallel to `rendered_widgets`.
    pub fn occluders(&self) -> &[Rect] {
        &self.occluders
    }

    /// Draw calls in the published mesh.
    pub fn batch_count(&self) -> usize {
        self.mesh.submeshes.len()
    }

    pub fn needs_compose(&self) -> bool {
        self.needs_compose
    }

    pub fn request_compose(&mut self) {
        self.needs_compose = true;
    }

    pub fn last_pass_duration(&self) -> Option<Duration> {
        self.last_pass
    }

    pub fn set_merge_materials(&mut self, merge: bool) {
        self.config.merge_materials = merge;
        self.batches.set_merge_materials(merge);
        self.needs_compose = true;
    }

    /// Replace the base clip. Every cached classification goes stale.
    pub fn set_root_clip(&mut self, rect: Option<Rect>) {
        if self.config.root_clip != rect {
            self.config.root_clip = rect;
            self.root_clip_version += 1;
            self.needs_compose = true;
        }
    }

    pub fn set_world_to_local(&mut self, transform: Transform) {
        self.config.world_to_local = transform;
        self.needs_compose = true;
    }

    /// Run one pass over the subtree at `root`.
    pub fn compose(&mut self, tree: &Tree, root: WidgetId, cache: &mut ClipCache) -> ComposeStatus {
        let started = Instant::now();

        cache.begin_pass();
        self.batches.clear();
        self.staged_rendered.clear();
        self.staged_occluders.clear();

        let mut base = self.resources.regions.obtain();
        base.set_root(self.config.root_clip);
        let seed = Checksum::SEED.combine(self.root_clip_version);

        let mut pass = Pass {
            tree,
            cache: &mut *cache,
            config: &self.config,
            primitives: &self.resources.primitives,
            regions: &self.resources.regions,
            batches: &mut self.batches,
            clipper: &mut self.clipper,
            clipped: &mut self.clipped,
            rendered: &mut self.staged_rendered,
            occluders: &mut self.staged_occluders,
            invalidator: &self.invalidator,
            generation: self.invalidator.generation(),
            base,
            clip_stack: Vec::new(),
            planes: Vec::new(),
            geometry: Vec::new(),
        };
        let result = pass
            .visit(root, seed, 1.0)
            .and_then(|()| pass.check_invalidated());
        pass.finish();

        let status = match result {
            Ok(()) => {
                self.publish(cache);
                ComposeStatus::Published
            }
            Err(err) => {
                log::debug!("compose pass aborted: {err}");
                self.batches.clear();
                self.staged_rendered.clear();
                self.staged_occluders.clear();
                self.needs_compose = true;
                crate::compose_stats::record_pass_aborted();
                ComposeStatus::NeedsRetry
            }
        };

        let elapsed = started.elapsed();
        self.last_pass = Some(elapsed);
        if let Some(budget) = self.config.frame_budget {
            if elapsed > budget {
                log::warn!("compose pass took {elapsed:?}, over budget of {budget:?}");
            }
        }
        crate::compose_stats::end_pass();
        status
    }

    fn publish(&mut self, cache: &mut ClipCache) {
        let pruned = self.batches.prune_empty();
        MeshCompiler::new(self.config.world_to_local).compile(self.batches.batches(), &mut self.mesh);

        std::mem::swap(&mut self.rendered, &mut self.staged_rendered);
        std::mem::swap(&mut self.occluders, &mut self.staged_occluders);
        self.staged_rendered.clear();
        self.staged_occluders.clear();

        cache.evict_stale();
        self.needs_compose = false;

        crate::compose_stats::record_pass_published();
        crate::compose_stats::record_batches(self.batches.len());
        log::debug!(
            "composed {} widgets into {} batches ({} empty pruned), {} vertices",
            self.rendered.len(),
            self.batches.len(),
            pruned,
            self.mesh.vertex_count()
        );
    }
}

/// Borrowed state of one in-flight pass.
struct Pass<'a> {
    tree: &'a Tree,
    cache: &'a mut ClipCache,
    config: &'a CompositorConfig,
    primitives: &'a Pool<RenderPrimitive>,
    regions: &'a Pool<ClipRegion>,
    batches: &'a mut BatchList,
    clipper: &'a mut Clipper,
    clipped: &'a mut RenderPrimitive,
    rendered: &'a mut Vec<WidgetId>,
    occluders: &'a mut Vec<Rect>,
    invalidator: &'a PassInvalidator,
    generation: u64,

    base: Pooled<ClipRegion>,
    /// Regions pushed by clipping ancestors of the widget being visited.
    clip_stack: Vec<Pooled<ClipRegion>>,
    /// Scratch for a widget's own clip planes.
    planes: Vec<Plane>,
    /// Scratch for a widget's primitives.
    geometry: Vec<Pooled<RenderPrimitive>>,
}

/// Innermost region in effect.
fn active<'r>(base: &'r ClipRegion, stack: &'r [Pooled<ClipRegion>]) -> &'r ClipRegion {
    stack.last().map_or(base, |r| &**r)
}

impl<'a> Pass<'a> {
    fn check_invalidated(&self) -> Result<(), ComposeError> {
        if self.invalidator.generation() != self.generation {
            return Err(ComposeError::Invalidated(
                "pass invalidator fired".to_string(),
            ));
        }
        Ok(())
    }

    fn visit(&mut self, id: WidgetId, parent_checksum: Checksum, parent_alpha: f32) -> Result<(), ComposeError> {
        let tree = self.tree;
        let Some(widget) = tree.widget(id) else {
            return Ok(());
        };

        if !widget.flags().contains(WidgetFlags::ENABLED | WidgetFlags::VISIBLE) {
            return Ok(());
        }
        let alpha = parent_alpha * widget.opacity();
        if alpha <= self.config.opacity_epsilon {
            return Ok(());
        }
        self.check_invalidated()?;

        let checksum = parent_checksum.child(id.as_u64(), widget.version());

        if widget.produces_geometry() {
            let bounds = widget.bounds();
            let region = active(&self.base, &self.clip_stack);
            match self.cache.classify(id, checksum, region, bounds) {
                Classification::None => {}
                classification => self.emit(id, widget, alpha, classification)?,
            }
        }

        let clips = widget.flags().contains(WidgetFlags::CLIP_CHILDREN);
        if clips {
            self.planes.clear();
            widget.clip_planes(&mut self.planes);
            let mut region = self.regions.obtain();
            region.inherit(
                active(&self.base, &self.clip_stack),
                &self.planes,
                widget.clip_rect(),
            );
            self.clip_stack.push(region);
        }

        let result = self.visit_children(id, checksum, alpha);

        if clips {
            self.clip_stack.pop();
        }
        result
    }

    fn visit_children(&mut self, id: WidgetId, checksum: Checksum, alpha: f32) -> Result<(), ComposeError> {
        let tree = self.tree;
        let children = tree.get_children(id);
        if children.is_empty() {
            return Ok(());
        }

        let mut ordered: Vec<(i32, WidgetId)> = children
            .iter()
            .map(|&child| (tree.widget(child).map_or(0, |w| w.render_order()), child))
            .collect();
        ordered.sort_by_key(|&(order, _)| order);

        for (_, child) in ordered {
            self.visit(child, checksum, alpha)?;
        }
        Ok(())
    }

    /// Collect, validate and route one widget's primitives.
    fn emit(
        &mut self,
        id: WidgetId,
        widget: &dyn Widget,
        alpha: f32,
        classification: Classification,
    ) -> Result<(), ComposeError> {
        let mut ctx = GeometryContext::new(self.primitives, alpha, &mut self.geometry);
        if let Err(err) = widget.geometry(&mut ctx) {
            self.geometry.clear();
            return Err(err);
        }

        for primitive in &mut self.geometry {
            primitive.bake_transform();
        }
        let max = self.config.max_vertices_per_primitive;
        if let Some(err) = self.geometry.iter().find_map(|p| p.validate(max).err()) {
            log::warn!("skipping widget {id:?}: invalid geometry: {err}");
            crate::compose_stats::record_widget_rejected();
            self.geometry.clear();
            return Ok(());
        }

        let region = active(&self.base, &self.clip_stack);
        let planes: &[Plane] = match classification {
            Classification::Intersecting => region.planes(),
            _ => &[],
        };
        for primitive in self.geometry.drain(..).filter(|p| !p.is_empty()) {
            if planes.is_empty() {
                self.batches.get_batch(primitive.batch_key()).append(&primitive);
                continue;
            }
            self.clipped.reset();
            if self.clipper.clip(planes, &primitive, self.clipped) > 0 {
                self.batches
                    .get_batch(primitive.batch_key())
                    .append(self.clipped);
            }
        }

        let bounds = widget.bounds();
        let visible = match region.rect() {
            Some(rect) => bounds.intersect(&rect),
            None => bounds,
        };
        self.rendered.push(id);
        self.occluders
            .push(local_bounds(&self.config.world_to_local, visible));
        Ok(())
    }

    fn finish(mut self) {
        if !self.clip_stack.is_empty() {
            log::error!(
                "clip stack unbalanced at end of pass: {} regions left",
                self.clip_stack.len()
            );
            self.clip_stack.clear();
        }
    }
}

/// Axis-aligned bounds of `rect` after `transform`.
fn local_bounds(transform: &Transform, rect: Rect) -> Rect {
    if transform.is_identity() {
        return rect;
    }
    let corners = [
        transform.transform_point(rect.x, rect.y),
        transform.transform_point(rect.right(), rect.y),
        transform.transform_point(rect.right(), rect.bottom()),
        transform.transform_point(rect.x, rect.bottom()),
    ];
    let (mut min_x, mut min_y) = corners[0];
    let (mut max_x, mut max_y) = corners[0];
    for &(x, y) in &corners[1..] {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Rect::from_corners(min_x, min_y, max_x, max_y)
}
