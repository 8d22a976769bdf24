//! Clip planes, clip regions and the per-widget classification cache.

use std::collections::HashMap;

use crate::tree::WidgetId;
use crate::widgets::Rect;

use super::checksum::Checksum;
use super::pool::Poolable;

/// Half-space `dot(normal, p) + distance > 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: [f32; 3],
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: [f32; 3], distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Positive inside, negative outside, zero on the plane.
    #[inline]
    pub fn signed_distance(&self, p: [f32; 3]) -> f32 {
        dot(self.normal, p) + self.distance
    }

    /// The four edges of `rect` facing inward, in Left, Right, Top, Bottom
    /// order (y grows downward).
    pub fn rect_edges(rect: Rect) -> [Plane; 4] {
        [
            Plane::new([1.0, 0.0, 0.0], -rect.x),
            Plane::new([-1.0, 0.0, 0.0], rect.right()),
            Plane::new([0.0, 1.0, 0.0], -rect.y),
            Plane::new([0.0, -1.0, 0.0], rect.bottom()),
        ]
    }
}

#[inline]
pub(crate) fn dot(a: [f32; 3], b: [f32; 3]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Where a widget's bounds sit relative to a clip region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Entirely inside every plane; geometry merges unclipped.
    Inside,
    /// Entirely outside at least one plane; geometry is discarded.
    None,
    /// Straddles at least one plane; geometry goes through the clipper.
    Intersecting,
}

/// The clip planes in effect for a subtree.
///
/// Built by appending a clipping widget's own planes to its parent region's
/// planes, so the list is always ancestor-first and never reordered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipRegion {
    planes: Vec<Plane>,
    /// Axis-aligned extent of the visible area, when every contributor was a
    /// rectangle. Used to trim occluder rectangles.
    rect: Option<Rect>,
}

impl ClipRegion {
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// A region with no planes clips nothing.
    pub fn is_unbounded(&self) -> bool {
        self.planes.is_empty()
    }

    /// Make this the base region of a pass.
    pub fn set_root(&mut self, rect: Option<Rect>) {
        self.planes.clear();
        self.rect = rect;
        if let Some(rect) = rect {
            self.planes.extend(Plane::rect_edges(rect));
        }
    }

    /// Become `parent`'s planes followed by `own`.
    ///
    /// The rect is kept only while every contributor is the edge set of its
    /// rect; custom planes leave the region without one.
    pub fn inherit(&mut self, parent: &ClipRegion, own: &[Plane], own_rect: Rect) {
        self.planes.clear();
        self.planes.extend_from_slice(&parent.planes);
        self.planes.extend_from_slice(own);

        let own_is_rect = own == Plane::rect_edges(own_rect).as_slice();
        self.rect = match parent.rect {
            _ if !own_is_rect => None,
            Some(parent_rect) => Some(parent_rect.intersect(&own_rect)),
            None if parent.is_unbounded() => Some(own_rect),
            None => None,
        };
    }

    /// Box/plane test of an axis-aligned rect against every plane.
    ///
    /// The rect's half-extents are projected onto each plane normal to get
    /// a radius; comparing that with the centre's signed distance tells
    /// whether the whole box is on one side.
    pub fn classify(&self, bounds: Rect) -> Classification {
        let (cx, cy) = bounds.center();
        let center = [cx, cy, 0.0];
        let half = [bounds.width.abs() * 0.5, bounds.height.abs() * 0.5, 0.0];

        let mut result = Classification::Inside;
        for plane in &self.planes {
            let radius = plane.normal[0].abs() * half[0]
                + plane.normal[1].abs() * half[1]
                + plane.normal[2].abs() * half[2];
            let d = plane.signed_distance(center);
            if d + radius <= 0.0 {
                return Classification::None;
            }
            if d - radius < 0.0 {
                result = Classification::Intersecting;
            }
        }
        result
    }
}

impl Poolable for ClipRegion {
    fn reset(&mut self) {
        self.planes.clear();
        self.rect = None;
    }
}

/// Last classification computed for one widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipCacheEntry {
    pub checksum: Checksum,
    pub classification: Classification,
    /// Geometry was discarded as fully outside on the last visit.
    pub clipped: bool,
    pass: u64,
}

/// Per-widget clip classifications, owned by the host and handed to every
/// pass so results survive between frames.
#[derive(Debug, Default)]
pub struct ClipCache {
    entries: HashMap<WidgetId, ClipCacheEntry>,
    pass: u64,
    hits: u64,
    misses: u64,
}

impl ClipCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin_pass(&mut self) {
        self.pass += 1;
    }

    /// Classify `bounds` against `region`, reusing the cached answer when the
    /// checksum still matches and the answer was Inside or None.
    ///
    /// Intersecting results are always recomputed; the test is cheap next to
    /// the clip it guards.
    pub fn classify(
        &mut self,
        id: WidgetId,
        checksum: Checksum,
        region: &ClipRegion,
        bounds: Rect,
    ) -> Classification {
        let pass = self.pass;
        if let Some(entry) = self.entries.get_mut(&id) {
            if entry.checksum == checksum && entry.classification != Classification::Intersecting
            {
                entry.pass = pass;
                self.hits += 1;
                crate::compose_stats::record_clip_cache_hit();
                return entry.classification;
            }
        }

        let classification = if region.is_unbounded() {
            Classification::Inside
        } else {
            region.classify(bounds)
        };
        self.misses += 1;
        crate::compose_stats::record_clip_cache_miss();
        self.entries.insert(
            id,
            ClipCacheEntry {
                checksum,
                classification,
                clipped: classification == Classification::None,
                pass,
            },
        );
        classification
    }

    /// Cached classification for `id`, if it is still valid for `checksum`.
    pub fn lookup(&self, id: WidgetId, checksum: Checksum) -> Option<Classification> {
        self.entries
            .get(&id)
            .filter(|e| e.checksum == checksum)
            .map(|e| e.classification)
    }

    pub fn entry(&self, id: WidgetId) -> Option<&ClipCacheEntry> {
        self.entries.get(&id)
    }

    /// Whether the widget's geometry was dropped as fully outside its clip
    /// region on the last pass that visited it.
    pub fn was_clipped(&self, id: WidgetId) -> bool {
        self.entries.get(&id).map(|e| e.clipped).unwrap_or(false)
    }

    /// Drop entries for widgets the current pass never reached.
    pub(crate) fn evict_stale(&mut self) {
        let pass = self.pass;
        self.entries.retain(|_, e| e.pass == pass);
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use crate::widgets::Panel;

    fn region(rect: Rect) -> ClipRegion {
        let mut r = ClipRegion::default();
        r.set_root(Some(rect));
        r
    }

    #[test]
    fn test_rect_edges_order_and_sign() {
        let [left, right, top, bottom] = Plane::rect_edges(Rect::new(10.0, 20.0, 100.0, 50.0));
        assert!(left.signed_distance([11.0, 30.0, 0.0]) > 0.0);
        assert!(left.signed_distance([9.0, 30.0, 0.0]) < 0.0);
        assert!(right.signed_distance([109.0, 30.0, 0.0]) > 0.0);
        assert!(right.signed_distance([111.0, 30.0, 0.0]) < 0.0);
        assert!(top.signed_distance([50.0, 21.0, 0.0]) > 0.0);
        assert!(bottom.signed_distance([50.0, 71.0, 0.0]) < 0.0);
    }

    #[test]
    fn test_classify_inside_touching_edges() {
        let r = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(
            r.classify(Rect::new(0.0, 0.0, 50.0, 50.0)),
            Classification::Inside
        );
    }

    #[test]
    fn test_classify_straddling_and_outside() {
        let r = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        assert_eq!(
            r.classify(Rect::new(180.0, 0.0, 40.0, 50.0)),
            Classification::Intersecting
        );
        assert_eq!(
            r.classify(Rect::new(300.0, 0.0, 50.0, 50.0)),
            Classification::None
        );
        // Touching from outside still contributes no area.
        assert_eq!(
            r.classify(Rect::new(200.0, 0.0, 50.0, 50.0)),
            Classification::None
        );
    }

    #[test]
    fn test_inherit_appends_after_parent() {
        let parent = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        let own = Plane::rect_edges(Rect::new(50.0, 10.0, 300.0, 40.0));
        let mut child = ClipRegion::default();
        child.inherit(&parent, &own, Rect::new(50.0, 10.0, 300.0, 40.0));

        assert_eq!(child.planes().len(), 8);
        assert_eq!(&child.planes()[..4], parent.planes());
        assert_eq!(&child.planes()[4..], &own[..]);
        assert_eq!(child.rect(), Some(Rect::new(50.0, 10.0, 150.0, 40.0)));
    }

    #[test]
    fn test_inherit_custom_planes_drops_rect() {
        let parent = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        let own_rect = Rect::new(0.0, 0.0, 100.0, 100.0);
        // Diagonal x + y < 100.
        let diagonal = [Plane::new([-1.0, -1.0, 0.0], 100.0)];
        let mut child = ClipRegion::default();
        child.inherit(&parent, &diagonal, own_rect);
        assert_eq!(child.planes().len(), 5);
        assert_eq!(child.rect(), None);

        // A rectangular clip below a non-rectangular one stays without a rect.
        let mut grandchild = ClipRegion::default();
        let inner = Rect::new(10.0, 10.0, 20.0, 20.0);
        grandchild.inherit(&child, &Plane::rect_edges(inner), inner);
        assert_eq!(grandchild.rect(), None);

        let mut unbounded_child = ClipRegion::default();
        unbounded_child.inherit(&ClipRegion::default(), &Plane::rect_edges(inner), inner);
        assert_eq!(unbounded_child.rect(), Some(inner));
    }

    #[test]
    fn test_cache_short_circuits_until_checksum_changes() {
        let mut tree = Tree::new();
        let id = tree.register(Box::new(Panel::new(Rect::new(0.0, 0.0, 10.0, 10.0))));
        let r = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        let bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        let mut cache = ClipCache::new();

        cache.begin_pass();
        let sum = Checksum::SEED.combine(1);
        assert_eq!(cache.classify(id, sum, &r, bounds), Classification::Inside);
        assert_eq!(cache.misses(), 1);

        cache.begin_pass();
        assert_eq!(cache.classify(id, sum, &r, bounds), Classification::Inside);
        assert_eq!(cache.hits(), 1);

        cache.begin_pass();
        let bumped = Checksum::SEED.combine(2);
        assert_eq!(cache.lookup(id, bumped), None);
        cache.classify(id, bumped, &r, bounds);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_cache_never_short_circuits_intersecting() {
        let mut tree = Tree::new();
        let id = tree.register(Box::new(Panel::new(Rect::new(180.0, 0.0, 40.0, 50.0))));
        let r = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        let bounds = Rect::new(180.0, 0.0, 40.0, 50.0);
        let mut cache = ClipCache::new();
        let sum = Checksum::SEED.combine(1);

        cache.begin_pass();
        cache.classify(id, sum, &r, bounds);
        cache.begin_pass();
        cache.classify(id, sum, &r, bounds);
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 2);
    }

    #[test]
    fn test_evict_stale_drops_unvisited() {
        let mut tree = Tree::new();
        let a = tree.register(Box::new(Panel::new(Rect::new(0.0, 0.0, 1.0, 1.0))));
        let b = tree.register(Box::new(Panel::new(Rect::new(0.0, 0.0, 1.0, 1.0))));
        let r = region(Rect::new(0.0, 0.0, 200.0, 100.0));
        let mut cache = ClipCache::new();
        let bounds = Rect::new(0.0, 0.0, 1.0, 1.0);

        cache.begin_pass();
        cache.classify(a, Checksum::SEED, &r, bounds);
        cache.classify(b, Checksum::SEED, &r, bounds);
        cache.begin_pass();
        cache.classify(a, Checksum::SEED, &r, bounds);
        cache.evict_stale();

        assert!(cache.entry(a).is_some());
        assert!(cache.entry(b).is_none());
    }
}
