//! Draw batches: geometry grouped by material key for one draw call each.

use super::pool::{Pool, Pooled};
use super::primitive::{MaterialKey, RenderPrimitive};

/// Accumulated geometry for one material key.
#[derive(Debug)]
pub struct DrawBatch {
    key: MaterialKey,
    buffer: Pooled<RenderPrimitive>,
    /// Primitives merged into this batch during the pass.
    fragments: usize,
}

impl DrawBatch {
    pub fn key(&self) -> MaterialKey {
        self.key
    }

    pub fn buffer(&self) -> &RenderPrimitive {
        &self.buffer
    }

    /// Merge an unclipped primitive.
    pub fn append(&mut self, primitive: &RenderPrimitive) {
        self.fragments += 1;
        self.buffer.append(primitive);
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn vertex_count(&self) -> usize {
        self.buffer.vertex_count()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// The ordered batches of one pass.
///
/// Without material merging a new batch opens whenever the key differs from
/// the last batch, which keeps draw order identical to widget order. With
/// merging the most recent batch with a matching key is reused instead, so
/// fewer draw calls are issued but overlapping translucent widgets with
/// different materials may be drawn out of order.
#[derive(Debug)]
pub struct BatchList {
    batches: Vec<DrawBatch>,
    pool: Pool<RenderPrimitive>,
    merge_materials: bool,
}

impl BatchList {
    pub fn new(pool: Pool<RenderPrimitive>, merge_materials: bool) -> Self {
        Self {
            batches: Vec::new(),
            pool,
            merge_materials,
        }
    }

    pub fn set_merge_materials(&mut self, merge: bool) {
        self.merge_materials = merge;
    }

    /// Batch that geometry with `key` should be appended to, opening a new
    /// one from the pool when needed.
    pub fn get_batch(&mut self, key: MaterialKey) -> &mut DrawBatch {
        let existing = if self.merge_materials {
            self.batches.iter().rposition(|b| b.key == key)
        } else {
            match self.batches.last() {
                Some(last) if last.key == key => Some(self.batches.len() - 1),
                _ => None,
            }
        };

        let index = match existing {
            Some(index) => index,
            None => {
                let mut buffer = self.pool.obtain();
                buffer.material = key;
                self.batches.push(DrawBatch {
                    key,
                    buffer,
                    fragments: 0,
                });
                self.batches.len() - 1
            }
        };
        &mut self.batches[index]
    }

    /// Remove batches that ended up with no vertices (every primitive routed
    /// to them was clipped away). Returns how many were removed.
    pub fn prune_empty(&mut self) -> usize {
        let before = self.batches.len();
        self.batches.retain(|b| !b.is_empty());
        before - self.batches.len()
    }

    /// Release every batch buffer back to the pool.
    pub fn clear(&mut self) {
        self.batches.clear();
    }

    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{Clipper, Plane};
    use crate::widgets::{Color, Rect};

    fn quad(material: u32) -> RenderPrimitive {
        let mut p = RenderPrimitive::new(MaterialKey::solid(material));
        p.push_quad(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Color::WHITE,
        );
        p
    }

    fn feed(list: &mut BatchList, materials: &[u32]) {
        for &m in materials {
            let p = quad(m);
            list.get_batch(p.batch_key()).append(&p);
        }
    }

    #[test]
    fn test_same_key_shares_batch() {
        let mut list = BatchList::new(Pool::new(), false);
        feed(&mut list, &[1, 1, 1, 1]);
        assert_eq!(list.len(), 1);
        assert_eq!(list.batches()[0].fragments(), 4);
        assert_eq!(list.batches()[0].vertex_count(), 16);
    }

    #[test]
    fn test_alternating_keys_open_batch_per_transition() {
        let mut list = BatchList::new(Pool::new(), false);
        feed(&mut list, &[1, 2, 1, 2, 2, 1]);
        let keys: Vec<u32> = list.batches().iter().map(|b| b.key().material.0).collect();
        assert_eq!(keys, vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_merge_materials_reuses_first_occurrence() {
        let mut list = BatchList::new(Pool::new(), true);
        feed(&mut list, &[1, 2, 1, 2, 3, 1]);
        let keys: Vec<u32> = list.batches().iter().map(|b| b.key().material.0).collect();
        assert_eq!(keys, vec![1, 2, 3]);
        assert_eq!(list.batches()[0].fragments(), 3);
    }

    #[test]
    fn test_texture_and_shader_split_batches() {
        let mut list = BatchList::new(Pool::new(), false);
        let plain = quad(1);
        let mut textured = quad(1);
        textured.material.texture = Some(crate::renderer::TextureId(5));
        let mut shaded = quad(1);
        shaded.shader_override = Some(crate::renderer::ShaderId(2));

        for p in [&plain, &textured, &shaded] {
            list.get_batch(p.batch_key()).append(p);
        }
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_clipped_geometry_appends_into_batch() {
        let mut list = BatchList::new(Pool::new(), false);
        let p = quad(1);
        let planes = Plane::rect_edges(Rect::new(0.0, 0.0, 5.0, 100.0));
        let mut clipped = RenderPrimitive::new(p.material);
        let kept = Clipper::new().clip(&planes, &p, &mut clipped);
        assert!(kept > 0);
        list.get_batch(p.batch_key()).append(&clipped);
        let batch = &list.batches()[0];
        assert!(batch.buffer().positions.iter().all(|v| v[0] <= 5.0 + 1e-4));
        assert!(batch.buffer().validate(usize::MAX).is_ok());
    }

    #[test]
    fn test_prune_empty_and_release_to_pool() {
        let pool = Pool::new();
        let mut list = BatchList::new(pool.clone(), false);
        feed(&mut list, &[1]);
        list.get_batch(MaterialKey::solid(2));
        feed(&mut list, &[3]);
        assert_eq!(pool.outstanding(), 3);

        assert_eq!(list.prune_empty(), 1);
        assert_eq!(list.len(), 2);
        assert_eq!(pool.outstanding(), 2);

        list.clear();
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 3);
    }
}
