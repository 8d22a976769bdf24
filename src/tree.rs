//! Arena-based widget storage for the compositor.
//!
//! The Tree stores widgets in a sparse-set arena with generational indices.
//! Parents own their children by id and children keep their parent's id, so
//! there are no reference cycles and no shared ownership.
//!
//! ## Key Features
//!
//! - **Generational Indices**: WidgetId contains index + generation so a stale
//!   id never resolves to a widget that later reused the same slot.
//!
//! - **Dense Storage**: Widgets stored contiguously; removal is swap-remove.
//!
//! - **Sparse Map**: O(1) lookup from stable WidgetId to dense array index.

use crate::widgets::{AsAny, Widget};

/// Unique identifier for a widget in the tree.
///
/// Uses a generational index design:
/// - `index`: Position in the sparse array (reusable after removal)
/// - `generation`: Version counter that increments when a slot is reused
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct WidgetId {
    index: u32,
    generation: u32,
}

impl WidgetId {
    fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Generation in the high bits, index in the low bits.
    pub fn as_u64(self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }
}

/// Entry in the sparse map, pointing to a dense array slot.
struct SparseEntry {
    dense_index: usize,
    generation: u32,
}

struct Node {
    widget: Box<dyn Widget>,
    /// None for roots
    parent: Option<WidgetId>,
    /// In insertion order; the compositor sorts by render order itself.
    children: Vec<WidgetId>,
    /// Back-pointer to sparse array index (for swap-remove fixup)
    sparse_index: u32,
}

/// Central widget storage.
pub struct Tree {
    dense: Vec<Node>,
    sparse: Vec<Option<SparseEntry>>,
    /// Sparse slots ready for reuse, with the generation they last held.
    free_indices: Vec<(u32, u32)>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            dense: Vec::new(),
            sparse: Vec::new(),
            free_indices: Vec::new(),
        }
    }

    /// Register a detached widget and return its id.
    pub fn register(&mut self, widget: Box<dyn Widget>) -> WidgetId {
        let (sparse_index, generation) = match self.free_indices.pop() {
            Some((idx, old_gen)) => (idx, old_gen.wrapping_add(1)),
            None => {
                let idx = self.sparse.len() as u32;
                self.sparse.push(None);
                (idx, 0)
            }
        };

        let dense_index = self.dense.len();
        self.dense.push(Node {
            widget,
            parent: None,
            children: Vec::new(),
            sparse_index,
        });
        self.sparse[sparse_index as usize] = Some(SparseEntry {
            dense_index,
            generation,
        });

        WidgetId::new(sparse_index, generation)
    }

    /// Register `widget` as the last child of `parent`.
    ///
    /// Returns `None` (and stores nothing) when `parent` is not in the tree.
    pub fn add_child(&mut self, parent: WidgetId, widget: Box<dyn Widget>) -> Option<WidgetId> {
        if !self.contains(parent) {
            return None;
        }
        let id = self.register(widget);
        self.set_parent(id, parent);
        Some(id)
    }

    /// Remove a widget and its whole subtree.
    pub fn unregister(&mut self, id: WidgetId) {
        let Some(dense_index) = self.get_dense_index(id) else {
            return;
        };

        if let Some(parent) = self.dense[dense_index].parent {
            if let Some(parent_dense) = self.get_dense_index(parent) {
                self.dense[parent_dense].children.retain(|&c| c != id);
            }
        }

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if let Some(node) = self.remove_node(current) {
                pending.extend(node.children);
            }
        }
    }

    /// Swap-remove one node, fixing up the sparse entry of the node that
    /// moved into its slot.
    fn remove_node(&mut self, id: WidgetId) -> Option<Node> {
        let dense_index = self.get_dense_index(id)?;
        let last_dense_index = self.dense.len() - 1;
        let removed = self.dense.swap_remove(dense_index);

        if dense_index != last_dense_index {
            let moved_sparse_idx = self.dense[dense_index].sparse_index;
            if let Some(entry) = self.sparse[moved_sparse_idx as usize].as_mut() {
                entry.dense_index = dense_index;
            }
        }

        self.sparse[id.index as usize] = None;
        self.free_indices.push((id.index, id.generation));
        Some(removed)
    }

    fn get_dense_index(&self, id: WidgetId) -> Option<usize> {
        self.sparse
            .get(id.index as usize)
            .and_then(|e| e.as_ref())
            .filter(|e| e.generation == id.generation)
            .map(|e| e.dense_index)
    }

    /// Borrow a widget directly.
    pub fn widget(&self, id: WidgetId) -> Option<&dyn Widget> {
        self.get_dense_index(id).map(|idx| &*self.dense[idx].widget)
    }

    /// Access a widget via a closure.
    pub fn with_widget<R>(&self, id: WidgetId, f: impl FnOnce(&dyn Widget) -> R) -> Option<R> {
        self.widget(id).map(f)
    }

    /// Mutate a widget via a closure. Returns `None` for a stale id.
    pub fn with_widget_mut<R>(
        &mut self,
        id: WidgetId,
        f: impl FnOnce(&mut dyn Widget) -> R,
    ) -> Option<R> {
        let idx = self.get_dense_index(id)?;
        Some(f(&mut *self.dense[idx].widget))
    }

    /// Access a widget as its concrete type. `None` for a stale id or a
    /// widget of another type.
    pub fn with_widget_as<T: Widget, R>(&self, id: WidgetId, f: impl FnOnce(&T) -> R) -> Option<R> {
        let widget = self.widget(id)?;
        widget.as_any().downcast_ref::<T>().map(f)
    }

    /// Mutate a widget as its concrete type, for example to call a
    /// `Panel` setter that bumps its version.
    pub fn with_widget_mut_as<T: Widget, R>(
        &mut self,
        id: WidgetId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let idx = self.get_dense_index(id)?;
        let widget: &mut dyn Widget = &mut *self.dense[idx].widget;
        widget.as_any_mut().downcast_mut::<T>().map(f)
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.get_dense_index(id).is_some()
    }

    /// Attach `child` as the last child of `parent`, detaching it from any
    /// previous parent first.
    ///
    /// Returns false and changes nothing if either id is stale, or if
    /// `parent` is `child` itself or one of its descendants.
    pub fn set_parent(&mut self, child: WidgetId, parent: WidgetId) -> bool {
        let (Some(child_dense), Some(_)) =
            (self.get_dense_index(child), self.get_dense_index(parent))
        else {
            return false;
        };
        if self.is_ancestor_or_self(child, parent) {
            log::warn!("refusing to parent {child:?} under its own descendant {parent:?}");
            return false;
        }

        if let Some(old) = self.dense[child_dense].parent {
            if let Some(old_dense) = self.get_dense_index(old) {
                self.dense[old_dense].children.retain(|&c| c != child);
            }
        }

        self.dense[child_dense].parent = Some(parent);
        if let Some(parent_dense) = self.get_dense_index(parent) {
            self.dense[parent_dense].children.push(child);
        }
        true
    }

    /// Whether `ancestor` is `id` or lies on the path from `id` to its root.
    fn is_ancestor_or_self(&self, ancestor: WidgetId, id: WidgetId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.get_parent(c);
        }
        false
    }

    pub fn get_parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.get_dense_index(id)
            .and_then(|idx| self.dense[idx].parent)
    }

    /// Children in insertion order; empty for a stale id.
    pub fn get_children(&self, id: WidgetId) -> &[WidgetId] {
        self.get_dense_index(id)
            .map(|idx| self.dense[idx].children.as_slice())
            .unwrap_or(&[])
    }

    pub fn clear(&mut self) {
        self.dense.clear();
        self.sparse.clear();
        self.free_indices.clear();
    }

    pub fn widget_count(&self) -> usize {
        self.dense.len()
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
