//! Shared object pools for per-frame buffers.
//!
//! Primitive buffers, clip regions and batch buffers are recycled between
//! frames instead of reallocated. A [`Pool`] is a cheap clonable handle to a
//! mutex-guarded free list; [`Pool::obtain`] hands out a [`Pooled`] guard
//! that owns the object exclusively and returns it to the free list when it
//! is released or dropped.
//!
//! Ownership is enforced by the type system: `Pooled` is move-only, so a
//! released object cannot be touched again and cannot be released twice.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::constants::DEFAULT_POOL_MAX_IDLE;

/// Objects that can live in a [`Pool`].
pub trait Poolable: Default {
    /// Clear contents while keeping allocations, ready for the next owner.
    fn reset(&mut self);
}

struct PoolInner<T> {
    free: Mutex<Vec<T>>,
    /// Objects currently handed out.
    outstanding: AtomicUsize,
    /// Free objects beyond this are dropped instead of kept.
    max_idle: usize,
}

impl<T: Poolable> PoolInner<T> {
    fn put_back(&self, mut value: T) {
        self.outstanding.fetch_sub(1, Ordering::Relaxed);
        value.reset();
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        if free.len() < self.max_idle {
            free.push(value);
        }
    }
}

/// Clonable handle to a shared free list of `T`.
pub struct Pool<T: Poolable> {
    inner: Arc<PoolInner<T>>,
}

impl<T: Poolable> Pool<T> {
    pub fn new() -> Self {
        Self::with_max_idle(DEFAULT_POOL_MAX_IDLE)
    }

    /// Create a pool that keeps at most `max_idle` released objects around.
    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
                max_idle,
            }),
        }
    }

    /// Take an object from the pool (or allocate one). Always comes back empty.
    pub fn obtain(&self) -> Pooled<T> {
        let value = self
            .inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();
        self.inner.outstanding.fetch_add(1, Ordering::Relaxed);
        Pooled {
            value: Some(value),
            pool: Arc::clone(&self.inner),
        }
    }

    /// Number of objects currently owned by someone.
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Relaxed)
    }

    /// Number of released objects waiting for reuse.
    pub fn idle(&self) -> usize {
        self.inner
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<T: Poolable> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("outstanding", &self.outstanding())
            .field("idle", &self.idle())
            .finish()
    }
}

/// Exclusive ownership of a pooled object.
///
/// Dropping the guard releases the object; [`Pooled::release`] does the same
/// explicitly.
pub struct Pooled<T: Poolable> {
    value: Option<T>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Poolable> Pooled<T> {
    /// Give the object back to its pool.
    pub fn release(self) {
        drop(self);
    }

    /// Keep the object and stop tracking it; the pool forgets about it.
    pub fn detach(mut self) -> T {
        self.pool.outstanding.fetch_sub(1, Ordering::Relaxed);
        self.value.take().unwrap_or_default()
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // `value` is only None after `detach`, which consumes the guard.
        match self.value {
            Some(ref value) => value,
            None => unreachable!("pooled value accessed after detach"),
        }
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match self.value {
            Some(ref mut value) => value,
            None => unreachable!("pooled value accessed after detach"),
        }
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.put_back(value);
        }
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Debug)]
    struct Scratch {
        items: Vec<u32>,
        resets: u32,
    }

    impl Poolable for Scratch {
        fn reset(&mut self) {
            self.items.clear();
            self.resets += 1;
        }
    }

    #[test]
    fn test_obtain_release_reuses_allocation() {
        let pool: Pool<Scratch> = Pool::new();
        let mut a = pool.obtain();
        a.items.extend([1, 2, 3]);
        let capacity = a.items.capacity();
        a.release();

        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 1);

        let b = pool.obtain();
        assert!(b.items.is_empty());
        assert_eq!(b.items.capacity(), capacity);
        assert_eq!(b.resets, 1);
    }

    #[test]
    fn test_drop_releases_exactly_once() {
        let pool: Pool<Scratch> = Pool::new();
        {
            let _a = pool.obtain();
            let _b = pool.obtain();
            assert_eq!(pool.outstanding(), 2);
        }
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_max_idle_caps_free_list() {
        let pool: Pool<Scratch> = Pool::with_max_idle(1);
        let a = pool.obtain();
        let b = pool.obtain();
        a.release();
        b.release();
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn test_detach_stops_tracking() {
        let pool: Pool<Scratch> = Pool::new();
        let mut a = pool.obtain();
        a.items.push(7);
        let owned = a.detach();
        assert_eq!(owned.items, vec![7]);
        assert_eq!(pool.outstanding(), 0);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_is_shared_across_threads() {
        let pool: Pool<Scratch> = Pool::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut s = pool.obtain();
                        s.items.push(1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(pool.outstanding(), 0);
    }
}
