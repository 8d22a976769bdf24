//! Compose statistics for debugging and performance analysis.
//!
//! Enable by compiling with the `compose-stats` feature:
//! ```bash
//! cargo run --example clipped_scroll --features compose-stats
//! ```
//!
//! Stats are printed every second when enabled, showing:
//! - Pass counts (published vs aborted)
//! - Clip cache hits/misses
//! - Triangles fed to and emitted by the clipper
//! - Draw batches emitted and widgets rejected for invalid geometry

/// Snapshot of accumulated compose statistics.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub passes_published: u64,
    pub passes_aborted: u64,
    pub clip_cache_hits: u64,
    pub clip_cache_misses: u64,
    pub triangles_clipped_in: u64,
    pub triangles_clipped_out: u64,
    pub batches_emitted: u64,
    pub widgets_rejected: u64,
}

#[cfg(feature = "compose-stats")]
mod inner {
    use std::cell::RefCell;
    use std::time::Instant;

    use super::StatsSnapshot;

    thread_local! {
        static STATS: RefCell<ComposeStats> = RefCell::new(ComposeStats::new());
    }

    struct ComposeStats {
        counters: StatsSnapshot,
        last_print: Instant,
    }

    impl ComposeStats {
        fn new() -> Self {
            Self {
                counters: StatsSnapshot::default(),
                last_print: Instant::now(),
            }
        }

        fn reset(&mut self) {
            self.counters = StatsSnapshot::default();
            self.last_print = Instant::now();
        }
    }

    fn update(f: impl FnOnce(&mut StatsSnapshot)) {
        STATS.with(|s| f(&mut s.borrow_mut().counters));
    }

    /// Record a widget whose cached classification was reused.
    #[inline]
    pub fn record_clip_cache_hit() {
        update(|s| s.clip_cache_hits += 1);
    }

    /// Record a widget that needed a fresh box/plane test.
    #[inline]
    pub fn record_clip_cache_miss() {
        update(|s| s.clip_cache_misses += 1);
    }

    /// Record one clipper invocation.
    #[inline]
    pub fn record_triangles_clipped(input: usize, output: usize) {
        update(|s| {
            s.triangles_clipped_in += input as u64;
            s.triangles_clipped_out += output as u64;
        });
    }

    #[inline]
    pub fn record_pass_published() {
        update(|s| s.passes_published += 1);
    }

    #[inline]
    pub fn record_pass_aborted() {
        update(|s| s.passes_aborted += 1);
    }

    #[inline]
    pub fn record_batches(count: usize) {
        update(|s| s.batches_emitted += count as u64);
    }

    /// Record a widget skipped because its geometry failed validation.
    #[inline]
    pub fn record_widget_rejected() {
        update(|s| s.widgets_rejected += 1);
    }

    /// Return a snapshot of the current stats (for testing).
    pub fn get_stats() -> StatsSnapshot {
        STATS.with(|s| s.borrow().counters.clone())
    }

    /// Reset all stats to zero (for test isolation).
    pub fn reset_stats() {
        STATS.with(|s| s.borrow_mut().reset());
    }

    /// Called at the end of each pass to potentially print stats.
    pub fn end_pass() {
        STATS.with(|s| {
            let mut stats = s.borrow_mut();
            if stats.last_print.elapsed().as_secs() < 1 {
                return;
            }

            let c = &stats.counters;
            let lookups = c.clip_cache_hits + c.clip_cache_misses;
            let hit_rate = if lookups > 0 {
                (c.clip_cache_hits as f64 / lookups as f64) * 100.0
            } else {
                0.0
            };

            eprintln!(
                "[Compose Stats] passes={} published={} aborted={}",
                c.passes_published + c.passes_aborted,
                c.passes_published,
                c.passes_aborted
            );
            eprintln!(
                "  clip cache: lookups={} hits={} misses={} hit_rate={:.1}%",
                lookups, c.clip_cache_hits, c.clip_cache_misses, hit_rate
            );
            eprintln!(
                "  clipper: triangles_in={} triangles_out={}",
                c.triangles_clipped_in, c.triangles_clipped_out
            );
            eprintln!(
                "  batches={} rejected_widgets={}",
                c.batches_emitted, c.widgets_rejected
            );

            stats.reset();
        });
    }
}

#[cfg(feature = "compose-stats")]
pub use inner::*;

// No-op implementations when feature is disabled - these get completely inlined away

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn get_stats() -> StatsSnapshot {
    StatsSnapshot::default()
}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn reset_stats() {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_clip_cache_hit() {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_clip_cache_miss() {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_triangles_clipped(_input: usize, _output: usize) {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_pass_published() {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_pass_aborted() {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_batches(_count: usize) {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn record_widget_rejected() {}

#[cfg(not(feature = "compose-stats"))]
#[inline(always)]
pub fn end_pass() {}
