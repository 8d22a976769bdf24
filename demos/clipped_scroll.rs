//! A scrolled list inside a clipping viewport.
//!
//! Rows scroll upward a few pixels per frame; rows leaving the viewport are
//! clipped, rows fully outside are discarded, and the compiled batches are
//! printed each frame.
//!
//! ```bash
//! RUST_LOG=debug cargo run --example clipped_scroll --features compose-stats
//! ```

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use stratum::prelude::*;

const ROW_HEIGHT: f32 = 24.0;
const ROWS: usize = 12;

/// A list row that follows a shared scroll offset.
struct Row {
    base: Rect,
    material: MaterialKey,
    color: Color,
    scroll: Rc<Cell<f32>>,
}

impl Widget for Row {
    fn bounds(&self) -> Rect {
        self.base.offset(0.0, -self.scroll.get())
    }

    fn version(&self) -> u64 {
        self.scroll.get().to_bits() as u64
    }

    fn geometry(&self, ctx: &mut GeometryContext<'_>) -> Result<(), ComposeError> {
        let alpha = ctx.alpha();
        ctx.primitive(self.material).push_quad(
            self.bounds(),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            self.color.with_opacity(alpha),
        );
        Ok(())
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scroll = Rc::new(Cell::new(0.0f32));
    let mut tree = Tree::new();
    let window = tree.register(Box::new(Panel::new(Rect::new(0.0, 0.0, 320.0, 240.0))));
    let viewport = tree
        .add_child(
            window,
            Box::new(
                Panel::new(Rect::new(20.0, 20.0, 200.0, 120.0))
                    .fill(Color::from_hex(0x202030))
                    .material(MaterialKey::solid(0))
                    .border(Border::new(2.0, Color::from_hex(0x8080ff), MaterialKey::solid(1)))
                    .clip_children(true),
            ),
        )
        .expect("window was just registered");

    for i in 0..ROWS {
        let textured = i % 3 == 2;
        let material = if textured {
            MaterialKey::new(MaterialId(2), Some(TextureId(1)), ShaderId(0))
        } else {
            MaterialKey::solid(2)
        };
        tree.add_child(
            viewport,
            Box::new(Row {
                base: Rect::new(24.0, 24.0 + i as f32 * ROW_HEIGHT, 192.0, ROW_HEIGHT - 2.0),
                material,
                color: Color::rgb(200, 200, 200).lerp(Color::rgb(80, 160, 240), i as f32 / ROWS as f32),
                scroll: scroll.clone(),
            }),
        );
    }

    let mut compositor = Compositor::new(
        CompositorConfig::default().frame_budget(Duration::from_millis(2)),
        ComposeResources::new(),
    );
    let mut cache = ClipCache::new();

    for frame in 0..6 {
        scroll.set(frame as f32 * 30.0);
        match compositor.compose(&tree, window, &mut cache) {
            ComposeStatus::Published => {}
            ComposeStatus::NeedsRetry => {
                log::info!("frame {frame} skipped, retrying next frame");
                continue;
            }
        }

        let mesh = compositor.mesh();
        println!(
            "frame {frame}: scroll {:>5.1}  {} widgets, {} vertices, {} draw calls",
            scroll.get(),
            compositor.rendered_widgets().len(),
            mesh.vertex_count(),
            mesh.submeshes.len()
        );
        for sub in &mesh.submeshes {
            println!(
                "    indices {:>4}..{:<4} material {:?} texture {:?}",
                sub.index_start,
                sub.index_start + sub.index_count,
                sub.material.material,
                sub.material.texture
            );
        }
    }

    println!(
        "clip cache: {} entries, {} hits, {} misses",
        cache.len(),
        cache.hits(),
        cache.misses()
    );
}
