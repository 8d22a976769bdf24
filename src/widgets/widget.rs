use std::any::Any;

use bitflags::bitflags;

use crate::error::ComposeError;
use crate::renderer::{GeometryContext, Plane};

/// 8-bit RGBA vertex color.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
            a: 255,
        }
    }

    /// Scale alpha by `factor` (clamped to 0..=1).
    pub fn with_opacity(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }

    /// Per-channel linear interpolation, rounded to the nearest step.
    pub fn lerp(self, other: Color, t: f32) -> Self {
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rect from its min and max corners.
    pub fn from_corners(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    pub fn inset(&self, amount: f32) -> Self {
        Self {
            x: self.x + amount,
            y: self.y + amount,
            width: (self.width - amount * 2.0).max(0.0),
            height: (self.height - amount * 2.0).max(0.0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Overlap of two rects, clamped to a zero-sized rect when disjoint.
    pub fn intersect(&self, other: &Rect) -> Rect {
        let min_x = self.x.max(other.x);
        let min_y = self.y.max(other.y);
        let max_x = self.right().min(other.right());
        let max_y = self.bottom().min(other.bottom());
        Rect::new(min_x, min_y, (max_x - min_x).max(0.0), (max_y - min_y).max(0.0))
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }
}

bitflags! {
    /// Tree-level state the compositor reads before visiting a widget.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct WidgetFlags: u8 {
        /// Widget takes part in composition at all.
        const ENABLED = 1 << 0;
        /// Widget and its subtree should be drawn.
        const VISIBLE = 1 << 1;
        /// Descendants are clipped to this widget's clip planes.
        const CLIP_CHILDREN = 1 << 2;
    }
}

impl Default for WidgetFlags {
    fn default() -> Self {
        WidgetFlags::ENABLED | WidgetFlags::VISIBLE
    }
}

/// Downcast support for boxed widgets, implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A node in the widget tree as seen by the compositor.
///
/// Layout and input are someone else's job: by the time a pass runs,
/// `bounds` must already describe where the widget's geometry lands, in the
/// same space the geometry is produced in.
pub trait Widget: AsAny {
    /// Axis-aligned bounds used for the clip intersection test.
    fn bounds(&self) -> Rect;

    /// Monotonic counter, bumped whenever anything visual about the widget
    /// changes (bounds, colors, material, flags, opacity, clip planes).
    fn version(&self) -> u64;

    fn flags(&self) -> WidgetFlags {
        WidgetFlags::default()
    }

    /// Own opacity; the compositor multiplies it with the parent's.
    fn opacity(&self) -> f32 {
        1.0
    }

    /// Sibling ordering key. Lower values are drawn first.
    fn render_order(&self) -> i32 {
        0
    }

    /// Whether `geometry` can ever emit anything. Containers that only group
    /// or clip children return false and skip classification entirely.
    fn produces_geometry(&self) -> bool {
        true
    }

    /// Rectangle the children are clipped to when `CLIP_CHILDREN` is set.
    fn clip_rect(&self) -> Rect {
        self.bounds()
    }

    /// Half-space planes bounding the content area, in Left, Right, Top,
    /// Bottom order for rectangular widgets.
    fn clip_planes(&self, out: &mut Vec<Plane>) {
        out.extend(Plane::rect_edges(self.clip_rect()));
    }

    /// Emit zero or more primitives into the context.
    ///
    /// Returning `ComposeError::Invalidated` aborts the whole pass; the
    /// compositor retries on the next frame.
    fn geometry(&self, ctx: &mut GeometryContext<'_>) -> Result<(), ComposeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_lerp_midpoint() {
        let c = Color::rgba(0, 100, 200, 255).lerp(Color::rgba(100, 100, 0, 55), 0.5);
        assert_eq!(c, Color::rgba(50, 100, 100, 155));
    }

    #[test]
    fn test_color_with_opacity() {
        assert_eq!(Color::WHITE.with_opacity(0.5).a, 128);
        assert_eq!(Color::WHITE.with_opacity(2.0).a, 255);
    }

    #[test]
    fn test_rect_intersect_disjoint_is_empty() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(20.0, 0.0, 10.0, 10.0);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn test_rect_intersect_overlap() {
        let a = Rect::new(0.0, 0.0, 200.0, 100.0);
        let b = Rect::new(180.0, 0.0, 40.0, 50.0);
        assert_eq!(a.intersect(&b), Rect::new(180.0, 0.0, 20.0, 50.0));
    }

    #[test]
    fn test_default_flags_enabled_and_visible() {
        let flags = WidgetFlags::default();
        assert!(flags.contains(WidgetFlags::ENABLED | WidgetFlags::VISIBLE));
        assert!(!flags.contains(WidgetFlags::CLIP_CHILDREN));
    }
}
