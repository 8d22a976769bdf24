use crate::error::ComposeError;
use crate::renderer::{GeometryContext, MaterialKey, ShaderId, TextureId};

use super::widget::{Color, Rect, Widget, WidgetFlags};

/// Border layer drawn on top of a panel's fill with its own material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Border {
    pub width: f32,
    pub color: Color,
    pub material: MaterialKey,
}

impl Border {
    pub fn new(width: f32, color: Color, material: MaterialKey) -> Self {
        Self {
            width,
            color,
            material,
        }
    }
}

/// A rectangle with an optional fill and border.
///
/// Without either it draws nothing and acts as a pure grouping or clipping
/// container. Builder methods configure a panel before it is registered;
/// the `set_*` methods mutate a live one and bump its version so cached
/// clip results for it and its subtree are recomputed.
#[derive(Debug, Clone)]
pub struct Panel {
    bounds: Rect,
    fill: Option<Color>,
    material: MaterialKey,
    uv: Rect,
    shader_override: Option<ShaderId>,
    border: Option<Border>,
    flags: WidgetFlags,
    opacity: f32,
    order: i32,
    version: u64,
}

impl Panel {
    pub fn new(bounds: Rect) -> Self {
        Self {
            bounds,
            fill: None,
            material: MaterialKey::default(),
            uv: Rect::new(0.0, 0.0, 1.0, 1.0),
            shader_override: None,
            border: None,
            flags: WidgetFlags::default(),
            opacity: 1.0,
            order: 0,
            version: 0,
        }
    }

    pub fn fill(mut self, color: Color) -> Self {
        self.fill = Some(color);
        self
    }

    pub fn material(mut self, material: MaterialKey) -> Self {
        self.material = material;
        self
    }

    /// Sample `uv` out of `texture` for the fill.
    pub fn texture(mut self, texture: TextureId, uv: Rect) -> Self {
        self.material.texture = Some(texture);
        self.uv = uv;
        self
    }

    pub fn shader_override(mut self, shader: ShaderId) -> Self {
        self.shader_override = Some(shader);
        self
    }

    pub fn border(mut self, border: Border) -> Self {
        self.border = Some(border);
        self
    }

    pub fn clip_children(mut self, clip: bool) -> Self {
        self.flags.set(WidgetFlags::CLIP_CHILDREN, clip);
        self
    }

    pub fn opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    pub fn set_bounds(&mut self, bounds: Rect) {
        if self.bounds != bounds {
            self.bounds = bounds;
            self.touch();
        }
    }

    /// Shift the panel by `(dx, dy)`, as a scroll container would.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        self.set_bounds(self.bounds.offset(dx, dy));
    }

    pub fn set_fill(&mut self, color: Option<Color>) {
        self.fill = color;
        self.touch();
    }

    pub fn set_material(&mut self, material: MaterialKey) {
        self.material = material;
        self.touch();
    }

    pub fn set_border(&mut self, border: Option<Border>) {
        self.border = border;
        self.touch();
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.touch();
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(WidgetFlags::VISIBLE, visible);
        self.touch();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.flags.set(WidgetFlags::ENABLED, enabled);
        self.touch();
    }

    pub fn set_order(&mut self, order: i32) {
        self.order = order;
        self.touch();
    }

    fn border_width(&self) -> f32 {
        self.border
            .map(|b| b.width.min(self.bounds.width * 0.5).min(self.bounds.height * 0.5))
            .unwrap_or(0.0)
            .max(0.0)
    }
}

impl Widget for Panel {
    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn flags(&self) -> WidgetFlags {
        self.flags
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }

    fn render_order(&self) -> i32 {
        self.order
    }

    fn produces_geometry(&self) -> bool {
        self.fill.is_some() || self.border.is_some()
    }

    /// Children are clipped to the area inside the border.
    fn clip_rect(&self) -> Rect {
        self.bounds.inset(self.border_width())
    }

    fn geometry(&self, ctx: &mut GeometryContext<'_>) -> Result<(), ComposeError> {
        let alpha = ctx.alpha();

        if let Some(fill) = self.fill {
            let quad = ctx.primitive(self.material);
            quad.shader_override = self.shader_override;
            quad.push_quad(self.bounds, self.uv, fill.with_opacity(alpha));
        }

        let width = self.border_width();
        if let Some(border) = self.border.filter(|_| width > 0.0) {
            let b = self.bounds;
            let color = border.color.with_opacity(alpha);
            let full = Rect::new(0.0, 0.0, 1.0, 1.0);
            let strips = [
                Rect::new(b.x, b.y, b.width, width),
                Rect::new(b.x, b.bottom() - width, b.width, width),
                Rect::new(b.x, b.y + width, width, b.height - 2.0 * width),
                Rect::new(b.right() - width, b.y + width, width, b.height - 2.0 * width),
            ];
            let layer = ctx.primitive(border.material);
            for strip in strips.into_iter().filter(|s| !s.is_empty()) {
                layer.push_quad(strip, full, color);
            }
        }

        Ok(())
    }
}
