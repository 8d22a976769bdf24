//! Triangle buffers produced by widgets and accumulated into batches.

use crate::error::GeometryError;
use crate::transform::Transform;
use crate::widgets::{Color, Rect};

use super::pool::Poolable;

/// Identity of a material (blend state, uniforms) as known to the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Identity of a bound texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Identity of a shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Everything that forces a new draw call when it changes.
///
/// Two primitives can share a batch only if their keys are identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MaterialKey {
    pub material: MaterialId,
    pub texture: Option<TextureId>,
    pub shader: ShaderId,
}

impl MaterialKey {
    pub fn new(material: MaterialId, texture: Option<TextureId>, shader: ShaderId) -> Self {
        Self {
            material,
            texture,
            shader,
        }
    }

    /// Untextured key using the material's default shader.
    pub fn solid(material: u32) -> Self {
        Self::new(MaterialId(material), None, ShaderId::default())
    }
}

/// Geometry for one widget fragment, or the accumulated contents of a batch.
///
/// `positions`, `uvs` and `colors` are parallel arrays; `indices` holds
/// triangles as consecutive triples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderPrimitive {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<Color>,
    pub indices: Vec<u32>,
    pub material: MaterialKey,
    /// Replaces `material.shader` when batching.
    pub shader_override: Option<ShaderId>,
    /// Local-to-world transform for `positions`.
    pub transform: Transform,
}

impl RenderPrimitive {
    pub fn new(material: MaterialKey) -> Self {
        Self {
            material,
            ..Self::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Key used for batch selection, with the shader override applied.
    pub fn batch_key(&self) -> MaterialKey {
        MaterialKey {
            shader: self.shader_override.unwrap_or(self.material.shader),
            ..self.material
        }
    }

    /// Append one vertex and return its index.
    pub fn push_vertex(&mut self, position: [f32; 3], uv: [f32; 2], color: Color) -> u32 {
        let index = self.positions.len() as u32;
        self.positions.push(position);
        self.uvs.push(uv);
        self.colors.push(color);
        index
    }

    pub fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    /// Append an axis-aligned quad as two clockwise (y-down) triangles.
    pub fn push_quad(&mut self, rect: Rect, uv: Rect, color: Color) {
        let tl = self.push_vertex([rect.x, rect.y, 0.0], [uv.x, uv.y], color);
        let tr = self.push_vertex([rect.right(), rect.y, 0.0], [uv.right(), uv.y], color);
        let br = self.push_vertex(
            [rect.right(), rect.bottom(), 0.0],
            [uv.right(), uv.bottom()],
            color,
        );
        let bl = self.push_vertex([rect.x, rect.bottom(), 0.0], [uv.x, uv.bottom()], color);
        self.push_triangle(tl, tr, br);
        self.push_triangle(tl, br, bl);
    }

    /// Append another primitive's geometry, re-basing its indices.
    pub fn append(&mut self, other: &RenderPrimitive) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.uvs.extend_from_slice(&other.uvs);
        self.colors.extend_from_slice(&other.colors);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Move positions into world space and reset the transform to identity.
    pub fn bake_transform(&mut self) {
        if self.transform.is_identity() {
            return;
        }
        let transform = self.transform;
        for p in &mut self.positions {
            *p = transform.transform_point3(*p);
        }
        self.transform = Transform::IDENTITY;
    }

    /// Check the buffer invariants.
    pub fn validate(&self, max_vertices: usize) -> Result<(), GeometryError> {
        let vertex_count = self.positions.len();
        if self.uvs.len() != vertex_count || self.colors.len() != vertex_count {
            return Err(GeometryError::LengthMismatch {
                positions: vertex_count,
                uvs: self.uvs.len(),
                colors: self.colors.len(),
            });
        }
        if vertex_count > max_vertices {
            return Err(GeometryError::TooManyVertices {
                count: vertex_count,
                limit: max_vertices,
            });
        }
        if self.indices.len() % 3 != 0 {
            return Err(GeometryError::PartialTriangle(self.indices.len()));
        }
        if let Some(&index) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(GeometryError::IndexOutOfRange {
                index,
                vertex_count,
            });
        }
        Ok(())
    }
}

impl Poolable for RenderPrimitive {
    fn reset(&mut self) {
        self.positions.clear();
        self.uvs.clear();
        self.colors.clear();
        self.indices.clear();
        self.material = MaterialKey::default();
        self.shader_override = None;
        self.transform = Transform::IDENTITY;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::constants::MAX_VERTICES_PER_PRIMITIVE as MAX;

    fn unit_uv() -> Rect {
        Rect::new(0.0, 0.0, 1.0, 1.0)
    }

    #[test]
    fn test_push_quad_layout() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(1));
        p.push_quad(Rect::new(10.0, 20.0, 30.0, 40.0), unit_uv(), Color::WHITE);
        assert_eq!(p.vertex_count(), 4);
        assert_eq!(p.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(p.positions[2], [40.0, 60.0, 0.0]);
        assert_eq!(p.uvs[2], [1.0, 1.0]);
        assert!(p.validate(MAX).is_ok());
    }

    #[test]
    fn test_append_rebases_indices() {
        let mut a = RenderPrimitive::new(MaterialKey::solid(1));
        a.push_quad(Rect::new(0.0, 0.0, 1.0, 1.0), unit_uv(), Color::WHITE);
        let mut b = RenderPrimitive::new(MaterialKey::solid(1));
        b.push_quad(Rect::new(5.0, 5.0, 1.0, 1.0), unit_uv(), Color::BLACK);

        a.append(&b);
        assert_eq!(a.vertex_count(), 8);
        assert_eq!(&a.indices[6..], &[4, 5, 6, 4, 6, 7]);
        assert_eq!(a.colors[4], Color::BLACK);
    }

    #[test]
    fn test_batch_key_applies_shader_override() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(3));
        assert_eq!(p.batch_key().shader, ShaderId(0));
        p.shader_override = Some(ShaderId(9));
        assert_eq!(p.batch_key().shader, ShaderId(9));
        assert_eq!(p.batch_key().material, MaterialId(3));
    }

    #[test]
    fn test_bake_transform_moves_to_world() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(1));
        p.push_quad(Rect::new(0.0, 0.0, 10.0, 10.0), unit_uv(), Color::WHITE);
        p.transform = Transform::translate(100.0, 50.0, 0.0);
        p.bake_transform();
        assert_eq!(p.positions[0], [100.0, 50.0, 0.0]);
        assert!(p.transform.is_identity());
    }

    #[test]
    fn test_validate_length_mismatch() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(1));
        p.push_quad(Rect::new(0.0, 0.0, 1.0, 1.0), unit_uv(), Color::WHITE);
        p.uvs.pop();
        assert!(matches!(
            p.validate(MAX),
            Err(GeometryError::LengthMismatch { uvs: 3, .. })
        ));
    }

    #[test]
    fn test_validate_index_out_of_range() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(1));
        p.push_vertex([0.0; 3], [0.0; 2], Color::WHITE);
        p.push_triangle(0, 0, 1);
        assert_eq!(
            p.validate(MAX),
            Err(GeometryError::IndexOutOfRange {
                index: 1,
                vertex_count: 1
            })
        );
    }

    #[test]
    fn test_validate_partial_triangle_and_limit() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(1));
        p.push_quad(Rect::new(0.0, 0.0, 1.0, 1.0), unit_uv(), Color::WHITE);
        assert_eq!(
            p.validate(3),
            Err(GeometryError::TooManyVertices { count: 4, limit: 3 })
        );
        p.indices.push(0);
        assert_eq!(p.validate(MAX), Err(GeometryError::PartialTriangle(7)));
    }

    #[test]
    fn test_reset_clears_but_keeps_capacity() {
        let mut p = RenderPrimitive::new(MaterialKey::solid(4));
        p.push_quad(Rect::new(0.0, 0.0, 1.0, 1.0), unit_uv(), Color::WHITE);
        p.shader_override = Some(ShaderId(2));
        let cap = p.positions.capacity();
        p.reset();
        assert!(p.is_empty());
        assert!(p.indices.is_empty());
        assert_eq!(p.material, MaterialKey::default());
        assert_eq!(p.shader_override, None);
        assert_eq!(p.positions.capacity(), cap);
    }
}
