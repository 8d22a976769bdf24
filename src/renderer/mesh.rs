//! Compilation of draw batches into a single vertex/index buffer.

use std::ops::Range;

use crate::transform::Transform;
use crate::widgets::Color;

use super::batch::DrawBatch;
use super::primitive::MaterialKey;

/// Index range of one draw call inside a [`CompiledMesh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submesh {
    /// First index in `CompiledMesh::indices`.
    pub index_start: u32,
    pub index_count: u32,
    /// Material, texture and shader to bind for this range.
    pub material: MaterialKey,
}

impl Submesh {
    pub fn range(&self) -> Range<usize> {
        let start = self.index_start as usize;
        start..start + self.index_count as usize
    }
}

/// One frame's worth of UI geometry, ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledMesh {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub colors: Vec<Color>,
    pub indices: Vec<u32>,
    /// Draw calls in draw order.
    pub submeshes: Vec<Submesh>,
}

impl CompiledMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty every buffer, keeping capacity.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.uvs.clear();
        self.colors.clear();
        self.indices.clear();
        self.submeshes.clear();
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.submeshes.is_empty()
    }

    /// Start offset of every submesh in the index array.
    pub fn submesh_starts(&self) -> impl Iterator<Item = u32> + '_ {
        self.submeshes.iter().map(|s| s.index_start)
    }

    /// Materials in submesh order, for binding draw calls.
    pub fn materials(&self) -> impl Iterator<Item = MaterialKey> + '_ {
        self.submeshes.iter().map(|s| s.material)
    }

    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    pub fn uv_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.uvs)
    }

    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Packs batches into a [`CompiledMesh`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshCompiler {
    /// Applied once to every position after packing.
    world_to_local: Transform,
}

impl MeshCompiler {
    pub fn new(world_to_local: Transform) -> Self {
        Self { world_to_local }
    }

    /// Concatenate `batches` in order into `out`, replacing its contents.
    ///
    /// Empty batches are skipped, so every submesh has a non-zero range.
    pub fn compile(&self, batches: &[DrawBatch], out: &mut CompiledMesh) {
        out.clear();

        let (vertices, indices) = batches.iter().fold((0, 0), |(v, i), b| {
            (v + b.vertex_count(), i + b.buffer().indices.len())
        });
        out.positions.reserve(vertices);
        out.uvs.reserve(vertices);
        out.colors.reserve(vertices);
        out.indices.reserve(indices);
        out.submeshes.reserve(batches.len());

        for batch in batches.iter().filter(|b| !b.is_empty()) {
            let buffer = batch.buffer();
            let base = out.positions.len() as u32;
            let index_start = out.indices.len() as u32;

            out.positions.extend_from_slice(&buffer.positions);
            out.uvs.extend_from_slice(&buffer.uvs);
            out.colors.extend_from_slice(&buffer.colors);
            out.indices.extend(buffer.indices.iter().map(|i| i + base));

            out.submeshes.push(Submesh {
                index_start,
                index_count: buffer.indices.len() as u32,
                material: batch.key(),
            });
        }

        if !self.world_to_local.is_identity() {
            for p in &mut out.positions {
                *p = self.world_to_local.transform_point3(*p);
            }
        }
    }
}
