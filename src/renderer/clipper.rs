//! Triangle clipping against an ordered list of half-space planes.
//!
//! Every source triangle is clipped on its own: the triangle goes into a
//! working buffer, each plane rewrites that buffer into the other one
//! (Sutherland–Hodgman per triangle, splitting quads into two triangles),
//! and whatever survives the last plane is appended to the destination.

use crate::widgets::Color;

use super::clip::{dot, Plane};
use super::constants::{CLIP_TRIANGLE_CAPACITY, PARALLEL_EPSILON};
use super::primitive::RenderPrimitive;

/// Vertex carried through the clip: everything that interpolates.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ClipVertex {
    position: [f32; 3],
    uv: [f32; 2],
    color: Color,
}

impl ClipVertex {
    fn lerp(&self, other: &ClipVertex, t: f32) -> ClipVertex {
        let p = |a: f32, b: f32| a + (b - a) * t;
        ClipVertex {
            position: [
                p(self.position[0], other.position[0]),
                p(self.position[1], other.position[1]),
                p(self.position[2], other.position[2]),
            ],
            uv: [p(self.uv[0], other.uv[0]), p(self.uv[1], other.uv[1])],
            color: self.color.lerp(other.color, t),
        }
    }
}

type ClipTriangle = [ClipVertex; 3];

/// Where the edge from `inside` to `outside` crosses `plane`, as a
/// parametric distance along the edge.
///
/// Ray/plane intersection with `origin = inside` and
/// `direction = outside - inside`, clamped to the edge.
#[inline]
fn edge_crossing(plane: &Plane, inside: [f32; 3], outside: [f32; 3]) -> f32 {
    let direction = [
        outside[0] - inside[0],
        outside[1] - inside[1],
        outside[2] - inside[2],
    ];
    let denom = dot(plane.normal, direction);
    if denom.abs() < PARALLEL_EPSILON {
        return 0.0;
    }
    let t = (-plane.distance - dot(plane.normal, inside)) / denom;
    t.clamp(0.0, 1.0)
}

/// Clip one triangle against one plane, pushing 0, 1 or 2 triangles.
///
/// Output triangles keep the winding of the input.
fn clip_triangle(plane: &Plane, tri: &ClipTriangle, out: &mut Vec<ClipTriangle>) {
    let inside = [
        plane.signed_distance(tri[0].position) > 0.0,
        plane.signed_distance(tri[1].position) > 0.0,
        plane.signed_distance(tri[2].position) > 0.0,
    ];

    let cross = |from: &ClipVertex, to: &ClipVertex| {
        from.lerp(to, edge_crossing(plane, from.position, to.position))
    };

    match inside.iter().filter(|&&i| i).count() {
        3 => out.push(*tri),
        0 => {}
        1 => {
            // Rotate so `a` is the inside vertex, keeping cyclic order.
            let k = inside.iter().position(|&i| i).unwrap_or(0);
            let a = &tri[k];
            let b = &tri[(k + 1) % 3];
            let c = &tri[(k + 2) % 3];
            out.push([*a, cross(a, b), cross(a, c)]);
        }
        _ => {
            // Rotate so `c` is the single outside vertex.
            let k = inside.iter().position(|&i| !i).unwrap_or(0);
            let c = &tri[k];
            let a = &tri[(k + 1) % 3];
            let b = &tri[(k + 2) % 3];
            let bc = cross(b, c);
            let ac = cross(a, c);
            out.push([*a, *b, bc]);
            out.push([*a, bc, ac]);
        }
    }
}

/// Reusable clipper with ping-pong working buffers.
#[derive(Debug)]
pub struct Clipper {
    front: Vec<ClipTriangle>,
    back: Vec<ClipTriangle>,
}

impl Clipper {
    pub fn new() -> Self {
        Self::with_capacity(CLIP_TRIANGLE_CAPACITY)
    }

    /// Pre-size both working buffers for `triangles` triangles.
    pub fn with_capacity(triangles: usize) -> Self {
        Self {
            front: Vec::with_capacity(triangles),
            back: Vec::with_capacity(triangles),
        }
    }

    /// Clip `source` against `planes` and append the surviving triangles to
    /// `dest`. Returns the number of triangles appended.
    ///
    /// Positions are used as-is; transforms must already be baked. With no
    /// planes the source is appended unchanged, indices included.
    pub fn clip(
        &mut self,
        planes: &[Plane],
        source: &RenderPrimitive,
        dest: &mut RenderPrimitive,
    ) -> usize {
        if planes.is_empty() {
            dest.append(source);
            return source.triangle_count();
        }

        let mut emitted = 0;
        for tri in source.indices.chunks_exact(3) {
            self.front.clear();
            self.front.push([
                Self::vertex(source, tri[0]),
                Self::vertex(source, tri[1]),
                Self::vertex(source, tri[2]),
            ]);

            for plane in planes {
                self.back.clear();
                for t in &self.front {
                    clip_triangle(plane, t, &mut self.back);
                }
                std::mem::swap(&mut self.front, &mut self.back);
                if self.front.is_empty() {
                    break;
                }
            }

            for t in &self.front {
                let base = dest.push_vertex(t[0].position, t[0].uv, t[0].color);
                dest.push_vertex(t[1].position, t[1].uv, t[1].color);
                dest.push_vertex(t[2].position, t[2].uv, t[2].color);
                dest.push_triangle(base, base + 1, base + 2);
            }
            emitted += self.front.len();
        }

        crate::compose_stats::record_triangles_clipped(source.triangle_count(), emitted);
        emitted
    }

    fn vertex(source: &RenderPrimitive, index: u32) -> ClipVertex {
        let i = index as usize;
        ClipVertex {
            position: source.positions[i],
            uv: source.uvs[i],
            color: source.colors[i],
        }
    }
}

impl Default for Clipper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::primitive::MaterialKey;
    use crate::widgets::Rect;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    fn triangle(points: [[f32; 2]; 3]) -> RenderPrimitive {
        let mut p = RenderPrimitive::new(MaterialKey::solid(1));
        for (i, pt) in points.iter().enumerate() {
            p.push_vertex(
                [pt[0], pt[1], 0.0],
                [pt[0] / 10.0, pt[1] / 10.0],
                Color::rgba(0, 0, (i * 100) as u8, 255),
            );
        }
        p.push_triangle(0, 1, 2);
        p
    }

    /// Signed area of every triangle, summed (positive for the winding used
    /// in these tests).
    fn area(p: &RenderPrimitive) -> f32 {
        p.indices
            .chunks_exact(3)
            .map(|t| {
                let a = p.positions[t[0] as usize];
                let b = p.positions[t[1] as usize];
                let c = p.positions[t[2] as usize];
                ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])) * 0.5
            })
            .sum()
    }

    /// Keeps x < limit.
    fn keep_left_of(limit: f32) -> Plane {
        Plane::new([-1.0, 0.0, 0.0], limit)
    }

    fn clip_one(planes: &[Plane], source: &RenderPrimitive) -> RenderPrimitive {
        let mut dest = RenderPrimitive::new(source.material);
        Clipper::new().clip(planes, source, &mut dest);
        dest
    }

    #[test]
    fn test_fully_inside_copied_unmodified() {
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let out = clip_one(&[keep_left_of(10.0)], &src);
        assert_eq!(out.triangle_count(), 1);
        assert_eq!(out.positions, src.positions);
        assert_eq!(out.uvs, src.uvs);
        assert_eq!(out.colors, src.colors);
    }

    #[test]
    fn test_fully_outside_dropped() {
        let src = triangle([[20.0, 0.0], [24.0, 0.0], [20.0, 4.0]]);
        let out = clip_one(&[keep_left_of(10.0)], &src);
        assert_eq!(out.triangle_count(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_one_vertex_inside_gives_one_triangle() {
        // Right triangle with legs of 4; keep x > 2, only (4,0) survives.
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let out = clip_one(&[Plane::new([1.0, 0.0, 0.0], -2.0)], &src);
        assert_eq!(out.triangle_count(), 1);
        // Corner region of the triangle: legs of 2, area 2.
        assert!(approx_eq(area(&out), 2.0));
        assert_eq!(out.positions[0], [4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_two_vertices_inside_gives_quad_split() {
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let out = clip_one(&[keep_left_of(2.0)], &src);
        assert_eq!(out.triangle_count(), 2);
        // Full area 8 minus the clipped corner of area 2.
        assert!(approx_eq(area(&out), 6.0));
        assert!(out.positions.iter().all(|p| p[0] <= 2.0 + 1e-4));
    }

    #[test]
    fn test_interpolates_uv_and_color() {
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let out = clip_one(&[Plane::new([1.0, 0.0, 0.0], -2.0)], &src);
        // Inside vertex (4,0) -> (0,4) crossing is at (2,2): halfway.
        let mid = out
            .positions
            .iter()
            .position(|p| approx_eq(p[0], 2.0) && approx_eq(p[1], 2.0))
            .unwrap();
        assert!(approx_eq(out.uvs[mid][0], 0.2));
        assert!(approx_eq(out.uvs[mid][1], 0.2));
        // Blue 100 at vertex 1, 200 at vertex 2.
        assert_eq!(out.colors[mid].b, 150);
    }

    #[test]
    fn test_preserves_winding() {
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let sign = area(&src).signum();
        for plane in [keep_left_of(2.0), Plane::new([1.0, 0.0, 0.0], -2.0)] {
            let out = clip_one(&[plane], &src);
            for t in out.indices.chunks_exact(3) {
                let mut single = RenderPrimitive::default();
                for &i in t {
                    single.push_vertex(out.positions[i as usize], [0.0; 2], Color::WHITE);
                }
                single.push_triangle(0, 1, 2);
                assert_eq!(area(&single).signum(), sign);
            }
        }
    }

    #[test]
    fn test_area_matches_half_space_intersection() {
        // Square 0..10 clipped by a diagonal plane x + y < 10 keeps half.
        let mut src = RenderPrimitive::new(MaterialKey::solid(1));
        src.push_quad(
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Color::WHITE,
        );
        let n = std::f32::consts::FRAC_1_SQRT_2;
        let plane = Plane::new([-n, -n, 0.0], 10.0 * n);
        let out = clip_one(&[plane], &src);
        assert!(approx_eq(area(&out).abs(), 50.0));
    }

    #[test]
    fn test_rect_clip_clamps_to_region() {
        let mut src = RenderPrimitive::new(MaterialKey::solid(1));
        src.push_quad(
            Rect::new(180.0, 0.0, 40.0, 50.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Color::WHITE,
        );
        let planes = Plane::rect_edges(Rect::new(0.0, 0.0, 200.0, 100.0));
        let out = clip_one(&planes, &src);
        assert!(out.positions.iter().all(|p| p[0] <= 200.0 + 1e-4));
        assert!(approx_eq(area(&out).abs(), 20.0 * 50.0));
        // U runs 0..1 over x 180..220, so the clipped right edge sits at 0.5.
        let max_u = out.uvs.iter().map(|uv| uv[0]).fold(0.0f32, f32::max);
        assert!(approx_eq(max_u, 0.5));
    }

    #[test]
    fn test_empty_plane_list_is_merge_path() {
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let out = clip_one(&[], &src);
        assert_eq!(out.positions, src.positions);
        assert_eq!(out.indices, src.indices);
    }

    #[test]
    fn test_clipping_twice_is_identical() {
        let mut src = RenderPrimitive::new(MaterialKey::solid(1));
        src.push_quad(
            Rect::new(-5.0, -5.0, 30.0, 30.0),
            Rect::new(0.0, 0.0, 1.0, 1.0),
            Color::rgba(10, 20, 30, 40),
        );
        let planes = Plane::rect_edges(Rect::new(0.0, 0.0, 20.0, 20.0));
        let mut clipper = Clipper::new();
        let mut first = RenderPrimitive::default();
        let mut second = RenderPrimitive::default();
        clipper.clip(&planes, &src, &mut first);
        clipper.clip(&planes, &src, &mut second);
        assert_eq!(first.positions, second.positions);
        assert_eq!(first.uvs, second.uvs);
        assert_eq!(first.colors, second.colors);
        assert_eq!(first.indices, second.indices);
    }

    #[test]
    fn test_indices_relative_to_existing_dest() {
        let src = triangle([[0.0, 0.0], [4.0, 0.0], [0.0, 4.0]]);
        let mut dest = triangle([[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]);
        Clipper::new().clip(&[keep_left_of(2.0)], &src, &mut dest);
        assert_eq!(dest.vertex_count(), 3 + 6);
        assert_eq!(&dest.indices[3..], &[3, 4, 5, 6, 7, 8]);
        assert!(dest.validate(usize::MAX).is_ok());
    }

    #[test]
    fn test_vertices_on_plane_keep_full_area() {
        // Edge 0->1 lies exactly on the plane x = 0.
        let src = triangle([[0.0, 0.0], [0.0, 4.0], [4.0, 2.0]]);
        let out = clip_one(&[Plane::new([1.0, 0.0, 0.0], 0.0)], &src);
        assert!(out
            .positions
            .iter()
            .all(|p| p.iter().all(|v| v.is_finite())));
        assert!(approx_eq(area(&out).abs(), 8.0));
    }
}
