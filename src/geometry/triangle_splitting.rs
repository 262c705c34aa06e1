// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle splitting along the slicing plane
//!
//! Straddling triangles are clipped against the plane into one polygon per
//! side. Edge intersections are computed once per undirected vertex pair with
//! the endpoints in a fixed order, so neighbouring triangles share
//! bit-identical cut points and the boundary loops can close.

use super::classification::TriangleClass;
use super::{Side, SlicePlane, Triangle, VertexAttributes};
use ahash::AHashMap;
use nalgebra::Point3;
use std::cmp::Ordering;

/// A cut-plane edge, oriented as it appears on the positive piece
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryEdge {
    pub a: u32,
    pub b: u32,
    pub submesh: usize,
}

impl BoundaryEdge {
    pub fn reversed(self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            submesh: self.submesh,
        }
    }
}

/// What happened to a straddling triangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitEvent {
    /// Pieces were emitted on both sides, separated by this edge
    Split(BoundaryEdge),
    /// The two cut points coincided and the whole triangle went to one side
    Sliver(Side),
}

#[derive(Debug, Clone, Copy)]
struct PolyVertex {
    index: u32,
    on_plane: bool,
}

/// Splits straddling triangles against one plane, appending cut vertices to
/// a shared attribute buffer
pub struct TriangleSplitter<'a> {
    plane: SlicePlane,
    vertices: &'a mut VertexAttributes,
    intersections: AHashMap<(u32, u32), u32>,
    weld_tolerance: f64,
}

impl<'a> TriangleSplitter<'a> {
    pub fn new(plane: SlicePlane, vertices: &'a mut VertexAttributes, weld_tolerance: f64) -> Self {
        Self {
            plane,
            vertices,
            intersections: AHashMap::default(),
            weld_tolerance,
        }
    }

    pub fn plane(&self) -> &SlicePlane {
        &self.plane
    }

    /// Number of distinct cut vertices created so far
    pub fn intersection_count(&self) -> usize {
        self.intersections.len()
    }

    /// Split one straddling triangle, pushing its pieces to `out`
    pub fn split(
        &mut self,
        indices: [u32; 3],
        submesh: usize,
        class: &TriangleClass,
        out: &mut Vec<Triangle>,
    ) -> SplitEvent {
        let d = class.distances;
        let mut positive: Vec<PolyVertex> = Vec::with_capacity(4);
        let mut negative: Vec<PolyVertex> = Vec::with_capacity(4);

        for i in 0..3 {
            let j = (i + 1) % 3;
            let vertex = PolyVertex {
                index: indices[i],
                on_plane: d[i] == 0.0,
            };
            if d[i] >= 0.0 {
                positive.push(vertex);
            }
            if d[i] <= 0.0 {
                negative.push(vertex);
            }
            if (d[i] > 0.0 && d[j] < 0.0) || (d[i] < 0.0 && d[j] > 0.0) {
                let cut = PolyVertex {
                    index: self.edge_vertex(indices[i], indices[j], d[i], d[j]),
                    on_plane: true,
                };
                positive.push(cut);
                negative.push(cut);
            }
        }

        let Some(k) = (0..positive.len())
            .find(|&k| positive[k].on_plane && positive[(k + 1) % positive.len()].on_plane)
        else {
            unreachable!("straddling triangle without a cut edge");
        };
        let edge = BoundaryEdge {
            a: positive[k].index,
            b: positive[(k + 1) % positive.len()].index,
            submesh,
        };

        let pa = self.position(edge.a);
        let pb = self.position(edge.b);
        if (pa - pb).norm() <= self.weld_tolerance {
            let heaviest = (0..3)
                .max_by(|&x, &y| d[x].abs().total_cmp(&d[y].abs()))
                .unwrap_or(0);
            let side = Side::of_distance(d[heaviest]);
            out.push(Triangle::new(indices, self.positions(indices), submesh, side));
            return SplitEvent::Sliver(side);
        }

        self.fan(&positive, submesh, Side::Positive, out);
        self.fan(&negative, submesh, Side::Negative, out);
        SplitEvent::Split(edge)
    }

    /// Fan-triangulate a clipped polygon starting at its first cut vertex
    fn fan(&self, polygon: &[PolyVertex], submesh: usize, side: Side, out: &mut Vec<Triangle>) {
        let n = polygon.len();
        let start = polygon.iter().position(|v| v.on_plane).unwrap_or(0);
        let apex = polygon[start].index;

        for step in 1..n - 1 {
            let indices = [
                apex,
                polygon[(start + step) % n].index,
                polygon[(start + step + 1) % n].index,
            ];
            out.push(Triangle::new(indices, self.positions(indices), submesh, side));
        }
    }

    /// Cut vertex on the edge between `a` and `b`, created on first request
    fn edge_vertex(&mut self, a: u32, b: u32, da: f64, db: f64) -> u32 {
        let key = if a < b { (a, b) } else { (b, a) };
        if let Some(&index) = self.intersections.get(&key) {
            return index;
        }

        // Interpolate from the lexicographically smaller endpoint so that any
        // triangle sharing these positions computes the same point
        let (pa, pb) = (self.position(a), self.position(b));
        let ((first, d_first, p_first), (second, d_second, p_second)) =
            match compare_points(&pa, &pb).then(a.cmp(&b)) {
                Ordering::Greater => ((b, db, pb), (a, da, pa)),
                _ => ((a, da, pa), (b, db, pb)),
            };

        let t = d_first / (d_first - d_second);
        let position = p_first + (p_second - p_first) * t;
        let index = self
            .vertices
            .push_interpolated(first as usize, second as usize, t, position);

        self.intersections.insert(key, index);
        index
    }

    #[inline]
    fn position(&self, index: u32) -> Point3<f64> {
        self.vertices.positions[index as usize]
    }

    #[inline]
    fn positions(&self, indices: [u32; 3]) -> [Point3<f64>; 3] {
        indices.map(|i| self.position(i))
    }
}

/// Lexicographic order on coordinates
fn compare_points(a: &Point3<f64>, b: &Point3<f64>) -> Ordering {
    a.x.total_cmp(&b.x)
        .then(a.y.total_cmp(&b.y))
        .then(a.z.total_cmp(&b.z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::classification::classify_triangle;
    use nalgebra::{Vector2, Vector3};

    fn plane() -> SlicePlane {
        SlicePlane::new(Vector3::x(), 0.0).unwrap()
    }

    fn area(triangles: &[Triangle]) -> f64 {
        triangles.iter().map(Triangle::area).sum()
    }

    fn split_one(
        positions: Vec<Point3<f64>>,
        uvs: Option<Vec<Vector2<f64>>>,
    ) -> (VertexAttributes, Vec<Triangle>, SplitEvent) {
        let mut vertices = VertexAttributes::from_positions(positions);
        vertices.uvs[0] = uvs;
        let tri = [vertices.positions[0], vertices.positions[1], vertices.positions[2]];
        let class = classify_triangle(&tri, &plane(), 1e-5);

        let mut out = Vec::new();
        let event = {
            let mut splitter = TriangleSplitter::new(plane(), &mut vertices, 1e-6);
            splitter.split([0, 1, 2], 0, &class, &mut out)
        };
        (vertices, out, event)
    }

    #[test]
    fn test_split_one_vs_two() {
        let positions = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
        ];
        let uvs = vec![Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), Vector2::new(1.0, 1.0)];
        let (vertices, out, event) = split_one(positions.clone(), Some(uvs));

        let negative: Vec<_> = out.iter().filter(|t| t.side == Side::Negative).copied().collect();
        let positive: Vec<_> = out.iter().filter(|t| t.side == Side::Positive).copied().collect();
        assert_eq!(negative.len(), 1);
        assert_eq!(positive.len(), 2);
        assert_eq!(vertices.len(), 5);

        let original = Triangle::new([0, 1, 2], [positions[0], positions[1], positions[2]], 0, Side::Positive);
        assert!((area(&out) - original.area()).abs() < 1e-12);

        // Cut vertices lie on the plane and carry interpolated UVs
        let uv = vertices.uvs[0].as_ref().unwrap();
        for idx in 3..5 {
            assert_eq!(vertices.positions[idx].x, 0.0);
            assert!((uv[idx].x - 0.5).abs() < 1e-12);
        }

        match event {
            SplitEvent::Split(edge) => {
                assert!(edge.a >= 3 && edge.b >= 3 && edge.a != edge.b);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Winding is preserved on every piece
        let n = original.normal();
        assert!(out.iter().all(|t| t.normal().dot(&n) > 0.0));
    }

    #[test]
    fn test_split_through_vertex() {
        let positions = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let (vertices, out, event) = split_one(positions, None);

        assert_eq!(out.len(), 2);
        assert_eq!(vertices.len(), 4);
        assert_eq!(out.iter().filter(|t| t.side == Side::Positive).count(), 1);
        match event {
            SplitEvent::Split(edge) => {
                let mut ends = [edge.a, edge.b];
                ends.sort();
                assert_eq!(ends, [0, 3]);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_boundary_edge_follows_positive_winding() {
        let positions = vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
        ];
        let (vertices, out, event) = split_one(positions, None);
        let SplitEvent::Split(edge) = event else {
            panic!("expected a split");
        };

        // The directed edge a -> b occurs in exactly one positive piece
        let occurs = |t: &Triangle| (0..3).any(|i| t.indices[i] == edge.a && t.indices[(i + 1) % 3] == edge.b);
        assert_eq!(out.iter().filter(|t| t.side == Side::Positive && occurs(t)).count(), 1);
        assert_eq!(out.iter().filter(|t| t.side == Side::Negative && occurs(t)).count(), 0);
        assert_eq!(vertices.positions[edge.a as usize].x, 0.0);
    }

    #[test]
    fn test_shared_edge_is_bit_identical() {
        // Two triangles sharing the crossing edge (0, 1) with opposite winding,
        // stored with separate vertices to defeat the index cache
        let a = Point3::new(-0.37, 0.11, 0.3);
        let b = Point3::new(0.91, -0.23, 0.7);
        let mut vertices = VertexAttributes::from_positions(vec![
            a,
            b,
            Point3::new(0.5, 1.0, 0.0),
            b,
            a,
            Point3::new(0.5, -1.0, 0.0),
        ]);

        let first = [0u32, 1, 2];
        let second = [3u32, 4, 5];
        let mut out = Vec::new();
        let mut splitter = TriangleSplitter::new(plane(), &mut vertices, 1e-6);
        let mut cut_points = Vec::new();
        for tri in [first, second] {
            let positions = tri.map(|i| splitter.position(i));
            let class = classify_triangle(&positions, &plane(), 1e-5);
            splitter.split(tri, 0, &class, &mut out);
        }
        for index in 6..splitter.vertices.len() as u32 {
            cut_points.push(splitter.position(index));
        }

        let on_shared: Vec<_> = cut_points
            .iter()
            .filter(|p| (p.z - 0.3).abs() < 0.4 && p.y.abs() < 0.2)
            .collect();
        assert!(on_shared.len() >= 2);
        assert!(on_shared.windows(2).any(|w| w[0] == w[1]));
    }

    #[test]
    fn test_sliver_goes_to_heavier_side() {
        // Vertex 0 sits just beyond the snap band, so both cuts land on it
        let positions = vec![
            Point3::new(-2e-5, 0.0, 0.0),
            Point3::new(1.0, -1e-9, 0.0),
            Point3::new(1.0, 1e-9, 0.0),
        ];
        let mut vertices = VertexAttributes::from_positions(positions);
        let tri = [vertices.positions[0], vertices.positions[1], vertices.positions[2]];
        let class = classify_triangle(&tri, &plane(), 1e-5);
        let mut out = Vec::new();
        let event = TriangleSplitter::new(plane(), &mut vertices, 1e-3).split([0, 1, 2], 0, &class, &mut out);

        assert_eq!(event, SplitEvent::Sliver(Side::Positive));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].indices, [0, 1, 2]);
    }
}
