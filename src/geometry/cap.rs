// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boundary loop stitching and cap construction
//!
//! Boundary edges from the splitter are welded by position, linked into
//! loops and each closed loop is triangulated on the plane. A loop closes
//! the negative piece with a cap facing +normal and the positive piece with
//! its mirror facing -normal.

use super::spatial_hash::SpatialHash;
use super::triangle_splitting::BoundaryEdge;
use super::{BoneWeight, Side, SlicePlane, Triangle, VertexAttributes};
use crate::utils::math::plane_basis;
use ahash::AHashMap;
use log::trace;
use nalgebra::{Point2, Point3, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Loops whose projected area is below this are dropped
const MIN_LOOP_AREA: f64 = 1e-12;

/// A chain of boundary vertices in walk order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryLoop {
    /// One representative vertex index per welded loop position
    pub vertices: Vec<u32>,
    /// Submesh bordering the first edge of the loop
    pub submesh: usize,
    /// The walk returned to its start vertex
    pub closed: bool,
}

/// Cut-surface geometry for one closed loop on one piece
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cap {
    pub side: Side,
    pub positions: Vec<Point3<f64>>,
    /// Outward normal of the cap (away from the piece it closes)
    pub normal: Vector3<f64>,
    pub bone_weights: Option<Vec<BoneWeight>>,
    /// Indices into `positions`, counter-clockwise around `normal`
    pub triangles: Vec<[u32; 3]>,
}

impl Cap {
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|i| self.positions[i as usize]);
                (b - a).cross(&(c - a)).norm() / 2.0
            })
            .sum()
    }
}

/// Link boundary edges into loops.
///
/// Endpoints are welded within `weld_tolerance`. An edge and its reverse on
/// the same list cancel out. Walks take outgoing edges in input order, so
/// the output is deterministic.
pub fn stitch_loops(edges: &[BoundaryEdge], positions: &[Point3<f64>], weld_tolerance: f64) -> Vec<BoundaryLoop> {
    let mut welder = SpatialHash::new(weld_tolerance);
    let welded: Vec<(u32, u32)> = edges
        .iter()
        .map(|e| {
            (
                welder.insert(positions[e.a as usize]),
                welder.insert(positions[e.b as usize]),
            )
        })
        .collect();

    // Cancel opposite duplicates and drop zero-length edges
    let mut live = vec![true; edges.len()];
    let mut pending: AHashMap<(u32, u32), Vec<usize>> = AHashMap::default();
    for (idx, &(wa, wb)) in welded.iter().enumerate() {
        if wa == wb {
            live[idx] = false;
            continue;
        }
        if let Some(partner) = pending.get_mut(&(wb, wa)).and_then(Vec::pop) {
            live[idx] = false;
            live[partner] = false;
        } else {
            pending.entry((wa, wb)).or_default().push(idx);
        }
    }

    let mut outgoing: AHashMap<u32, Vec<usize>> = AHashMap::default();
    for (idx, &(wa, _)) in welded.iter().enumerate() {
        if live[idx] {
            outgoing.entry(wa).or_default().push(idx);
        }
    }

    let mut used = vec![false; edges.len()];
    let mut loops = Vec::new();

    for first in 0..edges.len() {
        if !live[first] || used[first] {
            continue;
        }

        let start = welded[first].0;
        let mut vertices = Vec::new();
        let mut current = first;
        let closed = loop {
            used[current] = true;
            vertices.push(edges[current].a);

            let end = welded[current].1;
            if end == start {
                break true;
            }
            let next = outgoing
                .get(&end)
                .and_then(|candidates| candidates.iter().copied().find(|&e| !used[e]));
            match next {
                Some(next) => current = next,
                None => {
                    vertices.push(edges[current].b);
                    break false;
                }
            }
        };

        trace!(
            "Stitched {} loop with {} vertices",
            if closed { "closed" } else { "open" },
            vertices.len()
        );
        loops.push(BoundaryLoop {
            vertices,
            submesh: edges[first].submesh,
            closed,
        });
    }

    loops
}

/// Build the cap closing `side` over a closed loop.
///
/// The negative piece is closed by a cap facing +normal, the positive piece
/// by one facing -normal. New vertices are appended to `vertices` and cap
/// triangles to `out`, in `cap_submesh`. Returns `None` for open loops,
/// loops with fewer than three vertices and loops without area.
pub fn build_cap(
    boundary: &BoundaryLoop,
    plane: &SlicePlane,
    side: Side,
    vertices: &mut VertexAttributes,
    cap_submesh: usize,
    out: &mut Vec<Triangle>,
) -> Option<Cap> {
    if !boundary.closed || boundary.vertices.len() < 3 {
        return None;
    }

    let normal = plane.normal();
    let (u, v) = plane_basis(&normal);
    let mut order = boundary.vertices.clone();
    let mut points: Vec<Point2<f64>> = order
        .iter()
        .map(|&idx| {
            let p = vertices.positions[idx as usize];
            Point2::new(p.coords.dot(&u), p.coords.dot(&v))
        })
        .collect();

    let area = signed_area(&points);
    if area.abs() < MIN_LOOP_AREA {
        trace!("Dropping loop with {} vertices and area {:e}", order.len(), area);
        return None;
    }
    if area < 0.0 {
        order.reverse();
        points.reverse();
    }

    let local = triangulate_ear_clipping(&points).unwrap_or_else(|| {
        trace!("Ear clipping failed on {} vertices, using a fan", points.len());
        triangulate_fan(points.len())
    });

    let (cap_normal, tangent, flip_u) = match side {
        Side::Negative => (normal, u, 1.0),
        Side::Positive => (-normal, -u, -1.0),
    };

    let base = vertices.len() as u32;
    for (&source, point) in order.iter().zip(&points) {
        let idx = vertices.duplicate(source as usize) as usize;
        if let Some(normals) = vertices.normals.as_mut() {
            normals[idx] = cap_normal;
        }
        if let Some(uv) = vertices.uvs[0].as_mut() {
            uv[idx] = Vector2::new(point.x * flip_u, point.y);
        }
        if let Some(tangents) = vertices.tangents.as_mut() {
            tangents[idx] = Vector4::new(tangent.x, tangent.y, tangent.z, 1.0);
        }
    }

    // Counter-clockwise around +normal; the positive cap is wound the other way
    let triangles: Vec<[u32; 3]> = local
        .iter()
        .map(|&[a, b, c]| match side {
            Side::Negative => [a, b, c],
            Side::Positive => [a, c, b],
        })
        .collect();

    for tri in &triangles {
        let indices = tri.map(|i| base + i);
        let positions = indices.map(|i| vertices.positions[i as usize]);
        out.push(Triangle::new(indices, positions, cap_submesh, side));
    }

    let range = base as usize..base as usize + order.len();
    Some(Cap {
        side,
        positions: vertices.positions[range.clone()].to_vec(),
        normal: cap_normal,
        bone_weights: vertices.bone_weights.as_ref().map(|w| w[range].to_vec()),
        triangles,
    })
}

/// Twice-signed area divided by two (shoelace)
fn signed_area(points: &[Point2<f64>]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (p, q) = (points[i], points[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum::<f64>()
        / 2.0
}

fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Strictly inside a counter-clockwise triangle
fn point_in_triangle(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> bool {
    cross(a, b, p) > 0.0 && cross(b, c, p) > 0.0 && cross(c, a, p) > 0.0
}

#[derive(Clone, Default)]
struct EarVertex {
    active: bool,
    is_ear: bool,
    /// Cosine of the corner angle; sharper corners are clipped first
    pointiness: f64,
    prev: usize,
    next: usize,
}

fn update_ear(idx: usize, vertex: &mut EarVertex, points: &[Point2<f64>], active: &[bool]) -> bool {
    let p = points[idx];
    let p_prev = points[vertex.prev];
    let p_next = points[vertex.next];

    vertex.pointiness = (p_prev - p).normalize().dot(&(p_next - p).normalize());
    if vertex.pointiness.is_nan() {
        return false;
    }

    vertex.is_ear = cross(&p_prev, &p, &p_next) > 0.0
        && (0..points.len())
            .filter(|&i| active[i] && i != vertex.prev && i != idx && i != vertex.next)
            .all(|i| !point_in_triangle(&points[i], &p_prev, &p, &p_next));
    true
}

/// Ear clipping of a counter-clockwise simple polygon.
/// Returns `None` when no ear can be found.
pub fn triangulate_ear_clipping(points: &[Point2<f64>]) -> Option<Vec<[u32; 3]>> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    if n == 3 {
        return Some(vec![[0, 1, 2]]);
    }

    let mut info = vec![EarVertex::default(); n];
    for (i, vertex) in info.iter_mut().enumerate() {
        vertex.active = true;
        vertex.prev = if i == 0 { n - 1 } else { i - 1 };
        vertex.next = if i == n - 1 { 0 } else { i + 1 };
    }
    let mut active = vec![true; n];
    for i in 0..n {
        if !update_ear(i, &mut info[i], points, &active) {
            return None;
        }
    }

    let mut triangles = Vec::with_capacity(n - 2);
    for _ in 0..n - 3 {
        let (ear, _) = info
            .iter()
            .enumerate()
            .filter(|(_, v)| v.active && v.is_ear)
            .max_by(|(_, a), (_, b)| a.pointiness.total_cmp(&b.pointiness))?;

        let EarVertex { prev, next, .. } = info[ear];
        triangles.push([prev as u32, ear as u32, next as u32]);

        info[ear].active = false;
        active[ear] = false;
        info[prev].next = next;
        info[next].prev = prev;

        if !update_ear(prev, &mut info[prev], points, &active)
            || !update_ear(next, &mut info[next], points, &active)
        {
            return None;
        }
    }

    let (last, vertex) = info.iter().enumerate().find(|(_, v)| v.active)?;
    triangles.push([vertex.prev as u32, last as u32, vertex.next as u32]);
    Some(triangles)
}

/// Fan from the first vertex
pub fn triangulate_fan(n: usize) -> Vec<[u32; 3]> {
    (1..n.saturating_sub(1))
        .map(|i| [0, i as u32, i as u32 + 1])
        .collect()
}
