// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle-triangle overlap test (Möller, interval method)
//! with a coplanar fallback and a BVH-pruned soup-against-soup variant

use super::{BoundingBox, BVH};
use crate::utils::math::projection_axes;
use nalgebra::{Point3, Vector3};

/// Test whether two triangles touch or intersect.
///
/// `epsilon` is a distance: vertices closer than it to the other triangle's
/// plane count as lying on that plane, both for the early rejection tests and
/// for deciding that the triangles are coplanar.
pub fn triangles_overlap(t1: &[Point3<f64>; 3], t2: &[Point3<f64>; 3], epsilon: f64) -> bool {
    let n2 = (t2[1] - t2[0]).cross(&(t2[2] - t2[0]));
    let dv = plane_distances(t1, &n2, &t2[0], epsilon);
    if dv[0] * dv[1] > 0.0 && dv[0] * dv[2] > 0.0 {
        return false;
    }

    let n1 = (t1[1] - t1[0]).cross(&(t1[2] - t1[0]));
    let du = plane_distances(t2, &n1, &t1[0], epsilon);
    if du[0] * du[1] > 0.0 && du[0] * du[2] > 0.0 {
        return false;
    }

    // Project onto the dominant axis of the intersection line
    let direction = n1.cross(&n2);
    let axis = crate::utils::math::dominant_axis(&direction);
    let vp = t1.map(|p| p[axis]);
    let up = t2.map(|p| p[axis]);

    let Some(i1) = compute_interval(vp, dv) else {
        return coplanar_overlap(&n1, t1, t2);
    };
    let Some(i2) = compute_interval(up, du) else {
        return coplanar_overlap(&n1, t1, t2);
    };

    !(i1.1 < i2.0 || i2.1 < i1.0)
}

/// Scaled plane distances of `points` against the plane through `origin`
/// with normal `normal`, snapped to zero within `epsilon` (a true distance).
fn plane_distances(points: &[Point3<f64>; 3], normal: &Vector3<f64>, origin: &Point3<f64>, epsilon: f64) -> [f64; 3] {
    let threshold = epsilon * normal.norm();
    points.map(|p| {
        let d = normal.dot(&(p - origin));
        if d.abs() < threshold {
            0.0
        } else {
            d
        }
    })
}

/// Sorted interval where a triangle crosses the other plane, projected on
/// one axis. `None` when the triangle lies in that plane.
fn compute_interval(p: [f64; 3], d: [f64; 3]) -> Option<(f64, f64)> {
    // The lone vertex is the one on its own side of the plane
    let (lone, a, b) = if d[0] * d[1] > 0.0 {
        (2, 0, 1)
    } else if d[0] * d[2] > 0.0 {
        (1, 0, 2)
    } else if d[1] * d[2] > 0.0 || d[0] != 0.0 {
        (0, 1, 2)
    } else if d[1] != 0.0 {
        (1, 0, 2)
    } else if d[2] != 0.0 {
        (2, 0, 1)
    } else {
        return None;
    };

    let x0 = p[lone] + (p[a] - p[lone]) * d[lone] / (d[lone] - d[a]);
    let x1 = p[lone] + (p[b] - p[lone]) * d[lone] / (d[lone] - d[b]);
    Some(if x0 <= x1 { (x0, x1) } else { (x1, x0) })
}

/// 2-D overlap of coplanar triangles on the axis pair best aligned with `normal`
fn coplanar_overlap(normal: &Vector3<f64>, t1: &[Point3<f64>; 3], t2: &[Point3<f64>; 3]) -> bool {
    let (i0, i1) = projection_axes(normal);
    let a = t1.map(|p| [p[i0], p[i1]]);
    let b = t2.map(|p| [p[i0], p[i1]]);

    for i in 0..3 {
        if edge_against_triangle_edges(&a[i], &a[(i + 1) % 3], &b) {
            return true;
        }
    }

    point_in_triangle(&a[0], &b) || point_in_triangle(&b[0], &a)
}

/// Franklin Antonio's segment test of edge `v0 v1` against each edge of `tri`
fn edge_against_triangle_edges(v0: &[f64; 2], v1: &[f64; 2], tri: &[[f64; 2]; 3]) -> bool {
    let ax = v1[0] - v0[0];
    let ay = v1[1] - v0[1];

    (0..3).any(|k| {
        let (u0, u1) = (&tri[k], &tri[(k + 1) % 3]);
        let bx = u0[0] - u1[0];
        let by = u0[1] - u1[1];
        let cx = v0[0] - u0[0];
        let cy = v0[1] - u0[1];
        let f = ay * bx - ax * by;
        let d = by * cx - bx * cy;

        if (f > 0.0 && d >= 0.0 && d <= f) || (f < 0.0 && d <= 0.0 && d >= f) {
            let e = ax * cy - ay * cx;
            if f > 0.0 {
                e >= 0.0 && e <= f
            } else {
                e <= 0.0 && e >= f
            }
        } else {
            false
        }
    })
}

/// Point strictly inside a 2-D triangle of either winding
fn point_in_triangle(p: &[f64; 2], tri: &[[f64; 2]; 3]) -> bool {
    let side = |u0: &[f64; 2], u1: &[f64; 2]| {
        let a = u1[1] - u0[1];
        let b = -(u1[0] - u0[0]);
        let c = -a * u0[0] - b * u0[1];
        a * p[0] + b * p[1] + c
    };

    let d0 = side(&tri[0], &tri[1]);
    let d1 = side(&tri[1], &tri[2]);
    let d2 = side(&tri[2], &tri[0]);
    d0 * d1 > 0.0 && d0 * d2 > 0.0
}

/// A triangle soup prepared for repeated overlap queries
pub struct TriangleSoup {
    triangles: Vec<[Point3<f64>; 3]>,
    bvh: BVH,
}

impl TriangleSoup {
    pub fn new(triangles: Vec<[Point3<f64>; 3]>) -> Self {
        let bvh = BVH::from_triangles(&triangles);
        Self { triangles, bvh }
    }

    pub fn bounds(&self) -> &BoundingBox {
        self.bvh.bounds()
    }

    pub fn triangles(&self) -> &[[Point3<f64>; 3]] {
        &self.triangles
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// True if any triangle of `self` overlaps any triangle of `other`.
    /// Soups whose boxes are apart by more than `epsilon` are never tested.
    pub fn overlaps(&self, other: &TriangleSoup, epsilon: f64) -> bool {
        if self.is_empty() || other.is_empty() || !self.bounds().loosened(epsilon).intersects(other.bounds()) {
            return false;
        }

        // Walk the smaller soup against the hierarchy of the larger one
        let (outer, inner) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };

        outer.triangles.iter().any(|tri| {
            let query = BoundingBox::from_points(tri).loosened(epsilon);
            inner
                .bvh
                .any_in(&query, |j| triangles_overlap(tri, &inner.triangles[j], epsilon))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-5;

    fn tri(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> [Point3<f64>; 3] {
        [Point3::from(a), Point3::from(b), Point3::from(c)]
    }

    #[test]
    fn test_crossing_triangles() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let b = tri([0.5, 0.5, -1.0], [0.5, 0.5, 1.0], [1.5, -1.0, 0.0]);
        assert!(triangles_overlap(&a, &b, EPS));
        assert!(triangles_overlap(&b, &a, EPS));
    }

    #[test]
    fn test_separated_by_plane() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, 0.0, 1.0], [1.0, 0.0, 1.0], [0.0, 1.0, 2.0]);
        assert!(!triangles_overlap(&a, &b, EPS));
    }

    #[test]
    fn test_planes_cross_but_triangles_miss() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([5.0, 5.0, -1.0], [5.0, 5.0, 1.0], [6.0, 5.0, 0.0]);
        assert!(!triangles_overlap(&a, &b, EPS));
    }

    #[test]
    fn test_touching_at_shared_edge() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]);
        assert!(triangles_overlap(&a, &b, EPS));
    }

    #[test]
    fn test_near_touching_within_epsilon() {
        let a = tri([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        let b = tri([0.2, 0.2, 5e-6], [0.6, 0.2, 1.0], [0.2, 0.6, 1.0]);
        assert!(triangles_overlap(&a, &b, EPS));
        let lifted = tri([0.2, 0.2, 5e-4], [0.6, 0.2, 1.0], [0.2, 0.6, 1.0]);
        assert!(!triangles_overlap(&a, &lifted, EPS));
    }

    #[test]
    fn test_coplanar() {
        let a = tri([0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]);
        let overlapping = tri([1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [3.0, 0.0, 0.0]);
        let contained = tri([0.2, 0.2, 0.0], [0.5, 0.2, 0.0], [0.2, 0.5, 0.0]);
        let apart = tri([5.0, 5.0, 0.0], [6.0, 5.0, 0.0], [5.0, 6.0, 0.0]);

        assert!(triangles_overlap(&a, &overlapping, EPS));
        assert!(triangles_overlap(&a, &contained, EPS));
        assert!(triangles_overlap(&contained, &a, EPS));
        assert!(!triangles_overlap(&a, &apart, EPS));
    }

    #[test]
    fn test_soup_overlap() {
        let square = |x: f64| {
            TriangleSoup::new(vec![
                tri([x, 0.0, 0.0], [x + 1.0, 0.0, 0.0], [x + 1.0, 1.0, 0.0]),
                tri([x, 0.0, 0.0], [x + 1.0, 1.0, 0.0], [x, 1.0, 0.0]),
            ])
        };
        let wall = TriangleSoup::new(vec![tri([0.5, 0.5, -1.0], [0.5, 0.5, 1.0], [0.5, -1.0, 0.0])]);

        assert!(square(0.0).overlaps(&wall, EPS));
        assert!(wall.overlaps(&square(0.0), EPS));
        assert!(!square(3.0).overlaps(&wall, EPS));
        assert!(square(0.0).overlaps(&square(1.0), EPS));
        assert!(!square(0.0).overlaps(&square(1.5), EPS));
    }
}
