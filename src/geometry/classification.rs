// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Triangle classification against the slicing plane
//! Determines whether a triangle lies on one side of the plane or crosses it

use super::{SlicePlane, Side};
use nalgebra::Point3;

/// Classification of a triangle relative to a plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Every vertex is on the positive side or on the plane
    Positive,
    /// Every vertex is on the negative side or on the plane
    Negative,
    /// At least one vertex strictly on each side
    Straddling,
}

impl Classification {
    /// The side of a non-straddling triangle
    pub fn side(self) -> Option<Side> {
        match self {
            Classification::Positive => Some(Side::Positive),
            Classification::Negative => Some(Side::Negative),
            Classification::Straddling => None,
        }
    }
}

/// Snapped per-vertex distances together with the resulting classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleClass {
    pub distances: [f64; 3],
    pub classification: Classification,
}

impl TriangleClass {
    /// Local edges `(i, (i + 1) % 3)` whose endpoints both lie on the plane
    pub fn on_plane_edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..3)
            .map(|i| (i, (i + 1) % 3))
            .filter(|&(i, j)| self.distances[i] == 0.0 && self.distances[j] == 0.0)
    }

    pub fn is_coplanar(&self) -> bool {
        self.distances.iter().all(|&d| d == 0.0)
    }
}

/// Signed distance of a point with values inside `epsilon` snapped to zero
#[inline]
pub fn snapped_distance(plane: &SlicePlane, point: &Point3<f64>, epsilon: f64) -> f64 {
    let d = plane.signed_distance(point);
    if d.abs() < epsilon {
        0.0
    } else {
        d
    }
}

/// Classify a triangle by the signs of its snapped vertex distances.
///
/// Vertices on the plane join whichever side keeps the triangle whole. A
/// triangle lying in the plane goes to the piece it bounds: facing along the
/// plane normal it is a face of the negative piece, otherwise of the positive.
pub fn classify_triangle(
    positions: &[Point3<f64>; 3],
    plane: &SlicePlane,
    epsilon: f64,
) -> TriangleClass {
    let distances = positions.map(|p| snapped_distance(plane, &p, epsilon));
    let any_positive = distances.iter().any(|&d| d > 0.0);
    let any_negative = distances.iter().any(|&d| d < 0.0);

    let classification = match (any_positive, any_negative) {
        (true, true) => Classification::Straddling,
        (true, false) => Classification::Positive,
        (false, true) => Classification::Negative,
        (false, false) => {
            let [a, b, c] = positions;
            let face_normal = (b - a).cross(&(c - a));
            if face_normal.dot(&plane.normal()) > 0.0 {
                Classification::Negative
            } else {
                Classification::Positive
            }
        }
    };

    TriangleClass {
        distances,
        classification,
    }
}
