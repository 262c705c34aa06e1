// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Robust geometric predicates
//! Compensated arithmetic for results that land close to zero

use nalgebra::{Point3, Vector3};

/// Below this magnitude a predicate is recomputed with compensated summation
const EPS: f64 = 1e-9;

/// Signed distance from point to plane `normal · p = plane_d`.
/// Positive = point is on the normal side.
pub fn point_plane_test(point: &Point3<f64>, plane_normal: &Vector3<f64>, plane_d: f64) -> f64 {
    let distance = plane_normal.dot(&point.coords) - plane_d;

    if distance.abs() < EPS {
        compensated_dot(plane_normal, &[point.x, point.y, point.z]) - plane_d
    } else {
        distance
    }
}

/// Area of triangle (a, b, c)
pub fn triangle_area(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let area = ab.cross(&ac).norm() / 2.0;

    if area < EPS {
        let cx = diff_of_products(ab.y, ac.z, ab.z, ac.y);
        let cy = diff_of_products(ab.z, ac.x, ab.x, ac.z);
        let cz = diff_of_products(ab.x, ac.y, ab.y, ac.x);
        (cx * cx + cy * cy + cz * cz).sqrt() / 2.0
    } else {
        area
    }
}

/// `a * b - c * d` with a single rounding on the first product
fn diff_of_products(a: f64, b: f64, c: f64, d: f64) -> f64 {
    let cd = c * d;
    let err = c.mul_add(-d, cd);
    a.mul_add(b, -cd) + err
}

/// Dot product summed largest-first with Kahan compensation
fn compensated_dot(v: &Vector3<f64>, w: &[f64; 3]) -> f64 {
    let mut terms = [v.x * w[0], v.y * w[1], v.z * w[2]];
    terms.sort_by(|a, b| b.abs().total_cmp(&a.abs()));

    let mut sum = 0.0;
    let mut c = 0.0;
    for &term in &terms {
        let y = term - c;
        let t = sum + y;
        c = (t - sum) - y;
        sum = t;
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_plane_test() {
        let normal = Vector3::new(0.0, 0.0, 1.0);

        assert!(point_plane_test(&Point3::new(0.0, 0.0, 1.0), &normal, 0.0) > 0.0);
        assert!(point_plane_test(&Point3::new(0.0, 0.0, -1.0), &normal, 0.0) < 0.0);
        assert_eq!(point_plane_test(&Point3::new(5.0, -2.0, 0.0), &normal, 0.0), 0.0);
        assert!((point_plane_test(&Point3::new(0.0, 0.0, 2.5), &normal, 1.0) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_triangle_area() {
        let area = triangle_area(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(2.0, 0.0, 0.0),
            &Point3::new(0.0, 2.0, 0.0),
        );
        assert!((area - 2.0).abs() < 1e-12);

        let degenerate = triangle_area(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(1.0, 1.0, 1.0),
            &Point3::new(2.0, 2.0, 2.0),
        );
        assert!(degenerate < 1e-12);
    }
}
