// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

use nalgebra::Vector3;

/// Check if two floats are approximately equal
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Linear interpolation
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Linear interpolation for single-precision channels (colors, weights)
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Normalize a vector, falling back when it has (nearly) zero length
pub fn normalize_or(v: Vector3<f64>, fallback: Vector3<f64>) -> Vector3<f64> {
    let len = v.norm();
    if len > 1e-12 {
        v / len
    } else {
        fallback
    }
}

/// Index of the component with the largest magnitude
pub fn dominant_axis(v: &Vector3<f64>) -> usize {
    let abs = v.map(|x| x.abs());
    if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    }
}

/// The two axes left after dropping the dominant one
pub fn projection_axes(normal: &Vector3<f64>) -> (usize, usize) {
    match dominant_axis(normal) {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Orthonormal basis `(u, v)` of the plane with unit normal `n`, with `u × v = n`
pub fn plane_basis(n: &Vector3<f64>) -> (Vector3<f64>, Vector3<f64>) {
    let helper = if n.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    let u = normalize_or(helper.cross(n), Vector3::z());
    let v = n.cross(&u);
    (u, v)
}
