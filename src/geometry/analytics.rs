// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry analytics and statistics

use super::{mesh_utils, BoundingBox, MeshSnapshot};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Geometry statistics and analytics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryStats {
    /// Signed enclosed volume (positive for outward winding)
    pub volume: f64,
    /// Total surface area
    pub surface_area: f64,
    pub bbox: BoundingBox,
    /// Center of mass, assuming uniform density
    pub center_of_mass: Point3<f64>,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Every welded edge is shared by exactly two triangles
    pub is_watertight: bool,
}

impl GeometryStats {
    pub fn empty() -> Self {
        Self {
            volume: 0.0,
            surface_area: 0.0,
            bbox: BoundingBox::empty(),
            center_of_mass: Point3::origin(),
            vertex_count: 0,
            triangle_count: 0,
            is_watertight: false,
        }
    }
}

impl fmt::Display for GeometryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Volume:       {:>12.6}", self.volume)?;
        writeln!(f, "Surface area: {:>12.6}", self.surface_area)?;
        writeln!(
            f,
            "Center:       ({:.4}, {:.4}, {:.4})",
            self.center_of_mass.x, self.center_of_mass.y, self.center_of_mass.z
        )?;
        writeln!(f, "Vertices:     {:>12}", self.vertex_count)?;
        writeln!(f, "Triangles:    {:>12}", self.triangle_count)?;
        write!(f, "Watertight:   {:>12}", if self.is_watertight { "yes" } else { "no" })
    }
}

/// Analyze mesh geometry and compute statistics
pub fn analyze(mesh: &MeshSnapshot, weld_tolerance: f64) -> GeometryStats {
    if mesh.vertex_count() == 0 || mesh.triangle_count() == 0 {
        return GeometryStats::empty();
    }

    GeometryStats {
        volume: signed_volume(mesh),
        surface_area: surface_area(mesh),
        bbox: mesh.bounding_box(),
        center_of_mass: center_of_mass(mesh),
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        is_watertight: mesh_utils::is_closed(mesh, weld_tolerance),
    }
}

/// Enclosed volume via signed tetrahedra against the origin
pub fn signed_volume(mesh: &MeshSnapshot) -> f64 {
    mesh.triangle_soup()
        .map(|[a, b, c]| a.coords.dot(&b.coords.cross(&c.coords)) / 6.0)
        .sum()
}

pub fn surface_area(mesh: &MeshSnapshot) -> f64 {
    mesh.triangle_soup()
        .map(|[a, b, c]| (b - a).cross(&(c - a)).norm() / 2.0)
        .sum()
}

/// Center of mass of the enclosed solid.
/// Open or flat meshes fall back to the area-weighted surface centroid.
pub fn center_of_mass(mesh: &MeshSnapshot) -> Point3<f64> {
    let mut volume = 0.0;
    let mut moment = Vector3::zeros();
    for [a, b, c] in mesh.triangle_soup() {
        let v = a.coords.dot(&b.coords.cross(&c.coords)) / 6.0;
        volume += v;
        moment += (a.coords + b.coords + c.coords) * (v / 4.0);
    }

    let scale = mesh.bounding_box().size().norm().max(f64::MIN_POSITIVE);
    if volume.abs() > 1e-9 * scale.powi(3) {
        return Point3::from(moment / volume);
    }

    surface_centroid(mesh)
}

/// Area-weighted centroid of the triangles
pub fn surface_centroid(mesh: &MeshSnapshot) -> Point3<f64> {
    let mut area = 0.0;
    let mut moment = Vector3::zeros();
    for [a, b, c] in mesh.triangle_soup() {
        let w = (b - a).cross(&(c - a)).norm() / 2.0;
        area += w;
        moment += (a.coords + b.coords + c.coords) * (w / 3.0);
    }

    if area > 0.0 {
        Point3::from(moment / area)
    } else {
        mesh.bounding_box().center()
    }
}
