// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Collider shapes as slice inputs
//!
//! Primitive and convex shapes are tessellated with parry3d into triangle
//! meshes in world space, then dissected like render meshes.

use crate::config::SliceConfig;
use crate::error::{SliceError, SliceResult};
use crate::geometry::MeshSnapshot;
use crate::host::{ColliderId, MaterialId};
use nalgebra::{Isometry3, Point3};
use parry3d::shape::{Shape, SharedShape, TriMesh, TypedShape};
use std::fmt;

/// Angular subdivisions for round shapes
const ROUND_SUBDIVISIONS: u32 = 16;

/// Placeholder material of the single collider submesh
pub(crate) const COLLIDER_MATERIAL: MaterialId = MaterialId(0);

/// A collider attached to the object being sliced
#[derive(Clone)]
pub struct ColliderInput {
    pub id: ColliderId,
    pub shape: SharedShape,
    /// Shape to world transform
    pub isometry: Isometry3<f32>,
    pub config: SliceConfig,
}

impl fmt::Debug for ColliderInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColliderInput")
            .field("id", &self.id)
            .field("shape", &self.shape.shape_type())
            .field("isometry", &self.isometry)
            .field("config", &self.config)
            .finish()
    }
}

impl ColliderInput {
    pub fn new(id: ColliderId, shape: SharedShape, isometry: Isometry3<f32>) -> Self {
        Self {
            id,
            shape,
            isometry,
            config: SliceConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SliceConfig) -> Self {
        self.config = config;
        self
    }

    /// World-space triangle mesh of the shape
    pub fn to_snapshot(&self) -> SliceResult<MeshSnapshot> {
        tessellate(self.shape.as_ref(), &self.isometry)
    }

    /// Slice options for the collider mesh; caps always join its only submesh
    pub(crate) fn mesh_config(&self) -> SliceConfig {
        SliceConfig {
            slice_material: None,
            ..self.config.clone()
        }
    }
}

/// Tessellate a shape and move it to world space
pub fn tessellate(shape: &dyn Shape, isometry: &Isometry3<f32>) -> SliceResult<MeshSnapshot> {
    let (vertices, indices): (Vec<Point3<f32>>, Vec<[u32; 3]>) = match shape.as_typed_shape() {
        TypedShape::Ball(ball) => ball.to_trimesh(ROUND_SUBDIVISIONS, ROUND_SUBDIVISIONS / 2),
        TypedShape::Cuboid(cuboid) => cuboid.to_trimesh(),
        TypedShape::Capsule(capsule) => capsule.to_trimesh(ROUND_SUBDIVISIONS, ROUND_SUBDIVISIONS / 2),
        TypedShape::Cylinder(cylinder) => cylinder.to_trimesh(ROUND_SUBDIVISIONS),
        TypedShape::Cone(cone) => cone.to_trimesh(ROUND_SUBDIVISIONS),
        TypedShape::ConvexPolyhedron(polyhedron) => polyhedron.to_trimesh(),
        TypedShape::Triangle(triangle) => (vec![triangle.a, triangle.b, triangle.c], vec![[0, 1, 2]]),
        TypedShape::TriMesh(trimesh) => (trimesh.vertices().to_vec(), trimesh.indices().to_vec()),
        _ => return Err(SliceError::unsupported_shape(format!("{:?}", shape.shape_type()))),
    };

    let positions = vertices
        .iter()
        .map(|p| (isometry * p).cast::<f64>())
        .collect();
    let snapshot = MeshSnapshot::new(positions, indices);
    snapshot.validate()?;
    Ok(snapshot)
}

/// Triangle-mesh shape of a sliced collider mesh, in world space
pub fn mesh_to_shape(mesh: &MeshSnapshot) -> SharedShape {
    let vertices: Vec<Point3<f32>> = mesh
        .vertices
        .positions
        .iter()
        .map(|p| p.cast::<f32>())
        .collect();
    let indices: Vec<[u32; 3]> = mesh.submeshes.iter().flatten().copied().collect();
    SharedShape::new(TriMesh::new(vertices, indices))
}
