// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Host collaborator interfaces
//!
//! The slicer never touches a scene graph. Everything it needs from the
//! host (mesh data, world transforms, copies of objects) and everything it
//! hands back goes through these traits.

use crate::collider::ColliderInput;
use crate::config::SliceConfig;
use crate::error::SliceResult;
use crate::geometry::MeshSnapshot;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

id_type!(
    /// A host scene object that owns renderers and colliders
    ObjectId(u64)
);
id_type!(
    /// A mesh renderer on an object
    RendererId(u32)
);
id_type!(
    /// A collider on an object
    ColliderId(u32)
);
id_type!(
    /// A material known to the host
    MaterialId(u32)
);

/// Access to the render meshes of host objects
pub trait MeshAdapter {
    /// Renderers attached to `object`, in a stable order
    fn renderers(&self, object: ObjectId) -> Vec<RendererId>;

    /// Attribute buffers and submeshes of a renderer's mesh, in local space
    fn mesh(&self, renderer: RendererId) -> SliceResult<MeshSnapshot>;

    /// Material per submesh
    fn materials(&self, renderer: RendererId) -> Vec<MaterialId>;

    /// Vertex positions transformed to world space, one per mesh vertex
    fn world_positions(&self, renderer: RendererId) -> SliceResult<Vec<Point3<f64>>>;

    /// Slice options of the renderer's component
    fn slice_config(&self, renderer: RendererId) -> SliceConfig {
        let _ = renderer;
        SliceConfig::default()
    }

    /// Replace the mesh and materials of a renderer
    fn commit(&mut self, renderer: RendererId, mesh: MeshSnapshot, materials: Vec<MaterialId>) -> SliceResult<()>;
}

/// Object-level operations on the host scene
pub trait ObjectHost {
    /// Create `count` copies of `object`, components included
    fn duplicate(&mut self, object: ObjectId, count: usize) -> SliceResult<Vec<ObjectId>>;

    /// The renderer on `copy` corresponding to `original`
    fn find_renderer(&self, copy: ObjectId, original: RendererId) -> Option<RendererId>;

    /// The collider on `copy` corresponding to `original`
    fn find_collider(&self, copy: ObjectId, original: ColliderId) -> Option<ColliderId>;

    /// Colliders attached to `object`, with their shapes in world space
    fn colliders(&self, object: ObjectId) -> Vec<ColliderInput> {
        let _ = object;
        Vec::new()
    }

    /// Replace a collider's shape with a mesh collider of `mesh`
    fn commit_collider(&mut self, collider: ColliderId, mesh: MeshSnapshot) -> SliceResult<()>;

    /// Remove a collider that has no geometry in its fragment
    fn remove_collider(&mut self, collider: ColliderId) -> SliceResult<()>;
}

impl MeshSnapshot {
    /// Capture a renderer's mesh with its positions in world space
    pub fn capture<A: MeshAdapter + ?Sized>(adapter: &A, renderer: RendererId) -> SliceResult<Self> {
        let mut snapshot = adapter.mesh(renderer)?;
        snapshot.vertices.positions = adapter.world_positions(renderer)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}
