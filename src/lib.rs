// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Meshslice
//!
//! Plane dissection of attributed triangle meshes. A mesh is cut into
//! watertight pieces with optional caps, every vertex attribute carried
//! across the cut, and the resulting islands grouped into output objects
//! together with their sliced colliders.

pub mod collider;
pub mod config;
pub mod dissection;
pub mod error;
pub mod geometry;
pub mod grouping;
pub mod host;
pub mod slicer;
pub mod utils;

pub use collider::ColliderInput;
pub use config::{SliceConfig, SliceSettings, SliceType};
pub use dissection::{dissect, DissectedMesh, Dissection, DissectionStats, NotSlicedReason};
pub use error::{SliceError, SliceResult};
pub use geometry::{Cap, MeshPiece, MeshSnapshot, Primitive, Side, SlicePlane, VertexAttributes};
pub use grouping::{FragmentGroup, IslandSource};
pub use host::{ColliderId, MaterialId, MeshAdapter, ObjectHost, ObjectId, RendererId};
pub use slicer::{
    slice_mesh, ColliderPiece, Fragment, RejectReason, RendererInput, RendererPiece, SliceOutcome, SliceRequest,
    SlicedObject, Slicer,
};

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_basic_cube() {
        let cube = Primitive::cube(10.0).to_snapshot();
        let plane = SlicePlane::new(Vector3::new(0.0, 1.0, 0.0), 1.0).unwrap();
        let outcome = slice_mesh(
            &cube,
            &plane,
            &[MaterialId(0)],
            &SliceConfig::default(),
            &SliceSettings::default(),
        );
        assert!(outcome.unwrap().is_sliced());
    }
}
