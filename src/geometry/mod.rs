// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - mesh representation and plane dissection building blocks

pub mod analytics;
mod bbox;
mod bvh;
pub mod cap;
pub mod classification;
mod mesh;
pub mod mesh_utils;
mod plane;
mod primitives;
pub mod reassembly;
pub mod robust_predicates;
pub mod spatial_hash;
pub mod triangle_intersection;
pub mod triangle_splitting;

pub use bbox::BoundingBox;
pub use bvh::BVH;
pub use cap::{BoundaryLoop, Cap};
pub use classification::{Classification, TriangleClass};
pub use mesh::{BoneWeight, MeshSnapshot, Triangle, VertexAttributes, MAX_UV_CHANNELS};
pub use plane::{Side, SlicePlane};
pub use primitives::Primitive;
pub use reassembly::MeshPiece;
pub use triangle_intersection::TriangleSoup;
pub use triangle_splitting::{BoundaryEdge, SplitEvent, TriangleSplitter};
