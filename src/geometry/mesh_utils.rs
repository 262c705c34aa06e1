// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh validation utilities
//!
//! Edges are identified by welded positions, so meshes that duplicate
//! vertices along UV seams or hard edges still count as closed.

use super::spatial_hash::SpatialHash;
use super::MeshSnapshot;
use ahash::AHashMap;

/// Undirected edge between two weld ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Edge {
    v0: u32,
    v1: u32,
}

impl Edge {
    fn new(v0: u32, v1: u32) -> Self {
        if v0 < v1 {
            Self { v0, v1 }
        } else {
            Self { v0: v1, v1: v0 }
        }
    }
}

/// Count how many triangles use each welded edge
fn build_edge_counts(mesh: &MeshSnapshot, weld_tolerance: f64) -> AHashMap<Edge, u32> {
    let mut welder = SpatialHash::new(weld_tolerance);
    let weld: Vec<u32> = mesh
        .vertices
        .positions
        .iter()
        .map(|p| welder.insert(*p))
        .collect();

    let mut counts: AHashMap<Edge, u32> = AHashMap::default();
    for tri in mesh.submeshes.iter().flatten() {
        let [a, b, c] = tri.map(|i| weld[i as usize]);
        for (v0, v1) in [(a, b), (b, c), (c, a)] {
            if v0 != v1 {
                *counts.entry(Edge::new(v0, v1)).or_insert(0) += 1;
            }
        }
    }
    counts
}

/// Number of welded edges used by exactly one triangle
pub fn open_edge_count(mesh: &MeshSnapshot, weld_tolerance: f64) -> usize {
    build_edge_counts(mesh, weld_tolerance)
        .values()
        .filter(|&&count| count == 1)
        .count()
}

/// Check if mesh is closed (each welded edge shared by exactly 2 triangles)
pub fn is_closed(mesh: &MeshSnapshot, weld_tolerance: f64) -> bool {
    let counts = build_edge_counts(mesh, weld_tolerance);
    !counts.is_empty() && counts.values().all(|&count| count == 2)
}

/// Check if mesh is manifold (each welded edge shared by at most 2 triangles)
pub fn is_manifold(mesh: &MeshSnapshot, weld_tolerance: f64) -> bool {
    build_edge_counts(mesh, weld_tolerance)
        .values()
        .all(|&count| count <= 2)
}
