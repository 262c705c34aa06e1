// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh reassembly after a cut
//! Compacts vertex and index buffers per side and splits them into islands

use super::spatial_hash::SpatialHash;
use super::{BoundingBox, MeshSnapshot, Side, Triangle, VertexAttributes};
use crate::host::MaterialId;
use crate::utils::union_find::DisjointSets;
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};

/// A compacted mesh belonging to one side of the plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshPiece {
    pub side: Side,
    pub mesh: MeshSnapshot,
    /// One material per submesh of `mesh`
    pub materials: Vec<MaterialId>,
}

impl MeshPiece {
    pub fn bounding_box(&self) -> BoundingBox {
        self.mesh.bounding_box()
    }
}

/// Build a compacted snapshot from the triangles of one side.
///
/// Vertices are kept in first-use order, submeshes without triangles are
/// dropped along with their material. `materials` has one entry per submesh
/// index the triangles may use.
pub fn compact_side(
    vertices: &VertexAttributes,
    bind_poses: Option<&Vec<Matrix4<f64>>>,
    triangles: &[Triangle],
    side: Side,
    materials: &[MaterialId],
) -> Option<MeshPiece> {
    let selected: Vec<(usize, [u32; 3])> = triangles
        .iter()
        .filter(|t| t.side == side)
        .map(|t| (t.submesh, t.indices))
        .collect();
    if selected.is_empty() {
        return None;
    }

    let (mesh, kept) = compact(vertices, &selected, materials.len());
    let mesh = MeshSnapshot {
        bind_poses: bind_poses.cloned(),
        ..mesh
    };

    Some(MeshPiece {
        side,
        mesh,
        materials: kept.into_iter().map(|s| materials[s]).collect(),
    })
}

/// Split a piece into connected components.
///
/// Connectivity is by welded vertex position, so seams with duplicated
/// vertices and caps with their own vertices stay attached. Islands are
/// ordered by their first triangle.
pub fn split_islands(piece: &MeshPiece, weld_tolerance: f64) -> Vec<MeshPiece> {
    let mut welder = SpatialHash::new(weld_tolerance);
    let weld: Vec<usize> = piece
        .mesh
        .vertices
        .positions
        .iter()
        .map(|p| welder.insert(*p) as usize)
        .collect();

    let mut sets = DisjointSets::new(welder.len());
    for tri in piece.mesh.submeshes.iter().flatten() {
        sets.union(weld[tri[0] as usize], weld[tri[1] as usize]);
        sets.union(weld[tri[1] as usize], weld[tri[2] as usize]);
    }

    // Island number per weld root, by first triangle
    let mut island_of_root = vec![usize::MAX; welder.len()];
    let mut island_triangles: Vec<Vec<(usize, [u32; 3])>> = Vec::new();
    for (submesh, triangles) in piece.mesh.submeshes.iter().enumerate() {
        for tri in triangles {
            let root = sets.find(weld[tri[0] as usize]);
            if island_of_root[root] == usize::MAX {
                island_of_root[root] = island_triangles.len();
                island_triangles.push(Vec::new());
            }
            island_triangles[island_of_root[root]].push((submesh, *tri));
        }
    }

    if island_triangles.len() <= 1 {
        return vec![piece.clone()];
    }

    island_triangles
        .into_iter()
        .map(|triangles| {
            let (mesh, kept) = compact(&piece.mesh.vertices, &triangles, piece.materials.len());
            MeshPiece {
                side: piece.side,
                mesh: MeshSnapshot {
                    bind_poses: piece.mesh.bind_poses.clone(),
                    ..mesh
                },
                materials: kept.into_iter().map(|s| piece.materials[s]).collect(),
            }
        })
        .collect()
}

/// Concatenate pieces of one side into a single piece.
///
/// Submeshes with the same material are joined; new materials are appended
/// in order of appearance. Returns `None` for an empty input.
pub fn merge_pieces<'a>(pieces: impl IntoIterator<Item = &'a MeshPiece>) -> Option<MeshPiece> {
    let mut pieces = pieces.into_iter();
    let mut merged = pieces.next()?.clone();

    for piece in pieces {
        let offset = merged.mesh.vertex_count() as u32;
        merged.mesh.vertices.append(&piece.mesh.vertices);
        if merged.mesh.bind_poses.is_none() {
            merged.mesh.bind_poses = piece.mesh.bind_poses.clone();
        }

        for (triangles, material) in piece.mesh.submeshes.iter().zip(&piece.materials) {
            let slot = match merged.materials.iter().position(|m| m == material) {
                Some(slot) => slot,
                None => {
                    merged.materials.push(*material);
                    merged.mesh.submeshes.push(Vec::new());
                    merged.materials.len() - 1
                }
            };
            merged.mesh.submeshes[slot].extend(triangles.iter().map(|t| t.map(|i| i + offset)));
        }
    }

    Some(merged)
}

/// Compact `(submesh, triangle)` pairs into a fresh snapshot.
/// Returns the snapshot and the original index of every kept submesh.
fn compact(
    vertices: &VertexAttributes,
    triangles: &[(usize, [u32; 3])],
    submesh_count: usize,
) -> (MeshSnapshot, Vec<usize>) {
    let mut remap = vec![u32::MAX; vertices.len()];
    let mut order: Vec<u32> = Vec::new();
    let mut per_submesh: Vec<Vec<[u32; 3]>> = vec![Vec::new(); submesh_count];

    for &(submesh, tri) in triangles {
        let mapped = tri.map(|old| {
            let slot = &mut remap[old as usize];
            if *slot == u32::MAX {
                *slot = order.len() as u32;
                order.push(old);
            }
            *slot
        });
        per_submesh[submesh].push(mapped);
    }

    let compacted = vertices.gather(&order);
    assert_eq!(
        compacted.len(),
        order.len(),
        "compaction produced {} vertices for {} referenced",
        compacted.len(),
        order.len()
    );
    assert!(
        compacted.validate().is_ok(),
        "compaction broke attribute channel lengths"
    );

    let mut kept = Vec::new();
    let mut submeshes = Vec::new();
    for (submesh, tris) in per_submesh.into_iter().enumerate() {
        if !tris.is_empty() {
            kept.push(submesh);
            submeshes.push(tris);
        }
    }

    let mesh = MeshSnapshot::with_attributes(compacted, submeshes);
    assert_eq!(
        mesh.triangle_count(),
        triangles.len(),
        "compaction lost triangles"
    );
    (mesh, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn tri(indices: [u32; 3], positions: &[Point3<f64>], submesh: usize, side: Side) -> Triangle {
        Triangle::new(indices, indices.map(|i| positions[i as usize]), submesh, side)
    }

    /// Two separate triangles on the positive side, one on the negative side
    fn soup() -> (VertexAttributes, Vec<Triangle>) {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(5.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 0.0),
            Point3::new(5.0, 1.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
        ];
        let triangles = vec![
            tri([3, 4, 5], &positions, 1, Side::Positive),
            tri([0, 2, 6], &positions, 0, Side::Negative),
            tri([0, 1, 2], &positions, 0, Side::Positive),
        ];
        (VertexAttributes::from_positions(positions), triangles)
    }

    #[test]
    fn test_compact_side_first_use_order() {
        let (vertices, triangles) = soup();
        let materials = [MaterialId(10), MaterialId(20)];
        let piece = compact_side(&vertices, None, &triangles, Side::Positive, &materials).unwrap();

        assert_eq!(piece.mesh.vertex_count(), 6);
        assert_eq!(piece.mesh.vertices.positions[0], Point3::new(5.0, 0.0, 0.0));
        assert_eq!(piece.mesh.submeshes, vec![vec![[3, 4, 5]], vec![[0, 1, 2]]]);
        assert_eq!(piece.materials, materials.to_vec());
        assert!(piece.mesh.validate().is_ok());
    }

    #[test]
    fn test_empty_submeshes_are_skipped() {
        let (vertices, triangles) = soup();
        let materials = [MaterialId(10), MaterialId(20)];
        let piece = compact_side(&vertices, None, &triangles, Side::Negative, &materials).unwrap();

        assert_eq!(piece.mesh.submesh_count(), 1);
        assert_eq!(piece.materials, vec![MaterialId(10)]);
        assert_eq!(piece.mesh.vertex_count(), 3);
    }

    #[test]
    fn test_missing_side_is_none() {
        let (vertices, mut triangles) = soup();
        triangles.retain(|t| t.side == Side::Positive);
        assert!(compact_side(&vertices, None, &triangles, Side::Negative, &[MaterialId(0), MaterialId(1)]).is_none());
    }

    #[test]
    fn test_split_islands() {
        let (vertices, triangles) = soup();
        let materials = [MaterialId(10), MaterialId(20)];
        let piece = compact_side(&vertices, None, &triangles, Side::Positive, &materials).unwrap();
        let islands = split_islands(&piece, 1e-6);

        assert_eq!(islands.len(), 2);
        // The first triangle of submesh 0 comes first
        assert_eq!(islands[0].materials, vec![MaterialId(10)]);
        assert_eq!(islands[1].materials, vec![MaterialId(20)]);
        assert!(islands.iter().all(|i| i.mesh.triangle_count() == 1 && i.mesh.vertex_count() == 3));
    }

    #[test]
    fn test_merge_pieces_joins_by_material() {
        let (vertices, triangles) = soup();
        let materials = [MaterialId(10), MaterialId(20)];
        let piece = compact_side(&vertices, None, &triangles, Side::Positive, &materials).unwrap();
        let islands = split_islands(&piece, 1e-6);

        let merged = merge_pieces(islands.iter().rev()).unwrap();
        assert_eq!(merged.materials, vec![MaterialId(20), MaterialId(10)]);
        assert_eq!(merged.mesh.vertex_count(), 6);
        assert_eq!(merged.mesh.submeshes, vec![vec![[0, 1, 2]], vec![[3, 4, 5]]]);
        assert!(merged.mesh.validate().is_ok());

        let doubled = merge_pieces([&islands[0], &islands[0]]).unwrap();
        assert_eq!(doubled.materials, vec![MaterialId(10)]);
        assert_eq!(doubled.mesh.triangle_count(), 2);
        assert!(merge_pieces(std::iter::empty()).is_none());
    }

    #[test]
    fn test_islands_join_through_welded_seams() {
        // Two triangles sharing an edge through duplicated vertices
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let piece = MeshPiece {
            side: Side::Negative,
            mesh: MeshSnapshot::new(positions, vec![[0, 1, 2], [3, 4, 5]]),
            materials: vec![MaterialId(0)],
        };
        let islands = split_islands(&piece, 1e-6);
        assert_eq!(islands.len(), 1);
        assert_eq!(islands[0], piece);
    }
}
