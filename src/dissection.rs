// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Plane dissection of a single mesh
//!
//! Classify, split, stitch, cap, compact and split into islands. Geometric
//! trouble never errors: it falls back to a `NotSliced` result.

use crate::config::{SliceConfig, SliceSettings};
use crate::error::{SliceError, SliceResult};
use crate::geometry::cap::{build_cap, stitch_loops};
use crate::geometry::classification::{classify_triangle, Classification, TriangleClass};
use crate::geometry::reassembly::{compact_side, merge_pieces, split_islands};
use crate::geometry::{BoundaryEdge, Cap, MeshPiece, MeshSnapshot, Side, SlicePlane, SplitEvent, Triangle, TriangleSplitter};
use crate::host::MaterialId;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a mesh or object was left whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotSlicedReason {
    /// The mesh has no triangles
    Empty,
    /// No triangle reaches the other side of the plane
    AllOnOneSide,
    /// One side would be thinner than the minimum width
    BelowMinWidth,
    /// A boundary loop did not close and the component asked to skip
    UnclosedLoop,
    /// The component keeps its geometry whole on one side
    KeepOne,
}

impl fmt::Display for NotSlicedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NotSlicedReason::Empty => "mesh has no triangles",
            NotSlicedReason::AllOnOneSide => "all geometry on one side",
            NotSlicedReason::BelowMinWidth => "cut thinner than the minimum width",
            NotSlicedReason::UnclosedLoop => "boundary loop not closed",
            NotSlicedReason::KeepOne => "kept whole",
        };
        f.write_str(text)
    }
}

/// Counters collected while dissecting. Loops are counted per side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DissectionStats {
    pub triangles: usize,
    pub straddling: usize,
    pub split: usize,
    pub slivers: usize,
    pub coplanar: usize,
    pub cut_vertices: usize,
    pub loops_closed: usize,
    pub loops_open: usize,
    pub loops_dropped: usize,
}

impl DissectionStats {
    pub fn accumulate(&mut self, other: &DissectionStats) {
        self.triangles += other.triangles;
        self.straddling += other.straddling;
        self.split += other.split;
        self.slivers += other.slivers;
        self.coplanar += other.coplanar;
        self.cut_vertices += other.cut_vertices;
        self.loops_closed += other.loops_closed;
        self.loops_open += other.loops_open;
        self.loops_dropped += other.loops_dropped;
    }
}

/// A mesh cut in two, as islands in stable order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DissectedMesh {
    /// Positive-side islands first, each side in order of first triangle
    pub islands: Vec<MeshPiece>,
    pub caps: Vec<Cap>,
    pub stats: DissectionStats,
}

impl DissectedMesh {
    pub fn islands_on(&self, side: Side) -> impl Iterator<Item = &MeshPiece> + '_ {
        self.islands.iter().filter(move |island| island.side == side)
    }

    pub fn caps_on(&self, side: Side) -> impl Iterator<Item = &Cap> + '_ {
        self.caps.iter().filter(move |cap| cap.side == side)
    }

    /// All islands of one side merged into a single piece
    pub fn side_piece(&self, side: Side) -> Option<MeshPiece> {
        merge_pieces(self.islands_on(side))
    }
}

/// Result of dissecting one mesh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dissection {
    Sliced(DissectedMesh),
    NotSliced {
        side: Side,
        reason: NotSlicedReason,
        stats: DissectionStats,
    },
}

impl Dissection {
    pub fn stats(&self) -> &DissectionStats {
        match self {
            Dissection::Sliced(mesh) => &mesh.stats,
            Dissection::NotSliced { stats, .. } => stats,
        }
    }

    pub fn is_sliced(&self) -> bool {
        matches!(self, Dissection::Sliced(_))
    }
}

/// Check attribute counts, index ranges and that every submesh has a material
pub fn validate_input(mesh: &MeshSnapshot, materials: &[MaterialId]) -> SliceResult<()> {
    mesh.validate()?;
    if materials.len() < mesh.submesh_count() {
        return Err(SliceError::MaterialMismatch {
            submeshes: mesh.submesh_count(),
            materials: materials.len(),
        });
    }
    Ok(())
}

/// Cut `mesh` along `plane`.
///
/// `mesh` must be in the same space as the plane and `materials` must have
/// at least one entry per submesh. Malformed input is an error, every
/// geometric fallback is a `NotSliced` result.
pub fn dissect(
    mesh: &MeshSnapshot,
    plane: &SlicePlane,
    materials: &[MaterialId],
    config: &SliceConfig,
    settings: &SliceSettings,
) -> SliceResult<Dissection> {
    validate_input(mesh, materials)?;

    let mut stats = DissectionStats {
        triangles: mesh.triangle_count(),
        ..DissectionStats::default()
    };
    if stats.triangles == 0 {
        return Ok(not_sliced(Side::Positive, NotSlicedReason::Empty, stats));
    }

    let classes: Vec<(usize, [u32; 3], TriangleClass)> = mesh
        .submeshes
        .iter()
        .enumerate()
        .flat_map(|(submesh, triangles)| {
            triangles.iter().map(move |tri| {
                let class = classify_triangle(&mesh.triangle_positions(tri), plane, settings.plane_epsilon);
                (submesh, *tri, class)
            })
        })
        .collect();

    stats.straddling = classes
        .iter()
        .filter(|(_, _, c)| c.classification == Classification::Straddling)
        .count();
    stats.coplanar = classes.iter().filter(|(_, _, c)| c.is_coplanar()).count();

    if stats.straddling == 0 {
        let has = |k: Classification| classes.iter().any(|(_, _, c)| c.classification == k);
        match (has(Classification::Positive), has(Classification::Negative)) {
            (true, true) => {}
            (positive, _) => {
                let side = if positive { Side::Positive } else { Side::Negative };
                debug!("All {} triangles on the {} side", stats.triangles, side);
                return Ok(not_sliced(side, NotSlicedReason::AllOnOneSide, stats));
            }
        }
    }

    let mut vertices = mesh.vertices.clone();
    let mut triangles: Vec<Triangle> = Vec::with_capacity(classes.len() + 2 * stats.straddling);
    // Boundary edges per side, oriented as on the positive piece
    let mut edges: [Vec<BoundaryEdge>; 2] = Default::default();

    {
        let mut splitter = TriangleSplitter::new(*plane, &mut vertices, settings.weld_tolerance);
        for (submesh, indices, class) in &classes {
            let Some(side) = class.classification.side() else {
                match splitter.split(*indices, *submesh, class, &mut triangles) {
                    SplitEvent::Split(edge) => {
                        stats.split += 1;
                        edges[Side::Positive.index()].push(edge);
                        edges[Side::Negative.index()].push(edge);
                    }
                    SplitEvent::Sliver(_) => stats.slivers += 1,
                }
                continue;
            };

            for (i, j) in class.on_plane_edges() {
                let edge = BoundaryEdge {
                    a: indices[i],
                    b: indices[j],
                    submesh: *submesh,
                };
                edges[side.index()].push(match side {
                    Side::Positive => edge,
                    Side::Negative => edge.reversed(),
                });
            }
            triangles.push(Triangle::new(*indices, mesh.triangle_positions(indices), *submesh, side));
        }
        stats.cut_vertices = splitter.intersection_count();
    }

    if stats.slivers > 0 {
        warn!("{} sliver triangles kept whole", stats.slivers);
    }

    // Farthest vertex from the plane on each side
    let mut reach = [None::<f64>; 2];
    for tri in &triangles {
        let slot = &mut reach[tri.side.index()];
        for p in &tri.positions {
            let d = plane.signed_distance(p).abs();
            *slot = Some(slot.map_or(d, |r| r.max(d)));
        }
    }
    let (Some(positive_reach), Some(negative_reach)) = (reach[Side::Positive.index()], reach[Side::Negative.index()]) else {
        let side = if reach[Side::Positive.index()].is_some() {
            Side::Positive
        } else {
            Side::Negative
        };
        return Ok(not_sliced(side, NotSlicedReason::AllOnOneSide, stats));
    };
    let thicker = if positive_reach >= negative_reach {
        Side::Positive
    } else {
        Side::Negative
    };
    if positive_reach < settings.min_width || negative_reach < settings.min_width {
        debug!(
            "Cut rejected: reach {:.6} / {:.6} below minimum width {}",
            positive_reach, negative_reach, settings.min_width
        );
        return Ok(not_sliced(thicker, NotSlicedReason::BelowMinWidth, stats));
    }

    let mut materials = materials[..mesh.submesh_count()].to_vec();
    let cap_submesh = match config.slice_material {
        Some(material) if config.create_cap => {
            materials.push(material);
            materials.len() - 1
        }
        _ => materials.len() - 1,
    };

    let mut caps = Vec::new();
    if config.create_cap || config.skip_if_not_closed {
        for side in [Side::Negative, Side::Positive] {
            let loops = stitch_loops(&edges[side.index()], &vertices.positions, settings.weld_tolerance);
            for boundary in &loops {
                if !boundary.closed {
                    stats.loops_open += 1;
                    if config.skip_if_not_closed {
                        warn!("Unclosed boundary loop on the {} side, leaving mesh uncut", side);
                        return Ok(not_sliced(thicker, NotSlicedReason::UnclosedLoop, stats));
                    }
                    warn!(
                        "Unclosed boundary loop of {} vertices on the {} side left uncapped",
                        boundary.vertices.len(),
                        side
                    );
                    continue;
                }

                stats.loops_closed += 1;
                if !config.create_cap {
                    continue;
                }
                match build_cap(boundary, plane, side, &mut vertices, cap_submesh, &mut triangles) {
                    Some(cap) => caps.push(cap),
                    None => stats.loops_dropped += 1,
                }
            }
        }
    }

    let mut islands = Vec::new();
    for side in [Side::Positive, Side::Negative] {
        if let Some(piece) = compact_side(&vertices, mesh.bind_poses.as_ref(), &triangles, side, &materials) {
            islands.extend(split_islands(&piece, settings.weld_tolerance));
        }
    }

    debug!(
        "Dissected {} triangles: {} split, {} islands, {} caps ({} loops closed, {} open)",
        stats.triangles,
        stats.split,
        islands.len(),
        caps.len(),
        stats.loops_closed,
        stats.loops_open
    );

    Ok(Dissection::Sliced(DissectedMesh { islands, caps, stats }))
}

fn not_sliced(side: Side, reason: NotSlicedReason, stats: DissectionStats) -> Dissection {
    Dissection::NotSliced { side, reason, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::analytics::signed_volume;
    use crate::geometry::mesh_utils::is_closed;
    use crate::geometry::Primitive;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn x_plane(offset: f64) -> SlicePlane {
        SlicePlane::new(Vector3::x(), offset).unwrap()
    }

    fn run(mesh: &MeshSnapshot, plane: &SlicePlane, config: &SliceConfig) -> Dissection {
        let materials = vec![MaterialId(1); mesh.submesh_count()];
        dissect(mesh, plane, &materials, config, &SliceSettings::default()).unwrap()
    }

    fn sliced(dissection: Dissection) -> DissectedMesh {
        match dissection {
            Dissection::Sliced(mesh) => mesh,
            other => panic!("expected a cut, got {:?}", other),
        }
    }

    #[test]
    fn test_cube_halves_are_closed() {
        let cube = Primitive::cube(1.0).to_snapshot();
        let result = sliced(run(&cube, &x_plane(0.0), &SliceConfig::default()));

        assert_eq!(result.islands.len(), 2);
        assert_eq!(result.caps.len(), 2);
        assert_eq!(result.stats.straddling, 8);
        assert_eq!(result.stats.split, 8);
        assert_eq!(result.stats.loops_closed, 2);

        for side in [Side::Positive, Side::Negative] {
            let piece = result.side_piece(side).unwrap();
            assert_relative_eq!(signed_volume(&piece.mesh), 0.5, epsilon = 1e-9);
            assert!(is_closed(&piece.mesh, 1e-6));
            assert!(piece.mesh.validate().is_ok());
            assert_eq!(piece.materials, vec![MaterialId(1)]);

            let cap = result.caps_on(side).next().unwrap();
            assert_relative_eq!(cap.area(), 1.0, epsilon = 1e-9);
            assert_eq!(cap.positions.len(), 8);
        }
    }

    #[test]
    fn test_off_center_cut_volumes() {
        let cube = Primitive::cube(2.0).to_snapshot();
        let result = sliced(run(&cube, &x_plane(0.5), &SliceConfig::default()));
        let positive = result.side_piece(Side::Positive).unwrap();
        let negative = result.side_piece(Side::Negative).unwrap();
        assert_relative_eq!(signed_volume(&positive.mesh), 2.0, epsilon = 1e-9);
        assert_relative_eq!(signed_volume(&negative.mesh), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_tangent_plane_is_not_sliced() {
        let cube = Primitive::cube(1.0).to_snapshot();
        match run(&cube, &x_plane(0.5), &SliceConfig::default()) {
            Dissection::NotSliced { side, reason, stats } => {
                assert_eq!(side, Side::Negative);
                assert_eq!(reason, NotSlicedReason::AllOnOneSide);
                assert_eq!(stats.coplanar, 2);
            }
            other => panic!("unexpected {:?}", other),
        }

        match run(&cube, &x_plane(3.0), &SliceConfig::default()) {
            Dissection::NotSliced { side, .. } => assert_eq!(side, Side::Negative),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_min_width_rejects_shaving() {
        let cube = Primitive::cube(1.0).to_snapshot();
        match run(&cube, &x_plane(0.4995), &SliceConfig::default()) {
            Dissection::NotSliced { side, reason, .. } => {
                assert_eq!(side, Side::Negative);
                assert_eq!(reason, NotSlicedReason::BelowMinWidth);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_without_caps_halves_stay_open() {
        let cube = Primitive::cube(1.0).to_snapshot();
        let config = SliceConfig {
            create_cap: false,
            ..SliceConfig::default()
        };
        let result = sliced(run(&cube, &x_plane(0.0), &config));
        assert!(result.caps.is_empty());
        assert_eq!(result.stats.loops_closed, 0);
        let piece = result.side_piece(Side::Positive).unwrap();
        assert!(!is_closed(&piece.mesh, 1e-6));
    }

    #[test]
    fn test_slice_material_adds_submesh() {
        let cube = Primitive::cube(1.0).to_snapshot();
        let config = SliceConfig {
            slice_material: Some(MaterialId(9)),
            ..SliceConfig::default()
        };
        let result = sliced(run(&cube, &x_plane(0.0), &config));
        for island in &result.islands {
            assert_eq!(island.materials, vec![MaterialId(1), MaterialId(9)]);
            assert_eq!(island.mesh.submeshes[1].len(), 6);
        }
    }

    #[test]
    fn test_unclosed_loop() {
        let mut cube = Primitive::cube(1.0).to_snapshot();
        cube.submeshes[0].pop();

        let strict = SliceConfig {
            skip_if_not_closed: true,
            ..SliceConfig::default()
        };
        match run(&cube, &x_plane(0.0), &strict) {
            Dissection::NotSliced { reason, .. } => assert_eq!(reason, NotSlicedReason::UnclosedLoop),
            other => panic!("unexpected {:?}", other),
        }

        let result = sliced(run(&cube, &x_plane(0.0), &SliceConfig::default()));
        assert!(result.caps.is_empty());
        assert!(result.stats.loops_open >= 2);
        assert_eq!(result.stats.loops_closed, 0);
    }

    #[test]
    fn test_cut_along_existing_edges() {
        // A cube whose cut ring is made of mesh edges gets capped too
        let cube = Primitive::cube(1.0).to_snapshot();
        let halves = sliced(run(&cube, &x_plane(0.0), &SliceConfig::default()));
        let mut rejoined = halves.side_piece(Side::Negative).unwrap().mesh;
        let positive = halves.side_piece(Side::Positive).unwrap().mesh;
        // Drop the caps so the ring at x = 0 is open in both halves
        rejoined.submeshes[0].retain(|t| t.iter().any(|&i| rejoined.vertices.positions[i as usize].x < -1e-9));
        let mut other = positive.clone();
        other.submeshes[0].retain(|t| t.iter().any(|&i| positive.vertices.positions[i as usize].x > 1e-9));
        rejoined.merge(&other);

        let result = sliced(run(&rejoined, &x_plane(0.0), &SliceConfig::default()));
        assert_eq!(result.stats.straddling, 0);
        assert_eq!(result.caps.len(), 2);
        for side in [Side::Positive, Side::Negative] {
            let piece = result.side_piece(side).unwrap();
            assert!(is_closed(&piece.mesh, 1e-6));
            assert_relative_eq!(signed_volume(&piece.mesh), 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_material_mismatch() {
        let cube = Primitive::cube(1.0).to_snapshot();
        let err = dissect(&cube, &x_plane(0.0), &[], &SliceConfig::default(), &SliceSettings::default());
        assert!(matches!(err, Err(SliceError::MaterialMismatch { submeshes: 1, materials: 0 })));
    }

    #[test]
    fn test_empty_mesh() {
        let empty = MeshSnapshot::new(Vec::new(), Vec::new());
        match run(&empty, &x_plane(0.0), &SliceConfig::default()) {
            Dissection::NotSliced { reason, .. } => assert_eq!(reason, NotSlicedReason::Empty),
            other => panic!("unexpected {:?}", other),
        }
    }
}
