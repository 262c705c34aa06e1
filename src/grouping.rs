// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fragment grouping
//!
//! Islands of every renderer and collider of an object are partitioned into
//! fragment groups. Each group becomes one output object.

use crate::config::{SliceSettings, SliceType};
use crate::geometry::analytics::center_of_mass;
use crate::geometry::{MeshPiece, Side, TriangleSoup};
use crate::host::{ColliderId, RendererId};
use crate::utils::union_find::DisjointSets;
use log::trace;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Component an island was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IslandSource {
    Renderer(RendererId),
    Collider(ColliderId),
}

impl IslandSource {
    pub fn is_collider(self) -> bool {
        matches!(self, IslandSource::Collider(_))
    }
}

/// A connected piece on one side, tagged with its origin
#[derive(Debug, Clone, PartialEq)]
pub struct Island {
    pub source: IslandSource,
    /// Slice mode of the source component
    pub slice_type: SliceType,
    pub piece: MeshPiece,
}

impl Island {
    pub fn side(&self) -> Side {
        self.piece.side
    }
}

/// A set of islands that ends up in one output object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentGroup {
    pub side: Side,
    /// Compact group number, renderer groups first
    pub number: usize,
    /// Indices into the island list, ascending
    pub members: Vec<usize>,
}

#[derive(Debug)]
struct PendingGroup {
    side: Side,
    members: Vec<usize>,
}

/// Partition `islands` into fragment groups.
///
/// Renderer islands are grouped first. Islands of `Slice` components on the
/// same side merge when they overlap, or unconditionally when intersection
/// grouping is off. Islands of other components join the nearest group on
/// their side. Collider islands are grouped the same way among themselves,
/// then each collider group joins the renderer group on its side with the
/// vertex closest to its center. Collider groups left without a renderer
/// group get numbers after all renderer groups.
pub fn group_islands(islands: &[Island], settings: &SliceSettings) -> Vec<FragmentGroup> {
    let centers: Vec<Point3<f64>> = islands.iter().map(|i| center_of_mass(&i.piece.mesh)).collect();
    let soups: Vec<Option<TriangleSoup>> = islands
        .iter()
        .map(|island| {
            (settings.group_by_intersection && island.slice_type == SliceType::Slice)
                .then(|| TriangleSoup::new(island.piece.mesh.triangle_soup().collect()))
        })
        .collect();

    let (colliders, renderers): (Vec<usize>, Vec<usize>) =
        (0..islands.len()).partition(|&i| islands[i].source.is_collider());

    let renderer_groups = group_context(islands, &renderers, &soups, &centers, settings);
    let collider_groups = group_context(islands, &colliders, &soups, &centers, settings);

    // Association is decided against renderer members only
    let targets: Vec<Option<usize>> = collider_groups
        .iter()
        .map(|group| {
            let center = mean_center(group, &centers);
            renderer_groups
                .iter()
                .enumerate()
                .filter(|(_, candidate)| candidate.side == group.side)
                .map(|(k, candidate)| (k, nearest_vertex_distance(islands, candidate, &center)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(k, _)| k)
        })
        .collect();

    let mut groups: Vec<FragmentGroup> = renderer_groups
        .into_iter()
        .enumerate()
        .map(|(number, group)| FragmentGroup {
            side: group.side,
            number,
            members: group.members,
        })
        .collect();

    for (group, target) in collider_groups.into_iter().zip(targets) {
        match target {
            Some(k) => groups[k].members.extend(group.members),
            None => {
                trace!("Collider group on the {} side has no renderer group", group.side);
                groups.push(FragmentGroup {
                    side: group.side,
                    number: groups.len(),
                    members: group.members,
                });
            }
        }
    }

    for group in &mut groups {
        group.members.sort_unstable();
    }
    groups
}

/// Group the islands listed in `members` among themselves
fn group_context(
    islands: &[Island],
    members: &[usize],
    soups: &[Option<TriangleSoup>],
    centers: &[Point3<f64>],
    settings: &SliceSettings,
) -> Vec<PendingGroup> {
    let (sliced, whole): (Vec<usize>, Vec<usize>) = members
        .iter()
        .partition(|&&i| islands[i].slice_type == SliceType::Slice);

    let mut sets = DisjointSets::new(sliced.len());
    for (a, &i) in sliced.iter().enumerate() {
        for (b, &j) in sliced[..a].iter().enumerate() {
            if islands[i].side() != islands[j].side() || sets.same(a, b) {
                continue;
            }
            let joined = match (&soups[i], &soups[j]) {
                (Some(first), Some(second)) => first.overlaps(second, settings.overlap_epsilon),
                _ => !settings.group_by_intersection,
            };
            if joined {
                sets.union(a, b);
            }
        }
    }

    let mut groups: Vec<PendingGroup> = Vec::new();
    for (&island, label) in sliced.iter().zip(sets.labels()) {
        if label == groups.len() {
            groups.push(PendingGroup {
                side: islands[island].side(),
                members: Vec::new(),
            });
        }
        groups[label].members.push(island);
    }

    for island in whole {
        let side = islands[island].side();
        let nearest = groups
            .iter()
            .enumerate()
            .filter(|(_, group)| group.side == side)
            .map(|(k, group)| (k, (mean_center(group, centers) - centers[island]).norm()))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k);

        match nearest {
            Some(k) => groups[k].members.push(island),
            None => groups.push(PendingGroup {
                side,
                members: vec![island],
            }),
        }
    }

    groups
}

fn mean_center(group: &PendingGroup, centers: &[Point3<f64>]) -> Point3<f64> {
    let sum = group
        .members
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, &i| acc + centers[i].coords);
    Point3::from(sum / group.members.len().max(1) as f64)
}

fn nearest_vertex_distance(islands: &[Island], group: &PendingGroup, point: &Point3<f64>) -> f64 {
    group
        .members
        .iter()
        .flat_map(|&i| islands[i].piece.mesh.vertices.positions.iter())
        .map(|p| (p - point).norm())
        .fold(f64::INFINITY, f64::min)
}
