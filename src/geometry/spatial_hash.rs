// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Position welding with a quantized spatial hash
//!
//! Points within `tolerance` of each other receive the same weld id. Cells
//! are `tolerance` wide and the 27 cells around a query are probed, so a
//! match is found regardless of which side of a cell border it fell.

use ahash::AHashMap;
use nalgebra::Point3;

type CellKey = [i64; 3];

/// Spatial hash assigning weld ids to positions
#[derive(Debug, Clone)]
pub struct SpatialHash {
    cell_size: f64,
    tolerance: f64,
    cells: AHashMap<CellKey, Vec<u32>>,
    points: Vec<Point3<f64>>,
}

impl SpatialHash {
    pub fn new(tolerance: f64) -> Self {
        let tolerance = tolerance.max(0.0);
        Self {
            cell_size: tolerance.max(1e-12),
            tolerance,
            cells: AHashMap::default(),
            points: Vec::new(),
        }
    }

    fn key(&self, p: &Point3<f64>) -> CellKey {
        [
            (p.x / self.cell_size).floor() as i64,
            (p.y / self.cell_size).floor() as i64,
            (p.z / self.cell_size).floor() as i64,
        ]
    }

    /// Weld id of the closest stored point within tolerance
    pub fn find(&self, p: &Point3<f64>) -> Option<u32> {
        let [kx, ky, kz] = self.key(p);
        let mut best: Option<(f64, u32)> = None;

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = [kx.saturating_add(dx), ky.saturating_add(dy), kz.saturating_add(dz)];
                    let Some(ids) = self.cells.get(&key) else {
                        continue;
                    };
                    for &id in ids {
                        let dist = (self.points[id as usize] - p).norm();
                        if dist > self.tolerance {
                            continue;
                        }
                        // Closest wins; ties keep the older id
                        let better = match best {
                            None => true,
                            Some((best_dist, best_id)) => {
                                dist < best_dist || (dist == best_dist && id < best_id)
                            }
                        };
                        if better {
                            best = Some((dist, id));
                        }
                    }
                }
            }
        }

        best.map(|(_, id)| id)
    }

    /// Weld id of `p`, registering it as a new point when nothing is close
    pub fn insert(&mut self, p: Point3<f64>) -> u32 {
        if let Some(id) = self.find(&p) {
            return id;
        }

        let id = self.points.len() as u32;
        let key = self.key(&p);
        self.cells.entry(key).or_default().push(id);
        self.points.push(p);
        id
    }

    /// Representative position of a weld id (the first point inserted)
    pub fn point(&self, id: u32) -> Point3<f64> {
        self.points[id as usize]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weld_within_tolerance() {
        let mut hash = SpatialHash::new(1e-6);
        let a = hash.insert(Point3::new(1.0, 2.0, 3.0));
        let b = hash.insert(Point3::new(1.0 + 4e-7, 2.0, 3.0 - 4e-7));
        let c = hash.insert(Point3::new(1.0 + 5e-6, 2.0, 3.0));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(hash.len(), 2);
    }

    #[test]
    fn test_weld_across_cell_border() {
        let mut hash = SpatialHash::new(1e-3);
        // Straddles the cell boundary at x = 0
        let a = hash.insert(Point3::new(-1e-4, 0.0, 0.0));
        let b = hash.insert(Point3::new(1e-4, 0.0, 0.0));
        assert_eq!(a, b);
        assert_eq!(hash.find(&Point3::new(0.0, 0.0, 0.0)), Some(a));
        assert_eq!(hash.find(&Point3::new(0.5, 0.0, 0.0)), None);
    }
}
