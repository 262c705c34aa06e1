// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Bounding Volume Hierarchy (BVH) for spatial acceleration
//! Used to prune island-against-island triangle overlap tests

use super::BoundingBox;
use nalgebra::Point3;

/// BVH node
#[derive(Debug, Clone)]
pub struct BVHNode {
    /// Bounding box of this node
    pub bbox: BoundingBox,
    /// Left child (None for leaf)
    pub left: Option<Box<BVHNode>>,
    /// Right child (None for leaf)
    pub right: Option<Box<BVHNode>>,
    /// Triangle indices (only for leaf nodes)
    pub triangle_indices: Vec<usize>,
}

impl BVHNode {
    fn leaf(bbox: BoundingBox, triangle_indices: Vec<usize>) -> Self {
        Self {
            bbox,
            left: None,
            right: None,
            triangle_indices,
        }
    }

    fn internal(bbox: BoundingBox, left: Box<BVHNode>, right: Box<BVHNode>) -> Self {
        Self {
            bbox,
            left: Some(left),
            right: Some(right),
            triangle_indices: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }
}

/// Bounding Volume Hierarchy over a triangle soup
pub struct BVH {
    root: BVHNode,
}

impl BVH {
    /// Build BVH from (triangle_index, bbox) pairs
    pub fn build(triangles: Vec<(usize, BoundingBox)>) -> Self {
        if triangles.is_empty() {
            return Self {
                root: BVHNode::leaf(BoundingBox::empty(), Vec::new()),
            };
        }

        let root = Self::build_recursive(triangles, 0);
        Self { root }
    }

    /// Build BVH straight from triangle positions, indexed by slice position
    pub fn from_triangles(triangles: &[[Point3<f64>; 3]]) -> Self {
        Self::build(
            triangles
                .iter()
                .enumerate()
                .map(|(idx, tri)| (idx, BoundingBox::from_points(tri)))
                .collect(),
        )
    }

    fn build_recursive(mut triangles: Vec<(usize, BoundingBox)>, depth: usize) -> BVHNode {
        const MAX_DEPTH: usize = 32;
        const MIN_TRIANGLES: usize = 4;

        if triangles.len() <= MIN_TRIANGLES || depth >= MAX_DEPTH {
            let bbox = Self::compute_union_bbox(&triangles);
            let indices: Vec<usize> = triangles.iter().map(|(idx, _)| *idx).collect();
            return BVHNode::leaf(bbox, indices);
        }

        // Split at the median along the longest axis
        let split_axis = Self::find_best_split_axis(&triangles);
        triangles.sort_by(|(_, bbox_a), (_, bbox_b)| {
            bbox_a.center()[split_axis].total_cmp(&bbox_b.center()[split_axis])
        });

        let right_triangles = triangles.split_off(triangles.len() / 2);
        let left = Box::new(Self::build_recursive(triangles, depth + 1));
        let right = Box::new(Self::build_recursive(right_triangles, depth + 1));
        let bbox = left.bbox.union(&right.bbox);

        BVHNode::internal(bbox, left, right)
    }

    /// Longest axis of the union box
    fn find_best_split_axis(triangles: &[(usize, BoundingBox)]) -> usize {
        let size = Self::compute_union_bbox(triangles).size();

        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    fn compute_union_bbox(triangles: &[(usize, BoundingBox)]) -> BoundingBox {
        triangles
            .iter()
            .fold(BoundingBox::empty(), |acc, (_, bbox)| acc.union(bbox))
    }

    /// Bounding box of everything in the hierarchy
    pub fn bounds(&self) -> &BoundingBox {
        &self.root.bbox
    }

    /// Query triangles whose boxes intersect the given bounding box
    pub fn query_triangles(&self, bbox: &BoundingBox) -> Vec<usize> {
        let mut result = Vec::new();
        Self::query_recursive(&self.root, bbox, &mut result);
        result
    }

    fn query_recursive(node: &BVHNode, bbox: &BoundingBox, result: &mut Vec<usize>) {
        if !node.bbox.intersects(bbox) {
            return;
        }

        if node.is_leaf() {
            result.extend_from_slice(&node.triangle_indices);
        } else {
            if let Some(ref left) = node.left {
                Self::query_recursive(left, bbox, result);
            }
            if let Some(ref right) = node.right {
                Self::query_recursive(right, bbox, result);
            }
        }
    }

    /// True if `predicate` accepts any triangle whose box intersects `bbox`.
    /// Stops at the first hit.
    pub fn any_in(&self, bbox: &BoundingBox, mut predicate: impl FnMut(usize) -> bool) -> bool {
        Self::any_recursive(&self.root, bbox, &mut predicate)
    }

    fn any_recursive(
        node: &BVHNode,
        bbox: &BoundingBox,
        predicate: &mut impl FnMut(usize) -> bool,
    ) -> bool {
        if !node.bbox.intersects(bbox) {
            return false;
        }

        if node.is_leaf() {
            return node.triangle_indices.iter().any(|&idx| predicate(idx));
        }

        node.left
            .as_ref()
            .is_some_and(|left| Self::any_recursive(left, bbox, predicate))
            || node
                .right
                .as_ref()
                .is_some_and(|right| Self::any_recursive(right, bbox, predicate))
    }

    #[cfg(test)]
    pub fn root(&self) -> &BVHNode {
        &self.root
    }
}
