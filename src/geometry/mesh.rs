// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh snapshot representation and utilities

use super::{BoundingBox, Side};
use crate::error::{SliceError, SliceResult};
use crate::utils::math::{lerp_f32, normalize_or};
use nalgebra::{Matrix4, Point3, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};

/// Number of texture coordinate channels a snapshot can carry
pub const MAX_UV_CHANNELS: usize = 4;

/// Up to four bone influences of a skinned vertex
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoneWeight {
    pub bones: [u32; 4],
    pub weights: [f32; 4],
}

impl BoneWeight {
    /// Full influence of a single bone
    pub fn single(bone: u32) -> Self {
        Self {
            bones: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// Blend two weight sets at `t`.
    /// Influences are merged by bone id and the four strongest kept.
    pub fn blend(&self, other: &BoneWeight, t: f32) -> BoneWeight {
        let mut merged: Vec<(u32, f32)> = Vec::with_capacity(8);
        let sources = self
            .bones
            .iter()
            .zip(self.weights.iter().map(|w| w * (1.0 - t)))
            .chain(other.bones.iter().zip(other.weights.iter().map(|w| w * t)));

        for (&bone, weight) in sources {
            if weight <= 0.0 {
                continue;
            }
            match merged.iter_mut().find(|(b, _)| *b == bone) {
                Some(entry) => entry.1 += weight,
                None => merged.push((bone, weight)),
            }
        }

        // Heaviest first; equal weights by bone id so the output is deterministic
        merged.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        merged.truncate(4);

        let mut result = BoneWeight::default();
        for (slot, (bone, weight)) in merged.into_iter().enumerate() {
            result.bones[slot] = bone;
            result.weights[slot] = weight;
        }
        result.normalized()
    }

    /// Rescale weights so they sum to one
    pub fn normalized(mut self) -> Self {
        let total: f32 = self.weights.iter().sum();
        if total > f32::EPSILON {
            for w in &mut self.weights {
                *w /= total;
            }
        }
        self
    }
}

/// Per-vertex attribute channels.
///
/// `positions` is always present. Every other channel is either `None` (the
/// mesh has no such data) or holds exactly one entry per vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexAttributes {
    pub positions: Vec<Point3<f64>>,
    pub normals: Option<Vec<Vector3<f64>>>,
    /// Linear RGBA
    pub colors: Option<Vec<[f32; 4]>>,
    pub uvs: [Option<Vec<Vector2<f64>>>; MAX_UV_CHANNELS],
    /// Tangent direction in xyz, handedness in w
    pub tangents: Option<Vec<Vector4<f64>>>,
    pub bone_weights: Option<Vec<BoneWeight>>,
}

impl VertexAttributes {
    /// Positions only
    pub fn from_positions(positions: Vec<Point3<f64>>) -> Self {
        Self {
            positions,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Check that every present channel has one entry per vertex
    pub fn validate(&self) -> SliceResult<()> {
        let expected = self.positions.len();
        let check = |channel: &'static str, found: Option<usize>| match found {
            Some(found) if found != expected => {
                Err(SliceError::attribute_mismatch(channel, expected, found))
            }
            _ => Ok(()),
        };

        check("normals", self.normals.as_ref().map(Vec::len))?;
        check("colors", self.colors.as_ref().map(Vec::len))?;
        check("tangents", self.tangents.as_ref().map(Vec::len))?;
        check("bone_weights", self.bone_weights.as_ref().map(Vec::len))?;
        const UV_NAMES: [&str; MAX_UV_CHANNELS] = ["uv0", "uv1", "uv2", "uv3"];
        for (channel, uv) in UV_NAMES.iter().zip(&self.uvs) {
            check(channel, uv.as_ref().map(Vec::len))?;
        }
        Ok(())
    }

    /// An empty buffer carrying the same set of channels
    pub fn empty_like(&self, capacity: usize) -> Self {
        fn like<T>(channel: &Option<Vec<T>>, capacity: usize) -> Option<Vec<T>> {
            channel.as_ref().map(|_| Vec::with_capacity(capacity))
        }

        Self {
            positions: Vec::with_capacity(capacity),
            normals: like(&self.normals, capacity),
            colors: like(&self.colors, capacity),
            uvs: [
                like(&self.uvs[0], capacity),
                like(&self.uvs[1], capacity),
                like(&self.uvs[2], capacity),
                like(&self.uvs[3], capacity),
            ],
            tangents: like(&self.tangents, capacity),
            bone_weights: like(&self.bone_weights, capacity),
        }
    }

    /// Append vertex `index` of `source`, which must carry the same channels.
    /// Returns the new vertex index.
    pub fn push_from(&mut self, source: &VertexAttributes, index: usize) -> u32 {
        fn copy<T: Copy>(dst: &mut Option<Vec<T>>, src: &Option<Vec<T>>, index: usize) {
            if let (Some(dst), Some(src)) = (dst.as_mut(), src.as_ref()) {
                dst.push(src[index]);
            }
        }

        let new_index = self.positions.len() as u32;
        self.positions.push(source.positions[index]);
        copy(&mut self.normals, &source.normals, index);
        copy(&mut self.colors, &source.colors, index);
        for (dst, src) in self.uvs.iter_mut().zip(&source.uvs) {
            copy(dst, src, index);
        }
        copy(&mut self.tangents, &source.tangents, index);
        copy(&mut self.bone_weights, &source.bone_weights, index);
        new_index
    }

    /// Append a copy of one of this buffer's own vertices
    pub fn duplicate(&mut self, index: usize) -> u32 {
        fn copy<T: Copy>(channel: &mut Option<Vec<T>>, index: usize) {
            if let Some(values) = channel.as_mut() {
                let value = values[index];
                values.push(value);
            }
        }

        let new_index = self.positions.len() as u32;
        let position = self.positions[index];
        self.positions.push(position);
        copy(&mut self.normals, index);
        copy(&mut self.colors, index);
        for uv in self.uvs.iter_mut() {
            copy(uv, index);
        }
        copy(&mut self.tangents, index);
        copy(&mut self.bone_weights, index);
        new_index
    }

    /// Append the vertex interpolated between `a` and `b` at parameter `t`.
    ///
    /// `position` is supplied by the caller so that a cut edge shared by two
    /// triangles yields bit-identical coordinates. Every other present channel
    /// is interpolated here: normals and tangent directions are renormalized,
    /// tangent handedness comes from the nearer endpoint, bone weights are
    /// blended and renormalized.
    pub fn push_interpolated(&mut self, a: usize, b: usize, t: f64, position: Point3<f64>) -> u32 {
        let new_index = self.positions.len() as u32;
        self.positions.push(position);

        if let Some(normals) = self.normals.as_mut() {
            let (na, nb) = (normals[a], normals[b]);
            normals.push(normalize_or(na.lerp(&nb, t), na));
        }
        if let Some(colors) = self.colors.as_mut() {
            let (ca, cb) = (colors[a], colors[b]);
            let tf = t as f32;
            colors.push(std::array::from_fn(|k| lerp_f32(ca[k], cb[k], tf)));
        }
        for uv in self.uvs.iter_mut().flatten() {
            let value = uv[a].lerp(&uv[b], t);
            uv.push(value);
        }
        if let Some(tangents) = self.tangents.as_mut() {
            let (ta, tb) = (tangents[a], tangents[b]);
            let dir = normalize_or(ta.xyz().lerp(&tb.xyz(), t), ta.xyz());
            let w = if t < 0.5 { ta.w } else { tb.w };
            tangents.push(Vector4::new(dir.x, dir.y, dir.z, w));
        }
        if let Some(weights) = self.bone_weights.as_mut() {
            let blended = weights[a].blend(&weights[b], t as f32);
            weights.push(blended);
        }
        new_index
    }

    /// Vertices listed in `order`, in that order
    pub fn gather(&self, order: &[u32]) -> VertexAttributes {
        let mut out = self.empty_like(order.len());
        for &index in order {
            out.push_from(self, index as usize);
        }
        out
    }

    /// Append all vertices of `other`.
    /// Channels missing on either side are dropped from the result.
    pub fn append(&mut self, other: &VertexAttributes) {
        fn merge<T: Clone>(dst: &mut Option<Vec<T>>, src: &Option<Vec<T>>) {
            match (dst.as_mut(), src.as_ref()) {
                (Some(dst), Some(src)) => dst.extend_from_slice(src),
                _ => *dst = None,
            }
        }

        // An empty buffer adopts the other buffer's channel layout
        if self.positions.is_empty() {
            *self = other.clone();
            return;
        }

        self.positions.extend_from_slice(&other.positions);
        merge(&mut self.normals, &other.normals);
        merge(&mut self.colors, &other.colors);
        for (dst, src) in self.uvs.iter_mut().zip(&other.uvs) {
            merge(dst, src);
        }
        merge(&mut self.tangents, &other.tangents);
        merge(&mut self.bone_weights, &other.bone_weights);
    }
}

/// A triangle resolved against its snapshot, tagged with the side it belongs to
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub indices: [u32; 3],
    pub positions: [Point3<f64>; 3],
    pub submesh: usize,
    pub side: Side,
}

impl Triangle {
    pub fn new(indices: [u32; 3], positions: [Point3<f64>; 3], submesh: usize, side: Side) -> Self {
        Self {
            indices,
            positions,
            submesh,
            side,
        }
    }

    /// Unnormalized face normal (right-hand rule)
    pub fn normal(&self) -> Vector3<f64> {
        let [a, b, c] = &self.positions;
        (b - a).cross(&(c - a))
    }

    pub fn area(&self) -> f64 {
        let [a, b, c] = &self.positions;
        super::robust_predicates::triangle_area(a, b, c)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.positions)
    }
}

/// Immutable capture of a source mesh: attribute buffers plus an index
/// buffer partitioned by submesh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub vertices: VertexAttributes,
    /// Skinning bind poses, one per bone; carried through unchanged
    pub bind_poses: Option<Vec<Matrix4<f64>>>,
    pub submeshes: Vec<Vec<[u32; 3]>>,
}

impl MeshSnapshot {
    /// Single-submesh snapshot with positions only
    pub fn new(positions: Vec<Point3<f64>>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices: VertexAttributes::from_positions(positions),
            bind_poses: None,
            submeshes: vec![triangles],
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_attributes(vertices: VertexAttributes, submeshes: Vec<Vec<[u32; 3]>>) -> Self {
        Self {
            vertices,
            bind_poses: None,
            submeshes,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.submeshes.iter().map(Vec::len).sum()
    }

    pub fn submesh_count(&self) -> usize {
        self.submeshes.len()
    }

    /// Check attribute counts and index ranges
    pub fn validate(&self) -> SliceResult<()> {
        self.vertices.validate()?;
        let vertex_count = self.vertices.len();
        for (submesh, triangles) in self.submeshes.iter().enumerate() {
            for tri in triangles {
                if let Some(&index) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                    return Err(SliceError::IndexOutOfRange {
                        submesh,
                        index,
                        vertex_count,
                    });
                }
            }
        }
        Ok(())
    }

    /// The three positions of a triangle
    #[inline]
    pub fn triangle_positions(&self, tri: &[u32; 3]) -> [Point3<f64>; 3] {
        tri.map(|i| self.vertices.positions[i as usize])
    }

    /// Iterate over the positions of every triangle in every submesh
    pub fn triangle_soup(&self) -> impl Iterator<Item = [Point3<f64>; 3]> + '_ {
        self.submeshes
            .iter()
            .flatten()
            .map(move |tri| self.triangle_positions(tri))
    }

    /// Compute bounding box of the referenced positions
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(&self.vertices.positions)
    }

    /// Merge another snapshot of the same source (submesh `k` joins submesh `k`)
    pub fn merge(&mut self, other: &MeshSnapshot) {
        let offset = self.vertices.len() as u32;
        self.vertices.append(&other.vertices);
        if self.bind_poses.is_none() {
            self.bind_poses = other.bind_poses.clone();
        }
        if self.submeshes.len() < other.submeshes.len() {
            self.submeshes.resize(other.submeshes.len(), Vec::new());
        }
        for (dst, src) in self.submeshes.iter_mut().zip(&other.submeshes) {
            dst.extend(src.iter().map(|tri| tri.map(|i| i + offset)));
        }
    }

    /// Recompute vertex normals from triangle geometry.
    /// Face normals are area-weighted and averaged at shared vertices.
    pub fn recompute_normals(&mut self) {
        let positions = &self.vertices.positions;
        let mut sums = vec![Vector3::zeros(); positions.len()];

        for tri in self.submeshes.iter().flatten() {
            let [a, b, c] = tri.map(|i| positions[i as usize]);
            let face_normal = (b - a).cross(&(c - a));
            for &idx in tri {
                sums[idx as usize] += face_normal;
            }
        }

        self.vertices.normals = Some(
            sums.into_iter()
                .map(|n| normalize_or(n, Vector3::z()))
                .collect(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_with_uvs() -> MeshSnapshot {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut vertices = VertexAttributes::from_positions(positions);
        vertices.uvs[0] = Some(vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ]);
        MeshSnapshot::with_attributes(vertices, vec![vec![[0, 1, 2], [0, 2, 3]]])
    }

    #[test]
    fn test_validate_catches_mismatch() {
        let mut mesh = quad_with_uvs();
        assert!(mesh.validate().is_ok());

        mesh.vertices.normals = Some(vec![Vector3::z(); 3]);
        match mesh.validate() {
            Err(SliceError::AttributeMismatch { channel, expected, found }) => {
                assert_eq!(channel, "normals");
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_validate_catches_bad_index() {
        let mesh = MeshSnapshot::new(vec![Point3::origin(); 3], vec![[0, 1, 3]]);
        assert!(matches!(
            mesh.validate(),
            Err(SliceError::IndexOutOfRange { index: 3, .. })
        ));
    }

    #[test]
    fn test_interpolation_keeps_absent_channels_absent() {
        let mut mesh = quad_with_uvs();
        let p = Point3::new(0.5, 0.0, 0.0);
        let idx = mesh.vertices.push_interpolated(0, 1, 0.5, p);

        assert_eq!(idx, 4);
        assert!(mesh.vertices.normals.is_none());
        assert!(mesh.vertices.colors.is_none());
        assert!(mesh.vertices.uvs[1].is_none());
        assert_eq!(mesh.vertices.uvs[0].as_ref().unwrap()[4], Vector2::new(0.5, 0.0));
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_normals_renormalized() {
        let mut vertices = VertexAttributes::from_positions(vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
        vertices.normals = Some(vec![Vector3::x(), Vector3::y()]);
        vertices.push_interpolated(0, 1, 0.5, Point3::new(0.5, 0.0, 0.0));
        let n = vertices.normals.as_ref().unwrap()[2];
        assert!((n.norm() - 1.0).abs() < 1e-12);
        assert!((n.x - n.y).abs() < 1e-12);
    }

    #[test]
    fn test_bone_weight_blend() {
        let a = BoneWeight::single(3);
        let b = BoneWeight {
            bones: [3, 7, 0, 0],
            weights: [0.5, 0.5, 0.0, 0.0],
        };
        let mid = a.blend(&b, 0.5);
        assert_eq!(mid.bones[0], 3);
        assert_eq!(mid.bones[1], 7);
        assert!((mid.weights[0] - 0.75).abs() < 1e-6);
        assert!((mid.weights[1] - 0.25).abs() < 1e-6);
        assert!((mid.weights.iter().sum::<f32>() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_merge_offsets_indices() {
        let mut a = quad_with_uvs();
        let b = quad_with_uvs();
        a.merge(&b);
        assert_eq!(a.vertex_count(), 8);
        assert_eq!(a.triangle_count(), 4);
        assert_eq!(a.submeshes[0][2], [4, 5, 6]);
        assert!(a.vertices.uvs[0].is_some());
        assert!(a.validate().is_ok());
    }

    #[test]
    fn test_recompute_normals() {
        let mut mesh = quad_with_uvs();
        mesh.recompute_normals();
        let normals = mesh.vertices.normals.as_ref().unwrap();
        assert!(normals.iter().all(|n| (n - Vector3::z()).norm() < 1e-12));
    }
}
