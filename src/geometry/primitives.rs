// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric primitives generator
//!
//! Closed, outward-wound test meshes with normals and UVs. Vertices are
//! duplicated along UV seams and hard edges.

use super::{MeshSnapshot, VertexAttributes};
use nalgebra::{Point3, Vector2, Vector3, Vector4};
use std::f64::consts::PI;

/// Geometric primitives, centered at the origin, round ones around +y
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Cube { size: f64 },
    Sphere { r: f64, segments: u32 },
    Cylinder { h: f64, r: f64, segments: u32 },
    Torus { major: f64, minor: f64, rings: u32, sides: u32 },
}

impl Primitive {
    pub fn cube(size: f64) -> Self {
        Self::Cube { size }
    }

    pub fn sphere(r: f64, segments: u32) -> Self {
        Self::Sphere {
            r,
            segments: segments.max(3),
        }
    }

    pub fn cylinder(h: f64, r: f64, segments: u32) -> Self {
        Self::Cylinder {
            h,
            r,
            segments: segments.max(3),
        }
    }

    pub fn torus(major: f64, minor: f64, rings: u32, sides: u32) -> Self {
        Self::Torus {
            major,
            minor,
            rings: rings.max(3),
            sides: sides.max(3),
        }
    }

    pub fn to_snapshot(&self) -> MeshSnapshot {
        let mut builder = Builder::default();
        match *self {
            Self::Cube { size } => builder.cube(size),
            Self::Sphere { r, segments } => builder.sphere(r, segments),
            Self::Cylinder { h, r, segments } => builder.cylinder(h, r, segments),
            Self::Torus {
                major,
                minor,
                rings,
                sides,
            } => builder.torus(major, minor, rings, sides),
        }
        builder.finish()
    }
}

#[derive(Default)]
struct Builder {
    positions: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    uvs: Vec<Vector2<f64>>,
    triangles: Vec<[u32; 3]>,
}

impl Builder {
    fn vertex(&mut self, position: Point3<f64>, normal: Vector3<f64>, uv: Vector2<f64>) -> u32 {
        self.positions.push(position);
        self.normals.push(normal);
        self.uvs.push(uv);
        (self.positions.len() - 1) as u32
    }

    /// Two triangles over a grid cell: `a b` on the upper row, `c d` below
    fn quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.triangles.push([a, b, c]);
        self.triangles.push([b, d, c]);
    }

    fn cube(&mut self, size: f64) {
        let h = size / 2.0;
        let corners = [
            Point3::new(-h, -h, -h),
            Point3::new(h, -h, -h),
            Point3::new(h, h, -h),
            Point3::new(-h, h, -h),
            Point3::new(-h, -h, h),
            Point3::new(h, -h, h),
            Point3::new(h, h, h),
            Point3::new(-h, h, h),
        ];

        // Counter-clockwise seen from outside
        let faces = [
            ([4, 5, 6, 7], Vector3::z()),
            ([1, 0, 3, 2], -Vector3::z()),
            ([5, 1, 2, 6], Vector3::x()),
            ([0, 4, 7, 3], -Vector3::x()),
            ([7, 6, 2, 3], Vector3::y()),
            ([0, 1, 5, 4], -Vector3::y()),
        ];
        let uvs = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.0, 1.0),
        ];

        for (quad, normal) in faces {
            let ids = [0, 1, 2, 3].map(|k| self.vertex(corners[quad[k]], normal, uvs[k]));
            self.triangles.push([ids[0], ids[1], ids[2]]);
            self.triangles.push([ids[0], ids[2], ids[3]]);
        }
    }

    fn sphere(&mut self, r: f64, segments: u32) {
        let stacks = segments;
        let slices = segments * 2;

        let top: Vec<u32> = (0..slices)
            .map(|j| {
                let u = (j as f64 + 0.5) / slices as f64;
                self.vertex(Point3::new(0.0, r, 0.0), Vector3::y(), Vector2::new(u, 1.0))
            })
            .collect();

        // Rings 1..stacks-1, each with a seam column
        let mut rings = Vec::new();
        for i in 1..stacks {
            let phi = PI * i as f64 / stacks as f64;
            let ring: Vec<u32> = (0..=slices)
                .map(|j| {
                    let theta = 2.0 * PI * j as f64 / slices as f64;
                    let normal = Vector3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                    let uv = Vector2::new(j as f64 / slices as f64, 1.0 - i as f64 / stacks as f64);
                    self.vertex(Point3::from(normal * r), normal, uv)
                })
                .collect();
            rings.push(ring);
        }

        let bottom: Vec<u32> = (0..slices)
            .map(|j| {
                let u = (j as f64 + 0.5) / slices as f64;
                self.vertex(Point3::new(0.0, -r, 0.0), -Vector3::y(), Vector2::new(u, 0.0))
            })
            .collect();

        let slices = slices as usize;
        for j in 0..slices {
            self.triangles.push([top[j], rings[0][j + 1], rings[0][j]]);
        }
        for pair in rings.windows(2) {
            for j in 0..slices {
                self.quad(pair[0][j], pair[0][j + 1], pair[1][j], pair[1][j + 1]);
            }
        }
        let last = &rings[rings.len() - 1];
        for j in 0..slices {
            self.triangles.push([last[j], last[j + 1], bottom[j]]);
        }
    }

    fn cylinder(&mut self, h: f64, r: f64, segments: u32) {
        let half = h / 2.0;
        let n = segments as usize;
        let angle = |j: usize| 2.0 * PI * j as f64 / n as f64;

        let mut upper = Vec::with_capacity(n + 1);
        let mut lower = Vec::with_capacity(n + 1);
        for j in 0..=n {
            let (s, c) = angle(j).sin_cos();
            let normal = Vector3::new(c, 0.0, s);
            let u = j as f64 / n as f64;
            upper.push(self.vertex(Point3::new(r * c, half, r * s), normal, Vector2::new(u, 1.0)));
            lower.push(self.vertex(Point3::new(r * c, -half, r * s), normal, Vector2::new(u, 0.0)));
        }
        for j in 0..n {
            self.quad(upper[j], upper[j + 1], lower[j], lower[j + 1]);
        }

        for (y, normal) in [(half, Vector3::y()), (-half, -Vector3::y())] {
            let center = self.vertex(Point3::new(0.0, y, 0.0), normal, Vector2::new(0.5, 0.5));
            let rim: Vec<u32> = (0..n)
                .map(|j| {
                    let (s, c) = angle(j).sin_cos();
                    self.vertex(Point3::new(r * c, y, r * s), normal, Vector2::new(0.5 + c / 2.0, 0.5 + s / 2.0))
                })
                .collect();
            for j in 0..n {
                let (a, b) = (rim[j], rim[(j + 1) % n]);
                if y > 0.0 {
                    self.triangles.push([center, b, a]);
                } else {
                    self.triangles.push([center, a, b]);
                }
            }
        }
    }

    fn torus(&mut self, major: f64, minor: f64, rings: u32, sides: u32) {
        let (nu, nv) = (rings as usize, sides as usize);
        let mut grid = vec![vec![0u32; nv + 1]; nu + 1];

        for (i, row) in grid.iter_mut().enumerate() {
            let (su, cu) = (2.0 * PI * i as f64 / nu as f64).sin_cos();
            for (j, id) in row.iter_mut().enumerate() {
                let (sv, cv) = (2.0 * PI * j as f64 / nv as f64).sin_cos();
                let normal = Vector3::new(cv * cu, sv, cv * su);
                let radius = major + minor * cv;
                let position = Point3::new(radius * cu, minor * sv, radius * su);
                let uv = Vector2::new(i as f64 / nu as f64, j as f64 / nv as f64);
                *id = self.vertex(position, normal, uv);
            }
        }

        for i in 0..nu {
            for j in 0..nv {
                let (a, b) = (grid[i][j], grid[i][j + 1]);
                let (c, d) = (grid[i + 1][j], grid[i + 1][j + 1]);
                self.triangles.push([a, b, c]);
                self.triangles.push([b, d, c]);
            }
        }
    }

    fn finish(self) -> MeshSnapshot {
        // Tangent along the first triangle edge touching each vertex
        let mut tangents = vec![Vector4::new(1.0, 0.0, 0.0, 1.0); self.positions.len()];
        let mut seen = vec![false; self.positions.len()];
        for tri in &self.triangles {
            for k in 0..3 {
                let (i, j) = (tri[k] as usize, tri[(k + 1) % 3] as usize);
                if seen[i] {
                    continue;
                }
                let edge = self.positions[j] - self.positions[i];
                let n = self.normals[i];
                let t = edge - n * edge.dot(&n);
                if t.norm() > 1e-12 {
                    let t = t.normalize();
                    tangents[i] = Vector4::new(t.x, t.y, t.z, 1.0);
                    seen[i] = true;
                }
            }
        }

        let mut vertices = VertexAttributes::from_positions(self.positions);
        vertices.normals = Some(self.normals);
        vertices.uvs[0] = Some(self.uvs);
        vertices.tangents = Some(tangents);
        MeshSnapshot::with_attributes(vertices, vec![self.triangles])
    }
}
