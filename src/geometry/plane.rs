// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Slicing plane and half-space sides

use super::robust_predicates::point_plane_test;
use crate::error::{SliceError, SliceResult};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which half-space of the slicing plane something ended up in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Same side as the plane normal
    Positive,
    /// Opposite side from the plane normal
    Negative,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Positive => Side::Negative,
            Side::Negative => Side::Positive,
        }
    }

    pub fn is_positive(self) -> bool {
        self == Side::Positive
    }

    /// Side of a signed distance; zero counts as positive
    pub fn of_distance(distance: f64) -> Side {
        if distance < 0.0 {
            Side::Negative
        } else {
            Side::Positive
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Positive => 0,
            Side::Negative => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Positive => write!(f, "positive"),
            Side::Negative => write!(f, "negative"),
        }
    }
}

/// A plane in 3D space, represented as `normal · point = distance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlicePlane {
    normal: Vector3<f64>,
    distance: f64,
}

impl SlicePlane {
    /// Creates a plane from a normal and signed distance from the origin.
    /// The normal is normalized and the distance scaled accordingly.
    pub fn new(normal: Vector3<f64>, distance: f64) -> SliceResult<Self> {
        let norm = normal.norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Err(SliceError::invalid_plane("plane normal must be non-zero and finite"));
        }
        if !distance.is_finite() {
            return Err(SliceError::invalid_plane("plane distance must be finite"));
        }
        Ok(Self {
            normal: normal / norm,
            distance: distance / norm,
        })
    }

    /// Creates a plane through `point` with the given normal.
    pub fn from_point_and_normal(point: Point3<f64>, normal: Vector3<f64>) -> SliceResult<Self> {
        let norm = normal.norm();
        if !norm.is_finite() || norm < 1e-12 {
            return Err(SliceError::invalid_plane("plane normal must be non-zero and finite"));
        }
        let unit = normal / norm;
        Ok(Self {
            normal: unit,
            distance: unit.dot(&point.coords),
        })
    }

    /// Unit normal of the plane
    #[inline]
    pub fn normal(&self) -> Vector3<f64> {
        self.normal
    }

    /// Signed distance from the origin along the normal
    #[inline]
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Signed distance from a point to the plane.
    /// Positive on the normal side.
    #[inline]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        point_plane_test(point, &self.normal, self.distance)
    }

    /// Half-space a point lies in (points on the plane count as positive)
    #[inline]
    pub fn side_of(&self, point: &Point3<f64>) -> Side {
        Side::of_distance(self.signed_distance(point))
    }

    /// The same plane with the normal flipped
    pub fn flipped(&self) -> Self {
        Self {
            normal: -self.normal,
            distance: -self.distance,
        }
    }

    /// Closest point on the plane
    pub fn project_point(&self, point: &Point3<f64>) -> Point3<f64> {
        point - self.normal * self.signed_distance(point)
    }
}
