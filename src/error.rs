// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for slicing operations
//!
//! Geometric edge cases never surface here: they degrade to a `NotSliced`
//! outcome. These errors cover malformed input and integration bugs.

use thiserror::Error;

/// Errors that can occur while preparing or running a slice.
#[derive(Debug, Error)]
pub enum SliceError {
    /// A per-vertex attribute channel does not have one entry per vertex
    #[error("Attribute `{channel}` has {found} entries, expected {expected}")]
    AttributeMismatch {
        channel: &'static str,
        expected: usize,
        found: usize,
    },

    /// A triangle references a vertex that does not exist
    #[error("Submesh {submesh} references vertex {index} but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        submesh: usize,
        index: u32,
        vertex_count: usize,
    },

    /// Fewer materials than submeshes were supplied
    #[error("Mesh has {submeshes} submeshes but only {materials} materials")]
    MaterialMismatch { submeshes: usize, materials: usize },

    /// The collider shape cannot be tessellated into a slice input
    #[error("Unsupported collider shape: {kind}")]
    UnsupportedShape { kind: String },

    /// The slicing plane is unusable
    #[error("Invalid plane: {message}")]
    InvalidPlane { message: String },

    /// The host collaborator failed to provide or accept data
    #[error("Host error: {message}")]
    Host { message: String },
}

impl SliceError {
    /// Creates an attribute mismatch error.
    pub fn attribute_mismatch(channel: &'static str, expected: usize, found: usize) -> Self {
        Self::AttributeMismatch {
            channel,
            expected,
            found,
        }
    }

    /// Creates an unsupported shape error.
    pub fn unsupported_shape(kind: impl Into<String>) -> Self {
        Self::UnsupportedShape { kind: kind.into() }
    }

    /// Creates an invalid plane error.
    pub fn invalid_plane(message: impl Into<String>) -> Self {
        Self::InvalidPlane {
            message: message.into(),
        }
    }

    /// Creates a host error.
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }
}

/// Result alias used across the crate.
pub type SliceResult<T> = Result<T, SliceError>;
