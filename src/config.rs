// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Slice configuration system

use crate::host::MaterialId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default numeric tolerances
pub mod defaults {
    /// Thinnest slab allowed on either side of a cut
    pub const MIN_WIDTH: f64 = 0.001;
    /// Signed distances below this are snapped to exactly zero
    pub const PLANE_EPSILON: f64 = 1e-5;
    /// Cut vertices closer than this are the same loop vertex
    pub const WELD_TOLERANCE: f64 = 1e-6;
    /// Distance tolerance of the triangle-triangle overlap test
    pub const OVERLAP_EPSILON: f64 = 1e-5;
}

/// How a component reacts to a slice request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SliceType {
    /// Cut the geometry along the plane
    #[default]
    Slice,
    /// Keep the geometry whole on the side of its center
    KeepOne,
    /// Keep a whole copy on both sides
    Duplicate,
}

/// Per-component slice options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceConfig {
    pub slice_type: SliceType,
    /// Fill the cut with cap geometry
    pub create_cap: bool,
    /// Fall back to an uncut mesh when any boundary loop fails to close
    pub skip_if_not_closed: bool,
    /// Material for the cap submesh; `None` puts caps in the last submesh
    pub slice_material: Option<MaterialId>,
}

impl Default for SliceConfig {
    fn default() -> Self {
        Self {
            slice_type: SliceType::Slice,
            create_cap: true,
            skip_if_not_closed: false,
            slice_material: None,
        }
    }
}

impl SliceConfig {
    pub fn with_type(slice_type: SliceType) -> Self {
        Self {
            slice_type,
            ..Self::default()
        }
    }
}

/// Request-wide tolerances and behavior switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SliceSettings {
    /// Minimum slab thickness on either side of the cut
    pub min_width: f64,
    /// Snap tolerance for vertex-plane distances
    pub plane_epsilon: f64,
    /// Position tolerance for stitching boundary loops and finding islands
    pub weld_tolerance: f64,
    /// Distance tolerance for triangle-triangle overlap
    pub overlap_epsilon: f64,
    /// Merge islands into one fragment only when their triangles touch
    pub group_by_intersection: bool,
    /// Block behind an in-flight slice of the same object instead of rejecting
    pub wait_if_busy: bool,
    /// Dissect renderers of one request on the rayon pool
    pub parallel: bool,
}

impl Default for SliceSettings {
    fn default() -> Self {
        Self {
            min_width: defaults::MIN_WIDTH,
            plane_epsilon: defaults::PLANE_EPSILON,
            weld_tolerance: defaults::WELD_TOLERANCE,
            overlap_epsilon: defaults::OVERLAP_EPSILON,
            group_by_intersection: true,
            wait_if_busy: false,
            parallel: true,
        }
    }
}

impl SliceSettings {
    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        let settings: SliceSettings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path.as_ref()))?;
        Ok(settings)
    }

    /// Load settings from `meshslice.toml` (if present) with environment overrides
    pub fn load() -> Result<Self> {
        let mut settings = if PathBuf::from("meshslice.toml").exists() {
            Self::from_file("meshslice.toml")?
        } else {
            Self::default()
        };

        if let Ok(min_width) = std::env::var("MESHSLICE_MIN_WIDTH") {
            settings.min_width = min_width
                .parse()
                .with_context(|| format!("Invalid MESHSLICE_MIN_WIDTH: {min_width}"))?;
        }

        if let Ok(wait) = std::env::var("MESHSLICE_WAIT_IF_BUSY") {
            settings.wait_if_busy = wait.parse().unwrap_or(false);
        }

        if let Ok(parallel) = std::env::var("MESHSLICE_PARALLEL") {
            settings.parallel = parallel.parse().unwrap_or(true);
        }

        if let Ok(grouping) = std::env::var("MESHSLICE_GROUP_BY_INTERSECTION") {
            settings.group_by_intersection = grouping.parse().unwrap_or(true);
        }

        Ok(settings)
    }

    /// Save settings to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: SliceSettings = toml::from_str("min_width = 0.05\nwait_if_busy = true").unwrap();
        assert_eq!(settings.min_width, 0.05);
        assert!(settings.wait_if_busy);
        assert_eq!(settings.weld_tolerance, defaults::WELD_TOLERANCE);
        assert!(settings.group_by_intersection);
    }

    #[test]
    fn test_slice_config_defaults() {
        let config = SliceConfig::default();
        assert_eq!(config.slice_type, SliceType::Slice);
        assert!(config.create_cap);
        assert!(!config.skip_if_not_closed);
        assert!(config.slice_material.is_none());

        let keep = SliceConfig::with_type(SliceType::KeepOne);
        assert_eq!(keep.slice_type, SliceType::KeepOne);
        assert!(keep.create_cap);
    }
}
