//! Data types of an extraction run.
//!
//! This module defines the service and layer descriptors returned by
//! discovery, the features returned by a layer query, and the per-layer
//! outcomes that make up the final report.

use std::fmt;
use std::path::{Path, PathBuf};

use arcrest_core_common::GeometryKind;
use serde_json::{Map, Value};

/// Metadata of a map service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    /// Display name of the service (`mapName`)
    pub map_name: String,
    /// Layers in service order
    pub layers: Vec<LayerDescriptor>,
}

/// One layer of a map service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    /// Layer id, unique within the service
    pub id: i64,
    /// Display name
    pub name: String,
    /// Geometry kind, `Unknown` until the layer itself is described
    pub geometry_kind: GeometryKind,
}

impl LayerDescriptor {
    /// Creates a descriptor whose geometry kind is not known yet.
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            geometry_kind: GeometryKind::Unknown,
        }
    }
}

/// A feature as returned by the service: attributes keyed by field name and
/// an Esri JSON geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Attribute values in response order
    pub attributes: Map<String, Value>,
    /// Esri JSON geometry, `None` when the feature has none
    pub geometry: Option<Value>,
}

/// Result of querying one layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Features in response order
    pub features: Vec<Feature>,
    /// Geometry kind announced by the response (`geometryType`)
    pub geometry_kind: GeometryKind,
    /// Well-known id of the spatial reference the geometries are in
    pub spatial_reference: Option<i32>,
    /// Whether the service cut the result at its record limit
    pub truncated: bool,
}

/// Lifecycle of one layer during a run.
///
/// Transitions consume the state so a layer can only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Selected but not started
    Pending,
    /// Being queried or written
    InProgress,
    /// Written to the container
    Succeeded,
    /// Failed; the run moved on
    Failed,
}

impl LayerState {
    /// Moves a pending layer into progress.
    #[must_use]
    pub fn start(self) -> Self {
        match self {
            Self::Pending => Self::InProgress,
            other => other,
        }
    }

    /// Finishes an in-progress layer.
    #[must_use]
    pub fn finish(self, succeeded: bool) -> Self {
        match (self, succeeded) {
            (Self::InProgress, true) => Self::Succeeded,
            (Self::InProgress, false) => Self::Failed,
            (other, _) => other,
        }
    }

    /// Whether the layer reached a final state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for LayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::InProgress => "in progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Final status of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerStatus {
    /// The layer was written
    Succeeded {
        /// Number of features written
        feature_count: u64,
        /// Geometry kind the table was created with
        geometry_kind: GeometryKind,
    },
    /// The layer failed; the message names the cause
    Failed {
        /// Human-readable failure message
        message: String,
    },
}

/// Outcome of one layer, recorded exactly once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOutcome {
    /// Layer id
    pub layer_id: i64,
    /// Layer display name
    pub layer_name: String,
    /// Table name assigned in the container
    pub table_name: String,
    /// How the layer ended
    pub status: LayerStatus,
}

impl LayerOutcome {
    /// Whether the layer was written.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        matches!(self.status, LayerStatus::Succeeded { .. })
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionReport {
    destination: PathBuf,
    outcomes: Vec<LayerOutcome>,
}

impl ExtractionReport {
    /// Builds the report from the outcomes collected by the run.
    #[must_use]
    pub fn new(destination: impl Into<PathBuf>, outcomes: Vec<LayerOutcome>) -> Self {
        Self {
            destination: destination.into(),
            outcomes,
        }
    }

    /// Path of the destination container.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Per-layer outcomes in processing order.
    #[must_use]
    pub fn outcomes(&self) -> &[LayerOutcome] {
        &self.outcomes
    }

    /// Number of layers written.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    /// Number of layers that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

impl fmt::Display for ExtractionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} succeeded, {} failed, output: {}",
            self.succeeded(),
            self.failed(),
            self.destination.display()
        )
    }
}
