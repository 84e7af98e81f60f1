//! Export boundary: stable, versioned schema for downstream consumers.
//!
//! The rendering/animation collaborator reads the full world track, the
//! trajectory (both as closed-form arc parameters and as a sampled point
//! list), and the decision — without depending on this crate's internal
//! representations. Bump [`SCHEMA_VERSION`] on any breaking change.

use crate::decision::Decision;
use crate::error::PipelineError;
use crate::physics::{BounceEvent, PhysicsArc};
use crate::pipeline::Analysis;
use crate::types::{Observation, WorldState};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use thiserror::Error;

/// Current report schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Default spacing of the sampled path (seconds).
pub const DEFAULT_SAMPLE_DT: f64 = 1.0 / 120.0;

/// Errors from the export/import boundary itself.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// One point of the densely sampled path.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathSample {
    pub time: f64,
    pub position: Vector3<f64>,
}

/// The full serialized output of one run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub schema_version: u32,
    pub frame_rate: f64,
    pub world_track: Vec<WorldState>,
    /// Closed-form arc parameters, for consumers that evaluate physics.
    pub arcs: Vec<PhysicsArc>,
    pub bounces: Vec<BounceEvent>,
    /// Pre-sampled path, for consumers that do not.
    pub sampled_path: Vec<PathSample>,
    pub decision: Decision,
}

impl AnalysisReport {
    /// Build a report from a completed analysis.
    pub fn from_analysis(analysis: &Analysis, frame_rate: f64) -> Self {
        let sampled_path = analysis
            .trajectory
            .sample(DEFAULT_SAMPLE_DT)
            .into_iter()
            .map(|(time, position)| PathSample { time, position })
            .collect();
        Self {
            schema_version: SCHEMA_VERSION,
            frame_rate,
            world_track: analysis.world_track.clone(),
            arcs: analysis.trajectory.arcs.clone(),
            bounces: analysis.trajectory.bounces.clone(),
            sampled_path,
            decision: analysis.decision.clone(),
        }
    }
}

/// Write a report as pretty JSON.
pub fn write_report<W: Write>(writer: W, report: &AnalysisReport) -> Result<(), ExportError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Read a report, rejecting schema versions we do not understand.
pub fn read_report<R: Read>(reader: R) -> Result<AnalysisReport, ExportError> {
    let report: AnalysisReport = serde_json::from_reader(reader)?;
    if report.schema_version != SCHEMA_VERSION {
        return Err(ExportError::UnsupportedVersion {
            found: report.schema_version,
            supported: SCHEMA_VERSION,
        });
    }
    Ok(report)
}

/// Parse an observation record list from the detector boundary.
/// Schema violations surface as [`PipelineError::MalformedInput`].
pub fn parse_observations<R: Read>(reader: R) -> Result<Vec<Observation>, PipelineError> {
    serde_json::from_reader(reader).map_err(|err| PipelineError::MalformedInput {
        frame: 0,
        reason: err.to_string(),
    })
}
