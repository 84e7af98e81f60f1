//! Error taxonomy for the analysis pipeline.
//!
//! Every failure carries enough context (stage, frame index where applicable)
//! to diagnose a run. No error is downgraded to a default decision; stages do
//! not retry — a failed stage aborts the run.

use scene_models::SceneError;
use std::fmt;
use thiserror::Error;

/// Pipeline stage names, used in error context and log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Smoother,
    Reconstructor,
    Predictor,
    Decision,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Smoother => "smoother",
            Stage::Reconstructor => "reconstructor",
            Stage::Predictor => "predictor",
            Stage::Decision => "decision",
        };
        f.write_str(name)
    }
}

/// All failure modes of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input violates the observation schema or ordering invariants.
    #[error("malformed input at frame {frame}: {reason}")]
    MalformedInput { frame: u32, reason: String },

    /// Too few valid observations for a stage to produce a meaningful estimate.
    #[error("{stage}: insufficient data: {reason}")]
    InsufficientData { stage: Stage, reason: String },

    /// Gap in detections exceeded the configured tolerance mid-flight.
    #[error(
        "track lost after frame {last_frame}: {gap} consecutive frames \
         without a usable detection (limit {limit})"
    )]
    TrackLost { last_frame: u32, gap: u32, limit: u32 },

    /// Missing, invalid or unrecognized configuration. Raised before any
    /// stage runs.
    #[error("configuration: {reason}")]
    Configuration { reason: String },

    /// Physics fit produced values outside the configured sanity bounds.
    #[error("{stage}: implausible trajectory: {reason}")]
    ImplausibleTrajectory { stage: Stage, reason: String },
}

impl From<SceneError> for PipelineError {
    fn from(err: SceneError) -> Self {
        PipelineError::Configuration {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_carry_stage_context() {
        let err = PipelineError::InsufficientData {
            stage: Stage::Predictor,
            reason: "need at least 2 world states".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("predictor"), "stage name missing: {msg}");
    }

    #[test]
    fn track_lost_distinct_from_insufficient_data() {
        let lost = PipelineError::TrackLost {
            last_frame: 42,
            gap: 13,
            limit: 12,
        };
        assert!(lost.to_string().contains("frame 42"));
        assert!(matches!(lost, PipelineError::TrackLost { .. }));
    }
}
