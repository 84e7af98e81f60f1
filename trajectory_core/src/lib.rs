//! `trajectory_core` — Ball trajectory estimation and LBW decision engine.
//!
//! # Module layout
//! - [`types`]       — Fundamental types (observations, filtered/world states)
//! - [`error`]       — Error taxonomy (malformed input, track lost, ...)
//! - [`smoother`]    — Constant-velocity Kalman filter over image detections
//! - [`reconstruct`] — Image-plane track → world-frame trajectory
//! - [`physics`]     — Launch-state fit, closed-form arcs, bounce synthesis
//! - [`decision`]    — Target-volume intersection and verdict
//! - [`pipeline`]    — Full sequential analysis orchestrator
//! - [`export`]      — Versioned output schema for downstream consumers

pub mod decision;
pub mod error;
pub mod export;
pub mod physics;
pub mod pipeline;
pub mod reconstruct;
pub mod smoother;
pub mod types;

pub use decision::{Decision, DecisionConfig, TargetVolume, Verdict};
pub use error::{PipelineError, Stage};
pub use physics::{BounceEvent, DragModel, PhysicsArc, PhysicsConfig, Predictor, TrajectorySegment};
pub use pipeline::{Analysis, Pipeline, PipelineConfig, StageTimings};
pub use reconstruct::{Reconstructor, SceneConfig};
pub use smoother::{CvSmoother, SmootherConfig};
pub use types::{FilteredState, FrameIndex, Observation, SmootherCov, SmootherState, WorldState};
