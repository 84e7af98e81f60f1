//! Pipeline orchestrator: the full analysis of one tracked delivery.
//!
//! # Processing steps per run (strictly sequential, batch)
//! 1. Validate configuration (fail fast, before any stage)
//! 2. Validate the observation sequence (schema/ordering invariants)
//! 3. Smoother: CV Kalman filter over the image detections
//! 4. Reconstructor: image track → world-frame states
//! 5. Predictor: fit + extrapolate the trajectory to the stump plane
//! 6. Decision: intersect with the target volume
//!
//! Each stage fully owns its output and hands it to the next by value; a
//! failed stage aborts the run. Retry policy belongs to the caller.

use crate::decision::{self, Decision, DecisionConfig};
use crate::error::PipelineError;
use crate::physics::{PhysicsConfig, Predictor, TrajectorySegment};
use crate::reconstruct::{Reconstructor, SceneConfig};
use crate::smoother::{CvSmoother, SmootherConfig};
use crate::types::{FilteredState, Observation, WorldState};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for a full pipeline run. Every section has documented
/// defaults; unrecognized keys are rejected rather than silently ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Video frame rate (frames/second), used to derive timestamps for
    /// records that do not embed one.
    pub frame_rate: f64,
    pub smoother: SmootherConfig,
    pub scene: SceneConfig,
    pub physics: PhysicsConfig,
    pub decision: DecisionConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 30.0,
            smoother: SmootherConfig::default(),
            scene: SceneConfig::default(),
            physics: PhysicsConfig::default(),
            decision: DecisionConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse from JSON, mapping schema violations (including unknown keys)
    /// to [`PipelineError::Configuration`].
    pub fn from_json_str(json: &str) -> Result<Self, PipelineError> {
        serde_json::from_str(json).map_err(|err| PipelineError::Configuration {
            reason: err.to_string(),
        })
    }

    /// Validate every section. Runs before any stage.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(PipelineError::Configuration {
                reason: format!("frame_rate must be finite and positive (got {})", self.frame_rate),
            });
        }
        self.smoother.validate()?;
        self.scene.build_projection().map(|_| ())?;
        self.physics.validate()?;
        self.decision.validate()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Per-stage wall-clock timings in microseconds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StageTimings {
    pub smooth_us: u64,
    pub reconstruct_us: u64,
    pub predict_us: u64,
    pub decide_us: u64,
    pub total_us: u64,
}

/// Everything a run produces, for the caller and the export boundary.
#[derive(Clone, Debug)]
pub struct Analysis {
    /// Smoothed image-plane track, one state per frame.
    pub filtered: Vec<FilteredState>,
    /// Reconstructed world-frame track.
    pub world_track: Vec<WorldState>,
    /// Extrapolated trajectory reaching past the stump plane.
    pub trajectory: TrajectorySegment,
    /// Final verdict.
    pub decision: Decision,
    pub timings: StageTimings,
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

/// Check schema/ordering invariants of the observation sequence.
/// Violations are [`PipelineError::MalformedInput`] — never silently skipped.
pub fn validate_observations(observations: &[Observation]) -> Result<(), PipelineError> {
    let mut prev_frame: Option<u32> = None;
    let mut prev_time: Option<f64> = None;

    for obs in observations {
        let frame = obs.frame.0;
        let fail = |reason: String| PipelineError::MalformedInput { frame, reason };

        if let Some(prev) = prev_frame {
            if frame <= prev {
                return Err(fail(format!(
                    "frame index not strictly increasing (previous {prev})"
                )));
            }
        }
        prev_frame = Some(frame);

        if let Some(t) = obs.timestamp {
            if !t.is_finite() {
                return Err(fail(format!("non-finite timestamp {t}")));
            }
            if let Some(pt) = prev_time {
                if t <= pt {
                    return Err(fail(format!(
                        "timestamp not strictly increasing (previous {pt}, got {t})"
                    )));
                }
            }
            prev_time = Some(t);
        }

        if !obs.confidence.is_finite() || !(0.0..=1.0).contains(&obs.confidence) {
            return Err(fail(format!(
                "confidence must be in [0, 1] (got {})",
                obs.confidence
            )));
        }
        if obs.detected && obs.position_px.is_none() {
            return Err(fail("detected frame carries no position".into()));
        }
        if let Some(p) = obs.position_px {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(fail(format!("non-finite position ({}, {})", p[0], p[1])));
            }
        }
        for (name, value) in [("radius_px", obs.radius_px), ("depth_m", obs.depth_m)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(fail(format!("{name} must be finite and positive (got {v})")));
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The assembled pipeline. Construction validates all configuration, so a
/// built pipeline can only fail on data.
#[derive(Debug)]
pub struct Pipeline {
    pub config: PipelineConfig,
    smoother: CvSmoother,
    reconstructor: Reconstructor,
    predictor: Predictor,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let reconstructor = Reconstructor::new(&config.scene)?;
        Ok(Self {
            smoother: CvSmoother::new(config.smoother.clone()),
            predictor: Predictor::new(config.physics.clone()),
            reconstructor,
            config,
        })
    }

    /// Run the full analysis on one observation sequence.
    pub fn run(&self, observations: &[Observation]) -> Result<Analysis, PipelineError> {
        let start_total = Instant::now();
        validate_observations(observations)?;

        // ----------------------------------------------------------------
        // Step 1: Smoother
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let filtered = self.smoother.smooth(observations, self.config.frame_rate)?;
        let smooth_us = t0.elapsed().as_micros() as u64;
        tracing::debug!(frames = filtered.len(), "smoother produced filtered track");

        // ----------------------------------------------------------------
        // Step 2: Reconstructor
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let world_track = self.reconstructor.reconstruct(&filtered)?;
        let reconstruct_us = t0.elapsed().as_micros() as u64;
        tracing::debug!(states = world_track.len(), "reconstructed world track");

        // ----------------------------------------------------------------
        // Step 3: Predictor
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let ball_radius = self.config.scene.geometry.ball_radius_m;
        let trajectory = self.predictor.predict(
            &world_track,
            ball_radius,
            self.config.decision.target.plane_x_m,
        )?;
        let predict_us = t0.elapsed().as_micros() as u64;
        tracing::debug!(
            arcs = trajectory.arcs.len(),
            bounces = trajectory.bounces.len(),
            "extrapolated trajectory"
        );

        // ----------------------------------------------------------------
        // Step 4: Decision
        // ----------------------------------------------------------------
        let t0 = Instant::now();
        let decision = decision::evaluate(&trajectory, &self.config.decision, ball_radius)?;
        let decide_us = t0.elapsed().as_micros() as u64;
        tracing::info!(
            verdict = ?decision.verdict,
            impact_height = decision.impact_height,
            margin = decision.margin,
            "analysis complete"
        );

        Ok(Analysis {
            filtered,
            world_track,
            trajectory,
            decision,
            timings: StageTimings {
                smooth_us,
                reconstruct_us,
                predict_us,
                decide_us,
                total_us: start_total.elapsed().as_micros() as u64,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Verdict;
    use crate::types::FrameIndex;
    use scene_models::{PlanarScaleParams, ProjectionConfig};

    fn detection(frame: u32, u: f64, v: f64) -> Observation {
        Observation {
            frame: FrameIndex(frame),
            timestamp: None,
            position_px: Some([u, v]),
            radius_px: None,
            depth_m: None,
            confidence: 1.0,
            detected: true,
        }
    }

    /// Straight pixel track headed down the frame center: aimed at the
    /// middle stump through the planar-scale map.
    fn straight_delivery(n: u32, lateral_px: f64) -> Vec<Observation> {
        (0..n)
            .map(|i| detection(i, lateral_px, 100.0 + 12.0 * f64::from(i)))
            .collect()
    }

    fn planar_config() -> PipelineConfig {
        PipelineConfig {
            scene: SceneConfig {
                projection: ProjectionConfig::PlanarScale(PlanarScaleParams::default()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn straight_delivery_hits_middle() {
        let pipeline = Pipeline::new(planar_config()).unwrap();
        let analysis = pipeline.run(&straight_delivery(30, 480.0)).unwrap();
        assert_eq!(analysis.decision.verdict, Verdict::Hitting);
        assert!(analysis.decision.impact_point.y.abs() < 0.02);
        assert_eq!(analysis.filtered.len(), 30);
        assert_eq!(analysis.world_track.len(), 30);
    }

    #[test]
    fn wide_delivery_misses() {
        // Drifting 6.5 px/frame laterally: well wide at the stump plane.
        let obs: Vec<Observation> = (0..30)
            .map(|i| {
                detection(
                    i,
                    480.0 + 6.5 * f64::from(i),
                    100.0 + 12.0 * f64::from(i),
                )
            })
            .collect();
        let pipeline = Pipeline::new(planar_config()).unwrap();
        let analysis = pipeline.run(&obs).unwrap();
        assert_eq!(analysis.decision.verdict, Verdict::Missing);
    }

    #[test]
    fn zero_detections_fails_before_downstream_stages() {
        let obs: Vec<Observation> = (0..20)
            .map(|i| Observation {
                frame: FrameIndex(i),
                timestamp: None,
                position_px: None,
                radius_px: None,
                depth_m: None,
                confidence: 0.0,
                detected: false,
            })
            .collect();
        let pipeline = Pipeline::new(planar_config()).unwrap();
        let err = pipeline.run(&obs).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }

    #[test]
    fn duplicate_frame_is_malformed() {
        let mut obs = straight_delivery(10, 480.0);
        obs[5].frame = obs[4].frame;
        let pipeline = Pipeline::new(planar_config()).unwrap();
        let err = pipeline.run(&obs).unwrap_err();
        match err {
            PipelineError::MalformedInput { frame, .. } => assert_eq!(frame, 4),
            other => panic!("expected MalformedInput, got {other:?}"),
        }
    }

    #[test]
    fn detected_without_position_is_malformed() {
        let mut obs = straight_delivery(10, 480.0);
        obs[3].position_px = None;
        let pipeline = Pipeline::new(planar_config()).unwrap();
        assert!(matches!(
            pipeline.run(&obs).unwrap_err(),
            PipelineError::MalformedInput { .. }
        ));
    }

    #[test]
    fn unknown_config_key_is_rejected() {
        let err = PipelineConfig::from_json_str(r#"{"frame_rate": 30.0, "wind": 5.0}"#)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn bad_frame_rate_fails_fast() {
        let config = PipelineConfig {
            frame_rate: 0.0,
            ..planar_config()
        };
        assert!(matches!(
            Pipeline::new(config).unwrap_err(),
            PipelineError::Configuration { .. }
        ));
    }

    #[test]
    fn timings_are_populated() {
        let pipeline = Pipeline::new(planar_config()).unwrap();
        let analysis = pipeline.run(&straight_delivery(30, 480.0)).unwrap();
        assert!(analysis.timings.total_us >= analysis.timings.smooth_us);
    }
}
