//! Decision engine: intersect the predicted trajectory with the wicket.
//!
//! # Verdict policy
//! The signed clearance `d` of the ball's cross-section to the target volume
//! edge decides the verdict: `d ≤ −tolerance` → Hitting (strictly inside),
//! `d ≥ tolerance` → Missing (strictly outside), otherwise Marginal — the
//! "umpire's call" band where an on-field decision is not overturned. The
//! tolerance is a named configuration constant.
//!
//! This stage is a pure function of its inputs: identical trajectory and
//! target always yield an identical decision.

use crate::error::{PipelineError, Stage};
use crate::physics::TrajectorySegment;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Target volume
// ---------------------------------------------------------------------------

/// Wicket geometry as an equivalent bounding box in the world frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TargetVolume {
    /// Forward coordinate of the stump-line plane (m).
    pub plane_x_m: f64,
    /// Lateral center of the wicket (m).
    pub center_y_m: f64,
    /// Half the wicket width (m). Default: 22.86 cm full width.
    pub half_width_m: f64,
    /// Top of the stumps (m).
    pub top_height_m: f64,
}

impl Default for TargetVolume {
    fn default() -> Self {
        Self {
            plane_x_m: 0.0,
            center_y_m: 0.0,
            half_width_m: 0.1143,
            top_height_m: 0.711,
        }
    }
}

impl TargetVolume {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("half_width_m", self.half_width_m),
            ("top_height_m", self.top_height_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PipelineError::Configuration {
                    reason: format!("target.{name} must be finite and positive (got {value})"),
                });
            }
        }
        if !self.plane_x_m.is_finite() || !self.center_y_m.is_finite() {
            return Err(PipelineError::Configuration {
                reason: "target plane/center coordinates must be finite".into(),
            });
        }
        Ok(())
    }
}

/// Configuration for the decision engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DecisionConfig {
    pub target: TargetVolume,
    /// Half-width of the umpire's-call band around the volume edge (m).
    /// Default: one ball radius.
    pub margin_tolerance_m: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            target: TargetVolume::default(),
            margin_tolerance_m: 0.036,
        }
    }
}

impl DecisionConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.target.validate()?;
        if !self.margin_tolerance_m.is_finite() || self.margin_tolerance_m < 0.0 {
            return Err(PipelineError::Configuration {
                reason: format!(
                    "decision.margin_tolerance_m must be finite and non-negative (got {})",
                    self.margin_tolerance_m
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Three-state verdict. Marginal models the umpire's-call convention instead
/// of forcing a lossy boolean on borderline cases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Hitting,
    Missing,
    Marginal,
}

/// Terminal artifact of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    /// Ball-center position where the trajectory crosses the stump plane.
    pub impact_point: Vector3<f64>,
    /// Height of the impact point (reported even for Missing — useful for
    /// height-based LBW rules).
    pub impact_height: f64,
    /// Signed clearance to the target-volume edge (m): negative = inside.
    pub margin: f64,
}

/// Evaluate the trajectory against the target volume.
///
/// `ball_radius` expands the effective cross-section: any part of the ball
/// touching the volume counts, not just its center.
pub fn evaluate(
    segment: &TrajectorySegment,
    config: &DecisionConfig,
    ball_radius: f64,
) -> Result<Decision, PipelineError> {
    let target = &config.target;
    let t_impact = segment.time_at_plane(target.plane_x_m).ok_or_else(|| {
        PipelineError::ImplausibleTrajectory {
            stage: Stage::Decision,
            reason: "trajectory does not cross the stump plane".into(),
        }
    })?;

    let impact_point = segment.position_at(t_impact);

    // Signed clearances: negative = the ball overlaps that extent.
    let lateral = (impact_point.y - target.center_y_m).abs() - (target.half_width_m + ball_radius);
    let vertical = (impact_point.z - ball_radius) - target.top_height_m;
    let margin = lateral.max(vertical);

    let verdict = if margin <= -config.margin_tolerance_m {
        Verdict::Hitting
    } else if margin >= config.margin_tolerance_m {
        Verdict::Missing
    } else {
        Verdict::Marginal
    };

    Ok(Decision {
        verdict,
        impact_point,
        impact_height: impact_point.z,
        margin,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::PhysicsArc;
    use approx::assert_abs_diff_eq;

    const BALL_RADIUS: f64 = 0.036;

    /// A single flat arc aimed at the plane with the given lateral offset and
    /// height at impact.
    fn flat_segment(lateral_at_plane: f64, height_at_plane: f64) -> TrajectorySegment {
        // Launch height pre-compensates the gravity drop so the arc crosses
        // the plane at exactly `height_at_plane`.
        let t_plane = 10.0 / 25.0;
        let drop = 0.5 * 9.81 * t_plane * t_plane;
        let arc = PhysicsArc {
            t_start: 0.0,
            t_end: t_plane + 0.02,
            p0: Vector3::new(10.0, lateral_at_plane, height_at_plane + drop),
            v0: Vector3::new(-25.0, 0.0, 0.0),
            gravity: 9.81,
            drag_k: 0.0,
        };
        TrajectorySegment {
            arcs: vec![arc],
            bounces: vec![],
        }
    }

    #[test]
    fn straight_delivery_at_center_is_hitting() {
        let segment = flat_segment(0.0, 0.3);
        let decision = evaluate(&segment, &DecisionConfig::default(), BALL_RADIUS).unwrap();
        assert_eq!(decision.verdict, Verdict::Hitting);
        assert_abs_diff_eq!(decision.impact_point.y, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(decision.impact_height, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn half_meter_wide_is_missing() {
        let segment = flat_segment(0.5, 0.3);
        let decision = evaluate(&segment, &DecisionConfig::default(), BALL_RADIUS).unwrap();
        assert_eq!(decision.verdict, Verdict::Missing);
        // Impact height is still reported for a miss.
        assert_abs_diff_eq!(decision.impact_height, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn over_the_top_is_missing_with_height() {
        let segment = flat_segment(0.0, 1.2);
        let decision = evaluate(&segment, &DecisionConfig::default(), BALL_RADIUS).unwrap();
        assert_eq!(decision.verdict, Verdict::Missing);
        assert_abs_diff_eq!(decision.impact_height, 1.2, epsilon = 1e-9);
    }

    #[test]
    fn edge_clip_is_marginal() {
        // Ball center just past the expanded edge, inside the tolerance band.
        let edge = 0.1143 + BALL_RADIUS;
        let segment = flat_segment(edge + 0.01, 0.3);
        let decision = evaluate(&segment, &DecisionConfig::default(), BALL_RADIUS).unwrap();
        assert_eq!(decision.verdict, Verdict::Marginal);
    }

    #[test]
    fn verdict_is_monotonic_in_lateral_offset() {
        let config = DecisionConfig::default();
        let mut transitions = Vec::new();
        let mut prev = None;
        for i in 0..200 {
            let offset = f64::from(i) * 0.005;
            let decision = evaluate(&flat_segment(offset, 0.3), &config, BALL_RADIUS).unwrap();
            if prev != Some(decision.verdict) {
                transitions.push(decision.verdict);
                prev = Some(decision.verdict);
            }
        }
        assert_eq!(
            transitions,
            vec![Verdict::Hitting, Verdict::Marginal, Verdict::Missing],
            "verdict must transition Hitting → Marginal → Missing exactly once"
        );
    }

    #[test]
    fn margin_is_signed_clearance() {
        let config = DecisionConfig::default();
        let inside = evaluate(&flat_segment(0.0, 0.3), &config, BALL_RADIUS).unwrap();
        assert!(inside.margin < 0.0);
        let outside = evaluate(&flat_segment(0.5, 0.3), &config, BALL_RADIUS).unwrap();
        assert!(outside.margin > 0.0);
        assert_abs_diff_eq!(
            outside.margin,
            0.5 - (0.1143 + BALL_RADIUS),
            epsilon = 1e-9
        );
    }

    #[test]
    fn identical_inputs_identical_decision() {
        let segment = flat_segment(0.08, 0.4);
        let config = DecisionConfig::default();
        let a = evaluate(&segment, &config, BALL_RADIUS).unwrap();
        let b = evaluate(&segment, &config, BALL_RADIUS).unwrap();
        assert_eq!(a, b);
    }
}
