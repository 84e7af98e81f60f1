//! Recursive smoother: constant-velocity Kalman filter over image detections.
//!
//! # Design choices
//! - Linear KF with a constant-velocity (CV) motion model; the detector's
//!   image-plane track is smooth enough that acceleration lives in the
//!   process noise.
//! - All math is done in `f64` via `nalgebra` for numerical stability.
//! - Covariance updates use the **Joseph form** so P stays symmetric positive
//!   semi-definite under floating-point accumulation. This is a correctness
//!   requirement, not an optimization.
//!
//! ## State vector
//! x = [px, py, vx, vy]ᵀ  (image space: pixels, pixels/second)
//!
//! ## CV transition model
//! F = I₄ + dt * [[0₂ I₂]; [0₂ 0₂]]
//!
//! ## Process noise Q (discrete white-noise acceleration)
//! Q_pos = q·dt⁴/4,  Q_pos_vel = q·dt³/2,  Q_vel = q·dt² per axis

use crate::error::{PipelineError, Stage};
use crate::types::{FilteredState, Observation, SmootherCov, SmootherState};
use nalgebra::{Matrix2, Matrix2x4, Matrix4, Vector2, Vector4};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the CV smoother.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SmootherConfig {
    /// Process noise acceleration std dev (pixels/s²).
    /// Higher = filter trusts new observations more.
    pub process_noise_std: f64,
    /// Measurement noise std dev (pixels).
    pub measurement_noise_std: f64,
    /// Initial position uncertainty (1σ, pixels).
    pub init_pos_std: f64,
    /// Initial velocity uncertainty (1σ, pixels/s).
    pub init_vel_std: f64,
    /// Detections below this confidence are treated as missed.
    pub confidence_threshold: f64,
    /// Consecutive frames without a usable detection before the track is
    /// declared lost (rather than extrapolating indefinitely).
    pub max_gap_frames: u32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            process_noise_std: 150.0, // allows modest swing/seam deviation
            measurement_noise_std: 7.0,
            init_pos_std: 22.0,
            init_vel_std: 300.0,
            confidence_threshold: 0.25,
            max_gap_frames: 12, // 0.4 s at 30 fps
        }
    }
}

impl SmootherConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("process_noise_std", self.process_noise_std),
            ("measurement_noise_std", self.measurement_noise_std),
            ("init_pos_std", self.init_pos_std),
            ("init_vel_std", self.init_vel_std),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PipelineError::Configuration {
                    reason: format!("smoother.{name} must be finite and positive (got {value})"),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PipelineError::Configuration {
                reason: format!(
                    "smoother.confidence_threshold must be in [0, 1] (got {})",
                    self.confidence_threshold
                ),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Result of a KF update step.
#[derive(Clone, Debug)]
pub struct SmootherUpdate {
    pub state: SmootherState,
    pub cov: SmootherCov,
    /// Innovation ν = z − H·x
    pub innovation: Vector2<f64>,
    /// Innovation covariance S = H·P·Hᵀ + R
    pub innovation_cov: Matrix2<f64>,
}

/// Constant-velocity Kalman smoother (4-state, linear).
#[derive(Clone, Debug)]
pub struct CvSmoother {
    pub config: SmootherConfig,
}

impl CvSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self { config }
    }

    /// Build state transition matrix F for timestep dt.
    pub fn transition_matrix(dt: f64) -> Matrix4<f64> {
        let mut f = Matrix4::<f64>::identity();
        // position += velocity * dt
        f[(0, 2)] = dt;
        f[(1, 3)] = dt;
        f
    }

    /// Build process noise matrix Q for timestep dt (DWNA model).
    fn process_noise(dt: f64, q_std: f64) -> Matrix4<f64> {
        let q = q_std * q_std; // variance
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;

        let mut qm = Matrix4::<f64>::zeros();
        for i in 0..2usize {
            qm[(i, i)] = q * dt4 / 4.0;
            qm[(i + 2, i + 2)] = q * dt2;
            qm[(i, i + 2)] = q * dt3 / 2.0;
            qm[(i + 2, i)] = q * dt3 / 2.0;
        }
        qm
    }

    /// 2×4 observation matrix: we observe image position only.
    fn observation_matrix() -> Matrix2x4<f64> {
        Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0,
        )
    }

    /// Predict state and covariance forward by `dt` seconds.
    pub fn predict(&self, state: &SmootherState, cov: &SmootherCov, dt: f64) -> (SmootherState, SmootherCov) {
        let f = Self::transition_matrix(dt);
        let q = Self::process_noise(dt, self.config.process_noise_std);
        let predicted_state = f * state;
        let predicted_cov = f * cov * f.transpose() + q;
        (predicted_state, predicted_cov)
    }

    /// Fuse an observed image position into the predicted state.
    pub fn update(
        &self,
        state: &SmootherState,
        cov: &SmootherCov,
        z: &Vector2<f64>,
    ) -> SmootherUpdate {
        let h = Self::observation_matrix();
        let r_var = self.config.measurement_noise_std * self.config.measurement_noise_std;
        let r = Matrix2::identity() * r_var;

        // Innovation: ν = z − H·x
        let innovation = z - h * state;

        // Innovation covariance: S = H·P·Hᵀ + R
        let s = h * cov * h.transpose() + r;

        // Kalman gain: K = P·Hᵀ·S⁻¹
        let s_inv = s
            .try_inverse()
            .expect("innovation covariance is invertible for positive measurement noise");
        let k = cov * h.transpose() * s_inv;

        // Updated state: x' = x + K·ν
        let new_state = state + k * innovation;

        // Updated covariance: Joseph form P' = (I−KH)·P·(I−KH)ᵀ + K·R·Kᵀ
        let i_kh = Matrix4::identity() - k * h;
        let new_cov = i_kh * cov * i_kh.transpose() + k * r * k.transpose();

        SmootherUpdate {
            state: new_state,
            cov: new_cov,
            innovation,
            innovation_cov: s,
        }
    }

    /// Run the filter over an ordered observation sequence.
    ///
    /// Produces one [`FilteredState`] per frame index from the first usable
    /// detection to the last input frame, synthesizing predicted-only states
    /// for frames that are missing, undetected, or below the confidence
    /// threshold.
    pub fn smooth(
        &self,
        observations: &[Observation],
        frame_rate: f64,
    ) -> Result<Vec<FilteredState>, PipelineError> {
        let usable = |obs: &Observation| {
            obs.detected
                && obs.position_px.is_some()
                && obs.confidence >= self.config.confidence_threshold
        };

        let Some(first_idx) = observations.iter().position(usable) else {
            return Err(PipelineError::InsufficientData {
                stage: Stage::Smoother,
                reason: "no detected observations above the confidence threshold".into(),
            });
        };

        let first = &observations[first_idx];
        let z0 = first.position().expect("usable observation has a position");
        let mut state: SmootherState = Vector4::new(z0.x, z0.y, 0.0, 0.0);
        let ps = self.config.init_pos_std * self.config.init_pos_std;
        let vs = self.config.init_vel_std * self.config.init_vel_std;
        let mut cov = SmootherCov::from_diagonal(&Vector4::new(ps, ps, vs, vs));

        let first_frame = first.frame.0;
        let last_frame = observations
            .last()
            .expect("non-empty: a usable observation exists")
            .frame
            .0;

        let mut out = Vec::with_capacity((last_frame - first_frame + 1) as usize);
        let mut prev_time = first
            .timestamp
            .unwrap_or(f64::from(first_frame) / frame_rate);
        out.push(FilteredState {
            frame: first.frame,
            timestamp: prev_time,
            position_px: z0,
            velocity_px: Vector2::zeros(),
            cov,
            observed: true,
            radius_px: first.radius_px,
            depth_m: first.depth_m,
        });

        let mut gap: u32 = 0;
        let mut last_observed_frame = first_frame;
        // Cursor into the record list; frames without a record are synthesized
        // as undetected (the detector dropped them entirely).
        let mut rec_idx = first_idx + 1;

        for frame in (first_frame + 1)..=last_frame {
            let record = match observations.get(rec_idx) {
                Some(obs) if obs.frame.0 == frame => {
                    rec_idx += 1;
                    Some(obs)
                }
                _ => None,
            };

            // Frames without an embedded timestamp advance by one frame
            // interval from the previous state, so record lists that start at
            // a nonzero capture time stay consistent.
            let timestamp = record
                .and_then(|o| o.timestamp)
                .unwrap_or(prev_time + 1.0 / frame_rate);
            let dt = timestamp - prev_time;
            let (pred_state, pred_cov) = self.predict(&state, &cov, dt);
            state = pred_state;
            cov = pred_cov;

            let fused = match record {
                Some(obs) if usable(obs) => {
                    let z = obs.position().expect("usable observation has a position");
                    let res = self.update(&state, &cov, &z);
                    state = res.state;
                    cov = res.cov;
                    true
                }
                _ => false,
            };

            if fused {
                gap = 0;
                last_observed_frame = frame;
            } else {
                gap += 1;
                if gap > self.config.max_gap_frames {
                    return Err(PipelineError::TrackLost {
                        last_frame: last_observed_frame,
                        gap,
                        limit: self.config.max_gap_frames,
                    });
                }
            }

            out.push(FilteredState {
                frame: crate::types::FrameIndex(frame),
                timestamp,
                position_px: Vector2::new(state[0], state[1]),
                velocity_px: Vector2::new(state[2], state[3]),
                cov,
                observed: fused,
                radius_px: record.and_then(|o| o.radius_px),
                depth_m: record.and_then(|o| o.depth_m),
            });
            prev_time = timestamp;
        }

        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
