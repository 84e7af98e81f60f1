//! 3D reconstruction: smoothed image-plane track → world-frame trajectory.
//!
//! # Depth disambiguation (monocular path)
//! A single camera cannot measure depth directly, so the reconstructor anchors
//! each frame on an assumed ball height: a linear profile from the configured
//! release height down to the configured near-impact height across the
//! observed range. When the detector supplies an optical-axis depth (stereo /
//! depth-augmented) or an apparent ball radius (size → depth through the
//! focal length), those take precedence frame by frame.
//!
//! Output velocity is a finite difference of consecutive positions over their
//! timestamp delta — central differences in the interior, one-sided at the
//! ends — keeping reconstruction decoupled from the smoother's internal
//! velocity parameterization.

use crate::error::{PipelineError, Stage};
use crate::types::{FilteredState, WorldState};
use nalgebra::Vector3;
use scene_models::{Projection, ProjectionConfig, ProjectionModel, SceneGeometry};
use serde::{Deserialize, Serialize};

/// Velocity-consistency gate: positions whose finite-difference speed exceeds
/// this multiple of the window median are treated as back-projection outliers
/// and re-interpolated from their neighbors.
const MAX_SPEED_RATIO: f64 = 4.0;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Camera/scene configuration consumed by the reconstructor.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SceneConfig {
    pub projection: ProjectionConfig,
    pub geometry: SceneGeometry,
}

impl SceneConfig {
    /// Validate all scene parameters and build the projection model.
    /// This is the fail-fast entry point: it runs before any frame is
    /// processed.
    pub fn build_projection(&self) -> Result<Projection, PipelineError> {
        self.geometry.validate()?;
        Ok(self.projection.build()?)
    }
}

// ---------------------------------------------------------------------------
// Reconstructor
// ---------------------------------------------------------------------------

/// Converts a smoothed image track into world-frame states.
#[derive(Debug)]
pub struct Reconstructor {
    geometry: SceneGeometry,
    projection: Projection,
}

impl Reconstructor {
    pub fn new(config: &SceneConfig) -> Result<Self, PipelineError> {
        let projection = config.build_projection()?;
        Ok(Self {
            geometry: config.geometry.clone(),
            projection,
        })
    }

    /// Produce one [`WorldState`] per input frame.
    pub fn reconstruct(&self, track: &[FilteredState]) -> Result<Vec<WorldState>, PipelineError> {
        if track.is_empty() {
            return Err(PipelineError::InsufficientData {
                stage: Stage::Reconstructor,
                reason: "empty filtered track".into(),
            });
        }

        let mut positions: Vec<Vector3<f64>> = Vec::with_capacity(track.len());
        for (i, fs) in track.iter().enumerate() {
            let pixel = [fs.position_px.x, fs.position_px.y];
            let world = self
                .depth_resolved(fs, pixel)
                .unwrap_or_else(|| {
                    self.projection
                        .back_project_at_height(pixel, self.profile_height(i, track.len()))
                });
            // The ball cannot be below the pitch surface.
            positions.push(Vector3::new(world.x, world.y, world.z.max(0.0)));
        }

        self.suppress_outliers(track, &mut positions);

        let velocities = finite_difference(track, &positions);
        Ok(track
            .iter()
            .zip(positions)
            .zip(velocities)
            .map(|((fs, position), velocity)| WorldState {
                timestamp: fs.timestamp,
                position,
                velocity,
            })
            .collect())
    }

    /// Direct depth path: detector-measured depth, or apparent-radius depth.
    /// `None` when neither is available or the model has no metric axis.
    fn depth_resolved(&self, fs: &FilteredState, pixel: [f64; 2]) -> Option<Vector3<f64>> {
        let depth = fs.depth_m.or_else(|| {
            fs.radius_px.and_then(|r| {
                self.projection
                    .depth_from_radius(r, self.geometry.ball_radius_m)
            })
        })?;
        self.projection.back_project_at_depth(pixel, depth)
    }

    /// Assumed ball height for frame `i` of `n`: linear release → near-impact.
    fn profile_height(&self, i: usize, n: usize) -> f64 {
        let z0 = self.geometry.release_height_m;
        let z1 = self.geometry.impact_height_hint_m;
        if n <= 1 {
            return z0;
        }
        let f = i as f64 / (n - 1) as f64;
        z0 + (z1 - z0) * f
    }

    /// Light look-ahead consistency pass: re-interpolate interior positions
    /// whose instantaneous speed is far off the median. Not a joint
    /// optimization — one sweep is enough for isolated back-projection
    /// failures (horizon-adjacent pixels, spurious depth readings).
    fn suppress_outliers(&self, track: &[FilteredState], positions: &mut [Vector3<f64>]) {
        if positions.len() < 3 {
            return;
        }
        let mut speeds: Vec<f64> = Vec::with_capacity(positions.len() - 1);
        for i in 1..positions.len() {
            let dt = (track[i].timestamp - track[i - 1].timestamp).max(1e-9);
            speeds.push((positions[i] - positions[i - 1]).norm() / dt);
        }
        let mut sorted = speeds.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = sorted[sorted.len() / 2];
        if median <= 0.0 {
            return;
        }

        for i in 1..positions.len() - 1 {
            let in_speed = speeds[i - 1];
            let out_speed = speeds[i];
            if in_speed > MAX_SPEED_RATIO * median && out_speed > MAX_SPEED_RATIO * median {
                positions[i] = (positions[i - 1] + positions[i + 1]) / 2.0;
            }
        }
    }
}

/// Finite differences: central in the interior, one-sided at the ends.
/// A single-state track gets zero velocity.
fn finite_difference(track: &[FilteredState], positions: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    let n = positions.len();
    if n < 2 {
        return vec![Vector3::zeros(); n];
    }
    (0..n)
        .map(|i| {
            let (lo, hi) = match i {
                0 => (0, 1),
                i if i == n - 1 => (n - 2, n - 1),
                i => (i - 1, i + 1),
            };
            let dt = (track[hi].timestamp - track[lo].timestamp).max(1e-9);
            (positions[hi] - positions[lo]) / dt
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrameIndex, SmootherCov};
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector2;
    use scene_models::{CameraParams, PlanarScaleParams, Pinhole};

    fn state(frame: u32, u: f64, v: f64) -> FilteredState {
        FilteredState {
            frame: FrameIndex(frame),
            timestamp: f64::from(frame) / 30.0,
            position_px: Vector2::new(u, v),
            velocity_px: Vector2::zeros(),
            cov: SmootherCov::identity(),
            observed: true,
            radius_px: None,
            depth_m: None,
        }
    }

    fn planar_scene() -> SceneConfig {
        SceneConfig {
            projection: ProjectionConfig::PlanarScale(PlanarScaleParams::default()),
            geometry: SceneGeometry::default(),
        }
    }

    #[test]
    fn straight_pixel_track_gives_constant_world_velocity() {
        // Ball moving down the frame (toward the stumps) at constant rate.
        let track: Vec<FilteredState> =
            (0..30).map(|i| state(i, 480.0, 100.0 + 10.0 * f64::from(i))).collect();
        let rec = Reconstructor::new(&planar_scene()).unwrap();
        let world = rec.reconstruct(&track).unwrap();

        assert_eq!(world.len(), 30);
        // 10 px/frame over 540 rows of 20.12 m → constant forward speed.
        let expected_vx = -10.0 * 30.0 / 540.0 * 20.12;
        for w in &world[1..world.len() - 1] {
            assert_abs_diff_eq!(w.velocity.x, expected_vx, epsilon = 0.2);
            assert_abs_diff_eq!(w.velocity.y, 0.0, epsilon = 1e-6);
        }
        // Forward coordinate decreases toward the stump plane.
        assert!(world.last().unwrap().position.x < world[0].position.x);
    }

    #[test]
    fn height_profile_descends_from_release() {
        let track: Vec<FilteredState> = (0..10).map(|i| state(i, 480.0, 300.0)).collect();
        let rec = Reconstructor::new(&planar_scene()).unwrap();
        let world = rec.reconstruct(&track).unwrap();
        assert_abs_diff_eq!(world[0].position.z, 1.6, epsilon = 1e-9);
        assert_abs_diff_eq!(world[9].position.z, 0.2, epsilon = 1e-9);
        for pair in world.windows(2) {
            assert!(pair[1].position.z < pair[0].position.z);
        }
    }

    #[test]
    fn measured_depth_takes_precedence() {
        let cam = CameraParams::default();
        let pinhole = Pinhole::new(&cam).unwrap();
        let truth = Vector3::new(10.0, 0.3, 1.0);
        let px = pinhole.project(&truth);
        // Optical-axis depth of the truth point.
        let cam_pos = Vector3::new(30.0, 0.0, 2.5);
        let depth = {
            // recover via the model itself: depth where back-projection matches
            let mut lo = 1.0;
            let mut hi = 40.0;
            for _ in 0..64 {
                let mid = 0.5 * (lo + hi);
                let p = pinhole.back_project_at_depth(px, mid).unwrap();
                if (p - cam_pos).norm() < (truth - cam_pos).norm() {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            0.5 * (lo + hi)
        };

        let mut fs = state(0, px[0], px[1]);
        fs.depth_m = Some(depth);
        let config = SceneConfig {
            projection: ProjectionConfig::Pinhole(cam),
            geometry: SceneGeometry::default(),
        };
        let rec = Reconstructor::new(&config).unwrap();
        let world = rec.reconstruct(&[fs]).unwrap();
        assert_abs_diff_eq!(world[0].position.x, truth.x, epsilon = 1e-3);
        assert_abs_diff_eq!(world[0].position.y, truth.y, epsilon = 1e-3);
        assert_abs_diff_eq!(world[0].position.z, truth.z, epsilon = 1e-3);
    }

    #[test]
    fn ball_never_below_pitch() {
        let config = SceneConfig {
            projection: ProjectionConfig::PlanarScale(PlanarScaleParams::default()),
            geometry: SceneGeometry {
                impact_height_hint_m: 0.0,
                ..Default::default()
            },
        };
        let track: Vec<FilteredState> = (0..5).map(|i| state(i, 480.0, 500.0)).collect();
        let rec = Reconstructor::new(&config).unwrap();
        let world = rec.reconstruct(&track).unwrap();
        assert!(world.iter().all(|w| w.position.z >= 0.0));
    }

    #[test]
    fn isolated_outlier_is_reinterpolated() {
        let mut track: Vec<FilteredState> =
            (0..20).map(|i| state(i, 480.0, 100.0 + 10.0 * f64::from(i))).collect();
        // One wild smoothed pixel (e.g. a horizon-adjacent back-projection).
        track[10].position_px = Vector2::new(480.0, 20.0);
        let rec = Reconstructor::new(&planar_scene()).unwrap();
        let world = rec.reconstruct(&track).unwrap();

        let expected_x = (world[9].position.x + world[11].position.x) / 2.0;
        assert_abs_diff_eq!(world[10].position.x, expected_x, epsilon = 1e-9);
    }

    #[test]
    fn single_state_has_zero_velocity() {
        let rec = Reconstructor::new(&planar_scene()).unwrap();
        let world = rec.reconstruct(&[state(0, 480.0, 300.0)]).unwrap();
        assert_eq!(world[0].velocity, Vector3::zeros());
    }

    #[test]
    fn empty_track_is_insufficient_data() {
        let rec = Reconstructor::new(&planar_scene()).unwrap();
        let err = rec.reconstruct(&[]).unwrap_err();
        assert!(matches!(err, PipelineError::InsufficientData { .. }));
    }
}
