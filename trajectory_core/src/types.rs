//! Fundamental types used across the analysis pipeline.

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: f64 throughout for numerical precision in the Kalman filter.
// ---------------------------------------------------------------------------

/// 4-DOF smoother state vector: [px, py, vx, vy] (image space, pixels)
pub type SmootherState = Vector4<f64>;

/// 4×4 smoother covariance matrix
pub type SmootherCov = Matrix4<f64>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// Video frame index. Newtype so frame numbers are never confused with counts.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct FrameIndex(pub u32);

impl fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "F{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Observation — one record per tracked frame, produced by the detector
// ---------------------------------------------------------------------------

/// A single per-frame detection record from the external detector.
///
/// Immutable once produced. `position_px` is `None` when the detector lost the
/// ball that frame; `radius_px` (apparent enclosing-circle radius) and
/// `depth_m` (depth-augmented detectors) are optional extras used by the
/// reconstructor.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Observation {
    /// Frame index, strictly increasing across the sequence (gaps allowed)
    pub frame: FrameIndex,
    /// Capture time in seconds; derived from `frame / frame_rate` when absent
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// Image-plane position (u right, v down, pixels)
    #[serde(default)]
    pub position_px: Option<[f64; 2]>,
    /// Apparent ball radius in pixels, if the detector tracked it
    #[serde(default)]
    pub radius_px: Option<f64>,
    /// Depth along the optical axis in meters, if the detector measured it
    #[serde(default)]
    pub depth_m: Option<f64>,
    /// Detection confidence in [0, 1]
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Whether the detector considers this frame a valid detection
    pub detected: bool,
}

fn default_confidence() -> f64 {
    1.0
}

impl Observation {
    /// Image position as a vector, if present.
    pub fn position(&self) -> Option<Vector2<f64>> {
        self.position_px.map(|p| Vector2::new(p[0], p[1]))
    }
}

// ---------------------------------------------------------------------------
// FilteredState — smoother output, one per frame in the observed range
// ---------------------------------------------------------------------------

/// Smoothed image-plane state for one frame. Never mutated after creation.
#[derive(Clone, Debug)]
pub struct FilteredState {
    pub frame: FrameIndex,
    /// Seconds
    pub timestamp: f64,
    /// Smoothed image position (pixels)
    pub position_px: Vector2<f64>,
    /// Smoothed image velocity (pixels/second)
    pub velocity_px: Vector2<f64>,
    /// Posterior state covariance (symmetric positive semi-definite)
    pub cov: SmootherCov,
    /// True when an observation was fused this frame (false = predicted only)
    pub observed: bool,
    /// Detector extras carried through for the reconstructor
    pub radius_px: Option<f64>,
    pub depth_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// WorldState — reconstructed 3D state
// ---------------------------------------------------------------------------

/// World-frame ball state for one frame.
///
/// Frame convention: x along the pitch (stump plane at x = 0, bowler's end
/// positive), y lateral, z height above the pitch surface. Meters, seconds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorldState {
    pub timestamp: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_accepts_missing_optionals() {
        let json = r#"{"frame": 3, "detected": false}"#;
        let obs: Observation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.frame, FrameIndex(3));
        assert!(obs.position_px.is_none());
        assert_eq!(obs.confidence, 1.0);
    }

    #[test]
    fn observation_rejects_unknown_fields() {
        let json = r#"{"frame": 0, "detected": true, "position_px": [1.0, 2.0], "blur": 0.5}"#;
        assert!(serde_json::from_str::<Observation>(json).is_err());
    }

    #[test]
    fn frame_index_displays_compactly() {
        assert_eq!(FrameIndex(17).to_string(), "F17");
    }
}
