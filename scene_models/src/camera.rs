//! Camera and pitch-scene parameters.
//!
//! World frame convention (shared with `trajectory_core`):
//! - x: along the pitch, stump plane at x = 0, bowler's end positive
//! - y: lateral, positive to the leg side of a right-hander
//! - z: height above the pitch surface

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating scene/camera configuration.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("camera parameter `{name}` must be finite and positive (got {value})")]
    NonPositive { name: &'static str, value: f64 },
    #[error("camera parameter `{name}` must be finite (got {value})")]
    NonFinite { name: &'static str, value: f64 },
    #[error("scene parameter `{name}` must be finite and non-negative (got {value})")]
    Negative { name: &'static str, value: f64 },
    #[error("image dimensions must be non-zero (got {width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Physical configuration of the broadcast camera (pinhole model).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CameraParams {
    /// Camera position (x, y, z) in world coordinates (meters)
    pub position: [f64; 3],
    /// Yaw about the world z axis (radians); 0 = optical axis toward the stumps (-x)
    pub yaw: f64,
    /// Downward tilt of the optical axis (radians)
    pub pitch: f64,
    /// Focal length in pixels
    pub focal_px: f64,
    /// Sensor resolution (pixels)
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            position: [30.0, 0.0, 2.5], // behind the bowler's arm, sight-screen height
            yaw: 0.0,
            pitch: 0.04, // slight downward tilt (~2.3°)
            focal_px: 1400.0,
            image_width: 960,
            image_height: 540,
        }
    }
}

impl CameraParams {
    /// Check all parameters are usable. Called once before any frame is processed.
    pub fn validate(&self) -> Result<(), SceneError> {
        for (name, value) in [
            ("position.x", self.position[0]),
            ("position.y", self.position[1]),
            ("position.z", self.position[2]),
            ("yaw", self.yaw),
            ("pitch", self.pitch),
        ] {
            if !value.is_finite() {
                return Err(SceneError::NonFinite { name, value });
            }
        }
        if !self.focal_px.is_finite() || self.focal_px <= 0.0 {
            return Err(SceneError::NonPositive {
                name: "focal_px",
                value: self.focal_px,
            });
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(SceneError::EmptyImage {
                width: self.image_width,
                height: self.image_height,
            });
        }
        Ok(())
    }

    /// Principal point (image center).
    pub fn principal_point(&self) -> [f64; 2] {
        [
            f64::from(self.image_width) / 2.0,
            f64::from(self.image_height) / 2.0,
        ]
    }
}

/// Fixed pitch/ball geometry and the monocular height-profile anchors.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SceneGeometry {
    /// Pitch length, stump plane to the opposite popping crease region (meters)
    pub pitch_length_m: f64,
    /// Physical ball radius (meters)
    pub ball_radius_m: f64,
    /// Assumed release height of the delivery (meters)
    pub release_height_m: f64,
    /// Assumed height near the end of the observed track (meters)
    pub impact_height_hint_m: f64,
}

impl Default for SceneGeometry {
    fn default() -> Self {
        Self {
            pitch_length_m: 20.12,
            ball_radius_m: 0.036,
            release_height_m: 1.6,
            impact_height_hint_m: 0.2,
        }
    }
}

impl SceneGeometry {
    pub fn validate(&self) -> Result<(), SceneError> {
        for (name, value) in [
            ("pitch_length_m", self.pitch_length_m),
            ("ball_radius_m", self.ball_radius_m),
            ("release_height_m", self.release_height_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SceneError::NonPositive { name, value });
            }
        }
        if !self.impact_height_hint_m.is_finite() || self.impact_height_hint_m < 0.0 {
            return Err(SceneError::Negative {
                name: "impact_height_hint_m",
                value: self.impact_height_hint_m,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_validates() {
        assert!(CameraParams::default().validate().is_ok());
        assert!(SceneGeometry::default().validate().is_ok());
    }

    #[test]
    fn zero_focal_rejected() {
        let cam = CameraParams {
            focal_px: 0.0,
            ..Default::default()
        };
        assert!(cam.validate().is_err());
    }

    #[test]
    fn empty_image_rejected() {
        let cam = CameraParams {
            image_width: 0,
            ..Default::default()
        };
        assert!(cam.validate().is_err());
    }
}
