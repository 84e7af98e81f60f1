//! Projection models: image-plane ↔ world-frame conversion.
//!
//! # Models supported
//! - **PlanarScale**: linear image↔pitch mapping for a fixed broadcast framing
//!   (image columns span the lateral corridor, rows span the pitch length).
//! - **Pinhole**: full camera model with extrinsics; rays through a pixel are
//!   intersected with a horizontal plane at an assumed ball height, or scaled
//!   by a known optical-axis depth when the detector provides one.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::camera::{CameraParams, SceneError};

/// Trait for an image↔world projection model.
pub trait ProjectionModel {
    /// World point → image pixel (u right, v down).
    fn project(&self, world: &Vector3<f64>) -> [f64; 2];

    /// Image pixel + assumed height above the pitch → world point.
    /// Total by contract: callers validate geometry up front, and pixels at or
    /// above the horizon map to distant (finite) points that downstream
    /// plausibility checks reject.
    fn back_project_at_height(&self, pixel: [f64; 2], height: f64) -> Vector3<f64>;

    /// Image pixel + optical-axis depth → world point.
    /// `None` when the model carries no metric optical axis (PlanarScale).
    fn back_project_at_depth(&self, pixel: [f64; 2], depth: f64) -> Option<Vector3<f64>>;

    /// Depth estimate from the apparent ball radius in pixels.
    /// `None` when the model has no focal length (PlanarScale).
    fn depth_from_radius(&self, radius_px: f64, ball_radius_m: f64) -> Option<f64>;
}

/// Which projection model to build, straight from configuration.
/// Externally tagged: `{"planar_scale": {...}}` or `{"pinhole": {...}}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectionConfig {
    PlanarScale(PlanarScaleParams),
    Pinhole(CameraParams),
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self::PlanarScale(PlanarScaleParams::default())
    }
}

impl ProjectionConfig {
    /// Validate parameters and build the projection. Fail-fast entry point.
    pub fn build(&self) -> Result<Projection, SceneError> {
        match self {
            Self::PlanarScale(params) => Ok(Projection::PlanarScale(PlanarScale::new(params)?)),
            Self::Pinhole(params) => Ok(Projection::Pinhole(Pinhole::new(params)?)),
        }
    }
}

/// A built projection model (enum dispatch over the two implementations).
#[derive(Clone, Debug)]
pub enum Projection {
    PlanarScale(PlanarScale),
    Pinhole(Pinhole),
}

impl ProjectionModel for Projection {
    fn project(&self, world: &Vector3<f64>) -> [f64; 2] {
        match self {
            Self::PlanarScale(m) => m.project(world),
            Self::Pinhole(m) => m.project(world),
        }
    }

    fn back_project_at_height(&self, pixel: [f64; 2], height: f64) -> Vector3<f64> {
        match self {
            Self::PlanarScale(m) => m.back_project_at_height(pixel, height),
            Self::Pinhole(m) => m.back_project_at_height(pixel, height),
        }
    }

    fn back_project_at_depth(&self, pixel: [f64; 2], depth: f64) -> Option<Vector3<f64>> {
        match self {
            Self::PlanarScale(m) => m.back_project_at_depth(pixel, depth),
            Self::Pinhole(m) => m.back_project_at_depth(pixel, depth),
        }
    }

    fn depth_from_radius(&self, radius_px: f64, ball_radius_m: f64) -> Option<f64> {
        match self {
            Self::PlanarScale(m) => m.depth_from_radius(radius_px, ball_radius_m),
            Self::Pinhole(m) => m.depth_from_radius(radius_px, ball_radius_m),
        }
    }
}

// ---------------------------------------------------------------------------
// PlanarScale
// ---------------------------------------------------------------------------

/// Parameters of the linear image↔pitch map.
///
/// Image columns span `lateral_span_m` centered on the pitch line; rows span
/// `pitch_length_m` with the stump plane at the bottom edge of the frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PlanarScaleParams {
    pub image_width: u32,
    pub image_height: u32,
    pub pitch_length_m: f64,
    pub lateral_span_m: f64,
}

impl Default for PlanarScaleParams {
    fn default() -> Self {
        Self {
            image_width: 960,
            image_height: 540,
            pitch_length_m: 20.12,
            lateral_span_m: 3.0,
        }
    }
}

/// Linear planar projection (no perspective, no metric depth axis).
#[derive(Clone, Debug)]
pub struct PlanarScale {
    params: PlanarScaleParams,
}

impl PlanarScale {
    pub fn new(params: &PlanarScaleParams) -> Result<Self, SceneError> {
        if params.image_width == 0 || params.image_height == 0 {
            return Err(SceneError::EmptyImage {
                width: params.image_width,
                height: params.image_height,
            });
        }
        for (name, value) in [
            ("pitch_length_m", params.pitch_length_m),
            ("lateral_span_m", params.lateral_span_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SceneError::NonPositive { name, value });
            }
        }
        Ok(Self {
            params: params.clone(),
        })
    }
}

impl ProjectionModel for PlanarScale {
    fn project(&self, world: &Vector3<f64>) -> [f64; 2] {
        let p = &self.params;
        let half = p.lateral_span_m / 2.0;
        let u = (world.y + half) / p.lateral_span_m * f64::from(p.image_width);
        let v = (1.0 - world.x / p.pitch_length_m) * f64::from(p.image_height);
        [u, v]
    }

    fn back_project_at_height(&self, pixel: [f64; 2], height: f64) -> Vector3<f64> {
        let p = &self.params;
        let half = p.lateral_span_m / 2.0;
        let x = (1.0 - pixel[1] / f64::from(p.image_height)) * p.pitch_length_m;
        let y = pixel[0] / f64::from(p.image_width) * p.lateral_span_m - half;
        Vector3::new(x, y, height)
    }

    fn back_project_at_depth(&self, _pixel: [f64; 2], _depth: f64) -> Option<Vector3<f64>> {
        None
    }

    fn depth_from_radius(&self, _radius_px: f64, _ball_radius_m: f64) -> Option<f64> {
        None
    }
}

// ---------------------------------------------------------------------------
// Pinhole
// ---------------------------------------------------------------------------

/// Pinhole camera with precomputed camera→world rotation.
///
/// Camera frame: x right, y down, z along the optical axis. At yaw = pitch = 0
/// the optical axis points toward the stumps (-x world), image right is +y
/// world and image down is -z world.
#[derive(Clone, Debug)]
pub struct Pinhole {
    params: CameraParams,
    /// Columns are the camera axes expressed in world coordinates.
    rot: Matrix3<f64>,
    cx: f64,
    cy: f64,
}

impl Pinhole {
    pub fn new(params: &CameraParams) -> Result<Self, SceneError> {
        params.validate()?;

        // Base orientation: x_cam = +y, y_cam = -z, z_cam = -x (world).
        let base = Matrix3::from_columns(&[
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
            Vector3::new(-1.0, 0.0, 0.0),
        ]);

        // Downward tilt: rotate about x_cam so z_cam gains a y_cam (down) component.
        let (sp, cp) = params.pitch.sin_cos();
        let tilt = Matrix3::new(
            1.0, 0.0, 0.0, //
            0.0, cp, sp, //
            0.0, -sp, cp,
        );

        // Yaw about the world vertical.
        let (sy, cy_) = params.yaw.sin_cos();
        let yaw = Matrix3::new(
            cy_, -sy, 0.0, //
            sy, cy_, 0.0, //
            0.0, 0.0, 1.0,
        );

        let [cx, cy] = params.principal_point();
        Ok(Self {
            params: params.clone(),
            rot: yaw * base * tilt,
            cx,
            cy,
        })
    }

    fn position(&self) -> Vector3<f64> {
        Vector3::from_column_slice(&self.params.position)
    }
}

impl ProjectionModel for Pinhole {
    fn project(&self, world: &Vector3<f64>) -> [f64; 2] {
        let cam = self.rot.transpose() * (world - self.position());
        // Points behind the camera project to a guarded large offset rather
        // than dividing by ~0.
        let z = cam.z.max(1e-6);
        [
            self.cx + self.params.focal_px * cam.x / z,
            self.cy + self.params.focal_px * cam.y / z,
        ]
    }

    fn back_project_at_height(&self, pixel: [f64; 2], height: f64) -> Vector3<f64> {
        let dir_cam = Vector3::new(
            (pixel[0] - self.cx) / self.params.focal_px,
            (pixel[1] - self.cy) / self.params.focal_px,
            1.0,
        );
        let dir = self.rot * dir_cam;
        let origin = self.position();
        // Ray-plane intersection with z = height; rays parallel to the plane
        // get a signed epsilon denominator and land far away.
        let denom = if dir.z.abs() < 1e-9 {
            1e-9_f64.copysign(dir.z)
        } else {
            dir.z
        };
        let t = (height - origin.z) / denom;
        origin + dir * t
    }

    fn back_project_at_depth(&self, pixel: [f64; 2], depth: f64) -> Option<Vector3<f64>> {
        let cam = Vector3::new(
            (pixel[0] - self.cx) / self.params.focal_px * depth,
            (pixel[1] - self.cy) / self.params.focal_px * depth,
            depth,
        );
        Some(self.position() + self.rot * cam)
    }

    fn depth_from_radius(&self, radius_px: f64, ball_radius_m: f64) -> Option<f64> {
        if radius_px > 0.0 && radius_px.is_finite() {
            Some(self.params.focal_px * ball_radius_m / radius_px)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn planar_map_matches_frame_edges() {
        let m = PlanarScale::new(&PlanarScaleParams::default()).unwrap();
        // Bottom edge of the frame is the stump plane, left edge the off-side
        // limit of the lateral corridor.
        let p = m.back_project_at_height([0.0, 540.0], 0.5);
        assert_abs_diff_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(p.y, -1.5, epsilon = 1e-9);
        assert_abs_diff_eq!(p.z, 0.5, epsilon = 1e-9);

        let top = m.back_project_at_height([480.0, 0.0], 1.0);
        assert_abs_diff_eq!(top.x, 20.12, epsilon = 1e-9);
        assert_abs_diff_eq!(top.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn planar_project_roundtrip() {
        let m = PlanarScale::new(&PlanarScaleParams::default()).unwrap();
        let world = Vector3::new(12.0, 0.4, 1.1);
        let px = m.project(&world);
        let back = m.back_project_at_height(px, world.z);
        assert_abs_diff_eq!(back.x, world.x, epsilon = 1e-9);
        assert_abs_diff_eq!(back.y, world.y, epsilon = 1e-9);
    }

    #[test]
    fn pinhole_axis_point_projects_to_center() {
        let cam = CameraParams {
            position: [30.0, 0.0, 2.0],
            yaw: 0.0,
            pitch: 0.0,
            ..Default::default()
        };
        let m = Pinhole::new(&cam).unwrap();
        // A point straight down the optical axis lands on the principal point.
        let px = m.project(&Vector3::new(10.0, 0.0, 2.0));
        assert_abs_diff_eq!(px[0], 480.0, epsilon = 1e-6);
        assert_abs_diff_eq!(px[1], 270.0, epsilon = 1e-6);
    }

    #[test]
    fn pinhole_height_roundtrip() {
        let m = Pinhole::new(&CameraParams::default()).unwrap();
        let world = Vector3::new(8.0, -0.3, 0.9);
        let px = m.project(&world);
        let back = m.back_project_at_height(px, world.z);
        assert_abs_diff_eq!(back.x, world.x, epsilon = 1e-6);
        assert_abs_diff_eq!(back.y, world.y, epsilon = 1e-6);
        assert_abs_diff_eq!(back.z, world.z, epsilon = 1e-6);
    }

    #[test]
    fn pinhole_depth_roundtrip() {
        let m = Pinhole::new(&CameraParams::default()).unwrap();
        let world = Vector3::new(5.0, 0.2, 0.5);
        let px = m.project(&world);
        // Depth ≈ distance along -x for the default near-axis camera.
        let back = m.back_project_at_depth(px, 25.0);
        assert!(back.is_some());
    }

    #[test]
    fn apparent_radius_depth() {
        let m = Pinhole::new(&CameraParams::default()).unwrap();
        // 0.036 m ball imaged at 5 px with f = 1400 px → ~10 m away
        let d = m.depth_from_radius(5.0, 0.036).unwrap();
        assert_abs_diff_eq!(d, 1400.0 * 0.036 / 5.0, epsilon = 1e-12);
        assert!(m.depth_from_radius(0.0, 0.036).is_none());
    }
}
