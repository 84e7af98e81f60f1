//! `scene_models` — Camera/pitch geometry and projection models.

pub mod camera;
pub mod projection;

pub use camera::{CameraParams, SceneError, SceneGeometry};
pub use projection::{
    PlanarScale, PlanarScaleParams, Pinhole, Projection, ProjectionConfig, ProjectionModel,
};
