//! `sim` — Synthetic delivery simulator: ground-truth flight, camera
//! observations, scenarios, records.

pub mod camera_sim;
pub mod delivery;
pub mod record;
pub mod scenarios;

pub use camera_sim::{CameraSimulator, DetectorParams};
pub use delivery::{Delivery, DeliverySpec, TruthSample};
pub use record::{load_record, save_record, DeliveryRecord};
pub use scenarios::{Scenario, ScenarioKind};
