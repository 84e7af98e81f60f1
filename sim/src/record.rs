//! Record: serialize/deserialize synthetic runs for offline analysis & replay.

use crate::delivery::TruthSample;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;
use trajectory_core::types::Observation;

/// A full recorded synthetic delivery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub scenario_name: String,
    pub seed: u64,
    pub frame_rate: f64,
    /// The observation stream as the detector boundary would provide it
    pub observations: Vec<Observation>,
    /// Ground-truth ball states, sampled per frame
    pub ground_truth: Vec<TruthSample>,
}

/// Save a delivery record to a JSON file.
pub fn save_record(record: &DeliveryRecord, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, record)?;
    Ok(())
}

/// Load a delivery record from a JSON file.
pub fn load_record(path: &Path) -> anyhow::Result<DeliveryRecord> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let record: DeliveryRecord = serde_json::from_reader(reader)?;
    Ok(record)
}
