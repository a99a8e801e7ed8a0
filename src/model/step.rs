//! Installation steps and the record of an installation run.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One step of a machine's installation walk-through.
///
/// Read-only during an installation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallationStep {
    pub id: Uuid,

    /// The machine the step belongs to.
    pub owner_id: String,

    pub step_number: u32,
    pub title: String,
    pub description: String,

    /// Reference to an illustration. Opaque to this tool.
    pub image: Option<String>,

    /// Whether the step asks for a sensor reading.
    ///
    /// Only blocks progress when the step is the last one.
    pub requires_signal: bool,

    /// The tag id the sensor is expected to read (e.g. `SUPPLY_LEFT`).
    pub signal_position: Option<String>,
}

/// One technician's pass through a machine's installation steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub id: Uuid,
    pub machine_id: String,
    pub started_at: Timestamp,
    pub status: InstallationStatus,
}

/// Where an installation stands in its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum InstallationStatus {
    /// The technician is working through the steps.
    Active,

    /// Every step was passed, including the sensor-gated one.
    Completed {
        completed_at: Timestamp,

        /// The attachment the hookup resolved to, when known.
        attachment_id: Option<String>,
    },
}
