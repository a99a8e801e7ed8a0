//! Sensor-side types: tag descriptions and status snapshots.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Reachability of the sensor bridge as seen by the last poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    ServerOffline,
    Error,
    Timeout,
}

/// Read-only snapshot of what the sensor reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NfcStatus {
    pub tag_detected: bool,
    pub position: Option<String>,
    pub connection_status: ConnectionStatus,
    pub observed_at: Timestamp,
}

/// A tag the sensor is expected to read, and the hose position it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TagInfo {
    /// The identifier the reader reports (e.g. `SUPPLY_LEFT`).
    pub id: String,

    /// Human-readable hose position.
    pub position: String,

    #[serde(default)]
    pub hose_type: Option<String>,
    #[serde(default)]
    pub function: Option<String>,

    /// The valve port the hose belongs on.
    #[serde(default)]
    pub connection: Option<String>,

    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub max_pressure_bar: Option<u32>,
    #[serde(default)]
    pub flow_rate_lpm: Option<u32>,
}

impl TagInfo {
    /// The tags fitted to the standard three-hose kit.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self {
                id: "SUPPLY_LEFT".into(),
                position: "Supply hose left".into(),
                hose_type: Some("Supply hose".into()),
                function: Some("Hydraulic oil to the implement".into()),
                connection: Some("Valve A (left)".into()),
                color: Some("red".into()),
                max_pressure_bar: Some(300),
                flow_rate_lpm: Some(60),
            },
            Self {
                id: "RETURN_RIGHT".into(),
                position: "Return hose right".into(),
                hose_type: Some("Return hose".into()),
                function: Some("Oil back to the tank".into()),
                connection: Some("Valve B (right)".into()),
                color: Some("blue".into()),
                max_pressure_bar: Some(300),
                flow_rate_lpm: Some(60),
            },
            Self {
                id: "LEAK".into(),
                position: "Leak line".into(),
                hose_type: Some("Leak line".into()),
                function: Some("Drain for leak oil".into()),
                connection: Some("Valve C (leak port)".into()),
                color: Some("yellow".into()),
                max_pressure_bar: Some(10),
                flow_rate_lpm: Some(5),
            },
        ]
    }
}
