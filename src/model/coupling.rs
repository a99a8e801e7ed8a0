//! Hose-coupling instructions: which hose goes to which valve port.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HoseColor;

/// Highest pressure rating a coupling may declare, in bar.
pub const MAX_PRESSURE_BAR: u32 = 350;

/// Highest flow rating a coupling may declare, in l/min.
pub const MAX_FLOW_LPM: u32 = 200;

/// One instruction for coupling a hose to a valve port, listed in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoseCoupling {
    pub id: Uuid,
    pub machine_id: String,

    /// Set when the instruction only applies to one attachment.
    pub attachment_id: Option<String>,

    pub hose_number: u32,
    pub hose_color: HoseColor,
    pub hose_label: String,
    pub valve_id: Option<Uuid>,
    pub port: CouplingPort,
    pub function_description: String,
    pub instruction: String,
    pub connection_type: ConnectionType,
    pub pressure_rating_bar: u32,
    pub flow_rating_lpm: u32,
    pub slot: u32,
}

impl HoseCoupling {
    /// Checks the ratings against the hardware limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.pressure_rating_bar > MAX_PRESSURE_BAR {
            return Err(format!(
                "pressure rating must be between 0 and {MAX_PRESSURE_BAR} bar, got {}",
                self.pressure_rating_bar
            ));
        }
        if self.flow_rating_lpm > MAX_FLOW_LPM {
            return Err(format!(
                "flow rating must be between 0 and {MAX_FLOW_LPM} l/min, got {}",
                self.flow_rating_lpm
            ));
        }
        if self.hose_label.trim().is_empty() {
            return Err("hose label cannot be empty".to_string());
        }
        Ok(())
    }
}

/// The valve port a hose lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouplingPort {
    A,
    B,
    /// Pressure.
    P,
    /// Tank.
    T,
}

/// The hydraulic duty of the coupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionType {
    SingleActing,
    DoubleActing,
    HighFlow,
    LowFlow,
}

impl CouplingPort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::P => "P",
            Self::T => "T",
        }
    }
}

impl FromStr for CouplingPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "P" => Ok(Self::P),
            "T" => Ok(Self::T),
            other => Err(format!("unknown coupling port: {other}")),
        }
    }
}

impl ConnectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleActing => "single-acting",
            Self::DoubleActing => "double-acting",
            Self::HighFlow => "high-flow",
            Self::LowFlow => "low-flow",
        }
    }
}

impl FromStr for ConnectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-acting" => Ok(Self::SingleActing),
            "double-acting" => Ok(Self::DoubleActing),
            "high-flow" => Ok(Self::HighFlow),
            "low-flow" => Ok(Self::LowFlow),
            other => Err(format!("unknown connection type: {other}")),
        }
    }
}
