//! Valve definitions on a machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HoseColor;

/// A control valve on a machine, listed in slot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Valve {
    pub id: Uuid,
    pub machine_id: String,

    /// The valve's label on the machine (e.g. `V1`).
    pub number: String,

    pub function_name: String,
    pub position: ValvePosition,
    pub kind: ValveKind,
    pub description: Option<String>,
    pub color: Option<HoseColor>,
    pub port_a_label: String,
    pub port_b_label: String,
    pub slot: u32,
    pub active: bool,
}

/// Where on the machine the valve block sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValvePosition {
    Front,
    Rear,
}

/// How the valve drives its consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValveKind {
    SingleActing,
    DoubleActing,
    PowerBeyond,
}

impl ValvePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Rear => "rear",
        }
    }
}

impl FromStr for ValvePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "front" => Ok(Self::Front),
            "rear" => Ok(Self::Rear),
            other => Err(format!("unknown valve position: {other}")),
        }
    }
}

impl ValveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SingleActing => "single-acting",
            Self::DoubleActing => "double-acting",
            Self::PowerBeyond => "power-beyond",
        }
    }
}

impl FromStr for ValveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-acting" => Ok(Self::SingleActing),
            "double-acting" => Ok(Self::DoubleActing),
            "power-beyond" => Ok(Self::PowerBeyond),
            other => Err(format!("unknown valve kind: {other}")),
        }
    }
}
