//! Hydraulic ports: machine inputs and implement hoses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::HoseColor;

/// Which side of the hookup a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortRole {
    /// A hydraulic input on a machine.
    Input,

    /// A hydraulic hose on an implement.
    Hose,
}

impl PortRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Hose => "hose",
        }
    }
}

impl fmt::Display for PortRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "input" => Ok(Self::Input),
            "hose" => Ok(Self::Hose),
            other => Err(format!("unknown port role: {other}")),
        }
    }
}

/// A color-tagged hydraulic connection point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HydraulicPort {
    pub id: Uuid,
    pub role: PortRole,

    /// The machine (for inputs) or attachment (for hoses) that owns the port.
    pub owner_id: String,

    /// The number printed on the port itself.
    pub sequence_number: u32,

    pub color: HoseColor,

    /// Dense 1-based display order among the owner's ports.
    pub slot: u32,
}
