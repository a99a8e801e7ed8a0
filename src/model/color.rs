//! Hose colors: the fixed palette used to tag hydraulic ports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A color tag on a hydraulic port.
///
/// Inputs and hoses of the same color are physically compatible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoseColor {
    Red,
    Blue,
    Yellow,
    Green,
    Black,
    White,
    Orange,
    Purple,
}

impl HoseColor {
    pub const ALL: [Self; 8] = [
        Self::Red,
        Self::Blue,
        Self::Yellow,
        Self::Green,
        Self::Black,
        Self::White,
        Self::Orange,
        Self::Purple,
    ];

    /// Canonical name, as stored in the catalog.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Black => "black",
            Self::White => "white",
            Self::Orange => "orange",
            Self::Purple => "purple",
        }
    }

    /// One- or two-letter badge printed next to a port.
    pub fn badge(self) -> &'static str {
        match self {
            Self::Red => "R",
            Self::Blue => "B",
            Self::Yellow => "Y",
            Self::Green => "G",
            Self::Black => "K",
            Self::White => "W",
            Self::Orange => "O",
            Self::Purple => "P",
        }
    }
}

impl fmt::Display for HoseColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HoseColor {
    type Err = String;

    /// Parses canonical names and the Dutch names used by older catalogs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" | "rood" => Ok(Self::Red),
            "blue" | "blauw" => Ok(Self::Blue),
            "yellow" | "geel" => Ok(Self::Yellow),
            "green" | "groen" => Ok(Self::Green),
            "black" | "zwart" => Ok(Self::Black),
            "white" | "wit" => Ok(Self::White),
            "orange" | "oranje" => Ok(Self::Orange),
            "purple" | "paars" => Ok(Self::Purple),
            other => Err(format!(
                "unknown hose color '{other}' (expected one of: {})",
                Self::ALL.map(Self::as_str).join(", ")
            )),
        }
    }
}
