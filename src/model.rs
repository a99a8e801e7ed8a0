//! Core data model for hydrolink.
//!
//! Catalog records (ports, valves, couplings, steps) as stored,
//! plus the sensor-side snapshot types.

mod color;
mod coupling;
mod nfc;
mod port;
mod step;
mod valve;

pub use color::HoseColor;
pub use coupling::{ConnectionType, CouplingPort, HoseCoupling, MAX_FLOW_LPM, MAX_PRESSURE_BAR};
pub use nfc::{ConnectionStatus, NfcStatus, TagInfo};
pub use port::{HydraulicPort, PortRole};
pub use step::{Installation, InstallationStatus, InstallationStep};
pub use valve::{Valve, ValveKind, ValvePosition};
