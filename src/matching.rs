//! Color matching between machine inputs and attachment hoses.
//!
//! An input and a hose can be coupled when their colors are equal. The
//! resolver is a literal cross-join: two red inputs and three red hoses
//! yield six candidate connections, and picking among them is left to
//! the technician.

use uuid::Uuid;

use crate::model::{HydraulicPort, PortRole};

/// Identifies a connection by its `(input id, hose id)` pair.
pub type ConnectionKey = (Uuid, Uuid);

/// A candidate coupling of one machine input to one attachment hose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub input: HydraulicPort,
    pub hose: HydraulicPort,
}

impl Connection {
    pub fn key(&self) -> ConnectionKey {
        (self.input.id, self.hose.id)
    }
}

/// Pairs every input with every hose of the same color.
///
/// The result is ordered by input number, then hose number. Ports with equal
/// numbers keep the order they were passed in.
pub fn resolve(inputs: &[HydraulicPort], hoses: &[HydraulicPort]) -> Vec<Connection> {
    debug_assert!(inputs.iter().all(|p| p.role == PortRole::Input));
    debug_assert!(hoses.iter().all(|p| p.role == PortRole::Hose));

    let mut connections: Vec<Connection> = inputs
        .iter()
        .flat_map(|input| {
            hoses
                .iter()
                .filter(|hose| hose.color == input.color)
                .map(|hose| Connection {
                    input: input.clone(),
                    hose: hose.clone(),
                })
        })
        .collect();
    connections.sort_by_key(|c| (c.input.sequence_number, c.hose.sequence_number));
    connections
}
