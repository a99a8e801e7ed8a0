//! Operator confirmations over the derived connections.
//!
//! The checklist is session state: nothing here is persisted. Whenever the
//! port lists change, [`VerificationChecklist::sync`] re-derives the
//! connections and drops confirmations for pairs that no longer exist.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::matching::{self, Connection, ConnectionKey};
use crate::model::HydraulicPort;

/// Which derived connections the technician has confirmed.
#[derive(Debug, Default)]
pub struct VerificationChecklist {
    connections: Vec<Connection>,
    confirmed: HashSet<ConnectionKey>,
}

impl VerificationChecklist {
    /// Builds a checklist with nothing confirmed.
    pub fn new(inputs: &[HydraulicPort], hoses: &[HydraulicPort]) -> Self {
        Self {
            connections: matching::resolve(inputs, hoses),
            confirmed: HashSet::new(),
        }
    }

    /// Re-derives the connections from fresh port lists.
    ///
    /// Confirmations survive only for connections that are still derived.
    pub fn sync(&mut self, inputs: &[HydraulicPort], hoses: &[HydraulicPort]) {
        self.connections = matching::resolve(inputs, hoses);
        let present: HashSet<ConnectionKey> = self.connections.iter().map(Connection::key).collect();
        let before = self.confirmed.len();
        self.confirmed.retain(|key| present.contains(key));
        let dropped = before - self.confirmed.len();
        if dropped > 0 {
            debug!(dropped, "dropped confirmations for vanished connections");
        }
    }

    /// Flips the confirmation of `key`.
    ///
    /// Returns `false` and changes nothing when `key` is not a current connection.
    pub fn toggle(&mut self, key: ConnectionKey) -> bool {
        if !self.connections.iter().any(|c| c.key() == key) {
            debug!(input = %key.0, hose = %key.1, "ignoring toggle of stale connection");
            return false;
        }
        if !self.confirmed.remove(&key) {
            self.confirmed.insert(key);
        }
        true
    }

    pub fn is_confirmed(&self, key: ConnectionKey) -> bool {
        self.confirmed.contains(&key)
    }

    /// True when there is at least one connection and all are confirmed.
    pub fn is_complete(&self) -> bool {
        !self.connections.is_empty()
            && self
                .connections
                .iter()
                .all(|c| self.confirmed.contains(&c.key()))
    }

    /// The attachment owning the most confirmed hoses.
    ///
    /// Ties go to the lexically lowest owner id. `None` when nothing is confirmed.
    pub fn resolve_primary_owner(&self) -> Option<&str> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for connection in &self.connections {
            if self.confirmed.contains(&connection.key()) {
                *counts.entry(connection.hose.owner_id.as_str()).or_default() += 1;
            }
        }
        // Ascending key order: a later owner must strictly beat the count.
        let mut best: Option<(&str, usize)> = None;
        for (owner, count) in counts {
            if best.is_none_or(|(_, top)| count > top) {
                best = Some((owner, count));
            }
        }
        best.map(|(owner, _)| owner)
    }

    /// Connections in display order with their confirmation flag.
    pub fn entries(&self) -> impl Iterator<Item = (&Connection, bool)> {
        self.connections
            .iter()
            .map(|c| (c, self.is_confirmed(c.key())))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use uuid::Uuid;

    use crate::model::{HoseColor, PortRole};

    fn port(role: PortRole, owner: &str, number: u32, color: HoseColor) -> HydraulicPort {
        HydraulicPort {
            id: Uuid::new_v4(),
            role,
            owner_id: owner.into(),
            sequence_number: number,
            color,
            slot: number,
        }
    }

    fn input(number: u32, color: HoseColor) -> HydraulicPort {
        port(PortRole::Input, "tractor-1", number, color)
    }

    fn hose(owner: &str, number: u32, color: HoseColor) -> HydraulicPort {
        port(PortRole::Hose, owner, number, color)
    }

    fn keys(checklist: &VerificationChecklist) -> Vec<ConnectionKey> {
        checklist.entries().map(|(c, _)| c.key()).collect()
    }

    #[test]
    fn empty_checklist_is_never_complete() {
        let checklist = VerificationChecklist::new(&[input(1, HoseColor::Red)], &[]);

        assert_eq!(checklist.len(), 0);
        assert!(!checklist.is_complete());
        assert_eq!(checklist.resolve_primary_owner(), None);
    }

    #[test]
    fn complete_once_every_connection_confirmed() {
        let inputs = vec![input(1, HoseColor::Red), input(2, HoseColor::Blue)];
        let hoses = vec![
            hose("mower-3", 1, HoseColor::Red),
            hose("mower-3", 2, HoseColor::Blue),
        ];
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);

        let all = keys(&checklist);
        assert!(checklist.toggle(all[0]));
        assert!(!checklist.is_complete());
        assert!(checklist.toggle(all[1]));
        assert!(checklist.is_complete());
    }

    #[test]
    fn toggle_twice_unconfirms() {
        let inputs = vec![input(1, HoseColor::Red)];
        let hoses = vec![hose("mower-3", 1, HoseColor::Red)];
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);
        let key = keys(&checklist)[0];

        checklist.toggle(key);
        checklist.toggle(key);

        assert!(!checklist.is_confirmed(key));
        assert_eq!(checklist.confirmed_count(), 0);
    }

    #[test]
    fn stale_toggle_is_ignored() {
        let inputs = vec![input(1, HoseColor::Red)];
        let hoses = vec![hose("mower-3", 1, HoseColor::Red)];
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);

        assert!(!checklist.toggle((Uuid::new_v4(), Uuid::new_v4())));
        assert_eq!(checklist.confirmed_count(), 0);
    }

    #[test]
    fn sync_drops_vanished_confirmations() {
        let red_input = input(1, HoseColor::Red);
        let red_hose = hose("mower-3", 1, HoseColor::Red);
        let blue_input = input(2, HoseColor::Blue);
        let blue_hose = hose("mower-3", 2, HoseColor::Blue);
        let mut checklist = VerificationChecklist::new(
            &[red_input.clone(), blue_input.clone()],
            &[red_hose.clone(), blue_hose.clone()],
        );
        for key in keys(&checklist) {
            checklist.toggle(key);
        }
        assert!(checklist.is_complete());

        // The red hose is recolored, so its connection disappears.
        let mut recolored = red_hose.clone();
        recolored.color = HoseColor::Green;
        checklist.sync(&[red_input.clone(), blue_input.clone()], &[recolored, blue_hose.clone()]);

        assert_eq!(checklist.len(), 1);
        assert_eq!(checklist.confirmed_count(), 1);
        assert!(checklist.is_confirmed((blue_input.id, blue_hose.id)));
        assert!(!checklist.is_confirmed((red_input.id, red_hose.id)));
    }

    #[test]
    fn sync_never_confirms_new_connections() {
        let red_input = input(1, HoseColor::Red);
        let mut checklist =
            VerificationChecklist::new(&[red_input.clone()], &[hose("mower-3", 1, HoseColor::Red)]);
        let first = keys(&checklist)[0];
        checklist.toggle(first);

        checklist.sync(
            &[red_input],
            &[
                hose("mower-3", 1, HoseColor::Red),
                hose("mower-3", 2, HoseColor::Red),
            ],
        );

        assert_eq!(checklist.len(), 2);
        assert_eq!(checklist.confirmed_count(), 0);
        assert!(!checklist.is_complete());
    }

    #[test]
    fn primary_owner_is_the_majority_attachment() {
        let inputs = vec![
            input(1, HoseColor::Red),
            input(2, HoseColor::Blue),
            input(3, HoseColor::Yellow),
            input(4, HoseColor::Green),
        ];
        let hoses = vec![
            hose("mower-3", 1, HoseColor::Red),
            hose("mower-3", 2, HoseColor::Blue),
            hose("mower-3", 3, HoseColor::Yellow),
            hose("rake-7", 1, HoseColor::Green),
        ];
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);
        for key in keys(&checklist) {
            checklist.toggle(key);
        }

        assert_eq!(checklist.resolve_primary_owner(), Some("mower-3"));
    }

    #[test]
    fn primary_owner_counts_only_confirmed() {
        let inputs = vec![input(1, HoseColor::Red), input(2, HoseColor::Blue)];
        let hoses = vec![
            hose("mower-3", 1, HoseColor::Red),
            hose("rake-7", 1, HoseColor::Blue),
        ];
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);
        checklist.toggle((inputs[1].id, hoses[1].id));

        assert_eq!(checklist.resolve_primary_owner(), Some("rake-7"));
    }

    #[test]
    fn primary_owner_tie_goes_to_lowest_id() {
        let inputs = vec![input(1, HoseColor::Red), input(2, HoseColor::Blue)];
        let hoses = vec![
            hose("rake-7", 1, HoseColor::Red),
            hose("mower-3", 1, HoseColor::Blue),
        ];
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);
        for key in keys(&checklist) {
            checklist.toggle(key);
        }

        assert_eq!(checklist.resolve_primary_owner(), Some("mower-3"));
    }
}
