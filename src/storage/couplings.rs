//! Hose-coupling storage: coupling instructions per machine and attachment.

use rusqlite::{OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::model::HoseCoupling;

use super::slots::{OrderingScope, allocate_insert, allocate_move};
use super::{Result, Storage, StorageError, parse_column, parse_id};

const COLUMNS: &str = "id, machine_id, attachment_id, hose_number, hose_color, hose_label, \
                       valve_id, port, function_description, instruction, connection_type, \
                       pressure_rating_bar, flow_rating_lpm, slot";

/// A blank attachment id means "no attachment"; the slot index folds both together.
fn normalize_attachment(attachment_id: Option<&str>) -> Option<&str> {
    attachment_id.map(str::trim).filter(|id| !id.is_empty())
}

fn scope_of(coupling: &HoseCoupling) -> OrderingScope {
    OrderingScope::Couplings {
        machine_id: coupling.machine_id.clone(),
        attachment_id: coupling.attachment_id.clone(),
    }
}

impl Storage {
    /// Stores `coupling` at `slot`, or at the end of its list when omitted.
    ///
    /// Ratings are validated before anything is written.
    pub fn add_coupling(&self, coupling: &HoseCoupling, slot: Option<u32>) -> Result<HoseCoupling> {
        coupling.validate().map_err(StorageError::Invalid)?;
        if let Some(valve_id) = coupling.valve_id {
            self.load_valve(valve_id)?;
        }

        let mut coupling = coupling.clone();
        coupling.attachment_id =
            normalize_attachment(coupling.attachment_id.as_deref()).map(String::from);
        let scope = scope_of(&coupling);
        let stored = self.write_in_scope(&scope, |conn| {
            let mut stored = coupling.clone();
            stored.slot = allocate_insert(conn, &scope, slot)?;
            conn.execute(
                &format!(
                    "INSERT INTO hose_couplings ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
                ),
                rusqlite::params![
                    stored.id.to_string(),
                    &stored.machine_id,
                    &stored.attachment_id,
                    stored.hose_number,
                    stored.hose_color.as_str(),
                    &stored.hose_label,
                    stored.valve_id.map(|id| id.to_string()),
                    stored.port.as_str(),
                    &stored.function_description,
                    &stored.instruction,
                    stored.connection_type.as_str(),
                    stored.pressure_rating_bar,
                    stored.flow_rating_lpm,
                    stored.slot,
                ],
            )?;
            Ok(stored)
        })?;
        info!(id = %stored.id, %scope, slot = stored.slot, "added coupling");
        Ok(stored)
    }

    /// Moves a coupling to `new_slot` within its list.
    pub fn move_coupling(&self, id: Uuid, new_slot: u32) -> Result<HoseCoupling> {
        let scope = scope_of(&self.load_coupling(id)?);
        self.write_in_scope(&scope, |conn| allocate_move(conn, &scope, id, new_slot))?;
        self.load_coupling(id)
    }

    /// Deletes a coupling. Remaining slots are not renumbered.
    pub fn delete_coupling(&self, id: Uuid) -> Result<()> {
        let rows = self
            .open()?
            .execute("DELETE FROM hose_couplings WHERE id = ?1", [id.to_string()])?;
        if rows == 0 {
            return Err(StorageError::NotFound {
                kind: "coupling",
                id,
            });
        }
        Ok(())
    }

    /// Loads a single coupling.
    pub fn load_coupling(&self, id: Uuid) -> Result<HoseCoupling> {
        let raw = self
            .open()?
            .query_row(
                &format!("SELECT {COLUMNS} FROM hose_couplings WHERE id = ?1"),
                [id.to_string()],
                RawCoupling::read,
            )
            .optional()?;
        raw.ok_or(StorageError::NotFound {
            kind: "coupling",
            id,
        })?
        .into_coupling()
    }

    /// Lists the couplings of one ordering scope in slot order.
    ///
    /// `attachment_id = None` lists the machine's attachment-independent couplings.
    pub fn list_couplings(
        &self,
        machine_id: &str,
        attachment_id: Option<&str>,
    ) -> Result<Vec<HoseCoupling>> {
        let attachment_id = normalize_attachment(attachment_id);
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM hose_couplings
             WHERE machine_id = ?1 AND attachment_id IS ?2 ORDER BY slot"
        ))?;
        let rows = stmt.query_map(rusqlite::params![machine_id, attachment_id], RawCoupling::read)?;
        rows.map(|raw| raw?.into_coupling()).collect()
    }
}

struct RawCoupling {
    id: String,
    machine_id: String,
    attachment_id: Option<String>,
    hose_number: u32,
    hose_color: String,
    hose_label: String,
    valve_id: Option<String>,
    port: String,
    function_description: String,
    instruction: String,
    connection_type: String,
    pressure_rating_bar: u32,
    flow_rating_lpm: u32,
    slot: u32,
}

impl RawCoupling {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            machine_id: row.get(1)?,
            attachment_id: row.get(2)?,
            hose_number: row.get(3)?,
            hose_color: row.get(4)?,
            hose_label: row.get(5)?,
            valve_id: row.get(6)?,
            port: row.get(7)?,
            function_description: row.get(8)?,
            instruction: row.get(9)?,
            connection_type: row.get(10)?,
            pressure_rating_bar: row.get(11)?,
            flow_rating_lpm: row.get(12)?,
            slot: row.get(13)?,
        })
    }

    fn into_coupling(self) -> Result<HoseCoupling> {
        Ok(HoseCoupling {
            id: parse_id(&self.id, "coupling id")?,
            machine_id: self.machine_id,
            attachment_id: self.attachment_id,
            hose_number: self.hose_number,
            hose_color: parse_column(&self.hose_color)?,
            hose_label: self.hose_label,
            valve_id: self
                .valve_id
                .as_deref()
                .map(|raw| parse_id(raw, "valve id"))
                .transpose()?,
            port: parse_column(&self.port)?,
            function_description: self.function_description,
            instruction: self.instruction,
            connection_type: parse_column(&self.connection_type)?,
            pressure_rating_bar: self.pressure_rating_bar,
            flow_rating_lpm: self.flow_rating_lpm,
            slot: self.slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    use crate::model::{
        ConnectionType, CouplingPort, HoseColor, Valve, ValveKind, ValvePosition,
    };

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("catalog.sqlite")).unwrap();
        (dir, storage)
    }

    fn sample_coupling(attachment_id: Option<&str>, hose_number: u32) -> HoseCoupling {
        HoseCoupling {
            id: Uuid::new_v4(),
            machine_id: "tractor-1".into(),
            attachment_id: attachment_id.map(String::from),
            hose_number,
            hose_color: HoseColor::Red,
            hose_label: format!("Hose {hose_number}"),
            valve_id: None,
            port: CouplingPort::P,
            function_description: "Pressure line".into(),
            instruction: "Connect the pressure line first".into(),
            connection_type: ConnectionType::SingleActing,
            pressure_rating_bar: 250,
            flow_rating_lpm: 60,
            slot: 0,
        }
    }

    #[test]
    fn add_and_load_coupling() {
        let (_dir, storage) = test_storage();
        let stored = storage
            .add_coupling(&sample_coupling(Some("mower-3"), 1), None)
            .unwrap();

        assert_eq!(stored.slot, 1);
        assert_eq!(storage.load_coupling(stored.id).unwrap(), stored);
    }

    #[test]
    fn attachment_narrows_the_ordering_scope() {
        let (_dir, storage) = test_storage();
        storage
            .add_coupling(&sample_coupling(Some("mower-3"), 1), None)
            .unwrap();
        storage
            .add_coupling(&sample_coupling(Some("rake-7"), 1), None)
            .unwrap();
        storage.add_coupling(&sample_coupling(None, 1), None).unwrap();
        storage.add_coupling(&sample_coupling(None, 2), None).unwrap();

        let mower = storage.list_couplings("tractor-1", Some("mower-3")).unwrap();
        let shared = storage.list_couplings("tractor-1", None).unwrap();
        assert_eq!(mower.len(), 1);
        assert_eq!(mower[0].slot, 1);
        let slots: Vec<u32> = shared.iter().map(|c| c.slot).collect();
        assert_eq!(slots, vec![1, 2]);
    }

    #[test]
    fn blank_attachment_shares_the_unscoped_list() {
        let (_dir, storage) = test_storage();
        storage.add_coupling(&sample_coupling(None, 1), None).unwrap();

        let blank = storage
            .add_coupling(&sample_coupling(Some(""), 2), None)
            .unwrap();
        let padded = storage
            .add_coupling(&sample_coupling(Some("  "), 3), None)
            .unwrap();

        assert_eq!(blank.attachment_id, None);
        assert_eq!(blank.slot, 2);
        assert_eq!(padded.slot, 3);
        let listed: Vec<u32> = storage
            .list_couplings("tractor-1", Some(""))
            .unwrap()
            .iter()
            .map(|c| c.hose_number)
            .collect();
        assert_eq!(listed, vec![1, 2, 3]);
        assert_eq!(storage.list_couplings("tractor-1", None).unwrap().len(), 3);
    }

    #[test]
    fn move_within_unscoped_couplings() {
        let (_dir, storage) = test_storage();
        let first = storage.add_coupling(&sample_coupling(None, 1), None).unwrap();
        storage.add_coupling(&sample_coupling(None, 2), None).unwrap();
        storage.add_coupling(&sample_coupling(None, 3), None).unwrap();

        storage.move_coupling(first.id, 3).unwrap();

        let numbers: Vec<u32> = storage
            .list_couplings("tractor-1", None)
            .unwrap()
            .iter()
            .map(|c| c.hose_number)
            .collect();
        assert_eq!(numbers, vec![2, 3, 1]);
    }

    #[test]
    fn rejects_out_of_range_rating_before_writing() {
        let (_dir, storage) = test_storage();
        let mut coupling = sample_coupling(None, 1);
        coupling.pressure_rating_bar = 400;

        let err = storage.add_coupling(&coupling, None).unwrap_err();
        assert!(matches!(err, StorageError::Invalid(_)));
        assert!(storage.list_couplings("tractor-1", None).unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_valve() {
        let (_dir, storage) = test_storage();
        let mut coupling = sample_coupling(None, 1);
        coupling.valve_id = Some(Uuid::new_v4());

        let err = storage.add_coupling(&coupling, None).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { kind: "valve", .. }));
    }

    #[test]
    fn deleting_valve_clears_coupling_reference() {
        let (_dir, storage) = test_storage();
        let valve = storage
            .add_valve(
                &Valve {
                    id: Uuid::new_v4(),
                    machine_id: "tractor-1".into(),
                    number: "V1".into(),
                    function_name: "Lift".into(),
                    position: ValvePosition::Rear,
                    kind: ValveKind::SingleActing,
                    description: None,
                    color: None,
                    port_a_label: "A".into(),
                    port_b_label: "B".into(),
                    slot: 0,
                    active: true,
                },
                None,
            )
            .unwrap();
        let mut coupling = sample_coupling(None, 1);
        coupling.valve_id = Some(valve.id);
        let stored = storage.add_coupling(&coupling, None).unwrap();

        storage.delete_valve(valve.id).unwrap();

        assert_eq!(storage.load_coupling(stored.id).unwrap().valve_id, None);
    }
}
