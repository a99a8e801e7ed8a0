//! Port storage: machine inputs and attachment hoses.

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::model::{HoseColor, HydraulicPort, PortRole};

use super::slots::{OrderingScope, allocate_insert, allocate_move};
use super::{Result, Storage, StorageError, parse_column, parse_id};

const COLUMNS: &str = "id, role, owner_id, sequence_number, color, slot";

impl Storage {
    /// Adds a port at `slot`, or at the end of its owner's list when omitted.
    pub fn add_port(
        &self,
        role: PortRole,
        owner_id: &str,
        sequence_number: u32,
        color: HoseColor,
        slot: Option<u32>,
    ) -> Result<HydraulicPort> {
        let scope = OrderingScope::for_port(role, owner_id);
        let port = self.write_in_scope(&scope, |conn| {
            let slot = allocate_insert(conn, &scope, slot)?;
            let port = HydraulicPort {
                id: Uuid::new_v4(),
                role,
                owner_id: owner_id.to_string(),
                sequence_number,
                color,
                slot,
            };
            conn.execute(
                "INSERT INTO hydraulic_ports (id, role, owner_id, sequence_number, color, slot)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    port.id.to_string(),
                    role.as_str(),
                    &port.owner_id,
                    sequence_number,
                    color.as_str(),
                    slot,
                ],
            )?;
            Ok(port)
        })?;
        info!(id = %port.id, %scope, slot = port.slot, "added port");
        Ok(port)
    }

    /// Moves a port to `new_slot` within its owner's list.
    pub fn move_port(&self, id: Uuid, new_slot: u32) -> Result<HydraulicPort> {
        let port = self.load_port(id)?;
        let scope = OrderingScope::for_port(port.role, &port.owner_id);
        self.write_in_scope(&scope, |conn| allocate_move(conn, &scope, id, new_slot))?;
        self.load_port(id)
    }

    /// Edits a port's number and/or color. The slot is left alone.
    pub fn update_port(
        &self,
        id: Uuid,
        sequence_number: Option<u32>,
        color: Option<HoseColor>,
    ) -> Result<HydraulicPort> {
        let mut port = self.load_port(id)?;
        if let Some(n) = sequence_number {
            port.sequence_number = n;
        }
        if let Some(c) = color {
            port.color = c;
        }
        self.open()?.execute(
            "UPDATE hydraulic_ports SET sequence_number = ?1, color = ?2 WHERE id = ?3",
            rusqlite::params![port.sequence_number, port.color.as_str(), id.to_string()],
        )?;
        Ok(port)
    }

    /// Deletes a port. Remaining slots are not renumbered.
    pub fn delete_port(&self, id: Uuid) -> Result<()> {
        let rows = self.open()?.execute(
            "DELETE FROM hydraulic_ports WHERE id = ?1",
            [id.to_string()],
        )?;
        if rows == 0 {
            return Err(StorageError::NotFound { kind: "port", id });
        }
        info!(%id, "deleted port");
        Ok(())
    }

    /// Loads a single port.
    pub fn load_port(&self, id: Uuid) -> Result<HydraulicPort> {
        let conn = self.open()?;
        load_port_row(&conn, id)?.ok_or(StorageError::NotFound { kind: "port", id })
    }

    /// Lists an owner's ports of one role in slot order.
    pub fn list_ports(&self, role: PortRole, owner_id: &str) -> Result<Vec<HydraulicPort>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM hydraulic_ports
             WHERE role = ?1 AND owner_id = ?2 ORDER BY slot"
        ))?;
        let rows = stmt.query_map(rusqlite::params![role.as_str(), owner_id], RawPort::read)?;
        rows.map(|raw| raw?.into_port()).collect()
    }

    /// Lists the hoses of several attachments, concatenated in argument order.
    pub fn list_hoses(&self, attachment_ids: &[String]) -> Result<Vec<HydraulicPort>> {
        let mut hoses = Vec::new();
        for attachment_id in attachment_ids {
            hoses.extend(self.list_ports(PortRole::Hose, attachment_id)?);
        }
        Ok(hoses)
    }
}

fn load_port_row(conn: &Connection, id: Uuid) -> Result<Option<HydraulicPort>> {
    let raw = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM hydraulic_ports WHERE id = ?1"),
            [id.to_string()],
            RawPort::read,
        )
        .optional()?;
    raw.map(RawPort::into_port).transpose()
}

/// Column values as read, before parsing.
struct RawPort {
    id: String,
    role: String,
    owner_id: String,
    sequence_number: u32,
    color: String,
    slot: u32,
}

impl RawPort {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            role: row.get(1)?,
            owner_id: row.get(2)?,
            sequence_number: row.get(3)?,
            color: row.get(4)?,
            slot: row.get(5)?,
        })
    }

    fn into_port(self) -> Result<HydraulicPort> {
        Ok(HydraulicPort {
            id: parse_id(&self.id, "port id")?,
            role: parse_column(&self.role)?,
            owner_id: self.owner_id,
            sequence_number: self.sequence_number,
            color: parse_column(&self.color)?,
            slot: self.slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("catalog.sqlite")).unwrap();
        (dir, storage)
    }

    #[test]
    fn add_and_load_port() {
        let (_dir, storage) = test_storage();
        let port = storage
            .add_port(PortRole::Input, "tractor-1", 3, HoseColor::Yellow, None)
            .unwrap();

        let loaded = storage.load_port(port.id).unwrap();
        assert_eq!(loaded, port);
        assert_eq!(loaded.slot, 1);
    }

    #[test]
    fn list_ports_in_slot_order() {
        let (_dir, storage) = test_storage();
        storage
            .add_port(PortRole::Hose, "mower-3", 1, HoseColor::Red, None)
            .unwrap();
        storage
            .add_port(PortRole::Hose, "mower-3", 2, HoseColor::Blue, Some(1))
            .unwrap();

        let hoses = storage.list_ports(PortRole::Hose, "mower-3").unwrap();
        let numbers: Vec<u32> = hoses.iter().map(|h| h.sequence_number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[test]
    fn list_ports_filters_by_role() {
        let (_dir, storage) = test_storage();
        storage
            .add_port(PortRole::Input, "shared-id", 1, HoseColor::Red, None)
            .unwrap();
        storage
            .add_port(PortRole::Hose, "shared-id", 1, HoseColor::Red, None)
            .unwrap();

        assert_eq!(
            storage.list_ports(PortRole::Input, "shared-id").unwrap().len(),
            1
        );
    }

    #[test]
    fn update_port_changes_color_only() {
        let (_dir, storage) = test_storage();
        let port = storage
            .add_port(PortRole::Input, "tractor-1", 1, HoseColor::Red, None)
            .unwrap();

        let updated = storage
            .update_port(port.id, None, Some(HoseColor::Green))
            .unwrap();

        assert_eq!(updated.color, HoseColor::Green);
        assert_eq!(updated.sequence_number, 1);
        assert_eq!(storage.load_port(port.id).unwrap().color, HoseColor::Green);
    }

    #[test]
    fn delete_nonexistent_port_fails() {
        let (_dir, storage) = test_storage();
        let err = storage.delete_port(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { kind: "port", .. }));
    }

    #[test]
    fn move_nonexistent_port_fails() {
        let (_dir, storage) = test_storage();
        let err = storage.move_port(Uuid::new_v4(), 1).unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[test]
    fn list_hoses_spans_attachments() {
        let (_dir, storage) = test_storage();
        storage
            .add_port(PortRole::Hose, "mower-3", 1, HoseColor::Red, None)
            .unwrap();
        storage
            .add_port(PortRole::Hose, "rake-7", 1, HoseColor::Blue, None)
            .unwrap();

        let hoses = storage
            .list_hoses(&["mower-3".to_string(), "rake-7".to_string()])
            .unwrap();
        assert_eq!(hoses.len(), 2);
        assert_eq!(hoses[0].owner_id, "mower-3");
        assert_eq!(hoses[1].owner_id, "rake-7");
    }
}
