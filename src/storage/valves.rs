//! Valve storage: per-machine valve definitions in slot order.

use rusqlite::{OptionalExtension, Row};
use tracing::info;
use uuid::Uuid;

use crate::model::{HoseColor, Valve};

use super::slots::{OrderingScope, allocate_insert, allocate_move};
use super::{Result, Storage, StorageError, parse_column, parse_id};

const COLUMNS: &str = "id, machine_id, number, function_name, position, kind, description, \
                       color, port_a_label, port_b_label, slot, active";

impl Storage {
    /// Stores `valve` at `slot`, or at the end of the machine's list when omitted.
    ///
    /// The stored slot is returned in the result; `valve.slot` is ignored.
    pub fn add_valve(&self, valve: &Valve, slot: Option<u32>) -> Result<Valve> {
        if valve.number.trim().is_empty() || valve.function_name.trim().is_empty() {
            return Err(StorageError::Invalid(
                "valve number and function name are required".to_string(),
            ));
        }
        let scope = OrderingScope::Valves {
            machine_id: valve.machine_id.clone(),
        };
        let stored = self.write_in_scope(&scope, |conn| {
            let mut stored = valve.clone();
            stored.slot = allocate_insert(conn, &scope, slot)?;
            conn.execute(
                &format!(
                    "INSERT INTO valves ({COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
                ),
                rusqlite::params![
                    stored.id.to_string(),
                    &stored.machine_id,
                    &stored.number,
                    &stored.function_name,
                    stored.position.as_str(),
                    stored.kind.as_str(),
                    &stored.description,
                    stored.color.map(HoseColor::as_str),
                    &stored.port_a_label,
                    &stored.port_b_label,
                    stored.slot,
                    stored.active,
                ],
            )?;
            Ok(stored)
        })?;
        info!(id = %stored.id, %scope, slot = stored.slot, "added valve");
        Ok(stored)
    }

    /// Moves a valve to `new_slot` within its machine's list.
    pub fn move_valve(&self, id: Uuid, new_slot: u32) -> Result<Valve> {
        let valve = self.load_valve(id)?;
        let scope = OrderingScope::Valves {
            machine_id: valve.machine_id,
        };
        self.write_in_scope(&scope, |conn| allocate_move(conn, &scope, id, new_slot))?;
        self.load_valve(id)
    }

    /// Deletes a valve. Couplings that pointed at it lose their valve reference.
    pub fn delete_valve(&self, id: Uuid) -> Result<()> {
        let rows = self
            .open()?
            .execute("DELETE FROM valves WHERE id = ?1", [id.to_string()])?;
        if rows == 0 {
            return Err(StorageError::NotFound { kind: "valve", id });
        }
        Ok(())
    }

    /// Loads a single valve.
    pub fn load_valve(&self, id: Uuid) -> Result<Valve> {
        let raw = self
            .open()?
            .query_row(
                &format!("SELECT {COLUMNS} FROM valves WHERE id = ?1"),
                [id.to_string()],
                RawValve::read,
            )
            .optional()?;
        raw.ok_or(StorageError::NotFound { kind: "valve", id })?
            .into_valve()
    }

    /// Lists a machine's valves in slot order.
    pub fn list_valves(&self, machine_id: &str) -> Result<Vec<Valve>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM valves WHERE machine_id = ?1 ORDER BY slot"
        ))?;
        let rows = stmt.query_map([machine_id], RawValve::read)?;
        rows.map(|raw| raw?.into_valve()).collect()
    }
}

struct RawValve {
    id: String,
    machine_id: String,
    number: String,
    function_name: String,
    position: String,
    kind: String,
    description: Option<String>,
    color: Option<String>,
    port_a_label: String,
    port_b_label: String,
    slot: u32,
    active: bool,
}

impl RawValve {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            machine_id: row.get(1)?,
            number: row.get(2)?,
            function_name: row.get(3)?,
            position: row.get(4)?,
            kind: row.get(5)?,
            description: row.get(6)?,
            color: row.get(7)?,
            port_a_label: row.get(8)?,
            port_b_label: row.get(9)?,
            slot: row.get(10)?,
            active: row.get(11)?,
        })
    }

    fn into_valve(self) -> Result<Valve> {
        Ok(Valve {
            id: parse_id(&self.id, "valve id")?,
            machine_id: self.machine_id,
            number: self.number,
            function_name: self.function_name,
            position: parse_column(&self.position)?,
            kind: parse_column(&self.kind)?,
            description: self.description,
            color: self.color.as_deref().map(parse_column).transpose()?,
            port_a_label: self.port_a_label,
            port_b_label: self.port_b_label,
            slot: self.slot,
            active: self.active,
        })
    }
}
