//! Installation-step storage.

use rusqlite::{ErrorCode, Row};
use tracing::info;
use uuid::Uuid;

use crate::model::InstallationStep;

use super::{Result, Storage, StorageError, parse_id};

impl Storage {
    /// Adds a step to a machine's walk-through.
    ///
    /// Step numbers must be unique per machine; a duplicate is rejected.
    pub fn add_step(&self, step: &InstallationStep) -> Result<()> {
        if step.title.trim().is_empty() {
            return Err(StorageError::Invalid("step title cannot be empty".into()));
        }
        if step.requires_signal && step.signal_position.is_none() {
            return Err(StorageError::Invalid(format!(
                "step {} requires a signal but names no signal position",
                step.step_number
            )));
        }

        let result = self.open()?.execute(
            "INSERT INTO installation_steps
                 (id, machine_id, step_number, title, description, image,
                  requires_signal, signal_position)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                step.id.to_string(),
                &step.owner_id,
                step.step_number,
                &step.title,
                &step.description,
                &step.image,
                step.requires_signal,
                &step.signal_position,
            ],
        );
        match result {
            Ok(_) => {}
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                return Err(StorageError::Invalid(format!(
                    "machine {} already has a step {}",
                    step.owner_id, step.step_number
                )));
            }
            Err(e) => return Err(e.into()),
        }
        info!(id = %step.id, machine = %step.owner_id, step = step.step_number, "added step");
        Ok(())
    }

    /// Deletes a step.
    pub fn delete_step(&self, id: Uuid) -> Result<()> {
        let rows = self
            .open()?
            .execute("DELETE FROM installation_steps WHERE id = ?1", [id.to_string()])?;
        if rows == 0 {
            return Err(StorageError::NotFound { kind: "step", id });
        }
        Ok(())
    }

    /// Lists a machine's steps ordered by step number.
    pub fn list_steps(&self, machine_id: &str) -> Result<Vec<InstallationStep>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, machine_id, step_number, title, description, image,
                    requires_signal, signal_position
             FROM installation_steps WHERE machine_id = ?1 ORDER BY step_number",
        )?;
        let rows = stmt.query_map([machine_id], read_step)?;
        rows.map(|row| -> Result<InstallationStep> {
            let (id, step) = row?;
            Ok(InstallationStep {
                id: parse_id(&id, "step id")?,
                ..step
            })
        })
        .collect()
    }
}

/// Reads a step row; the id is returned unparsed alongside a placeholder.
fn read_step(row: &Row<'_>) -> rusqlite::Result<(String, InstallationStep)> {
    Ok((
        row.get(0)?,
        InstallationStep {
            id: Uuid::nil(),
            owner_id: row.get(1)?,
            step_number: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            image: row.get(5)?,
            requires_signal: row.get(6)?,
            signal_position: row.get(7)?,
        },
    ))
}
