//! Installation records: when a walk-through started and how it ended.

use jiff::Timestamp;
use rusqlite::OptionalExtension;
use tracing::info;
use uuid::Uuid;

use crate::model::{Installation, InstallationStatus};

use super::{Result, Storage, StorageError, parse_id};

type InstallationRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

impl Storage {
    /// Records the start of an installation on `machine_id`.
    pub fn start_installation(&self, machine_id: &str) -> Result<Installation> {
        let installation = Installation {
            id: Uuid::new_v4(),
            machine_id: machine_id.to_string(),
            started_at: Timestamp::now(),
            status: InstallationStatus::Active,
        };
        let (status, completed_at, attachment_id) = serialize_status(&installation.status);
        self.open()?.execute(
            "INSERT INTO installations
                 (id, machine_id, started_at, status, completed_at, attachment_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                installation.id.to_string(),
                &installation.machine_id,
                installation.started_at.to_string(),
                status,
                completed_at,
                attachment_id,
            ],
        )?;
        info!(id = %installation.id, machine = machine_id, "installation started");
        Ok(installation)
    }

    /// Marks an installation completed, remembering the attachment it resolved to.
    pub fn complete_installation(
        &self,
        id: Uuid,
        attachment_id: Option<&str>,
    ) -> Result<Installation> {
        let mut installation = self.load_installation(id)?;
        if let InstallationStatus::Completed { .. } = installation.status {
            return Err(StorageError::Invalid(format!(
                "installation {id} is already completed"
            )));
        }
        installation.status = InstallationStatus::Completed {
            completed_at: Timestamp::now(),
            attachment_id: attachment_id.map(String::from),
        };
        let (status, completed_at, attachment_id) = serialize_status(&installation.status);
        self.open()?.execute(
            "UPDATE installations SET status = ?1, completed_at = ?2, attachment_id = ?3
             WHERE id = ?4",
            rusqlite::params![status, completed_at, attachment_id, id.to_string()],
        )?;
        info!(%id, "installation completed");
        Ok(installation)
    }

    /// Loads a single installation record.
    pub fn load_installation(&self, id: Uuid) -> Result<Installation> {
        let row = self
            .open()?
            .query_row(
                "SELECT id, machine_id, started_at, status, completed_at, attachment_id
                 FROM installations WHERE id = ?1",
                [id.to_string()],
                read_row,
            )
            .optional()?;
        let row = row.ok_or(StorageError::NotFound {
            kind: "installation",
            id,
        })?;
        into_installation(row)
    }

    /// Lists installation records, oldest first, optionally for one machine.
    pub fn list_installations(&self, machine_id: Option<&str>) -> Result<Vec<Installation>> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, machine_id, started_at, status, completed_at, attachment_id
             FROM installations WHERE ?1 IS NULL OR machine_id = ?1",
        )?;
        let rows = stmt.query_map([machine_id], read_row)?;
        let mut installations = rows
            .map(|row| into_installation(row?))
            .collect::<Result<Vec<_>>>()?;
        installations.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(installations)
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstallationRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_installation(row: InstallationRow) -> Result<Installation> {
    let (id, machine_id, started_at, status, completed_at, attachment_id) = row;
    let started_at = started_at
        .parse::<Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid started_at: {e}")))?;
    Ok(Installation {
        id: parse_id(&id, "installation id")?,
        machine_id,
        started_at,
        status: deserialize_status(&status, completed_at.as_deref(), attachment_id)?,
    })
}

/// Converts an `InstallationStatus` to column values.
fn serialize_status(status: &InstallationStatus) -> (&'static str, Option<String>, Option<String>) {
    match status {
        InstallationStatus::Active => ("active", None, None),
        InstallationStatus::Completed {
            completed_at,
            attachment_id,
        } => (
            "completed",
            Some(completed_at.to_string()),
            attachment_id.clone(),
        ),
    }
}

/// Reconstructs an `InstallationStatus` from column values.
fn deserialize_status(
    status: &str,
    completed_at: Option<&str>,
    attachment_id: Option<String>,
) -> Result<InstallationStatus> {
    match status {
        "active" => Ok(InstallationStatus::Active),
        "completed" => {
            let completed_at = completed_at
                .ok_or_else(|| {
                    StorageError::Corrupt("installation is completed but completed_at is null".into())
                })?
                .parse::<Timestamp>()
                .map_err(|e| StorageError::Corrupt(format!("invalid completed_at: {e}")))?;
            Ok(InstallationStatus::Completed {
                completed_at,
                attachment_id,
            })
        }
        other => Err(StorageError::Corrupt(format!(
            "unknown installation status: {other}"
        ))),
    }
}
