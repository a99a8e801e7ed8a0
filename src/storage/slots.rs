//! Slot allocation: dense 1-based ordering among sibling records.
//!
//! Every ordered catalog list (machine inputs, attachment hoses, valves,
//! hose couplings) keeps a `slot` column that is a permutation of `1..=N`
//! within its ordering scope once inserts and moves have settled.
//! Deleting a record leaves a gap; only inserts and moves renumber.
//!
//! The functions here run inside a caller-owned immediate transaction
//! (see [`Storage::write_in_scope`](super::Storage)), so the
//! shift-then-place sequence is atomic with respect to other writers.

use std::fmt;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tracing::debug;
use uuid::Uuid;

use crate::model::PortRole;

use super::{Result, StorageError};

/// The set of sibling records that share one slot sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrderingScope {
    /// Hydraulic inputs of one machine.
    MachineInputs { machine_id: String },

    /// Hydraulic hoses of one attachment.
    AttachmentHoses { attachment_id: String },

    /// Valve definitions of one machine.
    Valves { machine_id: String },

    /// Hose-coupling instructions of one machine, optionally narrowed to an attachment.
    Couplings {
        machine_id: String,
        attachment_id: Option<String>,
    },
}

impl OrderingScope {
    /// The ordering scope a port belongs to.
    pub fn for_port(role: PortRole, owner_id: &str) -> Self {
        match role {
            PortRole::Input => Self::MachineInputs {
                machine_id: owner_id.to_string(),
            },
            PortRole::Hose => Self::AttachmentHoses {
                attachment_id: owner_id.to_string(),
            },
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Self::MachineInputs { .. } | Self::AttachmentHoses { .. } => "hydraulic_ports",
            Self::Valves { .. } => "valves",
            Self::Couplings { .. } => "hose_couplings",
        }
    }

    /// Column/value pairs that select the scope's rows.
    fn columns(&self) -> Vec<(&'static str, Option<&str>)> {
        match self {
            Self::MachineInputs { machine_id } => {
                vec![("role", Some("input")), ("owner_id", Some(machine_id))]
            }
            Self::AttachmentHoses { attachment_id } => {
                vec![("role", Some("hose")), ("owner_id", Some(attachment_id))]
            }
            Self::Valves { machine_id } => vec![("machine_id", Some(machine_id))],
            Self::Couplings {
                machine_id,
                attachment_id,
            } => vec![
                ("machine_id", Some(machine_id)),
                ("attachment_id", attachment_id.as_deref()),
            ],
        }
    }

    /// `WHERE` clause for the scope. Placeholders are `?1..?k`; the next free
    /// placeholder index is returned alongside.
    fn filter(&self) -> (String, usize) {
        let columns = self.columns();
        // `IS` rather than `=` so a NULL attachment id selects unscoped couplings.
        let clause = columns
            .iter()
            .enumerate()
            .map(|(i, (column, _))| format!("{column} IS ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(" AND ");
        (clause, columns.len() + 1)
    }

    /// Scope values followed by `extra`, matching the placeholders of [`Self::filter`].
    fn bind(&self, extra: &[i64]) -> Vec<Value> {
        self.columns()
            .into_iter()
            .map(|(_, value)| value.map_or(Value::Null, |v| Value::Text(v.to_string())))
            .chain(extra.iter().map(|&n| Value::Integer(n)))
            .collect()
    }
}

impl fmt::Display for OrderingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MachineInputs { machine_id } => write!(f, "inputs of machine {machine_id}"),
            Self::AttachmentHoses { attachment_id } => {
                write!(f, "hoses of attachment {attachment_id}")
            }
            Self::Valves { machine_id } => write!(f, "valves of machine {machine_id}"),
            Self::Couplings {
                machine_id,
                attachment_id: Some(attachment_id),
            } => write!(
                f,
                "couplings of machine {machine_id} for attachment {attachment_id}"
            ),
            Self::Couplings {
                machine_id,
                attachment_id: None,
            } => write!(f, "couplings of machine {machine_id}"),
        }
    }
}

/// Reserves `requested` (or the append position) for a new record.
///
/// Siblings at or after the requested slot move up by one. The caller
/// inserts the new row with the returned slot in the same transaction.
pub(super) fn allocate_insert(
    conn: &Connection,
    scope: &OrderingScope,
    requested: Option<u32>,
) -> Result<u32> {
    let append = max_slot(conn, scope)? + 1;
    let slot = requested.unwrap_or(append);
    check_bounds(slot, append)?;

    shift_up(conn, scope, slot)?;
    debug_assert!(
        !slots(conn, scope)?.contains(&slot),
        "slot {slot} still taken after shifting {scope}"
    );
    debug!(%scope, slot, "allocated slot");
    Ok(slot)
}

/// Moves record `id` to `new_slot`, renumbering its siblings.
///
/// Closes the gap at the old position first, then opens one at the new
/// position. On error the surrounding transaction is expected to roll back.
pub(super) fn allocate_move(
    conn: &Connection,
    scope: &OrderingScope,
    id: Uuid,
    new_slot: u32,
) -> Result<u32> {
    if new_slot < 1 {
        return Err(StorageError::InvalidSlotRequest {
            requested: new_slot,
            max: max_slot(conn, scope)?.max(1),
        });
    }

    let (clause, next) = scope.filter();
    let table = scope.table();
    let old_slot: Option<u32> = conn
        .query_row(
            &format!("SELECT slot FROM {table} WHERE {clause} AND id = ?{next}"),
            params_from_iter(
                scope
                    .bind(&[])
                    .into_iter()
                    .chain([Value::Text(id.to_string())]),
            ),
            |row| row.get(0),
        )
        .optional()?;
    let old_slot = old_slot.ok_or(StorageError::NotFound { kind: "record", id })?;

    // Park the record outside the sequence while the siblings are renumbered.
    set_slot(conn, table, id, 0)?;
    close_gap(conn, scope, old_slot)?;

    let append = max_slot(conn, scope)? + 1;
    check_bounds(new_slot, append)?;
    shift_up(conn, scope, new_slot)?;
    set_slot(conn, table, id, new_slot)?;

    debug!(%scope, %id, from = old_slot, to = new_slot, "moved record");
    Ok(new_slot)
}

/// All slots in the scope, ascending.
pub(super) fn slots(conn: &Connection, scope: &OrderingScope) -> Result<Vec<u32>> {
    let (clause, _) = scope.filter();
    let mut stmt = conn.prepare(&format!(
        "SELECT slot FROM {} WHERE {clause} ORDER BY slot",
        scope.table()
    ))?;
    let rows = stmt.query_map(params_from_iter(scope.bind(&[])), |row| row.get(0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<u32>>>()?)
}

fn check_bounds(requested: u32, append: u32) -> Result<()> {
    if requested < 1 || requested > append {
        return Err(StorageError::InvalidSlotRequest {
            requested,
            max: append,
        });
    }
    Ok(())
}

fn max_slot(conn: &Connection, scope: &OrderingScope) -> Result<u32> {
    let (clause, _) = scope.filter();
    let max: u32 = conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(slot), 0) FROM {} WHERE {clause}",
            scope.table()
        ),
        params_from_iter(scope.bind(&[])),
        |row| row.get(0),
    )?;
    Ok(max)
}

/// Adds one to every sibling slot `>= from`.
///
/// Goes through negative values so the per-scope unique index never sees
/// two rows on the same slot mid-update.
fn shift_up(conn: &Connection, scope: &OrderingScope, from: u32) -> Result<()> {
    let (clause, next) = scope.filter();
    let table = scope.table();
    conn.execute(
        &format!("UPDATE {table} SET slot = -(slot + 1) WHERE {clause} AND slot >= ?{next}"),
        params_from_iter(scope.bind(&[i64::from(from)])),
    )?;
    restore_sign(conn, scope)
}

/// Subtracts one from every sibling slot `> after`.
fn close_gap(conn: &Connection, scope: &OrderingScope, after: u32) -> Result<()> {
    let (clause, next) = scope.filter();
    let table = scope.table();
    conn.execute(
        &format!("UPDATE {table} SET slot = -(slot - 1) WHERE {clause} AND slot > ?{next}"),
        params_from_iter(scope.bind(&[i64::from(after)])),
    )?;
    restore_sign(conn, scope)
}

fn restore_sign(conn: &Connection, scope: &OrderingScope) -> Result<()> {
    let (clause, _) = scope.filter();
    conn.execute(
        &format!(
            "UPDATE {} SET slot = -slot WHERE {clause} AND slot < 0",
            scope.table()
        ),
        params_from_iter(scope.bind(&[])),
    )?;
    Ok(())
}

fn set_slot(conn: &Connection, table: &str, id: Uuid, slot: u32) -> Result<()> {
    conn.execute(
        &format!("UPDATE {table} SET slot = ?1 WHERE id = ?2"),
        rusqlite::params![slot, id.to_string()],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::thread;

    use tempfile::TempDir;

    use crate::model::HoseColor;
    use crate::storage::Storage;

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("catalog.sqlite")).unwrap();
        (dir, storage)
    }

    fn input_scope() -> OrderingScope {
        OrderingScope::MachineInputs {
            machine_id: "tractor-1".into(),
        }
    }

    fn scope_slots(storage: &Storage, scope: &OrderingScope) -> Vec<u32> {
        let conn = storage.open().unwrap();
        slots(&conn, scope).unwrap()
    }

    fn add_input(storage: &Storage, number: u32, slot: Option<u32>) -> Uuid {
        storage
            .add_port(PortRole::Input, "tractor-1", number, HoseColor::Red, slot)
            .unwrap()
            .id
    }

    #[test]
    fn append_when_slot_omitted() {
        let (_dir, storage) = test_storage();
        add_input(&storage, 1, None);
        add_input(&storage, 2, None);
        add_input(&storage, 3, None);

        assert_eq!(scope_slots(&storage, &input_scope()), vec![1, 2, 3]);
    }

    #[test]
    fn insert_shifts_later_siblings() {
        let (_dir, storage) = test_storage();
        let first = add_input(&storage, 1, None);
        let second = add_input(&storage, 2, None);
        let inserted = add_input(&storage, 3, Some(1));

        assert_eq!(storage.load_port(inserted).unwrap().slot, 1);
        assert_eq!(storage.load_port(first).unwrap().slot, 2);
        assert_eq!(storage.load_port(second).unwrap().slot, 3);
    }

    #[test]
    fn insert_rejects_slot_zero_without_mutation() {
        let (_dir, storage) = test_storage();
        add_input(&storage, 1, None);

        let err = storage
            .add_port(PortRole::Input, "tractor-1", 2, HoseColor::Blue, Some(0))
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::InvalidSlotRequest { requested: 0, .. }
        ));
        assert_eq!(scope_slots(&storage, &input_scope()), vec![1]);
    }

    #[test]
    fn insert_rejects_slot_past_append_position() {
        let (_dir, storage) = test_storage();
        add_input(&storage, 1, None);

        let err = storage
            .add_port(PortRole::Input, "tractor-1", 2, HoseColor::Blue, Some(5))
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::InvalidSlotRequest {
                requested: 5,
                max: 2
            }
        ));
    }

    #[test]
    fn move_forward_and_back_keeps_sequence_dense() {
        let (_dir, storage) = test_storage();
        let ids: Vec<Uuid> = (1..=4).map(|n| add_input(&storage, n, None)).collect();

        storage.move_port(ids[0], 4).unwrap();
        assert_eq!(storage.load_port(ids[0]).unwrap().slot, 4);
        assert_eq!(storage.load_port(ids[1]).unwrap().slot, 1);
        assert_eq!(scope_slots(&storage, &input_scope()), vec![1, 2, 3, 4]);

        storage.move_port(ids[3], 1).unwrap();
        assert_eq!(storage.load_port(ids[3]).unwrap().slot, 1);
        assert_eq!(scope_slots(&storage, &input_scope()), vec![1, 2, 3, 4]);
    }

    #[test]
    fn move_rejection_rolls_back() {
        let (_dir, storage) = test_storage();
        let ids: Vec<Uuid> = (1..=3).map(|n| add_input(&storage, n, None)).collect();

        let err = storage.move_port(ids[0], 9).unwrap_err();
        assert!(matches!(err, StorageError::InvalidSlotRequest { .. }));
        assert_eq!(storage.load_port(ids[0]).unwrap().slot, 1);
        assert_eq!(scope_slots(&storage, &input_scope()), vec![1, 2, 3]);

        let err = storage.move_port(ids[0], 0).unwrap_err();
        assert!(matches!(err, StorageError::InvalidSlotRequest { .. }));
    }

    #[test]
    fn delete_leaves_gap_and_later_inserts_stay_unique() {
        let (_dir, storage) = test_storage();
        let ids: Vec<Uuid> = (1..=3).map(|n| add_input(&storage, n, None)).collect();

        storage.delete_port(ids[1]).unwrap();
        assert_eq!(scope_slots(&storage, &input_scope()), vec![1, 3]);

        add_input(&storage, 4, None);
        assert_eq!(scope_slots(&storage, &input_scope()), vec![1, 3, 4]);
    }

    #[test]
    fn mixed_inserts_and_moves_stay_dense() {
        let (_dir, storage) = test_storage();
        let mut ids = Vec::new();
        // Deterministic pseudo-random walk over valid targets.
        let mut seed: u32 = 7;
        for n in 1..=12 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let count = u32::try_from(ids.len()).unwrap();
            let target = seed % (count + 1) + 1;
            ids.push(add_input(&storage, n, Some(target)));

            if n % 3 == 0 {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                let victim = ids[(seed as usize) % ids.len()];
                let count = u32::try_from(ids.len()).unwrap();
                storage.move_port(victim, seed % count + 1).unwrap();
            }
        }

        let expected: Vec<u32> = (1..=12).collect();
        assert_eq!(scope_slots(&storage, &input_scope()), expected);
    }

    #[test]
    fn scopes_are_independent() {
        let (_dir, storage) = test_storage();
        add_input(&storage, 1, None);
        storage
            .add_port(PortRole::Input, "tractor-2", 1, HoseColor::Red, None)
            .unwrap();
        storage
            .add_port(PortRole::Hose, "tractor-1", 1, HoseColor::Red, None)
            .unwrap();

        assert_eq!(scope_slots(&storage, &input_scope()), vec![1]);
        assert_eq!(
            scope_slots(
                &storage,
                &OrderingScope::AttachmentHoses {
                    attachment_id: "tractor-1".into()
                }
            ),
            vec![1]
        );
    }

    #[test]
    fn concurrent_inserts_at_same_slot_stay_dense() {
        let (_dir, storage) = test_storage();
        let storage = Arc::new(storage);

        let handles: Vec<_> = (1..=8)
            .map(|n| {
                let storage = Arc::clone(&storage);
                thread::spawn(move || {
                    storage
                        .add_port(PortRole::Input, "tractor-1", n, HoseColor::Green, Some(1))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let expected: Vec<u32> = (1..=8).collect();
        assert_eq!(scope_slots(&storage, &input_scope()), expected);
    }

    #[test]
    fn scope_display_names_the_owner() {
        let scope = OrderingScope::Couplings {
            machine_id: "tractor-1".into(),
            attachment_id: Some("mower-3".into()),
        };
        assert_eq!(
            scope.to_string(),
            "couplings of machine tractor-1 for attachment mower-3"
        );
    }
}
