//! Port commands, shared by `input` (machine side) and `hose` (attachment side).

use clap::Subcommand;

use crate::model::{HoseColor, PortRole};
use crate::storage::{RecordKind, Storage};

use super::format::{format_port, short_id};
use super::resolve_id;

#[derive(Debug, Subcommand)]
pub enum PortCommand {
    /// Add a port. Prints the new port's ID.
    Add {
        /// Owning machine (inputs) or attachment (hoses).
        owner: String,

        /// Number printed on the port.
        #[arg(long)]
        number: u32,

        /// Color tag: red, blue, yellow, green, black, white, orange, purple.
        #[arg(long)]
        color: HoseColor,

        /// Position in the owner's list. Appends when omitted.
        #[arg(long)]
        slot: Option<u32>,
    },

    /// List an owner's ports in slot order.
    List { owner: String },

    /// Move a port to another slot.
    Move {
        /// Port ID: full UUID or unambiguous prefix.
        id: String,
        slot: u32,
    },

    /// Change a port's number or color.
    Update {
        /// Port ID: full UUID or unambiguous prefix.
        id: String,

        #[arg(long)]
        number: Option<u32>,

        #[arg(long)]
        color: Option<HoseColor>,
    },

    /// Delete a port. Other ports keep their slots.
    Delete {
        /// Port ID: full UUID or unambiguous prefix.
        id: String,
    },
}

pub(super) fn run(storage: &Storage, role: PortRole, command: PortCommand) -> Result<(), String> {
    match command {
        PortCommand::Add {
            owner,
            number,
            color,
            slot,
        } => {
            let port = storage
                .add_port(role, &owner, number, color, slot)
                .map_err(|e| format!("failed to add {role}: {e}"))?;
            println!("{}", port.id);
            eprintln!("Added {role} #{number} ({color}) at slot {}", port.slot);
            Ok(())
        }
        PortCommand::List { owner } => cmd_list(storage, role, &owner),
        PortCommand::Move { id, slot } => {
            let id = resolve_id(storage, RecordKind::Port, &id)?;
            let port = storage
                .move_port(id, slot)
                .map_err(|e| format!("failed to move {role}: {e}"))?;
            eprintln!("Moved {} to slot {}", short_id(port.id), port.slot);
            Ok(())
        }
        PortCommand::Update { id, number, color } => {
            if number.is_none() && color.is_none() {
                return Err("specify --number and/or --color".to_string());
            }
            let id = resolve_id(storage, RecordKind::Port, &id)?;
            let port = storage
                .update_port(id, number, color)
                .map_err(|e| format!("failed to update {role}: {e}"))?;
            println!("{}", format_port(&port));
            Ok(())
        }
        PortCommand::Delete { id } => {
            let id = resolve_id(storage, RecordKind::Port, &id)?;
            storage
                .delete_port(id)
                .map_err(|e| format!("failed to delete {role}: {e}"))?;
            eprintln!("Deleted {}", short_id(id));
            Ok(())
        }
    }
}

fn cmd_list(storage: &Storage, role: PortRole, owner: &str) -> Result<(), String> {
    let ports = storage
        .list_ports(role, owner)
        .map_err(|e| format!("failed to list {role}s: {e}"))?;

    if ports.is_empty() {
        println!("No {role}s for {owner}");
        return Ok(());
    }

    for port in &ports {
        println!("{}", format_port(port));
    }
    Ok(())
}
