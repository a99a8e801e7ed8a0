//! Valve commands: add, list, move, delete.

use clap::{Subcommand, ValueEnum};
use uuid::Uuid;

use crate::model::{HoseColor, Valve, ValveKind, ValvePosition};
use crate::storage::{RecordKind, Storage};

use super::format::{format_valve, short_id};
use super::resolve_id;

#[derive(Debug, Subcommand)]
pub enum ValveCommand {
    /// Add a valve. Prints the new valve's ID.
    Add {
        machine: String,

        /// Label on the machine (e.g. `V1`).
        #[arg(long)]
        number: String,

        /// What the valve drives (e.g. "Front loader").
        #[arg(long)]
        function: String,

        #[arg(long, value_enum)]
        position: ValvePositionArg,

        #[arg(long, value_enum)]
        kind: ValveKindArg,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        color: Option<HoseColor>,

        #[arg(long, default_value = "A")]
        port_a: String,

        #[arg(long, default_value = "B")]
        port_b: String,

        /// Position in the machine's list. Appends when omitted.
        #[arg(long)]
        slot: Option<u32>,

        /// Record the valve as not in use.
        #[arg(long)]
        inactive: bool,
    },

    /// List a machine's valves in slot order.
    List { machine: String },

    /// Move a valve to another slot.
    Move {
        /// Valve ID: full UUID or unambiguous prefix.
        id: String,
        slot: u32,
    },

    /// Delete a valve. Couplings that referenced it keep no valve.
    Delete {
        /// Valve ID: full UUID or unambiguous prefix.
        id: String,
    },
}

/// CLI-facing valve position, mapped to the domain `ValvePosition`.
#[derive(Debug, Clone, ValueEnum)]
pub enum ValvePositionArg {
    Front,
    Rear,
}

impl ValvePositionArg {
    fn to_domain(&self) -> ValvePosition {
        match self {
            Self::Front => ValvePosition::Front,
            Self::Rear => ValvePosition::Rear,
        }
    }
}

/// CLI-facing valve kind, mapped to the domain `ValveKind`.
#[derive(Debug, Clone, ValueEnum)]
pub enum ValveKindArg {
    SingleActing,
    DoubleActing,
    PowerBeyond,
}

impl ValveKindArg {
    fn to_domain(&self) -> ValveKind {
        match self {
            Self::SingleActing => ValveKind::SingleActing,
            Self::DoubleActing => ValveKind::DoubleActing,
            Self::PowerBeyond => ValveKind::PowerBeyond,
        }
    }
}

pub(super) fn run(storage: &Storage, command: ValveCommand) -> Result<(), String> {
    match command {
        ValveCommand::Add {
            machine,
            number,
            function,
            position,
            kind,
            description,
            color,
            port_a,
            port_b,
            slot,
            inactive,
        } => {
            let valve = Valve {
                id: Uuid::new_v4(),
                machine_id: machine,
                number,
                function_name: function,
                position: position.to_domain(),
                kind: kind.to_domain(),
                description,
                color,
                port_a_label: port_a,
                port_b_label: port_b,
                slot: 0,
                active: !inactive,
            };
            let stored = storage
                .add_valve(&valve, slot)
                .map_err(|e| format!("failed to add valve: {e}"))?;
            println!("{}", stored.id);
            eprintln!("Added valve {} at slot {}", stored.number, stored.slot);
            Ok(())
        }
        ValveCommand::List { machine } => {
            let valves = storage
                .list_valves(&machine)
                .map_err(|e| format!("failed to list valves: {e}"))?;
            if valves.is_empty() {
                println!("No valves for {machine}");
            }
            for valve in &valves {
                println!("{}", format_valve(valve));
            }
            Ok(())
        }
        ValveCommand::Move { id, slot } => {
            let id = resolve_id(storage, RecordKind::Valve, &id)?;
            let valve = storage
                .move_valve(id, slot)
                .map_err(|e| format!("failed to move valve: {e}"))?;
            eprintln!("Moved valve {} to slot {}", valve.number, valve.slot);
            Ok(())
        }
        ValveCommand::Delete { id } => {
            let id = resolve_id(storage, RecordKind::Valve, &id)?;
            storage
                .delete_valve(id)
                .map_err(|e| format!("failed to delete valve: {e}"))?;
            eprintln!("Deleted valve {}", short_id(id));
            Ok(())
        }
    }
}
