//! Hose-coupling commands: add, list, move, delete.

use clap::{Subcommand, ValueEnum};
use uuid::Uuid;

use crate::model::{ConnectionType, CouplingPort, HoseColor, HoseCoupling};
use crate::storage::{RecordKind, Storage};

use super::format::{format_coupling, short_id};
use super::resolve_id;

#[derive(Debug, Subcommand)]
pub enum CouplingCommand {
    /// Add a coupling instruction. Prints the new coupling's ID.
    Add {
        machine: String,

        /// Limit the instruction to one attachment.
        #[arg(long)]
        attachment: Option<String>,

        #[arg(long)]
        hose_number: u32,

        #[arg(long)]
        color: HoseColor,

        /// Short label on the hose (e.g. "Lift").
        #[arg(long)]
        label: String,

        /// Valve the hose lands on: full UUID or unambiguous prefix.
        #[arg(long)]
        valve: Option<String>,

        #[arg(long, value_enum)]
        port: CouplingPortArg,

        #[arg(long)]
        function: String,

        /// What the technician should do.
        #[arg(long)]
        instruction: String,

        #[arg(long, value_enum)]
        connection_type: ConnectionTypeArg,

        /// Pressure rating in bar (0 to 350).
        #[arg(long)]
        pressure: u32,

        /// Flow rating in l/min (0 to 200).
        #[arg(long)]
        flow: u32,

        /// Position in the list. Appends when omitted.
        #[arg(long)]
        slot: Option<u32>,
    },

    /// List coupling instructions in slot order.
    ///
    /// Without `--attachment`, lists the machine's general instructions.
    List {
        machine: String,

        #[arg(long)]
        attachment: Option<String>,
    },

    /// Move a coupling instruction to another slot.
    Move {
        /// Coupling ID: full UUID or unambiguous prefix.
        id: String,
        slot: u32,
    },

    /// Delete a coupling instruction.
    Delete {
        /// Coupling ID: full UUID or unambiguous prefix.
        id: String,
    },
}

/// CLI-facing valve port, mapped to the domain `CouplingPort`.
#[derive(Debug, Clone, ValueEnum)]
pub enum CouplingPortArg {
    A,
    B,
    /// Pressure.
    P,
    /// Tank.
    T,
}

impl CouplingPortArg {
    fn to_domain(&self) -> CouplingPort {
        match self {
            Self::A => CouplingPort::A,
            Self::B => CouplingPort::B,
            Self::P => CouplingPort::P,
            Self::T => CouplingPort::T,
        }
    }
}

/// CLI-facing connection type, mapped to the domain `ConnectionType`.
#[derive(Debug, Clone, ValueEnum)]
pub enum ConnectionTypeArg {
    SingleActing,
    DoubleActing,
    HighFlow,
    LowFlow,
}

impl ConnectionTypeArg {
    fn to_domain(&self) -> ConnectionType {
        match self {
            Self::SingleActing => ConnectionType::SingleActing,
            Self::DoubleActing => ConnectionType::DoubleActing,
            Self::HighFlow => ConnectionType::HighFlow,
            Self::LowFlow => ConnectionType::LowFlow,
        }
    }
}

pub(super) fn run(storage: &Storage, command: CouplingCommand) -> Result<(), String> {
    match command {
        CouplingCommand::Add {
            machine,
            attachment,
            hose_number,
            color,
            label,
            valve,
            port,
            function,
            instruction,
            connection_type,
            pressure,
            flow,
            slot,
        } => {
            let valve_id = valve
                .map(|reference| resolve_id(storage, RecordKind::Valve, &reference))
                .transpose()?;
            let coupling = HoseCoupling {
                id: Uuid::new_v4(),
                machine_id: machine,
                attachment_id: attachment,
                hose_number,
                hose_color: color,
                hose_label: label,
                valve_id,
                port: port.to_domain(),
                function_description: function,
                instruction,
                connection_type: connection_type.to_domain(),
                pressure_rating_bar: pressure,
                flow_rating_lpm: flow,
                slot: 0,
            };
            let stored = storage
                .add_coupling(&coupling, slot)
                .map_err(|e| format!("failed to add coupling: {e}"))?;
            println!("{}", stored.id);
            eprintln!("Added coupling for hose {} at slot {}", hose_number, stored.slot);
            Ok(())
        }
        CouplingCommand::List {
            machine,
            attachment,
        } => {
            let couplings = storage
                .list_couplings(&machine, attachment.as_deref())
                .map_err(|e| format!("failed to list couplings: {e}"))?;
            if couplings.is_empty() {
                println!("No couplings");
            }
            for coupling in &couplings {
                println!("{}", format_coupling(coupling));
            }
            Ok(())
        }
        CouplingCommand::Move { id, slot } => {
            let id = resolve_id(storage, RecordKind::Coupling, &id)?;
            let coupling = storage
                .move_coupling(id, slot)
                .map_err(|e| format!("failed to move coupling: {e}"))?;
            eprintln!("Moved {} to slot {}", short_id(coupling.id), coupling.slot);
            Ok(())
        }
        CouplingCommand::Delete { id } => {
            let id = resolve_id(storage, RecordKind::Coupling, &id)?;
            storage
                .delete_coupling(id)
                .map_err(|e| format!("failed to delete coupling: {e}"))?;
            eprintln!("Deleted coupling {}", short_id(id));
            Ok(())
        }
    }
}
