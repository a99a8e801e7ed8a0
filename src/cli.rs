//! CLI interface for Hydrolink.
//!
//! Commands split into three groups:
//!
//! - Catalog upkeep: `input`, `hose`, `valve`, `coupling`, `step`. Arguments in,
//!   one line per record out.
//! - Workshop flow: `match` prints candidate connections, `verify` walks the
//!   technician through confirming them, `install run` steps through the
//!   machine's installation instructions with the sensor live.
//! - `sensor status|tags` for checking the bridge.
//!
//! Records are addressed by full UUID or unambiguous prefix.

mod couplings;
mod format;
mod ports;
mod sensor;
mod session;
mod steps;
mod valves;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::config::Config;
use crate::model::PortRole;
use crate::storage::{RecordKind, Storage};

use couplings::CouplingCommand;
use format::short_id;
use ports::PortCommand;
use sensor::SensorCommand;
use session::InstallCommand;
use steps::StepCommand;
use valves::ValveCommand;

/// Hydrolink: couple implements to machines by color, verify with NFC.
#[derive(Debug, Parser)]
#[command(name = "hydrolink", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Catalog database. Overrides `database` in the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Sensor bridge URL. Overrides `HYDROLINK_BRIDGE_URL` and the config file.
    #[arg(long, global = true)]
    bridge_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: hooking up a mower
  1. hydrolink input add tractor-1 --number 1 --color red
     hydrolink hose add mower-3 --number 1 --color rood
  2. hydrolink match tractor-1 --attachment mower-3
  3. hydrolink step add tractor-1 1 "Park and depressurize"
     hydrolink step add tractor-1 2 "Connect supply hose" --signal SUPPLY_LEFT
  4. hydrolink install run tractor-1 --attachment mower-3

Sensor:
  hydrolink sensor status --expect SUPPLY_LEFT
  HYDROLINK_BRIDGE_URL=http://10.0.0.5:5000/api/nfc hydrolink sensor status"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage a machine's hydraulic inputs.
    Input {
        #[command(subcommand)]
        command: PortCommand,
    },

    /// Manage an attachment's hydraulic hoses.
    Hose {
        #[command(subcommand)]
        command: PortCommand,
    },

    /// Manage a machine's valve definitions.
    Valve {
        #[command(subcommand)]
        command: ValveCommand,
    },

    /// Manage hose-coupling instructions.
    Coupling {
        #[command(subcommand)]
        command: CouplingCommand,
    },

    /// Manage a machine's installation steps.
    Step {
        #[command(subcommand)]
        command: StepCommand,
    },

    /// Print every input/hose pair of matching color.
    ///
    /// Pure read. Several attachments may be given.
    Match {
        /// Machine whose inputs to match.
        machine: String,

        /// Attachment whose hoses to match. Repeatable.
        #[arg(long = "attachment", required = true)]
        attachments: Vec<String>,
    },

    /// Confirm each candidate connection interactively.
    ///
    /// Reads commands from stdin: a connection number toggles it,
    /// `reload` re-reads the ports, `done` finishes once everything is
    /// confirmed, `quit` aborts.
    Verify {
        /// Machine whose inputs to match.
        machine: String,

        /// Attachment whose hoses to match. Repeatable.
        #[arg(long = "attachment", required = true)]
        attachments: Vec<String>,
    },

    /// Run or review installations.
    Install {
        #[command(subcommand)]
        command: InstallCommand,
    },

    /// Query the NFC sensor bridge.
    Sensor {
        #[command(subcommand)]
        command: SensorCommand,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(cli: Cli, config: &Config) -> Result<(), String> {
    let bridge_url = config.bridge_url(cli.bridge_url.as_deref());

    // The sensor commands never touch the catalog.
    let command = match cli.command {
        Command::Sensor { command } => return sensor::run(&command, config, &bridge_url),
        other => other,
    };

    let path = cli
        .db
        .or_else(|| config.database_path())
        .ok_or("could not determine home directory")?;
    let storage =
        Storage::new(&path).map_err(|e| format!("failed to open {}: {e}", path.display()))?;

    match command {
        Command::Input { command } => ports::run(&storage, PortRole::Input, command),
        Command::Hose { command } => ports::run(&storage, PortRole::Hose, command),
        Command::Valve { command } => valves::run(&storage, command),
        Command::Coupling { command } => couplings::run(&storage, command),
        Command::Step { command } => steps::run(&storage, command),
        Command::Match {
            machine,
            attachments,
        } => session::cmd_match(&storage, &machine, &attachments),
        Command::Verify {
            machine,
            attachments,
        } => session::cmd_verify(&storage, &machine, &attachments),
        Command::Install { command } => session::run(&storage, config, &bridge_url, command),
        Command::Sensor { command } => sensor::run(&command, config, &bridge_url),
    }
}

/// Resolve a record reference (full UUID or unambiguous prefix) to an id.
fn resolve_id(storage: &Storage, kind: RecordKind, reference: &str) -> Result<Uuid, String> {
    if let Ok(id) = reference.parse::<Uuid>() {
        return Ok(id);
    }

    let matches = storage
        .ids_with_prefix(kind, reference)
        .map_err(|e| format!("failed to look up {}: {e}", kind.name()))?;

    match matches.as_slice() {
        [] => Err(format!("no {} matching '{reference}'", kind.name())),
        [id] => Ok(*id),
        _ => {
            let ids: Vec<String> = matches.iter().map(|id| short_id(*id)).collect();
            Err(format!(
                "'{reference}' is ambiguous: matches {} {}s: {}",
                matches.len(),
                kind.name(),
                ids.join(", ")
            ))
        }
    }
}
