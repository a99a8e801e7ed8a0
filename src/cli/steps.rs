//! Installation-step commands: add, list, delete.

use clap::Subcommand;
use uuid::Uuid;

use crate::model::InstallationStep;
use crate::storage::{RecordKind, Storage};

use super::format::{format_step, short_id};
use super::resolve_id;

#[derive(Debug, Subcommand)]
pub enum StepCommand {
    /// Add a step to a machine's walk-through. Prints the step's ID.
    Add {
        machine: String,

        /// Unique per machine; steps run in ascending order.
        step_number: u32,

        title: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Illustration reference, shown as-is.
        #[arg(long)]
        image: Option<String>,

        /// Tag id the sensor must read (e.g. `SUPPLY_LEFT`).
        ///
        /// Only gates progress when this is the machine's last step.
        #[arg(long)]
        signal: Option<String>,
    },

    /// List a machine's steps.
    List { machine: String },

    /// Delete a step.
    Delete {
        /// Step ID: full UUID or unambiguous prefix.
        id: String,
    },
}

pub(super) fn run(storage: &Storage, command: StepCommand) -> Result<(), String> {
    match command {
        StepCommand::Add {
            machine,
            step_number,
            title,
            description,
            image,
            signal,
        } => {
            let step = InstallationStep {
                id: Uuid::new_v4(),
                owner_id: machine,
                step_number,
                title,
                description,
                image,
                requires_signal: signal.is_some(),
                signal_position: signal.map(|s| s.to_ascii_uppercase()),
            };
            storage
                .add_step(&step)
                .map_err(|e| format!("failed to add step: {e}"))?;
            println!("{}", step.id);
            Ok(())
        }
        StepCommand::List { machine } => {
            let steps = storage
                .list_steps(&machine)
                .map_err(|e| format!("failed to list steps: {e}"))?;
            if steps.is_empty() {
                println!("No steps for {machine}");
            }
            for step in &steps {
                println!("{}  {}", short_id(step.id), format_step(step));
            }
            Ok(())
        }
        StepCommand::Delete { id } => {
            let id = resolve_id(storage, RecordKind::Step, &id)?;
            storage
                .delete_step(id)
                .map_err(|e| format!("failed to delete step: {e}"))?;
            eprintln!("Deleted step {}", short_id(id));
            Ok(())
        }
    }
}
