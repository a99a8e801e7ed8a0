//! Workshop flow: match, verify, and install.
//!
//! The interactive loops read commands line by line and write to any
//! `Write`, so they run against stdin/stdout here and against buffers in
//! tests.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Subcommand;

use crate::checklist::VerificationChecklist;
use crate::config::Config;
use crate::install::{Advance, InstallationSession, SessionState, SignalSource};
use crate::matching;
use crate::model::{HydraulicPort, PortRole};
use crate::sensor::{HttpBridge, NfcPoller};
use crate::storage::{RecordKind, Storage};

use super::format::{format_connection, format_installation, format_step, short_id};
use super::resolve_id;

/// Machine inputs and attachment hoses, as loaded for matching.
type PortLists = (Vec<HydraulicPort>, Vec<HydraulicPort>);

#[derive(Debug, Subcommand)]
pub enum InstallCommand {
    /// Walk through a machine's installation steps.
    ///
    /// Reads commands from stdin: `next`, `back`, `status`, `quit`.
    /// The last step, when it names a sensor tag, only passes once the
    /// sensor reads that tag.
    Run {
        machine: String,

        /// Verify connections to these attachments first. Repeatable.
        ///
        /// The attachment most confirmed connections lead to is recorded
        /// with the installation.
        #[arg(long = "attachment")]
        attachments: Vec<String>,
    },

    /// List recorded installations, oldest first.
    List {
        #[arg(long)]
        machine: Option<String>,
    },

    /// Show one installation record.
    Show {
        /// Installation ID: full UUID or unambiguous prefix.
        id: String,
    },
}

pub(super) fn run(
    storage: &Storage,
    config: &Config,
    bridge_url: &str,
    command: InstallCommand,
) -> Result<(), String> {
    match command {
        InstallCommand::Run {
            machine,
            attachments,
        } => cmd_install(storage, config, bridge_url, &machine, &attachments),
        InstallCommand::List { machine } => {
            let installations = storage
                .list_installations(machine.as_deref())
                .map_err(|e| format!("failed to list installations: {e}"))?;
            if installations.is_empty() {
                println!("No installations");
            }
            for installation in &installations {
                println!("{}", format_installation(installation));
            }
            Ok(())
        }
        InstallCommand::Show { id } => {
            let id = resolve_id(storage, RecordKind::Installation, &id)?;
            let installation = storage
                .load_installation(id)
                .map_err(|e| format!("failed to load installation: {e}"))?;
            println!("{}", format_installation(&installation));
            Ok(())
        }
    }
}

pub(super) fn cmd_match(
    storage: &Storage,
    machine: &str,
    attachments: &[String],
) -> Result<(), String> {
    let (inputs, hoses) = load_ports(storage, machine, attachments)?;
    let connections = matching::resolve(&inputs, &hoses);

    if connections.is_empty() {
        println!("No matching connections");
        return Ok(());
    }

    for (index, connection) in connections.iter().enumerate() {
        println!("{}", format_connection(index + 1, connection, false));
    }
    Ok(())
}

pub(super) fn cmd_verify(
    storage: &Storage,
    machine: &str,
    attachments: &[String],
) -> Result<(), String> {
    let mut checklist = build_checklist(storage, machine, attachments)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let reload = || load_ports(storage, machine, attachments);
    let confirmed = verify_loop(&mut checklist, reload, stdin.lock(), &mut stdout)
        .map_err(terminal_error)?;
    if !confirmed {
        return Err("verification aborted".to_string());
    }

    match checklist.resolve_primary_owner() {
        Some(owner) => println!("All connections confirmed. Primary attachment: {owner}"),
        None => println!("All connections confirmed"),
    }
    Ok(())
}

fn cmd_install(
    storage: &Storage,
    config: &Config,
    bridge_url: &str,
    machine: &str,
    attachments: &[String],
) -> Result<(), String> {
    let steps = storage
        .list_steps(machine)
        .map_err(|e| format!("failed to load steps: {e}"))?;
    if steps.is_empty() {
        return Err(format!("no installation steps for {machine}"));
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    let mut primary = None;
    if !attachments.is_empty() {
        let mut checklist = build_checklist(storage, machine, attachments)?;
        let reload = || load_ports(storage, machine, attachments);
        let confirmed = verify_loop(&mut checklist, reload, &mut input, &mut stdout)
            .map_err(terminal_error)?;
        if !confirmed {
            return Err("verification aborted".to_string());
        }
        primary = checklist.resolve_primary_owner().map(String::from);
    }

    let installation = storage
        .start_installation(machine)
        .map_err(|e| format!("failed to record installation: {e}"))?;

    let bridge = HttpBridge::new(bridge_url, config.request_timeout());
    let poller = NfcPoller::new(Arc::new(bridge), config.poller_config());
    let mut session = InstallationSession::new(poller);
    session.begin(steps).map_err(|e| e.to_string())?;

    let finished = install_loop(&mut session, &mut input, &mut stdout).map_err(terminal_error)?;
    drop(session);

    if !finished {
        println!("Installation {} left active", short_id(installation.id));
        return Ok(());
    }

    let installation = storage
        .complete_installation(installation.id, primary.as_deref())
        .map_err(|e| format!("failed to complete installation: {e}"))?;
    println!("{}", format_installation(&installation));
    Ok(())
}

fn load_ports(
    storage: &Storage,
    machine: &str,
    attachments: &[String],
) -> Result<PortLists, String> {
    let inputs = storage
        .list_ports(PortRole::Input, machine)
        .map_err(|e| format!("failed to load inputs: {e}"))?;
    let hoses = storage
        .list_hoses(attachments)
        .map_err(|e| format!("failed to load hoses: {e}"))?;
    Ok((inputs, hoses))
}

fn build_checklist(
    storage: &Storage,
    machine: &str,
    attachments: &[String],
) -> Result<VerificationChecklist, String> {
    let (inputs, hoses) = load_ports(storage, machine, attachments)?;
    let checklist = VerificationChecklist::new(&inputs, &hoses);
    if checklist.is_empty() {
        return Err(format!(
            "no matching connections between {machine} and {}",
            attachments.join(", ")
        ));
    }
    Ok(checklist)
}

fn terminal_error(e: io::Error) -> String {
    format!("terminal I/O failed: {e}")
}

/// Reads one command line. `None` at end of input.
fn read_command(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Option<String>> {
    write!(output, "> ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_ascii_lowercase()))
}

fn print_checklist(checklist: &VerificationChecklist, output: &mut impl Write) -> io::Result<()> {
    for (index, (connection, confirmed)) in checklist.entries().enumerate() {
        writeln!(output, "{}", format_connection(index + 1, connection, confirmed))?;
    }
    writeln!(
        output,
        "{} of {} confirmed",
        checklist.confirmed_count(),
        checklist.len()
    )
}

/// Runs the confirmation dialogue. Returns whether every connection was
/// confirmed; `false` when the technician quits or input ends.
///
/// `reload` re-reads the port lists; confirmations for connections that no
/// longer exist afterwards are dropped.
fn verify_loop(
    checklist: &mut VerificationChecklist,
    mut reload: impl FnMut() -> Result<PortLists, String>,
    mut input: impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    print_checklist(checklist, output)?;

    while let Some(command) = read_command(&mut input, output)? {
        match command.as_str() {
            "done" | "d" => {
                if checklist.is_complete() {
                    return Ok(true);
                }
                writeln!(
                    output,
                    "Not complete: {} of {} confirmed",
                    checklist.confirmed_count(),
                    checklist.len()
                )?;
            }
            "quit" | "q" => return Ok(false),
            "" | "list" | "l" => print_checklist(checklist, output)?,
            "reload" | "r" => match reload() {
                Ok((inputs, hoses)) => {
                    checklist.sync(&inputs, &hoses);
                    print_checklist(checklist, output)?;
                }
                Err(e) => writeln!(output, "{e}")?,
            },
            other => {
                let key = other
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|index| checklist.entries().nth(index))
                    .map(|(connection, _)| connection.key());
                match key {
                    Some(key) => {
                        checklist.toggle(key);
                        print_checklist(checklist, output)?;
                    }
                    None => writeln!(output, "No connection '{other}'")?,
                }
            }
        }
    }
    Ok(false)
}

fn print_current<S: SignalSource>(
    session: &InstallationSession<S>,
    output: &mut impl Write,
) -> io::Result<()> {
    let (SessionState::Active(index), Some(step)) = (session.state(), session.current()) else {
        return Ok(());
    };
    writeln!(output, "Step {} of {}", index + 1, session.steps().len())?;
    writeln!(output, "{}", format_step(step))?;
    if !step.description.is_empty() {
        writeln!(output, "     {}", step.description)?;
    }
    if let Some(image) = &step.image {
        writeln!(output, "     see {image}")?;
    }
    if session.current_is_gated() {
        writeln!(
            output,
            "     Waiting for the sensor to read {}",
            step.signal_position.as_deref().unwrap_or("a tag")
        )?;
    }
    Ok(())
}

/// Runs the step dialogue. Returns whether the walk-through finished.
fn install_loop<S: SignalSource>(
    session: &mut InstallationSession<S>,
    mut input: impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    print_current(session, output)?;

    while let Some(command) = read_command(&mut input, output)? {
        match command.as_str() {
            "" | "next" | "n" => match session.forward() {
                Ok(Advance::Moved { .. }) => print_current(session, output)?,
                Ok(Advance::Finished) => {
                    writeln!(output, "Installation complete")?;
                    return Ok(true);
                }
                Err(e) => writeln!(output, "{e}")?,
            },
            "back" | "b" => {
                if let Err(e) = session.back() {
                    writeln!(output, "{e}")?;
                }
                print_current(session, output)?;
            }
            "status" | "s" => match session.signal_status() {
                Some(status) => writeln!(output, "[{}] {}", status.label(), status.message())?,
                None if session.current_is_gated() => writeln!(output, "No reading yet")?,
                None => writeln!(output, "This step does not use the sensor")?,
            },
            "quit" | "q" => return Ok(false),
            other => writeln!(output, "Unknown command '{other}' (next, back, status, quit)")?,
        }
    }
    Ok(session.state() == SessionState::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use tempfile::TempDir;
    use uuid::Uuid;

    use crate::model::{HoseColor, InstallationStep};
    use crate::sensor::PollStatus;

    fn port(role: PortRole, owner: &str, number: u32, color: HoseColor) -> HydraulicPort {
        HydraulicPort {
            id: Uuid::new_v4(),
            role,
            owner_id: owner.into(),
            sequence_number: number,
            color,
            slot: number,
        }
    }

    fn two_pairs() -> PortLists {
        let inputs = vec![
            port(PortRole::Input, "tractor-1", 1, HoseColor::Red),
            port(PortRole::Input, "tractor-1", 2, HoseColor::Blue),
        ];
        let hoses = vec![
            port(PortRole::Hose, "mower-3", 1, HoseColor::Red),
            port(PortRole::Hose, "mower-3", 2, HoseColor::Blue),
        ];
        (inputs, hoses)
    }

    fn two_connections() -> VerificationChecklist {
        let (inputs, hoses) = two_pairs();
        VerificationChecklist::new(&inputs, &hoses)
    }

    fn no_reload() -> Result<PortLists, String> {
        Err("reload unavailable".to_string())
    }

    /// Reports a fixed reading while running.
    struct FixedSignal {
        reading: Option<PollStatus>,
        running: bool,
    }

    impl FixedSignal {
        fn new(reading: Option<PollStatus>) -> Self {
            Self {
                reading,
                running: false,
            }
        }
    }

    impl SignalSource for FixedSignal {
        fn start(&mut self, _expected: Option<&str>) {
            self.running = true;
        }

        fn stop(&mut self) {
            self.running = false;
        }

        fn latest(&self) -> Option<PollStatus> {
            if self.running {
                self.reading.clone()
            } else {
                None
            }
        }
    }

    fn steps() -> Vec<InstallationStep> {
        [(1, None), (2, Some("SUPPLY_LEFT"))]
            .into_iter()
            .map(|(number, signal): (u32, Option<&str>)| InstallationStep {
                id: Uuid::new_v4(),
                owner_id: "tractor-1".into(),
                step_number: number,
                title: format!("Step {number}"),
                description: String::new(),
                image: None,
                requires_signal: signal.is_some(),
                signal_position: signal.map(String::from),
            })
            .collect()
    }

    fn session(reading: Option<PollStatus>) -> InstallationSession<FixedSignal> {
        let mut session = InstallationSession::new(FixedSignal::new(reading));
        session.begin(steps()).unwrap();
        session
    }

    #[test]
    fn verify_finishes_once_everything_is_confirmed() {
        let mut checklist = two_connections();
        let mut output = Vec::new();

        let confirmed =
            verify_loop(&mut checklist, no_reload, Cursor::new("1\ndone\n2\ndone\n"), &mut output)
                .unwrap();

        assert!(confirmed);
        assert!(checklist.is_complete());
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Not complete: 1 of 2 confirmed"));
        assert!(output.contains("[x] input #2"));
    }

    #[test]
    fn verify_toggles_back_off() {
        let mut checklist = two_connections();
        let mut output = Vec::new();

        let confirmed =
            verify_loop(&mut checklist, no_reload, Cursor::new("1\n1\nquit\n"), &mut output).unwrap();

        assert!(!confirmed);
        assert_eq!(checklist.confirmed_count(), 0);
    }

    #[test]
    fn verify_rejects_unknown_numbers() {
        let mut checklist = two_connections();
        let mut output = Vec::new();

        let confirmed =
            verify_loop(&mut checklist, no_reload, Cursor::new("0\n9\nabc\nr\n"), &mut output).unwrap();

        assert!(!confirmed);
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("No connection '0'"));
        assert!(output.contains("No connection '9'"));
        assert!(output.contains("No connection 'abc'"));
        assert!(output.contains("reload unavailable"));
    }

    #[test]
    fn verify_reload_drops_vanished_confirmations() {
        let (inputs, mut hoses) = two_pairs();
        let mut checklist = VerificationChecklist::new(&inputs, &hoses);
        hoses[0].color = HoseColor::Green;
        let reload = || Ok((inputs.clone(), hoses.clone()));
        let mut output = Vec::new();

        let confirmed =
            verify_loop(&mut checklist, reload, Cursor::new("1\n2\nreload\n"), &mut output)
                .unwrap();

        assert!(!confirmed);
        assert_eq!(checklist.len(), 1);
        assert_eq!(checklist.confirmed_count(), 1);
        let output = String::from_utf8(output).unwrap();
        assert!(output.ends_with("1 of 1 confirmed\n> "));
    }

    #[test]
    fn install_passes_gate_on_detection() {
        let mut session = session(Some(PollStatus::Detected {
            tag_id: "SUPPLY_LEFT".into(),
            position: "Supply hose left".into(),
        }));
        let mut output = Vec::new();

        let script = Cursor::new("next\nstatus\nnext\n");
        let finished = install_loop(&mut session, script, &mut output).unwrap();

        assert!(finished);
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("Waiting for the sensor to read SUPPLY_LEFT"));
        assert!(output.contains("[connected&detected]"));
        assert!(output.contains("Installation complete"));
    }

    #[test]
    fn install_holds_at_gate_without_detection() {
        let mut session = session(Some(PollStatus::Waiting));
        let mut output = Vec::new();

        let script = Cursor::new("next\nnext\nquit\n");
        let finished = install_loop(&mut session, script, &mut output).unwrap();

        assert!(!finished);
        assert_eq!(session.state(), SessionState::Active(1));
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("not confirmed this step: Waiting for a tag"));
    }

    #[test]
    fn install_back_returns_to_previous_step() {
        let mut session = session(None);
        let mut output = Vec::new();

        let script = Cursor::new("n\nb\nstatus\n");
        let finished = install_loop(&mut session, script, &mut output).unwrap();

        assert!(!finished);
        assert_eq!(session.state(), SessionState::Active(0));
        let output = String::from_utf8(output).unwrap();
        assert!(output.contains("This step does not use the sensor"));
    }

    #[test]
    fn build_checklist_rejects_no_matches() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("catalog.sqlite")).unwrap();
        storage
            .add_port(PortRole::Input, "tractor-1", 1, HoseColor::Red, None)
            .unwrap();
        storage
            .add_port(PortRole::Hose, "mower-3", 1, HoseColor::Green, None)
            .unwrap();

        let err = build_checklist(&storage, "tractor-1", &["mower-3".to_string()]).unwrap_err();
        assert_eq!(err, "no matching connections between tractor-1 and mower-3");
    }
}
