//! Output formatting for CLI display.

use uuid::Uuid;

use crate::matching::Connection;
use crate::model::{
    HoseCoupling, HydraulicPort, Installation, InstallationStatus, InstallationStep, TagInfo,
    Valve,
};

/// First eight characters of an id, as shown in listings.
pub(super) fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub(super) fn format_port(port: &HydraulicPort) -> String {
    format!(
        "{}  [{:>2}]  #{} {} ({})",
        short_id(port.id),
        port.slot,
        port.sequence_number,
        port.color,
        port.color.badge()
    )
}

pub(super) fn format_valve(valve: &Valve) -> String {
    let color = valve
        .color
        .map_or_else(String::new, |c| format!(" [{c}]"));
    let inactive = if valve.active { "" } else { " (inactive)" };
    format!(
        "{}  [{:>2}]  {} {}  {}/{}  {} {}{color}{inactive}",
        short_id(valve.id),
        valve.slot,
        valve.number,
        valve.function_name,
        valve.port_a_label,
        valve.port_b_label,
        valve.position.as_str(),
        valve.kind.as_str(),
    )
}

pub(super) fn format_coupling(coupling: &HoseCoupling) -> String {
    format!(
        "{}  [{:>2}]  hose {} {} \"{}\" -> port {}  {}  {} bar, {} l/min\n      {}",
        short_id(coupling.id),
        coupling.slot,
        coupling.hose_number,
        coupling.hose_color,
        coupling.hose_label,
        coupling.port.as_str(),
        coupling.connection_type.as_str(),
        coupling.pressure_rating_bar,
        coupling.flow_rating_lpm,
        coupling.instruction,
    )
}

pub(super) fn format_step(step: &InstallationStep) -> String {
    let signal = match (&step.signal_position, step.requires_signal) {
        (Some(position), true) => format!("  [sensor: {position}]"),
        _ => String::new(),
    };
    format!("{:>3}. {}{signal}", step.step_number, step.title)
}

/// One checklist line: index, confirmation mark, and the pair.
pub(super) fn format_connection(index: usize, connection: &Connection, confirmed: bool) -> String {
    let mark = if confirmed { "x" } else { " " };
    format!(
        "{index:>3}. [{mark}] input #{} -> {} hose #{}  ({})",
        connection.input.sequence_number,
        connection.hose.owner_id,
        connection.hose.sequence_number,
        connection.input.color,
    )
}

pub(super) fn format_installation(installation: &Installation) -> String {
    let status = match &installation.status {
        InstallationStatus::Active => "active".to_string(),
        InstallationStatus::Completed {
            completed_at,
            attachment_id: Some(attachment),
        } => format!("completed {completed_at} with {attachment}"),
        InstallationStatus::Completed {
            completed_at,
            attachment_id: None,
        } => format!("completed {completed_at}"),
    };
    format!(
        "{}  {}  started {}  [{status}]",
        short_id(installation.id),
        installation.machine_id,
        installation.started_at,
    )
}

pub(super) fn format_tag(tag: &TagInfo) -> String {
    let mut details = Vec::new();
    if let Some(hose_type) = &tag.hose_type {
        details.push(hose_type.clone());
    }
    if let Some(connection) = &tag.connection {
        details.push(connection.clone());
    }
    if let Some(color) = &tag.color {
        details.push(color.clone());
    }
    if let Some(bar) = tag.max_pressure_bar {
        details.push(format!("{bar} bar"));
    }
    if let Some(lpm) = tag.flow_rate_lpm {
        details.push(format!("{lpm} l/min"));
    }
    if details.is_empty() {
        format!("{}: {}", tag.id, tag.position)
    } else {
        format!("{}: {} ({})", tag.id, tag.position, details.join(", "))
    }
}
