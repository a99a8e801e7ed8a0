//! Sensor commands: one-shot status query and the tag catalog.

use std::sync::Arc;

use clap::Subcommand;
use jiff::Timestamp;
use tracing::debug;

use crate::config::Config;
use crate::model::ConnectionStatus;
use crate::sensor::{HttpBridge, NfcPoller};

use super::format::format_tag;

#[derive(Debug, Subcommand)]
pub enum SensorCommand {
    /// Ask the bridge once and print what it sees.
    ///
    /// Prints the status snapshot as JSON to stdout and a summary to stderr.
    /// Exits non-zero when the bridge is unreachable.
    Status {
        /// Tag id the reading should match.
        #[arg(long)]
        expect: Option<String>,
    },

    /// List the tags the reader is expected to report.
    Tags,
}

pub(super) fn run(command: &SensorCommand, config: &Config, bridge_url: &str) -> Result<(), String> {
    match command {
        SensorCommand::Status { expect } => {
            let poller_config = config.poller_config();
            let catalog = poller_config.catalog.clone();
            let bridge = HttpBridge::new(bridge_url, config.request_timeout());
            debug!(url = bridge.url(), "querying sensor bridge once");
            let poller = NfcPoller::new(Arc::new(bridge), poller_config);
            let status = poller.poll_once(expect.as_deref());

            let snapshot = status.snapshot(Timestamp::now());
            let json = serde_json::to_string_pretty(&snapshot)
                .map_err(|e| format!("failed to serialize status: {e}"))?;
            println!("{json}");
            eprintln!("[{}] {}", status.label(), status.message());

            if let Some(tag) = snapshot.position.as_deref().and_then(|id| catalog.get(id)) {
                eprintln!("{}", format_tag(tag));
            }

            if status.connection_status() == ConnectionStatus::Connected {
                Ok(())
            } else {
                Err(format!("sensor bridge at {bridge_url}: {}", status.message()))
            }
        }
        SensorCommand::Tags => {
            for tag in config.poller_config().catalog.tags() {
                println!("{}", format_tag(tag));
            }
            Ok(())
        }
    }
}
