//! Turns raw bridge results into operator-facing statuses.

use std::collections::HashMap;
use std::fmt;

use jiff::Timestamp;

use crate::model::{ConnectionStatus, NfcStatus, TagInfo};

use super::bridge::{BridgeError, BridgeReply};

/// The tags the reader may report, keyed by uppercase id.
#[derive(Debug, Clone, Default)]
pub struct TagCatalog {
    tags: HashMap<String, TagInfo>,
}

impl TagCatalog {
    pub fn new(tags: impl IntoIterator<Item = TagInfo>) -> Self {
        Self {
            tags: tags
                .into_iter()
                .map(|tag| (tag.id.to_ascii_uppercase(), tag))
                .collect(),
        }
    }

    /// Looks up a tag, ignoring case.
    pub fn get(&self, id: &str) -> Option<&TagInfo> {
        self.tags.get(&id.to_ascii_uppercase())
    }

    /// Tags in id order.
    pub fn tags(&self) -> Vec<&TagInfo> {
        let mut tags: Vec<&TagInfo> = self.tags.values().collect();
        tags.sort_by(|a, b| a.id.cmp(&b.id));
        tags
    }
}

/// The outcome of one poll, as shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    /// A recognized tag is under the reader and matches what the step expects.
    Detected { tag_id: String, position: String },

    /// A tag is under the reader, but not the expected one.
    WrongPosition {
        found: Option<String>,
        expected: Option<String>,
    },

    /// The bridge answered and no tag is present.
    Waiting,

    ServerOffline { detail: String },
    Timeout,

    /// The bridge answered with an error, or the answer made no sense.
    Error { detail: String },
}

impl PollStatus {
    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Detected { .. } => "connected&detected",
            Self::WrongPosition { .. } => "connected&wrong_position",
            Self::Waiting => "connected&waiting",
            Self::ServerOffline { .. } => "server_offline",
            Self::Timeout => "timeout",
            Self::Error { .. } => "error",
        }
    }

    /// One-line message for the operator.
    pub fn message(&self) -> String {
        match self {
            Self::Detected { tag_id, position } => format!("Tag {tag_id} detected: {position}"),
            Self::WrongPosition {
                found,
                expected: Some(expected),
            } => format!(
                "Wrong position: expected {expected}, found {}",
                found.as_deref().unwrap_or("an unrecognized tag")
            ),
            Self::WrongPosition {
                found,
                expected: None,
            } => format!(
                "Tag detected but not recognized ({})",
                found.as_deref().unwrap_or("no id")
            ),
            Self::Waiting => "Waiting for a tag".to_string(),
            Self::ServerOffline { detail } => format!("Sensor server offline: {detail}"),
            Self::Timeout => "Sensor server did not respond in time".to_string(),
            Self::Error { detail } => format!("Sensor error: {detail}"),
        }
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        match self {
            Self::Detected { .. } | Self::WrongPosition { .. } | Self::Waiting => {
                ConnectionStatus::Connected
            }
            Self::ServerOffline { .. } => ConnectionStatus::ServerOffline,
            Self::Timeout => ConnectionStatus::Timeout,
            Self::Error { .. } => ConnectionStatus::Error,
        }
    }

    pub fn tag_detected(&self) -> bool {
        matches!(self, Self::Detected { .. } | Self::WrongPosition { .. })
    }

    /// Whether this status satisfies a sensor-gated step.
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Detected { .. })
    }

    /// A read-only snapshot of this status.
    pub fn snapshot(&self, observed_at: Timestamp) -> NfcStatus {
        let position = match self {
            Self::Detected { tag_id, .. } => Some(tag_id.clone()),
            Self::WrongPosition { found, .. } => found.clone(),
            _ => None,
        };
        NfcStatus {
            tag_detected: self.tag_detected(),
            position,
            connection_status: self.connection_status(),
            observed_at,
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

/// Classifies one bridge result against the tag the current step expects.
///
/// With no expectation, any recognized tag counts as detected.
pub fn classify(
    result: Result<BridgeReply, BridgeError>,
    catalog: &TagCatalog,
    expected: Option<&str>,
) -> PollStatus {
    let reply = match result {
        Ok(reply) => reply,
        Err(BridgeError::Offline(detail)) => return PollStatus::ServerOffline { detail },
        Err(BridgeError::Timeout(_)) => return PollStatus::Timeout,
        Err(BridgeError::Fault(detail)) => return PollStatus::Error { detail },
    };

    match reply.connection_status.as_deref() {
        Some("timeout") => return PollStatus::Timeout,
        Some("server_offline") => {
            return PollStatus::ServerOffline {
                detail: reply
                    .error
                    .unwrap_or_else(|| "bridge reported the reader offline".to_string()),
            };
        }
        Some("error" | "disconnected") => {
            return PollStatus::Error {
                detail: reply
                    .error
                    .unwrap_or_else(|| "bridge reported an error".to_string()),
            };
        }
        _ => {}
    }
    if let Some(detail) = reply.error {
        return PollStatus::Error { detail };
    }
    if !reply.tag_detected {
        return PollStatus::Waiting;
    }

    let expected = expected.map(str::to_ascii_uppercase);
    let found = reply.tag_id().map(str::to_ascii_uppercase);
    let position = found
        .as_deref()
        .and_then(|id| catalog.get(id))
        .map(|tag| tag.position.clone());
    match (position, expected) {
        (Some(position), None) => PollStatus::Detected {
            tag_id: found.unwrap_or_default(),
            position,
        },
        (Some(position), Some(want)) if found.as_deref() == Some(want.as_str()) => {
            PollStatus::Detected {
                tag_id: want,
                position,
            }
        }
        (_, expected) => PollStatus::WrongPosition { found, expected },
    }
}
