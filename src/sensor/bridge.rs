//! HTTP client for the NFC sensor bridge.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

/// The bridge's JSON reply to `GET <bridge-url>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BridgeReply {
    #[serde(default)]
    pub tag_detected: bool,

    /// The id of the tag under the reader, when the bridge reports it.
    #[serde(default)]
    pub last_tag_id: Option<String>,

    /// Position reported alongside the tag. Some bridges send `"unknown"`.
    #[serde(default)]
    pub position: Option<String>,

    /// Set when the bridge itself could not reach the reader.
    #[serde(default)]
    pub error: Option<String>,

    #[serde(default, rename = "connectionStatus")]
    pub connection_status: Option<String>,
}

impl BridgeReply {
    /// The tag id this reply names, preferring `last_tag_id` over `position`.
    pub fn tag_id(&self) -> Option<&str> {
        self.last_tag_id
            .as_deref()
            .or(self.position.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty() && !id.eq_ignore_ascii_case("unknown"))
    }
}

/// Why a bridge request produced no reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("sensor bridge unreachable: {0}")]
    Offline(String),

    #[error("sensor bridge did not answer within {0:?}")]
    Timeout(Duration),

    #[error("sensor bridge fault: {0}")]
    Fault(String),
}

/// A source of sensor replies.
pub trait SensorBridge: Send + Sync {
    /// Performs one request. Never retries.
    fn fetch_status(&self) -> Result<BridgeReply, BridgeError>;
}

/// [`SensorBridge`] over plain HTTP.
pub struct HttpBridge {
    url: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl HttpBridge {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            url: url.into(),
            timeout,
            agent,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SensorBridge for HttpBridge {
    fn fetch_status(&self) -> Result<BridgeReply, BridgeError> {
        let response = match self
            .agent
            .get(&self.url)
            .set("Accept", "application/json")
            .call()
        {
            Ok(response) => response,
            // Gateway-style bridges answer 503/504 when the reader is down.
            Err(ureq::Error::Status(504, _)) => return Err(BridgeError::Timeout(self.timeout)),
            Err(ureq::Error::Status(503, response)) => {
                let reply = response.into_json::<BridgeReply>().ok();
                return Err(self.classify_unavailable(reply));
            }
            Err(ureq::Error::Status(code, _)) => {
                return Err(BridgeError::Fault(format!("bridge returned HTTP {code}")));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(self.classify_transport(&transport));
            }
        };

        let reply = response.into_json::<BridgeReply>().map_err(|e| {
            if is_timeout_io(&e) {
                BridgeError::Timeout(self.timeout)
            } else {
                BridgeError::Fault(format!("invalid bridge reply: {e}"))
            }
        })?;
        debug!(?reply, "bridge replied");
        Ok(reply)
    }
}

impl HttpBridge {
    /// A 503 whose body names the reader's state is a report from a live
    /// bridge. Only a bare 503 or one saying `server_offline` means offline.
    fn classify_unavailable(&self, reply: Option<BridgeReply>) -> BridgeError {
        let Some(reply) = reply else {
            return BridgeError::Offline("bridge reported the reader unavailable".to_string());
        };
        let detail = |fallback: &str| reply.error.clone().unwrap_or_else(|| fallback.to_string());
        match reply.connection_status.as_deref() {
            Some("timeout") => BridgeError::Timeout(self.timeout),
            Some("error" | "disconnected") => BridgeError::Fault(detail("bridge reported an error")),
            _ => BridgeError::Offline(detail("bridge reported the reader unavailable")),
        }
    }

    fn classify_transport(&self, transport: &ureq::Transport) -> BridgeError {
        let timed_out = matches!(transport.kind(), ureq::ErrorKind::Io)
            && transport
                .source()
                .and_then(|source| source.downcast_ref::<io::Error>())
                .is_some_and(is_timeout_io);
        if timed_out {
            return BridgeError::Timeout(self.timeout);
        }
        match transport.kind() {
            ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Dns => {
                BridgeError::Offline(transport.to_string())
            }
            _ => BridgeError::Fault(transport.to_string()),
        }
    }
}

fn is_timeout_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}
