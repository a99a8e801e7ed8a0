//! The NFC sensor: bridge client, reply classification, and polling.
//!
//! ```text
//! HttpBridge --(BridgeReply | BridgeError)--> classify --(PollStatus)--> NfcPoller::latest
//! ```

mod bridge;
mod classify;
mod poller;

pub use bridge::HttpBridge;
pub use classify::{PollStatus, TagCatalog};
pub use poller::{NfcPoller, PollerConfig};
