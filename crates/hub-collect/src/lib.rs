//! Hub-side collect-large-file flow.
//!
//! The flow obtains a signed upload URL from the issuance service, fires
//! the collect action on one agent, and persists the returned session URI
//! as its durable output. The file's bytes never pass through the hub;
//! after the record is stored the session is tracked only out of band.

mod flow;
mod types;

pub use flow::{CollectDispatch, CollectLargeFileFlow, CollectStore, UrlIssuer};
pub use types::CollectRecord;

use longhaul_protocol::Fault;

/// Errors produced by the collect flow.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("issuance failed: {0}")]
    Issuance(String),

    #[error("action failed: {0}")]
    Action(#[from] Fault),

    #[error("persistence failed: {0}")]
    Store(String),
}
