//! Wire protocol types for Longhaul hub-agent communication.
//!
//! The hub and agent exchange action requests and results through an
//! external transport; this crate defines the payloads and the message
//! envelope they ride in. File bytes never appear here; they go straight
//! from the agent to the object store.

pub mod envelope;
pub mod messages;
pub mod types;

pub use envelope::{Message, MessageType};
pub use messages::{CollectLargeFileArgs, CollectLargeFileResult};
pub use types::{ErrorCode, Fault, PathSpec, SignedUploadUrl};
