//! Agent-side actions: the executable units the hub invokes on an agent.
//!
//! One action lives here, collect-large-file, together with the
//! envelope dispatch that bridges it to the external transport.

mod collect;
mod dispatch;

pub use collect::{execute, execute_with_config};
pub use dispatch::handle_collect;

use longhaul_protocol::{ErrorCode, Fault};
use longhaul_source::SourceError;
use longhaul_upload::UploadError;

/// Errors the collect action reports synchronously to its caller.
///
/// Everything here happens before the transfer is handed off; failures
/// after handoff never surface through this type.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("invalid arguments: {0}")]
    Args(Fault),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Upload(#[from] UploadError),
}

impl ActionError {
    /// The wire classification for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ActionError::Args(fault) => fault.code,
            ActionError::Source(SourceError::NotFound(_)) => ErrorCode::NotFound,
            ActionError::Source(SourceError::PermissionDenied(_)) => ErrorCode::PermissionDenied,
            ActionError::Source(SourceError::Unreadable(_)) => ErrorCode::Unreadable,
            ActionError::Upload(e) => match e.kind {
                longhaul_upload::FailureKind::UrlInvalid => ErrorCode::UrlInvalid,
                longhaul_upload::FailureKind::UrlExpired => ErrorCode::UrlExpired,
                _ => ErrorCode::RemoteRejected,
            },
        }
    }

    /// Converts into the envelope error payload.
    pub fn to_fault(&self) -> Fault {
        Fault::new(self.code(), self.to_string())
    }
}
