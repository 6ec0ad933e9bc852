//! The collect-large-file action.

use longhaul_protocol::{CollectLargeFileArgs, CollectLargeFileResult};
use longhaul_source::FileSource;
use longhaul_upload::{ResumableUploadSession, SessionConfig};
use tracing::{info, warn};

use crate::ActionError;

/// Executes one large-file collection with default session tuning.
///
/// See [`execute_with_config`].
pub async fn execute(args: &CollectLargeFileArgs) -> Result<CollectLargeFileResult, ActionError> {
    execute_with_config(args, SessionConfig::default()).await
}

/// Executes one large-file collection: resolves the path spec to a byte
/// source, initiates a resumable upload session against the signed URL,
/// hands the transfer to a detached task, and returns the session URI.
///
/// The result is a commitment that the transfer is underway, not that it
/// finished. Interruptions, resumptions, completion, and terminal failures
/// after the handoff happen on the detached task and are observable only
/// out of band through the session URI; by design they are never reported
/// through this call.
pub async fn execute_with_config(
    args: &CollectLargeFileArgs,
    config: SessionConfig,
) -> Result<CollectLargeFileResult, ActionError> {
    args.validate().map_err(ActionError::Args)?;

    let spec = args.path_spec.clone();
    let source = tokio::task::spawn_blocking(move || FileSource::open(&spec))
        .await
        .map_err(|e| {
            ActionError::Source(longhaul_source::SourceError::Unreadable(format!(
                "open task join: {e}"
            )))
        })??;

    let mut session =
        ResumableUploadSession::new(Box::new(source), args.signed_url.clone(), config)?;
    let session_uri = session.initiate().await?;

    info!(path = %args.path_spec, session = %session_uri, "collection started");

    // Fire and forget: no handle is kept for awaiting the transfer.
    tokio::spawn(async move {
        match session.run().await {
            Ok(summary) => info!(
                session = %summary.session_uri,
                bytes = summary.bytes_sent,
                sha256 = %summary.sha256,
                "detached transfer completed"
            ),
            Err(e) => warn!(
                kind = %e.kind,
                committed = e.committed,
                error = %e,
                "detached transfer failed"
            ),
        }
    });

    Ok(CollectLargeFileResult { session_uri })
}
