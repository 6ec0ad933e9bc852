//! Flow orchestration and its contract traits.
//!
//! The hosting server implements the three traits on top of its own
//! issuance client, agent transport, and persistence machinery. Using
//! traits keeps the flow logic decoupled from all of them and testable
//! with mocks.

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use longhaul_protocol::{
    CollectLargeFileArgs, CollectLargeFileResult, ErrorCode, Fault, PathSpec, SignedUploadUrl,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::FlowError;
use crate::types::CollectRecord;

/// Signed-URL issuance collaborator.
pub trait UrlIssuer: Send + Sync {
    /// Issues a writable URL for the eventual object, valid for at least
    /// the expected transfer duration. The flow never renews it.
    fn issue(
        &self,
        path_spec: &PathSpec,
        size_hint: Option<u64>,
    ) -> Pin<Box<dyn Future<Output = Result<SignedUploadUrl, FlowError>> + Send + '_>>;
}

/// Transport to the agent's collect action.
pub trait CollectDispatch: Send + Sync {
    /// Sends the action arguments to the agent and waits for its
    /// synchronous result.
    fn collect(
        &self,
        args: &CollectLargeFileArgs,
    ) -> Pin<Box<dyn Future<Output = Result<CollectLargeFileResult, FlowError>> + Send + '_>>;

    /// Returns the agent's unique identifier.
    fn client_id(&self) -> &str;
}

/// Persistence for the flow's durable output.
pub trait CollectStore: Send + Sync {
    fn persist(
        &self,
        record: &CollectRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), FlowError>> + Send + '_>>;
}

/// Server-side flow: issue a signed URL, fire the collect action on one
/// agent, persist the returned session handle.
///
/// Single invocation, no retry orchestration: if the action reports an
/// initiation failure the flow surfaces it terminally and never issues a
/// replacement URL. Once the record is persisted the flow does not monitor
/// the session further.
pub struct CollectLargeFileFlow<'a> {
    issuer: &'a dyn UrlIssuer,
    dispatch: &'a dyn CollectDispatch,
    store: &'a dyn CollectStore,
}

impl<'a> CollectLargeFileFlow<'a> {
    pub fn new(
        issuer: &'a dyn UrlIssuer,
        dispatch: &'a dyn CollectDispatch,
        store: &'a dyn CollectStore,
    ) -> Self {
        Self {
            issuer,
            dispatch,
            store,
        }
    }

    /// Runs the flow for one path specification.
    ///
    /// `size_hint` is forwarded to the issuance service when the caller
    /// already knows the file size.
    pub async fn run(
        &self,
        path_spec: PathSpec,
        size_hint: Option<u64>,
    ) -> Result<CollectRecord, FlowError> {
        if path_spec.is_empty() {
            return Err(FlowError::InvalidArgs("empty path specification".into()));
        }

        let agent = self.dispatch.client_id().to_string();

        let signed_url = self.issuer.issue(&path_spec, size_hint).await?;
        if signed_url.is_empty() {
            return Err(FlowError::Issuance("issuer returned an empty URL".into()));
        }

        let args = CollectLargeFileArgs::new(path_spec.clone(), signed_url);
        let result = match self.dispatch.collect(&args).await {
            Ok(r) => r,
            Err(e) => {
                error!(agent = %agent, path = %path_spec, error = %e, "collection failed to start");
                return Err(e);
            }
        };
        if result.session_uri.is_empty() {
            return Err(FlowError::Action(Fault::new(
                ErrorCode::RemoteRejected,
                "agent returned an empty session URI",
            )));
        }

        let record = CollectRecord {
            flow_id: Uuid::new_v4(),
            client_id: agent.clone(),
            path_spec,
            session_uri: result.session_uri,
            started_at: Utc::now(),
        };
        self.store.persist(&record).await?;

        info!(
            agent = %agent,
            flow = %record.flow_id,
            session = %record.session_uri,
            "collection started; session handle persisted"
        );
        Ok(record)
    }
}
