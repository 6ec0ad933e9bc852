use std::time::Duration;

use longhaul_protocol::SignedUploadUrl;
use longhaul_source::ByteSource;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, LOCATION, RANGE};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::{CHUNK_GRANULARITY, DEFAULT_CHUNK_SIZE, UploadError, wire};

/// Classification carried by a terminal session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The signed URL was rejected as malformed or unusable.
    UrlInvalid,
    /// The signed URL's validity window has elapsed or been revoked.
    UrlExpired,
    /// The endpoint refused the request for any other reason (quota,
    /// server error, unreachable host).
    RemoteRejected,
    /// The source cannot reposition and bytes past the acknowledged
    /// offset were already consumed.
    NonResumableSource,
    /// The source failed mid-read after the transfer started.
    SourceRead,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::UrlInvalid => "invalid upload URL",
            FailureKind::UrlExpired => "expired upload URL",
            FailureKind::RemoteRejected => "rejected by endpoint",
            FailureKind::NonResumableSource => "non-resumable source",
            FailureKind::SourceRead => "source read failure",
        };
        f.write_str(s)
    }
}

/// Lifecycle state of an upload session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Initiating,
    Transferring,
    Interrupted,
    Resuming,
    Completed,
    Failed(FailureKind),
}

/// Tuning knobs for one upload session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Bytes per chunk; rounded up to the provider granularity.
    pub chunk_size: usize,
    /// Delay before the first committed-offset query after an interruption.
    pub initial_backoff: Duration,
    /// Backoff ceiling for repeated interruptions.
    pub max_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Produced when the transfer loop reaches `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    pub session_uri: String,
    pub bytes_sent: u64,
    /// Hex SHA-256 over the delivered byte stream.
    pub sha256: String,
}

/// One resumable upload: one signed URL, one byte source, one remote
/// session.
///
/// [`initiate`](Self::initiate) is the synchronous phase: the action
/// caller blocks on it and gets either a session URI or a classified
/// failure. [`run`](Self::run) drives everything after that and is meant
/// to be spawned detached; its outcome is observed through logs and the
/// endpoint's own session API, never through the original caller.
pub struct ResumableUploadSession {
    http: reqwest::Client,
    target: SignedUploadUrl,
    config: SessionConfig,
    source: Option<Box<dyn ByteSource>>,
    total: Option<u64>,
    state: SessionState,
    session_uri: Option<String>,
    /// Byte position the endpoint has durably acknowledged. Never advanced
    /// without remote confirmation.
    committed: u64,
    hasher: Sha256,
    /// High-water mark of source bytes already digested; re-reads after a
    /// rewind are not hashed twice.
    hashed: u64,
    /// Consecutive interruption cycles since the last acknowledged byte.
    attempts: u32,
}

impl ResumableUploadSession {
    /// Binds a source to a signed URL.
    pub fn new(
        source: Box<dyn ByteSource>,
        target: SignedUploadUrl,
        config: SessionConfig,
    ) -> Result<Self, UploadError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| UploadError {
                kind: FailureKind::RemoteRejected,
                committed: 0,
                message: format!("http client: {e}"),
            })?;

        let chunk_size = config
            .chunk_size
            .max(CHUNK_GRANULARITY)
            .div_ceil(CHUNK_GRANULARITY)
            * CHUNK_GRANULARITY;
        let config = SessionConfig { chunk_size, ..config };
        let total = source.total_len();

        Ok(Self {
            http,
            target,
            config,
            source: Some(source),
            total,
            state: SessionState::Initiating,
            session_uri: None,
            committed: 0,
            hasher: Sha256::new(),
            hashed: 0,
            attempts: 0,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Session URI assigned by the endpoint, once initiated.
    pub fn session_uri(&self) -> Option<&str> {
        self.session_uri.as_deref()
    }

    /// Creates the upload session at the endpoint.
    ///
    /// Returns the session URI and moves the session to `Transferring`,
    /// or fails terminally with exactly one classification. No byte of
    /// file data is sent here.
    pub async fn initiate(&mut self) -> Result<String, UploadError> {
        if self.state != SessionState::Initiating {
            return Err(UploadError {
                kind: FailureKind::RemoteRejected,
                committed: self.committed,
                message: "session already initiated".into(),
            });
        }

        let mut req = self
            .http
            .post(self.target.as_str())
            .header(wire::RESUMABLE_START_HEADER, wire::RESUMABLE_START_VALUE)
            .header(CONTENT_LENGTH, 0);
        if let Some(total) = self.total {
            req = req.header(wire::UPLOAD_CONTENT_LENGTH_HEADER, total);
        }

        let resp = match req.send().await {
            Ok(r) => r,
            Err(e) => {
                return Err(self.fail(
                    FailureKind::RemoteRejected,
                    format!("initiation transport failure: {e}"),
                ));
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let kind = wire::classify_rejection(status);
            return Err(self.fail(kind, format!("initiation rejected: {status}")));
        }

        let uri = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .filter(|u| !u.is_empty());
        let Some(uri) = uri else {
            return Err(self.fail(
                FailureKind::RemoteRejected,
                "initiation response carried no session URI",
            ));
        };

        self.session_uri = Some(uri.clone());
        self.state = SessionState::Transferring;
        info!(session = %uri, total = ?self.total, "upload session initiated");
        Ok(uri)
    }

    /// Drives the transfer loop to a terminal state.
    ///
    /// Consumes the session; the collect action spawns this detached after
    /// a successful initiation. Interruptions are retried indefinitely with
    /// capped backoff; every resumption re-reads the committed offset from
    /// the endpoint before another byte is sent. Failures here are terminal
    /// to the detached task and are never reported through the original
    /// action call.
    pub async fn run(mut self) -> Result<TransferSummary, UploadError> {
        let Some(uri) = self.session_uri.clone() else {
            return Err(self.fail(
                FailureKind::RemoteRejected,
                "transfer loop entered before initiation",
            ));
        };

        loop {
            match self.state.clone() {
                SessionState::Transferring => self.transfer_step(&uri).await?,
                SessionState::Interrupted | SessionState::Resuming => self.resume(&uri).await?,
                SessionState::Completed => {
                    let digest =
                        hex::encode(std::mem::replace(&mut self.hasher, Sha256::new()).finalize());
                    info!(
                        session = %uri,
                        bytes = self.committed,
                        sha256 = %digest,
                        "upload completed"
                    );
                    return Ok(TransferSummary {
                        session_uri: uri,
                        bytes_sent: self.committed,
                        sha256: digest,
                    });
                }
                SessionState::Initiating => {
                    return Err(self.fail(
                        FailureKind::RemoteRejected,
                        "transfer loop entered before initiation",
                    ));
                }
                SessionState::Failed(kind) => {
                    return Err(UploadError {
                        kind,
                        committed: self.committed,
                        message: "session already failed".into(),
                    });
                }
            }
        }
    }

    /// Sends the finalize-range marker.
    ///
    /// Needed when the stream ends without a data chunk that pinned the
    /// total: zero-length sources and unknown-length streams whose last
    /// chunk was full-sized. Safe to call again after `Completed`: the
    /// marker is idempotent and a completed session sends nothing.
    pub async fn finalize(&mut self) -> Result<(), UploadError> {
        let Some(uri) = self.session_uri.clone() else {
            return Err(self.fail(
                FailureKind::RemoteRejected,
                "finalize before initiation",
            ));
        };
        self.send_finalize(&uri).await
    }

    /// Reads and sends one chunk, or finalizes at end-of-data.
    async fn transfer_step(&mut self, uri: &str) -> Result<(), UploadError> {
        let chunk = self.read_next_chunk().await?;
        if chunk.is_empty() {
            return self.send_finalize(uri).await;
        }

        let start = self.committed;
        let end = start + chunk.len() as u64 - 1;
        // A short chunk is the stream's last; it pins the total for
        // unknown-length sources.
        let header_total = match self.total {
            Some(t) => Some(t),
            None if chunk.len() < self.config.chunk_size => Some(end + 1),
            None => None,
        };
        let range = wire::content_range(start, chunk.len(), header_total);

        debug!(session = %uri, offset = start, len = chunk.len(), "sending chunk");
        let resp = self
            .http
            .put(uri)
            .header(CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                warn!(session = %uri, offset = start, error = %e, "chunk transport failure");
                self.state = SessionState::Interrupted;
                return Ok(());
            }
        };

        self.handle_transfer_response(uri, resp).await
    }

    /// Queries the endpoint for its committed offset and reconciles.
    async fn resume(&mut self, uri: &str) -> Result<(), UploadError> {
        self.state = SessionState::Resuming;
        let delay = self.backoff();
        self.attempts += 1;
        debug!(session = %uri, attempt = self.attempts, delay_ms = delay.as_millis() as u64,
            "resuming after interruption");
        tokio::time::sleep(delay).await;

        let resp = self
            .http
            .put(uri)
            .header(CONTENT_RANGE, wire::content_range_marker(self.total))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                warn!(session = %uri, error = %e, "offset query transport failure");
                self.state = SessionState::Interrupted;
                return Ok(());
            }
        };

        self.handle_transfer_response(uri, resp).await
    }

    /// Common handling for chunk, query, and finalize responses.
    async fn handle_transfer_response(
        &mut self,
        uri: &str,
        resp: reqwest::Response,
    ) -> Result<(), UploadError> {
        let status = resp.status();

        if status.as_u16() == wire::RESUME_INCOMPLETE {
            let committed = resp
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| wire::committed_from_range(Some(v)))
                .unwrap_or(0);
            return self.reconcile(uri, committed);
        }

        if status.is_success() {
            // Finalized. The endpoint's view of the byte count is
            // authoritative even here, but a success can only follow a
            // complete body, so the local committed cursor catches up to
            // everything consumed.
            if let Some(src) = &self.source {
                self.committed = src.consumed();
            }
            self.attempts = 0;
            self.state = SessionState::Completed;
            return Ok(());
        }

        if status.is_server_error() {
            warn!(session = %uri, %status, "endpoint error; will resume");
            self.state = SessionState::Interrupted;
            return Ok(());
        }

        // Remaining 4xx mid-transfer is terminal: the URL died or the
        // endpoint gave up on the session.
        let kind = wire::classify_rejection(status);
        Err(self.fail(kind, format!("transfer rejected: {status}")))
    }

    /// Adopts the endpoint's committed offset and realigns the source.
    ///
    /// The remote value is ground truth: if it trails what this session
    /// believed was acknowledged, the gap is resent; local send state is
    /// never trusted across an interruption.
    fn reconcile(&mut self, uri: &str, remote_committed: u64) -> Result<(), UploadError> {
        if remote_committed < self.committed {
            warn!(
                session = %uri,
                local = self.committed,
                remote = remote_committed,
                "endpoint reports lower committed offset; resending from remote view"
            );
        }
        self.committed = remote_committed;
        self.attempts = 0;

        let Some(mut source) = self.source.take() else {
            return Err(self.fail(FailureKind::SourceRead, "source detached"));
        };
        let consumed = source.consumed();
        let rewound = if consumed > self.committed {
            source.rewind(self.committed)
        } else {
            Ok(true)
        };
        self.source = Some(source);

        match rewound {
            Ok(true) => {}
            Ok(false) => {
                let committed = self.committed;
                return Err(self.fail(
                    FailureKind::NonResumableSource,
                    format!(
                        "source cannot seek and {} bytes past the acknowledged offset {committed} were already consumed",
                        consumed - committed
                    ),
                ));
            }
            Err(e) => return Err(self.fail(FailureKind::SourceRead, e.to_string())),
        }
        if consumed < self.committed {
            return Err(self.fail(
                FailureKind::RemoteRejected,
                format!(
                    "endpoint committed {} bytes but the source only produced {consumed}",
                    self.committed
                ),
            ));
        }

        self.state = SessionState::Transferring;
        Ok(())
    }

    /// Sends `bytes */<n>` to close out a stream with no pending data.
    async fn send_finalize(&mut self, uri: &str) -> Result<(), UploadError> {
        if self.state == SessionState::Completed {
            return Ok(());
        }

        debug!(session = %uri, bytes = self.committed, "sending finalize marker");
        let resp = self
            .http
            .put(uri)
            .header(CONTENT_RANGE, wire::content_range_marker(Some(self.committed)))
            .header(CONTENT_LENGTH, 0)
            .send()
            .await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                warn!(session = %uri, error = %e, "finalize transport failure");
                self.state = SessionState::Interrupted;
                return Ok(());
            }
        };

        self.handle_transfer_response(uri, resp).await
    }

    /// Reads the next chunk, handing the boxed source through a blocking
    /// task, and folds fresh bytes into the running digest.
    async fn read_next_chunk(&mut self) -> Result<Vec<u8>, UploadError> {
        let size = self.config.chunk_size;
        let Some(mut source) = self.source.take() else {
            return Err(self.fail(FailureKind::SourceRead, "source detached"));
        };

        let joined = tokio::task::spawn_blocking(move || {
            let chunk = source.read_chunk(size);
            (source, chunk)
        })
        .await;

        let (source, result) = match joined {
            Ok(pair) => pair,
            Err(e) => {
                return Err(self.fail(FailureKind::SourceRead, format!("read task join: {e}")));
            }
        };
        self.source = Some(source);
        let chunk = match result {
            Ok(c) => c,
            Err(e) => return Err(self.fail(FailureKind::SourceRead, e.to_string())),
        };

        // Digest each source byte exactly once: re-reads below the
        // high-water mark after a rewind are skipped.
        let start = self.committed;
        let end = start + chunk.len() as u64;
        if end > self.hashed {
            let skip = self.hashed.saturating_sub(start) as usize;
            self.hasher.update(&chunk[skip..]);
            self.hashed = end;
        }

        Ok(chunk)
    }

    fn backoff(&self) -> Duration {
        let exp = self.attempts.min(16);
        self.config
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.config.max_backoff)
    }

    /// Marks the session terminally failed and builds the error.
    fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> UploadError {
        let message = message.into();
        warn!(kind = %kind, committed = self.committed, %message, "upload session failed");
        self.state = SessionState::Failed(kind);
        UploadError {
            kind,
            committed: self.committed,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use longhaul_source::MemorySource;

    fn new_session(data: &[u8]) -> ResumableUploadSession {
        ResumableUploadSession::new(
            Box::new(MemorySource::new(data.to_vec())),
            SignedUploadUrl::new("https://storage.test/u?sig=x"),
            SessionConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn new_session_starts_initiating() {
        let session = new_session(b"abc");
        assert_eq!(*session.state(), SessionState::Initiating);
        assert!(session.session_uri().is_none());
    }

    #[test]
    fn chunk_size_rounds_up_to_granularity() {
        let session = ResumableUploadSession::new(
            Box::new(MemorySource::new(vec![0u8; 16])),
            SignedUploadUrl::new("https://storage.test/u"),
            SessionConfig {
                chunk_size: CHUNK_GRANULARITY + 1,
                ..SessionConfig::default()
            },
        )
        .unwrap();
        assert_eq!(session.config.chunk_size, 2 * CHUNK_GRANULARITY);
    }

    #[test]
    fn tiny_chunk_size_clamps_to_granularity() {
        let session = ResumableUploadSession::new(
            Box::new(MemorySource::new(vec![0u8; 16])),
            SignedUploadUrl::new("https://storage.test/u"),
            SessionConfig {
                chunk_size: 1,
                ..SessionConfig::default()
            },
        )
        .unwrap();
        assert_eq!(session.config.chunk_size, CHUNK_GRANULARITY);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let mut session = new_session(b"abc");
        session.config.initial_backoff = Duration::from_millis(100);
        session.config.max_backoff = Duration::from_millis(450);

        session.attempts = 0;
        assert_eq!(session.backoff(), Duration::from_millis(100));
        session.attempts = 1;
        assert_eq!(session.backoff(), Duration::from_millis(200));
        session.attempts = 2;
        assert_eq!(session.backoff(), Duration::from_millis(400));
        session.attempts = 3;
        assert_eq!(session.backoff(), Duration::from_millis(450));
        session.attempts = 60;
        assert_eq!(session.backoff(), Duration::from_millis(450));
    }

    #[tokio::test]
    async fn run_before_initiate_fails() {
        let session = new_session(b"abc");
        let err = session.run().await.unwrap_err();
        assert_eq!(err.kind, FailureKind::RemoteRejected);
    }

    #[tokio::test]
    async fn finalize_before_initiate_fails() {
        let mut session = new_session(b"");
        assert!(session.finalize().await.is_err());
    }
}
