use serde::{Deserialize, Serialize};

use crate::types::{ErrorCode, Fault, PathSpec, SignedUploadUrl};

/// Arguments for the collect-large-file action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectLargeFileArgs {
    pub path_spec: PathSpec,
    pub signed_url: SignedUploadUrl,
}

impl CollectLargeFileArgs {
    pub fn new(path_spec: PathSpec, signed_url: SignedUploadUrl) -> Self {
        Self {
            path_spec,
            signed_url,
        }
    }

    /// Checks that both fields are present and non-empty.
    ///
    /// An empty path spec can never resolve, an empty URL can never be
    /// written to, so each maps onto the classification the real failure
    /// would produce.
    pub fn validate(&self) -> Result<(), Fault> {
        if self.path_spec.is_empty() {
            return Err(Fault::new(ErrorCode::NotFound, "empty path specification"));
        }
        if self.signed_url.is_empty() {
            return Err(Fault::new(ErrorCode::UrlInvalid, "empty signed upload URL"));
        }
        Ok(())
    }
}

/// Result of a successfully started collection.
///
/// This is a commitment that the transfer is underway, not that it has
/// finished. The session URI is the only handle the rest of the system
/// keeps; completion is observed out of band through the storage endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectLargeFileResult {
    pub session_uri: String,
}
