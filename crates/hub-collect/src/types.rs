use chrono::{DateTime, Utc};
use longhaul_protocol::PathSpec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The flow's durable output: everything needed to audit the collection
/// or cancel the session out of band through the storage endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectRecord {
    pub flow_id: Uuid,
    /// Agent the action ran on.
    pub client_id: String,
    pub path_spec: PathSpec,
    pub session_uri: String,
    pub started_at: DateTime<Utc>,
}
