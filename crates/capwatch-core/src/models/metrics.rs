//! Metric snapshot models
//!
//! Normalized values handed over by a [`MetricSource`](crate::source::MetricSource).

use serde::{Deserialize, Deserializer, Serialize};

/// Usage of a single quota
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaUsage {
    /// Directory path the quota is applied to
    pub path: String,

    /// Bytes in use under the path
    pub used_bytes: u64,

    /// Quota limit in bytes
    pub limit_bytes: u64,
}

/// Cluster-wide filesystem usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsUsage {
    /// Total usable capacity in bytes
    pub total_bytes: u64,

    /// Free capacity in bytes
    pub free_bytes: u64,
}

impl FsUsage {
    /// Bytes in use
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }
}

/// Status of a replication relationship, as reported by either end
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Name of the source cluster
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_cluster_name: String,

    /// Replicated directory on the source cluster
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source_root_path: String,

    /// Name of the target cluster
    #[serde(default, deserialize_with = "null_as_empty")]
    pub target_cluster_name: String,

    /// Replicated directory on the target cluster
    #[serde(default, deserialize_with = "null_as_empty")]
    pub target_root_path: String,

    /// Last recovery point, if one was established
    #[serde(default)]
    pub recovery_point: Option<String>,

    /// Error reported by the last replication job
    #[serde(default)]
    pub error_from_last_job: Option<String>,
}

impl Relationship {
    /// Whether the last replication job reported an error
    pub fn has_error(&self) -> bool {
        self.error_from_last_job
            .as_deref()
            .is_some_and(|e| !e.is_empty())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
