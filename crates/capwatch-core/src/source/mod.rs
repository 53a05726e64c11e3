//! Metric sources
//!
//! A [`MetricSource`] supplies the raw snapshot each check evaluates.

mod qumulo;

pub use qumulo::QumuloClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FsUsage, QuotaUsage, Relationship};

/// Supplier of cluster metrics
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Cluster-wide filesystem usage
    async fn fs_usage(&self) -> Result<FsUsage>;

    /// Usage of every quota on the cluster
    async fn quota_usages(&self) -> Result<Vec<QuotaUsage>>;

    /// Relationships for which this cluster is the source
    async fn source_relationships(&self) -> Result<Vec<Relationship>>;

    /// Relationships for which this cluster is the target
    async fn target_relationships(&self) -> Result<Vec<Relationship>>;
}
