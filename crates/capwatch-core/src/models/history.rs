//! Alert history models
//!
//! The history records which alerts have already been sent so that a later run
//! only notifies about conditions that are new or have escalated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Last alerted state of a quota rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaHistoryEntry {
    /// Threshold recorded for the last notification or observation
    pub alert_threshold: f64,

    /// Usage percentage at that time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pct_used: Option<f64>,

    /// Human-readable usage at that time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_used: Option<String>,

    /// Human-readable limit at that time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_limit: Option<String>,

    /// Any other fields found in the file, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl QuotaHistoryEntry {
    /// Entry holding only a threshold
    pub fn new(alert_threshold: f64) -> Self {
        Self {
            alert_threshold,
            pct_used: None,
            quota_used: None,
            quota_limit: None,
            extra: Map::new(),
        }
    }
}

/// Last alerted state of a capacity rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityHistoryEntry {
    /// Threshold recorded for the last notification or observation
    pub alert_threshold: f64,

    /// Any other fields found in the file, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CapacityHistoryEntry {
    /// Entry holding only a threshold
    pub fn new(alert_threshold: f64) -> Self {
        Self {
            alert_threshold,
            extra: Map::new(),
        }
    }
}

/// Quota history: path -> rule name -> entry
pub type QuotaHistory = BTreeMap<String, BTreeMap<String, QuotaHistoryEntry>>;

/// Capacity history: rule name -> entry
pub type CapacityHistory = BTreeMap<String, CapacityHistoryEntry>;

/// Replication history: rule name -> marker. Presence means "already alerted".
pub type ReplicationHistory = BTreeMap<String, Value>;

/// Persistent alert history, one namespace per check family
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct History {
    /// Quota alerts
    #[serde(default)]
    pub quotas: QuotaHistory,

    /// Cluster capacity alerts
    #[serde(default)]
    pub capacity: CapacityHistory,

    /// Replication error alerts
    #[serde(default)]
    pub replication: ReplicationHistory,
}

impl History {
    /// Whether no alert is recorded in any namespace
    pub fn is_empty(&self) -> bool {
        self.quotas.is_empty() && self.capacity.is_empty() && self.replication.is_empty()
    }
}
