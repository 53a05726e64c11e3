//! Alert rule models

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A quota rule, applied to one quota path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRule {
    /// Usage percentages that trigger an alert
    pub thresholds: Vec<f64>,

    /// Recipients of the alert
    pub mail_to: Vec<String>,

    /// Operator-supplied text appended to the alert body
    #[serde(default)]
    pub custom_msg: String,

    /// Whether to mention the cluster's total capacity in the alert
    #[serde(default)]
    pub include_capacity: bool,
}

/// The named rules attached to a quota path (or the default set)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuotaRuleSet {
    /// Rules keyed by name
    pub rules: BTreeMap<String, QuotaRule>,
}

/// A cluster capacity rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRule {
    /// Usage percentages that trigger an alert
    pub thresholds: Vec<f64>,

    /// Recipients of the alert
    pub mail_to: Vec<String>,

    /// Operator-supplied text appended to the alert body
    #[serde(default)]
    pub custom_msg: String,
}

/// A replication error rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationRule {
    /// Recipients of the alert
    pub mail_to: Vec<String>,

    /// Operator-supplied text appended to the alert body
    #[serde(default)]
    pub custom_msg: String,
}

/// Rule types that carry a threshold list
pub trait ThresholdRule {
    /// The configured thresholds, in configuration order
    fn thresholds(&self) -> &[f64];
}

impl ThresholdRule for QuotaRule {
    fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }
}

impl ThresholdRule for CapacityRule {
    fn thresholds(&self) -> &[f64] {
        &self.thresholds
    }
}

/// A rule combined with the metric values it was evaluated against
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveRule<R> {
    /// Monitored target (quota path, or the cluster name for capacity)
    pub target: String,

    /// Rule name
    pub name: String,

    /// The rule as configured
    pub rule: R,

    /// Bytes in use
    pub used_bytes: u64,

    /// Limit (quota) or total (cluster) in bytes
    pub limit_bytes: u64,

    /// Usage percentage, rounded to two decimals
    pub pct_used: f64,

    /// Highest threshold strictly below `pct_used`, if any
    pub alert_threshold: Option<f64>,
}

impl<R> EffectiveRule<R> {
    /// Whether this rule currently has an active alert
    pub fn is_alerting(&self) -> bool {
        self.alert_threshold.is_some()
    }
}
