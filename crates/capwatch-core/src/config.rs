//! Configuration management for capwatch
//!
//! The configuration is a JSON document describing how to reach the cluster,
//! how to send mail, and which rules apply to each check family.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{CapacityRule, QuotaRuleSet, ReplicationRule, ThresholdRule};

/// Environment variable overriding `cluster_settings.password`
pub const CLUSTER_PASSWORD_ENV: &str = "CAPWATCH_CLUSTER_PASSWORD";

/// Environment variable overriding `email_settings.password`
pub const SMTP_PASSWORD_ENV: &str = "CAPWATCH_SMTP_PASSWORD";

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster connection settings
    pub cluster_settings: ClusterSettings,

    /// Mail settings
    pub email_settings: EmailSettings,

    /// Rules for explicitly configured quota paths
    pub quota_rules: BTreeMap<String, QuotaRuleSet>,

    /// Rules for every quota path without an explicit entry
    pub default_quota_rules: QuotaRuleSet,

    /// Cluster capacity rules
    #[serde(default)]
    pub capacity_rules: BTreeMap<String, CapacityRule>,

    /// Replication error rules
    #[serde(default)]
    pub replication_rules: BTreeMap<String, ReplicationRule>,
}

/// Cluster connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSettings {
    /// Display name used in alert subjects
    pub cluster_name: String,
    /// Hostname or IP of the REST endpoint
    pub cluster_address: String,
    /// REST port
    #[serde(default = "default_rest_port")]
    pub rest_port: u16,
    /// API user
    pub username: String,
    /// API password
    #[serde(default)]
    pub password: String,
    /// Whether to verify the cluster's TLS certificate
    #[serde(default)]
    pub verify_certificate: bool,
}

/// Outgoing mail settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    /// Sender address
    pub sender_address: String,
    /// SMTP relay host
    pub server_address: String,
    /// SMTP relay port
    #[serde(default = "default_smtp_port")]
    pub server_port: u16,
    /// Optional SMTP user
    #[serde(default)]
    pub username: Option<String>,
    /// Optional SMTP password
    #[serde(default)]
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS
    #[serde(default)]
    pub starttls: bool,
}

fn default_rest_port() -> u16 {
    8000
}

fn default_smtp_port() -> u16 {
    25
}

impl Config {
    /// Load, override from the environment, and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::config(format!(
                "Configuration file \"{}\" does not exist",
                path.display()
            )));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Unable to read {}: {e}", path.display()))
        })?;

        let mut config = Self::from_json(&raw)
            .map_err(|e| Error::config(format!("Invalid JSON file {}: {e}", path.display())))?;

        config.apply_env_overrides();
        config.validate()?;

        debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse a configuration document without validating it
    pub fn from_json(raw: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Replace secrets with values from the environment, if set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var(CLUSTER_PASSWORD_ENV) {
            self.cluster_settings.password = password;
        }
        if let Ok(password) = std::env::var(SMTP_PASSWORD_ENV) {
            self.email_settings.password = Some(password);
        }
    }

    /// Check rule definitions
    ///
    /// Thresholds must lie within 0-100 and every rule needs at least one
    /// recipient. A threshold of 0, or an empty threshold list, is accepted
    /// with a warning.
    pub fn validate(&self) -> Result<()> {
        for (path, set) in &self.quota_rules {
            for (name, rule) in &set.rules {
                check_thresholds(&format!("quota rule \"{name}\" on \"{path}\""), rule)?;
                check_recipients(&format!("quota rule \"{name}\" on \"{path}\""), &rule.mail_to)?;
            }
        }

        for (name, rule) in &self.default_quota_rules.rules {
            check_thresholds(&format!("default quota rule \"{name}\""), rule)?;
            check_recipients(&format!("default quota rule \"{name}\""), &rule.mail_to)?;
        }

        for (name, rule) in &self.capacity_rules {
            check_thresholds(&format!("capacity rule \"{name}\""), rule)?;
            check_recipients(&format!("capacity rule \"{name}\""), &rule.mail_to)?;
        }

        for (name, rule) in &self.replication_rules {
            check_recipients(&format!("replication rule \"{name}\""), &rule.mail_to)?;
        }

        Ok(())
    }
}

fn check_thresholds(what: &str, rule: &impl ThresholdRule) -> Result<()> {
    if rule.thresholds().is_empty() {
        warn!("{what} has no thresholds and will never alert");
    }

    for &threshold in rule.thresholds() {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(Error::validation(format!(
                "{what} has threshold {threshold} outside 0-100"
            )));
        }
        if threshold == 0.0 {
            warn!("{what} has a threshold of 0 and will always alert");
        }
    }

    Ok(())
}

fn check_recipients(what: &str, mail_to: &[String]) -> Result<()> {
    if mail_to.iter().all(|r| r.trim().is_empty()) {
        return Err(Error::validation(format!("{what} has no recipients")));
    }
    Ok(())
}
