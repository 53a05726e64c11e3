//! Alerting system for capwatch
//!
//! Resolves rules, evaluates thresholds, deduplicates against the persisted
//! history, and renders and delivers notifications.

pub mod dedup;
pub mod evaluator;
mod history;
mod notifier;
mod render;
pub mod resolver;

pub use dedup::{dedup_capacity, dedup_quotas, dedup_replication, purge, Transition};
pub use evaluator::{
    alert_threshold, errored_relationships, evaluate_capacity, evaluate_quotas, usage_pct,
    QuotaAlerts, QuotaEvaluation,
};
pub use history::{HistoryStore, DEFAULT_HISTORY_FILE};
pub use notifier::{
    dispatch_all, DispatchReport, LogNotifier, NotificationError, Notifier, SmtpNotifier,
};
pub use render::{capacity_alert, humanize_bytes, quota_alert, replication_alert, AlertMessage};
pub use resolver::{resolve_quota_rules, ResolvedQuota, RuleOrigin};
