//! Alert deduplication against the persisted history
//!
//! Each (family, target, rule) moves between two states: absent from the
//! history, or recorded with the last threshold it alerted on. Only a move into
//! the recorded state, or a move to a strictly higher threshold, notifies.
//!
//! Every family works in two phases: current alerts are written first, then
//! the keys to purge are collected and removed in a separate pass.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::json;
use tracing::{debug, info, warn};

use crate::models::{
    CapacityHistory, CapacityHistoryEntry, CapacityRule, EffectiveRule, QuotaHistory,
    QuotaHistoryEntry, QuotaRule, Relationship, ReplicationHistory, ReplicationRule,
};

use super::evaluator::QuotaAlerts;
use super::render::humanize_bytes;

/// Outcome of comparing one rule's current state with its history entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Not alerting and nothing recorded
    Idle,
    /// Was recorded, no longer alerting; entry is removed
    Cleared,
    /// Alerting with nothing recorded; notify
    New(f64),
    /// Alerting above the recorded threshold; notify
    #[allow(missing_docs)]
    Escalated { from: f64, to: f64 },
    /// Alerting at or below the recorded threshold; entry refreshed silently
    #[allow(missing_docs)]
    Repeated { recorded: f64, current: f64 },
}

impl Transition {
    /// Decide the transition from the recorded and current thresholds
    pub fn decide(recorded: Option<f64>, current: Option<f64>) -> Self {
        match (recorded, current) {
            (None, None) => Self::Idle,
            (Some(_), None) => Self::Cleared,
            (None, Some(to)) => Self::New(to),
            (Some(from), Some(to)) if to > from => Self::Escalated { from, to },
            (Some(recorded), Some(current)) => Self::Repeated { recorded, current },
        }
    }

    /// Whether this transition sends a notification
    pub fn notifies(&self) -> bool {
        matches!(self, Self::New(_) | Self::Escalated { .. })
    }
}

#[allow(clippy::cast_precision_loss)]
fn quota_entry(alert: &EffectiveRule<QuotaRule>, threshold: f64) -> QuotaHistoryEntry {
    QuotaHistoryEntry {
        alert_threshold: threshold,
        pct_used: Some(alert.pct_used),
        quota_used: Some(humanize_bytes(alert.used_bytes as f64, "B")),
        quota_limit: Some(humanize_bytes(alert.limit_bytes as f64, "B")),
        ..QuotaHistoryEntry::new(threshold)
    }
}

/// Remove `keys` from `history`, returning how many entries were removed
///
/// A key that is already gone is logged and skipped: a rule deleted and
/// re-added between runs can leave the purge list pointing at nothing.
pub fn purge<V>(history: &mut BTreeMap<String, V>, keys: Vec<String>, what: &str) -> usize {
    let mut removed = 0;

    for key in keys {
        if history.remove(&key).is_some() {
            info!(key = %key, "{what} no longer alerting, removed from history");
            removed += 1;
        } else {
            warn!(key = %key, "Unable to remove {what} from the history, already absent");
        }
    }

    removed
}

/// Compare quota alerts with the history and return those to notify
///
/// Quotas listed in `errored` could not be evaluated this run; their history
/// is left untouched rather than treated as recovered.
pub fn dedup_quotas(
    alerts: QuotaAlerts,
    errored: &BTreeSet<String>,
    history: &mut QuotaHistory,
) -> Vec<EffectiveRule<QuotaRule>> {
    let mut notify = Vec::new();

    for (path, rules) in &alerts {
        for (name, alert) in rules {
            let recorded = history
                .get(path)
                .and_then(|r| r.get(name))
                .map(|e| e.alert_threshold);

            let transition = Transition::decide(recorded, alert.alert_threshold);
            let Some(threshold) = alert.alert_threshold else {
                continue;
            };

            debug!(path = %path, rule = %name, transition = ?transition, "Quota rule compared with history");

            history
                .entry(path.clone())
                .or_default()
                .insert(name.clone(), quota_entry(alert, threshold));

            if transition.notifies() {
                notify.push(alert.clone());
            }
        }
    }

    let mut quotas_to_remove = Vec::new();
    let mut rules_to_remove: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (path, rules) in history.iter() {
        if errored.contains(path) {
            continue;
        }
        match alerts.get(path) {
            None => quotas_to_remove.push(path.clone()),
            Some(active) => {
                let stale: Vec<String> = rules
                    .keys()
                    .filter(|name| !active.contains_key(*name))
                    .cloned()
                    .collect();
                if !stale.is_empty() {
                    rules_to_remove.insert(path.clone(), stale);
                }
            }
        }
    }

    purge(history, quotas_to_remove, "quota");
    for (path, names) in rules_to_remove {
        purge(history.entry(path).or_default(), names, "quota rule");
    }

    history.retain(|_, rules| !rules.is_empty());

    notify
}

/// Compare capacity rules with the history and return those to notify
///
/// History entries for rules that are no longer configured are purged too.
pub fn dedup_capacity(
    evaluated: Vec<EffectiveRule<CapacityRule>>,
    history: &mut CapacityHistory,
) -> Vec<EffectiveRule<CapacityRule>> {
    let mut notify = Vec::new();
    let mut active = BTreeSet::new();

    for rule in evaluated {
        let recorded = history.get(&rule.name).map(|e| e.alert_threshold);
        let transition = Transition::decide(recorded, rule.alert_threshold);

        debug!(rule = %rule.name, transition = ?transition, "Capacity rule compared with history");

        if let Some(threshold) = rule.alert_threshold {
            history.insert(rule.name.clone(), CapacityHistoryEntry::new(threshold));
            active.insert(rule.name.clone());
        }

        if transition.notifies() {
            info!(
                rule = %rule.name,
                pct_used = rule.pct_used,
                threshold = ?rule.alert_threshold,
                "Cluster usage exceeds threshold"
            );
            notify.push(rule);
        }
    }

    let to_remove: Vec<String> = history
        .keys()
        .filter(|name| !active.contains(*name))
        .cloned()
        .collect();

    purge(history, to_remove, "capacity rule");

    notify
}

/// Compare the replication error state with the history
///
/// Returns the rules to notify. All errored relationships are reported by a
/// single alert per rule, so the rule list is all the caller needs.
pub fn dedup_replication(
    rules: &BTreeMap<String, ReplicationRule>,
    errors: &[Relationship],
    history: &mut ReplicationHistory,
) -> Vec<(String, ReplicationRule)> {
    let mut notify = Vec::new();

    if !errors.is_empty() {
        for (name, rule) in rules {
            if history.contains_key(name) {
                debug!(rule = %name, "Replication errors already alerted");
                continue;
            }

            history.insert(
                name.clone(),
                json!({
                    "mail_to": rule.mail_to,
                    "custom_msg": rule.custom_msg,
                    "relationships": errors.len(),
                }),
            );
            info!(rule = %name, errors = errors.len(), "Replication relationship errors found");
            notify.push((name.clone(), rule.clone()));
        }
    }

    let to_remove: Vec<String> = history
        .keys()
        .filter(|name| errors.is_empty() || !rules.contains_key(*name))
        .cloned()
        .collect();

    purge(history, to_remove, "replication rule");

    notify
}
