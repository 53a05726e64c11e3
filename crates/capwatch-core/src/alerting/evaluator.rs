//! Threshold evaluation
//!
//! Turns current usage into an `alert_threshold` per rule: the highest
//! configured threshold that usage strictly exceeds.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::models::{
    CapacityRule, EffectiveRule, FsUsage, QuotaRule, Relationship, ThresholdRule,
};

use super::resolver::ResolvedQuota;

/// Quota rules currently alerting: path -> rule name -> rule
pub type QuotaAlerts = BTreeMap<String, BTreeMap<String, EffectiveRule<QuotaRule>>>;

/// Result of evaluating every resolved quota
#[derive(Debug, Clone, Default)]
pub struct QuotaEvaluation {
    /// Rules with an active alert; quotas without any are omitted
    pub alerts: QuotaAlerts,
    /// Quotas whose usage could not be computed
    pub errored: BTreeSet<String>,
}

/// Percentage of `limit` used, rounded half-up to two decimals
///
/// Ties are decided on the binary `f64` value, not the decimal one: 1.005%
/// is stored as slightly less and rounds to 1.0.
pub fn usage_pct(target: &str, used: u64, limit: u64) -> Result<f64> {
    if limit == 0 {
        return Err(Error::zero_capacity(target));
    }

    #[allow(clippy::cast_precision_loss)]
    let pct = used as f64 / limit as f64 * 100.0;
    Ok((pct * 100.0).round() / 100.0)
}

/// Highest threshold strictly below `pct_used`, or `None`
///
/// Zero thresholds are honored but logged, since they always fire.
pub fn alert_threshold(rule_name: &str, thresholds: &[f64], pct_used: f64) -> Option<f64> {
    let mut highest: Option<f64> = None;

    for &threshold in thresholds {
        if threshold == 0.0 {
            warn!(rule = %rule_name, "Rule has a threshold of 0");
        }
        if pct_used > threshold && highest.map_or(true, |h| threshold > h) {
            highest = Some(threshold);
        }
    }

    highest
}

fn effective<R: ThresholdRule + Clone>(
    target: &str,
    name: &str,
    rule: &R,
    used_bytes: u64,
    limit_bytes: u64,
    pct_used: f64,
) -> EffectiveRule<R> {
    EffectiveRule {
        target: target.to_string(),
        name: name.to_string(),
        rule: rule.clone(),
        used_bytes,
        limit_bytes,
        pct_used,
        alert_threshold: alert_threshold(name, rule.thresholds(), pct_used),
    }
}

/// Evaluate every rule of every quota
///
/// A quota with a zero limit is reported in `errored` and skipped; the other
/// quotas are still evaluated.
pub fn evaluate_quotas(resolved: &BTreeMap<String, ResolvedQuota>) -> QuotaEvaluation {
    let mut evaluation = QuotaEvaluation::default();

    for (path, quota) in resolved {
        let pct_used = match usage_pct(path, quota.usage.used_bytes, quota.usage.limit_bytes) {
            Ok(pct) => pct,
            Err(e) => {
                error!(path = %path, error = %e, "Skipping quota");
                evaluation.errored.insert(path.clone());
                continue;
            }
        };

        let mut alerting = BTreeMap::new();
        for (name, rule) in &quota.rules {
            debug!(path = %path, rule = %name, "Checking quota rule");

            let eff = effective(
                path,
                name,
                rule,
                quota.usage.used_bytes,
                quota.usage.limit_bytes,
                pct_used,
            );

            if let Some(threshold) = eff.alert_threshold {
                info!(
                    path = %path,
                    pct_used,
                    threshold,
                    "Quota usage exceeds configured threshold"
                );
                alerting.insert(name.clone(), eff);
            }
        }

        if !alerting.is_empty() {
            evaluation.alerts.insert(path.clone(), alerting);
        }
    }

    evaluation
}

/// Evaluate every capacity rule against the cluster's filesystem usage
///
/// Every configured rule is returned, alerting or not.
pub fn evaluate_capacity(
    cluster_name: &str,
    rules: &BTreeMap<String, CapacityRule>,
    fs: &FsUsage,
) -> Result<Vec<EffectiveRule<CapacityRule>>> {
    let used = fs.used_bytes();
    let pct_used = usage_pct(cluster_name, used, fs.total_bytes)?;

    Ok(rules
        .iter()
        .map(|(name, rule)| {
            let eff = effective(cluster_name, name, rule, used, fs.total_bytes, pct_used);
            debug!(
                rule = %name,
                pct_used,
                threshold = ?eff.alert_threshold,
                "Evaluated capacity rule"
            );
            eff
        })
        .collect())
}

/// Relationships on either end whose last job reported an error
pub fn errored_relationships(
    source: &[Relationship],
    target: &[Relationship],
) -> Vec<Relationship> {
    source
        .iter()
        .chain(target)
        .filter(|r| r.has_error())
        .cloned()
        .collect()
}
