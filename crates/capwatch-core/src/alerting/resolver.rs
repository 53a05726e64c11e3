//! Rule resolution
//!
//! Pairs every quota reported by the cluster with the rules that govern it:
//! the quota's own entry in `quota_rules` if there is one, otherwise the
//! default rule set. The two are never combined.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{QuotaRule, QuotaRuleSet, QuotaUsage};

/// Where a quota's rules came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOrigin {
    /// An explicit `quota_rules` entry for the path
    Defined,
    /// The `default_quota_rules` set
    Default,
}

/// A quota together with the rules that apply to it
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuota {
    /// Current usage of the quota
    pub usage: QuotaUsage,
    /// Rules keyed by name
    pub rules: BTreeMap<String, QuotaRule>,
    /// Which rule set was used
    pub origin: RuleOrigin,
}

/// Resolve the effective rule set for each quota, keyed by path
///
/// If the source reports the same path twice, the later record wins.
pub fn resolve_quota_rules(
    quotas: &[QuotaUsage],
    defined: &BTreeMap<String, QuotaRuleSet>,
    default: &QuotaRuleSet,
) -> BTreeMap<String, ResolvedQuota> {
    quotas
        .iter()
        .map(|usage| {
            let (rules, origin) = match defined.get(&usage.path) {
                Some(set) => (set.rules.clone(), RuleOrigin::Defined),
                None => (default.rules.clone(), RuleOrigin::Default),
            };

            debug!(
                path = %usage.path,
                origin = ?origin,
                rules = rules.len(),
                "Resolved quota rules"
            );

            (
                usage.path.clone(),
                ResolvedQuota {
                    usage: usage.clone(),
                    rules,
                    origin,
                },
            )
        })
        .collect()
}
