//! Check orchestration
//!
//! Runs the capacity, quota, and replication checks in turn. Each check loads
//! the history, evaluates and deduplicates in memory, dispatches its alerts,
//! then saves the history once.

use std::fmt;

use tracing::{error, info, warn};

use crate::alerting::{
    capacity_alert, dedup_capacity, dedup_quotas, dedup_replication, dispatch_all,
    errored_relationships, evaluate_capacity, evaluate_quotas, quota_alert, replication_alert,
    resolve_quota_rules, AlertMessage, HistoryStore, Notifier,
};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::History;
use crate::source::MetricSource;

/// A family of checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum CheckFamily {
    /// Cluster capacity thresholds
    Capacity,
    /// Quota usage thresholds
    Quotas,
    /// Replication relationship errors
    Replication,
}

impl CheckFamily {
    /// Every family, in run order
    pub const ALL: [Self; 3] = [Self::Capacity, Self::Quotas, Self::Replication];
}

impl fmt::Display for CheckFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Capacity => "capacity",
            Self::Quotas => "quotas",
            Self::Replication => "replication",
        })
    }
}

/// Outcome of one family's check
#[derive(Debug)]
pub struct FamilyReport {
    /// Which family ran
    pub family: CheckFamily,
    /// Alerts handed to the notifier successfully
    pub notified: usize,
    /// Alerts whose dispatch failed (subject, error)
    pub failed: Vec<(String, String)>,
    /// Targets that could not be evaluated
    pub evaluation_errors: Vec<String>,
    /// Set when the family was skipped entirely
    pub skipped: Option<String>,
}

impl FamilyReport {
    fn new(family: CheckFamily) -> Self {
        Self {
            family,
            notified: 0,
            failed: Vec::new(),
            evaluation_errors: Vec::new(),
            skipped: None,
        }
    }

    fn skipped(family: CheckFamily, reason: &Error) -> Self {
        Self {
            skipped: Some(reason.to_string()),
            ..Self::new(family)
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// One report per family, in run order
    pub reports: Vec<FamilyReport>,
}

impl RunSummary {
    /// Total alerts handed to the notifier
    pub fn notified(&self) -> usize {
        self.reports.iter().map(|r| r.notified).sum()
    }

    /// Whether any alert failed, any target errored, or any family was skipped
    pub fn has_problems(&self) -> bool {
        self.reports.iter().any(|r| {
            !r.failed.is_empty() || !r.evaluation_errors.is_empty() || r.skipped.is_some()
        })
    }

    /// Whether every requested family ran to completion
    ///
    /// Failed sends and per-target evaluation errors do not count against
    /// completion; a skipped family does.
    pub fn all_completed(&self) -> bool {
        self.reports.iter().all(|r| r.skipped.is_none())
    }

    /// Report for one family, if it ran
    pub fn report(&self, family: CheckFamily) -> Option<&FamilyReport> {
        self.reports.iter().find(|r| r.family == family)
    }
}

/// Runs checks against a metric source and notifies about new alerts
pub struct Checker {
    config: Config,
    source: Box<dyn MetricSource>,
    notifier: Box<dyn Notifier>,
    store: HistoryStore,
}

impl Checker {
    /// Create a checker
    pub fn new(
        config: Config,
        source: Box<dyn MetricSource>,
        notifier: Box<dyn Notifier>,
        store: HistoryStore,
    ) -> Self {
        Self {
            config,
            source,
            notifier,
            store,
        }
    }

    fn cluster_name(&self) -> &str {
        &self.config.cluster_settings.cluster_name
    }

    /// Run the given families in order
    ///
    /// Only history and configuration problems abort the run; metric fetch
    /// failures and dispatch failures are reported in the summary.
    pub async fn run(&self, families: &[CheckFamily]) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        for &family in families {
            let report = match family {
                CheckFamily::Capacity => self.check_capacity().await,
                CheckFamily::Quotas => self.check_quotas().await,
                CheckFamily::Replication => self.check_replication().await,
            };

            let report = match report {
                Ok(report) => report,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(family = %family, error = %e, "Check skipped");
                    FamilyReport::skipped(family, &e)
                }
            };
            summary.reports.push(report);
        }

        Ok(summary)
    }

    /// Run every family
    pub async fn run_all(&self) -> Result<RunSummary> {
        self.run(&CheckFamily::ALL).await
    }

    async fn finish(
        &self,
        mut report: FamilyReport,
        messages: Vec<AlertMessage>,
        history: &History,
    ) -> Result<FamilyReport> {
        let dispatch = dispatch_all(self.notifier.as_ref(), &messages).await;
        report.notified = dispatch.sent;
        report.failed = dispatch
            .failed
            .into_iter()
            .map(|(subject, e)| (subject, e.to_string()))
            .collect();

        self.store.save(history)?;
        Ok(report)
    }

    async fn check_capacity(&self) -> Result<FamilyReport> {
        info!("Checking the cluster capacity");
        let mut report = FamilyReport::new(CheckFamily::Capacity);
        let mut history = self.store.load()?;

        let fs = self.source.fs_usage().await?;
        let rules = &self.config.capacity_rules;
        let evaluated = match evaluate_capacity(self.cluster_name(), rules, &fs) {
            Ok(evaluated) => evaluated,
            Err(e @ Error::ZeroCapacity { .. }) => {
                error!(error = %e, "Cannot evaluate cluster capacity");
                report.evaluation_errors.push(e.to_string());
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        let notify = dedup_capacity(evaluated, &mut history.capacity);
        let messages = notify
            .iter()
            .map(|alert| capacity_alert(self.cluster_name(), alert))
            .collect();

        self.finish(report, messages, &history).await
    }

    async fn check_quotas(&self) -> Result<FamilyReport> {
        info!("Checking the quotas");
        let mut report = FamilyReport::new(CheckFamily::Quotas);
        let mut history = self.store.load()?;

        let total_capacity = match self.source.fs_usage().await {
            Ok(fs) => Some(fs.total_bytes),
            Err(e) => {
                warn!(error = %e, "Cluster capacity unavailable for quota alerts");
                None
            }
        };
        let quotas = self.source.quota_usages().await?;

        let resolved = resolve_quota_rules(
            &quotas,
            &self.config.quota_rules,
            &self.config.default_quota_rules,
        );
        let evaluation = evaluate_quotas(&resolved);
        report.evaluation_errors = evaluation
            .errored
            .iter()
            .map(|path| Error::zero_capacity(path.as_str()).to_string())
            .collect();

        let notify = dedup_quotas(evaluation.alerts, &evaluation.errored, &mut history.quotas);
        let messages = notify
            .iter()
            .map(|alert| {
                info!(
                    path = %alert.target,
                    rule = %alert.name,
                    threshold = ?alert.alert_threshold,
                    "Quota exceeds threshold"
                );
                quota_alert(self.cluster_name(), alert, total_capacity)
            })
            .collect();

        self.finish(report, messages, &history).await
    }

    async fn check_replication(&self) -> Result<FamilyReport> {
        info!("Checking replication relationships");
        let report = FamilyReport::new(CheckFamily::Replication);
        let mut history = self.store.load()?;

        let source = self.source.source_relationships().await?;
        let target = self.source.target_relationships().await?;
        let errors = errored_relationships(&source, &target);

        let notify = dedup_replication(
            &self.config.replication_rules,
            &errors,
            &mut history.replication,
        );
        let messages = notify
            .iter()
            .map(|(_, rule)| replication_alert(self.cluster_name(), rule, &errors))
            .collect();

        self.finish(report, messages, &history).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerting::NotificationError;
    use crate::models::{FsUsage, QuotaUsage, Relationship};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const GB: u64 = 1_000_000_000;

    const CONFIG: &str = r#"{
        "cluster_settings": {
            "cluster_name": "prod",
            "cluster_address": "10.0.0.1",
            "username": "admin"
        },
        "email_settings": {
            "sender_address": "alerts@example.com",
            "server_address": "smtp.example.com"
        },
        "quota_rules": {
            "/eng": {"rules": {"eng": {"thresholds": [90, 95], "mail_to": ["eng@example.com"]}}}
        },
        "default_quota_rules": {
            "rules": {"default": {"thresholds": [80], "mail_to": ["ops@example.com"]}}
        },
        "capacity_rules": {
            "cluster": {"thresholds": [70, 80], "mail_to": ["ops@example.com"]}
        },
        "replication_rules": {
            "repl": {"mail_to": ["ops@example.com"]}
        }
    }"#;

    #[derive(Default)]
    struct Snapshot {
        fs: Option<FsUsage>,
        quotas: Vec<QuotaUsage>,
        source: Vec<Relationship>,
        target: Vec<Relationship>,
    }

    #[derive(Clone, Default)]
    struct FakeSource(Arc<Mutex<Snapshot>>);

    #[async_trait]
    impl MetricSource for FakeSource {
        async fn fs_usage(&self) -> Result<FsUsage> {
            self.0
                .lock()
                .unwrap()
                .fs
                .ok_or_else(|| Error::source("fs unavailable"))
        }

        async fn quota_usages(&self) -> Result<Vec<QuotaUsage>> {
            Ok(self.0.lock().unwrap().quotas.clone())
        }

        async fn source_relationships(&self) -> Result<Vec<Relationship>> {
            Ok(self.0.lock().unwrap().source.clone())
        }

        async fn target_relationships(&self) -> Result<Vec<Relationship>> {
            Ok(self.0.lock().unwrap().target.clone())
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        sent: Arc<Mutex<Vec<AlertMessage>>>,
        reject: Arc<Mutex<Option<String>>>,
    }

    impl Recorder {
        fn take(&self) -> Vec<AlertMessage> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotificationError> {
            let reject = self.reject.lock().unwrap().clone();
            if reject.is_some_and(|r| message.recipients.contains(&r)) {
                return Err(NotificationError::Build("rejected".to_string()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Harness {
        _dir: TempDir,
        source: FakeSource,
        recorder: Recorder,
        store: HistoryStore,
        checker: Checker,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let store = HistoryStore::new(dir.path().join("history.json"));
        let source = FakeSource::default();
        let recorder = Recorder::default();
        let checker = Checker::new(
            Config::from_json(CONFIG).unwrap(),
            Box::new(source.clone()),
            Box::new(recorder.clone()),
            store.clone(),
        );
        Harness {
            _dir: dir,
            source,
            recorder,
            store,
            checker,
        }
    }

    fn quota(path: &str, used_gb: u64) -> QuotaUsage {
        QuotaUsage {
            path: path.to_string(),
            used_bytes: used_gb * GB,
            limit_bytes: 100 * GB,
        }
    }

    fn failed_relationship() -> Relationship {
        Relationship {
            source_cluster_name: "prod".to_string(),
            error_from_last_job: Some("Connection refused".to_string()),
            ..Relationship::default()
        }
    }

    #[tokio::test]
    async fn test_quota_new_then_escalated() {
        let h = harness();
        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 91)];

        h.checker.run(&[CheckFamily::Quotas]).await.unwrap();
        let sent = h.recorder.take();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("usage threshold of 90%"));
        assert_eq!(sent[0].recipients, vec!["eng@example.com".to_string()]);
        assert_eq!(h.store.load().unwrap().quotas["/eng"]["eng"].alert_threshold, 90.0);

        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 96)];
        h.checker.run(&[CheckFamily::Quotas]).await.unwrap();
        let sent = h.recorder.take();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].body.contains("usage threshold of 95%"));
        assert_eq!(h.store.load().unwrap().quotas["/eng"]["eng"].alert_threshold, 95.0);
    }

    #[tokio::test]
    async fn test_second_run_is_silent() {
        let h = harness();
        {
            let mut snap = h.source.0.lock().unwrap();
            snap.fs = Some(FsUsage {
                total_bytes: 100,
                free_bytes: 15,
            });
            snap.quotas = vec![quota("/eng", 91), quota("/home", 85)];
            snap.source = vec![failed_relationship()];
        }

        let first = h.checker.run_all().await.unwrap();
        assert_eq!(first.notified(), 4);
        assert!(!first.has_problems());
        let history = h.store.load().unwrap();

        let second = h.checker.run_all().await.unwrap();
        assert_eq!(second.notified(), 0);
        h.recorder.take();
        assert_eq!(h.store.load().unwrap(), history);
    }

    #[tokio::test]
    async fn test_recovery_clears_history() {
        let h = harness();
        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 91)];
        h.checker.run(&[CheckFamily::Quotas]).await.unwrap();

        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 50)];
        let summary = h.checker.run(&[CheckFamily::Quotas]).await.unwrap();

        assert_eq!(summary.notified(), 0);
        assert!(h.store.load().unwrap().quotas.is_empty());

        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 91)];
        let summary = h.checker.run(&[CheckFamily::Quotas]).await.unwrap();
        assert_eq!(summary.notified(), 1);
    }

    #[tokio::test]
    async fn test_replication_aggregates_and_clears() {
        let h = harness();
        h.source.0.lock().unwrap().target = vec![failed_relationship(), failed_relationship()];

        h.checker.run(&[CheckFamily::Replication]).await.unwrap();
        let sent = h.recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "prod: Relationship error alert.");
        assert_eq!(sent[0].body.matches("Connection refused").count(), 2);
        assert!(h.store.load().unwrap().replication.contains_key("repl"));

        h.source.0.lock().unwrap().target.clear();
        h.checker.run(&[CheckFamily::Replication]).await.unwrap();
        assert!(h.recorder.take().is_empty());
        assert!(h.store.load().unwrap().replication.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_escalation() {
        let h = harness();
        h.source.0.lock().unwrap().fs = Some(FsUsage {
            total_bytes: 100,
            free_bytes: 25,
        });
        h.checker.run(&[CheckFamily::Capacity]).await.unwrap();
        let sent = h.recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "prod: Cluster capacity alert. Usage has exceeded 70%");

        h.source.0.lock().unwrap().fs = Some(FsUsage {
            total_bytes: 100,
            free_bytes: 10,
        });
        h.checker.run(&[CheckFamily::Capacity]).await.unwrap();
        let sent = h.recorder.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(h.store.load().unwrap().capacity["cluster"].alert_threshold, 80.0);
    }

    #[tokio::test]
    async fn test_fetch_failure_skips_family_and_keeps_history() {
        let h = harness();
        let mut history = History::default();
        history
            .capacity
            .insert("cluster".to_string(), crate::models::CapacityHistoryEntry::new(80.0));
        h.store.save(&history).unwrap();

        let summary = h.checker.run(&[CheckFamily::Capacity, CheckFamily::Quotas]).await.unwrap();

        assert!(summary.report(CheckFamily::Capacity).unwrap().skipped.is_some());
        assert!(summary.report(CheckFamily::Quotas).unwrap().skipped.is_none());
        assert_eq!(h.store.load().unwrap().capacity, history.capacity);
    }

    #[tokio::test]
    async fn test_skipped_family_is_not_completed() {
        let h = harness();
        h.source.0.lock().unwrap().quotas = vec![quota("/home", 10)];

        let summary = h.checker.run_all().await.unwrap();

        assert_eq!(summary.reports.len(), 3);
        assert!(!summary.all_completed());

        h.source.0.lock().unwrap().fs = Some(FsUsage {
            total_bytes: 100,
            free_bytes: 90,
        });
        let summary = h.checker.run_all().await.unwrap();
        assert!(summary.all_completed());
        assert!(!summary.has_problems());
    }

    #[tokio::test]
    async fn test_failed_send_still_completes() {
        let h = harness();
        *h.recorder.reject.lock().unwrap() = Some("eng@example.com".to_string());
        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 91)];

        let summary = h.checker.run(&[CheckFamily::Quotas]).await.unwrap();

        assert!(summary.all_completed());
        assert!(summary.has_problems());
    }

    #[tokio::test]
    async fn test_zero_limit_quota_is_reported_and_kept() {
        let h = harness();
        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 91)];
        h.checker.run(&[CheckFamily::Quotas]).await.unwrap();
        h.recorder.take();

        h.source.0.lock().unwrap().quotas = vec![QuotaUsage {
            path: "/eng".to_string(),
            used_bytes: 5,
            limit_bytes: 0,
        }];
        let summary = h.checker.run(&[CheckFamily::Quotas]).await.unwrap();

        let report = summary.report(CheckFamily::Quotas).unwrap();
        assert_eq!(report.evaluation_errors.len(), 1);
        assert!(summary.has_problems());
        assert!(h.store.load().unwrap().quotas.contains_key("/eng"));
    }

    #[tokio::test]
    async fn test_failed_send_does_not_block_others() {
        let h = harness();
        *h.recorder.reject.lock().unwrap() = Some("eng@example.com".to_string());
        h.source.0.lock().unwrap().quotas = vec![quota("/eng", 91), quota("/home", 85)];

        let summary = h.checker.run(&[CheckFamily::Quotas]).await.unwrap();

        let report = summary.report(CheckFamily::Quotas).unwrap();
        assert_eq!(report.notified, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(h.recorder.take()[0].subject, "prod: Soft quota alert on path /home");
        // Failed alerts are still recorded as sent.
        assert!(h.store.load().unwrap().quotas.contains_key("/eng"));
    }

    #[tokio::test]
    async fn test_corrupt_history_aborts_run() {
        let h = harness();
        std::fs::write(h.store.path(), "{not json").unwrap();

        let err = h.checker.run_all().await.unwrap_err();
        assert!(matches!(err, Error::History { .. }));
        assert!(h.recorder.take().is_empty());
    }
}
