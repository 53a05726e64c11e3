//! Alert message rendering

use chrono::{DateTime, TimeZone};

use crate::models::{CapacityRule, EffectiveRule, QuotaRule, Relationship, ReplicationRule};

const PARAGRAPH: &str = "<br><br>";

/// A rendered alert, ready to hand to a notifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    /// Recipient addresses
    pub recipients: Vec<String>,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub body: String,
}

impl AlertMessage {
    /// Body with the "Alert sent on" footer appended
    pub fn body_with_footer<Tz>(&self, sent_at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}{PARAGRAPH}Alert sent on {}",
            self.body,
            sent_at.format("%A, %d. %B %Y %I:%M%p")
        )
    }
}

/// Format a byte count in base-1000 units, matching the cluster's web UI
///
/// ```
/// use capwatch::alerting::humanize_bytes;
/// assert_eq!(humanize_bytes(1_200_000.0, "B"), "1.2MB");
/// ```
pub fn humanize_bytes(num: f64, suffix: &str) -> String {
    let mut num = num;
    for unit in ["", "K", "M", "G", "T", "P", "E", "Z"] {
        if num.abs() < 1000.0 {
            return format!("{num:.1}{unit}{suffix}");
        }
        num /= 1000.0;
    }
    format!("{num:.1}Y{suffix}")
}

/// Percentage as shown in alerts: whole values keep one decimal ("91.0")
fn percent(pct: f64) -> String {
    if pct.fract() == 0.0 {
        format!("{pct:.1}")
    } else {
        pct.to_string()
    }
}

#[allow(clippy::cast_precision_loss)]
fn bytes(n: u64) -> String {
    humanize_bytes(n as f64, "B")
}

/// Render a soft quota alert
///
/// `total_capacity` is only shown when the rule asks for it.
pub fn quota_alert(
    cluster_name: &str,
    alert: &EffectiveRule<QuotaRule>,
    total_capacity: Option<u64>,
) -> AlertMessage {
    let threshold = alert.alert_threshold.unwrap_or_default();
    let subject = format!("{cluster_name}: Soft quota alert on path {}", alert.target);

    let mut body = format!(
        "The quota on directory path \"{}\" has exceeded the usage threshold of {threshold}%.\
         {PARAGRAPH}Current quota usage is {} out of {}.  ({}% full)",
        alert.target,
        bytes(alert.used_bytes),
        bytes(alert.limit_bytes),
        percent(alert.pct_used),
    );

    if alert.rule.include_capacity {
        if let Some(total) = total_capacity {
            body.push_str(&format!("{PARAGRAPH}Cluster total capacity: {}", bytes(total)));
        }
    }

    if !alert.rule.custom_msg.is_empty() {
        body.push_str(PARAGRAPH);
        body.push_str(&alert.rule.custom_msg);
    }

    AlertMessage {
        recipients: alert.rule.mail_to.clone(),
        subject,
        body,
    }
}

/// Render a cluster capacity alert
pub fn capacity_alert(cluster_name: &str, alert: &EffectiveRule<CapacityRule>) -> AlertMessage {
    let threshold = alert.alert_threshold.unwrap_or_default();
    let subject =
        format!("{cluster_name}: Cluster capacity alert. Usage has exceeded {threshold}%");

    let mut body = format!(
        "The cluster \"{cluster_name}\" has exceeded its usage threshold of {threshold}%. \
         Current usage is {} out of {} ({}% full).",
        bytes(alert.used_bytes),
        bytes(alert.limit_bytes),
        percent(alert.pct_used),
    );

    if !alert.rule.custom_msg.is_empty() {
        body.push_str(PARAGRAPH);
        body.push_str(&alert.rule.custom_msg.replace('\n', PARAGRAPH));
    }

    AlertMessage {
        recipients: alert.rule.mail_to.clone(),
        subject,
        body,
    }
}

/// Render one alert listing every errored replication relationship
pub fn replication_alert(
    cluster_name: &str,
    rule: &ReplicationRule,
    errors: &[Relationship],
) -> AlertMessage {
    let mut body = format!(
        "The following replication relationships have reported an error:{PARAGRAPH}"
    );

    for rel in errors {
        let lines = [
            format!("Source cluster name: {}", rel.source_cluster_name),
            format!("Source replication root path: {}", rel.source_root_path),
            format!("Target cluster name: {}", rel.target_cluster_name),
            format!("Target replication root path: {}", rel.target_root_path),
            format!(
                "Recovery point: {}",
                rel.recovery_point.as_deref().unwrap_or("None")
            ),
            format!(
                "Error from last replication job: {}",
                rel.error_from_last_job.as_deref().unwrap_or_default()
            ),
        ];
        for line in lines {
            body.push_str(&line);
            body.push_str(PARAGRAPH);
        }
    }

    body.push_str(&rule.custom_msg);

    AlertMessage {
        recipients: rule.mail_to.clone(),
        subject: format!("{cluster_name}: Relationship error alert."),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const GB: u64 = 1_000_000_000;

    #[rstest]
    #[case(0.0, "0.0B")]
    #[case(999.0, "999.0B")]
    #[case(1_250.0, "1.2KB")]
    #[case(1_260.0, "1.3KB")]
    #[case(1_200_000.0, "1.2MB")]
    #[case(1_234_567.0, "1.2MB")]
    #[case(100_000_000_000.0, "100.0GB")]
    #[case(2.5e15, "2.5PB")]
    #[case(3.0e24, "3.0YB")]
    #[case(4.0e27, "4000.0YB")]
    fn test_humanize_bytes(#[case] num: f64, #[case] expected: &str) {
        assert_eq!(humanize_bytes(num, "B"), expected);
    }

    #[test]
    fn test_humanize_custom_suffix() {
        assert_eq!(humanize_bytes(10.0, " files"), "10.0 files");
        assert_eq!(humanize_bytes(1500.0, ""), "1.5K");
    }

    fn quota(include_capacity: bool, custom_msg: &str) -> EffectiveRule<QuotaRule> {
        EffectiveRule {
            target: "/eng".to_string(),
            name: "eng".to_string(),
            rule: QuotaRule {
                thresholds: vec![90.0],
                mail_to: vec!["eng@example.com".to_string()],
                custom_msg: custom_msg.to_string(),
                include_capacity,
            },
            used_bytes: 91 * GB,
            limit_bytes: 100 * GB,
            pct_used: 91.0,
            alert_threshold: Some(90.0),
        }
    }

    #[test]
    fn test_quota_alert_body() {
        let msg = quota_alert("prod", &quota(false, ""), Some(500 * GB));

        assert_eq!(msg.subject, "prod: Soft quota alert on path /eng");
        assert_eq!(msg.recipients, vec!["eng@example.com".to_string()]);
        assert_eq!(
            msg.body,
            "The quota on directory path \"/eng\" has exceeded the usage threshold of 90%.\
             <br><br>Current quota usage is 91.0GB out of 100.0GB.  (91.0% full)"
        );
    }

    #[test]
    fn test_quota_alert_with_capacity_and_message() {
        let msg = quota_alert("prod", &quota(true, "Clean up /eng/tmp."), Some(500 * GB));

        assert!(msg.body.contains("<br><br>Cluster total capacity: 500.0GB"));
        assert!(msg.body.ends_with("<br><br>Clean up /eng/tmp."));
    }

    #[test]
    fn test_quota_alert_capacity_unknown() {
        let msg = quota_alert("prod", &quota(true, ""), None);
        assert!(!msg.body.contains("Cluster total capacity"));
    }

    #[test]
    fn test_capacity_alert() {
        let alert = EffectiveRule {
            target: "prod".to_string(),
            name: "cap".to_string(),
            rule: CapacityRule {
                thresholds: vec![80.0],
                mail_to: vec!["ops@example.com".to_string()],
                custom_msg: "Order disks.\nCall vendor.".to_string(),
            },
            used_bytes: 85 * GB,
            limit_bytes: 100 * GB,
            pct_used: 85.0,
            alert_threshold: Some(80.0),
        };

        let msg = capacity_alert("prod", &alert);

        assert_eq!(
            msg.subject,
            "prod: Cluster capacity alert. Usage has exceeded 80%"
        );
        assert_eq!(
            msg.body,
            "The cluster \"prod\" has exceeded its usage threshold of 80%. \
             Current usage is 85.0GB out of 100.0GB (85.0% full).\
             <br><br>Order disks.<br><br>Call vendor."
        );
    }

    #[test]
    fn test_replication_alert_bundles_relationships() {
        let rel = |src: &str| Relationship {
            source_cluster_name: src.to_string(),
            source_root_path: "/data/".to_string(),
            target_cluster_name: "dr".to_string(),
            target_root_path: "/backup/".to_string(),
            recovery_point: None,
            error_from_last_job: Some("connection refused".to_string()),
        };
        let rule = ReplicationRule {
            mail_to: vec!["ops@example.com".to_string()],
            custom_msg: "See runbook.".to_string(),
        };

        let msg = replication_alert("prod", &rule, &[rel("east"), rel("west")]);

        assert_eq!(msg.subject, "prod: Relationship error alert.");
        assert!(msg.body.contains("Source cluster name: east<br><br>"));
        assert!(msg.body.contains("Source cluster name: west<br><br>"));
        assert!(msg.body.contains("Recovery point: None<br><br>"));
        assert_eq!(msg.body.matches("connection refused").count(), 2);
        assert!(msg.body.ends_with("See runbook."));
    }

    #[test]
    fn test_percent_formatting() {
        assert_eq!(percent(91.0), "91.0");
        assert_eq!(percent(33.33), "33.33");
        assert_eq!(percent(12.5), "12.5");
    }

    #[test]
    fn test_footer() {
        let msg = AlertMessage {
            recipients: vec![],
            subject: String::new(),
            body: "Body".to_string(),
        };
        let at = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 5, 14, 7, 0)
            .unwrap();

        assert_eq!(
            msg.body_with_footer(&at),
            "Body<br><br>Alert sent on Tuesday, 05. March 2024 02:07PM"
        );
    }
}
