//! # Capwatch
//!
//! Threshold-crossing email alerts for a storage cluster.
//!
//! Capwatch polls a cluster for quota usage, overall capacity, and replication
//! relationship status, compares each against configured rules, and emails the
//! rule's recipients when a threshold is first crossed or a higher one is
//! reached. A JSON history file remembers what has already been sent, so runs
//! can be scheduled as often as desired without repeating alerts.
//!
//! ## Architecture
//!
//! - **Source**: cluster REST client supplying usage snapshots
//! - **Alerting**: rule resolution, threshold evaluation, deduplication, rendering
//! - **Checks**: one pass per family, loading and saving the history
//!
//! ## Quick Start
//!
//! ```bash
//! capwatch --config config.json --history history.json
//!
//! # Log alerts instead of emailing them
//! capwatch --config config.json --no-emails --debug
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod alerting;
pub mod checks;
pub mod config;
pub mod error;
pub mod models;
pub mod source;

pub use checks::{CheckFamily, Checker, RunSummary};
pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::alerting::{HistoryStore, LogNotifier, Notifier, SmtpNotifier};
    pub use crate::checks::{CheckFamily, Checker, RunSummary};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::source::{MetricSource, QumuloClient};
}
