//! Data models for capwatch

mod history;
mod metrics;
mod rule;

pub use history::*;
pub use metrics::*;
pub use rule::*;
