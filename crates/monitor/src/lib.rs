//! Dashboard controller tying the aggregation engine to a live task source.
//!
//! [`Dashboard`] fetches the four task populations, keeps the last good copy
//! of each, and drives two refresh loops: a fixed 3s merge poll that runs
//! only while a merge task is running, and an optional user-set scan
//! refresh. Every state change bumps a revision on a `watch` channel.

pub mod dashboard;
pub mod timer;

#[cfg(test)]
mod fake;

pub use dashboard::{
    Dashboard, DashboardOptions, DashboardSnapshot, ExtractionReport, FullRefresh,
    MERGE_POLL_PERIOD, PollingStatus, RefreshOutcome,
};
pub use timer::{PollTimer, TickControl};
