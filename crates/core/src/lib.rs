pub mod error;
pub mod filter;
pub mod log_summary;
pub mod source;
pub mod status;
pub mod task;
pub mod view;

pub use error::FetchError;
pub use filter::{FilterState, FilteredTasks, TaskCounts};
pub use log_summary::{LogSummaries, SummaryValue, TaskLogSummary};
pub use source::{
    ArchivedTableRecord, ClusterTasks, LogLine, MergeTaskRecord, ScanTaskRecord,
    SourceTaskRecord, TaskSource, TestTableTaskRecord,
};
pub use status::TaskStatus;
pub use task::{CanonicalTask, TaskType};
pub use view::TaskPopulations;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
