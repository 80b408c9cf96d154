use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use tablewatch_core::view::RawPopulations;
use tablewatch_core::{
    CanonicalTask, FilterState, FilteredTasks, LogSummaries, TaskCounts, TaskPopulations,
    TaskSource, TaskStatus, TaskType,
};
use tablewatch_runtime_config::{MAX_SCAN_REFRESH_INTERVAL_SECS, MonitorSettings};

use crate::timer::{PollTimer, TickControl};

/// Period of the merge-task poll while any merge task is running.
pub const MERGE_POLL_PERIOD: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub cluster_id: String,
    /// Raw status forwarded to the scan fetch.
    pub scan_status_filter: Option<String>,
    pub archive_history_limit: usize,
    /// Run an extraction pass after full and scan refreshes.
    pub extract_log_summaries: bool,
}

impl DashboardOptions {
    pub fn new(cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            scan_status_filter: None,
            archive_history_limit: 50,
            extract_log_summaries: true,
        }
    }

    pub fn from_settings(settings: &MonitorSettings) -> Self {
        Self {
            cluster_id: settings.cluster_id.clone(),
            scan_status_filter: settings.scan_status_filter().map(str::to_string),
            archive_history_limit: settings.archive_history_limit,
            extract_log_summaries: settings.extract_log_summaries,
        }
    }
}

/// What a single population refresh did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// A fetch for the same population was outstanding, or the dashboard is disposed.
    Skipped,
    /// The fetch failed; the previous population was kept.
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, Self::Updated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullRefresh {
    pub merge: RefreshOutcome,
    pub scan: RefreshOutcome,
    pub archive: RefreshOutcome,
    pub extraction: Option<ExtractionReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    /// Tasks whose logs were fetched successfully.
    pub fetched: usize,
    /// Settled tasks, plus tasks already claimed by a concurrent pass.
    pub skipped: usize,
    pub failed: usize,
    /// Summary fields written during the pass.
    pub fields: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollingStatus {
    pub merge: bool,
    pub scan_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub tasks: Vec<CanonicalTask>,
    pub counts: TaskCounts,
    pub filter: FilterState,
    pub polling: PollingStatus,
    pub summaries: LogSummaries,
    pub revision: u64,
}

#[derive(Default)]
struct DashboardState {
    raw: RawPopulations,
    populations: TaskPopulations,
    filter: FilterState,
    summaries: LogSummaries,
}

struct Shared<S> {
    source: S,
    options: DashboardOptions,
    state: Mutex<DashboardState>,
    changes: watch::Sender<u64>,
    merge_in_flight: AtomicBool,
    scan_in_flight: AtomicBool,
    archive_in_flight: AtomicBool,
    extracting: Mutex<HashSet<String>>,
    disposed: AtomicBool,
    merge_timer: PollTimer,
    scan_timer: PollTimer,
}

/// Clears an in-flight flag when the fetch finishes or is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-task claim on the extraction in-flight set.
struct ExtractionClaim<'a> {
    set: &'a Mutex<HashSet<String>>,
    task_id: String,
}

impl<'a> ExtractionClaim<'a> {
    fn acquire(set: &'a Mutex<HashSet<String>>, task_id: &str) -> Option<Self> {
        let inserted = set
            .lock()
            .expect("extraction set mutex poisoned")
            .insert(task_id.to_string());
        inserted.then(|| Self {
            set,
            task_id: task_id.to_string(),
        })
    }
}

impl Drop for ExtractionClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.task_id);
        }
    }
}

impl<S> Shared<S> {
    fn lock_state(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().expect("dashboard state mutex poisoned")
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    fn notify(&self) {
        self.changes.send_modify(|revision| *revision += 1);
    }

    /// Mutate raw populations and rebuild the canonical view.
    fn update_raw(&self, apply: impl FnOnce(&mut RawPopulations)) {
        {
            let mut state = self.lock_state();
            apply(&mut state.raw);
            state.populations = TaskPopulations::build(&state.raw);
        }
        self.notify();
    }

    fn any_merge_running(&self) -> bool {
        self.lock_state().populations.any_merge_running()
    }

    fn polling_status(&self) -> PollingStatus {
        PollingStatus {
            merge: self.merge_timer.is_armed(),
            scan_interval_secs: self.scan_timer.period().map(|p| p.as_secs()),
        }
    }
}

impl<S: TaskSource + 'static> Shared<S> {
    async fn refresh_merge(self: &Arc<Self>) -> RefreshOutcome {
        if self.is_disposed() {
            return RefreshOutcome::Skipped;
        }
        let Some(_in_flight) = InFlight::acquire(&self.merge_in_flight) else {
            debug!("Merge fetch already in flight, skipping");
            return RefreshOutcome::Skipped;
        };
        match self.source.fetch_merge_tasks(&self.options.cluster_id).await {
            Ok(tasks) => {
                debug!(
                    "Fetched {} merge and {} test-table tasks",
                    tasks.merge.len(),
                    tasks.test_table.len()
                );
                self.update_raw(|raw| {
                    raw.merge = tasks.merge.into_iter().map(Arc::new).collect();
                    raw.test_table = tasks.test_table.into_iter().map(Arc::new).collect();
                });
                self.sync_merge_polling();
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!("Failed to refresh merge tasks, keeping previous data: {e}");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    async fn refresh_scan(self: &Arc<Self>) -> RefreshOutcome {
        if self.is_disposed() {
            return RefreshOutcome::Skipped;
        }
        let Some(_in_flight) = InFlight::acquire(&self.scan_in_flight) else {
            debug!("Scan fetch already in flight, skipping");
            return RefreshOutcome::Skipped;
        };
        let status_filter = self.options.scan_status_filter.as_deref();
        match self
            .source
            .fetch_scan_tasks(&self.options.cluster_id, status_filter)
            .await
        {
            Ok(scans) => {
                debug!("Fetched {} scan tasks", scans.len());
                self.update_raw(|raw| raw.scan = scans.into_iter().map(Arc::new).collect());
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!("Failed to refresh scan tasks, keeping previous data: {e}");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    async fn refresh_archive(self: &Arc<Self>) -> RefreshOutcome {
        if self.is_disposed() {
            return RefreshOutcome::Skipped;
        }
        let Some(_in_flight) = InFlight::acquire(&self.archive_in_flight) else {
            debug!("Archive history fetch already in flight, skipping");
            return RefreshOutcome::Skipped;
        };
        match self
            .source
            .fetch_archived_tables(&self.options.cluster_id, self.options.archive_history_limit)
            .await
        {
            Ok(archives) => {
                debug!("Fetched {} archived tables", archives.len());
                self.update_raw(|raw| raw.archive = archives.into_iter().map(Arc::new).collect());
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!("Failed to refresh archive history, keeping previous data: {e}");
                RefreshOutcome::Failed(e.to_string())
            }
        }
    }

    /// Candidates for log extraction: scan-channel archive/restore tasks
    /// that are not yet settled.
    fn extraction_candidates(&self) -> (Vec<String>, usize) {
        let state = self.lock_state();
        let mut settled = 0;
        let mut candidates = Vec::new();
        for task in state.populations.scan.iter().filter(|t| t.subtype.is_some()) {
            if state.summaries.is_settled(&task.id, &task.status) {
                settled += 1;
            } else {
                candidates.push(task.id.clone());
            }
        }
        (candidates, settled)
    }

    /// Whether a scan task has settled since the candidate list was built.
    fn settled_now(&self, task_id: &str) -> bool {
        let state = self.lock_state();
        state
            .populations
            .scan
            .iter()
            .find(|t| t.id == task_id)
            .is_some_and(|t| state.summaries.is_settled(task_id, &t.status))
    }

    async fn extract(&self) -> ExtractionReport {
        let (candidates, settled) = self.extraction_candidates();
        let mut report = ExtractionReport {
            skipped: settled,
            ..ExtractionReport::default()
        };

        for task_id in candidates {
            if self.is_disposed() {
                break;
            }
            let Some(_claim) = ExtractionClaim::acquire(&self.extracting, &task_id) else {
                debug!("Log extraction for {task_id} already running, skipping");
                report.skipped += 1;
                continue;
            };
            if self.settled_now(&task_id) {
                debug!("Task {task_id} settled by another pass, skipping");
                report.skipped += 1;
                continue;
            }
            match self.source.fetch_task_logs(&task_id).await {
                Ok(lines) => {
                    report.fetched += 1;
                    let written = self
                        .lock_state()
                        .summaries
                        .ingest_lines(&task_id, lines.iter().map(|l| l.message.as_str()));
                    if written > 0 {
                        debug!("Extracted {written} summary fields for {task_id}");
                        report.fields += written;
                        self.notify();
                    }
                }
                Err(e) => {
                    warn!("Failed to fetch logs for {task_id}: {e}");
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Start or stop the merge poll to match the current populations.
    fn sync_merge_polling(self: &Arc<Self>) {
        if self.is_disposed() {
            return;
        }
        if self.any_merge_running() {
            let weak = Arc::downgrade(self);
            if self
                .merge_timer
                .start(MERGE_POLL_PERIOD, move || merge_tick(weak.clone()))
            {
                info!("Merge task running, polling every {MERGE_POLL_PERIOD:?}");
                self.notify();
            }
        } else if self.merge_timer.stop() {
            info!("No merge task running, polling stopped");
            self.notify();
        }
    }
}

async fn merge_tick<S: TaskSource + 'static>(weak: Weak<Shared<S>>) -> TickControl {
    let Some(shared) = weak.upgrade() else {
        return TickControl::Stop;
    };
    if shared.is_disposed() {
        return TickControl::Stop;
    }
    if !shared.any_merge_running() {
        info!("No merge task running at tick, polling stopped");
        shared.notify();
        return TickControl::Stop;
    }
    shared.refresh_merge().await;
    TickControl::Continue
}

async fn scan_tick<S: TaskSource + 'static>(weak: Weak<Shared<S>>) -> TickControl {
    let Some(shared) = weak.upgrade() else {
        return TickControl::Stop;
    };
    if shared.is_disposed() {
        return TickControl::Stop;
    }
    // Pick up merges started while the merge poll is idle.
    if !shared.merge_timer.is_armed() {
        shared.refresh_merge().await;
    }
    if shared.refresh_scan().await.is_updated() && shared.options.extract_log_summaries {
        shared.extract().await;
    }
    TickControl::Continue
}

/// Aggregation and polling controller for one cluster.
///
/// Owns the raw populations, the filter state, the log summaries and both
/// refresh timers. Dropping the dashboard disposes it.
pub struct Dashboard<S> {
    shared: Arc<Shared<S>>,
}

impl<S: TaskSource + 'static> Dashboard<S> {
    pub fn new(source: S, options: DashboardOptions) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                source,
                options,
                state: Mutex::new(DashboardState::default()),
                changes,
                merge_in_flight: AtomicBool::new(false),
                scan_in_flight: AtomicBool::new(false),
                archive_in_flight: AtomicBool::new(false),
                extracting: Mutex::new(HashSet::new()),
                disposed: AtomicBool::new(false),
                merge_timer: PollTimer::new("merge"),
                scan_timer: PollTimer::new("scan"),
            }),
        }
    }

    pub fn options(&self) -> &DashboardOptions {
        &self.shared.options
    }

    /// Fetch all four populations, then run an extraction pass if enabled.
    pub async fn refresh_all(&self) -> FullRefresh {
        let (merge, scan, archive) = tokio::join!(
            self.shared.refresh_merge(),
            self.shared.refresh_scan(),
            self.shared.refresh_archive(),
        );
        let extraction = if self.shared.options.extract_log_summaries && !self.is_disposed() {
            Some(self.shared.extract().await)
        } else {
            None
        };
        FullRefresh {
            merge,
            scan,
            archive,
            extraction,
        }
    }

    /// Re-fetch merge and test-table tasks and re-evaluate merge polling.
    pub async fn refresh_merge_tasks(&self) -> RefreshOutcome {
        self.shared.refresh_merge().await
    }

    pub async fn refresh_scan_tasks(&self) -> RefreshOutcome {
        self.shared.refresh_scan().await
    }

    pub async fn refresh_archive_history(&self) -> RefreshOutcome {
        self.shared.refresh_archive().await
    }

    /// Fetch and parse logs for unsettled archive/restore scan tasks.
    ///
    /// Per-task fetch failures are logged and do not stop the pass.
    pub async fn extract_log_summaries(&self) -> ExtractionReport {
        if self.is_disposed() {
            return ExtractionReport::default();
        }
        self.shared.extract().await
    }

    /// Set the fixed scan refresh interval. Zero disables the scan timer;
    /// a different non-zero value re-arms it with the new period. Values
    /// above one day are clamped to one day.
    pub fn set_scan_refresh_interval(&self, secs: u64) {
        if self.is_disposed() {
            return;
        }
        let secs = secs.min(MAX_SCAN_REFRESH_INTERVAL_SECS);
        if secs == 0 {
            if self.shared.scan_timer.stop() {
                info!("Scan refresh disabled");
                self.shared.notify();
            }
            return;
        }
        let weak = Arc::downgrade(&self.shared);
        if self
            .shared
            .scan_timer
            .start(Duration::from_secs(secs), move || scan_tick(weak.clone()))
        {
            info!("Scan refresh every {secs}s");
            self.shared.notify();
        }
    }
}

impl<S> Dashboard<S> {
    /// Filtered, sorted view plus everything the presentation layer renders.
    pub fn snapshot(&self) -> DashboardSnapshot {
        let (FilteredTasks { tasks, counts }, filter, summaries) = {
            let state = self.shared.lock_state();
            (
                state.filter.apply(&state.populations),
                state.filter.clone(),
                state.summaries.clone(),
            )
        };
        DashboardSnapshot {
            tasks,
            counts,
            filter,
            polling: self.shared.polling_status(),
            summaries,
            revision: *self.shared.changes.borrow(),
        }
    }

    /// Unfiltered canonical sequence, newest first.
    pub fn all_tasks(&self) -> Vec<CanonicalTask> {
        self.shared.lock_state().populations.merged()
    }

    pub fn summaries(&self) -> LogSummaries {
        self.shared.lock_state().summaries.clone()
    }

    pub fn filter(&self) -> FilterState {
        self.shared.lock_state().filter.clone()
    }

    fn update_filter<T>(&self, apply: impl FnOnce(&mut FilterState) -> T) -> T {
        let out = apply(&mut self.shared.lock_state().filter);
        self.shared.notify();
        out
    }

    pub fn toggle_status(&self, status: TaskStatus) -> bool {
        self.update_filter(|f| f.toggle_status(status))
    }

    pub fn toggle_type(&self, task_type: TaskType) -> bool {
        self.update_filter(|f| f.toggle_type(task_type))
    }

    pub fn toggle_subtype(&self, subtype: impl Into<String>) -> bool {
        self.update_filter(|f| f.toggle_subtype(subtype))
    }

    pub fn set_query(&self, query: impl Into<String>) {
        self.update_filter(|f| f.set_query(query));
    }

    pub fn reset_filters(&self) {
        self.update_filter(FilterState::reset);
    }

    /// Revision counter bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.changes.subscribe()
    }

    /// Whether the merge poll timer is armed.
    pub fn is_polling(&self) -> bool {
        self.shared.merge_timer.is_armed()
    }

    pub fn polling_status(&self) -> PollingStatus {
        self.shared.polling_status()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    /// Stop both timers. Later refreshes are skipped.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shared.merge_timer.stop();
        self.shared.scan_timer.stop();
        info!("Dashboard for cluster {} disposed", self.shared.options.cluster_id);
        self.shared.notify();
    }
}

impl<S> Drop for Dashboard<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeSource;
    use tablewatch_core::testing;
    use tablewatch_core::{ClusterTasks, FetchError, LogLine, MergeTaskRecord};

    fn merge_tasks(records: &[(&str, &str)]) -> ClusterTasks {
        ClusterTasks {
            merge: records
                .iter()
                .map(|(id, status)| MergeTaskRecord::clone(&testing::merge_record(id, status)))
                .collect(),
            test_table: Vec::new(),
        }
    }

    fn dashboard(fake: &FakeSource) -> Dashboard<FakeSource> {
        Dashboard::new(fake.clone(), DashboardOptions::new("c1"))
    }

    fn log(message: &str) -> LogLine {
        LogLine {
            timestamp: None,
            level: None,
            message: message.to_string(),
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn poller_starts_on_running_and_stops_on_next_tick() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running")])));
        fake.push_merge(Ok(merge_tasks(&[("m-1", "success")])));
        let dash = dashboard(&fake);

        assert!(!dash.is_polling());
        assert_eq!(dash.refresh_merge_tasks().await, RefreshOutcome::Updated);
        assert!(dash.is_polling());

        sleep_ms(3_100).await;
        assert_eq!(fake.merge_calls(), 2);
        assert!(!dash.is_polling());

        sleep_ms(10_000).await;
        assert_eq!(fake.merge_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_keeps_fetching_while_running() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running")])));
        let dash = dashboard(&fake);

        dash.refresh_merge_tasks().await;
        sleep_ms(9_100).await;
        assert_eq!(fake.merge_calls(), 4);
        assert!(dash.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_cancels_itself_when_signal_dropped() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running")])));
        let dash = dashboard(&fake);
        dash.refresh_merge_tasks().await;
        assert!(dash.is_polling());

        // Bypass the refresh path so only the tick observes the change.
        {
            let mut state = dash.shared.lock_state();
            state.raw.merge = vec![testing::merge_record("m-1", "cancelled")];
            state.populations = TaskPopulations::build(&state.raw);
        }
        assert!(dash.is_polling());

        sleep_ms(3_100).await;
        assert_eq!(fake.merge_calls(), 1);
        assert!(!dash.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_running_refreshes_keep_a_single_timer() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running")])));
        let dash = dashboard(&fake);

        for _ in 0..3 {
            dash.refresh_merge_tasks().await;
        }
        sleep_ms(3_100).await;
        assert_eq!(fake.merge_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_is_skipped_while_fetch_outstanding() {
        let fake = FakeSource::default();
        fake.set_delay(Duration::from_secs(1));
        fake.push_merge(Ok(merge_tasks(&[("m-1", "success")])));
        let dash = dashboard(&fake);

        let (first, second) = tokio::join!(dash.refresh_merge_tasks(), dash.refresh_merge_tasks());
        assert_eq!(first, RefreshOutcome::Updated);
        assert_eq!(second, RefreshOutcome::Skipped);
        assert_eq!(fake.merge_calls(), 1);

        assert_eq!(dash.refresh_merge_tasks().await, RefreshOutcome::Updated);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fetch_keeps_previous_population() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "success")])));
        fake.push_merge(Err(FetchError::Transport("connection reset".into())));
        let dash = dashboard(&fake);

        assert!(dash.refresh_merge_tasks().await.is_updated());
        let outcome = dash.refresh_merge_tasks().await;
        assert!(matches!(outcome, RefreshOutcome::Failed(msg) if msg.contains("connection reset")));

        let tasks = dash.all_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "m-1");
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_all_merges_every_population() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(ClusterTasks {
            merge: vec![MergeTaskRecord::clone(&testing::merge_record_at(
                "m-1", "running", 40,
            ))],
            test_table: vec![tablewatch_core::TestTableTaskRecord::clone(
                &testing::test_table_record_at("t-1", "completed", 30),
            )],
        }));
        fake.push_scan(Ok(vec![tablewatch_core::ScanTaskRecord::clone(
            &testing::scan_record_at("s-1", "metadata_scan", "running", 20),
        )]));
        fake.push_archive(Ok(vec![tablewatch_core::ArchivedTableRecord::clone(
            &testing::archive_record("sales", "orders", 10),
        )]));
        let dash = dashboard(&fake);

        let refresh = dash.refresh_all().await;
        assert!(refresh.merge.is_updated());
        assert!(refresh.scan.is_updated());
        assert!(refresh.archive.is_updated());
        assert_eq!(refresh.extraction, Some(ExtractionReport::default()));
        assert_eq!(fake.archive_calls(), 1);

        let ids: Vec<String> = dash.all_tasks().into_iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![
                "m-1",
                "t-1",
                "s-1",
                "archive:sales.orders@1970-01-01T00:00:10+00:00"
            ]
        );
        assert!(dash.is_polling());
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_applies_filter_and_reports_counts() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running"), ("m-2", "success")])));
        fake.push_scan(Ok(vec![tablewatch_core::ScanTaskRecord::clone(
            &testing::scan_record("s-1", "metadata_scan", "running"),
        )]));
        let dash = dashboard(&fake);
        dash.refresh_all().await;

        assert!(dash.toggle_type(TaskType::Merge));
        let snapshot = dash.snapshot();
        assert_eq!(snapshot.tasks.len(), 2);
        assert!(snapshot.tasks.iter().all(|t| t.task_type == TaskType::Merge));
        assert_eq!(snapshot.counts.types[&TaskType::Scan], 1);
        assert_eq!(snapshot.counts.status_count(&TaskStatus::Running), 2);
        assert!(snapshot.polling.merge);

        dash.reset_filters();
        assert_eq!(dash.snapshot().tasks.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn filter_changes_bump_revision() {
        let fake = FakeSource::default();
        let dash = dashboard(&fake);
        let mut rx = dash.subscribe();
        let before = *rx.borrow_and_update();

        dash.set_query("orders");
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update() > before);
        assert_eq!(dash.filter().query, "orders");
        assert_eq!(dash.snapshot().revision, *rx.borrow());
    }

    #[tokio::test(start_paused = true)]
    async fn scan_interval_arms_rearms_and_disables() {
        let fake = FakeSource::default();
        let dash = dashboard(&fake);

        dash.set_scan_refresh_interval(10);
        assert_eq!(dash.polling_status().scan_interval_secs, Some(10));
        sleep_ms(20_100).await;
        assert_eq!(fake.scan_calls(), 2);

        dash.set_scan_refresh_interval(4);
        sleep_ms(4_100).await;
        assert_eq!(fake.scan_calls(), 3);

        dash.set_scan_refresh_interval(0);
        assert_eq!(dash.polling_status().scan_interval_secs, None);
        sleep_ms(30_000).await;
        assert_eq!(fake.scan_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_stops_both_timers() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running")])));
        let dash = dashboard(&fake);
        dash.refresh_merge_tasks().await;
        dash.set_scan_refresh_interval(5);

        dash.dispose();
        assert!(!dash.is_polling());
        assert_eq!(dash.polling_status(), PollingStatus::default());

        sleep_ms(30_000).await;
        assert_eq!(fake.merge_calls(), 1);
        assert_eq!(fake.scan_calls(), 0);
        assert_eq!(dash.refresh_merge_tasks().await, RefreshOutcome::Skipped);

        dash.set_scan_refresh_interval(5);
        assert_eq!(dash.polling_status().scan_interval_secs, None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_dashboard_stops_polling() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[("m-1", "running")])));
        let dash = dashboard(&fake);
        dash.refresh_merge_tasks().await;
        dash.set_scan_refresh_interval(2);
        drop(dash);

        sleep_ms(30_000).await;
        assert_eq!(fake.merge_calls(), 1);
        assert_eq!(fake.scan_calls(), 0);
    }

    fn archive_scans(fake: &FakeSource) {
        fake.push_scan(Ok(vec![
            tablewatch_core::ScanTaskRecord::clone(&testing::scan_record(
                "done", "archive_table", "success",
            )),
            tablewatch_core::ScanTaskRecord::clone(&testing::scan_record(
                "live", "restore_table", "running",
            )),
            tablewatch_core::ScanTaskRecord::clone(&testing::scan_record(
                "broken", "archive_table_policy", "running",
            )),
            tablewatch_core::ScanTaskRecord::clone(&testing::scan_record(
                "plain", "metadata_scan", "success",
            )),
        ]));
        fake.set_logs(
            "done",
            Ok(vec![log("[done] A150 files_moved=42 archive_location=/archive/db/t")]),
        );
        fake.set_logs(
            "live",
            Ok(vec![log("[live] AR190 files_restored=3 restored_location=/data/t")]),
        );
        fake.set_logs(
            "broken",
            Err(FetchError::Http {
                status: 500,
                body: "boom".into(),
            }),
        );
    }

    #[tokio::test(start_paused = true)]
    async fn settled_tasks_are_not_fetched_again() {
        let fake = FakeSource::default();
        archive_scans(&fake);
        let dash = dashboard(&fake);
        dash.refresh_scan_tasks().await;

        let first = dash.extract_log_summaries().await;
        assert_eq!(first.fetched, 2);
        assert_eq!(first.failed, 1);
        assert_eq!(first.skipped, 0);

        let second = dash.extract_log_summaries().await;
        assert_eq!(second.skipped, 1);
        assert_eq!(fake.log_calls("done"), 1);
        assert_eq!(fake.log_calls("live"), 2);
        assert_eq!(fake.log_calls("broken"), 2);
        assert_eq!(fake.log_calls("plain"), 0);

        let summaries = dash.summaries();
        assert_eq!(
            summaries.get("done").expect("summary")["files_moved"].to_string(),
            "42"
        );
        assert!(summaries.has_summary("live"));
        assert!(!summaries.has_summary("broken"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_passes_fetch_each_task_once() {
        let fake = FakeSource::default();
        fake.push_scan(Ok(vec![tablewatch_core::ScanTaskRecord::clone(
            &testing::scan_record("live", "restore_table", "running"),
        )]));
        fake.set_logs("live", Ok(vec![log("[live] AR190 files_restored=3 ")]));
        let dash = dashboard(&fake);
        dash.refresh_scan_tasks().await;
        fake.set_delay(Duration::from_secs(1));

        let (a, b) = tokio::join!(dash.extract_log_summaries(), dash.extract_log_summaries());
        assert_eq!(a.fetched + b.fetched, 1);
        assert_eq!(a.skipped + b.skipped, 1);
        assert_eq!(fake.log_calls("live"), 1);
        assert!(dash.summaries().has_summary("live"));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_tick_runs_extraction_when_enabled() {
        let fake = FakeSource::default();
        archive_scans(&fake);
        let dash = dashboard(&fake);

        dash.set_scan_refresh_interval(5);
        sleep_ms(5_100).await;
        assert_eq!(fake.scan_calls(), 1);
        assert_eq!(fake.log_calls("done"), 1);
        assert!(dash.summaries().has_summary("done"));

        let mut options = DashboardOptions::new("c1");
        options.extract_log_summaries = false;
        let quiet = Dashboard::new(fake.clone(), options);
        let refresh = quiet.refresh_all().await;
        assert_eq!(refresh.extraction, None);
        assert_eq!(fake.log_calls("done"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn staggered_passes_do_not_refetch_a_settled_task() {
        let fake = FakeSource::default();
        fake.push_scan(Ok(vec![
            tablewatch_core::ScanTaskRecord::clone(&testing::scan_record(
                "v", "restore_table", "running",
            )),
            tablewatch_core::ScanTaskRecord::clone(&testing::scan_record(
                "x", "archive_table", "success",
            )),
        ]));
        fake.set_logs("v", Ok(vec![log("[v] AR190 files_restored=3 ")]));
        fake.set_logs(
            "x",
            Ok(vec![log("[x] A150 files_moved=42 archive_location=/archive/x")]),
        );
        let dash = dashboard(&fake);
        dash.refresh_scan_tasks().await;
        fake.set_delay(Duration::from_secs(1));

        let late = async {
            sleep_ms(1_500).await;
            dash.extract_log_summaries().await
        };
        let (first, second) = tokio::join!(dash.extract_log_summaries(), late);

        assert_eq!(fake.log_calls("x"), 1);
        assert_eq!(fake.log_calls("v"), 2);
        assert_eq!(first.fetched, 2);
        assert_eq!(second.fetched, 1);
        assert_eq!(second.skipped, 1);
        assert!(dash.summaries().has_summary("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn scan_interval_is_clamped_to_one_day() {
        let fake = FakeSource::default();
        let dash = dashboard(&fake);
        dash.set_scan_refresh_interval(u64::MAX);
        assert_eq!(
            dash.polling_status().scan_interval_secs,
            Some(MAX_SCAN_REFRESH_INTERVAL_SECS)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scan_tick_picks_up_merges_started_while_idle() {
        let fake = FakeSource::default();
        fake.push_merge(Ok(merge_tasks(&[])));
        fake.push_merge(Ok(merge_tasks(&[("m-new", "running")])));
        let dash = dashboard(&fake);
        dash.refresh_merge_tasks().await;
        assert!(!dash.is_polling());

        dash.set_scan_refresh_interval(5);
        sleep_ms(5_100).await;
        assert_eq!(fake.merge_calls(), 2);
        assert!(dash.is_polling());
        assert!(dash.all_tasks().iter().any(|t| t.id == "m-new"));
    }

    #[test]
    fn options_from_settings() {
        let mut settings = MonitorSettings::default();
        settings.cluster_id = "prod".into();
        settings.scan_status_filter = " running ".into();
        settings.archive_history_limit = 10;
        let options = DashboardOptions::from_settings(&settings);
        assert_eq!(options.cluster_id, "prod");
        assert_eq!(options.scan_status_filter.as_deref(), Some("running"));
        assert_eq!(options.archive_history_limit, 10);
        assert!(options.extract_log_summaries);
    }
}
