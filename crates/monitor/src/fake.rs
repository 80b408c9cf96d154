//! Scripted in-memory task source for controller tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tablewatch_core::error::Result;
use tablewatch_core::{ArchivedTableRecord, ClusterTasks, LogLine, ScanTaskRecord, TaskSource};

/// Queued responses; the last one repeats once the queue is drained.
struct Script<T> {
    queue: VecDeque<Result<T>>,
    calls: usize,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            calls: 0,
        }
    }
}

impl<T: Clone + Default> Script<T> {
    fn next(&mut self) -> Result<T> {
        self.calls += 1;
        if self.queue.len() > 1 {
            if let Some(next) = self.queue.pop_front() {
                return next;
            }
        }
        self.queue.front().cloned().unwrap_or_else(|| Ok(T::default()))
    }
}

#[derive(Default)]
struct Inner {
    merge: Mutex<Script<ClusterTasks>>,
    scan: Mutex<Script<Vec<ScanTaskRecord>>>,
    archive: Mutex<Script<Vec<ArchivedTableRecord>>>,
    logs: Mutex<HashMap<String, Result<Vec<LogLine>>>>,
    log_calls: Mutex<HashMap<String, usize>>,
    delay: Mutex<Duration>,
}

/// Cloning shares the script and the call counters.
#[derive(Clone, Default)]
pub struct FakeSource {
    inner: Arc<Inner>,
}

impl FakeSource {
    pub fn push_merge(&self, response: Result<ClusterTasks>) {
        self.inner.merge.lock().unwrap().queue.push_back(response);
    }

    pub fn push_scan(&self, response: Result<Vec<ScanTaskRecord>>) {
        self.inner.scan.lock().unwrap().queue.push_back(response);
    }

    pub fn push_archive(&self, response: Result<Vec<ArchivedTableRecord>>) {
        self.inner.archive.lock().unwrap().queue.push_back(response);
    }

    pub fn set_logs(&self, task_id: &str, response: Result<Vec<LogLine>>) {
        self.inner
            .logs
            .lock()
            .unwrap()
            .insert(task_id.to_string(), response);
    }

    /// Latency applied to every fetch.
    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock().unwrap() = delay;
    }

    pub fn merge_calls(&self) -> usize {
        self.inner.merge.lock().unwrap().calls
    }

    pub fn scan_calls(&self) -> usize {
        self.inner.scan.lock().unwrap().calls
    }

    pub fn archive_calls(&self) -> usize {
        self.inner.archive.lock().unwrap().calls
    }

    pub fn log_calls(&self, task_id: &str) -> usize {
        self.inner
            .log_calls
            .lock()
            .unwrap()
            .get(task_id)
            .copied()
            .unwrap_or(0)
    }

    async fn pause(&self) {
        let delay = *self.inner.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl TaskSource for FakeSource {
    async fn fetch_merge_tasks(&self, _cluster_id: &str) -> Result<ClusterTasks> {
        let response = self.inner.merge.lock().unwrap().next();
        self.pause().await;
        response
    }

    async fn fetch_scan_tasks(
        &self,
        _cluster_id: &str,
        _status_filter: Option<&str>,
    ) -> Result<Vec<ScanTaskRecord>> {
        let response = self.inner.scan.lock().unwrap().next();
        self.pause().await;
        response
    }

    async fn fetch_archived_tables(
        &self,
        _cluster_id: &str,
        _limit: usize,
    ) -> Result<Vec<ArchivedTableRecord>> {
        let response = self.inner.archive.lock().unwrap().next();
        self.pause().await;
        response
    }

    async fn fetch_task_logs(&self, task_id: &str) -> Result<Vec<LogLine>> {
        *self
            .inner
            .log_calls
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default() += 1;
        let response = self
            .inner
            .logs
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()));
        self.pause().await;
        response
    }
}
