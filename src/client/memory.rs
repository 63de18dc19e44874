//! In-memory task service.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use super::TaskService;
use crate::error::{ClientError, ClientResult};
use crate::types::TaskRecord;

/// A call made against the service, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    Fetch(String),
    List(String),
    Update(String, NaiveDate),
}

#[derive(Debug, Default)]
struct State {
    /// Tasks in listing order.
    tasks: Vec<TaskRecord>,
    calls: Vec<ServiceCall>,
    failing_updates: HashSet<String>,
    failing_fetches: HashSet<String>,
}

/// Thread-safe in-memory stand-in for the tracker.
///
/// Listing strips due dates, like the real listing call which does not
/// request them, so callers have to fetch each task for its date.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskService {
    state: Arc<RwLock<State>>,
}

impl InMemoryTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with tasks, in listing order.
    pub fn with_tasks(tasks: impl IntoIterator<Item = TaskRecord>) -> Self {
        let service = Self::new();
        for task in tasks {
            service.insert(task);
        }
        service
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert a task or replace the one with the same gid in place.
    pub fn insert(&self, task: TaskRecord) {
        let mut state = self.write();
        match state.tasks.iter_mut().find(|t| t.gid == task.gid) {
            Some(existing) => *existing = task,
            None => state.tasks.push(task),
        }
    }

    /// Current copy of a task.
    pub fn task(&self, gid: &str) -> Option<TaskRecord> {
        self.read().tasks.iter().find(|t| t.gid == gid).cloned()
    }

    pub fn due_on(&self, gid: &str) -> Option<NaiveDate> {
        self.task(gid).and_then(|t| t.due_on)
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.read().calls.clone()
    }

    /// Updates received so far.
    pub fn updates(&self) -> Vec<(String, NaiveDate)> {
        self.read()
            .calls
            .iter()
            .filter_map(|c| match c {
                ServiceCall::Update(gid, date) => Some((gid.clone(), *date)),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.write().calls.clear();
    }

    /// Make updates to `gid` fail with a 403.
    pub fn fail_updates_for(&self, gid: &str) {
        self.write().failing_updates.insert(gid.to_string());
    }

    /// Make fetches of `gid` fail with a 500.
    pub fn fail_fetches_for(&self, gid: &str) {
        self.write().failing_fetches.insert(gid.to_string());
    }
}

#[async_trait]
impl TaskService for InMemoryTaskService {
    async fn fetch_task(&self, gid: &str) -> ClientResult<Option<TaskRecord>> {
        let mut state = self.write();
        state.calls.push(ServiceCall::Fetch(gid.to_string()));
        if state.failing_fetches.contains(gid) {
            return Err(ClientError::Status {
                operation: "fetch_task",
                status: 500,
                body: "injected failure".to_string(),
            });
        }
        Ok(state.tasks.iter().find(|t| t.gid == gid).cloned())
    }

    async fn list_project_tasks(&self, project_gid: &str) -> ClientResult<Vec<TaskRecord>> {
        let mut state = self.write();
        state.calls.push(ServiceCall::List(project_gid.to_string()));
        Ok(state
            .tasks
            .iter()
            .filter(|t| {
                t.memberships
                    .iter()
                    .any(|m| m.project.as_ref().is_some_and(|p| p.gid == project_gid))
            })
            .map(|t| TaskRecord {
                due_on: None,
                ..t.clone()
            })
            .collect())
    }

    async fn update_due_date(&self, gid: &str, due_on: NaiveDate) -> ClientResult<()> {
        let mut state = self.write();
        state
            .calls
            .push(ServiceCall::Update(gid.to_string(), due_on));
        if state.failing_updates.contains(gid) {
            return Err(ClientError::Status {
                operation: "update_due_date",
                status: 403,
                body: "injected failure".to_string(),
            });
        }
        match state.tasks.iter_mut().find(|t| t.gid == gid) {
            Some(task) => {
                task.due_on = Some(due_on);
                Ok(())
            }
            None => Err(ClientError::Status {
                operation: "update_due_date",
                status: 404,
                body: format!("task {gid} not found"),
            }),
        }
    }
}
