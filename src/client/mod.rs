//! Task tracker access.
//!
//! The rules only see the [`TaskService`] port. [`AsanaClient`] talks to the
//! real API over HTTPS; [`InMemoryTaskService`] keeps tasks in memory and
//! records every call, for tests and local experiments.

mod asana;
mod memory;

pub use asana::{AsanaClient, Webhook};
pub use memory::{InMemoryTaskService, ServiceCall};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::ClientResult;
use crate::types::TaskRecord;

/// Operations the rules need from the task tracker.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Fetch a task with its custom fields, due date and memberships.
    ///
    /// Returns `None` when the task does not exist or is not visible.
    async fn fetch_task(&self, gid: &str) -> ClientResult<Option<TaskRecord>>;

    /// List every task in a project, in tracker order. Listed records carry
    /// custom fields and memberships but not due dates.
    async fn list_project_tasks(&self, project_gid: &str) -> ClientResult<Vec<TaskRecord>>;

    /// Set only the due date of a task.
    async fn update_due_date(&self, gid: &str, due_on: NaiveDate) -> ClientResult<()>;
}
