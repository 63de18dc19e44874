//! Cascading due-date shift across sibling tasks.
//!
//! When a high-priority task enters the cascade stage, every other task of its
//! project in that stage has its due date pushed out by a fixed number of
//! days. Each shifted date is recorded in the ledger; a later cascade that
//! finds a task still on a recorded date leaves it alone. This is what stops
//! the update notifications produced by the cascade itself from shifting the
//! same tasks again.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::client::TaskService;
use crate::ledger::DedupStore;
use crate::rules::{RuleEngine, add_days};
use crate::types::{TaskRecord, UpdateKey};

/// One applied shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shift {
    pub task_gid: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// Summary of one cascade pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    /// Siblings in the cascade stage, trigger excluded.
    pub candidates: usize,
    pub shifted: Vec<Shift>,
    /// Siblings left alone: vanished, undated, or already shifted.
    pub skipped: usize,
    /// Siblings whose fetch or update failed.
    pub failed: usize,
}

/// Shift the due dates of `trigger`'s siblings.
///
/// Never fails as a whole: listing, fetch and update errors are logged and
/// counted, and processing moves on to the next sibling.
pub async fn run(
    trigger: &TaskRecord,
    rules: &RuleEngine,
    service: &dyn TaskService,
    ledger: &dyn DedupStore,
) -> CascadeReport {
    let mut report = CascadeReport::default();

    let Some(project_gid) = trigger.project_gid() else {
        info!(task = %trigger.gid, "Trigger task has no project membership, nothing to cascade");
        return report;
    };

    let tasks = match service.list_project_tasks(project_gid).await {
        Ok(tasks) => tasks,
        Err(e) => {
            warn!(project = %project_gid, error = %e, "Failed to list project tasks");
            report.failed += 1;
            return report;
        }
    };

    let siblings: Vec<&TaskRecord> = tasks
        .iter()
        .filter(|t| t.gid != trigger.gid && rules.in_cascade_stage(t))
        .collect();
    report.candidates = siblings.len();
    debug!(project = %project_gid, candidates = siblings.len(), "Cascade candidates");

    let shift_days = rules.config().cascade_shift_days;
    for sibling in siblings {
        match shift_one(&sibling.gid, shift_days, service, ledger).await {
            Outcome::Shifted(shift) => report.shifted.push(shift),
            Outcome::Skipped => report.skipped += 1,
            Outcome::Failed => report.failed += 1,
        }
    }

    info!(
        project = %project_gid,
        trigger = %trigger.gid,
        shifted = report.shifted.len(),
        skipped = report.skipped,
        failed = report.failed,
        "Cascade finished"
    );
    report
}

enum Outcome {
    Shifted(Shift),
    Skipped,
    Failed,
}

async fn shift_one(
    gid: &str,
    shift_days: i64,
    service: &dyn TaskService,
    ledger: &dyn DedupStore,
) -> Outcome {
    let task = match service.fetch_task(gid).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            debug!(task = %gid, "Sibling no longer visible");
            return Outcome::Skipped;
        }
        Err(e) => {
            warn!(task = %gid, error = %e, "Failed to fetch sibling");
            return Outcome::Failed;
        }
    };

    let Some(current) = task.due_on else {
        debug!(task = %gid, "Sibling has no due date");
        return Outcome::Skipped;
    };

    // The current date was produced by an earlier shift: do not advance again.
    if ledger.has_update(&UpdateKey::new(gid, current)).await {
        debug!(task = %gid, due_on = %current, "Due date already shifted");
        return Outcome::Skipped;
    }

    let Some(next) = add_days(current, shift_days) else {
        warn!(task = %gid, due_on = %current, "Shifted due date out of range");
        return Outcome::Failed;
    };

    match service.update_due_date(gid, next).await {
        Ok(()) => {
            ledger.record_update(UpdateKey::new(gid, next)).await;
            info!(task = %gid, from = %current, to = %next, "Shifted due date");
            Outcome::Shifted(Shift {
                task_gid: gid.to_string(),
                from: current,
                to: next,
            })
        }
        Err(e) => {
            warn!(task = %gid, due_on = %next, error = %e, "Failed to shift due date");
            Outcome::Failed
        }
    }
}
