//! Due-date rules applied to a changed task.
//!
//! Two independent rules run for every `changed` event:
//! - **priority default**: a task without a due date gets one derived from its
//!   priority (today + offset from the [`PriorityDueDateTable`]);
//! - **cascade trigger**: a high-priority task in the cascade stage pushes
//!   out the due dates of the other tasks in that stage (see [`crate::cascade`]).

use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::cascade::{self, CascadeReport};
use crate::client::TaskService;
use crate::config::{PriorityDueDateTable, RulesConfig};
use crate::fields;
use crate::ledger::DedupStore;
use crate::types::{Priority, TaskRecord};

/// Outcome of evaluating the rules for one task.
#[derive(Debug, Default)]
pub struct Evaluation {
    /// Due date written by the priority rule.
    pub assigned_due_on: Option<NaiveDate>,
    /// The priority rule decided on a date but the write failed.
    pub assignment_failed: bool,
    /// Present when the cascade was triggered.
    pub cascade: Option<CascadeReport>,
}

impl Evaluation {
    pub fn failed(&self) -> bool {
        self.assignment_failed || self.cascade.as_ref().is_some_and(|c| c.failed > 0)
    }
}

/// Add whole days to a date.
pub fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
}

/// Rule decisions, parameterized by [`RulesConfig`].
#[derive(Debug, Clone)]
pub struct RuleEngine {
    config: RulesConfig,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RulesConfig::default())
    }
}

impl RuleEngine {
    pub fn new(mut config: RulesConfig) -> Self {
        config.cascade_stage = config.cascade_stage.trim().to_lowercase();
        Self { config }
    }

    pub fn config(&self) -> &RulesConfig {
        &self.config
    }

    pub fn table(&self) -> &PriorityDueDateTable {
        &self.config.priority_offsets
    }

    /// Normalized priority label of a task, if set.
    pub fn priority_label(&self, task: &TaskRecord) -> Option<String> {
        fields::enum_value(&task.custom_fields, &self.config.priority_field)
    }

    /// Normalized stage label of a task, if set.
    pub fn stage_label(&self, task: &TaskRecord) -> Option<String> {
        fields::enum_value(&task.custom_fields, &self.config.stage_field)
    }

    /// Whether the task sits in the stage the cascade operates on.
    pub fn in_cascade_stage(&self, task: &TaskRecord) -> bool {
        self.stage_label(task)
            .is_some_and(|stage| stage == self.config.cascade_stage)
    }

    /// Due date the priority rule would assign, or `None` when the rule does
    /// not apply: the task already has a date, or its priority is unset or
    /// unknown.
    pub fn default_due_date(&self, task: &TaskRecord, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(existing) = task.due_on {
            debug!(task = %task.gid, due_on = %existing, "Task already has a due date");
            return None;
        }
        let Some(label) = self.priority_label(task) else {
            debug!(task = %task.gid, "No priority set");
            return None;
        };
        let Some(priority) = Priority::parse(&label) else {
            debug!(task = %task.gid, priority = %label, "Unknown priority");
            return None;
        };
        add_days(today, self.table().offset_days(priority))
    }

    /// Whether a change to this task should shift its siblings.
    pub fn triggers_cascade(&self, task: &TaskRecord) -> bool {
        let (Some(stage), Some(priority)) = (self.stage_label(task), self.priority_label(task))
        else {
            return false;
        };
        debug!(task = %task.gid, stage = %stage, priority = %priority, "Checking cascade trigger");
        stage == self.config.cascade_stage
            && Priority::parse(&priority) == Some(self.config.cascade_priority)
    }

    /// Apply both rules to a freshly fetched task.
    ///
    /// Failures are logged and reflected in the returned [`Evaluation`]; a
    /// failed priority write does not stop the cascade check.
    pub async fn evaluate(
        &self,
        task: &TaskRecord,
        today: NaiveDate,
        service: &dyn TaskService,
        ledger: &dyn DedupStore,
    ) -> Evaluation {
        let mut evaluation = Evaluation::default();

        if let Some(due_on) = self.default_due_date(task, today) {
            match service.update_due_date(&task.gid, due_on).await {
                Ok(()) => {
                    info!(task = %task.gid, due_on = %due_on, "Assigned due date from priority");
                    evaluation.assigned_due_on = Some(due_on);
                }
                Err(e) => {
                    warn!(task = %task.gid, due_on = %due_on, error = %e, "Failed to assign due date");
                    evaluation.assignment_failed = true;
                }
            }
        }

        if self.triggers_cascade(task) {
            info!(task = %task.gid, "High-priority task in progress, shifting sibling due dates");
            evaluation.cascade = Some(cascade::run(task, self, service, ledger).await);
        }

        evaluation
    }
}
