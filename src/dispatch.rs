//! Event dispatcher: deduplicates a delivery's events and routes them to the
//! rules.
//!
//! All deliveries pass through one dispatch lock, held for the whole batch.
//! Concurrent HTTP requests therefore run their batches one after another and
//! can never both see an event as new.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::TaskService;
use crate::clock::SharedClock;
use crate::ledger::DedupStore;
use crate::rules::RuleEngine;
use crate::types::{ChangeEvent, EventAction, WebhookPayload};

/// Counts for one delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub received: usize,
    /// Fresh events whose task was evaluated without errors.
    pub processed: usize,
    /// Events already seen.
    pub duplicates: usize,
    /// Fresh events with nothing to do: not a task, not a change, or the
    /// task could not be found.
    pub ignored: usize,
    /// Entries that could not be decoded as events.
    pub rejected: usize,
    /// Fresh events where a fetch or write failed.
    pub failed: usize,
}

enum EventOutcome {
    Processed,
    Duplicate,
    Ignored,
    Failed,
}

/// Routes events to the rules with explicit collaborators.
pub struct Dispatcher {
    service: Arc<dyn TaskService>,
    ledger: Arc<dyn DedupStore>,
    rules: RuleEngine,
    clock: SharedClock,
    lock: Mutex<()>,
}

impl Dispatcher {
    pub fn new(
        service: Arc<dyn TaskService>,
        ledger: Arc<dyn DedupStore>,
        rules: RuleEngine,
        clock: SharedClock,
    ) -> Self {
        Self {
            service,
            ledger,
            rules,
            clock,
            lock: Mutex::new(()),
        }
    }

    /// Handle a decoded delivery. Entries that are not valid events are
    /// logged and counted; they never fail the delivery.
    pub async fn dispatch_payload(&self, payload: WebhookPayload) -> DispatchReport {
        let mut events = Vec::with_capacity(payload.events.len());
        let mut rejected = 0;
        for (index, raw) in payload.events.into_iter().enumerate() {
            match serde_json::from_value::<ChangeEvent>(raw) {
                Ok(event) => events.push(event),
                Err(e) => {
                    warn!(index, error = %e, "Skipping undecodable event");
                    rejected += 1;
                }
            }
        }

        let mut report = self.dispatch(&events).await;
        report.received += rejected;
        report.rejected = rejected;
        report
    }

    /// Handle events in order, under the dispatch lock.
    pub async fn dispatch(&self, events: &[ChangeEvent]) -> DispatchReport {
        let _guard = self.lock.lock().await;
        let mut report = DispatchReport {
            received: events.len(),
            ..DispatchReport::default()
        };

        for event in events {
            match self.process(event).await {
                EventOutcome::Processed => report.processed += 1,
                EventOutcome::Duplicate => report.duplicates += 1,
                EventOutcome::Ignored => report.ignored += 1,
                EventOutcome::Failed => report.failed += 1,
            }
        }

        if report.received > 0 {
            info!(
                received = report.received,
                processed = report.processed,
                duplicates = report.duplicates,
                ignored = report.ignored,
                failed = report.failed,
                "Dispatched events"
            );
        }
        report
    }

    async fn process(&self, event: &ChangeEvent) -> EventOutcome {
        let key = event.key();
        if !self.ledger.mark_event(&key).await {
            info!(event = %key, "Duplicate event detected, skipping");
            return EventOutcome::Duplicate;
        }

        if !event.resource.is_task() {
            debug!(event = %key, kind = ?event.resource.resource_type, "Not a task event");
            return EventOutcome::Ignored;
        }
        if event.action_kind() != EventAction::Changed {
            debug!(event = %key, "No rules for this action");
            return EventOutcome::Ignored;
        }

        let gid = &event.resource.gid;
        let task = match self.service.fetch_task(gid).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                info!(task = %gid, "No task data found");
                return EventOutcome::Ignored;
            }
            Err(e) => {
                warn!(task = %gid, error = %e, "Failed to fetch task");
                return EventOutcome::Failed;
            }
        };

        debug!(task = %gid, "Processing event");
        let today = self.clock.utc().date_naive();
        let evaluation = self
            .rules
            .evaluate(&task, today, self.service.as_ref(), self.ledger.as_ref())
            .await;

        if evaluation.failed() {
            EventOutcome::Failed
        } else {
            EventOutcome::Processed
        }
    }
}
