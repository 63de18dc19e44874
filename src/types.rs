//! Core types for webhook deliveries and task records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a resource in the task tracker (task, project, section, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub gid: String,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ResourceRef {
    /// Whether this reference points at a task. Untyped references are
    /// treated as tasks.
    pub fn is_task(&self) -> bool {
        self.resource_type
            .as_deref()
            .is_none_or(|kind| kind.eq_ignore_ascii_case("task"))
    }
}

/// Kind of change reported by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    Changed,
    Added,
    Removed,
    Deleted,
    Undeleted,
    Other,
}

impl EventAction {
    /// Parse an action label as delivered by the tracker.
    pub fn parse(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "changed" => EventAction::Changed,
            "added" => EventAction::Added,
            "removed" => EventAction::Removed,
            "deleted" => EventAction::Deleted,
            "undeleted" => EventAction::Undeleted,
            _ => EventAction::Other,
        }
    }
}

/// A single change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Timestamp exactly as delivered; part of the event identity.
    pub created_at: String,
    pub resource: ResourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ResourceRef>,
    pub action: String,
}

impl ChangeEvent {
    pub fn key(&self) -> EventKey {
        EventKey {
            created_at: self.created_at.clone(),
            resource_gid: self.resource.gid.clone(),
            action: self.action.clone(),
        }
    }

    pub fn action_kind(&self) -> EventAction {
        EventAction::parse(&self.action)
    }
}

/// Identity of an event for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub created_at: String,
    pub resource_gid: String,
    pub action: String,
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.created_at, self.resource_gid, self.action)
    }
}

/// Marker for a due date the cascade has already produced for a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateKey {
    pub task_gid: String,
    pub due_on: NaiveDate,
}

impl UpdateKey {
    pub fn new(task_gid: impl Into<String>, due_on: NaiveDate) -> Self {
        Self {
            task_gid: task_gid.into(),
            due_on,
        }
    }
}

impl fmt::Display for UpdateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.task_gid, self.due_on)
    }
}

/// Body of a webhook delivery. Events are decoded one by one so that a
/// single bad entry does not reject the whole batch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

/// Selected option of an enum custom field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    #[serde(default)]
    pub gid: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// A custom field attached to a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    #[serde(default)]
    pub gid: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enum_value: Option<EnumOption>,
}

impl CustomField {
    /// Build an enum field with the given option selected.
    pub fn with_option(name: impl Into<String>, option: impl Into<String>) -> Self {
        Self {
            gid: None,
            name: name.into(),
            enum_value: Some(EnumOption {
                gid: None,
                name: option.into(),
            }),
        }
    }
}

/// Project/section membership of a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    #[serde(default)]
    pub project: Option<ResourceRef>,
    #[serde(default)]
    pub section: Option<ResourceRef>,
}

/// Transient copy of a task as returned by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub gid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub due_on: Option<NaiveDate>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
}

impl TaskRecord {
    pub fn new(gid: impl Into<String>) -> Self {
        Self {
            gid: gid.into(),
            name: None,
            due_on: None,
            custom_fields: Vec::new(),
            memberships: Vec::new(),
        }
    }

    pub fn with_due_on(mut self, due_on: NaiveDate) -> Self {
        self.due_on = Some(due_on);
        self
    }

    pub fn with_field(mut self, name: &str, option: &str) -> Self {
        self.custom_fields.push(CustomField::with_option(name, option));
        self
    }

    pub fn in_project(mut self, project_gid: impl Into<String>) -> Self {
        self.memberships.push(Membership {
            project: Some(ResourceRef {
                gid: project_gid.into(),
                resource_type: Some("project".to_string()),
                name: None,
            }),
            section: None,
        });
        self
    }

    /// Project of the first membership.
    pub fn project_gid(&self) -> Option<&str> {
        self.memberships
            .first()
            .and_then(|m| m.project.as_ref())
            .map(|p| p.gid.as_str())
    }
}

/// Task priority as understood by the due-date rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Parse a normalized priority label. Unknown labels are treated as unset.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
