//! Configuration types and structures.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::Priority;

/// Default port for the webhook server.
pub const DEFAULT_PORT: u16 = 3000;

/// Default Asana REST API root.
pub const DEFAULT_ASANA_BASE_URL: &str = "https://app.asana.com/api/1.0";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub asana: AsanaConfig,

    #[serde(default)]
    pub rules: RulesConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Webhook HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (default: 0.0.0.0).
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path the tracker delivers notifications to (default: /webhook).
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

/// Task tracker API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsanaConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Personal access token. Usually supplied via `ASANA_ACCESS_TOKEN`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Page size when listing project tasks (default: 100, the API maximum).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for AsanaConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            access_token: None,
            request_timeout_secs: default_request_timeout(),
            page_size: default_page_size(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_ASANA_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_page_size() -> u32 {
    100
}

/// Days added to today for a task without a due date, by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityDueDateTable {
    #[serde(default = "default_high_days")]
    pub high: i64,
    #[serde(default = "default_medium_days")]
    pub medium: i64,
    #[serde(default = "default_low_days")]
    pub low: i64,
}

impl Default for PriorityDueDateTable {
    fn default() -> Self {
        Self {
            high: default_high_days(),
            medium: default_medium_days(),
            low: default_low_days(),
        }
    }
}

impl PriorityDueDateTable {
    pub fn offset_days(&self, priority: Priority) -> i64 {
        match priority {
            Priority::High => self.high,
            Priority::Medium => self.medium,
            Priority::Low => self.low,
        }
    }
}

fn default_high_days() -> i64 {
    2
}

fn default_medium_days() -> i64 {
    7
}

fn default_low_days() -> i64 {
    14
}

/// Due-date rule configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Name of the priority custom field (matched case-insensitively).
    #[serde(default = "default_priority_field")]
    pub priority_field: String,

    /// Name of the workflow stage custom field.
    #[serde(default = "default_stage_field")]
    pub stage_field: String,

    /// Stage that makes a task part of the cascade.
    #[serde(default = "default_cascade_stage")]
    pub cascade_stage: String,

    /// Priority a task needs to trigger the cascade.
    #[serde(default = "default_cascade_priority")]
    pub cascade_priority: Priority,

    /// Days the cascade pushes sibling due dates out by.
    #[serde(default = "default_cascade_shift_days")]
    pub cascade_shift_days: i64,

    #[serde(default)]
    pub priority_offsets: PriorityDueDateTable,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            priority_field: default_priority_field(),
            stage_field: default_stage_field(),
            cascade_stage: default_cascade_stage(),
            cascade_priority: default_cascade_priority(),
            cascade_shift_days: default_cascade_shift_days(),
            priority_offsets: PriorityDueDateTable::default(),
        }
    }
}

fn default_priority_field() -> String {
    "priority".to_string()
}

fn default_stage_field() -> String {
    "stage".to_string()
}

fn default_cascade_stage() -> String {
    "in progress".to_string()
}

fn default_cascade_priority() -> Priority {
    Priority::High
}

fn default_cascade_shift_days() -> i64 {
    2
}

/// Dedup ledger bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum number of markers kept per kind, events and cascade
    /// updates counted separately (default: 10000).
    #[serde(default = "default_ledger_capacity")]
    pub capacity: usize,

    /// Seconds a marker is kept; 0 keeps markers until evicted by capacity
    /// (default: 86400, the tracker's redelivery window).
    #[serde(default = "default_ledger_retention")]
    pub retention_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            capacity: default_ledger_capacity(),
            retention_secs: default_ledger_retention(),
        }
    }
}

fn default_ledger_capacity() -> usize {
    10_000
}

fn default_ledger_retention() -> u64 {
    86_400 // 24 hours
}

impl Config {
    /// Load configuration from a single YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Address the webhook server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Access token, if one is configured and non-empty.
    pub fn access_token(&self) -> Option<&str> {
        self.asana
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Check values that would make the service misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.ledger.capacity == 0 {
            return Err(anyhow!("ledger.capacity must be at least 1"));
        }
        let offsets = &self.rules.priority_offsets;
        if offsets.high < 0 || offsets.medium < 0 || offsets.low < 0 {
            return Err(anyhow!("rules.priority_offsets must not be negative"));
        }
        if self.rules.cascade_shift_days <= 0 {
            return Err(anyhow!("rules.cascade_shift_days must be positive"));
        }
        if !self.server.webhook_path.starts_with('/') {
            return Err(anyhow!(
                "server.webhook_path must start with '/': {}",
                self.server.webhook_path
            ));
        }
        Ok(())
    }

    /// Validate and additionally require an access token, as `serve` does.
    pub fn validate_for_serve(&self) -> Result<()> {
        self.validate()?;
        if self.access_token().is_none() {
            return Err(anyhow!(
                "Please set ASANA_ACCESS_TOKEN in the environment or asana.access_token in config"
            ));
        }
        Ok(())
    }
}
