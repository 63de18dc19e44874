//! Due-date hook library
//!
//! Webhook receiver that assigns priority-based due dates to Asana tasks and
//! pushes back sibling tasks when high-priority work enters "in progress".
//! This module exports the core components for testing and integration.

pub mod cascade;
pub mod cli;
pub mod client;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fields;
pub mod ledger;
pub mod logging;
pub mod rules;
pub mod server;
pub mod types;
