/// beacon-dispatch - alert notification dispatch for graphite-beacon
///
/// This library resolves per-alert channel overrides and recipient mentions,
/// renders alert messages and delivers them through Slack webhooks or SMTP.
pub mod notification;

pub mod cli;
pub mod config;
pub mod core;
pub mod formatting;
pub mod mentions;
pub mod overrides;
pub mod services;

// Re-export core types for convenience
pub use crate::core::*;
pub use notification::NotifyError;
