//! Resolution of per-alert channel setting overrides.

use crate::core::Override;
use crate::notification::NotifyError;
use serde::de::DeserializeOwned;

/// Prefixes accepted at the start of a destination as-is.
const DESTINATION_SIGILS: [char; 2] = ['#', '@'];

/// Returns the effective value of `setting` for one notify call.
///
/// The channel default is returned untouched unless the alert carries an
/// override entry for this channel that defines `setting`, in which case the
/// override value wins. The stored channel config is never modified.
pub fn effective<T: DeserializeOwned>(
    setting: &str,
    default: T,
    alert_override: Option<&Override>,
) -> Result<T, NotifyError> {
    match alert_override.and_then(|o| o.get::<T>(setting)) {
        None => Ok(default),
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(NotifyError::Config(format!(
            "invalid override for '{}': {}",
            setting, e
        ))),
    }
}

/// Normalizes a chat destination: bare names become `#name`.
///
/// Empty or absent destinations mean "the webhook's default" and are passed
/// through unchanged.
pub fn make_channel_name(channel: Option<&str>) -> Option<String> {
    match channel {
        Some(name) if !name.is_empty() && !name.starts_with(DESTINATION_SIGILS) => {
            Some(format!("#{}", name))
        }
        other => other.map(str::to_owned),
    }
}
