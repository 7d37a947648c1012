//! Resolution of the recipient mentions embedded in chat messages.

use crate::core::{Level, Override};
use crate::notification::NotifyError;
use crate::overrides::effective;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Prefixes that mark a mention as already addressed (user, special, channel).
const MENTION_SIGILS: [char; 3] = ['@', '!', '#'];

/// Default mention lists, one per level.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LevelMentions {
    #[serde(default)]
    pub normal_mentions: Vec<String>,
    #[serde(default)]
    pub warning_mentions: Vec<String>,
    #[serde(default)]
    pub critical_mentions: Vec<String>,
    /// Appended after the level list. Alerts may override it.
    #[serde(default)]
    pub additional_mentions: Vec<String>,
}

impl LevelMentions {
    pub fn for_level(&self, level: Level) -> &[String] {
        match level {
            Level::Normal => &self.normal_mentions,
            Level::Warning => &self.warning_mentions,
            Level::Critical => &self.critical_mentions,
            Level::Unknown => &[],
        }
    }
}

/// Computes the mentions for `level`.
///
/// An override list for the level replaces the default list, then
/// `additional_mentions` is appended. Entries are trimmed, blanks dropped and
/// duplicates removed keeping the first occurrence. Dedup compares the
/// trimmed text, so `foo` and `@foo` are distinct mentions.
pub fn resolve(
    level: Level,
    alert_override: Option<&Override>,
    defaults: &LevelMentions,
) -> Result<Vec<String>, NotifyError> {
    let key = format!("{}_mentions", level);
    let mut mentions = effective(&key, defaults.for_level(level).to_vec(), alert_override)?;
    mentions.extend(effective(
        "additional_mentions",
        defaults.additional_mentions.clone(),
        alert_override,
    )?);

    Ok(mentions
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .unique()
        .map(str::to_owned)
        .collect())
}

/// Ensures a resolved mention starts with a sigil, defaulting to `sigil`.
pub fn normalize_mention(mention: &str, sigil: char) -> String {
    if mention.starts_with(MENTION_SIGILS) {
        mention.to_string()
    } else {
        format!("{}{}", sigil, mention)
    }
}
