//! Settings store interface
//!
//! The relay reads transform rules through a [`SettingsStore`] exactly once per run,
//! at run start. Whatever the store does afterwards (an operator editing the prefix
//! mid-run, say) applies from the next run on.

use std::sync::{PoisonError, RwLock};

use crate::config::TransformRules;

/// Source of transform rules snapshots
pub trait SettingsStore: Send + Sync {
    /// Current rules, copied out
    fn snapshot(&self) -> TransformRules;
}

/// In-memory settings store
///
/// Persisting rules is left to the embedding application; this store only keeps
/// the current value and hands out copies.
#[derive(Debug, Default)]
pub struct MemorySettings {
    rules: RwLock<TransformRules>,
}

impl MemorySettings {
    /// Create a store holding `rules`
    pub fn new(rules: TransformRules) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Replace all rules at once
    pub fn replace(&self, rules: TransformRules) {
        *self.rules.write().unwrap_or_else(PoisonError::into_inner) = rules;
    }

    /// Edit rules in place
    ///
    /// ```
    /// use media_relay::settings::{MemorySettings, SettingsStore};
    ///
    /// let settings = MemorySettings::default();
    /// settings.update(|rules| rules.prefix = "[HD] ".to_string());
    /// assert_eq!(settings.snapshot().prefix, "[HD] ");
    /// ```
    pub fn update<F>(&self, edit: F)
    where
        F: FnOnce(&mut TransformRules),
    {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        edit(&mut rules);
    }
}

impl SettingsStore for MemorySettings {
    fn snapshot(&self) -> TransformRules {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelRef;

    #[test]
    fn snapshots_are_detached_copies() {
        let settings = MemorySettings::default();
        let before = settings.snapshot();

        settings.update(|rules| {
            rules.removed_words.push("IL".to_string());
            rules.destinations.push(ChannelRef::Id(-1001));
        });

        assert!(before.removed_words.is_empty(), "earlier snapshot must not change");
        let after = settings.snapshot();
        assert_eq!(after.removed_words, vec!["IL".to_string()]);
        assert_eq!(after.destinations, vec![ChannelRef::Id(-1001)]);
    }

    #[test]
    fn replace_overwrites_everything() {
        let settings = MemorySettings::new(TransformRules {
            prefix: "old".to_string(),
            ..TransformRules::default()
        });

        settings.replace(TransformRules::default());

        assert_eq!(settings.snapshot(), TransformRules::default());
    }
}
