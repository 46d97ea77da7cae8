//! Filename rewrite pipeline
//!
//! The extension is split off first and never rewritten. The base name then goes
//! through, in this order:
//!
//! 1. underscore runs replaced by a single space
//! 2. `@username` tokens stripped (when `remove_username` is set)
//! 3. link tokens (`http(s)://…`, `www.…`, `t.me/…`) stripped (when `remove_links` is set)
//! 4. every configured removed word deleted wherever it occurs (case-sensitive)
//! 5. whitespace collapsed, empty brackets and dangling separators trimmed
//! 6. prefix prepended and suffix appended (before the extension)
//!
//! Steps 1-5 repeat until the base name stops changing, and an existing
//! prefix/suffix is peeled off before rewriting, so the transform is idempotent.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::TransformRules;
use crate::utils::{join_extension, split_extension};

/// Upper bound on rewrite passes while looking for a fixpoint
const MAX_PASSES: usize = 8;

static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| compile(r"_+"));
static USERNAMES: LazyLock<Regex> = LazyLock::new(|| compile(r"@[A-Za-z0-9_]+"));
static LINKS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)(?:https?://|www\.|t\.me/)[^\s\)\]\}]+"));
static EMPTY_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| compile(r"\[\s*\]|\(\s*\)|\{\s*\}"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    // Patterns are literals in this module
    Regex::new(pattern).expect("static filename pattern must compile")
}

/// Characters trimmed from both ends of a rewritten base name
const EDGE_SEPARATORS: &[char] = &[' ', '-', '.', ',', '|'];

/// Ordered, composable filename rewrite built from [`TransformRules`]
#[derive(Clone, Debug, Default)]
pub struct FilenameTransformer {
    prefix: String,
    suffix: String,
    remove_username: bool,
    remove_links: bool,
    removed_words: Vec<String>,
}

impl FilenameTransformer {
    /// Build a transformer from a rules snapshot
    ///
    /// Removed words keep their configured order; duplicates and empty words are dropped.
    pub fn from_rules(rules: &TransformRules) -> Self {
        let mut removed_words: Vec<String> = Vec::with_capacity(rules.removed_words.len());
        for word in &rules.removed_words {
            if !word.is_empty() && !removed_words.contains(word) {
                removed_words.push(word.clone());
            }
        }

        Self {
            prefix: rules.prefix.clone(),
            suffix: rules.suffix.clone(),
            remove_username: rules.remove_username,
            remove_links: rules.remove_links,
            removed_words,
        }
    }

    /// Rewrite `raw` into the output filename
    ///
    /// `placeholder` replaces the base name if the rewrite empties it, so the result
    /// is never empty.
    pub fn transform(&self, raw: &str, placeholder: &str) -> String {
        let (base, ext) = split_extension(raw);
        let mut current = self.settle(self.peel(base));

        if current.is_empty() {
            current = self.settle(placeholder);
            if current.is_empty() {
                current = placeholder.to_string();
            }
        }

        let mut out = String::with_capacity(
            self.prefix.len() + current.len() + self.suffix.len() + 8,
        );
        out.push_str(&self.prefix);
        out.push_str(&current);
        out.push_str(&self.suffix);
        join_extension(&out, ext)
    }

    /// Repeat the rewrite until the name stops changing
    fn settle(&self, base: &str) -> String {
        let mut current = base.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.rewrite(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    /// Strip an already applied prefix/suffix so they are never doubled
    fn peel<'a>(&self, base: &'a str) -> &'a str {
        let mut core = base;
        if !self.prefix.is_empty() {
            core = core.strip_prefix(self.prefix.as_str()).unwrap_or(core);
        }
        if !self.suffix.is_empty() {
            core = core.strip_suffix(self.suffix.as_str()).unwrap_or(core);
        }
        core
    }

    /// One pass of steps 1-5
    fn rewrite(&self, base: &str) -> String {
        let mut name = UNDERSCORES.replace_all(base, " ").into_owned();

        if self.remove_username {
            name = USERNAMES.replace_all(&name, " ").into_owned();
        }
        if self.remove_links {
            name = LINKS.replace_all(&name, " ").into_owned();
        }
        for word in &self.removed_words {
            if name.contains(word.as_str()) {
                name = name.replace(word.as_str(), "");
            }
        }

        let name = EMPTY_BRACKETS.replace_all(&name, " ");
        let name = WHITESPACE.replace_all(&name, " ");
        name.trim_matches(EDGE_SEPARATORS).to_string()
    }
}
