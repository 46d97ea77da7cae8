//! Whitelist/blacklist filtering of filenames
//!
//! Matching is case-insensitive substring containment. The blacklist is checked
//! first, so a filename matching both lists is rejected as blacklisted.

use crate::types::SkipReason;

/// Word filters applied to raw filenames before transfer
#[derive(Clone, Debug, Default)]
pub struct FilterChain {
    whitelist: Vec<String>,
    blacklist: Vec<String>,
}

impl FilterChain {
    /// Build a filter chain; words are lower-cased and blank words dropped
    pub fn new(whitelist: &[String], blacklist: &[String]) -> Self {
        Self {
            whitelist: normalize(whitelist),
            blacklist: normalize(blacklist),
        }
    }

    /// Accept or reject a filename
    pub fn check(&self, filename: &str) -> Result<(), SkipReason> {
        let lowered = filename.to_lowercase();

        if self.blacklist.iter().any(|word| lowered.contains(word.as_str())) {
            return Err(SkipReason::Blacklisted);
        }
        if !self.whitelist.is_empty()
            && !self.whitelist.iter().any(|word| lowered.contains(word.as_str()))
        {
            return Err(SkipReason::NotWhitelisted);
        }
        Ok(())
    }
}

fn normalize(words: &[String]) -> Vec<String> {
    words
        .iter()
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_lists_accept_everything() {
        let chain = FilterChain::new(&[], &[]);
        assert!(chain.check("anything.mkv").is_ok());
    }

    #[test]
    fn whitelist_requires_a_match() {
        let chain = FilterChain::new(&words(&["1080p", "Hindi"]), &[]);
        assert!(chain.check("Movie.HINDI.mkv").is_ok());
        assert_eq!(
            chain.check("Movie.720p.mkv"),
            Err(SkipReason::NotWhitelisted)
        );
    }

    #[test]
    fn blacklist_rejects_case_insensitively() {
        let chain = FilterChain::new(&[], &words(&["CAM"]));
        assert_eq!(chain.check("movie.cam.mp4"), Err(SkipReason::Blacklisted));
        assert_eq!(
            chain.check("Camera Roll.zip"),
            Err(SkipReason::Blacklisted),
            "matching is substring containment"
        );
    }

    #[test]
    fn blacklist_takes_precedence_over_whitelist() {
        let chain = FilterChain::new(&words(&["movie"]), &words(&["sample"]));
        assert_eq!(
            chain.check("Movie.Sample.mkv"),
            Err(SkipReason::Blacklisted)
        );
    }

    #[test]
    fn blank_words_are_ignored() {
        let chain = FilterChain::new(&words(&["  "]), &words(&[""]));
        assert!(
            chain.check("anything.mkv").is_ok(),
            "a blank whitelist word must not make the whitelist non-empty"
        );
    }
}
