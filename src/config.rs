//! Configuration types for media-relay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::ChannelRef;

/// Default caption template
pub const DEFAULT_CAPTION_TEMPLATE: &str = "{filename}\n📊 Size: {filesize}";

/// Size above which a transfer needs premium permission (2 GiB)
pub const PREMIUM_THRESHOLD: u64 = 2 * 1024 * 1024 * 1024;

/// Main configuration for a relay
///
/// `rules` seeds the settings store; `transfer` and `retry` are fixed for the
/// lifetime of the [`crate::relay::Relay`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Initial transform/filter rules
    #[serde(default)]
    pub rules: TransformRules,

    /// Transfer behavior (batching, chunking, timeouts, staging)
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Retry behavior for network operations
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    /// Parse a configuration from JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.transfer.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validate every section
    ///
    /// Rules are validated separately at run start, since they may still be
    /// incomplete (no destinations yet) when the relay is constructed.
    pub fn validate(&self) -> Result<()> {
        self.transfer.validate()?;
        self.rules.validate()
    }
}

/// Rewrite, filter and delivery rules for a run
///
/// Read once per run as an immutable snapshot; changes made by the settings store
/// during a run apply to the next run only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformRules {
    /// Prepended to every output filename
    #[serde(default)]
    pub prefix: String,

    /// Appended to every output base name, before the extension
    #[serde(default)]
    pub suffix: String,

    /// Strip `@username` tokens from filenames (default: true)
    #[serde(default = "default_true")]
    pub remove_username: bool,

    /// Strip `www.`/`http(s)://`/`t.me/` link tokens from filenames (default: true)
    #[serde(default = "default_true")]
    pub remove_links: bool,

    /// Exact, case-sensitive substrings deleted from filenames, in order
    #[serde(default)]
    pub removed_words: Vec<String>,

    /// When non-empty, filenames must contain at least one of these (case-insensitive)
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Filenames containing any of these are skipped (case-insensitive)
    #[serde(default)]
    pub blacklist: Vec<String>,

    /// Allow transfers above [`PREMIUM_THRESHOLD`]
    #[serde(default)]
    pub premium_allowed: bool,

    /// Destination channels, uploaded to in this order
    #[serde(default)]
    pub destinations: Vec<ChannelRef>,

    /// Thumbnail attached to every upload
    #[serde(default)]
    pub thumbnail: Option<PathBuf>,

    /// Caption template, see [`crate::caption`]
    #[serde(default = "default_caption_template")]
    pub caption_template: String,
}

impl Default for TransformRules {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            remove_username: true,
            remove_links: true,
            removed_words: Vec::new(),
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            premium_allowed: false,
            destinations: Vec::new(),
            thumbnail: None,
            caption_template: default_caption_template(),
        }
    }
}

impl TransformRules {
    /// Check that the rules are usable for a run
    pub fn validate(&self) -> Result<()> {
        if self.destinations.is_empty() {
            return Err(Error::config(
                "destinations",
                "at least one destination channel is required",
            ));
        }
        Ok(())
    }
}

/// Transfer behavior
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Message ids fetched per batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Downloads running ahead of the upload stage (default: 1, strictly sequential)
    #[serde(default = "default_download_concurrency")]
    pub download_concurrency: usize,

    /// Bytes per download chunk and upload part (default: 512 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Deadline for each chunk/part/send operation (default: 60 seconds)
    #[serde(default = "default_chunk_timeout", with = "duration_serde")]
    pub chunk_timeout: Duration,

    /// Size above which premium permission is needed (default: 2 GiB)
    #[serde(default = "default_premium_threshold")]
    pub premium_threshold: u64,

    /// Directory for transient staging files
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Upcoming items exposed in the status preview (default: 5)
    #[serde(default = "default_queue_preview_len")]
    pub queue_preview_len: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            download_concurrency: default_download_concurrency(),
            chunk_size: default_chunk_size(),
            chunk_timeout: default_chunk_timeout(),
            premium_threshold: default_premium_threshold(),
            staging_dir: default_staging_dir(),
            queue_preview_len: default_queue_preview_len(),
        }
    }
}

impl TransferConfig {
    /// Reject values that would stall or break the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::config("batch_size", "batch_size must be at least 1"));
        }
        if self.download_concurrency == 0 {
            return Err(Error::config(
                "download_concurrency",
                "download_concurrency must be at least 1",
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size", "chunk_size must be at least 1"));
        }
        if self.queue_preview_len == 0 {
            return Err(Error::config(
                "queue_preview_len",
                "queue_preview_len must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_caption_template() -> String {
    DEFAULT_CAPTION_TEMPLATE.to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_download_concurrency() -> usize {
    1
}

fn default_chunk_size() -> usize {
    512 * 1024
}

fn default_chunk_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_premium_threshold() -> u64 {
    PREMIUM_THRESHOLD
}

fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("media-relay")
}

fn default_queue_preview_len() -> usize {
    5
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Durations are whole seconds on the wire
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
