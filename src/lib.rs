//! # media-relay
//!
//! Range transfer pipeline that relays media between chat channels.
//!
//! Given a pair of message permalinks in one source channel, media-relay walks
//! every message in between, filters and renames the attached files, downloads
//! each one once and uploads it to every configured destination channel with a
//! rendered caption.
//!
//! ## Design Philosophy
//!
//! - **Transport-agnostic** - the chat protocol lives behind [`ChatClient`]
//! - **One run, one snapshot** - rules are read once per run from a [`SettingsStore`]
//! - **Per-item isolation** - a failed item never aborts the run; only lost
//!   authorization does
//! - **Observable** - a [`StatusTracker`] snapshot plus an event stream
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_relay::{ChatClient, Config, MemorySettings, Relay};
//! use media_relay::types::ChannelRef;
//! use std::sync::Arc;
//!
//! async fn relay(client: Arc<dyn ChatClient>) -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut rules = config.rules.clone();
//!     rules.destinations = vec![ChannelRef::handle("archive")];
//!     let settings = Arc::new(MemorySettings::new(rules));
//!
//!     let relay = Relay::new(client, settings, &config)?;
//!
//!     // Subscribe to events
//!     let mut events = relay.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = relay
//!         .process_range("https://t.me/c/1234567890/100", "https://t.me/c/1234567890/250")
//!         .await?;
//!     println!("{}", summary);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Caption template rendering
pub mod caption;
/// Media classification
pub mod classify;
/// Chat client capability
pub mod client;
/// Configuration types
pub mod config;
/// Per-item transfer engine (download, staging, upload)
pub mod engine;
/// Error types
pub mod error;
/// Filename whitelist/blacklist filtering
pub mod filter;
/// Language and subtitle tag detection
pub mod language;
/// Permalink parsing
pub mod links;
/// Batched message range iteration
pub mod range;
/// Range transfer orchestration
pub mod relay;
/// Filename rewriting
pub mod rename;
/// Retry logic with exponential backoff
pub mod retry;
/// Settings store capability
pub mod settings;
/// Run status tracking and control
pub mod status;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use client::{ChatClient, MediaLocation, RawMedia, RawMessage, SendMedia, UploadedFile};
pub use config::{Config, RetryConfig, TransferConfig, TransformRules};
pub use error::{Error, LinkError, Result};
pub use relay::{Relay, RunSummary};
pub use settings::{MemorySettings, SettingsStore};
pub use status::StatusTracker;
pub use types::{
    ChannelRef, Event, JobOutcome, MediaItem, MediaKind, MessageId, MessageRange, RunState,
    RunStatus, TransferJob,
};
