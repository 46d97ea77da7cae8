//! Core types for media-relay

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::client::MediaLocation;
use crate::utils::format_size;

/// Offset added to a bare channel number to form its full chat id (`-100XXXXXXXXXX`)
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// A channel, identified either by its numeric chat id or by its public handle
///
/// Opaque to the pipeline beyond equality comparison. Handles are stored
/// lower-case without the leading `@`, so `@MyChannel` and `mychannel` compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "ChannelRefRepr", into = "ChannelRefRepr")]
pub enum ChannelRef {
    /// Numeric chat id (`-100XXXXXXXXXX` for channels)
    Id(i64),
    /// Public handle, normalized
    Handle(String),
}

impl ChannelRef {
    /// Channel addressed by the bare number found in `/c/<number>/` links
    ///
    /// `None` if the full chat id would not fit in an `i64`.
    pub fn from_internal(number: i64) -> Option<Self> {
        CHANNEL_ID_OFFSET
            .checked_add(number)
            .map(|full| ChannelRef::Id(-full))
    }

    /// Channel addressed by public handle (with or without `@`)
    pub fn handle(handle: &str) -> Self {
        ChannelRef::Handle(handle.trim_start_matches('@').to_ascii_lowercase())
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Id(id) => write!(f, "{}", id),
            ChannelRef::Handle(handle) => write!(f, "@{}", handle),
        }
    }
}

impl std::str::FromStr for ChannelRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty channel reference".to_string());
        }
        if let Ok(id) = s.parse::<i64>() {
            return Ok(ChannelRef::Id(id));
        }
        let handle = s.trim_start_matches('@');
        if !handle.is_empty() && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            Ok(ChannelRef::handle(handle))
        } else {
            Err(format!("invalid channel reference: {s}"))
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ChannelRefRepr {
    Id(i64),
    Text(String),
}

impl TryFrom<ChannelRefRepr> for ChannelRef {
    type Error = String;

    fn try_from(repr: ChannelRefRepr) -> Result<Self, Self::Error> {
        match repr {
            ChannelRefRepr::Id(id) => Ok(ChannelRef::Id(id)),
            ChannelRefRepr::Text(text) => text.parse(),
        }
    }
}

impl From<ChannelRef> for ChannelRefRepr {
    fn from(channel: ChannelRef) -> Self {
        match channel {
            ChannelRef::Id(id) => ChannelRefRepr::Id(id),
            ChannelRef::Handle(handle) => ChannelRefRepr::Text(format!("@{handle}")),
        }
    }
}

/// Identifier of a message within its channel
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for MessageId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of message ids on a single channel
///
/// Only constructed by [`crate::links::resolve_range`], which guarantees `start <= end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRange {
    /// Channel both ends belong to
    pub channel: ChannelRef,
    /// First message id (inclusive)
    pub start: MessageId,
    /// Last message id (inclusive)
    pub end: MessageId,
}

impl MessageRange {
    /// Number of message ids covered by the range
    pub fn len(&self) -> u64 {
        (self.end.0 - self.start.0 + 1) as u64
    }

    /// A resolved range always covers at least one id
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether `id` lies within the range
    pub fn contains(&self, id: MessageId) -> bool {
        self.start <= id && id <= self.end
    }
}

impl fmt::Display for MessageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}..={}]", self.channel, self.start, self.end)
    }
}

/// Coarse kind of a transferable attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Generic file attachment
    Document,
    /// Video attachment
    Video,
    /// Audio track
    Audio,
    /// Animation (GIF-like video without sound)
    Animation,
}

impl MediaKind {
    /// Lower-case name used in generated filenames
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Document => "document",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Animation => "animation",
        }
    }
}

/// A message that carries transferable media, as extracted by the classifier
///
/// Immutable once produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    /// Source message id
    pub id: MessageId,
    /// Filename as found on the source (or generated fallback)
    pub raw_filename: String,
    /// Size in bytes (0 when the source does not report it)
    pub size: u64,
    /// Coarse kind
    pub kind: MediaKind,
    /// Mime type if the source reports one
    pub mime_type: Option<String>,
    /// Caption of the source message, empty if none
    pub original_caption: String,
    /// Where the bytes can be fetched from
    pub source: MediaLocation,
}

/// Why an item was skipped without transferring
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Whitelist is non-empty and the filename matched none of its words
    NotWhitelisted,
    /// The filename matched a blacklist word
    Blacklisted,
    /// Above the premium threshold and premium transfers are not allowed
    SizeLimit,
}

impl SkipReason {
    /// Short label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NotWhitelisted => "not whitelisted",
            SkipReason::Blacklisted => "blacklisted",
            SkipReason::SizeLimit => "size limit, non-premium",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why an attempted item did not reach every destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// The batch containing the message could not be fetched
    Fetch,
    /// The media could not be downloaded
    Download,
    /// At least one destination did not receive the file
    Upload {
        /// Destinations that failed
        failed: Vec<ChannelRef>,
    },
    /// Cancelled by the user while in flight
    Cancelled,
}

impl FailReason {
    /// Short label used in summaries
    pub fn label(&self) -> &'static str {
        match self {
            FailReason::Fetch => "fetch failed",
            FailReason::Download => "download failed",
            FailReason::Upload { .. } => "upload failed",
            FailReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single transfer job
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum JobOutcome {
    /// Not yet attempted
    #[default]
    Pending,
    /// Delivered to every destination
    Succeeded,
    /// Not transferred, by policy
    Skipped(SkipReason),
    /// Attempted and failed
    Failed(FailReason),
}

impl JobOutcome {
    /// Whether the job reached a final state
    pub fn is_settled(&self) -> bool {
        !matches!(self, JobOutcome::Pending)
    }
}

/// Result of uploading to one destination
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Destination channel
    pub destination: ChannelRef,
    /// Error message if the upload failed
    pub error: Option<String>,
}

impl Delivery {
    /// Whether the destination received the file
    pub fn is_delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// One media item bound to its rewritten filename, rendered caption and outcome
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferJob {
    /// The media to move
    pub item: MediaItem,
    /// Filename after the rewrite pipeline
    pub output_filename: String,
    /// Caption after template rendering
    pub caption: String,
    /// Current outcome
    pub outcome: JobOutcome,
    /// Per-destination results, in configured order
    pub deliveries: Vec<Delivery>,
    /// Bytes written to staging
    pub bytes_downloaded: u64,
    /// Bytes sent to destinations (summed over successful deliveries)
    pub bytes_uploaded: u64,
}

impl TransferJob {
    /// A pending job
    pub fn new(item: MediaItem, output_filename: String, caption: String) -> Self {
        Self {
            item,
            output_filename,
            caption,
            outcome: JobOutcome::Pending,
            deliveries: Vec::new(),
            bytes_downloaded: 0,
            bytes_uploaded: 0,
        }
    }

    /// The same job with a final outcome
    pub fn settle(mut self, outcome: JobOutcome) -> Self {
        self.outcome = outcome;
        self
    }
}

/// Direction of the transfer currently in progress
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Source to staging
    Download,
    /// Staging to a destination
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Download => f.write_str("downloading"),
            Direction::Upload => f.write_str("uploading"),
        }
    }
}

/// Lifecycle state of the run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// No run active
    #[default]
    Idle,
    /// Processing items
    Running,
    /// Holding between items
    Paused,
    /// Cancel-all requested, finishing up
    Cancelling,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Cancelling => "cancelling",
        };
        f.write_str(s)
    }
}

/// Upcoming item shown in the queue preview
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Source message id
    pub id: MessageId,
    /// Output filename
    pub filename: String,
    /// Size in bytes
    pub size: u64,
}

/// Point-in-time view of the run, as read by the presentation layer
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Lifecycle state
    pub state: RunState,
    /// Message currently being transferred
    pub current_id: Option<MessageId>,
    /// Output filename of the current item
    pub current_filename: Option<String>,
    /// Destination currently being uploaded to
    pub current_destination: Option<ChannelRef>,
    /// Direction of the current transfer
    pub direction: Option<Direction>,
    /// Bytes moved so far for the current transfer
    pub bytes_done: u64,
    /// Total bytes of the current transfer
    pub bytes_total: u64,
    /// Message ids accounted for so far
    pub processed: u64,
    /// Message ids in the range, if known
    pub total: Option<u64>,
    /// Jobs delivered everywhere
    pub succeeded: u64,
    /// Jobs skipped by policy
    pub skipped: u64,
    /// Jobs that failed
    pub failed: u64,
    /// Next items in line, bounded
    pub queue_preview: Vec<QueueEntry>,
    /// Cancel-all has been requested
    pub cancel_all: bool,
    /// Cancel-current has been requested for the item in flight
    pub cancel_current: bool,
    /// When the run began
    pub started_at: Option<DateTime<Utc>>,
}

impl RunStatus {
    /// Progress of the current transfer, 0.0 to 100.0
    pub fn progress_percent(&self) -> f32 {
        if self.bytes_total == 0 {
            return 0.0;
        }
        (self.bytes_done as f32 / self.bytes_total as f32 * 100.0).min(100.0)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "State: {}", self.state)?;
        match &self.current_filename {
            Some(name) => {
                write!(f, "Current: {}", name)?;
                if let Some(direction) = self.direction {
                    write!(
                        f,
                        " ({} {:.1}% of {})",
                        direction,
                        self.progress_percent(),
                        format_size(self.bytes_total)
                    )?;
                }
                if let Some(dest) = &self.current_destination {
                    write!(f, " -> {}", dest)?;
                }
                writeln!(f)?;
            }
            None => writeln!(f, "Current: -")?,
        }
        match self.total {
            Some(total) => writeln!(f, "Processed: {}/{}", self.processed, total)?,
            None => writeln!(f, "Processed: {}", self.processed)?,
        }
        write!(
            f,
            "Succeeded: {} | Skipped: {} | Failed: {}",
            self.succeeded, self.skipped, self.failed
        )?;
        if !self.queue_preview.is_empty() {
            write!(f, "\nUp next:")?;
            for (i, entry) in self.queue_preview.iter().enumerate() {
                write!(
                    f,
                    "\n{}. {} ({})",
                    i + 1,
                    entry.filename,
                    format_size(entry.size)
                )?;
            }
        }
        Ok(())
    }
}

/// Run events broadcast to subscribers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A run began over a resolved range
    RunStarted {
        /// The resolved range
        range: MessageRange,
        /// Number of message ids in the range
        total: u64,
    },

    /// A job reached its final outcome
    ItemFinished {
        /// Source message id
        id: MessageId,
        /// Output filename
        filename: String,
        /// Final outcome
        outcome: JobOutcome,
    },

    /// The run ended
    RunFinished {
        /// Jobs delivered everywhere
        succeeded: u64,
        /// Jobs skipped by policy
        skipped: u64,
        /// Jobs that failed
        failed: u64,
        /// Whether the run was cancelled
        cancelled: bool,
    },
}
