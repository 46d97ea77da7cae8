//! Chat client capability consumed by the pipeline
//!
//! The relay never talks to the chat protocol directly. The embedding application
//! provides a [`ChatClient`] that exposes four primitives: fetching messages by id,
//! reading a chunk of a media file, uploading one part of a file, and sending an
//! uploaded file to a channel. Keeping chunk boundaries on this side of the seam lets
//! the engine apply timeouts, progress reporting and cancellation per chunk.
//!
//! Transports report protocol backpressure as [`Error::RateLimited`] and loss of
//! authorization as [`Error::FatalAuth`]; other failures are [`Error::Transfer`]
//! (transient) or [`Error::MediaUnavailable`] (permanent).
//!
//! [`Error::RateLimited`]: crate::error::Error::RateLimited
//! [`Error::FatalAuth`]: crate::error::Error::FatalAuth
//! [`Error::Transfer`]: crate::error::Error::Transfer
//! [`Error::MediaUnavailable`]: crate::error::Error::MediaUnavailable

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::types::{ChannelRef, MediaKind, MessageId};

/// Opaque handle the transport uses to locate a file's bytes
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaLocation(pub String);

/// A file attachment as reported by the transport
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Original filename, if the sender provided one
    pub file_name: Option<String>,
    /// Mime type, if known
    pub mime_type: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// Where to fetch the bytes
    pub location: MediaLocation,
}

/// Media carried by a message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawMedia {
    /// Generic document
    Document(Attachment),
    /// Video
    Video(Attachment),
    /// Audio track
    Audio(Attachment),
    /// GIF-like animation
    Animation(Attachment),
    /// Voice note
    Voice(Attachment),
    /// Compressed photo
    Photo {
        /// Size of the largest variant
        size: u64,
    },
    /// Sticker
    Sticker,
    /// Anything else (polls, locations, contacts, web pages, ...)
    Other(String),
}

/// A message as fetched from the source channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawMessage {
    /// Message id
    pub id: MessageId,
    /// Channel the message belongs to
    pub channel: ChannelRef,
    /// Caption or text, if any
    pub caption: Option<String>,
    /// Attached media, if any
    pub media: Option<RawMedia>,
}

/// A file whose parts have all been uploaded
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    /// Upload session id the parts were sent under
    pub upload_id: u64,
    /// Number of parts
    pub parts: u32,
    /// Total size in bytes
    pub size: u64,
    /// Filename shown at the destination
    pub file_name: String,
}

/// Request to post an uploaded file to a channel
#[derive(Clone, Debug)]
pub struct SendMedia<'a> {
    /// Target channel
    pub destination: &'a ChannelRef,
    /// The uploaded file
    pub file: &'a UploadedFile,
    /// Rendered caption (may be empty)
    pub caption: &'a str,
    /// Optional thumbnail to attach
    pub thumbnail: Option<&'a Path>,
    /// Kind of media, so the transport can pick the right send method
    pub kind: MediaKind,
    /// Mime type, if known
    pub mime_type: Option<&'a str>,
}

/// Chat protocol primitives the pipeline depends on
#[async_trait::async_trait]
pub trait ChatClient: Send + Sync {
    /// Fetch the given message ids from a channel
    ///
    /// Ids that do not exist (deleted, service messages) are simply absent from the
    /// result.
    async fn fetch_messages(
        &self,
        channel: &ChannelRef,
        ids: &[MessageId],
    ) -> Result<Vec<RawMessage>>;

    /// Read up to `limit` bytes of a media file starting at `offset`
    ///
    /// A chunk shorter than `limit` (or empty) marks the end of the file.
    async fn download_chunk(
        &self,
        location: &MediaLocation,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<u8>>;

    /// Upload one part of a file under `upload_id`
    async fn upload_part(
        &self,
        upload_id: u64,
        part: u32,
        total_parts: u32,
        bytes: Vec<u8>,
    ) -> Result<()>;

    /// Post an uploaded file with filename, caption and thumbnail to a channel
    async fn send_media(&self, request: SendMedia<'_>) -> Result<()>;
}
