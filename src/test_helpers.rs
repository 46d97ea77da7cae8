//! Shared test helpers: a scripted in-memory chat client

use crate::client::{
    Attachment, ChatClient, MediaLocation, RawMedia, RawMessage, SendMedia,
};
use crate::config::{Config, RetryConfig, TransferConfig};
use crate::error::{Error, Result};
use crate::types::{ChannelRef, MediaItem, MediaKind, MessageId};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Channel every scripted message lives on (`/c/1234567890/...` links)
pub(crate) fn source() -> ChannelRef {
    ChannelRef::Id(-1001234567890)
}

/// Permalink to message `id` on [`source`]
pub(crate) fn link(id: i64) -> String {
    format!("https://t.me/c/1234567890/{id}")
}

/// Failure to inject into a scripted operation
#[derive(Clone, Debug)]
pub(crate) enum Fault {
    /// Transient transport error
    Transient,
    /// Backpressure with a mandated wait
    RateLimited(Duration),
    /// Permanent per-item failure
    Unavailable,
    /// Session lost authorization
    Auth,
}

impl Fault {
    fn into_error(self, op: &str) -> Error {
        match self {
            Fault::Transient => Error::Transfer(format!("{op}: connection reset")),
            Fault::RateLimited(wait) => Error::RateLimited(wait),
            Fault::Unavailable => Error::MediaUnavailable(format!("{op}: file reference expired")),
            Fault::Auth => Error::FatalAuth(format!("{op}: session revoked")),
        }
    }
}

/// A file as received by a destination
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SentMedia {
    pub destination: ChannelRef,
    pub file_name: String,
    pub caption: String,
    pub thumbnail: Option<PathBuf>,
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

type DownloadHook = Box<dyn Fn(&MediaLocation, u64) + Send + Sync>;

#[derive(Default)]
struct State {
    messages: BTreeMap<i64, RawMessage>,
    files: HashMap<String, Vec<u8>>,
    fetch_faults: VecDeque<Fault>,
    download_faults: HashMap<String, VecDeque<Fault>>,
    part_faults: VecDeque<Fault>,
    failing_destinations: HashMap<ChannelRef, Fault>,
    parts: HashMap<u64, BTreeMap<u32, Vec<u8>>>,
    fetch_calls: Vec<Vec<MessageId>>,
    download_calls: Vec<(String, u64)>,
    send_attempts: Vec<ChannelRef>,
    sent: Vec<SentMedia>,
}

/// In-memory [`ChatClient`] with per-operation failure injection
#[derive(Default)]
pub(crate) struct MockClient {
    state: Mutex<State>,
    on_download: Mutex<Option<DownloadHook>>,
}

impl MockClient {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add a media message whose bytes are `content`
    pub(crate) fn add_media(
        &self,
        id: i64,
        kind: MediaKind,
        file_name: Option<&str>,
        content: Vec<u8>,
    ) {
        let size = content.len() as u64;
        self.add_media_sized(id, kind, file_name, size);
        self.state().files.insert(format!("loc{id}"), content);
    }

    /// Add a document named `file_name` holding `content`
    pub(crate) fn add_document(&self, id: i64, file_name: &str, content: &[u8]) {
        self.add_media(id, MediaKind::Document, Some(file_name), content.to_vec());
    }

    /// Add a media message that reports `size` bytes without storing any
    pub(crate) fn add_media_sized(
        &self,
        id: i64,
        kind: MediaKind,
        file_name: Option<&str>,
        size: u64,
    ) {
        let attachment = Attachment {
            file_name: file_name.map(str::to_string),
            mime_type: Some(match kind {
                MediaKind::Video | MediaKind::Animation => "video/mp4".to_string(),
                MediaKind::Audio => "audio/mpeg".to_string(),
                MediaKind::Document => "application/octet-stream".to_string(),
            }),
            size,
            location: MediaLocation(format!("loc{id}")),
        };
        let media = match kind {
            MediaKind::Document => RawMedia::Document(attachment),
            MediaKind::Video => RawMedia::Video(attachment),
            MediaKind::Audio => RawMedia::Audio(attachment),
            MediaKind::Animation => RawMedia::Animation(attachment),
        };
        self.add_message(RawMessage {
            id: MessageId(id),
            channel: source(),
            caption: Some(format!("caption {id}")),
            media: Some(media),
        });
    }

    /// Add a text-only message
    pub(crate) fn add_text(&self, id: i64) {
        self.add_message(RawMessage {
            id: MessageId(id),
            channel: source(),
            caption: Some(format!("text {id}")),
            media: None,
        });
    }

    pub(crate) fn add_message(&self, message: RawMessage) {
        self.state().messages.insert(message.id.0, message);
    }

    /// Fail the next fetch calls, one fault per call
    pub(crate) fn fail_fetch(&self, faults: impl IntoIterator<Item = Fault>) {
        self.state().fetch_faults.extend(faults);
    }

    /// Fail the next chunk reads of message `id`, one fault per call
    pub(crate) fn fail_download(&self, id: i64, faults: impl IntoIterator<Item = Fault>) {
        self.state()
            .download_faults
            .entry(format!("loc{id}"))
            .or_default()
            .extend(faults);
    }

    /// Fail the next part uploads, one fault per call
    pub(crate) fn fail_parts(&self, faults: impl IntoIterator<Item = Fault>) {
        self.state().part_faults.extend(faults);
    }

    /// Make every send to `destination` fail with `fault`
    pub(crate) fn fail_destination(&self, destination: ChannelRef, fault: Fault) {
        self.state().failing_destinations.insert(destination, fault);
    }

    /// Run `hook` before every chunk read
    pub(crate) fn on_download(&self, hook: impl Fn(&MediaLocation, u64) + Send + Sync + 'static) {
        *self.on_download.lock().unwrap() = Some(Box::new(hook));
    }

    pub(crate) fn fetch_calls(&self) -> Vec<Vec<MessageId>> {
        self.state().fetch_calls.clone()
    }

    pub(crate) fn download_calls(&self) -> Vec<(String, u64)> {
        self.state().download_calls.clone()
    }

    pub(crate) fn send_attempts(&self) -> Vec<ChannelRef> {
        self.state().send_attempts.clone()
    }

    pub(crate) fn sent(&self) -> Vec<SentMedia> {
        self.state().sent.clone()
    }

    /// Pending parts of uploads that were never sent
    pub(crate) fn open_uploads(&self) -> usize {
        self.state().parts.len()
    }
}

#[async_trait::async_trait]
impl ChatClient for MockClient {
    async fn fetch_messages(
        &self,
        _channel: &ChannelRef,
        ids: &[MessageId],
    ) -> Result<Vec<RawMessage>> {
        let mut state = self.state();
        state.fetch_calls.push(ids.to_vec());
        if let Some(fault) = state.fetch_faults.pop_front() {
            return Err(fault.into_error("fetch"));
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.messages.get(&id.0).cloned())
            .collect())
    }

    async fn download_chunk(
        &self,
        location: &MediaLocation,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<u8>> {
        if let Some(hook) = self.on_download.lock().unwrap().as_ref() {
            hook(location, offset);
        }

        let mut state = self.state();
        state.download_calls.push((location.0.clone(), offset));
        if let Some(fault) = state
            .download_faults
            .get_mut(&location.0)
            .and_then(VecDeque::pop_front)
        {
            return Err(fault.into_error("download"));
        }
        let Some(content) = state.files.get(&location.0) else {
            return Err(Error::MediaUnavailable(format!("no such file: {}", location.0)));
        };
        let start = (offset as usize).min(content.len());
        let end = start.saturating_add(limit).min(content.len());
        Ok(content[start..end].to_vec())
    }

    async fn upload_part(
        &self,
        upload_id: u64,
        part: u32,
        _total_parts: u32,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let mut state = self.state();
        if let Some(fault) = state.part_faults.pop_front() {
            return Err(fault.into_error("upload part"));
        }
        state.parts.entry(upload_id).or_default().insert(part, bytes);
        Ok(())
    }

    async fn send_media(&self, request: SendMedia<'_>) -> Result<()> {
        let mut state = self.state();
        state.send_attempts.push(request.destination.clone());
        if let Some(fault) = state.failing_destinations.get(request.destination).cloned() {
            // Parts are consumed by the failed send either way
            state.parts.remove(&request.file.upload_id);
            return Err(fault.into_error("send"));
        }

        let parts = state.parts.remove(&request.file.upload_id).unwrap_or_default();
        let bytes: Vec<u8> = parts.into_values().flatten().collect();
        state.sent.push(SentMedia {
            destination: request.destination.clone(),
            file_name: request.file.file_name.clone(),
            caption: request.caption.to_string(),
            thumbnail: request.thumbnail.map(|p| p.to_path_buf()),
            kind: request.kind,
            bytes,
        });
        Ok(())
    }
}

/// Retry policy with no waiting, for tests that do not assert timing
pub(crate) fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Transfer settings staging into `dir` with tiny chunks
pub(crate) fn transfer_config(dir: &std::path::Path) -> TransferConfig {
    TransferConfig {
        batch_size: 10,
        chunk_size: 4,
        chunk_timeout: Duration::from_secs(5),
        staging_dir: dir.to_path_buf(),
        ..TransferConfig::default()
    }
}

/// Full relay configuration around [`transfer_config`] and [`fast_retry`]
pub(crate) fn test_config(dir: &std::path::Path) -> Config {
    Config {
        transfer: transfer_config(dir),
        retry: fast_retry(2),
        ..Config::default()
    }
}

/// Media item as the classifier would produce it for a scripted document
pub(crate) fn media_item(id: i64, name: &str, size: u64) -> MediaItem {
    MediaItem {
        id: MessageId(id),
        raw_filename: name.to_string(),
        size,
        kind: MediaKind::Document,
        mime_type: None,
        original_caption: String::new(),
        source: MediaLocation(format!("loc{id}")),
    }
}
