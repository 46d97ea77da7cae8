//! Common test utilities for media-relay integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use media_relay::client::Attachment;
use media_relay::{
    ChannelRef, ChatClient, Config, Error, MediaKind, MediaLocation, MemorySettings, MessageId,
    RawMedia, RawMessage, Relay, Result, RetryConfig, SendMedia, TransformRules,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Bare number of the source channel used by [`link`]
pub const SOURCE_CHANNEL: i64 = 1234567890;

/// Permalink to message `id` in the source channel
pub fn link(id: i64) -> String {
    format!("https://t.me/c/{SOURCE_CHANNEL}/{id}")
}

/// Primary destination
pub fn archive() -> ChannelRef {
    ChannelRef::handle("archive")
}

/// Secondary destination
pub fn mirror() -> ChannelRef {
    ChannelRef::handle("mirror")
}

/// What a destination received
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivered {
    pub destination: ChannelRef,
    pub file_name: String,
    pub caption: String,
    pub bytes: Vec<u8>,
}

type SendHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct Channel {
    messages: BTreeMap<i64, RawMessage>,
    files: HashMap<String, Vec<u8>>,
    down_destinations: HashSet<ChannelRef>,
    parts: HashMap<u64, BTreeMap<u32, Vec<u8>>>,
    delivered: Vec<Delivered>,
    downloads: Vec<String>,
}

/// In-memory source channel plus destinations, driven through the public API
#[derive(Default)]
pub struct FakeChat {
    channel: Mutex<Channel>,
    after_send: Mutex<Option<SendHook>>,
}

impl FakeChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn channel(&self) -> std::sync::MutexGuard<'_, Channel> {
        self.channel.lock().unwrap()
    }

    /// Post a document with real content
    pub fn post_document(&self, id: i64, file_name: &str, content: &[u8]) {
        self.post(id, MediaKind::Document, file_name, content.len() as u64);
        self.channel()
            .files
            .insert(format!("file-{id}"), content.to_vec());
    }

    /// Post a video that only reports its size
    pub fn post_large_video(&self, id: i64, file_name: &str, size: u64) {
        self.post(id, MediaKind::Video, file_name, size);
    }

    fn post(&self, id: i64, kind: MediaKind, file_name: &str, size: u64) {
        let attachment = Attachment {
            file_name: Some(file_name.to_string()),
            mime_type: None,
            size,
            location: MediaLocation(format!("file-{id}")),
        };
        let media = match kind {
            MediaKind::Video => RawMedia::Video(attachment),
            _ => RawMedia::Document(attachment),
        };
        self.channel().messages.insert(
            id,
            RawMessage {
                id: MessageId(id),
                channel: ChannelRef::from_internal(SOURCE_CHANNEL).unwrap(),
                caption: None,
                media: Some(media),
            },
        );
    }

    /// Reject every upload sent to `destination`
    pub fn take_down(&self, destination: ChannelRef) {
        self.channel().down_destinations.insert(destination);
    }

    /// Call `hook` with the delivery count after every successful send
    pub fn after_send(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.after_send.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.channel().delivered.clone()
    }

    /// Locations read, one entry per distinct file in read order
    pub fn downloaded(&self) -> Vec<String> {
        let mut files = self.channel().downloads.clone();
        files.dedup();
        files
    }
}

#[async_trait]
impl ChatClient for FakeChat {
    async fn fetch_messages(
        &self,
        _channel: &ChannelRef,
        ids: &[MessageId],
    ) -> Result<Vec<RawMessage>> {
        let channel = self.channel();
        Ok(ids
            .iter()
            .filter_map(|id| channel.messages.get(&id.0).cloned())
            .collect())
    }

    async fn download_chunk(
        &self,
        location: &MediaLocation,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<u8>> {
        let mut channel = self.channel();
        channel.downloads.push(location.0.clone());
        let file = channel
            .files
            .get(&location.0)
            .ok_or_else(|| Error::MediaUnavailable(format!("no such file: {}", location.0)))?;
        let start = (offset as usize).min(file.len());
        let end = (start + limit).min(file.len());
        Ok(file[start..end].to_vec())
    }

    async fn upload_part(
        &self,
        upload_id: u64,
        part: u32,
        _total_parts: u32,
        bytes: Vec<u8>,
    ) -> Result<()> {
        self.channel()
            .parts
            .entry(upload_id)
            .or_default()
            .insert(part, bytes);
        Ok(())
    }

    async fn send_media(&self, request: SendMedia<'_>) -> Result<()> {
        let count = {
            let mut channel = self.channel();
            if channel.down_destinations.contains(request.destination) {
                return Err(Error::MediaUnavailable(format!(
                    "{} is not accepting uploads",
                    request.destination
                )));
            }
            let bytes = channel
                .parts
                .remove(&request.file.upload_id)
                .unwrap_or_default()
                .into_values()
                .flatten()
                .collect();
            channel.delivered.push(Delivered {
                destination: request.destination.clone(),
                file_name: request.file.file_name.clone(),
                caption: request.caption.to_string(),
                bytes,
            });
            channel.delivered.len()
        };
        if let Some(hook) = self.after_send.lock().unwrap().as_ref() {
            hook(count);
        }
        Ok(())
    }
}

/// Configuration with small chunks, a short timeout and fast retries, staging in `dir`
pub fn quick_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.transfer.batch_size = 3;
    config.transfer.chunk_size = 4;
    config.transfer.chunk_timeout = Duration::from_secs(5);
    config.transfer.staging_dir = dir.to_path_buf();
    config.retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Relay over `chat` with `rules`
pub fn relay_with(chat: &Arc<FakeChat>, config: &Config, rules: TransformRules) -> Relay {
    Relay::new(chat.clone(), Arc::new(MemorySettings::new(rules)), config).unwrap()
}
