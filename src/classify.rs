//! Message classification: which messages carry transferable media
//!
//! Documents, videos, audio tracks and animations are transferable. Plain text,
//! photos, stickers, voice notes and everything else are not; those are skipped
//! silently and counted apart from filter rejections.

use crate::client::{Attachment, RawMedia, RawMessage};
use crate::types::{MediaItem, MediaKind};
use crate::utils::split_extension;

/// Extract the transferable media of a message, if any
#[must_use]
pub fn classify(message: &RawMessage) -> Option<MediaItem> {
    let (kind, attachment) = match message.media.as_ref()? {
        RawMedia::Document(a) => (MediaKind::Document, a),
        RawMedia::Video(a) => (MediaKind::Video, a),
        RawMedia::Audio(a) => (MediaKind::Audio, a),
        RawMedia::Animation(a) => (MediaKind::Animation, a),
        RawMedia::Voice(_) | RawMedia::Photo { .. } | RawMedia::Sticker | RawMedia::Other(_) => {
            return None;
        }
    };

    Some(MediaItem {
        id: message.id,
        raw_filename: resolve_filename(message, kind, attachment),
        size: attachment.size,
        kind,
        mime_type: attachment.mime_type.clone(),
        original_caption: message.caption.clone().unwrap_or_default(),
        source: attachment.location.clone(),
    })
}

/// Filename to use for an attachment
///
/// A missing or blank name becomes `<kind>_<message id>.<ext>`; a name without an
/// extension gains the one implied by its mime type.
fn resolve_filename(message: &RawMessage, kind: MediaKind, attachment: &Attachment) -> String {
    let ext = extension_for(kind, attachment.mime_type.as_deref());

    match attachment.file_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => match split_extension(name) {
            (_, Some(_)) => name.to_string(),
            (_, None) => format!("{}.{}", name, ext),
        },
        _ => format!("{}_{}.{}", kind.as_str(), message.id, ext),
    }
}

/// Extension implied by a mime type, falling back to a per-kind default
fn extension_for(kind: MediaKind, mime_type: Option<&str>) -> &'static str {
    let known = mime_type.map(|m| m.trim().to_ascii_lowercase()).and_then(|mime| {
        let ext = match mime.as_str() {
            "video/mp4" => "mp4",
            "video/x-matroska" => "mkv",
            "video/webm" => "webm",
            "video/quicktime" => "mov",
            "video/x-msvideo" => "avi",
            "video/mpeg" => "mpg",
            "video/3gpp" => "3gp",
            "audio/mpeg" => "mp3",
            "audio/mp4" | "audio/x-m4a" => "m4a",
            "audio/ogg" => "ogg",
            "audio/flac" | "audio/x-flac" => "flac",
            "audio/wav" | "audio/x-wav" => "wav",
            "image/gif" => "gif",
            "application/pdf" => "pdf",
            "application/zip" | "application/x-zip-compressed" => "zip",
            "application/x-rar-compressed" | "application/vnd.rar" => "rar",
            "application/x-7z-compressed" => "7z",
            "application/epub+zip" => "epub",
            "application/vnd.android.package-archive" => "apk",
            "application/x-subrip" => "srt",
            "text/plain" => "txt",
            _ => return None,
        };
        Some(ext)
    });

    known.unwrap_or(match kind {
        MediaKind::Video | MediaKind::Animation => "mp4",
        MediaKind::Audio => "mp3",
        MediaKind::Document => "bin",
    })
}
