//! Permalink parsing and range resolution
//!
//! Two link shapes are accepted:
//! - private channels: `https://<host>/c/<channel number>/<message id>`
//! - public channels: `https://<host>/<handle>/<message id>`
//!
//! Both may carry a forum thread segment before the message id
//! (`/c/<n>/<thread>/<id>`), a trailing slash and a query string.

use url::Url;

use crate::error::LinkError;
use crate::types::{ChannelRef, MessageId, MessageRange};

/// Path segments that look like handles but are service routes
const RESERVED_SEGMENTS: [&str; 5] = ["joinchat", "addstickers", "addemoji", "share", "proxy"];

/// Parse a single permalink into its channel and message id
///
/// # Examples
///
/// ```
/// use media_relay::links::parse_link;
/// use media_relay::types::{ChannelRef, MessageId};
///
/// let (channel, id) = parse_link("https://t.me/c/1234567890/42").unwrap();
/// assert_eq!(channel, ChannelRef::Id(-1001234567890));
/// assert_eq!(id, MessageId(42));
/// ```
pub fn parse_link(link: &str) -> Result<(ChannelRef, MessageId), LinkError> {
    let trimmed = link.trim();
    let url = Url::parse(trimmed).map_err(|e| LinkError::parse(link, e.to_string()))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(LinkError::parse(link, "scheme must be http or https"));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(LinkError::parse(link, "missing host"));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["c", channel, rest @ ..] if matches!(rest.len(), 1 | 2) => {
            let number = parse_positive(channel)
                .ok_or_else(|| LinkError::parse(link, "channel number must be numeric"))?;
            let channel = ChannelRef::from_internal(number)
                .ok_or_else(|| LinkError::parse(link, "channel number out of range"))?;
            let id = parse_message_id(link, rest)?;
            Ok((channel, id))
        }
        [handle, rest @ ..] if matches!(rest.len(), 1 | 2) => {
            if !is_valid_handle(handle) {
                return Err(LinkError::parse(link, "invalid channel handle"));
            }
            let id = parse_message_id(link, rest)?;
            Ok((ChannelRef::handle(handle), id))
        }
        _ => Err(LinkError::parse(
            link,
            "expected /c/<channel>/<message> or /<handle>/<message>",
        )),
    }
}

/// Resolve a start and end permalink into a validated message range
///
/// Both links must reference the same channel and the end id must not precede the
/// start id. A single-message range (start == end) is valid.
pub fn resolve_range(start_link: &str, end_link: &str) -> Result<MessageRange, LinkError> {
    let (start_channel, start) = parse_link(start_link)?;
    let (end_channel, end) = parse_link(end_link)?;

    if start_channel != end_channel {
        return Err(LinkError::ChannelMismatch {
            start: start_channel,
            end: end_channel,
        });
    }
    if end < start {
        return Err(LinkError::RangeOrder {
            start: start.0,
            end: end.0,
        });
    }

    Ok(MessageRange {
        channel: start_channel,
        start,
        end,
    })
}

fn parse_message_id(link: &str, rest: &[&str]) -> Result<MessageId, LinkError> {
    // With a thread segment the message id is the last one; the thread must be numeric too.
    for segment in rest {
        if parse_positive(segment).is_none() {
            return Err(LinkError::parse(link, "message id must be a positive number"));
        }
    }
    rest.last()
        .and_then(|s| parse_positive(s))
        .map(MessageId)
        .ok_or_else(|| LinkError::parse(link, "missing message id"))
}

fn parse_positive(segment: &str) -> Option<i64> {
    if segment.is_empty() || !segment.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    segment.parse::<i64>().ok().filter(|n| *n > 0)
}

fn is_valid_handle(handle: &str) -> bool {
    let len = handle.len();
    (4..=32).contains(&len)
        && handle.starts_with(|c: char| c.is_ascii_alphabetic())
        && handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_SEGMENTS.contains(&handle.to_ascii_lowercase().as_str())
}
