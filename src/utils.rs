//! Utility functions for sizes, durations and filenames

use std::time::Duration;

/// Longest extension still treated as an extension when splitting filenames
const MAX_EXTENSION_LEN: usize = 5;

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count as a compact human-readable size
///
/// Uses binary units and at most two decimals, dropping trailing zeros.
///
/// # Examples
///
/// ```
/// use media_relay::utils::format_size;
///
/// assert_eq!(format_size(0), "0B");
/// assert_eq!(format_size(500 * 1024 * 1024), "500MB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024 / 2), "1.5GB");
/// ```
#[must_use]
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", trimmed, SIZE_UNITS[unit])
}

/// Split a filename into base name and extension (without the dot)
///
/// Only a short alphanumeric tail with at least one letter after the last dot
/// counts as an extension, so `Movie.2024.mkv` splits into
/// `("Movie.2024", Some("mkv"))` while names without a real extension such as
/// `Movie.2024` or `Show.S01E01.Final Cut` stay whole.
/// A leading dot (hidden file) is never an extension separator.
///
/// # Examples
///
/// ```
/// use media_relay::utils::split_extension;
///
/// assert_eq!(split_extension("IL_Movie.mkv"), ("IL_Movie", Some("mkv")));
/// assert_eq!(split_extension("README"), ("README", None));
/// assert_eq!(split_extension(".hidden"), (".hidden", None));
/// ```
#[must_use]
pub fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &filename[idx + 1..];
            if !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().any(|c| c.is_ascii_alphabetic())
            {
                (&filename[..idx], Some(ext))
            } else {
                (filename, None)
            }
        }
        _ => (filename, None),
    }
}

/// Format an elapsed time as `1h 2m 3s`, omitting leading zero units
#[must_use]
pub fn format_duration(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    match (h, m) {
        (0, 0) => format!("{}s", s),
        (0, _) => format!("{}m {}s", m, s),
        _ => format!("{}h {}m {}s", h, m, s),
    }
}

/// Join a base name and optional extension back into a filename
#[must_use]
pub fn join_extension(base: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}.{}", base, ext),
        None => base.to_string(),
    }
}
