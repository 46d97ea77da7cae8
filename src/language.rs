//! Language and subtitle tag detection for captions
//!
//! Best effort only: the filename is split into alphanumeric tokens and the first
//! token found in the vocabulary wins. No match is an empty tag, never an error.

/// Language vocabulary: lower-case token and the tag rendered into captions
const LANGUAGES: &[(&str, &str)] = &[
    ("hindi", "Hindi"),
    ("hin", "Hindi"),
    ("english", "English"),
    ("eng", "English"),
    ("tamil", "Tamil"),
    ("tam", "Tamil"),
    ("telugu", "Telugu"),
    ("tel", "Telugu"),
    ("malayalam", "Malayalam"),
    ("mal", "Malayalam"),
    ("kannada", "Kannada"),
    ("kan", "Kannada"),
    ("bengali", "Bengali"),
    ("ben", "Bengali"),
    ("marathi", "Marathi"),
    ("punjabi", "Punjabi"),
    ("gujarati", "Gujarati"),
    ("urdu", "Urdu"),
    ("korean", "Korean"),
    ("kor", "Korean"),
    ("japanese", "Japanese"),
    ("jap", "Japanese"),
    ("jpn", "Japanese"),
    ("chinese", "Chinese"),
    ("spanish", "Spanish"),
    ("french", "French"),
    ("dual", "Dual Audio"),
    ("multi", "Multi Audio"),
];

/// Subtitle markers
const SUBTITLES: &[(&str, &str)] = &[
    ("esub", "Esub"),
    ("hsub", "Hsub"),
    ("msub", "Msub"),
    ("tsub", "Tsub"),
    ("tesub", "Tesub"),
    ("ksub", "Ksub"),
    ("psub", "Psub"),
];

/// Tags detected in a filename
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Detection {
    /// Language tag, empty if none found
    pub language: String,
    /// Subtitle tag, empty if none found
    pub subtitle: String,
}

/// Detect language and subtitle tags in a (transformed) filename
///
/// # Examples
///
/// ```
/// use media_relay::language::detect;
///
/// let tags = detect("Jawan 2023 Hindi 1080p ESub.mkv");
/// assert_eq!(tags.language, "Hindi");
/// assert_eq!(tags.subtitle, "Esub");
/// ```
#[must_use]
pub fn detect(filename: &str) -> Detection {
    let mut detection = Detection::default();

    for token in filename
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();

        if detection.language.is_empty() {
            if let Some(tag) = lookup(LANGUAGES, &token) {
                detection.language = tag.to_string();
            }
        }
        if detection.subtitle.is_empty() {
            let singular = token.strip_suffix('s').unwrap_or(&token);
            if let Some(tag) = lookup(SUBTITLES, singular) {
                detection.subtitle = tag.to_string();
            }
        }
        if !detection.language.is_empty() && !detection.subtitle.is_empty() {
            break;
        }
    }

    detection
}

fn lookup(vocabulary: &[(&str, &'static str)], token: &str) -> Option<&'static str> {
    vocabulary
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, tag)| *tag)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_language_and_subtitle() {
        let tags = detect("Leo 2023 Tamil 720p HSub.mkv");
        assert_eq!(tags.language, "Tamil");
        assert_eq!(tags.subtitle, "Hsub");
    }

    #[test]
    fn first_language_in_filename_wins() {
        assert_eq!(detect("Movie.Telugu+Hindi.mkv").language, "Telugu");
    }

    #[test]
    fn abbreviations_and_plurals_are_recognized() {
        let tags = detect("Show.S01E02.Eng.ESubs.mp4");
        assert_eq!(tags.language, "English");
        assert_eq!(tags.subtitle, "Esub");
        assert_eq!(detect("Kdrama [Tesub].mkv").subtitle, "Tesub");
    }

    #[test]
    fn tokens_must_match_whole() {
        // "tel" inside "Hotel" and "mal" inside "Normal" are not language tags
        let tags = detect("Hotel Normal 2020.mkv");
        assert_eq!(tags, Detection::default());
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let tags = detect("");
        assert!(tags.language.is_empty());
        assert!(tags.subtitle.is_empty());
    }
}
