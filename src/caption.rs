//! Caption template rendering
//!
//! Supported placeholders: `{filename}`, `{filesize}`, `{language}`, `{subtitle}`,
//! `{filecaption}`. Substitution is literal and happens in a single left-to-right
//! pass, so placeholder-like text inside a substituted value is never expanded.
//! Unknown placeholders are left as they are.

use crate::utils::format_size;

/// Values available to caption templates
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptionVars {
    /// Output filename
    pub filename: String,
    /// Size in bytes, rendered human-readable
    pub filesize: u64,
    /// Detected language tag
    pub language: String,
    /// Detected subtitle tag
    pub subtitle: String,
    /// Caption of the source message
    pub filecaption: String,
}

/// A caption template ready to render
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CaptionRenderer {
    template: String,
}

impl CaptionRenderer {
    /// Wrap a template string
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Render the template against `vars`
    #[must_use]
    pub fn render(&self, vars: &CaptionVars) -> String {
        let mut out = String::with_capacity(self.template.len() + vars.filename.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let Some(close) = after.find('}') else {
                out.push_str(&rest[open..]);
                return out;
            };
            let name = &after[..close];
            // A nested '{' means this brace does not open a placeholder
            if name.contains('{') {
                out.push('{');
                rest = after;
                continue;
            }

            match name {
                "filename" => out.push_str(&vars.filename),
                "filesize" => out.push_str(&format_size(vars.filesize)),
                "language" => out.push_str(&vars.language),
                "subtitle" => out.push_str(&vars.subtitle),
                "filecaption" => out.push_str(&vars.filecaption),
                _ => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[close + 1..];
        }

        out.push_str(rest);
        out
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_CAPTION_TEMPLATE;

    fn vars() -> CaptionVars {
        CaptionVars {
            filename: "Movie.mkv".to_string(),
            filesize: 3 * 1024 * 1024 * 1024 / 2,
            language: "Hindi".to_string(),
            subtitle: "Esub".to_string(),
            filecaption: "from the archive".to_string(),
        }
    }

    #[test]
    fn default_template_renders_name_and_size() {
        let caption = CaptionRenderer::new(DEFAULT_CAPTION_TEMPLATE).render(&vars());
        assert_eq!(caption, "Movie.mkv\n📊 Size: 1.5GB");
    }

    #[test]
    fn all_placeholders_are_substituted() {
        let renderer =
            CaptionRenderer::new("{filename} | {filesize} | {language} {subtitle} | {filecaption}");
        assert_eq!(
            renderer.render(&vars()),
            "Movie.mkv | 1.5GB | Hindi Esub | from the archive"
        );
    }

    #[test]
    fn unknown_and_unterminated_placeholders_pass_through() {
        let renderer = CaptionRenderer::new("{quality} {filename} {{filename}} {oops");
        assert_eq!(renderer.render(&vars()), "{quality} Movie.mkv {Movie.mkv} {oops");
    }

    #[test]
    fn substituted_values_are_not_re_expanded() {
        let mut v = vars();
        v.filecaption = "{filename}".to_string();
        assert_eq!(CaptionRenderer::new("{filecaption}").render(&v), "{filename}");
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = CaptionRenderer::new("{filename} {language} {x}");
        assert_eq!(renderer.render(&vars()), renderer.render(&vars()));
    }

    #[test]
    fn empty_template_renders_empty_caption() {
        assert_eq!(CaptionRenderer::new("").render(&vars()), "");
    }
}
