//! Rendering configuration.
//!
//! An [`Options`] value is built once before a conversion and only read
//! afterwards. Adapters that take extension names from users go through
//! [`Options::from_extensions`] or [`Options::from_json`], which reject
//! unknown names instead of silently ignoring them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("unknown extension `{0}`")]
    UnknownExtension(String),

    #[error("invalid options document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Extension toggles. Every flag defaults to disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Typographic quotes, dashes and ellipses.
    pub smart: bool,
    /// Footnotes (`[^label]` references and definitions).
    pub notes: bool,
    /// Drop `<style>` blocks from the source.
    pub filter_styles: bool,
    /// Drop all raw HTML from the source.
    pub filter_html: bool,
    /// Accepted for compatibility, has no effect.
    pub fold_lines: bool,
    /// `~~strike~~`.
    pub strike: bool,
    /// Link bare URLs and e-mail addresses.
    pub autolink: bool,
    /// Newlines inside paragraphs become `<br />`.
    pub hard_wrap: bool,
    /// Render image syntax as plain links.
    pub no_images: bool,
    /// Links to audio/video files become `<audio>`/`<video>`.
    pub media: bool,
    /// `~~~` fenced code blocks.
    pub codeblock: bool,
    /// `#hashtag` markup.
    pub hashtags: bool,
    /// `@username` markup.
    pub usernames: bool,
    /// `?>` spoiler blocks.
    pub spoilerblock: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    Smart,
    Notes,
    FilterStyles,
    FilterHtml,
    FoldLines,
    Strike,
    Autolink,
    HardWrap,
    NoImages,
    Media,
    Codeblock,
    Hashtags,
    Usernames,
    Spoilerblock,
}

impl Extension {
    pub const ALL: [Extension; 14] = [
        Extension::Smart,
        Extension::Notes,
        Extension::FilterStyles,
        Extension::FilterHtml,
        Extension::FoldLines,
        Extension::Strike,
        Extension::Autolink,
        Extension::HardWrap,
        Extension::NoImages,
        Extension::Media,
        Extension::Codeblock,
        Extension::Hashtags,
        Extension::Usernames,
        Extension::Spoilerblock,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Extension::Smart => "smart",
            Extension::Notes => "notes",
            Extension::FilterStyles => "filter_styles",
            Extension::FilterHtml => "filter_html",
            Extension::FoldLines => "fold_lines",
            Extension::Strike => "strike",
            Extension::Autolink => "autolink",
            Extension::HardWrap => "hard_wrap",
            Extension::NoImages => "no_images",
            Extension::Media => "media",
            Extension::Codeblock => "codeblock",
            Extension::Hashtags => "hashtags",
            Extension::Usernames => "usernames",
            Extension::Spoilerblock => "spoilerblock",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Extension {
    type Err = OptionsError;

    /// Accepts `filter_html`, `filterHtml` and `filter-html` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .trim_start_matches(':')
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        Extension::ALL
            .into_iter()
            .find(|ext| ext.name().replace('_', "") == key)
            .ok_or_else(|| OptionsError::UnknownExtension(s.to_string()))
    }
}

impl Options {
    /// Options with every named extension enabled.
    pub fn from_extensions<I, S>(names: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Options::default(), |options, name| {
            Ok(options.with(name.as_ref().parse()?))
        })
    }

    /// Deserialize a JSON object of flags, e.g. `{"smart": true}`.
    pub fn from_json(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with(mut self, extension: Extension) -> Self {
        *self.flag_mut(extension) = true;
        self
    }

    pub fn enabled(&self, extension: Extension) -> bool {
        let mut copy = *self;
        *copy.flag_mut(extension)
    }

    pub fn extensions(&self) -> impl Iterator<Item = Extension> + '_ {
        Extension::ALL.into_iter().filter(|ext| self.enabled(*ext))
    }

    fn flag_mut(&mut self, extension: Extension) -> &mut bool {
        match extension {
            Extension::Smart => &mut self.smart,
            Extension::Notes => &mut self.notes,
            Extension::FilterStyles => &mut self.filter_styles,
            Extension::FilterHtml => &mut self.filter_html,
            Extension::FoldLines => &mut self.fold_lines,
            Extension::Strike => &mut self.strike,
            Extension::Autolink => &mut self.autolink,
            Extension::HardWrap => &mut self.hard_wrap,
            Extension::NoImages => &mut self.no_images,
            Extension::Media => &mut self.media,
            Extension::Codeblock => &mut self.codeblock,
            Extension::Hashtags => &mut self.hashtags,
            Extension::Usernames => &mut self.usernames,
            Extension::Spoilerblock => &mut self.spoilerblock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("smart", Extension::Smart)]
    #[case("filter_html", Extension::FilterHtml)]
    #[case("filterHtml", Extension::FilterHtml)]
    #[case("filter-styles", Extension::FilterStyles)]
    #[case(":hard_wrap", Extension::HardWrap)]
    #[case("SpoilerBlock", Extension::Spoilerblock)]
    fn parses_extension_spellings(#[case] name: &str, #[case] expected: Extension) {
        assert_eq!(name.parse::<Extension>().unwrap(), expected);
    }

    #[test]
    fn display_round_trips_every_extension() {
        for ext in Extension::ALL {
            assert_eq!(ext.to_string().parse::<Extension>().unwrap(), ext);
        }
    }

    #[test]
    fn from_extensions_sets_only_named_flags() {
        let options = Options::from_extensions(["smart", "filterHtml"]).unwrap();
        assert_eq!(
            options,
            Options {
                smart: true,
                filter_html: true,
                ..Options::default()
            }
        );
        assert_eq!(
            options.extensions().collect::<Vec<_>>(),
            vec![Extension::Smart, Extension::FilterHtml]
        );
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = Options::from_extensions(["smart", "tables"]).unwrap_err();
        assert!(matches!(err, OptionsError::UnknownExtension(ref name) if name == "tables"));
        assert_eq!(err.to_string(), "unknown extension `tables`");
    }

    #[test]
    fn json_defaults_missing_flags_to_false() {
        let options = Options::from_json(r#"{"notes": true, "codeblock": true}"#).unwrap();
        assert!(options.notes && options.codeblock);
        assert!(!options.smart);
    }

    #[test]
    fn json_rejects_unknown_keys() {
        let err = Options::from_json(r#"{"notes": true, "tables": true}"#).unwrap_err();
        assert!(matches!(err, OptionsError::Json(_)));
    }

    #[test]
    fn default_enables_nothing() {
        assert_eq!(Options::default().extensions().count(), 0);
    }
}
