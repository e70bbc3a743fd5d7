use serde::Deserialize;

use crate::transport::DEFAULT_BLOCK_SIZE;
use crate::CursorKind;

/// Rows fetched per page when the caller does not choose a page size.
pub const DEFAULT_PAGE_SIZE: usize = 250;

/// Command language spoken on the session.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Sql,
    Mal,
    Other,
}

impl Language {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sql" => Some(Self::Sql),
            "mal" => Some(Self::Mal),
            "" => None,
            _ => Some(Self::Other),
        }
    }
}

/// Configures paging, background sending and read timeout behavior.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Language of submitted command text.
    pub language: Language,
    /// Page size used when a submit does not name one.
    pub default_page_size: usize,
    /// Multiplier applied by adaptive page growth.
    pub growth_factor: usize,
    /// Growth stops once the page size reaches `default_page_size * growth_limit`.
    pub growth_limit: usize,
    /// Commands longer than this many bytes are written by the background sender.
    pub block_size: usize,
    /// Per-line read timeout in milliseconds, `0` disables it.
    pub read_timeout_ms: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            language: Language::Sql,
            default_page_size: DEFAULT_PAGE_SIZE,
            growth_factor: 10,
            growth_limit: 10,
            block_size: DEFAULT_BLOCK_SIZE,
            read_timeout_ms: 0,
        }
    }
}

impl SessionOptions {
    /// Builds options from environment variables over the defaults.
    ///
    /// Reads `MAPI_LANGUAGE`, `MAPI_REPLY_SIZE`, `MAPI_BLOCK_SIZE` and
    /// `MAPI_READ_TIMEOUT_MS`. Unset variables keep their default.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut options = Self::default();
        if let Ok(language) = std::env::var("MAPI_LANGUAGE") {
            if let Some(language) = Language::parse(&language) {
                options.language = language;
            }
        }
        if let Some(size) = env_number::<usize>("MAPI_REPLY_SIZE")? {
            if size == 0 {
                return Err("MAPI_REPLY_SIZE must be greater than zero".to_owned());
            }
            options.default_page_size = size;
        }
        if let Some(size) = env_number::<usize>("MAPI_BLOCK_SIZE")? {
            options.block_size = size;
        }
        if let Some(timeout) = env_number::<u64>("MAPI_READ_TIMEOUT_MS")? {
            options.read_timeout_ms = timeout;
        }
        Ok(options)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> std::result::Result<Option<T>, String> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("{name} is not a valid number: '{value}'")),
        Err(_) => Ok(None),
    }
}

/// Per-submit settings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SubmitOptions {
    /// Rows per page; `None` or `Some(0)` uses the session default and allows
    /// adaptive growth.
    pub page_size: Option<usize>,
    /// Cursor kind of tabular results produced by this submit.
    pub cursor: CursorKind,
    /// Upper bound on rows per result, `0` means unlimited.
    pub max_rows: usize,
}

impl SubmitOptions {
    /// The page size the caller actually chose, if any.
    pub(crate) fn requested_page_size(&self) -> Option<usize> {
        self.page_size.filter(|&size| size > 0)
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_cursor(mut self, cursor: CursorKind) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{Language, SessionOptions, SubmitOptions};
    use crate::CursorKind;

    #[test]
    fn defaults_match_protocol_constants() {
        let options = SessionOptions::default();
        assert_eq!(options.default_page_size, 250);
        assert_eq!(options.block_size, 8 * 1024 - 2);
        assert_eq!(options.language, Language::Sql);
    }

    #[test]
    fn deserialize_fills_missing_fields() {
        let options: SessionOptions =
            serde_json::from_str(r#"{ "language": "mal", "default_page_size": 100 }"#)
                .expect("must deserialize");
        assert_eq!(options.language, Language::Mal);
        assert_eq!(options.default_page_size, 100);
        assert_eq!(options.growth_factor, 10);
    }

    #[test]
    fn submit_builders() {
        let opts = SubmitOptions::default()
            .with_page_size(10)
            .with_cursor(CursorKind::Scrollable)
            .with_max_rows(5);
        assert_eq!(opts.page_size, Some(10));
        assert_eq!(opts.cursor, CursorKind::Scrollable);
        assert_eq!(opts.max_rows, 5);
    }

    #[test]
    fn zero_page_size_means_default() {
        assert_eq!(SubmitOptions::default().requested_page_size(), None);
        assert_eq!(
            SubmitOptions::default().with_page_size(0).requested_page_size(),
            None
        );
        assert_eq!(
            SubmitOptions::default().with_page_size(7).requested_page_size(),
            Some(7)
        );
    }

    #[test]
    fn language_parse() {
        assert_eq!(Language::parse("SQL"), Some(Language::Sql));
        assert_eq!(Language::parse("mal"), Some(Language::Mal));
        assert_eq!(Language::parse("xquery"), Some(Language::Other));
        assert_eq!(Language::parse(" "), None);
    }
}
