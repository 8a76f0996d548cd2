// ABOUTME: Error types for the parsers including the ErrorCode enum and the ParserError struct.
// ABOUTME: Provides categorized errors with convenience constructors and boolean helpers.

use std::fmt;

/// Error codes representing the categories of adapter failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidUrl,
    Fetch,
    Timeout,
    NotFound,
    Format,
    Decode,
    Script,
    InvalidFilter,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidUrl => "invalid URL",
            ErrorCode::Fetch => "fetch error",
            ErrorCode::Timeout => "timeout",
            ErrorCode::NotFound => "required element not found",
            ErrorCode::Format => "unexpected format",
            ErrorCode::Decode => "decode error",
            ErrorCode::Script => "script evaluation failed",
            ErrorCode::InvalidFilter => "unsupported filter",
        };
        write!(f, "{}", s)
    }
}

/// The error returned by every adapter operation.
///
/// `url` is the page being processed and `op` names the operation together with the
/// selector or marker that failed, so a caller can log a single line with full context.
#[derive(Debug, thiserror::Error)]
pub struct ParserError {
    pub code: ErrorCode,
    pub url: String,
    pub op: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tankobon: {} {}: {}", self.op, self.url, self.code)?;
        if let Some(ref src) = self.source {
            write!(f, ": {}", src)?;
        }
        Ok(())
    }
}

pub type Result<T, E = ParserError> = std::result::Result<T, E>;

impl ParserError {
    fn with_code(
        code: ErrorCode,
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self {
            code,
            url: url.into(),
            op: op.into(),
            source,
        }
    }

    /// Create an InvalidUrl error.
    pub fn invalid_url(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::InvalidUrl, url, op, source)
    }

    /// Create a Fetch error.
    pub fn fetch(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Fetch, url, op, source)
    }

    /// Create a Timeout error.
    pub fn timeout(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Timeout, url, op, source)
    }

    /// Create a NotFound error for a selector, attribute or script that must be present.
    pub fn not_found(url: impl Into<String>, what: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::NotFound, url, what, None)
    }

    /// Create a Format error.
    pub fn format(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Format, url, op, source)
    }

    /// Create a Decode error.
    pub fn decode(
        url: impl Into<String>,
        op: impl Into<String>,
        source: Option<anyhow::Error>,
    ) -> Self {
        Self::with_code(ErrorCode::Decode, url, op, source)
    }

    /// Create a Script error.
    pub fn script(op: impl Into<String>, source: Option<anyhow::Error>) -> Self {
        Self::with_code(ErrorCode::Script, String::new(), op, source)
    }

    /// Create an InvalidFilter error (no url: raised before any request is built).
    pub fn invalid_filter(op: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::with_code(
            ErrorCode::InvalidFilter,
            String::new(),
            op,
            Some(anyhow::anyhow!("{}", reason)),
        )
    }

    /// Replace an empty url with the page that was being processed.
    pub fn at(mut self, url: &str) -> Self {
        if self.url.is_empty() {
            self.url = url.to_string();
        }
        self
    }

    /// Returns true if this is a Fetch error.
    pub fn is_fetch(&self) -> bool {
        self.code == ErrorCode::Fetch
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        self.code == ErrorCode::Timeout
    }

    /// Returns true if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::NotFound
    }

    /// Returns true if this is a Format error.
    pub fn is_format(&self) -> bool {
        self.code == ErrorCode::Format
    }

    /// Returns true if this is a Decode error.
    pub fn is_decode(&self) -> bool {
        self.code == ErrorCode::Decode
    }

    /// Returns true if this is an InvalidFilter error.
    pub fn is_invalid_filter(&self) -> bool {
        self.code == ErrorCode::InvalidFilter
    }

    /// Returns true if this is an InvalidUrl error.
    pub fn is_invalid_url(&self) -> bool {
        self.code == ErrorCode::InvalidUrl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_op_url_and_cause() {
        let err = ParserError::format(
            "https://mangago.me/chapter.js",
            "sojson envelope",
            Some(anyhow::anyhow!("missing marker")),
        );
        assert_eq!(
            err.to_string(),
            "tankobon: sojson envelope https://mangago.me/chapter.js: unexpected format: missing marker"
        );
        assert!(err.is_format());
    }

    #[test]
    fn at_fills_only_empty_url() {
        let err = ParserError::script("descrambling key", None).at("https://a/1");
        assert_eq!(err.url, "https://a/1");
        let err = ParserError::not_found("https://a/2", "div.x").at("https://a/3");
        assert_eq!(err.url, "https://a/2");
        assert!(err.is_not_found());
    }
}
