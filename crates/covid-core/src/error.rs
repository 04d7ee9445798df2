use thiserror::Error;

/// Application-wide error types for the update bot.
#[derive(Error, Debug)]
pub enum AppError {
    /// Retrieval failed: network fault, missing fixture, non-2xx response.
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// Payload was retrieved but does not match the source's schema.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Payload is well-formed but lacks the expected entry or image reference.
    #[error("Extraction error: {0}")]
    ExtractionError(String),

    /// A date/time field is present but does not match the source's pattern.
    #[error("Invalid timestamp '{value}' (expected {expected})")]
    TimestampFormat {
        value: String,
        expected: &'static str,
    },

    /// The selector names no known scraper kind, fetcher kind, country or source.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The selector is valid but the combination has no implementation yet.
    #[error("Not yet implemented: {0}")]
    NotImplemented(String),

    /// A built fetcher lacks the capabilities its scraper requires.
    #[error("Invalid fetcher: {0}")]
    InvalidFetcher(String),

    /// The image interpreter could not read counts from a chart.
    #[error("Interpreter error: {0}")]
    InterpretError(String),

    /// Report template could not be loaded or filled.
    #[error("Render error: {0}")]
    RenderError(String),

    /// Delivery to a publisher sink failed.
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The run's deadline expired while work was in flight.
    #[error("Run timed out after {0} seconds")]
    Timeout(u64),

    /// The run was cancelled by its caller.
    #[error("Run cancelled")]
    Cancelled,
}

impl AppError {
    /// Stable label for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::FetchError(_) => "fetch",
            AppError::ParseError(_) => "parse",
            AppError::ExtractionError(_) => "extraction",
            AppError::TimestampFormat { .. } => "timestamp_format",
            AppError::NotFound(_) => "not_found",
            AppError::NotImplemented(_) => "not_implemented",
            AppError::InvalidFetcher(_) => "invalid_fetcher",
            AppError::InterpretError(_) => "interpret",
            AppError::RenderError(_) => "render",
            AppError::PublishError(_) => "publish",
            AppError::ConfigError(_) => "config",
            AppError::Timeout(_) => "timeout",
            AppError::Cancelled => "cancelled",
        }
    }

    /// Returns true if the error came from resolving a selector rather than
    /// from retrieving or reading data.
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            AppError::NotFound(_) | AppError::NotImplemented(_) | AppError::InvalidFetcher(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_errors() {
        assert!(AppError::NotFound("x".into()).is_dispatch_error());
        assert!(AppError::NotImplemented("x".into()).is_dispatch_error());
        assert!(AppError::InvalidFetcher("x".into()).is_dispatch_error());
        assert!(!AppError::FetchError("x".into()).is_dispatch_error());
        assert!(!AppError::Timeout(300).is_dispatch_error());
    }

    #[test]
    fn test_kind_labels_are_distinct() {
        let kinds = [
            AppError::NotFound(String::new()).kind(),
            AppError::NotImplemented(String::new()).kind(),
            AppError::InvalidFetcher(String::new()).kind(),
        ];
        assert_eq!(kinds, ["not_found", "not_implemented", "invalid_fetcher"]);
    }

    #[test]
    fn test_timestamp_message() {
        let err = AppError::TimestampFormat {
            value: "yesterday".into(),
            expected: "%Y-%m-%d %H:%M:%S",
        };
        assert_eq!(
            err.to_string(),
            "Invalid timestamp 'yesterday' (expected %Y-%m-%d %H:%M:%S)"
        );
    }
}
