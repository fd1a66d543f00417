//! Error types for the zoukcal pipeline.

use std::fmt;

use thiserror::Error;

use crate::store::SourceId;

/// Errors that can occur while building the site.
#[derive(Error, Debug)]
pub enum ZoukError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid {field} {value:?}: {reason}")]
    Validation {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Recurrence error: {0}")]
    Recurrence(String),

    #[error("Resource error: {0}")]
    Resource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Watch error: {0}")]
    Watch(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZoukError {
    pub(crate) fn invalid(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ZoukError::Validation {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error only disqualifies the record it came from.
    ///
    /// Everything else means the rebuild capability itself is broken.
    pub fn is_record_scoped(&self) -> bool {
        matches!(
            self,
            ZoukError::Parse(_)
                | ZoukError::Validation { .. }
                | ZoukError::Recurrence(_)
                | ZoukError::Resource(_)
                | ZoukError::Io(_)
        )
    }
}

/// Result type alias for zoukcal operations.
pub type ZoukResult<T> = Result<T, ZoukError>;

/// A per-file failure: the record was skipped, the rest of the build went on.
#[derive(Debug)]
pub struct RecordError {
    pub source: SourceId,
    pub error: ZoukError,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Skipping {}: {}", self.source, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field_and_value() {
        let err = ZoukError::invalid("time", "9h30", "expected H:MM or HH:MM");
        assert_eq!(err.to_string(), "Invalid time \"9h30\": expected H:MM or HH:MM");
        assert!(err.is_record_scoped());
    }

    #[test]
    fn test_infrastructure_errors_are_not_record_scoped() {
        assert!(!ZoukError::Watch("gone".into()).is_record_scoped());
        assert!(!ZoukError::Output("disk full".into()).is_record_scoped());
        assert!(ZoukError::Resource("img".into()).is_record_scoped());
    }

    #[test]
    fn test_record_error_names_source() {
        let err = RecordError {
            source: SourceId::new("zrh/salsa.md"),
            error: ZoukError::Parse("bad front matter".into()),
        };
        assert_eq!(err.to_string(), "Skipping zrh/salsa.md: Parse error: bad front matter");
    }
}
