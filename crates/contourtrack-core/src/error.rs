//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

/// Raised when a profile or tracker configuration cannot be used.
///
/// These are the only fatal errors of the engine and they surface at load
/// time, never while frames are being processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Fail with [`ConfigError::Invalid`] unless `cond` holds.
pub(crate) fn ensure(cond: bool, field: &'static str, reason: impl Into<String>) -> crate::Result<()> {
    if cond {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_display_names_field() {
        let err = ConfigError::invalid("canny.max_iter", "must be at least 1");
        let msg = err.to_string();
        assert!(msg.contains("canny.max_iter"));
        assert!(msg.contains("at least 1"));
    }

    #[test]
    fn test_parse_error_from_serde() {
        let parse: serde_json::Error = serde_json::from_str::<u32>("nope").unwrap_err();
        let err: ConfigError = parse.into();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
