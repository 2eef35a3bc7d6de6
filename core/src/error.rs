use thiserror::Error;

/// Credential shim error types
#[derive(Error, Debug)]
pub enum ShimError {
    /// Malformed or unreadable configuration — fatal at startup
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Unsupported request API version, or a provider response that
    /// fails schema validation
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Underlying provider binary missing or unstartable
    #[error("Exec error: {provider} - {message}")]
    ExecError { provider: String, message: String },

    /// A provider invocation exceeded its budget
    #[error("Timeout: {provider} exceeded {timeout_seconds}s")]
    TimeoutError {
        provider: String,
        timeout_seconds: u64,
    },

    /// Provider exited non-zero; captured diagnostic output attached
    #[error("Provider error: {provider} exited with status {exit_code}")]
    ProviderError {
        provider: String,
        exit_code: i32,
        stderr: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ShimError {
    /// Whether the dispatch coordinator may recover from this error by
    /// trying the next candidate. Config and inbound protocol errors are
    /// fatal; per-candidate exec/timeout/provider failures are not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ShimError::ExecError { .. }
                | ShimError::TimeoutError { .. }
                | ShimError::ProviderError { .. }
                | ShimError::ProtocolError(_)
        )
    }
}

impl From<serde_json::Error> for ShimError {
    fn from(err: serde_json::Error) -> Self {
        ShimError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for ShimError {
    fn from(err: serde_yaml::Error) -> Self {
        ShimError::SerializationError(err.to_string())
    }
}

/// Result type alias for shim operations
pub type Result<T> = std::result::Result<T, ShimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ShimError::ConfigError("missing mirror endpoint".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: missing mirror endpoint"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        let error = ShimError::ProtocolError("unsupported apiVersion".to_string());
        assert_eq!(error.to_string(), "Protocol error: unsupported apiVersion");
    }

    #[test]
    fn test_exec_error_display() {
        let error = ShimError::ExecError {
            provider: "/opt/providers/ecr-login".to_string(),
            message: "No such file or directory".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Exec error: /opt/providers/ecr-login - No such file or directory"
        );
    }

    #[test]
    fn test_timeout_error_display() {
        let error = ShimError::TimeoutError {
            provider: "ecr-login".to_string(),
            timeout_seconds: 10,
        };
        assert_eq!(error.to_string(), "Timeout: ecr-login exceeded 10s");
    }

    #[test]
    fn test_provider_error_display() {
        let error = ShimError::ProviderError {
            provider: "static-provider".to_string(),
            exit_code: 2,
            stderr: "bad args".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Provider error: static-provider exited with status 2"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let shim_error: ShimError = io_error.into();
        assert!(matches!(shim_error, ShimError::IoError(_)));
        assert!(shim_error.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let result: std::result::Result<serde_json::Value, _> =
            serde_json::from_str("{ invalid json }");
        let shim_error: ShimError = result.unwrap_err().into();
        assert!(matches!(shim_error, ShimError::SerializationError(_)));
    }

    #[test]
    fn test_serde_yaml_error_conversion() {
        let result: std::result::Result<serde_yaml::Value, _> =
            serde_yaml::from_str("invalid: yaml: content:");
        let shim_error: ShimError = result.unwrap_err().into();
        assert!(matches!(shim_error, ShimError::SerializationError(_)));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ShimError::TimeoutError {
            provider: "p".to_string(),
            timeout_seconds: 1,
        }
        .is_recoverable());
        assert!(ShimError::ExecError {
            provider: "p".to_string(),
            message: "gone".to_string(),
        }
        .is_recoverable());
        assert!(ShimError::ProviderError {
            provider: "p".to_string(),
            exit_code: 1,
            stderr: String::new(),
        }
        .is_recoverable());
        assert!(!ShimError::ConfigError("bad".to_string()).is_recoverable());
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_ok().unwrap(), 42);
    }
}
