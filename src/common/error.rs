use std::path::PathBuf;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum Cons3rtError {
    #[error("Command execution failed: {message}")]
    CommandFailure {
        message: String,
        command: String,
        exit_code: Option<i32>,
        output: Option<String>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Properties file error: {message}")]
    PropertiesFileError {
        message: String,
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Deployment error: {message}")]
    DeploymentError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Validation error: {field} - {message}")]
    ValidationError {
        field: String,
        message: String,
        value: Option<String>,
    },

    #[error("{resource} not found: {identifier}")]
    NotFound { resource: String, identifier: String },

    #[error("Remote API call {operation} failed: {message}")]
    RemoteApiError {
        operation: String,
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} did not succeed after {attempts} attempt(s)")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Network operation failed: {message}")]
    NetworkError {
        message: String,
        url: Option<String>,
        status: Option<u16>,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("File system operation failed: {message}")]
    FileSystemError {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Serialization error: {message}")]
    SerializationError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Internal error: {message}")]
    InternalError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Cons3rtError {
    /// Creates a `CommandFailure` without captured output.
    ///
    /// # Arguments
    ///
    /// * `message` - Human readable description
    /// * `command` - The joined command line
    /// * `exit_code` - Exit status, when the process got far enough to have one
    pub fn command_failure(
        message: impl Into<String>,
        command: impl Into<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailure {
            message: message.into(),
            command: command.into(),
            exit_code,
            output: None,
            source: None,
        }
    }

    pub fn command_failure_with_output(
        message: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        output: impl Into<String>,
    ) -> Self {
        Self::CommandFailure {
            message: message.into(),
            command: command.into(),
            exit_code: Some(exit_code),
            output: Some(output.into()),
            source: None,
        }
    }

    pub fn command_failure_with_source(
        message: impl Into<String>,
        command: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::CommandFailure {
            message: message.into(),
            command: command.into(),
            exit_code: None,
            output: None,
            source: Some(source),
        }
    }

    pub fn properties_file_error_with_source(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::PropertiesFileError {
            message: message.into(),
            path: path.into(),
            source: Some(source),
        }
    }

    pub fn deployment_error(message: impl Into<String>) -> Self {
        Self::DeploymentError {
            message: message.into(),
            source: None,
        }
    }

    pub fn deployment_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DeploymentError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a `ValidationError`.
    ///
    /// # Arguments
    ///
    /// * `field` - Name of the offending parameter
    /// * `message` - What is wrong with it
    /// * `value` - The rejected value, when it is safe to echo
    ///
    /// # Examples
    ///
    /// ```
    /// use cons3rt_kit::Cons3rtError;
    ///
    /// let error = Cons3rtError::validation_error("ip", "not an IPv4 address", Some("10.0.0".into()));
    /// assert_eq!(error.to_string(), "Validation error: ip - not an IPv4 address");
    /// ```
    pub fn validation_error(
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
            value,
        }
    }

    pub fn not_found(resource: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            identifier: identifier.into(),
        }
    }

    /// Wraps a provider failure for `operation`, keeping it as the source.
    pub fn remote_api_error_with_source<E>(
        operation: impl Into<String>,
        message: impl Into<String>,
        status: Option<u16>,
        source: E,
    ) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::RemoteApiError {
            operation: operation.into(),
            message: message.into(),
            status,
            source: Some(Box::new(source)),
        }
    }

    pub fn network_error(message: impl Into<String>, url: Option<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
            url,
            status: None,
            source: None,
        }
    }

    pub fn network_error_with_status(
        message: impl Into<String>,
        url: Option<String>,
        status: u16,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            url,
            status: Some(status),
            source: None,
        }
    }

    pub fn network_error_with_source(
        message: impl Into<String>,
        url: Option<String>,
        source: reqwest::Error,
    ) -> Self {
        Self::NetworkError {
            message: message.into(),
            url,
            status: source.status().map(|s| s.as_u16()),
            source: Some(source),
        }
    }

    pub fn filesystem_error(message: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: None,
        }
    }

    pub fn filesystem_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn serialization_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
            source: None,
        }
    }

    pub fn internal_error_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::InternalError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error describes an absent resource rather than a failed call.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::RemoteApiError { status, .. } | Self::NetworkError { status, .. } => {
                *status == Some(404)
            }
            _ => false,
        }
    }
}

/// Reports the first failing field, in field-name order.
impl From<validator::ValidationErrors> for Cons3rtError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        let Some((field, errors)) = fields.into_iter().next() else {
            return Self::validation_error("unknown", "validation failed", None);
        };
        let first = errors.first();
        let message = first
            .map(|e| match &e.message {
                Some(message) => message.to_string(),
                None => e.code.to_string(),
            })
            .unwrap_or_else(|| "invalid".to_string());
        let value = first.and_then(|e| e.params.get("value")).map(|v| match v.as_str() {
            Some(text) => text.to_string(),
            None => v.to_string(),
        });
        Self::validation_error(field, message, value)
    }
}

impl From<std::io::Error> for Cons3rtError {
    fn from(error: std::io::Error) -> Self {
        Self::filesystem_error_with_source("File system operation failed", None, error)
    }
}

impl From<serde_yaml::Error> for Cons3rtError {
    fn from(error: serde_yaml::Error) -> Self {
        Self::serialization_error_with_source("YAML serialization failed", error)
    }
}

impl From<serde_json::Error> for Cons3rtError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization_error_with_source("JSON serialization failed", error)
    }
}

impl From<reqwest::Error> for Cons3rtError {
    fn from(error: reqwest::Error) -> Self {
        let url = error.url().map(|u| u.to_string());
        Self::network_error_with_source("Network request failed", url, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failure_message() {
        let error = Cons3rtError::command_failure("Bad command supplied", "", None);
        assert!(matches!(error, Cons3rtError::CommandFailure { .. }));
        assert_eq!(
            error.to_string(),
            "Command execution failed: Bad command supplied"
        );
    }

    #[test]
    fn test_validation_error_names_field() {
        let error = Cons3rtError::validation_error("host", "must not be empty", None);
        assert_eq!(error.to_string(), "Validation error: host - must not be empty");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(Cons3rtError::not_found("ENI", "device index 2").is_not_found());
        assert!(
            Cons3rtError::remote_api_error_with_source(
                "HeadBucket",
                "NoSuchBucket",
                Some(404),
                std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            )
            .is_not_found()
        );
        assert!(!Cons3rtError::internal_error("boom").is_not_found());
    }

    #[test]
    fn test_error_conversion_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Cons3rtError = io_error.into();
        assert!(matches!(error, Cons3rtError::FileSystemError { .. }));
    }
}
