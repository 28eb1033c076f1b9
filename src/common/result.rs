use std::path::PathBuf;

use crate::common::error::Cons3rtError;

/// Result alias used across the crate.
///
/// Every fallible operation in the toolkit returns this, so callers can chain
/// them with `?` and match on a single [`Cons3rtError`].
///
/// # Examples
///
/// ```
/// use cons3rt_kit::common::result::Cons3rtResult;
/// use cons3rt_kit::common::error::Cons3rtError;
///
/// fn lookup(role: &str) -> Cons3rtResult<String> {
///     if role.is_empty() {
///         return Err(Cons3rtError::deployment_error("No role name"));
///     }
///     Ok(format!("{role}.internalIp"))
/// }
/// ```
pub type Cons3rtResult<T> = Result<T, Cons3rtError>;

/// Conversions from `Option` into `Cons3rtResult`.
///
/// Used where an absent value is a failure for the caller, for example an ENI
/// that must exist before an address can be attached to it.
pub trait OptionExt<T> {
    /// Converts `None` into `NotFound { resource, identifier }`.
    ///
    /// # Arguments
    ///
    /// * `resource` - Kind of thing that was looked up, e.g. `"VPC ID"`
    /// * `identifier` - What it was looked up by
    ///
    /// # Examples
    ///
    /// ```
    /// use cons3rt_kit::common::result::OptionExt;
    ///
    /// let vpc: Option<String> = None;
    /// assert!(vpc.ok_or_not_found("VPC ID", "i-0abc").unwrap_err().is_not_found());
    /// ```
    fn ok_or_not_found(
        self,
        resource: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Cons3rtResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(
        self,
        resource: impl Into<String>,
        identifier: impl Into<String>,
    ) -> Cons3rtResult<T> {
        self.ok_or_else(|| Cons3rtError::not_found(resource, identifier))
    }
}

/// Context helpers for foreign `Result` types.
pub trait ResultExt<T, E> {
    /// Wraps an I/O failure as a `FileSystemError` pointing at `path`.
    ///
    /// # Arguments
    ///
    /// * `message` - What was being attempted
    /// * `path` - File or directory involved, if known
    ///
    /// # Examples
    ///
    /// ```
    /// use cons3rt_kit::common::result::{Cons3rtResult, ResultExt};
    ///
    /// let result: Result<String, std::io::Error> = Err(std::io::Error::new(
    ///     std::io::ErrorKind::NotFound, "file not found"
    /// ));
    /// let wrapped: Cons3rtResult<String> = result.with_filesystem_error("read failed", None);
    /// assert!(wrapped.is_err());
    /// ```
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<PathBuf>,
    ) -> Cons3rtResult<T>
    where
        E: Into<std::io::Error>;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn with_filesystem_error(
        self,
        message: impl Into<String>,
        path: Option<PathBuf>,
    ) -> Cons3rtResult<T>
    where
        E: Into<std::io::Error>,
    {
        self.map_err(|e| Cons3rtError::filesystem_error_with_source(message, path, e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_or_not_found() {
        assert_eq!(Some(3).ok_or_not_found("ENI", "eth3").unwrap(), 3);

        let none_value: Option<u32> = None;
        match none_value.ok_or_not_found("ENI", "eth3") {
            Err(Cons3rtError::NotFound {
                resource,
                identifier,
            }) => {
                assert_eq!(resource, "ENI");
                assert_eq!(identifier, "eth3");
            }
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_with_filesystem_error_keeps_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let result: Result<String, std::io::Error> = Err(io_error);

        match result.with_filesystem_error("read failed", Some(PathBuf::from("/etc/hosts"))) {
            Err(Cons3rtError::FileSystemError { path, .. }) => {
                assert_eq!(path, Some(PathBuf::from("/etc/hosts")));
            }
            other => panic!("Expected FileSystemError, got {other:?}"),
        }
    }
}
