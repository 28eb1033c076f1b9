use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::services::retry_policy::{
    RetryDecision, RetryError, RetryPolicy, RetryableOperation,
};
use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::infrastructure::cloud::types::{ApiError, ApiResult, ObjectSummary};

/// Object storage provider operations consumed by [`ObjectStoreClient`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStoreApi: Send + Sync {
    async fn head_bucket(&self, bucket: &str) -> ApiResult<()>;

    async fn list_objects(&self, bucket: &str) -> ApiResult<Vec<ObjectSummary>>;

    /// Writes the object to `destination` and returns the number of bytes.
    async fn get_object(&self, bucket: &str, key: &str, destination: &Path) -> ApiResult<u64>;

    async fn put_object(&self, bucket: &str, key: &str, source: &Path) -> ApiResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> ApiResult<()>;
}

/// Bucket-scoped object storage operations.
pub struct ObjectStoreClient {
    api: Arc<dyn ObjectStoreApi>,
    bucket: String,
    retry: RetryPolicy,
}

impl ObjectStoreClient {
    pub fn new(api: Arc<dyn ObjectStoreApi>, bucket: impl Into<String>) -> Self {
        Self {
            api,
            bucket: bucket.into(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Confirms the bucket exists. Server-side failures (500/503) are retried.
    pub async fn validate_bucket(&self) -> Cons3rtResult<()> {
        let api = &self.api;
        let bucket = self.bucket.as_str();
        let result = self
            .retry
            .execute_classified(
                RetryableOperation::new(format!("validate bucket {bucket}"), move || async move {
                    api.head_bucket(bucket).await
                }),
                |e: &ApiError| match e.status {
                    Some(500) | Some(503) => RetryDecision::Retry,
                    _ => RetryDecision::Abort,
                },
            )
            .await;

        match result {
            Ok(()) => {
                info!("Found bucket: {}", bucket);
                Ok(())
            }
            Err(RetryError::Aborted { source, .. }) if source.status == Some(404) => {
                error!("Bucket {} does not exist", bucket);
                Err(Cons3rtError::not_found("Bucket", bucket))
            }
            Err(e) => {
                error!("Unable to validate bucket {}: {}", bucket, e.source_error());
                Err(e.into())
            }
        }
    }

    /// Every key in the bucket matching `pattern` (unanchored search).
    pub async fn find_keys(&self, pattern: &str) -> Cons3rtResult<Vec<String>> {
        let regex = compile(pattern)?;
        info!("Looking up keys in {} matching: {}", self.bucket, pattern);
        let objects = self
            .api
            .list_objects(&self.bucket)
            .await
            .map_err(|e| e.into_remote_error("ListObjects"))?;

        let matched: Vec<String> = objects
            .into_iter()
            .filter(|object| {
                debug!("Checking key {}", object.key);
                regex.is_match(&object.key)
            })
            .map(|object| object.key)
            .collect();
        info!("Found {} matching key(s)", matched.len());
        Ok(matched)
    }

    /// The single key matching `pattern`; `None` for zero or several matches.
    pub async fn find_key(&self, pattern: &str) -> Cons3rtResult<Option<String>> {
        let mut keys = self.find_keys(pattern).await?;
        match keys.len() {
            1 => Ok(keys.pop()),
            0 => {
                info!("No key matched {}", pattern);
                Ok(None)
            }
            n => {
                info!("{} keys matched {}, expected exactly one", n, pattern);
                Ok(None)
            }
        }
    }

    /// Downloads `key` into `dest_dir`, keeping the key's file name.
    pub async fn download_file_by_key(&self, key: &str, dest_dir: &Path) -> Cons3rtResult<PathBuf> {
        require_dir(dest_dir)?;
        let file_name = key_file_name(key)?;
        let destination = dest_dir.join(file_name);

        let api = &self.api;
        let bucket = self.bucket.as_str();
        let target = destination.as_path();
        let bytes = self
            .retry
            .execute(RetryableOperation::new(format!("download {key}"), move || async move {
                api.get_object(bucket, key, target).await
            }))
            .await?;
        info!("Downloaded {} ({} bytes) to {}", key, bytes, destination.display());
        Ok(destination)
    }

    /// Downloads the single key matching `pattern`, if there is one.
    pub async fn download_file(&self, pattern: &str, dest_dir: &Path) -> Cons3rtResult<Option<PathBuf>> {
        require_dir(dest_dir)?;
        match self.find_key(pattern).await? {
            Some(key) => self.download_file_by_key(&key, dest_dir).await.map(Some),
            None => {
                warn!("Could not find a matching key for: {}", pattern);
                Ok(None)
            }
        }
    }

    pub async fn upload_file(&self, path: &Path, key: &str) -> Cons3rtResult<()> {
        if !path.is_file() {
            return Err(Cons3rtError::validation_error(
                "path",
                "file not found",
                Some(path.display().to_string()),
            ));
        }
        if key.trim().is_empty() {
            return Err(Cons3rtError::validation_error("key", "must not be empty", None));
        }
        info!("Uploading {} to bucket {} as {}", path.display(), self.bucket, key);
        self.api
            .put_object(&self.bucket, key, path)
            .await
            .map_err(|e| {
                error!("Unable to upload {}: {}", path.display(), e);
                e.into_remote_error("PutObject")
            })?;
        info!("Uploaded {} to {}", key, self.bucket);
        Ok(())
    }

    pub async fn delete_key(&self, key: &str) -> Cons3rtResult<()> {
        info!("Deleting key {} from {}", key, self.bucket);
        self.api
            .delete_object(&self.bucket, key)
            .await
            .map_err(|e| {
                error!("Unable to delete key {}: {}", key, e);
                e.into_remote_error("DeleteObject")
            })
    }
}

fn compile(pattern: &str) -> Cons3rtResult<Regex> {
    Regex::new(pattern).map_err(|e| {
        Cons3rtError::validation_error("regex", e.to_string(), Some(pattern.to_string()))
    })
}

fn require_dir(dir: &Path) -> Cons3rtResult<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        error!("Directory not found on file system: {}", dir.display());
        Err(Cons3rtError::validation_error(
            "dest_dir",
            "directory not found",
            Some(dir.display().to_string()),
        ))
    }
}

/// Last `/`-separated segment of `key`.
pub fn key_file_name(key: &str) -> Cons3rtResult<&str> {
    key.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            Cons3rtError::validation_error("key", "key has no file name", Some(key.to_string()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn client(api: MockObjectStoreApi) -> ObjectStoreClient {
        ObjectStoreClient::new(Arc::new(api), "media")
            .with_retry(RetryPolicy::new(3, Duration::ZERO))
    }

    fn listing(keys: &[&str]) -> Vec<ObjectSummary> {
        keys.iter()
            .map(|key| ObjectSummary {
                key: key.to_string(),
                size: 1,
            })
            .collect()
    }

    #[test]
    fn test_key_file_name() {
        assert_eq!(key_file_name("assets/linux/agent.zip").unwrap(), "agent.zip");
        assert_eq!(key_file_name("agent.zip").unwrap(), "agent.zip");
        assert!(key_file_name("assets/").is_err());
    }

    #[tokio::test]
    async fn test_validate_bucket_missing_is_not_found_without_retry() {
        let mut api = MockObjectStoreApi::new();
        api.expect_head_bucket()
            .times(1)
            .returning(|_| Err(ApiError::new(404, "NoSuchBucket", "missing")));

        let error = client(api).validate_bucket().await.unwrap_err();
        assert!(error.is_not_found());
    }

    #[tokio::test]
    async fn test_validate_bucket_retries_server_errors() {
        let mut api = MockObjectStoreApi::new();
        let mut seq = mockall::Sequence::new();
        api.expect_head_bucket()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(ApiError::new(503, "SlowDown", "busy")));
        api.expect_head_bucket()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        assert!(client(api).validate_bucket().await.is_ok());
    }

    #[tokio::test]
    async fn test_validate_bucket_other_errors_are_remote_failures() {
        let mut api = MockObjectStoreApi::new();
        api.expect_head_bucket()
            .times(1)
            .returning(|_| Err(ApiError::new(403, "AccessDenied", "no")));

        let error = client(api).validate_bucket().await.unwrap_err();
        assert!(matches!(error, Cons3rtError::RemoteApiError { status: Some(403), .. }));
    }

    #[tokio::test]
    async fn test_find_key_requires_exactly_one_match() {
        let mut api = MockObjectStoreApi::new();
        api.expect_list_objects()
            .returning(|_| Ok(listing(&["a/agent-1.zip", "a/agent-2.zip", "b/readme.txt"])));
        let client = client(api);

        assert_eq!(client.find_key("readme").await.unwrap().as_deref(), Some("b/readme.txt"));
        assert_eq!(client.find_key(r"agent-\d").await.unwrap(), None);
        assert_eq!(client.find_key("nothing").await.unwrap(), None);
        assert_eq!(client.find_keys(r"agent-\d").await.unwrap().len(), 2);
        assert!(client.find_keys("(").await.is_err());
    }

    #[tokio::test]
    async fn test_download_requires_existing_directory() {
        let api = MockObjectStoreApi::new();
        let temp_dir = TempDir::new().unwrap();
        let error = client(api)
            .download_file_by_key("a/b.zip", &temp_dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(error, Cons3rtError::ValidationError { ref field, .. } if field == "dest_dir"));
    }

    #[tokio::test]
    async fn test_download_file_by_key_uses_last_segment() {
        let temp_dir = TempDir::new().unwrap();
        let expected = temp_dir.path().join("agent.zip");
        let expected_clone = expected.clone();

        let mut api = MockObjectStoreApi::new();
        api.expect_get_object()
            .withf(move |bucket, key, destination| {
                bucket == "media" && key == "assets/agent.zip" && destination == expected_clone
            })
            .times(1)
            .returning(|_, _, _| Ok(42));

        let path = client(api)
            .download_file_by_key("assets/agent.zip", temp_dir.path())
            .await
            .unwrap();
        assert_eq!(path, expected);
    }

    #[tokio::test]
    async fn test_download_exhausts_retries() {
        let temp_dir = TempDir::new().unwrap();
        let mut api = MockObjectStoreApi::new();
        api.expect_get_object()
            .times(3)
            .returning(|_, _, _| Err(ApiError::new(500, "InternalError", "boom")));

        let error = client(api)
            .download_file_by_key("agent.zip", temp_dir.path())
            .await
            .unwrap_err();
        assert!(matches!(error, Cons3rtError::RetryExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let error = client(MockObjectStoreApi::new())
            .upload_file(&temp_dir.path().join("nope.txt"), "key")
            .await
            .unwrap_err();
        assert!(matches!(error, Cons3rtError::ValidationError { .. }));
    }
}
