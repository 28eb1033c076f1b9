use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use url::Url;
use validator::Validate;

use crate::application::services::retry_policy::{RetryDecision, RetryPolicy, RetryableOperation};
use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::domain::value_objects::artifact_coordinates::ArtifactCoordinates;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_REDIRECTS: usize = 10;

/// Downloads artifacts through the Nexus `artifact/maven/redirect` service.
pub struct NexusClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryPolicy,
    show_progress: bool,
}

impl NexusClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Cons3rtResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            Cons3rtError::validation_error("nexus.base_url", e.to_string(), Some(base_url.to_string()))
        })?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| Cons3rtError::network_error_with_source("Unable to build HTTP client", None, e))?;

        Ok(Self {
            http,
            base_url,
            retry,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn query_url(&self, coordinates: &ArtifactCoordinates) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().extend_pairs(coordinates.query_pairs());
        url
    }

    /// Downloads the artifact into `dest_dir` and returns the saved path.
    /// A 404 fails at once; connection failures and 5xx are retried.
    pub async fn download(
        &self,
        coordinates: &ArtifactCoordinates,
        dest_dir: &Path,
    ) -> Cons3rtResult<PathBuf> {
        coordinates.validate()?;
        if !dest_dir.is_dir() {
            error!("Destination directory not found: {}", dest_dir.display());
            return Err(Cons3rtError::validation_error(
                "destination_dir",
                "directory not found",
                Some(dest_dir.display().to_string()),
            ));
        }

        info!("Using repo {} for {}", coordinates.repository(), coordinates);
        let url = self.query_url(coordinates);
        info!("Fetching artifact using URL: {}", url);

        let url_ref = &url;
        let path = self
            .retry
            .execute_classified(
                RetryableOperation::new(format!("download {coordinates}"), move || async move {
                    self.fetch(url_ref, dest_dir).await
                }),
                classify,
            )
            .await?;
        info!("Saved file: {}", path.display());
        Ok(path)
    }

    async fn fetch(&self, url: &Url, dest_dir: &Path) -> Cons3rtResult<PathBuf> {
        let mut response = self.http.get(url.clone()).send().await.map_err(|e| {
            Cons3rtError::network_error_with_source("Nexus request failed", Some(url.to_string()), e)
        })?;

        let status = response.status();
        if !status.is_success() {
            error!("Nexus request returned code {} for {}", status, url);
            return Err(Cons3rtError::network_error_with_status(
                format!("Nexus request returned code {status}"),
                Some(url.to_string()),
                status.as_u16(),
            ));
        }

        debug!("Actual download URL: {}", response.url());
        let file_name = file_name_from_url(response.url())?;
        let destination = dest_dir.join(&file_name);
        let progress = self.progress_bar(response.content_length(), &file_name);

        let mut file = tokio::fs::File::create(&destination).await.map_err(|e| {
            Cons3rtError::filesystem_error_with_source(
                "Unable to create download file",
                Some(destination.clone()),
                e,
            )
        })?;
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            Cons3rtError::network_error_with_source("Nexus download interrupted", Some(url.to_string()), e)
        })? {
            file.write_all(&chunk).await.map_err(|e| {
                Cons3rtError::filesystem_error_with_source(
                    "Unable to write download file",
                    Some(destination.clone()),
                    e,
                )
            })?;
            progress.inc(chunk.len() as u64);
        }
        file.flush().await.map_err(|e| {
            Cons3rtError::filesystem_error_with_source("Unable to flush download file", Some(destination.clone()), e)
        })?;
        progress.finish_and_clear();
        Ok(destination)
    }

    fn progress_bar(&self, length: Option<u64>, file_name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::with_draw_target(length, ProgressDrawTarget::hidden());
        }
        let bar = match length {
            Some(length) => {
                let bar = ProgressBar::new(length);
                bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
                );
                bar
            }
            None => {
                let spinner = ProgressBar::new_spinner();
                spinner.set_style(
                    ProgressStyle::with_template("{spinner:.green} {bytes} {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                spinner.enable_steady_tick(Duration::from_millis(120));
                spinner
            }
        };
        bar.set_message(file_name.to_string());
        bar
    }
}

/// Only connection failures and server errors are worth another attempt.
fn classify(error: &Cons3rtError) -> RetryDecision {
    match error {
        Cons3rtError::NetworkError { status: None, .. } => RetryDecision::Retry,
        Cons3rtError::NetworkError { status: Some(status), .. } if *status >= 500 => RetryDecision::Retry,
        _ => RetryDecision::Abort,
    }
}

/// Last path segment of `url`.
pub fn file_name_from_url(url: &Url) -> Cons3rtResult<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            Cons3rtError::validation_error("url", "download URL has no file name", Some(url.to_string()))
        })
}
