use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;

pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest/meta-data/";
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

/// Reads the EC2 instance metadata service.
///
/// Every lookup answers `None` off AWS, so callers can use it to detect the
/// cloud they run in.
pub struct InstanceMetadataClient {
    http: reqwest::Client,
    base_url: Url,
}

impl InstanceMetadataClient {
    pub fn new() -> Cons3rtResult<Self> {
        Self::with_base_url(DEFAULT_METADATA_URL)
    }

    /// # Arguments
    ///
    /// * `base_url` - Metadata root; a trailing `/` is added when missing
    pub fn with_base_url(base_url: &str) -> Cons3rtResult<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&normalized).map_err(|e| {
            Cons3rtError::validation_error("metadata_url", e.to_string(), Some(normalized.clone()))
        })?;
        let http = reqwest::Client::builder()
            .timeout(METADATA_TIMEOUT)
            .build()
            .map_err(|e| Cons3rtError::network_error_with_source("Unable to build HTTP client", None, e))?;
        Ok(Self { http, base_url })
    }

    /// `true` when the metadata root answers 200.
    pub async fn is_aws(&self) -> bool {
        info!("Querying the metadata URL: {}", self.base_url);
        let available = self.fetch("").await.is_some();
        if available {
            info!("This system is running on AWS");
        } else {
            info!("This system is NOT running on AWS");
        }
        available
    }

    pub async fn instance_id(&self) -> Option<String> {
        self.fetch("instance-id").await
    }

    /// VPC of the interface with MAC address `mac`.
    pub async fn vpc_id(&self, mac: &str) -> Option<String> {
        self.fetch(&interface_path(mac, "vpc-id")).await
    }

    /// Account owning the interface with MAC address `mac`.
    pub async fn owner_id(&self, mac: &str) -> Option<String> {
        self.fetch(&interface_path(mac, "owner-id")).await
    }

    async fn fetch(&self, path: &str) -> Option<String> {
        let url = match self.base_url.join(path) {
            Ok(url) => url,
            Err(e) => {
                error!("Invalid metadata path {}: {}", path, e);
                return None;
            }
        };
        let response = match self.http.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                info!("Unable to query metadata URL {}: {}", url, e);
                return None;
            }
        };
        if response.status() != reqwest::StatusCode::OK {
            error!("Metadata URL {} returned {}", url, response.status());
            return None;
        }
        match response.text().await {
            Ok(body) => Some(body.trim().to_string()),
            Err(e) => {
                error!("Unable to read metadata from {}: {}", url, e);
                None
            }
        }
    }
}

fn interface_path(mac: &str, leaf: &str) -> String {
    format!("network/interfaces/macs/{}/{leaf}", mac.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_path() {
        assert_eq!(
            interface_path(" 0A:1B:2C:3D:4E:5F ", "vpc-id"),
            "network/interfaces/macs/0a:1b:2c:3d:4e:5f/vpc-id"
        );
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = InstanceMetadataClient::with_base_url("http://127.0.0.1:1/latest/meta-data").unwrap();
        assert_eq!(
            client.base_url.join("instance-id").unwrap().as_str(),
            "http://127.0.0.1:1/latest/meta-data/instance-id"
        );
        assert!(InstanceMetadataClient::with_base_url("not a url").is_err());
    }
}
