use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::application::services::retry_policy::{RetryDecision, RetryError};
use crate::common::error::Cons3rtError;

/// Error reported by a cloud provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: Option<u16>,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn without_status(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status == Some(404) || self.code.contains("NotFound") || self.code.starts_with("NoSuch")
    }

    /// Throttling and server-side failures that usually clear on their own.
    pub fn is_transient(&self) -> bool {
        matches!(self.status, Some(429) | Some(500) | Some(502) | Some(503) | Some(504))
            || matches!(
                self.code.as_str(),
                "Throttling" | "RequestLimitExceeded" | "SlowDown" | "InternalError" | "ServiceUnavailable"
            )
    }

    /// Not-found is permanent, anything else may be retried.
    pub fn retry_decision(&self) -> RetryDecision {
        if self.is_not_found() {
            RetryDecision::Abort
        } else {
            RetryDecision::Retry
        }
    }
}

impl ApiError {
    /// Wraps this failure as a `RemoteApiError` for `operation`.
    pub fn into_remote_error(self, operation: impl Into<String>) -> Cons3rtError {
        let message = self.message.clone();
        let status = self.status;
        Cons3rtError::remote_api_error_with_source(operation, message, status, self)
    }
}

impl From<RetryError<ApiError>> for Cons3rtError {
    fn from(error: RetryError<ApiError>) -> Self {
        match error {
            RetryError::Exhausted {
                operation,
                attempts,
                source,
            } => Self::RetryExhausted {
                operation,
                attempts,
                source: Box::new(source),
            },
            RetryError::Aborted {
                operation, source, ..
            } => source.into_remote_error(operation),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub vpc_id: Option<String>,
    pub network_interfaces: Vec<NetworkInterface>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    pub eni_id: String,
    pub device_index: Option<u32>,
    pub status: String,
    pub private_ip: Option<String>,
    pub public_ip: Option<String>,
    pub attachment_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub subnet_id: String,
    pub vpc_id: String,
    pub name: Option<String>,
    pub cidr_block: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElasticIp {
    pub allocation_id: String,
    pub public_ip: String,
    pub association_id: Option<String>,
    pub instance_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressFilter {
    AllocationId(String),
    InstanceId(String),
    PublicIps(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr_blocks: Vec<String>,
}

impl IngressRule {
    pub fn tcp(port: u16, cidr_blocks: Vec<String>) -> Self {
        Self {
            protocol: "tcp".to_string(),
            from_port: port,
            to_port: port,
            cidr_blocks,
        }
    }

    pub fn covers_port(&self, port: u16) -> bool {
        self.from_port <= port && port <= self.to_port
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub group_id: String,
    pub name: String,
    pub description: String,
    pub vpc_id: Option<String>,
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityGroupFilter {
    GroupId(String),
    Name(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub image_id: String,
    pub name: String,
    pub description: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub snapshot_id: Option<String>,
}

/// Parameters for creating a network interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewNetworkInterface {
    pub subnet_id: String,
    pub security_group_ids: Vec<String>,
    pub private_ip: Option<String>,
    pub secondary_ip_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

impl fmt::Display for ObjectSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.key, self.size)
    }
}
