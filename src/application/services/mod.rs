pub mod deployment_service;
pub mod retry_policy;

pub use deployment_service::{DeploymentLoader, DeploymentSources, IpAddressSource};
pub use retry_policy::{RetryDecision, RetryError, RetryPolicy, RetryableOperation};
