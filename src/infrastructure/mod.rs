/// Infrastructure layer modules
///
/// Concrete implementations for everything outside the process:
/// - Child processes and shell facades (yum, services, ssh)
/// - Files (properties, hosts, toolkit config)
/// - Cloud provider facades (compute, object storage)
/// - HTTP services (Nexus, Slack)
pub mod cloud;
pub mod filesystem;
pub mod http;
pub mod process;

// Re-export commonly used types
pub use cloud::{ComputeApi, ComputeClient, ObjectStoreApi, ObjectStoreClient};
pub use filesystem::{ConfigStore, PropertiesStore};
pub use http::{DeploymentSlacker, NexusClient, SlackNotifier};
pub use process::{CommandRunner, ProcessRunner, SystemCommands};
