pub mod instance_metadata;
pub mod nexus;
pub mod slack;

pub use instance_metadata::InstanceMetadataClient;
pub use nexus::NexusClient;
pub use slack::{DeploymentSlacker, SlackAttachment, SlackMessage, SlackNotifier};
