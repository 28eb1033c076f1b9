pub mod deployment;
pub mod hosts;
pub mod nexus;
pub mod props;
pub mod remote;
pub mod run;
pub mod service;
pub mod slack;
pub mod system;

pub use deployment::*;
pub use hosts::*;
pub use nexus::*;
pub use props::*;
pub use remote::*;
pub use run::*;
pub use service::*;
pub use slack::*;
pub use system::*;
