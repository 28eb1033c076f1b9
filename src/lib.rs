//! # cons3rt-kit - CONS3RT deployment toolkit
//!
//! `cons3rt-kit` collects the chores a CONS3RT asset install script performs on a
//! freshly deployed host: running commands with timeouts, reading the deployment
//! properties file, managing services and packages, talking to neighbouring hosts
//! over SSH, and calling out to cloud, artifact and chat services.
//!
//! ## Quick Start
//!
//! Run a command with a timeout and captured output:
//!
//! ```bash
//! cons3rt-kit run --timeout 60 -- yum -y update
//! ```
//!
//! Look up a deployment property by name or regex:
//!
//! ```bash
//! cons3rt-kit props get 'cons3rt\.deploymentRun\.name'
//! ```
//!
//! ## Architecture
//!
//! - [`domain`]: Deployment model, property maps and command value types
//! - [`application`]: Deployment discovery and the retry policy
//! - [`infrastructure`]: Processes, files, cloud and HTTP facades
//! - [`presentation`]: CLI interface
//! - [`common`]: Errors, logging and the application context
//!
//! ## Error Handling
//!
//! - [`common::error::Cons3rtError`]: Main error type, sources preserved
//! - [`common::result::Cons3rtResult`]: Type alias for `Result<T, Cons3rtError>`
//!
//! ## Examples
//!
//! ### Running a command
//!
//! ```rust,no_run
//! use cons3rt_kit::domain::value_objects::CommandSpec;
//! use cons3rt_kit::infrastructure::process::{CommandRunner, ProcessRunner};
//!
//! # async fn example() -> cons3rt_kit::Result<()> {
//! let spec = CommandSpec::new(["ls", "-l", "/tmp"]).with_timeout_secs(10.0)?;
//! let result = ProcessRunner::new().run(&spec).await?;
//! println!("exit {}: {}", result.exit_code, result.output);
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading deployment properties
//!
//! ```rust,no_run
//! use cons3rt_kit::infrastructure::filesystem::PropertiesStore;
//! use std::path::Path;
//!
//! # async fn example() -> cons3rt_kit::Result<()> {
//! let properties = PropertiesStore::new()
//!     .load(Path::new("/opt/cons3rt-agent/run/Deployment1/deployment.properties"))
//!     .await?;
//! if let Some(name) = properties.get("deploymentRun.name") {
//!     println!("Deployment run: {name}");
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// Re-export commonly used types for convenience
pub use crate::common::error::Cons3rtError;
pub use crate::common::result::Cons3rtResult as Result;
