//! Common test utilities and helpers
//!
//! Shared across the integration test binaries: a recording compute API,
//! a scripted HTTP server, and deployment fixtures.

#![allow(dead_code)]

pub mod mock_services;
pub mod test_fixtures;
pub mod test_helpers;
