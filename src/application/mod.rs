//! Services composed from the infrastructure layer.

pub mod services;
