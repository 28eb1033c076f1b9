//! Deployment model and value types.

pub mod entities;
pub mod value_objects;
