//! Facades over cloud provider APIs. The provider SDKs sit behind the
//! [`ComputeApi`] and [`ObjectStoreApi`] traits.

pub mod compute;
pub mod object_store;
pub mod types;

pub use compute::{AttachEniRequest, ComputeApi, ComputeClient};
pub use object_store::{ObjectStoreApi, ObjectStoreClient};
pub use types::{ApiError, ApiResult};
