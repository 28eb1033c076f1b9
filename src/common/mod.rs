pub mod context;
pub mod error;
pub mod logging;
pub mod result;

pub use context::{AppContext, KitDirs};
pub use error::Cons3rtError;
pub use result::Cons3rtResult;
