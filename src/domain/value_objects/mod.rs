pub mod artifact_coordinates;
pub mod command;
pub mod lazy_map;

pub use artifact_coordinates::ArtifactCoordinates;
pub use command::{CommandResult, CommandSpec};
pub use lazy_map::{LazyMap, LazyValue};
