pub mod deployment;
pub mod property_map;

pub use deployment::Deployment;
pub use property_map::PropertyMap;
