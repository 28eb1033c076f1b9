pub mod config_store;
pub mod hosts_file;
pub mod network_config;
pub mod properties_store;
pub mod text_edit;

pub use config_store::{ConfigStore, KitConfig};
pub use hosts_file::{update_hosts_file, HostsUpdate};
pub use network_config::{set_ntp_server, write_alias_ifcfg, HostnameFiles};
pub use properties_store::PropertiesStore;
pub use text_edit::replace_in_file;
