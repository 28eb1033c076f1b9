use anyhow::Result;
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::application::services::deployment_service::{
    resolve_deployment_home, DeploymentSources, DEPLOYMENT_PROPERTIES_FILE,
};
use crate::domain::entities::property_map::PropertyMap;
use crate::infrastructure::filesystem::properties_store::PropertiesStore;

/// Print one property value
pub struct PropsGetCommand {
    pub key: String,
    pub file: Option<PathBuf>,
}

impl PropsGetCommand {
    pub fn new(key: String, file: Option<PathBuf>) -> Self {
        Self { key, file }
    }

    pub async fn execute(&self) -> Result<()> {
        let properties = load_properties(self.file.as_deref()).await?;
        match properties.get(&self.key) {
            Some(value) => {
                println!("{}", value);
                Ok(())
            }
            None => Err(anyhow::anyhow!(
                "No single property matches: {}",
                self.key
            )),
        }
    }
}

/// Print all properties
pub struct PropsListCommand {
    pub file: Option<PathBuf>,
}

impl PropsListCommand {
    pub fn new(file: Option<PathBuf>) -> Self {
        Self { file }
    }

    pub async fn execute(&self) -> Result<()> {
        let properties = load_properties(self.file.as_deref()).await?;
        for (key, value) in properties.iter() {
            println!("{}={}", key.bold(), value);
        }
        Ok(())
    }
}

/// `file`, or the deployment properties file of this host.
async fn load_properties(file: Option<&Path>) -> Result<PropertyMap> {
    let path = match file {
        Some(path) => path.to_path_buf(),
        None => resolve_deployment_home(&DeploymentSources::from_env())
            .await?
            .join(DEPLOYMENT_PROPERTIES_FILE),
    };
    Ok(PropertiesStore::new().load(&path).await?)
}
