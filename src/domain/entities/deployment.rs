use std::path::{Path, PathBuf};

use crate::domain::entities::property_map::PropertyMap;
use crate::domain::value_objects::lazy_map::LazyMap;

pub const DEPLOYMENT_RUN_NAME_KEY: &str = "cons3rt.deploymentRun.name";
pub const DEPLOYMENT_RUN_ID_KEY: &str = "cons3rt.deploymentRun.id";
pub const DEPLOYMENT_ID_KEY: &str = "deployment.id";

/// Runtime view of the CONS3RT deployment this host belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub home: PathBuf,
    pub properties_file: PathBuf,
    pub role_name: String,
    pub asset_dir: Option<PathBuf>,
    properties: PropertyMap,
}

impl Deployment {
    pub fn new(
        home: impl Into<PathBuf>,
        properties_file: impl Into<PathBuf>,
        properties: PropertyMap,
        role_name: impl Into<String>,
    ) -> Self {
        Self {
            home: home.into(),
            properties_file: properties_file.into(),
            role_name: role_name.into(),
            asset_dir: None,
            properties,
        }
    }

    pub fn with_asset_dir(mut self, asset_dir: Option<PathBuf>) -> Self {
        self.asset_dir = asset_dir;
        self
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Property lookup by exact name or regex, see [`PropertyMap::get`].
    pub fn get_value(&self, key_or_pattern: &str) -> Option<&str> {
        self.properties.get(key_or_pattern)
    }

    pub fn run_name(&self) -> Option<&str> {
        self.get_value(DEPLOYMENT_RUN_NAME_KEY)
    }

    pub fn run_id(&self) -> Option<&str> {
        self.get_value(DEPLOYMENT_RUN_ID_KEY)
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Derived facts about the deployment, computed on access.
    pub fn facts(&self) -> LazyMap<String> {
        let mut facts = LazyMap::new();
        facts
            .insert("deployment_home", self.home.display().to_string())
            .insert(
                "properties_file",
                self.properties_file.display().to_string(),
            )
            .insert("role_name", self.role_name.clone())
            .insert(
                "asset_dir",
                self.asset_dir
                    .as_ref()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default(),
            );

        let properties = self.properties.clone();
        facts.insert_with("deployment_run_name", move |_| {
            properties
                .get(DEPLOYMENT_RUN_NAME_KEY)
                .unwrap_or_default()
                .to_string()
        });
        let properties = self.properties.clone();
        facts.insert_with("deployment_run_id", move |_| {
            properties
                .get(DEPLOYMENT_RUN_ID_KEY)
                .unwrap_or_default()
                .to_string()
        });
        let properties = self.properties.clone();
        facts.insert_with("deployment_id", move |_| {
            properties
                .get(DEPLOYMENT_ID_KEY)
                .unwrap_or_default()
                .to_string()
        });
        facts.insert_with("run_label", |facts| {
            format!(
                "{} (ID: {})",
                facts.resolve("deployment_run_name").unwrap_or_default(),
                facts.resolve("deployment_run_id").unwrap_or_default()
            )
        });
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Deployment {
        let properties = PropertyMap::parse(
            "cons3rt.deploymentRun.name=Nightly\ncons3rt.deploymentRun.id=42\ndeployment.id=7\n",
        );
        Deployment::new(
            "/opt/cons3rt-agent/run/Deployment42",
            "/opt/cons3rt-agent/run/Deployment42/deployment.properties",
            properties,
            "web",
        )
    }

    #[test]
    fn test_run_name_and_id() {
        let deployment = sample();
        assert_eq!(deployment.run_name(), Some("Nightly"));
        assert_eq!(deployment.run_id(), Some("42"));
    }

    #[test]
    fn test_facts_resolve_from_properties() {
        let facts = sample().facts();
        assert_eq!(facts.resolve("role_name").as_deref(), Some("web"));
        assert_eq!(facts.resolve("deployment_id").as_deref(), Some("7"));
        assert_eq!(facts.resolve("run_label").as_deref(), Some("Nightly (ID: 42)"));
        assert_eq!(facts.resolve("asset_dir").as_deref(), Some(""));
    }

    #[test]
    fn test_facts_include_asset_dir() {
        let deployment = sample().with_asset_dir(Some(PathBuf::from("/tmp/asset")));
        let facts = deployment.facts().resolve_all();
        assert_eq!(facts["asset_dir"], "/tmp/asset");
        assert_eq!(facts.len(), 8);
    }
}
