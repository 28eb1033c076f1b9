use async_trait::async_trait;
use regex::Regex;
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::domain::entities::deployment::Deployment;
use crate::domain::entities::property_map::PropertyMap;
use crate::infrastructure::filesystem::properties_store::PropertiesStore;

pub const DEFAULT_AGENT_RUN_DIR: &str = "/opt/cons3rt-agent/run";
pub const DEPLOYMENT_PROPERTIES_FILE: &str = "deployment.properties";
pub const ROLE_IP_PROPERTY_PATTERN: &str = r"^cons3rt\.fap\.deployment\.machine.*0\.internalIp$";
const ROLE_DEVICE: &str = "eth0";

/// Source of this host's IPv4 addresses, keyed by device name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IpAddressSource: Send + Sync {
    async fn ip_addresses(&self) -> Cons3rtResult<BTreeMap<String, String>>;
}

/// Inputs for locating a deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSources {
    pub deployment_home: Option<PathBuf>,
    pub role_name: Option<String>,
    pub asset_dir: Option<PathBuf>,
    pub agent_run_dir: PathBuf,
}

impl Default for DeploymentSources {
    fn default() -> Self {
        Self {
            deployment_home: None,
            role_name: None,
            asset_dir: None,
            agent_run_dir: PathBuf::from(DEFAULT_AGENT_RUN_DIR),
        }
    }
}

impl DeploymentSources {
    /// Reads `DEPLOYMENT_HOME`, `CONS3RT_ROLE_NAME` and `ASSET_DIR`.
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            deployment_home: var("DEPLOYMENT_HOME").map(PathBuf::from),
            role_name: var("CONS3RT_ROLE_NAME"),
            asset_dir: var("ASSET_DIR").map(PathBuf::from),
            agent_run_dir: PathBuf::from(DEFAULT_AGENT_RUN_DIR),
        }
    }

    pub fn with_deployment_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.deployment_home = Some(home.into());
        self
    }

    pub fn with_role_name(mut self, role: impl Into<String>) -> Self {
        self.role_name = Some(role.into());
        self
    }

    pub fn with_asset_dir(mut self, asset_dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(asset_dir.into());
        self
    }

    pub fn with_agent_run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.agent_run_dir = dir.into();
        self
    }
}

/// Builds a [`Deployment`] from the environment and the agent's run directory.
pub struct DeploymentLoader {
    store: PropertiesStore,
}

impl Default for DeploymentLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DeploymentLoader {
    pub fn new() -> Self {
        Self {
            store: PropertiesStore::new(),
        }
    }

    pub async fn load(
        &self,
        sources: &DeploymentSources,
        ip_source: &dyn IpAddressSource,
    ) -> Cons3rtResult<Deployment> {
        let home = resolve_deployment_home(sources).await?;
        let properties_file = home.join(DEPLOYMENT_PROPERTIES_FILE);

        if !tokio::fs::try_exists(&properties_file).await.unwrap_or(false) {
            let message = format!(
                "Deployment properties file not found: {}",
                properties_file.display()
            );
            error!("{}", message);
            return Err(Cons3rtError::deployment_error(message));
        }

        let properties = self.store.load(&properties_file).await.map_err(|e| {
            Cons3rtError::deployment_error_with_source("Unable to read deployment properties", e)
        })?;

        let role_name = match &sources.role_name {
            Some(role) => {
                info!("Found CONS3RT_ROLE_NAME: {}", role);
                role.clone()
            }
            None => role_from_properties(&properties, ip_source).await?,
        };

        match &sources.asset_dir {
            Some(dir) => info!("Found ASSET_DIR: {}", dir.display()),
            None => warn!("ASSET_DIR is not set"),
        }

        Ok(Deployment::new(home, properties_file, properties, role_name)
            .with_asset_dir(sources.asset_dir.clone()))
    }
}

/// `sources.deployment_home`, else the single deployment directory in the
/// agent run directory.
pub async fn resolve_deployment_home(sources: &DeploymentSources) -> Cons3rtResult<PathBuf> {
    if let Some(home) = &sources.deployment_home {
        info!("Found DEPLOYMENT_HOME: {}", home.display());
        return Ok(home.clone());
    }
    warn!("DEPLOYMENT_HOME is not set, searching {}", sources.agent_run_dir.display());
    find_deployment_home(&sources.agent_run_dir).await
}

/// The single entry of `run_dir` whose name contains `Deployment`.
pub async fn find_deployment_home(run_dir: &Path) -> Cons3rtResult<PathBuf> {
    let mut entries = tokio::fs::read_dir(run_dir).await.map_err(|e| {
        Cons3rtError::deployment_error_with_source(
            format!(
                "Unable to find the deployment home, cannot read run directory {}",
                run_dir.display()
            ),
            e,
        )
    })?;

    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| {
        Cons3rtError::deployment_error_with_source("Unable to list run directory", e)
    })? {
        if entry.file_name().to_string_lossy().contains("Deployment") {
            candidates.push(entry.path());
        }
    }

    match candidates.len() {
        1 => {
            let home = candidates.remove(0);
            info!("Found deployment home: {}", home.display());
            Ok(home)
        }
        0 => Err(Cons3rtError::deployment_error(format!(
            "No deployment home found in {}",
            run_dir.display()
        ))),
        n => Err(Cons3rtError::deployment_error(format!(
            "Found {} possible deployment homes in {}",
            n,
            run_dir.display()
        ))),
    }
}

async fn role_from_properties(
    properties: &PropertyMap,
    ip_source: &dyn IpAddressSource,
) -> Cons3rtResult<String> {
    let addresses = ip_source.ip_addresses().await.map_err(|e| {
        Cons3rtError::deployment_error_with_source(
            "Unable to get the IP addresses of this system to determine the role name",
            e,
        )
    })?;
    let ip = addresses.get(ROLE_DEVICE).ok_or_else(|| {
        Cons3rtError::deployment_error(format!(
            "Unable to determine the IP address for {}, found: {:?}",
            ROLE_DEVICE, addresses
        ))
    })?;
    info!("Found IP address for {}: {}", ROLE_DEVICE, ip);
    role_for_ip(properties, ip)
}

/// Role whose `...machine.<role>...0.internalIp` property equals `ip`.
pub fn role_for_ip(properties: &PropertyMap, ip: &str) -> Cons3rtResult<String> {
    let pattern = Regex::new(ROLE_IP_PROPERTY_PATTERN)
        .map_err(|e| Cons3rtError::internal_error_with_source("Invalid role pattern", e))?;

    let matched: Vec<&str> = properties
        .iter()
        .filter(|(key, value)| pattern.is_match(key) && *value == ip)
        .map(|(key, _)| key)
        .collect();
    debug!("Role properties matching {}: {:?}", ip, matched);

    let role = match matched.as_slice() {
        [key] => key.split('.').nth(4).filter(|_| key.split('.').count() > 5),
        _ => None,
    };
    role.map(str::to_string).ok_or_else(|| {
        let message = format!(
            "Could not determine CONS3RT_ROLE_NAME from deployment properties for IP {} ({} matching properties)",
            ip,
            matched.len()
        );
        error!("{}", message);
        Cons3rtError::deployment_error(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const PROPERTIES: &str = "\
cons3rt.deploymentRun.name=Nightly
cons3rt.fap.deployment.machine.web.0.internalIp=10.0.0.5
cons3rt.fap.deployment.machine.db.0.internalIp=10.0.0.6
";

    fn eth0(ip: &'static str) -> MockIpAddressSource {
        let mut source = MockIpAddressSource::new();
        source
            .expect_ip_addresses()
            .returning(move || Ok(BTreeMap::from([("eth0".to_string(), ip.to_string())])));
        source
    }

    #[test]
    fn test_role_for_ip() {
        let properties = PropertyMap::parse(PROPERTIES);
        assert_eq!(role_for_ip(&properties, "10.0.0.6").unwrap(), "db");
        assert!(role_for_ip(&properties, "10.9.9.9").is_err());
    }

    #[tokio::test]
    async fn test_find_deployment_home_requires_single_candidate() {
        let run_dir = TempDir::new().unwrap();
        assert!(find_deployment_home(run_dir.path()).await.is_err());

        std::fs::create_dir(run_dir.path().join("Deployment1234")).unwrap();
        std::fs::create_dir(run_dir.path().join("scratch")).unwrap();
        let home = find_deployment_home(run_dir.path()).await.unwrap();
        assert_eq!(home, run_dir.path().join("Deployment1234"));

        std::fs::create_dir(run_dir.path().join("Deployment5678")).unwrap();
        assert!(find_deployment_home(run_dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_discovers_role_from_eth0() {
        let run_dir = TempDir::new().unwrap();
        let home = run_dir.path().join("Deployment42");
        std::fs::create_dir(&home).unwrap();
        std::fs::write(home.join(DEPLOYMENT_PROPERTIES_FILE), PROPERTIES).unwrap();

        let sources = DeploymentSources::default().with_agent_run_dir(run_dir.path());
        let deployment = DeploymentLoader::new()
            .load(&sources, &eth0("10.0.0.5"))
            .await
            .unwrap();

        assert_eq!(deployment.home, home);
        assert_eq!(deployment.role_name, "web");
        assert_eq!(deployment.run_name(), Some("Nightly"));
    }

    #[tokio::test]
    async fn test_load_prefers_explicit_role() {
        let home = TempDir::new().unwrap();
        std::fs::write(home.path().join(DEPLOYMENT_PROPERTIES_FILE), PROPERTIES).unwrap();

        let sources = DeploymentSources::default()
            .with_deployment_home(home.path())
            .with_role_name("worker");
        let deployment = DeploymentLoader::new()
            .load(&sources, &MockIpAddressSource::new())
            .await
            .unwrap();
        assert_eq!(deployment.role_name, "worker");
    }

    #[tokio::test]
    async fn test_missing_properties_file() {
        let home = TempDir::new().unwrap();
        let sources = DeploymentSources::default().with_deployment_home(home.path());
        let error = DeploymentLoader::new()
            .load(&sources, &MockIpAddressSource::new())
            .await
            .unwrap_err();
        assert!(matches!(error, Cons3rtError::DeploymentError { .. }));
    }
}
