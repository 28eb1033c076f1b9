use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::services::retry_policy::RetryPolicy;
use crate::common::error::Cons3rtError;
use crate::common::result::{Cons3rtResult, ResultExt};
use crate::domain::value_objects::command::CommandSpec;
use crate::infrastructure::filesystem::config_store::{ConfigStore, KitConfig};
use crate::infrastructure::http::nexus::NexusClient;
use crate::infrastructure::http::slack::SlackNotifier;
use crate::infrastructure::process::process_runner::{CommandRunner, ProcessRunner};
use crate::infrastructure::process::system_commands::SystemCommands;

pub const HOME_ENV: &str = "CONS3RT_KIT_HOME";
pub const HOME_DIR_NAME: &str = ".cons3rt-kit";
pub const CONFIG_FILE_NAME: &str = "config.yml";

/// Toolkit home layout: `<home>/conf` and `<home>/log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KitDirs {
    pub home: PathBuf,
    pub conf_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl KitDirs {
    pub fn at(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            conf_dir: home.join("conf"),
            log_dir: home.join("log"),
            home,
        }
    }

    /// `$CONS3RT_KIT_HOME`, else `~/.cons3rt-kit`.
    pub fn resolve() -> Cons3rtResult<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::at(home));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| Cons3rtError::config_error("Cannot determine home directory"))?;
        Ok(Self::at(home.join(HOME_DIR_NAME)))
    }

    pub fn create(&self) -> Cons3rtResult<()> {
        for dir in [&self.conf_dir, &self.log_dir] {
            fs::create_dir_all(dir)
                .with_filesystem_error("Unable to create directory", Some(dir.clone()))?;
        }
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.conf_dir.join(CONFIG_FILE_NAME)
    }
}

/// Process-wide settings and component factory, built once at startup.
pub struct AppContext {
    dirs: KitDirs,
    config_file: PathBuf,
    config: KitConfig,
}

impl AppContext {
    /// Resolves and creates the home layout, then loads the config file
    /// (`config_override` replaces `conf/config.yml`).
    pub fn init(config_override: Option<&Path>) -> Cons3rtResult<Self> {
        Self::with_dirs(KitDirs::resolve()?, config_override)
    }

    pub fn with_dirs(dirs: KitDirs, config_override: Option<&Path>) -> Cons3rtResult<Self> {
        dirs.create()?;
        let config_file = config_override
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dirs.config_file());
        let config = ConfigStore::new().load(&config_file)?;
        debug!("Using toolkit home {}", dirs.home.display());
        Ok(Self {
            dirs,
            config_file,
            config,
        })
    }

    pub fn dirs(&self) -> &KitDirs {
        &self.dirs
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    pub fn config_file(&self) -> &Path {
        &self.config_file
    }

    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::new(ProcessRunner::new())
    }

    /// Command spec with the configured default timeout.
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: ToString,
    {
        CommandSpec::new(args).with_timeout(self.config.commands.default_timeout())
    }

    pub fn system_commands(&self) -> SystemCommands {
        let settings = &self.config.commands;
        SystemCommands::new(self.runner())
            .with_remote_timeout(settings.remote_timeout())
            .with_service_timeout(settings.service_timeout())
            .with_service_pause(settings.service_pause())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.config.retry.policy()
    }

    pub fn nexus_client(&self, base_url: Option<&str>) -> Cons3rtResult<NexusClient> {
        let nexus = &self.config.nexus;
        NexusClient::new(base_url.unwrap_or(&nexus.base_url), nexus.retry.policy())
    }

    /// Notifier for `webhook_url`, falling back to the configured webhook.
    pub fn slack_notifier(&self, webhook_url: Option<&str>) -> Cons3rtResult<SlackNotifier> {
        let url = webhook_url
            .or(self.config.slack.webhook_url.as_deref())
            .ok_or_else(|| {
                Cons3rtError::config_error("No Slack webhook URL given and none configured")
            })?;
        SlackNotifier::new(url)
    }

    pub fn shutdown(self) {
        info!("cons3rt-kit shutting down");
    }
}
