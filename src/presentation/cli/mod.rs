pub mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::process::exit;

use crate::common::context::AppContext;
use crate::common::logging::{init_logging, LogOptions};

use self::commands::{
    DeploymentInfoCommand, HostnameCommand, HostsSetCommand, IpCommand, NexusFetchCommand,
    NtpCommand, PropsGetCommand, PropsListCommand, RemoteEnvCommand, RemoteMarkerCommand,
    RemoteRunCommand, RunCommand, ServiceCommand, SlackFileCommand, SlackLogsCommand,
    SlackPostCommand, YumInstallCommand,
};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_DATE"),
    " for ",
    env!("BUILD_TARGET"),
    ")"
);

/// cons3rt-kit - Deployment helpers for CONS3RT hosts
#[derive(Parser)]
#[command(name = "cons3rt-kit")]
#[command(about = "Deployment helpers for CONS3RT hosts")]
#[command(version)]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file (defaults to <home>/conf/config.yml)
    #[arg(long, global = true, env = "CONS3RT_KIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command with a timeout, echoing its output
    Run {
        /// Timeout in seconds (defaults to the configured timeout)
        #[arg(short, long)]
        timeout: Option<f64>,

        /// Do not echo output lines while the command runs
        #[arg(short, long)]
        quiet: bool,

        /// Let the command write straight to the terminal
        #[arg(long)]
        no_capture: bool,

        /// Command and arguments
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },

    /// Read deployment properties
    Props {
        #[command(subcommand)]
        command: PropsCommands,
    },

    /// Inspect the current deployment
    Deployment {
        #[command(subcommand)]
        command: DeploymentCommands,
    },

    /// Edit the hosts file
    Hosts {
        #[command(subcommand)]
        command: HostsCommands,
    },

    /// Run commands on other hosts over SSH
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },

    /// Start, stop or enable a system service
    Service {
        /// Service name
        name: String,

        /// start, stop, reload, restart, status, enable or disable
        action: String,

        /// Use systemctl
        #[arg(long, conflicts_with = "sysv")]
        systemd: bool,

        /// Use service/chkconfig
        #[arg(long)]
        sysv: bool,
    },

    /// Show the IPv4 addresses of the eth/eno devices
    Ip {
        /// Print the MAC address of eth<N> instead
        #[arg(long)]
        mac: Option<u32>,
    },

    /// Install packages with yum
    Yum {
        /// Packages to install
        #[arg(required = true)]
        packages: Vec<String>,

        /// Only download the packages into this directory
        #[arg(long)]
        download_dir: Option<PathBuf>,
    },

    /// Set this host's hostname
    Hostname {
        /// New hostname
        name: String,

        /// Pretty hostname for systemd hosts (defaults to the hostname)
        #[arg(long)]
        pretty: Option<String>,
    },

    /// Point ntp.conf at a single NTP server
    Ntp {
        /// NTP server hostname or IP
        server: String,

        /// ntp.conf to edit
        #[arg(long, default_value = "/etc/ntp.conf")]
        conf: PathBuf,
    },

    /// Download artifacts from Nexus
    Nexus {
        #[command(subcommand)]
        command: NexusCommands,
    },

    /// Post messages to Slack
    Slack {
        #[command(subcommand)]
        command: SlackCommands,
    },
}

#[derive(Subcommand)]
pub enum PropsCommands {
    /// Print the value of a property, by exact name or regex
    Get {
        /// Property name or regular expression
        key: String,

        /// Properties file (defaults to the deployment properties)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Print every property
    List {
        /// Properties file (defaults to the deployment properties)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum DeploymentCommands {
    /// Show what is known about this deployment
    Info,
}

#[derive(Subcommand)]
pub enum HostsCommands {
    /// Point an IP address at a host entry
    Set {
        /// IPv4 address
        ip: String,

        /// Host names for the address
        entry: String,

        /// Hosts file to edit
        #[arg(short, long, default_value = crate::infrastructure::filesystem::hosts_file::DEFAULT_HOSTS_FILE)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Run a shell command on a host
    Run {
        /// Remote host
        host: String,

        /// Shell command to run
        command: String,
    },

    /// Read or append an environment variable on a host
    Env {
        /// Remote host
        host: String,

        /// Variable name
        name: String,

        /// Value to export (reads the variable when omitted)
        #[arg(long, requires = "env_file")]
        set: Option<String>,

        /// File the export line is appended to
        #[arg(long)]
        env_file: Option<String>,
    },

    /// Check for, or create, a marker file on a host
    Marker {
        /// Remote host
        host: String,

        /// Marker file path
        path: String,

        /// Create the marker instead of checking for it
        #[arg(long)]
        create: bool,
    },
}

#[derive(Subcommand)]
pub enum NexusCommands {
    /// Fetch one artifact
    Fetch(NexusFetchArgs),
}

#[derive(Args)]
pub struct NexusFetchArgs {
    /// Group ID
    #[arg(short, long)]
    pub group: String,

    /// Artifact ID
    #[arg(short, long)]
    pub artifact: String,

    /// Version (release, SNAPSHOT or LATEST)
    #[arg(long = "artifact-version")]
    pub version: String,

    /// Packaging, e.g. zip or war
    #[arg(short, long)]
    pub packaging: String,

    /// Classifier, e.g. bin
    #[arg(short, long)]
    pub classifier: Option<String>,

    /// Destination directory
    #[arg(short, long, default_value = ".")]
    pub dest: PathBuf,

    /// Override the configured Nexus redirect URL
    #[arg(long)]
    pub url: Option<String>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Subcommand)]
pub enum SlackCommands {
    /// Post a message
    Post {
        /// Message text
        text: String,

        /// Webhook URL (defaults to the configured webhook)
        #[arg(long, env = "SLACK_WEBHOOK_URL")]
        webhook: Option<String>,

        /// Channel
        #[arg(short, long)]
        channel: Option<String>,

        /// Attachment text
        #[arg(short, long)]
        attachment: Option<String>,

        /// Attachment color, e.g. good, warning, danger or #9400D3
        #[arg(long)]
        color: Option<String>,
    },

    /// Post the deployment banner with the tail of a text file
    File {
        /// Text file to attach
        path: PathBuf,

        /// Webhook URL (defaults to the configured webhook)
        #[arg(long, env = "SLACK_WEBHOOK_URL")]
        webhook: Option<String>,
    },

    /// Post the deployment banner with the agent log files
    Logs {
        /// Agent log directory
        #[arg(long, default_value = crate::infrastructure::http::slack::DEFAULT_AGENT_LOG_DIR)]
        dir: PathBuf,

        /// Webhook URL (defaults to the configured webhook)
        #[arg(long, env = "SLACK_WEBHOOK_URL")]
        webhook: Option<String>,
    },
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub async fn run(self) -> Result<()> {
        if self.cli.no_color {
            colored::control::set_override(false);
        }

        let context = match AppContext::init(self.cli.config.as_deref()) {
            Ok(context) => context,
            Err(e) => fail(&anyhow::Error::new(e)),
        };

        let log_options = LogOptions {
            verbose: self.cli.verbose,
            config_level: context.config().log_level.clone(),
            log_dir: Some(context.dirs().log_dir.clone()),
        };
        if let Err(e) = init_logging(&log_options) {
            eprintln!("{} {}", "Warning:".yellow().bold(), e);
        }

        match self.handle_command(&context).await {
            Ok(_) => {
                context.shutdown();
                Ok(())
            }
            Err(e) => fail(&e),
        }
    }

    async fn handle_command(&self, context: &AppContext) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                timeout,
                quiet,
                no_capture,
                command,
            } => {
                RunCommand::new(command.clone(), *timeout, *quiet, *no_capture)
                    .execute(context)
                    .await
            }
            Commands::Props { command } => match command {
                PropsCommands::Get { key, file } => {
                    PropsGetCommand::new(key.clone(), file.clone()).execute().await
                }
                PropsCommands::List { file } => PropsListCommand::new(file.clone()).execute().await,
            },
            Commands::Deployment { command } => match command {
                DeploymentCommands::Info => DeploymentInfoCommand::new().execute(context).await,
            },
            Commands::Hosts { command } => match command {
                HostsCommands::Set { ip, entry, file } => {
                    HostsSetCommand::new(ip.clone(), entry.clone(), file.clone())
                        .execute()
                        .await
                }
            },
            Commands::Remote { command } => match command {
                RemoteCommands::Run { host, command } => {
                    RemoteRunCommand::new(host.clone(), command.clone())
                        .execute(context)
                        .await
                }
                RemoteCommands::Env {
                    host,
                    name,
                    set,
                    env_file,
                } => {
                    RemoteEnvCommand::new(host.clone(), name.clone(), set.clone(), env_file.clone())
                        .execute(context)
                        .await
                }
                RemoteCommands::Marker { host, path, create } => {
                    RemoteMarkerCommand::new(host.clone(), path.clone(), *create)
                        .execute(context)
                        .await
                }
            },
            Commands::Service {
                name,
                action,
                systemd,
                sysv,
            } => {
                let init_system = match (*systemd, *sysv) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                };
                ServiceCommand::new(name.clone(), action.clone(), init_system)
                    .execute(context)
                    .await
            }
            Commands::Ip { mac } => IpCommand::new(*mac).execute(context).await,
            Commands::Yum {
                packages,
                download_dir,
            } => {
                YumInstallCommand::new(packages.clone(), download_dir.clone())
                    .execute(context)
                    .await
            }
            Commands::Hostname { name, pretty } => {
                HostnameCommand::new(name.clone(), pretty.clone())
                    .execute(context)
                    .await
            }
            Commands::Ntp { server, conf } => {
                NtpCommand::new(server.clone(), conf.clone()).execute().await
            }
            Commands::Nexus { command } => match command {
                NexusCommands::Fetch(args) => NexusFetchCommand::from_args(args).execute(context).await,
            },
            Commands::Slack { command } => match command {
                SlackCommands::Post {
                    text,
                    webhook,
                    channel,
                    attachment,
                    color,
                } => {
                    SlackPostCommand::new(text.clone(), webhook.clone())
                        .with_channel(channel.clone())
                        .with_attachment(attachment.clone(), color.clone())
                        .execute(context)
                        .await
                }
                SlackCommands::File { path, webhook } => {
                    SlackFileCommand::new(path.clone(), webhook.clone())
                        .execute(context)
                        .await
                }
                SlackCommands::Logs { dir, webhook } => {
                    SlackLogsCommand::new(dir.clone(), webhook.clone())
                        .execute(context)
                        .await
                }
            },
        }
    }
}

fn fail(error: &anyhow::Error) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), error);
    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
    exit(1);
}
