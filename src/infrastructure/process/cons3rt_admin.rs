use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::common::error::Cons3rtError;
use crate::common::result::Cons3rtResult;
use crate::domain::entities::deployment::Deployment;
use crate::domain::value_objects::command::{CommandResult, CommandSpec};
use crate::infrastructure::process::process_runner::CommandRunner;
use crate::infrastructure::process::system_commands::require_non_empty;

/// SSH alias of the CONS3RT application host.
pub const CONS3RT_HOST: &str = "cons3rt";
pub const ADMIN_COMMAND_TIMEOUT: Duration = Duration::from_secs(180);
pub const BASE_DIR_CANDIDATES: [&str; 2] = ["/app", "/opt"];

pub const USER_PROPERTY: &str = "cons3rt.user";
pub const USER_EMAIL_PROPERTY: &str = "cons3rt.user.email";
pub const DEFAULT_USERNAME: &str = "homer";
pub const DEFAULT_USER_EMAIL: &str = "homer@jackpinetech.com";

const SECURITY_ADMIN_SCRIPT: &str = "run_security_admin.sh";
const CONS3RT_ADMIN_SCRIPT: &str = "run_cons3rt_admin.sh";
const USER_HEADER_LINES: usize = 3;
const PROJECT_HEADER_LINES: usize = 2;
const LISTING_FIELDS: usize = 6;

/// Credentials of the CONS3RT administrator the admin scripts run as.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub user: String,
    pub password: String,
}

impl AdminCredentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Cons3rtResult<Self> {
        let credentials = Self {
            user: user.into().trim().to_string(),
            password: password.into().trim().to_string(),
        };
        require_non_empty("admin_user", &credentials.user)?;
        require_non_empty("admin_password", &credentials.password)?;
        Ok(credentials)
    }
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// A row of `run_security_admin.sh -listusers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cons3rtUser {
    pub id: u64,
    pub username: String,
    pub state: String,
    pub certs: String,
    pub system_roles: String,
    pub project_roles: String,
}

/// A row of `run_cons3rt_admin.sh -listprojects -terse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cons3rtProject {
    pub id: String,
    pub name: String,
    pub description: String,
    pub itar: String,
    pub trusted_project: String,
    pub members: String,
}

/// User and project administration through the CONS3RT admin scripts.
///
/// Every command is sent to the CONS3RT host as a single `ssh` argument, so
/// quoted values (passwords, project names, descriptions) may not contain a
/// single quote.
pub struct Cons3rtAdmin {
    runner: Arc<dyn CommandRunner>,
    host: String,
    base_dir: PathBuf,
    credentials: AdminCredentials,
    timeout: Duration,
    echo: bool,
}

impl Cons3rtAdmin {
    /// # Arguments
    ///
    /// * `runner` - Executes the `ssh` commands
    /// * `base_dir` - Directory holding `cons3rt/scripts`, usually `/app` or `/opt`
    /// * `credentials` - Administrator the scripts authenticate as
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        base_dir: impl Into<PathBuf>,
        credentials: AdminCredentials,
    ) -> Self {
        Self {
            runner,
            host: CONS3RT_HOST.to_string(),
            base_dir: base_dir.into(),
            credentials,
            timeout: ADMIN_COMMAND_TIMEOUT,
            echo: false,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub async fn list_users(&self) -> Cons3rtResult<Vec<Cons3rtUser>> {
        debug!("Listing CONS3RT users");
        let result = self.security_admin("-listusers").await?;
        Ok(parse_user_listing(&result.output))
    }

    pub async fn list_projects(&self) -> Cons3rtResult<Vec<Cons3rtProject>> {
        debug!("Listing CONS3RT projects");
        let result = self.cons3rt_admin("-listprojects -terse").await?;
        Ok(parse_project_listing(&result.output))
    }

    /// Requests `username` unless it already exists, then sets its password.
    ///
    /// Returns `true` when the user was created by this call.
    pub async fn ensure_user(&self, username: &str, email: &str, password: &str) -> Cons3rtResult<bool> {
        require_non_empty("username", username)?;
        require_non_empty("email", email)?;
        require_quotable("password", password)?;

        let exists = self
            .list_users()
            .await?
            .iter()
            .any(|user| user.username == username);

        if exists {
            info!("CONS3RT user already exists: {}", username);
        } else {
            info!("Requesting CONS3RT user {} with email {}", username, email);
            self.security_admin(&format!(
                "-requestuser {username} -email {email} -firstname Admin -lastname User"
            ))
            .await?;
        }

        self.security_admin(&format!("-setpassword {username} '{password}'"))
            .await?;
        info!("Set password for CONS3RT user {}", username);
        Ok(!exists)
    }

    /// [`Cons3rtAdmin::ensure_user`] for the user named in the deployment
    /// properties, falling back to the default account.
    ///
    /// Returns the username and whether it was created.
    pub async fn ensure_deployment_user(
        &self,
        deployment: &Deployment,
        password: &str,
    ) -> Cons3rtResult<(String, bool)> {
        let (username, email) = requested_user(deployment);
        let created = self.ensure_user(&username, &email, password).await?;
        Ok((username, created))
    }

    pub async fn assign_system_role(&self, username: &str, role: &str) -> Cons3rtResult<()> {
        require_non_empty("username", username)?;
        require_non_empty("role", role)?;
        self.security_admin(&format!("-assignsystemrole {username} {role}"))
            .await?;
        info!("Assigned system role {} to user {}", role, username);
        Ok(())
    }

    /// Creates the project unless one with the same name exists.
    ///
    /// Returns `true` when the project was created by this call.
    pub async fn ensure_project(&self, name: &str, description: &str) -> Cons3rtResult<bool> {
        require_quotable("project_name", name)?;
        if description.contains('\'') {
            return Err(quote_error("description"));
        }

        if self.project_id(name).await?.is_some() {
            info!("CONS3RT project already exists: {}", name);
            return Ok(false);
        }

        self.security_admin(&format!("-createproject '{name}' -description '{description}'"))
            .await?;
        info!("Created CONS3RT project: {}", name);
        Ok(true)
    }

    pub async fn assign_project(&self, username: &str, project: &str) -> Cons3rtResult<()> {
        require_non_empty("username", username)?;
        require_quotable("project", project)?;
        self.security_admin(&format!("-assignproject {username} '{project}'"))
            .await?;
        info!("Assigned user {} to project {}", username, project);
        Ok(())
    }

    pub async fn project_id(&self, name: &str) -> Cons3rtResult<Option<String>> {
        require_non_empty("project_name", name)?;
        let id = self
            .list_projects()
            .await?
            .into_iter()
            .rev()
            .find(|project| project.name == name)
            .map(|project| project.id);
        debug!("Project {} has ID {:?}", name, id);
        Ok(id)
    }

    /// Requests a ReST API token for `username` in `project`.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailure` if the script output carries no token.
    pub async fn generate_rest_key(&self, username: &str, project: &str) -> Cons3rtResult<String> {
        require_non_empty("username", username)?;
        require_quotable("project", project)?;
        info!("Requesting a ReST key for user {} in project {}", username, project);

        let command = format!("-requestapitoken {username} '{project}'");
        let result = self.security_admin(&command).await?;
        parse_rest_key(&result.output).ok_or_else(|| {
            Cons3rtError::command_failure_with_output(
                "Unable to parse ReST API key from the admin script output",
                command,
                result.exit_code,
                result.output.clone(),
            )
        })
    }

    async fn security_admin(&self, args: &str) -> Cons3rtResult<CommandResult> {
        let script = self.script(SECURITY_ADMIN_SCRIPT);
        self.run_on_cons3rt(format!(
            "{} -adminuser {} -adminpassword {} {}",
            script.display(),
            self.credentials.user,
            self.credentials.password,
            args
        ))
        .await
    }

    async fn cons3rt_admin(&self, args: &str) -> Cons3rtResult<CommandResult> {
        let script = self.script(CONS3RT_ADMIN_SCRIPT);
        self.run_on_cons3rt(format!(
            "{} -user {} -password {} {}",
            script.display(),
            self.credentials.user,
            self.credentials.password,
            args
        ))
        .await
    }

    async fn run_on_cons3rt(&self, command: String) -> Cons3rtResult<CommandResult> {
        let spec = CommandSpec::new(["ssh".to_string(), self.host.clone(), command])
            .with_timeout(self.timeout)
            .with_echo(self.echo);
        self.runner.run_checked(&spec).await
    }

    fn script(&self, name: &str) -> PathBuf {
        self.base_dir.join("cons3rt").join("scripts").join(name)
    }
}

/// First of `/app` and `/opt` that contains a `cons3rt` directory.
pub fn detect_base_dir() -> Cons3rtResult<PathBuf> {
    find_base_dir(BASE_DIR_CANDIDATES.iter().map(PathBuf::from))
}

pub fn find_base_dir<I>(candidates: I) -> Cons3rtResult<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let candidates: Vec<PathBuf> = candidates.into_iter().collect();
    candidates
        .iter()
        .find(|dir| dir.join("cons3rt").is_dir())
        .cloned()
        .ok_or_else(|| {
            let searched: Vec<String> = candidates.iter().map(|d| d.display().to_string()).collect();
            Cons3rtError::not_found("CONS3RT base directory", searched.join(","))
        })
}

/// Username and email for the deployment's CONS3RT user.
pub fn requested_user(deployment: &Deployment) -> (String, String) {
    let username = deployment
        .get_value(USER_PROPERTY)
        .unwrap_or(DEFAULT_USERNAME)
        .to_string();
    let email = deployment
        .get_value(USER_EMAIL_PROPERTY)
        .unwrap_or(DEFAULT_USER_EMAIL)
        .to_string();
    (username, email)
}

/// Rows after the three header lines with six `:`-separated fields and a
/// numeric ID. Other rows are skipped.
pub fn parse_user_listing(output: &str) -> Vec<Cons3rtUser> {
    output
        .lines()
        .skip(USER_HEADER_LINES)
        .filter_map(|line| {
            let fields = listing_fields(line)?;
            let Ok(id) = fields[0].parse::<u64>() else {
                debug!("Skipping user line without a numeric ID: {}", line);
                return None;
            };
            Some(Cons3rtUser {
                id,
                username: fields[1].to_string(),
                state: fields[2].to_string(),
                certs: fields[3].to_string(),
                system_roles: fields[4].to_string(),
                project_roles: fields[5].to_string(),
            })
        })
        .collect()
}

pub fn parse_project_listing(output: &str) -> Vec<Cons3rtProject> {
    output
        .lines()
        .skip(PROJECT_HEADER_LINES)
        .filter_map(|line| {
            let fields = listing_fields(line)?;
            Some(Cons3rtProject {
                id: fields[0].to_string(),
                name: fields[1].to_string(),
                description: fields[2].to_string(),
                itar: fields[3].to_string(),
                trusted_project: fields[4].to_string(),
                members: fields[5].to_string(),
            })
        })
        .collect()
}

/// The word following the first standalone `token`.
pub fn parse_rest_key(output: &str) -> Option<String> {
    let mut words = output.split_whitespace();
    words.find(|word| *word == "token")?;
    words.next().map(str::to_string)
}

fn listing_fields(line: &str) -> Option<Vec<&str>> {
    let fields: Vec<&str> = line.split(':').map(str::trim).collect();
    if fields.len() != LISTING_FIELDS {
        debug!("Skipping listing line with {} fields: {}", fields.len(), line);
        return None;
    }
    Some(fields)
}

fn require_quotable(field: &str, value: &str) -> Cons3rtResult<()> {
    require_non_empty(field, value)?;
    if value.contains('\'') {
        return Err(quote_error(field));
    }
    Ok(())
}

fn quote_error(field: &str) -> Cons3rtError {
    Cons3rtError::validation_error(field, "must not contain a single quote", None)
}
