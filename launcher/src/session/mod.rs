//! Session driver
//!
//! A launcher session is a linear state machine:
//! 1. Init → ValidatingPrerequisites (Node.js runtime, network selection)
//! 2. Emulator: start emulator and dev wallet → Deploying
//! 3. Testnet without credentials (or declined): bootstrap account → Deploying
//! 4. Testnet with reused credentials: straight to StartingServices
//! 5. Deploying → StartingServices (api, web) → Done
//!
//! Any step error moves the session to Failed. The process manager connection
//! is released on every path.

pub mod summary;

use crate::bootstrap::{AccountBootstrapper, BootstrapError, BootstrapOutcome};
use crate::config::LauncherConfig;
use crate::deploy::{DeployError, Deployer, DeploymentReport};
use crate::operator::{Operator, OperatorError};
use crate::prerequisites::{check_node_runtime, RuntimeCheck};
use crate::report::StatusReporter;
use crate::supervisor::{ManagerConnection, ProcessManager, Service, SupervisorError};
use colored::Colorize;
use envfile::{resolve_env_path, EnvError, EnvironmentConfig, TESTNET_ENV_FILE};
use flow::{CommandBuilder, CommandRunner, FlowError, NetworkMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Exit status for sessions that end in an error
pub const FAILURE_EXIT_CODE: i32 = 2;

/// Error categories reported to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or unknown network, missing file or variable
    Configuration,
    /// An invoked command failed or wrote to its error stream
    ExternalCommand,
    /// Command output or a file could not be parsed
    Parse,
    /// The process manager is unreachable
    Connection,
}

/// Errors that end a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("Unknown or missing ADMIN_ADDRESS environment variable. Please create a testnet account and add your credentials to .env.testnet")]
    MissingAdminAddress,

    #[error("Environment config must be loaded before {0}")]
    EnvironmentNotLoaded(&'static str),
}

fn flow_kind(error: &FlowError) -> ErrorKind {
    match error {
        FlowError::UnknownNetwork { .. } | FlowError::InvalidConfig { .. } => {
            ErrorKind::Configuration
        }
        FlowError::MalformedOutput { .. } => ErrorKind::Parse,
        FlowError::CommandFailed { .. } | FlowError::Spawn { .. } => ErrorKind::ExternalCommand,
    }
}

fn env_kind(error: &EnvError) -> ErrorKind {
    match error {
        EnvError::Parse { .. } => ErrorKind::Parse,
        EnvError::MissingConfig { .. } | EnvError::Io { .. } => ErrorKind::Configuration,
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::Flow(e) => flow_kind(e),
            SessionError::Env(e) => env_kind(e),
            SessionError::Supervisor(SupervisorError::Connection { .. }) => ErrorKind::Connection,
            SessionError::Supervisor(_) => ErrorKind::ExternalCommand,
            SessionError::Bootstrap(e) => match e {
                BootstrapError::Flow(e) => flow_kind(e),
                BootstrapError::Env(e) => env_kind(e),
                BootstrapError::Operator(_) => ErrorKind::ExternalCommand,
                BootstrapError::Persist { .. } | BootstrapError::Serialize(_) => {
                    ErrorKind::Configuration
                }
            },
            SessionError::Deploy(e) => flow_kind(&e.source),
            SessionError::Operator(_) => ErrorKind::ExternalCommand,
            SessionError::MissingAdminAddress | SessionError::EnvironmentNotLoaded(_) => {
                ErrorKind::Configuration
            }
        }
    }

    pub fn exit_code(&self) -> i32 {
        FAILURE_EXIT_CODE
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// The launcher's environment, minus entries that are not valid Unicode
fn process_env_snapshot() -> BTreeMap<String, String> {
    std::env::vars_os()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!(key = ?key, "skipping non-Unicode environment variable");
                None
            }
        })
        .collect()
}

/// State of a launcher session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Init,
    ValidatingPrerequisites,
    ModeEmulator,
    ModeTestnetBootstrap,
    ModeTestnetExisting,
    Deploying,
    StartingServices,
    /// Every service is up
    Done,
    /// Session ended early; carries the reason
    Failed(String),
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Failed(_))
    }
}

/// Summary of a session that ended without an error
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub final_state: SessionState,
    pub history: Vec<SessionState>,
    pub network: Option<NetworkMode>,
    /// Services started, in launch order
    pub launched: Vec<String>,
    pub deployment: Option<DeploymentReport>,
    pub bootstrap: Option<BootstrapOutcome>,
}

impl SessionOutcome {
    pub fn completed(&self) -> bool {
        self.final_state == SessionState::Done
    }

    /// Graceful stops (such as an unsupported runtime) still exit with 0
    pub fn exit_code(&self) -> i32 {
        0
    }
}

/// Drives one launcher session
pub struct Session<'a> {
    config: LauncherConfig,
    runner: &'a dyn CommandRunner,
    operator: &'a dyn Operator,
    reporter: StatusReporter,
    /// Snapshot of the launcher's own environment; it wins over env files
    process_env: BTreeMap<String, String>,
    state: SessionState,
    history: Vec<SessionState>,
    network: Option<NetworkMode>,
    environment: Option<EnvironmentConfig>,
    deployment: Option<DeploymentReport>,
    bootstrap: Option<BootstrapOutcome>,
}

impl<'a> Session<'a> {
    pub fn new(
        config: LauncherConfig,
        runner: &'a dyn CommandRunner,
        operator: &'a dyn Operator,
    ) -> Self {
        Self {
            config,
            runner,
            operator,
            reporter: StatusReporter::new(),
            process_env: process_env_snapshot(),
            state: SessionState::Init,
            history: vec![SessionState::Init],
            network: None,
            environment: None,
            deployment: None,
            bootstrap: None,
        }
    }

    pub fn with_reporter(mut self, reporter: StatusReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_process_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.process_env = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Every state entered so far, starting with Init
    pub fn history(&self) -> &[SessionState] {
        &self.history
    }

    /// Run the session to a terminal state.
    ///
    /// Connects to the process manager first and always releases it before
    /// returning.
    pub async fn run(
        &mut self,
        manager: &mut dyn ProcessManager,
    ) -> SessionResult<SessionOutcome> {
        let result = match ManagerConnection::open(manager).await {
            Ok(mut connection) => {
                let result = self.drive(&mut connection).await;
                let launched = connection.launched().to_vec();
                connection.release().await;
                result.map(|()| launched)
            }
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(launched) => Ok(SessionOutcome {
                final_state: self.state.clone(),
                history: self.history.clone(),
                network: self.network,
                launched,
                deployment: self.deployment.clone(),
                bootstrap: self.bootstrap.clone(),
            }),
            Err(e) => {
                error!("Session failed in {:?}: {}", self.state, e);
                self.reporter.fail(e.to_string().red().to_string());
                self.transition_to(SessionState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    async fn drive(&mut self, connection: &mut ManagerConnection<'_>) -> SessionResult<()> {
        loop {
            let next = match self.state.clone() {
                SessionState::Init => SessionState::ValidatingPrerequisites,
                SessionState::ValidatingPrerequisites => self.validate_prerequisites().await?,
                SessionState::ModeEmulator => {
                    for service in [Service::Emulator, Service::DevWallet] {
                        self.launch(connection, service).await?;
                    }
                    self.load_environment()?;
                    SessionState::Deploying
                }
                SessionState::ModeTestnetBootstrap => {
                    self.bootstrap_account().await?;
                    self.load_environment()?;
                    SessionState::Deploying
                }
                SessionState::ModeTestnetExisting => {
                    self.load_environment()?;
                    SessionState::StartingServices
                }
                SessionState::Deploying => {
                    self.deploy().await?;
                    SessionState::StartingServices
                }
                SessionState::StartingServices => {
                    if self.admin_address().is_none() {
                        return Err(SessionError::MissingAdminAddress);
                    }
                    for service in [Service::Api, Service::Web] {
                        self.launch(connection, service).await?;
                    }
                    SessionState::Done
                }
                SessionState::Done => {
                    self.print_summary().await;
                    return Ok(());
                }
                SessionState::Failed(_) => return Ok(()),
            };

            self.transition_to(next);
        }
    }

    fn transition_to(&mut self, new_state: SessionState) {
        debug!("State transition: {:?} → {:?}", self.state, new_state);
        self.state = new_state.clone();
        self.history.push(new_state);
    }

    fn network(&self) -> SessionResult<NetworkMode> {
        match self.network {
            Some(network) => Ok(network),
            None => Ok(NetworkMode::resolve(self.config.network.as_deref())?),
        }
    }

    async fn validate_prerequisites(&mut self) -> SessionResult<SessionState> {
        let root = self.config.project_root.clone();
        if let RuntimeCheck::Unsupported { required, found } =
            check_node_runtime(self.runner, &root).await?
        {
            let message = format!(
                "This project requires Node version {}.x or higher. Please install Node.js and try again.\n",
                required.to_string().yellow()
            );
            warn!(required, found = %found, "unsupported Node.js runtime");
            self.reporter.warn(&message);
            return Ok(SessionState::Failed(format!(
                "unsupported Node.js runtime {found:?}, {required}.x or higher required"
            )));
        }

        let network = NetworkMode::resolve(self.config.network.as_deref())?;
        self.network = Some(network);
        info!(%network, "starting session");

        match network {
            NetworkMode::Emulator => Ok(SessionState::ModeEmulator),
            NetworkMode::Testnet => self.choose_testnet_mode(),
        }
    }

    fn choose_testnet_mode(&self) -> SessionResult<SessionState> {
        if !self.config.project_root.join(TESTNET_ENV_FILE).exists() {
            return Ok(SessionState::ModeTestnetBootstrap);
        }

        let reuse = self.operator.confirm(
            &format!(
                "Use existing testnet credentials in {} ?",
                TESTNET_ENV_FILE.bright_green()
            ),
            true,
        )?;

        if reuse {
            Ok(SessionState::ModeTestnetExisting)
        } else {
            self.reporter.warn("Creating new testnet account credentials...");
            Ok(SessionState::ModeTestnetBootstrap)
        }
    }

    async fn bootstrap_account(&mut self) -> SessionResult<()> {
        let outcome = AccountBootstrapper::new(
            self.runner,
            self.operator,
            &self.reporter,
            &self.config.flow,
            &self.config.project_root,
        )
        .bootstrap()
        .await?;
        self.bootstrap = Some(outcome);
        Ok(())
    }

    fn load_environment(&mut self) -> SessionResult<()> {
        let path = resolve_env_path(&self.config.project_root, self.network()?)?;
        let environment = if path.exists() {
            EnvironmentConfig::load(&path)?
        } else {
            warn!("{} not found, continuing with the current environment", path.display());
            EnvironmentConfig::new()
        };
        self.environment = Some(environment);
        Ok(())
    }

    /// Loaded entries the launcher's own environment does not already set
    fn exported_env(&self) -> EnvironmentConfig {
        self.environment
            .iter()
            .flat_map(EnvironmentConfig::iter)
            .filter(|(key, _)| !self.process_env.contains_key(*key))
            .collect()
    }

    fn admin_address(&self) -> Option<String> {
        let from_process = self.process_env.get("ADMIN_ADDRESS").map(String::as_str);
        let from_file = self
            .environment
            .as_ref()
            .and_then(|env| env.get("ADMIN_ADDRESS"));

        from_process
            .filter(|value| !value.is_empty())
            .or(from_file.filter(|value| !value.is_empty()))
            .map(str::to_string)
    }

    async fn deploy(&mut self) -> SessionResult<()> {
        if self.environment.is_none() {
            return Err(SessionError::EnvironmentNotLoaded("deployment"));
        }

        let builder = CommandBuilder::new(self.config.flow.clone(), self.network()?);
        let admin = self.admin_address().unwrap_or_default();
        let env = self.exported_env();

        let report = Deployer::new(
            self.runner,
            &self.reporter,
            &builder,
            &self.config.project_root,
        )
        .deploy_and_initialize(&env, &admin)
        .await?;
        self.deployment = Some(report);
        Ok(())
    }

    async fn launch(
        &self,
        connection: &mut ManagerConnection<'_>,
        service: Service,
    ) -> SessionResult<()> {
        let descriptor = service
            .descriptor(&self.config.flow.program)
            .with_env(self.exported_env().iter());

        self.reporter.start(match service {
            Service::Emulator => "Emulating Flow Network",
            Service::DevWallet => "Starting FCL Developer Wallet",
            Service::Api => "Starting API server",
            Service::Web => "Starting storefront web app",
        });
        connection.launch(&descriptor).await?;

        self.reporter.succeed(format!("{} started", descriptor.label));
        if let Some(url) = descriptor.url() {
            self.reporter.info(format!(
                "{} is running at: {}",
                descriptor.label,
                url.yellow()
            ));
        }
        self.reporter.info(format!(
            "View log output: {}\n",
            self.config.logs_hint(&descriptor.name).bright_cyan()
        ));
        Ok(())
    }

    async fn print_summary(&self) {
        if !self.config.summary_delay.is_zero() {
            tokio::time::sleep(self.config.summary_delay).await;
        }

        let admin = self.admin_address();
        if let Some(network) = self.network {
            self.reporter.println(summary::render(
                network,
                &self.config.web_url,
                admin.as_deref(),
            ));
        }
    }
}
