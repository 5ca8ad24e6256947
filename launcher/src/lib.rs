pub mod bootstrap;
pub mod config;
pub mod deploy;
pub mod operator;
pub mod prerequisites;
pub mod report;
pub mod session;
pub mod supervisor;

pub use bootstrap::{
    credentials_file_name, faucet_link, AccountAddress, AccountBootstrapper, BootstrapError,
    BootstrapOutcome, CredentialSet,
};
pub use config::LauncherConfig;
pub use deploy::{deployment_commands, DeployError, DeployStep, Deployer, DeploymentReport};
pub use operator::{Operator, OperatorError, TerminalOperator};
pub use prerequisites::{check_node_runtime, RuntimeCheck};
pub use report::StatusReporter;
pub use session::{
    ErrorKind, Session, SessionError, SessionOutcome, SessionResult, SessionState,
    FAILURE_EXIT_CODE,
};
pub use supervisor::{
    pm2_start_args, stop_services, ManagerConnection, Pm2Manager, ProcessManager, Service,
    ServiceDescriptor, StopReport, SupervisorError, SupervisorResult,
};
