//! Supervised services and the process manager they are delegated to.
//!
//! The launcher never owns child processes itself. It hands a
//! [`ServiceDescriptor`] to a [`ProcessManager`] and waits until the manager
//! reports the service ready. Production sessions use [`Pm2Manager`], which
//! drives the pm2 command line.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Process manager errors
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// The manager could not be reached
    #[error("Failed to connect to process manager `{command}`: {reason}")]
    Connection { command: String, reason: String },

    /// The manager refused or failed to start a service
    #[error("Failed to start service '{name}': {reason}")]
    LaunchFailed { name: String, reason: String },

    /// The manager failed to remove a service
    #[error("Failed to delete service '{name}': {reason}")]
    DeleteFailed { name: String, reason: String },
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// How to start one supervised process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Name registered with the process manager
    pub name: String,
    /// Human readable title used in progress output
    pub label: String,
    /// Working directory, relative paths resolve against the project root
    pub cwd: PathBuf,
    pub script: String,
    pub args: Vec<String>,
    /// Block until the service signals readiness
    pub wait_ready: bool,
    pub watch: bool,
    pub autorestart: bool,
    /// Port the service listens on (informational)
    pub port: Option<u16>,
    /// Extra environment exported to the service
    pub env: Vec<(String, String)>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            cwd: PathBuf::from("."),
            script: script.into(),
            args: Vec::new(),
            wait_ready: true,
            watch: false,
            autorestart: true,
            port: None,
            env: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_autorestart(mut self, autorestart: bool) -> Self {
        self.autorestart = autorestart;
        self
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Local URL the service answers on, if it has a port
    pub fn url(&self) -> Option<String> {
        self.port.map(|port| format!("http://localhost:{port}"))
    }
}

/// The four services of a Kitty Items session, in launch order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Emulator,
    DevWallet,
    Api,
    Web,
}

impl Service {
    pub const ALL: [Service; 4] = [
        Service::Emulator,
        Service::DevWallet,
        Service::Api,
        Service::Web,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Service::Emulator => "emulator",
            Service::DevWallet => "dev-wallet",
            Service::Api => "api",
            Service::Web => "web",
        }
    }

    /// Default descriptor; `flow` is the Flow CLI program
    pub fn descriptor(&self, flow: &str) -> ServiceDescriptor {
        match self {
            Service::Emulator => ServiceDescriptor::new(self.name(), flow)
                .with_label("Flow Emulator")
                .with_args(["emulator"])
                .with_port(8080),
            Service::DevWallet => ServiceDescriptor::new(self.name(), flow)
                .with_label("FCL Dev Wallet")
                .with_args(["dev-wallet"])
                .with_port(8701),
            Service::Api => ServiceDescriptor::new(self.name(), "npm")
                .with_label("Kitty Items API")
                .with_cwd("./api")
                .with_args(["run", "dev"])
                .with_port(3000),
            Service::Web => ServiceDescriptor::new(self.name(), "npm")
                .with_label("Kitty Items Web App")
                .with_cwd("./web")
                .with_args(["run", "dev"])
                .with_port(3001)
                .with_autorestart(false),
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Narrow interface over an external process manager
#[async_trait]
pub trait ProcessManager: Send {
    /// Establish the manager connection, starting its daemon if needed
    async fn connect(&mut self) -> SupervisorResult<()>;

    /// Start a service and return once it is ready
    async fn start(&mut self, service: &ServiceDescriptor) -> SupervisorResult<()>;

    /// Remove a service from the manager
    async fn delete(&mut self, name: &str) -> SupervisorResult<()>;

    async fn disconnect(&mut self);
}

/// An open process manager connection.
///
/// Obtained from [`ManagerConnection::open`] and handed explicitly to every
/// step that launches services. [`ManagerConnection::release`] must be called
/// on every exit path; dropping an unreleased connection is logged.
pub struct ManagerConnection<'a> {
    manager: &'a mut dyn ProcessManager,
    launched: Vec<String>,
    open: bool,
}

impl<'a> ManagerConnection<'a> {
    pub async fn open(manager: &'a mut dyn ProcessManager) -> SupervisorResult<Self> {
        manager.connect().await?;
        debug!("process manager connected");
        Ok(Self {
            manager,
            launched: Vec::new(),
            open: true,
        })
    }

    /// Launch a service and wait for its readiness signal
    pub async fn launch(&mut self, service: &ServiceDescriptor) -> SupervisorResult<()> {
        info!(service = %service.name, script = %service.script, "launching service");
        match self.manager.start(service).await {
            Ok(()) => {
                self.launched.push(service.name.clone());
                Ok(())
            }
            Err(e) => {
                error!(service = %service.name, "process manager reported an error: {}", e);
                Err(e)
            }
        }
    }

    /// Names of services launched through this connection, in order
    pub fn launched(&self) -> &[String] {
        &self.launched
    }

    pub async fn release(mut self) {
        self.open = false;
        self.manager.disconnect().await;
        debug!("process manager disconnected");
    }
}

impl Drop for ManagerConnection<'_> {
    fn drop(&mut self) {
        if self.open {
            warn!("process manager connection dropped without being released");
        }
    }
}

impl fmt::Debug for ManagerConnection<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConnection")
            .field("launched", &self.launched)
            .field("open", &self.open)
            .finish()
    }
}

/// Outcome of [`stop_services`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    pub stopped: Vec<Service>,
    /// Services the manager would not delete, usually because they were not
    /// registered, with its reason
    pub skipped: Vec<(Service, String)>,
}

/// Remove every service from the manager in reverse launch order.
///
/// A failed delete is recorded and the remaining services are still removed.
pub async fn stop_services(manager: &mut dyn ProcessManager) -> SupervisorResult<StopReport> {
    manager.connect().await?;

    let mut report = StopReport::default();
    for service in Service::ALL.iter().rev().copied() {
        match manager.delete(service.name()).await {
            Ok(()) => {
                info!(%service, "service stopped");
                report.stopped.push(service);
            }
            Err(SupervisorError::DeleteFailed { reason, .. }) => {
                warn!(%service, "service not stopped: {}", reason);
                report.skipped.push((service, reason));
            }
            Err(e) => {
                manager.disconnect().await;
                return Err(e);
            }
        }
    }

    manager.disconnect().await;
    Ok(report)
}

/// Drives the pm2 command line
#[derive(Debug, Clone)]
pub struct Pm2Manager {
    /// Program plus leading arguments, e.g. `["npx", "pm2"]`
    command: Vec<String>,
    root: PathBuf,
}

impl Pm2Manager {
    pub fn new(command: Vec<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            command,
            root: root.into(),
        }
    }

    fn display_command(&self) -> String {
        self.command.join(" ")
    }

    fn command(&self, args: &[String]) -> Command {
        let (program, prefix) = match self.command.split_first() {
            Some((program, prefix)) => (program.as_str(), prefix),
            None => ("pm2", &[][..]),
        };
        let mut cmd = Command::new(program);
        cmd.args(prefix).args(args).current_dir(&self.root);
        cmd
    }

    async fn exec(&self, args: Vec<String>) -> Result<(), String> {
        let output = self
            .command(&args)
            .output()
            .await
            .map_err(|e| e.to_string())?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            });
        }
        Ok(())
    }
}

/// Arguments for `pm2 start` describing `service`
pub fn pm2_start_args(root: &Path, service: &ServiceDescriptor) -> Vec<String> {
    let mut args = vec![
        "start".to_string(),
        service.script.clone(),
        "--name".to_string(),
        service.name.clone(),
        "--cwd".to_string(),
        root.join(&service.cwd).display().to_string(),
    ];

    if service.wait_ready {
        args.push("--wait-ready".to_string());
    }
    if service.watch {
        args.push("--watch".to_string());
    }
    if !service.autorestart {
        args.push("--no-autorestart".to_string());
    }
    if !service.args.is_empty() {
        args.push("--".to_string());
        args.extend(service.args.iter().cloned());
    }

    args
}

#[async_trait]
impl ProcessManager for Pm2Manager {
    async fn connect(&mut self) -> SupervisorResult<()> {
        self.exec(vec!["ping".to_string()])
            .await
            .map_err(|reason| SupervisorError::Connection {
                command: self.display_command(),
                reason,
            })
    }

    async fn start(&mut self, service: &ServiceDescriptor) -> SupervisorResult<()> {
        let args = pm2_start_args(&self.root, service);
        let mut cmd = self.command(&args);
        cmd.envs(service.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let output = cmd
            .output()
            .await
            .map_err(|e| SupervisorError::LaunchFailed {
                name: service.name.clone(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SupervisorError::LaunchFailed {
                name: service.name.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    async fn delete(&mut self, name: &str) -> SupervisorResult<()> {
        self.exec(vec!["delete".to_string(), name.to_string()])
            .await
            .map_err(|reason| SupervisorError::DeleteFailed {
                name: name.to_string(),
                reason,
            })
    }

    async fn disconnect(&mut self) {
        // The CLI keeps no socket open between invocations.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingManager {
        events: Vec<String>,
        fail_on: Option<&'static str>,
        unregistered: Vec<&'static str>,
    }

    #[async_trait]
    impl ProcessManager for RecordingManager {
        async fn connect(&mut self) -> SupervisorResult<()> {
            self.events.push("connect".to_string());
            Ok(())
        }

        async fn start(&mut self, service: &ServiceDescriptor) -> SupervisorResult<()> {
            self.events.push(format!("start:{}", service.name));
            if self.fail_on == Some(service.name.as_str()) {
                return Err(SupervisorError::LaunchFailed {
                    name: service.name.clone(),
                    reason: "script not found".to_string(),
                });
            }
            Ok(())
        }

        async fn delete(&mut self, name: &str) -> SupervisorResult<()> {
            self.events.push(format!("delete:{name}"));
            if self.unregistered.iter().any(|n| *n == name) {
                return Err(SupervisorError::DeleteFailed {
                    name: name.to_string(),
                    reason: format!("Process or Namespace {name} not found"),
                });
            }
            Ok(())
        }

        async fn disconnect(&mut self) {
            self.events.push("disconnect".to_string());
        }
    }

    #[test]
    fn test_service_order_and_names() {
        let names: Vec<_> = Service::ALL.iter().map(Service::name).collect();
        assert_eq!(names, vec!["emulator", "dev-wallet", "api", "web"]);
    }

    #[test]
    fn test_default_descriptors() {
        let emulator = Service::Emulator.descriptor("flow");
        assert_eq!(emulator.script, "flow");
        assert_eq!(emulator.args, vec!["emulator"]);
        assert_eq!(emulator.url().as_deref(), Some("http://localhost:8080"));
        assert!(emulator.wait_ready);

        let web = Service::Web.descriptor("flow");
        assert_eq!(web.cwd, PathBuf::from("./web"));
        assert_eq!(web.args, vec!["run", "dev"]);
        assert!(!web.autorestart);
        assert!(!web.watch);
        assert_eq!(web.port, Some(3001));

        assert!(Service::Api.descriptor("flow").autorestart);
    }

    #[test]
    fn test_pm2_start_args() {
        let root = Path::new("/srv/kitty-items");
        let args = pm2_start_args(root, &Service::Web.descriptor("flow"));
        assert_eq!(
            args,
            vec![
                "start",
                "npm",
                "--name",
                "web",
                "--cwd",
                "/srv/kitty-items/./web",
                "--wait-ready",
                "--no-autorestart",
                "--",
                "run",
                "dev",
            ]
        );

        let bare = ServiceDescriptor::new("worker", "node");
        let args = pm2_start_args(root, &bare);
        assert!(!args.contains(&"--".to_string()));
        assert!(!args.contains(&"--no-autorestart".to_string()));
    }

    #[tokio::test]
    async fn test_connection_launches_in_order_and_releases() {
        let mut manager = RecordingManager::default();
        let mut connection = ManagerConnection::open(&mut manager).await.unwrap();

        for service in [Service::Api, Service::Web] {
            connection.launch(&service.descriptor("flow")).await.unwrap();
        }
        assert_eq!(connection.launched(), ["api", "web"]);
        connection.release().await;

        assert_eq!(
            manager.events,
            vec!["connect", "start:api", "start:web", "disconnect"]
        );
    }

    #[tokio::test]
    async fn test_launch_failure_is_returned() {
        let mut manager = RecordingManager {
            fail_on: Some("api"),
            ..Default::default()
        };
        let mut connection = ManagerConnection::open(&mut manager).await.unwrap();

        let err = connection
            .launch(&Service::Api.descriptor("flow"))
            .await
            .unwrap_err();
        assert!(matches!(err, SupervisorError::LaunchFailed { .. }));
        assert!(connection.launched().is_empty());
        connection.release().await;
    }

    #[tokio::test]
    async fn test_dropped_connection_is_not_disconnected() {
        let mut manager = RecordingManager::default();
        {
            let mut connection = ManagerConnection::open(&mut manager).await.unwrap();
            connection.launch(&Service::Api.descriptor("flow")).await.unwrap();
        }
        assert_eq!(manager.events, vec!["connect", "start:api"]);

        let connection = ManagerConnection::open(&mut manager).await.unwrap();
        connection.release().await;
        assert_eq!(
            manager.events.iter().filter(|e| *e == "disconnect").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_stop_services_in_reverse_order() {
        let mut manager = RecordingManager::default();
        let report = stop_services(&mut manager).await.unwrap();

        assert_eq!(
            report.stopped,
            vec![Service::Web, Service::Api, Service::DevWallet, Service::Emulator]
        );
        assert!(report.skipped.is_empty());
        assert_eq!(
            manager.events,
            vec![
                "connect",
                "delete:web",
                "delete:api",
                "delete:dev-wallet",
                "delete:emulator",
                "disconnect",
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_services_continues_past_failed_delete() {
        let mut manager = RecordingManager {
            unregistered: vec!["api", "emulator"],
            ..Default::default()
        };
        let report = stop_services(&mut manager).await.unwrap();

        assert_eq!(report.stopped, vec![Service::Web, Service::DevWallet]);
        let skipped: Vec<_> = report.skipped.iter().map(|(s, _)| *s).collect();
        assert_eq!(skipped, vec![Service::Api, Service::Emulator]);
        assert!(report.skipped[0].1.contains("not found"));
        assert_eq!(manager.events.len(), 6);
        assert_eq!(manager.events.last().map(String::as_str), Some("disconnect"));
    }

    #[tokio::test]
    async fn test_pm2_missing_binary_is_connection_error() {
        let mut manager = Pm2Manager::new(
            vec!["definitely-not-a-process-manager-binary".to_string()],
            std::env::temp_dir(),
        );
        let err = manager.connect().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Connection { .. }));
    }

    #[test]
    fn test_supervisor_error_display() {
        let error = SupervisorError::Connection {
            command: "npx pm2".to_string(),
            reason: "daemon not running".to_string(),
        };
        assert!(error.to_string().contains("npx pm2"));
        assert!(error.to_string().contains("daemon not running"));
    }
}
