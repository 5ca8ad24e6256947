use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Unknown or missing CHAIN_ENV environment variable{}. Please provide one of the following: \"emulator\", \"testnet\"", .value.as_ref().map(|v| format!(" ({v:?})")).unwrap_or_default())]
    UnknownNetwork { value: Option<String> },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed output from `{command}`: {source}")]
    MalformedOutput {
        command: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FlowError {
    /// Whether this error comes from bad configuration rather than from
    /// running a command
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FlowError::UnknownNetwork { .. } | FlowError::InvalidConfig { .. }
        )
    }
}

pub type FlowResult<T> = Result<T, FlowError>;

/// A shell command line plus the context it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    pub line: String,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ShellCommand {
    pub fn new(line: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            line: line.into(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
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
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            success: false,
        }
    }

    /// Error stream with surrounding whitespace removed
    pub fn error_stream(&self) -> &str {
        self.stderr.trim()
    }
}

/// Runs shell commands and waits for them to finish
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &ShellCommand) -> FlowResult<CommandOutput>;
}

/// Runs commands through the platform shell
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &ShellCommand) -> FlowResult<CommandOutput> {
        debug!(command = %command.line, cwd = %command.cwd.display(), "running command");

        #[cfg(windows)]
        let mut cmd = {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(&command.line);
            cmd
        };
        #[cfg(not(windows))]
        let mut cmd = {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&command.line);
            cmd
        };

        let output = cmd
            .current_dir(&command.cwd)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .output()
            .await
            .map_err(|source| FlowError::Spawn {
                command: command.line.clone(),
                source,
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        })
    }
}
