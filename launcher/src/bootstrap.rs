//! Testnet account bootstrap.
//!
//! Generates a keypair with the Flow CLI, asks the operator to fund an account
//! for it through the testnet faucet, then persists the credentials and writes
//! `.env.testnet` from the template.

use crate::operator::{Operator, OperatorError};
use crate::report::StatusReporter;
use chrono::{DateTime, Utc};
use colored::Colorize;
use envfile::{EnvError, EnvironmentConfig, TESTNET_ENV_FILE, TESTNET_TEMPLATE_FILE};
use flow::{generate_keys_command, CommandRunner, FlowConfig, FlowError, GeneratedKeys, ShellCommand};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const FAUCET_URL: &str = "https://testnet-faucet.onflow.org/";

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error(transparent)]
    Operator(#[from] OperatorError),

    #[error("Failed to write credentials to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize credentials: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;

/// A Flow account address: 16 hex digits, optionally prefixed with `0x`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountAddress(String);

impl AccountAddress {
    /// Accept the operator's input as typed, minus surrounding whitespace
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        (digits.len() == 16 && digits.chars().all(|c| c.is_ascii_hexdigit()))
            .then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generated keypair plus the funded account it controls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSet {
    #[serde(flatten)]
    pub keys: GeneratedKeys,
    pub account: AccountAddress,
    pub created_at: DateTime<Utc>,
}

impl CredentialSet {
    pub fn file_name(&self) -> String {
        credentials_file_name(&self.account)
    }

    /// Entries merged over the testnet template
    pub fn env_entries(&self) -> [(&'static str, String); 3] {
        [
            ("ADMIN_ADDRESS", self.account.to_string()),
            ("FLOW_PRIVATE_KEY", self.keys.private.clone()),
            ("FLOW_PUBLIC_KEY", self.keys.public.clone()),
        ]
    }
}

pub fn credentials_file_name(account: &AccountAddress) -> String {
    format!("testnet-credentials-{account}.json")
}

pub fn faucet_link(public_key: &str) -> String {
    format!("{FAUCET_URL}?key={public_key}&source=ki")
}

/// What a successful bootstrap left on disk
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    pub credentials: CredentialSet,
    pub credentials_path: PathBuf,
    pub env_path: PathBuf,
}

pub struct AccountBootstrapper<'a> {
    runner: &'a dyn CommandRunner,
    operator: &'a dyn Operator,
    reporter: &'a StatusReporter,
    flow: &'a FlowConfig,
    root: &'a Path,
}

impl<'a> AccountBootstrapper<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        operator: &'a dyn Operator,
        reporter: &'a StatusReporter,
        flow: &'a FlowConfig,
        root: &'a Path,
    ) -> Self {
        Self {
            runner,
            operator,
            reporter,
            flow,
            root,
        }
    }

    pub async fn bootstrap(&self) -> BootstrapResult<BootstrapOutcome> {
        // Read the template before any key is generated so a broken checkout
        // fails before the operator funds an account.
        let template = self.load_template()?;

        let keys = self.generate_keys().await?;
        self.print_next_steps(&keys.public);
        let account = self.prompt_account()?;

        let credentials = CredentialSet {
            keys,
            account,
            created_at: Utc::now(),
        };
        let credentials_path = self.persist_credentials(&credentials)?;

        let env_path = self.root.join(TESTNET_ENV_FILE);
        template
            .merged(credentials.env_entries())
            .write(&env_path)?;
        self.reporter.info(format!(
            "Testnet environment config was written to: {TESTNET_ENV_FILE}\n"
        ));
        info!(account = %credentials.account, "testnet account bootstrapped");

        Ok(BootstrapOutcome {
            credentials,
            credentials_path,
            env_path,
        })
    }

    fn load_template(&self) -> BootstrapResult<EnvironmentConfig> {
        let path = self.root.join(TESTNET_TEMPLATE_FILE);
        if !path.exists() {
            return Err(EnvError::MissingConfig {
                path,
                message: "Testnet environment template not found".to_string(),
            }
            .into());
        }
        Ok(EnvironmentConfig::load(&path)?)
    }

    async fn generate_keys(&self) -> BootstrapResult<GeneratedKeys> {
        let line = generate_keys_command(self.flow);
        let output = self
            .runner
            .run(&ShellCommand::new(line.clone(), self.root))
            .await?;

        if !output.success {
            return Err(FlowError::CommandFailed {
                command: line,
                stderr: output.error_stream().to_string(),
            }
            .into());
        }
        if !output.error_stream().is_empty() {
            warn!("{}", output.error_stream());
        }

        Ok(GeneratedKeys::parse(&line, &output.stdout)?)
    }

    fn print_next_steps(&self, public_key: &str) {
        self.reporter.println(format!(
            "\n  {}\n\n  1. Create a new account using the testnet faucet by visiting this URL:\n  {}\n\n  2. Copy the new account address from the faucet, and paste it below\n  {}\n",
            "Next steps:".bright_green(),
            faucet_link(public_key).bright_cyan(),
            "⚠️  Don't exit this terminal.".bright_yellow(),
        ));
    }

    /// Ask until the operator pastes a well-formed address
    fn prompt_account(&self) -> BootstrapResult<AccountAddress> {
        let mut message = "Paste your new testnet account address here:";
        loop {
            let answer = self.operator.input(message)?;
            match AccountAddress::parse(&answer) {
                Some(address) => return Ok(address),
                None => {
                    self.reporter.warn(format!(
                        "'{}' is not a Flow account address (expected 16 hex digits, e.g. 0x01cf0e2f2f715450)",
                        answer.trim()
                    ));
                    message = "Please paste a valid testnet account address:";
                }
            }
        }
    }

    fn persist_credentials(&self, credentials: &CredentialSet) -> BootstrapResult<PathBuf> {
        let path = self.root.join(credentials.file_name());
        let json = serde_json::to_string_pretty(credentials)?;
        fs::write(&path, json).map_err(|source| BootstrapError::Persist {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
