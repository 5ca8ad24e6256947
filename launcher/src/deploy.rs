use crate::report::StatusReporter;
use colored::Colorize;
use envfile::EnvironmentConfig;
use flow::{CommandBuilder, CommandRunner, FlowError, SetupTransaction, ShellCommand};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// One step of contract deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Contracts,
    Setup(SetupTransaction),
}

impl DeployStep {
    /// Fixed execution order
    pub const SEQUENCE: [DeployStep; 3] = [
        DeployStep::Contracts,
        DeployStep::Setup(SetupTransaction::KittyItems),
        DeployStep::Setup(SetupTransaction::NftStorefront),
    ];

    fn command(&self, builder: &CommandBuilder) -> String {
        match self {
            DeployStep::Contracts => builder.deploy(),
            DeployStep::Setup(transaction) => builder.setup_transaction(*transaction),
        }
    }
}

impl fmt::Display for DeployStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStep::Contracts => write!(f, "contract deployment"),
            DeployStep::Setup(transaction) => write!(f, "{} account setup", transaction.label()),
        }
    }
}

/// Every deployment command for the builder's network, in execution order
pub fn deployment_commands(builder: &CommandBuilder) -> Vec<String> {
    DeployStep::SEQUENCE
        .iter()
        .map(|step| step.command(builder))
        .collect()
}

#[derive(Error, Debug)]
#[error("Deployment aborted during {step}: {source}")]
pub struct DeployError {
    pub step: DeployStep,
    #[source]
    pub source: FlowError,
}

pub type DeployResult<T> = Result<T, DeployError>;

/// Steps that ran to completion, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentReport {
    pub completed: Vec<DeployStep>,
}

/// Deploys the contract bundle and initializes the admin account
pub struct Deployer<'a> {
    runner: &'a dyn CommandRunner,
    reporter: &'a StatusReporter,
    builder: &'a CommandBuilder,
    root: &'a Path,
}

impl<'a> Deployer<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        reporter: &'a StatusReporter,
        builder: &'a CommandBuilder,
        root: &'a Path,
    ) -> Self {
        Self {
            runner,
            reporter,
            builder,
            root,
        }
    }

    /// Run every step in order, stopping at the first one that writes to its
    /// error stream. `env` is exported to each command; `admin` only labels
    /// progress output.
    pub async fn deploy_and_initialize(
        &self,
        env: &EnvironmentConfig,
        admin: &str,
    ) -> DeployResult<DeploymentReport> {
        let network = self.builder.network();
        let mut report = DeploymentReport::default();

        self.reporter
            .start(format!("Deploying contracts to:  {admin} ({network})"));
        self.run_step(DeployStep::Contracts, env).await?;
        report.completed.push(DeployStep::Contracts);
        self.reporter.succeed("Contracts deployed");
        self.reporter.info(format!(
            "Contracts were deployed to: {admin} ({network})\n"
        ));

        self.reporter
            .start(format!("Initializing admin account: {admin} ({network})"));
        for step in &DeployStep::SEQUENCE[1..] {
            self.run_step(*step, env).await?;
            report.completed.push(*step);
        }
        self.reporter.succeed("Admin account initialized");
        for transaction in [SetupTransaction::NftStorefront, SetupTransaction::KittyItems] {
            let path = match transaction {
                SetupTransaction::KittyItems => &self.builder.config().kitty_items_setup_tx,
                SetupTransaction::NftStorefront => &self.builder.config().storefront_setup_tx,
            };
            self.reporter.info(format!(
                "{} was executed successfully.",
                path.bright_cyan()
            ));
        }

        info!(%network, "deployment finished");
        Ok(report)
    }

    async fn run_step(&self, step: DeployStep, env: &EnvironmentConfig) -> DeployResult<()> {
        let line = step.command(self.builder);
        debug!(%step, command = %line, "running deployment step");

        let command = ShellCommand::new(line.clone(), self.root).with_env(env.iter());
        let output = self
            .runner
            .run(&command)
            .await
            .map_err(|source| DeployError { step, source })?;

        if !output.error_stream().is_empty() || !output.success {
            return Err(DeployError {
                step,
                source: FlowError::CommandFailed {
                    command: line,
                    stderr: output.error_stream().to_string(),
                },
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flow::{CommandOutput, FlowConfig, FlowResult, NetworkMode};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedRunner {
        calls: Mutex<Vec<ShellCommand>>,
        fail_containing: Option<&'static str>,
        exit_silently_containing: Option<&'static str>,
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, command: &ShellCommand) -> FlowResult<CommandOutput> {
            self.calls.lock().unwrap().push(command.clone());
            match self.fail_containing {
                Some(needle) if command.line.contains(needle) => Ok(CommandOutput {
                    stdout: "{}".to_string(),
                    stderr: "❌ Command Error: transaction reverted".to_string(),
                    success: true,
                }),
                _ if self
                    .exit_silently_containing
                    .is_some_and(|needle| command.line.contains(needle)) =>
                {
                    Ok(CommandOutput {
                        stdout: String::new(),
                        stderr: String::new(),
                        success: false,
                    })
                }
                _ => Ok(CommandOutput::ok("{}")),
            }
        }
    }

    fn builder() -> CommandBuilder {
        CommandBuilder::new(FlowConfig::default(), NetworkMode::Emulator)
    }

    async fn deploy(runner: &ScriptedRunner) -> DeployResult<DeploymentReport> {
        let reporter = StatusReporter::hidden();
        let builder = builder();
        let env: EnvironmentConfig = [("ADMIN_ADDRESS", "f8d6e0586b0a20c7")].into_iter().collect();
        Deployer::new(runner, &reporter, &builder, Path::new("."))
            .deploy_and_initialize(&env, "f8d6e0586b0a20c7")
            .await
    }

    #[tokio::test]
    async fn test_all_steps_run_in_order() {
        let runner = ScriptedRunner::default();
        let report = deploy(&runner).await.unwrap();
        assert_eq!(report.completed, DeployStep::SEQUENCE.to_vec());

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].line.contains("project deploy"));
        assert!(calls[1].line.contains("kittyItems/setup_account.cdc"));
        assert!(calls[2].line.contains("nftStorefront/setup_account.cdc"));
        assert!(calls
            .iter()
            .all(|c| c.env == vec![("ADMIN_ADDRESS".to_string(), "f8d6e0586b0a20c7".to_string())]));
    }

    #[tokio::test]
    async fn test_failed_deploy_skips_setup_transactions() {
        let runner = ScriptedRunner {
            fail_containing: Some("project deploy"),
            ..Default::default()
        };
        let err = deploy(&runner).await.unwrap_err();
        assert_eq!(err.step, DeployStep::Contracts);
        assert!(err.to_string().contains("Command Error"));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_first_setup_skips_storefront() {
        let runner = ScriptedRunner {
            fail_containing: Some("kittyItems"),
            ..Default::default()
        };
        let err = deploy(&runner).await.unwrap_err();
        assert_eq!(err.step, DeployStep::Setup(SetupTransaction::KittyItems));

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(!calls.iter().any(|c| c.line.contains("nftStorefront")));
    }

    #[tokio::test]
    async fn test_nonzero_exit_without_stderr_is_fatal() {
        let runner = ScriptedRunner {
            exit_silently_containing: Some("project deploy"),
            ..Default::default()
        };
        let err = deploy(&runner).await.unwrap_err();
        assert_eq!(err.step, DeployStep::Contracts);
        assert!(matches!(
            &err.source,
            FlowError::CommandFailed { stderr, .. } if stderr.is_empty()
        ));
        assert_eq!(runner.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_deployment_commands_for_testnet() {
        let builder = CommandBuilder::new(FlowConfig::default(), NetworkMode::Testnet);
        let commands = deployment_commands(&builder);

        assert_eq!(
            commands,
            vec![
                "flow project deploy -o json --network=testnet -f flow.json -f flow.testnet.json --update".to_string(),
                "flow transactions send -o json --network=testnet --signer testnet-account ./cadence/transactions/kittyItems/setup_account.cdc -f flow.json -f flow.testnet.json".to_string(),
                "flow transactions send -o json --network=testnet --signer testnet-account ./cadence/transactions/nftStorefront/setup_account.cdc -f flow.json -f flow.testnet.json".to_string(),
            ]
        );
        assert_eq!(deployment_commands(&self::builder()).len(), 3);
    }
}
