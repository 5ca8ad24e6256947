use clap::{Parser, Subcommand};
use colored::Colorize;
use flow::{CommandBuilder, FlowConfig, ShellRunner};
use launcher::{
    deployment_commands, stop_services, LauncherConfig, Pm2Manager, Session, TerminalOperator,
    FAILURE_EXIT_CODE,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "kitty-items")]
#[command(about = "Start the Kitty Items emulator, wallet, contracts, API and web app")]
struct Cli {
    /// Project checkout containing flow.json, api/ and web/
    #[arg(long, env = "LAUNCHER_PROJECT_ROOT", default_value = ".", global = true)]
    root: PathBuf,
    /// Target network: emulator or testnet
    #[arg(long, env = "CHAIN_ENV", global = true)]
    network: Option<String>,
    /// Flow CLI program
    #[arg(long, env = "LAUNCHER_FLOW", default_value = "flow", global = true)]
    flow: String,
    /// Command used to reach pm2
    #[arg(long, env = "LAUNCHER_PM2", default_value = "npx pm2", global = true)]
    pm2: String,
    /// Milliseconds to wait before printing the closing summary
    #[arg(long, default_value = "3000", global = true)]
    summary_delay_ms: u64,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full startup session (default)
    Start,
    /// Print the deployment and account setup commands for the network
    Commands,
    /// Remove every Kitty Items service from the process manager
    Stop,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = LauncherConfig::new()
        .with_project_root(&cli.root)
        .with_flow(FlowConfig::new().with_program(&cli.flow))
        .with_pm2_command(&cli.pm2)
        .with_summary_delay(Duration::from_millis(cli.summary_delay_ms));
    let config = match &cli.network {
        Some(network) => config.with_network(network),
        None => config,
    };

    if let Err(message) = config.validate() {
        eprintln!("{} {}", "✖".red(), message.red());
        return exit_code(FAILURE_EXIT_CODE);
    }

    let code = match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => start(config).await,
        Commands::Commands => print_commands(&config),
        Commands::Stop => stop(&config).await,
    };
    exit_code(code)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

async fn start(config: LauncherConfig) -> i32 {
    let runner = ShellRunner::new();
    let operator = TerminalOperator::new();
    let mut manager = Pm2Manager::new(config.pm2_command.clone(), &config.project_root);

    let mut session = Session::new(config, &runner, &operator);
    match session.run(&mut manager).await {
        Ok(outcome) => {
            info!(state = ?outcome.final_state, "session finished");
            outcome.exit_code()
        }
        // Session::run has already logged and reported the failure
        Err(e) => e.exit_code(),
    }
}

fn print_commands(config: &LauncherConfig) -> i32 {
    match CommandBuilder::for_network(config.flow.clone(), config.network.as_deref()) {
        Ok(builder) => {
            for command in deployment_commands(&builder) {
                println!("{command}");
            }
            0
        }
        Err(e) => {
            eprintln!("{} {}", "✖".red(), e.to_string().red());
            FAILURE_EXIT_CODE
        }
    }
}

async fn stop(config: &LauncherConfig) -> i32 {
    let mut manager = Pm2Manager::new(config.pm2_command.clone(), &config.project_root);
    match stop_services(&mut manager).await {
        Ok(report) => {
            for service in &report.stopped {
                println!("{} {} stopped", "✔".green(), service);
            }
            for (service, reason) in &report.skipped {
                println!("{} {} not stopped: {}", "ℹ".blue(), service, reason);
            }
            0
        }
        Err(e) => {
            eprintln!("{} {}", "✖".red(), e.to_string().red());
            FAILURE_EXIT_CODE
        }
    }
}
