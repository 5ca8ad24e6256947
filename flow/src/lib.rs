pub mod commands;
pub mod config;
pub mod keys;
pub mod network;
pub mod runner;

pub use commands::{generate_keys_command, CommandBuilder, SetupTransaction};
pub use config::FlowConfig;
pub use keys::GeneratedKeys;
pub use network::NetworkMode;
pub use runner::{
    CommandOutput, CommandRunner, FlowError, FlowResult, ShellCommand, ShellRunner,
};

pub mod prelude {
    pub use crate::commands::*;
    pub use crate::config::*;
    pub use crate::keys::*;
    pub use crate::network::*;
    pub use crate::runner::*;
}
