//! Flow CLI command lines used by the launcher.
//!
//! Every builder function is pure string construction; nothing here touches
//! the filesystem or spawns processes.

use crate::config::FlowConfig;
use crate::network::NetworkMode;
use crate::runner::FlowResult;

/// Account setup transactions sent after contract deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupTransaction {
    /// Prepares the admin account to hold Kitty Items NFTs
    KittyItems,
    /// Prepares the admin account to list items on the NFT storefront
    NftStorefront,
}

impl SetupTransaction {
    pub fn label(&self) -> &'static str {
        match self {
            SetupTransaction::KittyItems => "KittyItems",
            SetupTransaction::NftStorefront => "NFTStorefront",
        }
    }
}

/// Builds Flow CLI command lines for one network
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    config: FlowConfig,
    network: NetworkMode,
}

impl CommandBuilder {
    pub fn new(config: FlowConfig, network: NetworkMode) -> Self {
        Self { config, network }
    }

    /// Build for a raw `CHAIN_ENV` value, failing when it is absent or unknown
    pub fn for_network(config: FlowConfig, raw: Option<&str>) -> FlowResult<Self> {
        Ok(Self::new(config, NetworkMode::resolve(raw)?))
    }

    pub fn network(&self) -> NetworkMode {
        self.network
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// `-f` flags selecting the project files for this network
    fn project_files(&self) -> String {
        let mut flags = format!("-f {}", self.config.project_file);
        if !self.network.is_emulator() {
            flags.push_str(&format!(
                " -f {}",
                self.config.network_file(self.network.as_str())
            ));
        }
        flags
    }

    /// Deploy (or update) every contract in the project
    pub fn deploy(&self) -> String {
        format!(
            "{} project deploy -o json --network={} {} --update",
            self.config.program,
            self.network,
            self.project_files()
        )
    }

    pub fn setup_transaction(&self, transaction: SetupTransaction) -> String {
        let path = match transaction {
            SetupTransaction::KittyItems => &self.config.kitty_items_setup_tx,
            SetupTransaction::NftStorefront => &self.config.storefront_setup_tx,
        };

        format!(
            "{} transactions send -o json --network={} --signer {} {} {}",
            self.config.program,
            self.network,
            self.network.signer(),
            path,
            self.project_files()
        )
    }

    pub fn setup_kitty_items(&self) -> String {
        self.setup_transaction(SetupTransaction::KittyItems)
    }

    pub fn setup_storefront(&self) -> String {
        self.setup_transaction(SetupTransaction::NftStorefront)
    }

    /// Key generation does not depend on the network
    pub fn generate_keys(&self) -> String {
        generate_keys_command(&self.config)
    }
}

pub fn generate_keys_command(config: &FlowConfig) -> String {
    format!("{} keys generate -o json", config.program)
}
