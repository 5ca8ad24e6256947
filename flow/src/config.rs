use crate::runner::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    /// Program used to invoke the Flow CLI
    pub program: String,
    /// Base project configuration shared by every network
    pub project_file: String,
    pub kitty_items_setup_tx: String,
    pub storefront_setup_tx: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            program: "flow".to_string(),
            project_file: "flow.json".to_string(),
            kitty_items_setup_tx: "./cadence/transactions/kittyItems/setup_account.cdc"
                .to_string(),
            storefront_setup_tx: "./cadence/transactions/nftStorefront/setup_account.cdc"
                .to_string(),
        }
    }
}

impl FlowConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_project_file(mut self, project_file: impl Into<String>) -> Self {
        self.project_file = project_file.into();
        self
    }

    /// Overlay file with per-network settings, e.g. `flow.testnet.json`
    pub fn network_file(&self, network: &str) -> String {
        match self.project_file.strip_suffix(".json") {
            Some(stem) => format!("{stem}.{network}.json"),
            None => format!("{}.{network}", self.project_file),
        }
    }

    pub fn validate(&self) -> FlowResult<()> {
        let invalid = |message: &str| {
            Err(FlowError::InvalidConfig {
                message: message.to_string(),
            })
        };

        if self.program.trim().is_empty() {
            return invalid("Flow program cannot be empty");
        }

        if self.project_file.trim().is_empty() {
            return invalid("Project file cannot be empty");
        }

        if self.kitty_items_setup_tx.is_empty() || self.storefront_setup_tx.is_empty() {
            return invalid("Setup transaction paths cannot be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FlowConfig::default();
        assert_eq!(config.program, "flow");
        assert_eq!(config.project_file, "flow.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_network_file() {
        let config = FlowConfig::default();
        assert_eq!(config.network_file("testnet"), "flow.testnet.json");

        let config = FlowConfig::new().with_project_file("project");
        assert_eq!(config.network_file("testnet"), "project.testnet");
    }

    #[test]
    fn test_config_validation() {
        let mut config = FlowConfig::new().with_program(" ");
        assert!(config.validate().is_err());

        config.program = "flow".to_string();
        config.project_file = String::new();
        assert!(config.validate().is_err());

        config.project_file = "flow.json".to_string();
        config.storefront_setup_tx = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_reports_invalid_config() {
        let err = FlowConfig::new().with_program("").validate().unwrap_err();
        assert!(matches!(err, FlowError::InvalidConfig { .. }));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("Flow program cannot be empty"));
    }
}
