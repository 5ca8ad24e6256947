use flow::FlowConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Checkout containing flow.json, package.json, api/ and web/
    pub project_root: PathBuf,
    /// Raw `CHAIN_ENV` value, parsed when the session starts
    pub network: Option<String>,
    pub flow: FlowConfig,
    /// Program plus leading arguments used to reach pm2
    pub pm2_command: Vec<String>,
    /// Pause before the closing summary is printed
    pub summary_delay: Duration,
    pub web_url: String,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            network: None,
            flow: FlowConfig::default(),
            pm2_command: vec!["npx".to_string(), "pm2".to_string()],
            summary_delay: Duration::from_secs(3),
            web_url: "http://localhost:3001".to_string(),
        }
    }
}

impl LauncherConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_flow(mut self, flow: FlowConfig) -> Self {
        self.flow = flow;
        self
    }

    /// Split a command line such as `npx pm2` on whitespace
    pub fn with_pm2_command(mut self, command: &str) -> Self {
        self.pm2_command = command.split_whitespace().map(str::to_string).collect();
        self
    }

    pub fn with_summary_delay(mut self, delay: Duration) -> Self {
        self.summary_delay = delay;
        self
    }

    /// How the operator can tail a service's logs
    pub fn logs_hint(&self, service: &str) -> String {
        format!("{} logs {}", self.pm2_command.join(" "), service)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.project_root.is_dir() {
            return Err(format!(
                "Project root {} is not a directory",
                self.project_root.display()
            ));
        }

        if self.pm2_command.is_empty() {
            return Err("Process manager command cannot be empty".to_string());
        }

        if !self.web_url.starts_with("http://") && !self.web_url.starts_with("https://") {
            return Err("Web URL must start with http:// or https://".to_string());
        }

        self.flow.validate().map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LauncherConfig::default();
        assert_eq!(config.pm2_command, vec!["npx", "pm2"]);
        assert_eq!(config.summary_delay, Duration::from_secs(3));
        assert!(config.network.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = LauncherConfig::new()
            .with_network("testnet")
            .with_pm2_command("  pm2  ")
            .with_summary_delay(Duration::ZERO);

        assert_eq!(config.network.as_deref(), Some("testnet"));
        assert_eq!(config.pm2_command, vec!["pm2"]);
        assert_eq!(config.logs_hint("api"), "pm2 logs api");
    }

    #[test]
    fn test_config_validation() {
        let mut config = LauncherConfig::new().with_pm2_command("");
        assert!(config.validate().is_err());

        config.pm2_command = vec!["pm2".to_string()];
        config.web_url = "localhost:3001".to_string();
        assert!(config.validate().is_err());

        config.web_url = "http://localhost:3001".to_string();
        config.project_root = PathBuf::from("/definitely/not/here");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_flow_config_is_validated() {
        let config = LauncherConfig::new().with_flow(FlowConfig::new().with_program(" "));
        let message = config.validate().unwrap_err();
        assert!(message.contains("Flow program cannot be empty"));
    }
}
