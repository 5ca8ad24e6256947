use crate::runner::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keypair reported by `flow keys generate -o json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedKeys {
    pub private: String,
    pub public: String,
    /// Remaining fields (mnemonic, derivation path, algorithms) kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeneratedKeys {
    /// Parse key generator output, naming `command` in the error
    pub fn parse(command: &str, stdout: &str) -> FlowResult<Self> {
        serde_json::from_str(stdout.trim()).map_err(|source| FlowError::MalformedOutput {
            command: command.to_string(),
            source,
        })
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}
