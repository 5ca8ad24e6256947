use crate::runner::{FlowError, FlowResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Deployment target a launcher session talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Local Flow emulator
    Emulator,
    /// Public Flow testnet
    Testnet,
}

impl NetworkMode {
    /// Parse the raw `CHAIN_ENV` value. Absent and unknown values are both
    /// configuration errors.
    pub fn resolve(raw: Option<&str>) -> FlowResult<Self> {
        match raw {
            Some(value) => value.parse(),
            None => Err(FlowError::UnknownNetwork { value: None }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Emulator => "emulator",
            NetworkMode::Testnet => "testnet",
        }
    }

    /// Name of the signing account declared in flow.json for this network
    pub fn signer(&self) -> String {
        format!("{}-account", self.as_str())
    }

    pub fn is_emulator(&self) -> bool {
        matches!(self, NetworkMode::Emulator)
    }
}

impl FromStr for NetworkMode {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emulator" => Ok(NetworkMode::Emulator),
            "testnet" => Ok(NetworkMode::Testnet),
            other => Err(FlowError::UnknownNetwork {
                value: Some(other.to_string()),
            }),
        }
    }
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
