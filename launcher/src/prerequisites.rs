use flow::{CommandRunner, FlowError, ShellCommand};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PackageManifest {
    #[serde(default)]
    engines: Option<Engines>,
}

#[derive(Debug, Deserialize)]
struct Engines {
    node: Option<String>,
}

/// Outcome of the Node.js runtime check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCheck {
    /// The installed runtime satisfies the manifest, or no constraint exists
    Supported,
    /// The installed runtime is older than the manifest requires
    Unsupported { required: u64, found: String },
}

/// First run of digits in `text`, e.g. `16` for `">=16.x"` or `"v16.13.0"`
pub fn major_version(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Required Node.js major version from `package.json`, if one is declared.
/// A missing or unreadable manifest imposes no constraint.
pub fn required_node_major(root: &Path) -> Option<u64> {
    let path = root.join("package.json");
    let contents = fs::read_to_string(&path).ok()?;
    match serde_json::from_str::<PackageManifest>(&contents) {
        Ok(manifest) => manifest
            .engines
            .and_then(|engines| engines.node)
            .and_then(|node| major_version(&node)),
        Err(e) => {
            warn!("Ignoring unreadable {}: {}", path.display(), e);
            None
        }
    }
}

/// Compare the installed `node` against the project's engine requirement
pub async fn check_node_runtime(
    runner: &dyn CommandRunner,
    root: &Path,
) -> Result<RuntimeCheck, FlowError> {
    let Some(required) = required_node_major(root) else {
        debug!("package.json declares no node engine, skipping runtime check");
        return Ok(RuntimeCheck::Supported);
    };

    let output = runner
        .run(&ShellCommand::new("node --version", root))
        .await?;
    let found = output.stdout.trim().to_string();

    match major_version(&found) {
        Some(major) if output.success && major >= required => Ok(RuntimeCheck::Supported),
        _ => Ok(RuntimeCheck::Unsupported { required, found }),
    }
}
