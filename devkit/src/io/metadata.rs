//! Package metadata from the npm registry, via the `npm view` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use semver::Version;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::package::PackageMetadata;
use crate::io::process::{CommandRequest, ProcessRunner, run_checked};

/// Resolves peer dependencies by asking `npm view`.
pub struct NpmMetadata {
    runner: Arc<dyn ProcessRunner>,
    cwd: PathBuf,
}

impl NpmMetadata {
    pub fn new(runner: Arc<dyn ProcessRunner>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            cwd: cwd.into(),
        }
    }

    fn view(&self, args: Vec<String>) -> Result<Value> {
        let request = CommandRequest::new("npm", args, self.cwd.clone());
        let output = run_checked(self.runner.as_ref(), &request)?;
        let stdout = output.stdout_lossy();
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&stdout)
            .with_context(|| format!("parse output of `{}`", request.display()))
    }
}

impl PackageMetadata for NpmMetadata {
    #[instrument(skip(self))]
    fn peer_dependencies(&self, package: &str) -> Result<Vec<String>> {
        let info = self.view(vec![
            "view".to_string(),
            package.to_string(),
            "name".to_string(),
            "peerDependencies".to_string(),
            "--json".to_string(),
        ])?;

        let mut packages = vec![package.to_string()];
        for (peer, range) in peer_ranges(&info) {
            let versions = self.view(vec![
                "view".to_string(),
                format!("{peer}@{range}"),
                "version".to_string(),
                "--json".to_string(),
            ])?;
            let version = highest_version(&versions)
                .with_context(|| format!("no published version of {peer} matches {range}"))?;
            debug!(%peer, %range, %version, "resolved peer dependency");
            packages.push(format!("{peer}@^{version}"));
        }
        Ok(packages)
    }
}

/// `(name, range)` pairs from `npm view <pkg> name peerDependencies --json` output.
///
/// A single field prints as a bare value; several versions print as an array,
/// in which case the last (newest) entry is used.
fn peer_ranges(info: &Value) -> Vec<(String, String)> {
    let info = match info {
        Value::Array(items) => items.last().unwrap_or(&Value::Null),
        other => other,
    };
    let Some(peers) = info.get("peerDependencies").and_then(Value::as_object) else {
        return Vec::new();
    };
    peers
        .iter()
        .filter_map(|(name, range)| Some((name.clone(), range.as_str()?.to_string())))
        .collect()
}

/// Highest semver version in `npm view <pkg>@<range> version --json` output.
fn highest_version(versions: &Value) -> Option<String> {
    let candidates: Vec<&str> = match versions {
        Value::String(version) => vec![version.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    candidates
        .iter()
        .filter_map(|raw| Version::parse(raw).ok())
        .max()
        .map(|version| version.to_string())
        .or_else(|| candidates.last().map(|raw| (*raw).to_string()))
}
