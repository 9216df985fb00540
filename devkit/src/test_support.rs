//! Test-only fakes for process execution, package metadata and project fixtures.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::package::PackageMetadata;
use crate::io::process::{CommandOutput, CommandRequest, ProcessRunner};

/// Successful output with the given stdout.
pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        success: true,
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
        stdout_truncated: 0,
        stderr_truncated: 0,
    }
}

/// Failed output with the given exit code and stderr.
pub fn failed_output(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        success: false,
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
        stdout_truncated: 0,
        stderr_truncated: 0,
    }
}

/// Process runner that replays queued outputs and records every request.
///
/// Once the queue is empty every further call succeeds with empty output.
#[derive(Debug, Default)]
pub struct ScriptedProcessRunner {
    outputs: Mutex<VecDeque<CommandOutput>>,
    calls: Mutex<Vec<CommandRequest>>,
}

impl ScriptedProcessRunner {
    pub fn new(outputs: Vec<CommandOutput>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, in order.
    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// `program args...` of every request, in order.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(CommandRequest::display).collect()
    }
}

impl ProcessRunner for ScriptedProcessRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.calls
            .lock()
            .map_err(|_| anyhow!("scripted runner lock poisoned"))?
            .push(request.clone());
        let next = self
            .outputs
            .lock()
            .map_err(|_| anyhow!("scripted runner lock poisoned"))?
            .pop_front();
        Ok(next.unwrap_or_else(|| ok_output("")))
    }
}

/// Metadata provider answering from a fixed table.
///
/// Unknown packages resolve to just themselves.
#[derive(Debug, Default)]
pub struct StaticMetadata {
    peers: HashMap<String, Vec<String>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_peers<I, S>(mut self, package: &str, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.peers.insert(
            package.to_string(),
            peers.into_iter().map(Into::into).collect(),
        );
        self
    }
}

impl PackageMetadata for StaticMetadata {
    fn peer_dependencies(&self, package: &str) -> Result<Vec<String>> {
        let mut packages = vec![package.to_string()];
        if let Some(peers) = self.peers.get(package) {
            packages.extend(peers.iter().cloned());
        }
        Ok(packages)
    }
}

/// Temporary project directory with a `package.json`.
pub struct TempProject {
    _temp: TempDir,
    root: PathBuf,
}

impl TempProject {
    pub fn new(manifest: &Value) -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let root = temp.path().to_path_buf();
        let project = Self { _temp: temp, root };
        project.write_manifest(manifest)?;
        Ok(project)
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("package.json")
    }

    pub fn write_manifest(&self, manifest: &Value) -> Result<()> {
        let payload = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
        fs::write(self.manifest_path(), payload).context("write package.json")
    }

    pub fn read_manifest(&self) -> Result<Value> {
        let raw = fs::read_to_string(self.manifest_path()).context("read package.json")?;
        serde_json::from_str(&raw).context("parse package.json")
    }

    pub fn write_file(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create parent dir")?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read_file(&self, rel: &str) -> Result<String> {
        let path = self.root.join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}
