//! Package manager detection and install command lines.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
}

/// Lockfiles checked first, in this order.
const LOCKFILES: [(&str, PackageManager); 3] = [
    ("yarn.lock", PackageManager::Yarn),
    ("package-lock.json", PackageManager::Npm),
    ("pnpm-lock.yaml", PackageManager::Pnpm),
];

/// Executables probed on `PATH` when no lockfile exists.
const EXECUTABLES: [PackageManager; 3] =
    [PackageManager::Yarn, PackageManager::Npm, PackageManager::Pnpm];

#[derive(Debug, Error)]
#[error("could not detect a package manager in {}: no lockfile and none of yarn, npm, pnpm on PATH", root.display())]
pub struct DetectError {
    pub root: PathBuf,
}

impl PackageManager {
    pub fn program(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    /// Arguments for adding `packages`, before the package names.
    pub fn install_args(self, dev: bool) -> Vec<&'static str> {
        let verb = match self {
            Self::Npm => "install",
            Self::Yarn | Self::Pnpm => "add",
        };
        let mut args = vec![verb];
        if dev {
            args.push(match self {
                Self::Yarn => "--dev",
                Self::Npm | Self::Pnpm => "--save-dev",
            });
        }
        args
    }

    /// Full argument list for installing `packages`.
    pub fn install_command(self, packages: &[String], dev: bool) -> Vec<String> {
        self.install_args(dev)
            .into_iter()
            .map(str::to_string)
            .chain(packages.iter().cloned())
            .collect()
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Detect the package manager for the project at `root`.
///
/// Lockfiles win over installed executables. `has_command` reports whether a
/// program is available on `PATH`.
pub fn detect_package_manager<F>(root: &Path, has_command: F) -> Result<PackageManager, DetectError>
where
    F: Fn(&str) -> bool,
{
    for (lockfile, manager) in LOCKFILES {
        if root.join(lockfile).is_file() {
            debug!(%manager, lockfile, "package manager from lockfile");
            return Ok(manager);
        }
    }
    for manager in EXECUTABLES {
        if has_command(manager.program()) {
            debug!(%manager, "package manager from PATH");
            return Ok(manager);
        }
    }
    Err(DetectError {
        root: root.to_path_buf(),
    })
}

/// `has_command` backed by a `PATH` lookup.
pub fn on_path(program: &str) -> bool {
    which::which(program).is_ok()
}
