//! Locate, read and write the project's `package.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::manifest::Manifest;

pub const MANIFEST_FILE: &str = "package.json";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no {MANIFEST_FILE} found in {} or any parent directory", start.display())]
    NotFound { start: PathBuf },
    #[error("read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{} does not contain a JSON object", path.display())]
    NotAnObject { path: PathBuf },
    #[error("write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialize {}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Walk up from `start` to the nearest directory containing `package.json`.
#[instrument(skip_all, fields(start = %start.display()))]
pub fn find_manifest(start: &Path) -> Result<PathBuf, ManifestError> {
    for dir in start.ancestors() {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.is_file() {
            debug!(path = %candidate.display(), "found manifest");
            return Ok(candidate);
        }
    }
    Err(ManifestError::NotFound {
        start: start.to_path_buf(),
    })
}

/// Read and parse a manifest from disk.
pub fn read_manifest(path: &Path) -> Result<Manifest, ManifestError> {
    let contents = fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|source| ManifestError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Manifest::from_value(value).ok_or_else(|| ManifestError::NotAnObject {
        path: path.to_path_buf(),
    })
}

/// Write a manifest in canonical form (ordered keys, 2-space indent, trailing newline).
pub fn write_manifest(path: &Path, manifest: &Manifest) -> Result<(), ManifestError> {
    let payload = manifest
        .to_canonical_string()
        .map_err(|source| ManifestError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
    fs::write(path, payload).map_err(|source| ManifestError::Write {
        path: path.to_path_buf(),
        source,
    })
}
