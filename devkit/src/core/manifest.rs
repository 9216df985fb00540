//! In-memory `package.json` model and canonical serialization.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::merge::{deep_merge, kind_name};
use crate::core::repository::{RepoSlug, repo_from_field};

/// Top-level keys written first, in this order. Anything else follows
/// alphabetically.
pub const CANONICAL_KEY_ORDER: &[&str] = &[
    "name",
    "version",
    "description",
    "main",
    "module",
    "umd:main",
    "source",
    "types",
    "repository",
    "author",
    "homepage",
    "license",
    "private",
    "workspaces",
    "bin",
    "files",
    "keywords",
    "engines",
    "scripts",
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "publishConfig",
    "config",
];

/// Keys that npm tooling injects and that never belong on disk.
const IGNORED_KEYS: &[&str] = &["readme", "_id"];

/// A fragment that cannot be merged onto a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("manifest fragment must be a JSON object, got {kind}")]
pub struct FragmentError {
    pub kind: &'static str,
}

/// Parsed project manifest. Key order is preserved as read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    fields: Map<String, Value>,
}

impl Manifest {
    /// Build from any JSON value; non-objects are rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// True if `package` is listed in `dependencies` or `devDependencies`.
    pub fn has_dependency(&self, package: &str) -> bool {
        ["dependencies", "devDependencies"].iter().any(|section| {
            self.fields
                .get(*section)
                .and_then(Value::as_object)
                .is_some_and(|deps| deps.contains_key(package))
        })
    }

    pub fn repository(&self) -> Option<RepoSlug> {
        self.fields.get("repository").and_then(repo_from_field)
    }

    /// Deep-merge an object fragment on top of this manifest.
    ///
    /// Any other fragment is rejected and leaves the manifest untouched.
    pub fn merge(&mut self, fragment: &Value) -> Result<(), FragmentError> {
        let Value::Object(patch) = fragment else {
            return Err(FragmentError {
                kind: kind_name(fragment),
            });
        };
        for (key, value) in patch {
            match self.fields.get_mut(key) {
                Some(existing) => deep_merge(existing, value),
                None => {
                    self.fields.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }

    /// Copy with keys in canonical order, dropping ignored and null keys.
    pub fn canonicalized(&self) -> Self {
        let mut ordered = Map::new();
        for key in CANONICAL_KEY_ORDER {
            if let Some(value) = self.fields.get(*key) {
                ordered.insert((*key).to_string(), value.clone());
            }
        }

        let mut rest: Vec<&String> = self
            .fields
            .keys()
            .filter(|key| !CANONICAL_KEY_ORDER.contains(&key.as_str()))
            .collect();
        rest.sort();
        for key in rest {
            ordered.insert(key.clone(), self.fields[key.as_str()].clone());
        }

        ordered.retain(|key, value| !IGNORED_KEYS.contains(&key.as_str()) && !value.is_null());
        Self { fields: ordered }
    }

    /// Canonical on-disk form: 2-space indent, trailing newline.
    pub fn to_canonical_string(&self) -> serde_json::Result<String> {
        let mut buf = serde_json::to_string_pretty(&self.canonicalized().into_value())?;
        buf.push('\n');
        Ok(buf)
    }
}
