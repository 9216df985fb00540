//! Package descriptors and the data they contribute to a project.
//!
//! Every capability of a descriptor is a function of the shared
//! [`ResolutionContext`]. Static values are wrapped at registration time so
//! the resolver has a single calling convention.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::manifest::Manifest;
use crate::core::merge::{merge_all, unique};

/// Source of package metadata that descriptors may consult while resolving.
pub trait PackageMetadata: Send + Sync {
    /// Return `package` followed by its peer dependencies as `name@^version`.
    fn peer_dependencies(&self, package: &str) -> Result<Vec<String>>;
}

/// Read-only view shared by all capability functions during one resolve pass.
pub struct ResolutionContext<'a> {
    manifest: &'a Manifest,
    selected: Vec<&'a str>,
    metadata: &'a dyn PackageMetadata,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(
        manifest: &'a Manifest,
        selected: Vec<&'a str>,
        metadata: &'a dyn PackageMetadata,
    ) -> Self {
        Self {
            manifest,
            selected,
            metadata,
        }
    }

    pub fn manifest(&self) -> &Manifest {
        self.manifest
    }

    pub fn metadata(&self) -> &dyn PackageMetadata {
        self.metadata
    }

    pub fn has_selected_package(&self, name: &str) -> bool {
        self.selected.contains(&name)
    }

    pub fn has_installed_dependency(&self, name: &str) -> bool {
        self.manifest.has_dependency(name)
    }

    /// Selected now or already installed.
    pub fn has_package(&self, name: &str) -> bool {
        self.has_selected_package(name) || self.has_installed_dependency(name)
    }
}

/// Runtime and dev dependency lists contributed by one package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
}

impl Dependencies {
    pub fn dev<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependencies: Vec::new(),
            dev_dependencies: packages.into_iter().map(Into::into).collect(),
        }
    }
}

/// A bundled template and where to write it, relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub template: String,
    pub output: String,
}

impl FileSpec {
    pub fn new(template: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            output: output.into(),
        }
    }
}

/// A command line: program followed by its arguments.
pub type CommandLine = Vec<String>;

type CapabilityFn<T> = dyn Fn(&ResolutionContext<'_>) -> Result<T> + Send + Sync;

/// A descriptor capability, always callable with the resolution context.
pub struct Capability<T> {
    eval: Arc<CapabilityFn<T>>,
}

impl<T: Clone + Send + Sync + 'static> Capability<T> {
    /// Capability that ignores the context and returns `value`.
    pub fn value(value: T) -> Self {
        Self {
            eval: Arc::new(move |_| Ok(value.clone())),
        }
    }

    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&ResolutionContext<'_>) -> Result<T> + Send + Sync + 'static,
    {
        Self { eval: Arc::new(f) }
    }

    pub fn evaluate(&self, ctx: &ResolutionContext<'_>) -> Result<T> {
        (self.eval)(ctx)
    }
}

impl<T: Clone + Default + Send + Sync + 'static> Default for Capability<T> {
    fn default() -> Self {
        Self::value(T::default())
    }
}

impl<T> Clone for Capability<T> {
    fn clone(&self) -> Self {
        Self {
            eval: Arc::clone(&self.eval),
        }
    }
}

/// Names a capability in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Dependencies,
    Manifest,
    Files,
    PostSetup,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dependencies => "dependencies",
            Self::Manifest => "package.json fragment",
            Self::Files => "files",
            Self::PostSetup => "post-setup commands",
        };
        f.write_str(name)
    }
}

/// Registry entry describing one optional tool and what it contributes.
#[derive(Clone)]
pub struct PackageDescriptor {
    pub name: String,
    pub description: String,
    pub dependencies: Capability<Dependencies>,
    pub manifest: Capability<Value>,
    pub files: Capability<Vec<FileSpec>>,
    pub post_setup: Capability<Vec<CommandLine>>,
}

impl PackageDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            dependencies: Capability::default(),
            manifest: Capability::value(Value::Object(serde_json::Map::new())),
            files: Capability::default(),
            post_setup: Capability::default(),
        }
    }

    pub fn with_dependencies(mut self, capability: Capability<Dependencies>) -> Self {
        self.dependencies = capability;
        self
    }

    pub fn with_manifest(mut self, capability: Capability<Value>) -> Self {
        self.manifest = capability;
        self
    }

    pub fn with_files(mut self, capability: Capability<Vec<FileSpec>>) -> Self {
        self.files = capability;
        self
    }

    pub fn with_post_setup(mut self, capability: Capability<Vec<CommandLine>>) -> Self {
        self.post_setup = capability;
        self
    }
}

impl fmt::Debug for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackageDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// What a single package contributes after evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageContribution {
    pub package: String,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    pub manifest_fragment: Value,
    pub files: Vec<FileSpec>,
    pub post_setup_commands: Vec<CommandLine>,
}

/// Aggregated contributions of every selected package.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub contributions: Vec<PackageContribution>,
    pub dependencies: Vec<String>,
    pub dev_dependencies: Vec<String>,
    /// Every fragment folded together. The manifest is updated from
    /// `contributions` one package at a time, which is not equivalent when a
    /// key changes between scalar and object.
    pub manifest_fragment: Value,
    pub files: Vec<FileSpec>,
    pub post_setup_commands: Vec<CommandLine>,
}

impl ResolvedConfig {
    /// Merge contributions in the given order.
    ///
    /// Dependency lists are concatenated then deduplicated, fragments are
    /// deep-merged (later wins), files and commands are concatenated.
    pub fn aggregate(contributions: Vec<PackageContribution>) -> Self {
        let dependencies: Vec<String> = contributions
            .iter()
            .flat_map(|c| c.dependencies.iter().cloned())
            .collect();
        let dev_dependencies: Vec<String> = contributions
            .iter()
            .flat_map(|c| c.dev_dependencies.iter().cloned())
            .collect();
        let manifest_fragment = merge_all(contributions.iter().map(|c| &c.manifest_fragment));
        let files = contributions
            .iter()
            .flat_map(|c| c.files.iter().cloned())
            .collect();
        let post_setup_commands = contributions
            .iter()
            .flat_map(|c| c.post_setup_commands.iter().cloned())
            .collect();

        Self {
            dependencies: unique(&dependencies),
            dev_dependencies: unique(&dev_dependencies),
            manifest_fragment,
            files,
            post_setup_commands,
            contributions,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }
}
