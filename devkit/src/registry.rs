//! The ordered set of packages `devkit setup` can add to a project.
//!
//! Built once at startup and passed explicitly to the selection UI and the
//! resolver. Descriptors only learn about each other through the predicates
//! on [`ResolutionContext`].

use std::collections::HashSet;

use anyhow::Result;
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::package::{
    Capability, CommandLine, Dependencies, FileSpec, PackageDescriptor, ResolutionContext,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("package '{0}' is registered twice")]
    Duplicate(String),
    #[error("unknown package '{name}' (available: {available})")]
    Unknown { name: String, available: String },
}

/// Ordered, read-only collection of package descriptors.
#[derive(Debug, Clone)]
pub struct Registry {
    packages: Vec<PackageDescriptor>,
}

impl Registry {
    /// Build a registry, rejecting duplicate names.
    pub fn new(packages: Vec<PackageDescriptor>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for package in &packages {
            if !seen.insert(package.name.as_str()) {
                return Err(RegistryError::Duplicate(package.name.clone()));
            }
        }
        Ok(Self { packages })
    }

    /// The packages shipped with devkit.
    pub fn builtin() -> Self {
        Self {
            packages: vec![
                eslint(),
                jest(),
                husky(),
                lint_staged(),
                prettier(),
                typescript(),
                changesets(),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.packages.iter()
    }

    pub fn get(&self, name: &str) -> Option<&PackageDescriptor> {
        self.packages.iter().find(|package| package.name == name)
    }

    /// Descriptors for `names`, in registry order.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&PackageDescriptor>, RegistryError> {
        if let Some(unknown) = names
            .iter()
            .map(AsRef::as_ref)
            .find(|name| self.get(name).is_none())
        {
            return Err(RegistryError::Unknown {
                name: unknown.to_string(),
                available: self
                    .packages
                    .iter()
                    .map(|package| package.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        Ok(self
            .packages
            .iter()
            .filter(|package| names.iter().any(|name| name.as_ref() == package.name))
            .collect())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| (*item).to_string()).collect()
}

fn eslint() -> PackageDescriptor {
    PackageDescriptor::new("eslint", "With eslint-config-react-app")
        .with_dependencies(Capability::from_fn(eslint_dependencies))
        .with_manifest(Capability::value(json!({
            "scripts": {
                "lint": "eslint . --ext .ts --ext .tsx --ext .js"
            },
            "eslintConfig": {
                "extends": "react-app",
                "rules": {
                    "import/order": [
                        "warn",
                        {
                            "newlines-between": "always",
                            "groups": [
                                "builtin",
                                "external",
                                "internal",
                                ["parent", "sibling", "index"]
                            ]
                        }
                    ]
                }
            }
        })))
}

/// react-scripts bundles the config; otherwise install it with pinned peers.
fn eslint_dependencies(ctx: &ResolutionContext<'_>) -> Result<Dependencies> {
    let mut dev = Vec::new();
    if !ctx.has_installed_dependency("react-scripts") {
        dev = ctx.metadata().peer_dependencies("eslint-config-react-app")?;
    }
    if !ctx.has_package("typescript") {
        dev.retain(|package| !package.contains("@typescript-eslint"));
    }
    Ok(Dependencies::dev(dev))
}

fn jest() -> PackageDescriptor {
    PackageDescriptor::new("jest", "With react-testing-library")
        .with_dependencies(Capability::from_fn(|ctx| {
            let react_scripts = ctx.has_installed_dependency("react-scripts");
            let typescript = ctx.has_package("typescript");

            let mut dev = Vec::new();
            if !react_scripts {
                dev.push("jest");
            }
            dev.extend(["@testing-library/jest-dom", "@testing-library/react"]);
            if typescript {
                dev.extend([
                    "@types/jest",
                    "@types/testing-library__jest-dom",
                    "@types/testing-library__react",
                ]);
            }
            if typescript && !react_scripts {
                dev.extend([
                    "@babel/core",
                    "@babel/preset-env",
                    "@babel/preset-react",
                    "@babel/preset-typescript",
                ]);
            }
            Ok(Dependencies::dev(dev))
        }))
        .with_manifest(Capability::from_fn(|ctx| {
            if ctx.has_installed_dependency("react-scripts") {
                return Ok(json!({}));
            }
            Ok(json!({ "scripts": { "test": "jest" } }))
        }))
        .with_files(Capability::from_fn(|ctx| {
            if ctx.has_installed_dependency("react-scripts") {
                return Ok(Vec::new());
            }
            let mut files = vec![FileSpec::new("jest.config.js", "jest.config.js")];
            if ctx.has_package("typescript") {
                files.push(FileSpec::new(".babelrc", ".babelrc"));
            }
            Ok(files)
        }))
}

fn husky() -> PackageDescriptor {
    PackageDescriptor::new("husky", "With lint-staged precommit hook")
        .with_dependencies(Capability::value(Dependencies::dev(["husky"])))
        .with_manifest(Capability::from_fn(|ctx| {
            let hooks = if ctx.has_package("lint-staged") {
                json!({ "pre-commit": "lint-staged" })
            } else {
                json!({})
            };
            Ok(json!({ "husky": { "hooks": hooks } }))
        }))
}

fn lint_staged() -> PackageDescriptor {
    PackageDescriptor::new("lint-staged", "With prettier setup")
        .with_dependencies(Capability::value(Dependencies::dev(["lint-staged"])))
        .with_manifest(Capability::from_fn(|ctx| {
            let mut rules = serde_json::Map::new();
            if ctx.has_selected_package("prettier") {
                rules.insert(
                    "*.{js,ts,jsx,tsx}".to_string(),
                    Value::from(strings(&["eslint --fix"])),
                );
                rules.insert(
                    "*.{js,ts,jsx,tsx,json,md,yml,html}".to_string(),
                    Value::from(strings(&["prettier --write"])),
                );
            }
            Ok(json!({ "lint-staged": rules }))
        }))
}

fn prettier() -> PackageDescriptor {
    PackageDescriptor::new("prettier", "With basic rules")
        .with_dependencies(Capability::value(Dependencies::dev(["prettier"])))
        .with_manifest(Capability::value(json!({
            "prettier": {
                "singleQuote": true,
                "trailingComma": "all",
                "proseWrap": "always"
            }
        })))
}

fn typescript() -> PackageDescriptor {
    PackageDescriptor::new("typescript", "With basic tsconfig.json")
        .with_dependencies(Capability::from_fn(|ctx| {
            let mut dev = vec!["typescript", "@types/node"];
            if ctx.has_installed_dependency("react") {
                dev.push("@types/react");
            }
            if ctx.has_installed_dependency("react-dom") {
                dev.push("@types/react-dom");
            }
            Ok(Dependencies::dev(dev))
        }))
        .with_files(Capability::value(vec![FileSpec::new(
            "tsconfig.json",
            "tsconfig.json",
        )]))
}

fn changesets() -> PackageDescriptor {
    let init: CommandLine = strings(&["npx", "changeset", "init"]);
    PackageDescriptor::new("changesets", "Setup changesets with GitHub actions")
        .with_dependencies(Capability::value(Dependencies::dev(["@changesets/cli"])))
        .with_manifest(Capability::value(json!({
            "scripts": {
                "release": "npm run build && npx changeset publish"
            }
        })))
        .with_files(Capability::value(vec![FileSpec::new(
            "changeset-action.yml.jinja",
            ".github/workflows/release.yml",
        )]))
        .with_post_setup(Capability::value(vec![init]))
}
