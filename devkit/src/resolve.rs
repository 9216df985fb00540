//! Evaluate selected package descriptors into one [`ResolvedConfig`].

use std::panic::{self, AssertUnwindSafe};
use std::thread;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::core::manifest::Manifest;
use crate::core::merge::kind_name;
use crate::core::package::{
    CapabilityKind, PackageContribution, PackageDescriptor, PackageMetadata, ResolutionContext,
    ResolvedConfig,
};
use crate::runner::panic_message;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("package '{package}' failed to resolve {capability}: {message}")]
    Capability {
        package: String,
        capability: CapabilityKind,
        message: String,
    },
}

/// Resolve `selected` against `manifest`.
///
/// Descriptors are evaluated concurrently; contributions are merged in the
/// order given. The first failing package (in that order) aborts resolution.
#[instrument(skip_all, fields(packages = selected.len()))]
pub fn resolve(
    selected: &[&PackageDescriptor],
    manifest: &Manifest,
    metadata: &dyn PackageMetadata,
) -> Result<ResolvedConfig, ResolveError> {
    let names: Vec<&str> = selected.iter().map(|package| package.name.as_str()).collect();
    let ctx = ResolutionContext::new(manifest, names, metadata);

    let results: Vec<Result<PackageContribution, ResolveError>> = thread::scope(|scope| {
        let handles: Vec<_> = selected
            .iter()
            .map(|package| {
                let ctx = &ctx;
                (package, scope.spawn(move || evaluate(package, ctx)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(package, handle)| {
                handle.join().unwrap_or_else(|payload| {
                    Err(ResolveError::Capability {
                        package: package.name.clone(),
                        capability: CapabilityKind::Dependencies,
                        message: format!("evaluation panicked: {}", panic_message(payload.as_ref())),
                    })
                })
            })
            .collect()
    });

    let contributions = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    let resolved = ResolvedConfig::aggregate(contributions);
    debug!(
        dependencies = resolved.dependencies.len(),
        dev_dependencies = resolved.dev_dependencies.len(),
        files = resolved.files.len(),
        commands = resolved.post_setup_commands.len(),
        "resolved packages"
    );
    Ok(resolved)
}

fn evaluate(
    package: &PackageDescriptor,
    ctx: &ResolutionContext<'_>,
) -> Result<PackageContribution, ResolveError> {
    let fail = |capability: CapabilityKind| {
        move |message: String| ResolveError::Capability {
            package: package.name.clone(),
            capability,
            message,
        }
    };

    let dependencies = guarded(|| package.dependencies.evaluate(ctx))
        .map_err(fail(CapabilityKind::Dependencies))?;
    let manifest_fragment =
        guarded(|| package.manifest.evaluate(ctx)).map_err(fail(CapabilityKind::Manifest))?;
    if !manifest_fragment.is_object() {
        return Err(fail(CapabilityKind::Manifest)(format!(
            "fragment must be a JSON object, got {}",
            kind_name(&manifest_fragment)
        )));
    }
    let files = guarded(|| package.files.evaluate(ctx)).map_err(fail(CapabilityKind::Files))?;
    let post_setup_commands = guarded(|| package.post_setup.evaluate(ctx))
        .map_err(fail(CapabilityKind::PostSetup))?;

    Ok(PackageContribution {
        package: package.name.clone(),
        dependencies: dependencies.dependencies,
        dev_dependencies: dependencies.dev_dependencies,
        manifest_fragment,
        files,
        post_setup_commands,
    })
}

/// Run one capability, turning both errors and panics into a message.
fn guarded<T>(capability: impl FnOnce() -> Result<T>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(capability)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(format!("{err:#}")),
        Err(payload) => Err(format!(
            "capability panicked: {}",
            panic_message(payload.as_ref())
        )),
    }
}
