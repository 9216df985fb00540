//! Interactive developer-productivity CLI.
//!
//! Two workflows: `open` finds git projects under configured roots and opens
//! one in an editor; `setup` adds tooling packages to a JavaScript project by
//! resolving their contributions and running four sequential tasks.
//!
//! - **[`core`]**: Pure, deterministic logic (task state machine, package
//!   descriptors, manifest ordering, merging). No I/O.
//! - **[`io`]**: Side-effecting operations (filesystem, processes, config).
//!   Isolated behind traits where tests need fakes.
//!
//! Orchestration modules ([`registry`], [`resolve`], [`tasks`], [`runner`],
//! [`setup`], [`open`]) coordinate core logic with I/O; [`ui`] renders.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod open;
pub mod registry;
pub mod resolve;
pub mod runner;
pub mod setup;
pub mod tasks;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod ui;
