//! I/O helpers for devkit commands.

pub mod config;
pub mod editor;
pub mod git;
pub mod manifest_store;
pub mod metadata;
pub mod package_manager;
pub mod process;
pub mod projects;
pub mod templates;
