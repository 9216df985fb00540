//! Deterministic, pure logic shared by the setup and open workflows.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod manifest;
pub mod merge;
pub mod package;
pub mod repository;
pub mod task;
