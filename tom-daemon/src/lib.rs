//! tom daemon library.
//!
//! This library exposes internal modules for integration testing.
//! In production, the `tom` binary (main.rs) is used.

pub mod capture;
pub mod cli;
pub mod logging;
pub mod orchestrator;
