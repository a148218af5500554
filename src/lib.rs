//! netdiag -- interactive network diagnostics for the desktop.
//!
//! This crate provides the probe catalog, the sequential probe runner with
//! live progress reporting, result collection, persisted settings, and the
//! terminal front end built on top of them.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod menu;
pub mod notify;
pub mod orchestrator;
pub mod probes;
pub mod progress;
pub mod render;
pub mod results;
pub mod settings;
pub mod setup;

