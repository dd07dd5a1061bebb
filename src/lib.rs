//! Syncwall - synchronized multi-stream HLS wall
//!
//! This library crate exposes the server side (registry, supervisor, HTTP)
//! and the headless dashboard for integration testing.

pub mod config;
pub mod dashboard;
pub mod registry;
pub mod server;
pub mod supervisor;
pub mod tools;
