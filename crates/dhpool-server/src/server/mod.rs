//! Server internals for `dhpool-server`.
//!
//! ## Structure
//!
//! - [`config`] - CLI and environment configuration.
//! - [`pool`] - Startup scan and the background pool tasks.
//! - [`service`] - HTTP routes and error mapping.
//! - [`telemetry`] - Logging and optional metrics.

pub mod config;
pub mod pool;
pub mod service;
pub mod telemetry;
