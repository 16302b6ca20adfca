//! HTTP retrieval surface.
//!
//! ## Structure
//!
//! - [`handler`] - Router and request handlers.
//! - [`error`] - Pool error to HTTP response mapping.

pub mod error;
pub mod handler;
