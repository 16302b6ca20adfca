//! Background pool maintenance.
//!
//! - [`manager`] - Owns the watcher, intake and replenisher tasks.

pub mod manager;
