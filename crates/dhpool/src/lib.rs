#![doc = include_str!("../README.md")]

mod artifact;
mod error;
mod generator;
mod intake;
mod replenish;
mod retrieval;
mod store;
#[cfg(test)]
mod testing;
mod tool;
mod validator;
mod watch;

pub use crate::artifact::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::intake::*;
pub use crate::replenish::*;
pub use crate::retrieval::*;
pub use crate::store::*;
pub use crate::tool::*;
pub use crate::validator::*;
pub use crate::watch::{DEFAULT_WATCH_INTERVAL, DirectoryWatcher, PoolEvent};

// Re-exported so callers can drive shutdown without depending on
// `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
