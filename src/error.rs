//! Centralized error type for the parlo umbrella crate.
//!
//! Wraps core errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] parlo_core::Error),

    #[error("Failed to spawn control thread: {0}")]
    ControlThreadSpawn(String),

    #[error("Control thread is not running")]
    ControlThreadDisconnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the same call may succeed later without reconfiguration.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_transient())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
