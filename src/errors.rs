// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! A process exiting non-zero is *not* an error here: failed runs are
//! reported as ordinary completion data on the command. The variants below
//! only cover misuse of the API surface and tracking-task failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmdbatchError {
    #[error("Command already running: {0}")]
    AlreadyRunning(String),

    #[error("Completion tracking task panicked: {0}")]
    Tracking(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CmdbatchError>;
