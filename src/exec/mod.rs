// src/exec/mod.rs

//! Process execution layer.
//!
//! This module owns the boundary to the external process-spawning facility:
//! a command hands its expression to a [`Spawner`] and receives exactly one
//! [`SpawnOutcome`] with the exit code and captured output streams.
//!
//! - [`spawner`] defines the `Spawner` trait and the outcome type.
//! - [`shell`] provides the concrete `ShellSpawner` used in production,
//!   which tests can replace with a fake implementation.

pub mod shell;
pub mod spawner;

pub use shell::ShellSpawner;
pub use spawner::{SpawnOutcome, Spawner};
