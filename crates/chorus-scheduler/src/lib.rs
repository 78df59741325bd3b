//! Background maintenance tasks for chorus
//!
//! Currently just the invitation cleanup sweeper.

pub mod sweeper;

pub use sweeper::{CleanupSweeper, SweeperConfig, sweep_once};
