//! Local repository miner.
//!
//! Loads the workflow-run store, keeps the commits with a terminal
//! success/failure conclusion, traverses them in a local or cached clone of
//! the repository, and emits a flat feature+label table for modeling.

pub mod error;
pub mod git;
pub mod mine;

pub use error::MineError;
