//! Checkpoint handling
//!
//! Tracks the source's STATE messages and emits them once the data they
//! cover has been merged.
//!
//! # Overview
//!
//! - `CheckpointTracker` - Latest vs. flushed checkpoint
//! - `StateEmitter` - JSON-line output with an optional state file

mod emitter;
mod types;

pub use emitter::{read_state_file, StateEmitter};
pub use types::CheckpointTracker;
