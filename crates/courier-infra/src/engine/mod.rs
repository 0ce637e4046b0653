//! Agent CLI execution engine.

pub mod protocol;
pub mod subprocess;

pub use subprocess::{SubprocessEngine, SubprocessSession};
