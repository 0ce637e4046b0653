//! Long-term memory and conversation consolidation.
//!
//! `MemoryRepository` is the persistence port for the memory document and
//! the history log. `ConsolidationPipeline` folds batches of turns into
//! both through a FIFO gate, so every write is ordered system-wide.

pub mod parse;
pub mod pipeline;
pub mod prompt;
pub mod repository;

pub use pipeline::{ConsolidationPipeline, ConsolidationSlot};
pub use repository::MemoryRepository;
