//! Execution engine port.
//!
//! An execution engine runs one agent conversation per handle: the
//! orchestrator opens a handle per conversation key, sends each user turn,
//! and consumes the event stream until the `Final` event.
//!
//! Implementations live in courier-infra (e.g., `SubprocessEngine`).

use std::pin::Pin;

use futures_util::Stream;

use courier_types::engine::{EngineEvent, EngineInput, EngineOptions};
use courier_types::error::EngineError;

/// Stream of events for one turn. Ends after the `Final` event.
pub type EngineEventStream<'a> =
    Pin<Box<dyn Stream<Item = Result<EngineEvent, EngineError>> + Send + 'a>>;

/// Factory for engine handles.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait ExecutionEngine: Send + Sync {
    type Session: EngineSession + 'static;

    /// Start a new conversation handle.
    fn open(
        &self,
        options: EngineOptions,
    ) -> impl std::future::Future<Output = Result<Self::Session, EngineError>> + Send;
}

/// One live engine conversation.
pub trait EngineSession: Send {
    /// Send one user turn.
    fn send(
        &mut self,
        input: EngineInput,
    ) -> impl std::future::Future<Output = Result<(), EngineError>> + Send;

    /// Events produced for the last sent turn, ending with `Final`.
    ///
    /// Returns a boxed stream (not RPITIT) so callers can hold it across
    /// select points.
    fn receive(&mut self) -> EngineEventStream<'_>;

    /// Release the handle. Idempotent.
    fn close(&mut self) -> impl std::future::Future<Output = ()> + Send;
}
