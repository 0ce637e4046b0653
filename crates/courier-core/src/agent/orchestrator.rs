//! Session orchestrator: one inbound message in, one reply out.
//!
//! Per message, in the key's FIFO slot:
//! 1. keep the session inside its window (consolidate or fall back, trim,
//!    store a recap, retire the engine handle)
//! 2. record the user turn
//! 3. drive the engine handle for the key until its `Final` event,
//!    publishing tool progress along the way
//! 4. record and publish the assistant reply
//!
//! Engine handles live in a map keyed by conversation. A handle is taken
//! out of the map for the duration of a turn and put back afterwards; a
//! turn that fails closes its handle instead.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use courier_types::config::HostConfig;
use courier_types::engine::{EngineEvent, EngineInput, EngineOptions};
use courier_types::error::{EngineError, RepositoryError};
use courier_types::message::{InboundMessage, OutboundMessage};
use courier_types::session::ConversationEntry;
use dashmap::DashMap;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::attachments::load_attachments;
use super::commands::{Command, HELP_TEXT};
use super::prompt::{compose_recap_turn, compose_system_prompt, tool_hint};
use super::window::{build_recap, plan_trim};
use crate::engine::{EngineSession, ExecutionEngine};
use crate::memory::prompt::build_fallback_entry;
use crate::memory::{ConsolidationPipeline, MemoryRepository};
use crate::message::{MessageBus, MessageProcessor};
use crate::session::{SessionLogRepository, SessionStore};

pub const APOLOGY_TEXT: &str = "Sorry, something went wrong while handling your message. Please try again.";
pub const NEW_SESSION_TEXT: &str = "New session started. The previous conversation was archived to memory.";

/// Failure of one orchestrated turn.
#[derive(Debug, thiserror::Error)]
pub enum TurnError {
    #[error("session storage failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("execution engine failed: {0}")]
    Engine(#[from] EngineError),
}

/// Assistant output of one engine turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutput {
    pub text: String,
    pub tools_used: Vec<String>,
}

/// Coordinates the session store, the consolidation pipeline, and the
/// execution engine for every conversation.
pub struct SessionOrchestrator<R, M, E>
where
    R: SessionLogRepository,
    M: MemoryRepository,
    E: ExecutionEngine,
{
    config: HostConfig,
    workspace: PathBuf,
    bus: Arc<MessageBus>,
    sessions: SessionStore<R>,
    pipeline: ConsolidationPipeline<M>,
    engine: E,
    handles: Mutex<HashMap<String, E::Session>>,
    recaps: DashMap<String, String>,
}

impl<R, M, E> SessionOrchestrator<R, M, E>
where
    R: SessionLogRepository,
    M: MemoryRepository,
    E: ExecutionEngine,
{
    pub fn new(
        config: HostConfig,
        workspace: PathBuf,
        bus: Arc<MessageBus>,
        sessions: SessionStore<R>,
        pipeline: ConsolidationPipeline<M>,
        engine: E,
    ) -> Self {
        Self {
            config,
            workspace,
            bus,
            sessions,
            pipeline,
            engine,
            handles: Mutex::new(HashMap::new()),
            recaps: DashMap::new(),
        }
    }

    pub fn sessions(&self) -> &SessionStore<R> {
        &self.sessions
    }

    /// Recap waiting to be injected into the key's next turn, if any.
    pub fn pending_recap(&self, key: &str) -> Option<String> {
        self.recaps.get(key).map(|r| r.clone())
    }

    /// Handle one inbound message end to end.
    #[tracing::instrument(
        name = "handle_message",
        skip_all,
        fields(session_key = %message.session_key(), channel = %message.channel)
    )]
    pub async fn handle_message(&self, message: &InboundMessage) -> Result<(), TurnError> {
        let key = message.session_key();

        match Command::parse(&message.content) {
            Some(Command::New) => return self.start_new_session(&key, message).await,
            Some(Command::Help) => {
                self.reply(message, HELP_TEXT);
                return Ok(());
            }
            // `/stop` is handled by the dispatcher before it gets here.
            Some(Command::Stop) => {
                self.reply(message, "No active task to stop.");
                return Ok(());
            }
            None => {}
        }

        self.maintain_window(&key).await?;
        self.sessions.append(&key, "user", &message.content).await?;

        let output = self.run_turn(&key, message).await?;
        let entry = ConversationEntry::new("assistant", output.text.clone())
            .with_tools(output.tools_used);
        self.sessions.append_entry(&key, entry).await?;

        self.reply(message, output.text);
        Ok(())
    }

    /// Consolidate and trim when the session has outgrown its window.
    pub async fn maintain_window(&self, key: &str) -> Result<(), TurnError> {
        let session = self.sessions.get(key).await?;
        let Some(plan) = plan_trim(
            session.messages.len(),
            session.last_consolidated,
            self.config.session_window,
        ) else {
            return Ok(());
        };

        info!(
            session_key = key,
            messages = session.messages.len(),
            window = self.config.session_window,
            cutoff = plan.cutoff,
            "session window exceeded"
        );

        self.archive(key, session.unconsolidated_until(plan.cutoff))
            .await?;
        self.sessions.trim_before(key, plan.cutoff).await?;

        let recap = build_recap(&session.messages[plan.cutoff..]);
        if recap.is_empty() {
            self.recaps.remove(key);
        } else {
            self.recaps.insert(key.to_string(), recap);
        }
        self.close_handle(key).await;
        Ok(())
    }

    /// Fold `batch` into memory, or append a raw fallback entry when the
    /// summarizer times out, fails, or returns nothing usable.
    async fn archive(&self, key: &str, batch: &[ConversationEntry]) -> Result<(), TurnError> {
        if batch.is_empty() {
            return Ok(());
        }

        let slot = self.pipeline.reserve().await;
        match slot.run(batch, self.config.consolidation_timeout()).await {
            Ok(_) => {
                info!(session_key = key, entries = batch.len(), "conversation consolidated");
            }
            Err(e) => {
                warn!(
                    session_key = key,
                    entries = batch.len(),
                    error = %e,
                    "consolidation failed, archiving raw entries"
                );
                let raw = build_fallback_entry(
                    batch,
                    self.config.fallback_entry_count,
                    self.config.fallback_content_chars,
                );
                slot.append_history(&raw).await?;
            }
        }
        Ok(())
    }

    async fn start_new_session(&self, key: &str, message: &InboundMessage) -> Result<(), TurnError> {
        let session = self.sessions.get(key).await?;
        self.archive(key, session.unconsolidated_until(session.messages.len()))
            .await?;
        self.sessions.clear(key).await?;
        self.recaps.remove(key);
        self.close_handle(key).await;

        info!(session_key = key, archived = session.messages.len(), "session reset");
        self.reply(message, NEW_SESSION_TEXT);
        Ok(())
    }

    async fn run_turn(&self, key: &str, message: &InboundMessage) -> Result<TurnOutput, TurnError> {
        let (mut handle, fresh) = match self.take_handle(key) {
            Some(handle) => (handle, false),
            None => (self.open_handle().await?, true),
        };

        let mut text = message.content.clone();
        if fresh {
            if let Some((_, recap)) = self.recaps.remove(key) {
                text = compose_recap_turn(&recap, &text);
            }
        }
        let attachments = load_attachments(&message.media).await;
        let input = EngineInput::with_attachments(text, attachments);

        match self.drive(&mut handle, input, message).await {
            Ok(output) => {
                self.put_handle(key, handle);
                Ok(output)
            }
            Err(e) => {
                handle.close().await;
                Err(e.into())
            }
        }
    }

    async fn open_handle(&self) -> Result<E::Session, EngineError> {
        let memory = self.pipeline.read_memory().await.unwrap_or_else(|e| {
            warn!(error = %e, "failed to read long-term memory for system prompt");
            String::new()
        });
        let options = EngineOptions {
            model: self.config.model.clone(),
            cwd: self.workspace.clone(),
            system_prompt: compose_system_prompt(&self.config.system_prompt, &memory),
        };
        self.engine.open(options).await
    }

    /// Send one turn and consume events until `Final`.
    async fn drive(
        &self,
        handle: &mut E::Session,
        input: EngineInput,
        message: &InboundMessage,
    ) -> Result<TurnOutput, EngineError> {
        handle.send(input).await?;

        let mut stream = handle.receive();
        let mut partial = String::new();
        let mut tools_used = Vec::new();

        while let Some(event) = stream.next().await {
            match event? {
                EngineEvent::SystemInit { session_id, model } => {
                    debug!(engine_session = %session_id, model = ?model, "engine session initialised");
                }
                EngineEvent::AssistantPartial { text } => partial.push_str(&text),
                EngineEvent::ToolInvocation { id, name, input } => {
                    debug!(tool_use_id = %id, tool = %name, "tool invoked");
                    if self.config.send_progress {
                        self.bus.publish_outbound(
                            OutboundMessage::reply_to(message, tool_hint(&name, &input))
                                .as_progress(),
                        );
                    }
                    tools_used.push(name);
                }
                EngineEvent::ToolResult {
                    tool_use_id,
                    is_error,
                    ..
                } => {
                    debug!(tool_use_id = %tool_use_id, is_error, "tool result");
                }
                EngineEvent::Final {
                    text,
                    usage,
                    is_error,
                } => {
                    if is_error {
                        return Err(EngineError::Reported(text));
                    }
                    info!(
                        input_tokens = usage.input_tokens,
                        output_tokens = usage.output_tokens,
                        tools = tools_used.len(),
                        "turn completed"
                    );
                    let text = if text.is_empty() { partial } else { text };
                    return Ok(TurnOutput { text, tools_used });
                }
            }
        }
        Err(EngineError::StreamEnded)
    }

    fn take_handle(&self, key: &str) -> Option<E::Session> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    fn put_handle(&self, key: &str, handle: E::Session) {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), handle);
    }

    async fn close_handle(&self, key: &str) {
        if let Some(mut handle) = self.take_handle(key) {
            handle.close().await;
            debug!(session_key = key, "engine handle closed");
        }
    }

    /// Close every live engine handle. Called on host shutdown.
    pub async fn close_all(&self) {
        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();
        for (_, mut handle) in handles {
            handle.close().await;
        }
    }

    /// Number of live engine handles.
    pub fn live_handles(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn reply(&self, message: &InboundMessage, content: impl Into<String>) {
        self.bus
            .publish_outbound(OutboundMessage::reply_to(message, content));
    }
}

impl<R, M, E> MessageProcessor for SessionOrchestrator<R, M, E>
where
    R: SessionLogRepository + 'static,
    M: MemoryRepository + 'static,
    E: ExecutionEngine + 'static,
{
    async fn process(&self, message: InboundMessage, _cancel: CancellationToken) {
        if let Err(e) = self.handle_message(&message).await {
            error!(
                session_key = %message.session_key(),
                error = %e,
                "failed to handle message"
            );
            self.reply(&message, APOLOGY_TEXT);
        }
    }
}
