//! In-memory fakes for the core ports.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use courier_types::engine::{EngineEvent, EngineInput, EngineOptions, EngineUsage};
use courier_types::error::{ChannelError, EngineError, RepositoryError};
use courier_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};
use courier_types::message::{InboundMessage, OutboundMessage};
use courier_types::session::{ConversationEntry, Session, SessionMetadata};
use tokio_util::sync::CancellationToken;

use crate::channel::Channel;
use crate::engine::{EngineEventStream, EngineSession, ExecutionEngine};
use crate::llm::LlmProvider;
use crate::memory::MemoryRepository;
use crate::message::MessageProcessor;
use crate::session::SessionLogRepository;

// ---------------------------------------------------------------------------
// Session log
// ---------------------------------------------------------------------------

type Log = (SessionMetadata, Vec<ConversationEntry>);

#[derive(Clone, Default)]
pub struct InMemorySessionLog {
    logs: Arc<Mutex<HashMap<String, Log>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemorySessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, key: &str) -> bool {
        self.logs.lock().unwrap().contains_key(key)
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

impl SessionLogRepository for InMemorySessionLog {
    async fn load(&self, key: &str) -> Result<Option<Session>, RepositoryError> {
        let logs = self.logs.lock().unwrap();
        Ok(logs
            .get(key)
            .map(|(meta, msgs)| Session::from_records(meta.clone(), msgs.clone())))
    }

    async fn append(
        &self,
        metadata: &SessionMetadata,
        entry: &ConversationEntry,
    ) -> Result<(), RepositoryError> {
        self.check_writable()?;
        let mut logs = self.logs.lock().unwrap();
        logs.entry(metadata.key.clone())
            .or_insert_with(|| (metadata.clone(), Vec::new()))
            .1
            .push(entry.clone());
        Ok(())
    }

    async fn rewrite(&self, session: &Session) -> Result<(), RepositoryError> {
        self.check_writable()?;
        self.logs.lock().unwrap().insert(
            session.key.clone(),
            (session.metadata(), session.messages.clone()),
        );
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.logs.lock().unwrap().keys().cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Memory documents
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryState {
    memory: String,
    history: Vec<String>,
    memory_writes: usize,
    fail_memory_writes: bool,
}

#[derive(Clone, Default)]
pub struct InMemoryMemory {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory(memory: &str) -> Self {
        let repo = Self::new();
        repo.set_memory(memory);
        repo
    }

    pub fn set_memory(&self, memory: &str) {
        self.state.lock().unwrap().memory = memory.to_string();
    }

    pub fn memory(&self) -> String {
        self.state.lock().unwrap().memory.clone()
    }

    pub fn history_entries(&self) -> Vec<String> {
        self.state.lock().unwrap().history.clone()
    }

    pub fn memory_writes(&self) -> usize {
        self.state.lock().unwrap().memory_writes
    }

    /// Make every later `write_memory` fail with an I/O error.
    pub fn fail_memory_writes(&self) {
        self.state.lock().unwrap().fail_memory_writes = true;
    }
}

impl MemoryRepository for InMemoryMemory {
    async fn read_memory(&self) -> Result<String, RepositoryError> {
        Ok(self.memory())
    }

    async fn write_memory(&self, content: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_memory_writes {
            return Err(std::io::Error::other("memory document is read-only").into());
        }
        state.memory = content.to_string();
        state.memory_writes += 1;
        Ok(())
    }

    async fn append_history(&self, entry: &str) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().history.push(entry.to_string());
        Ok(())
    }

    async fn read_history(&self) -> Result<String, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .history
            .iter()
            .map(|entry| format!("{entry}\n\n"))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Summarizer
// ---------------------------------------------------------------------------

struct ScriptedReply {
    delay: Duration,
    reply: Result<String, LlmError>,
}

#[derive(Default)]
struct SummarizerState {
    replies: VecDeque<ScriptedReply>,
    prompts: Vec<String>,
}

/// Summarizer that answers from a script, in order.
#[derive(Clone, Default)]
pub struct ScriptedSummarizer {
    state: Arc<Mutex<SummarizerState>>,
}

impl ScriptedSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, content: &str) {
        self.reply_after(Duration::ZERO, content);
    }

    pub fn reply_after(&self, delay: Duration, content: &str) {
        self.state.lock().unwrap().replies.push_back(ScriptedReply {
            delay,
            reply: Ok(content.to_string()),
        });
    }

    pub fn fail(&self, error: LlmError) {
        self.state.lock().unwrap().replies.push_back(ScriptedReply {
            delay: Duration::ZERO,
            reply: Err(error),
        });
    }

    pub fn prompts(&self) -> Vec<String> {
        self.state.lock().unwrap().prompts.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().prompts.len()
    }
}

impl LlmProvider for ScriptedSummarizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let scripted = {
            let mut state = self.state.lock().unwrap();
            state.prompts.push(request.prompt.clone());
            state.replies.pop_front()
        };
        let Some(scripted) = scripted else {
            return Err(LlmError::Provider {
                message: "no scripted reply".into(),
            });
        };

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }
        scripted.reply.map(|content| CompletionResponse {
            content,
            model: request.model.clone(),
            usage: Usage::default(),
        })
    }
}

// ---------------------------------------------------------------------------
// Execution engine
// ---------------------------------------------------------------------------

type ScriptedTurn = Vec<Result<EngineEvent, EngineError>>;

#[derive(Default)]
struct EngineState {
    turns: VecDeque<ScriptedTurn>,
    opened: Vec<EngineOptions>,
    inputs: Vec<EngineInput>,
    closes: usize,
}

/// Engine whose turns come from a script. Unscripted turns echo the input.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_turn(&self, events: ScriptedTurn) {
        self.state.lock().unwrap().turns.push_back(events);
    }

    pub fn opened(&self) -> Vec<EngineOptions> {
        self.state.lock().unwrap().opened.clone()
    }

    pub fn inputs(&self) -> Vec<EngineInput> {
        self.state.lock().unwrap().inputs.clone()
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

impl ExecutionEngine for ScriptedEngine {
    type Session = ScriptedSession;

    async fn open(&self, options: EngineOptions) -> Result<ScriptedSession, EngineError> {
        self.state.lock().unwrap().opened.push(options);
        Ok(ScriptedSession {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
            closed: false,
        })
    }
}

pub struct ScriptedSession {
    state: Arc<Mutex<EngineState>>,
    pending: ScriptedTurn,
    closed: bool,
}

impl EngineSession for ScriptedSession {
    async fn send(&mut self, input: EngineInput) -> Result<(), EngineError> {
        let mut state = self.state.lock().unwrap();
        self.pending = state.turns.pop_front().unwrap_or_else(|| {
            vec![Ok(EngineEvent::Final {
                text: format!("echo: {}", input.text()),
                usage: EngineUsage::default(),
                is_error: false,
            })]
        });
        state.inputs.push(input);
        Ok(())
    }

    fn receive(&mut self) -> EngineEventStream<'_> {
        Box::pin(futures_util::stream::iter(std::mem::take(&mut self.pending)))
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.lock().unwrap().closes += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct RecordingChannel {
    name: String,
    fail: bool,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fail: false,
            sent: Arc::default(),
            attempts: Arc::default(),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ChannelError::Delivery("connection reset".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Message processor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ProcessorState {
    delays: HashMap<String, Duration>,
    started: Vec<String>,
    completed: Vec<String>,
}

/// Records `"{session_key}/{content}"` when a message starts and finishes.
#[derive(Clone, Default)]
pub struct RecordingProcessor {
    state: Arc<Mutex<ProcessorState>>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make messages with exactly this content take `delay` to process.
    pub fn delay_on(&self, content: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert(content.to_string(), delay);
    }

    pub fn started(&self) -> Vec<String> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn completed(&self) -> Vec<String> {
        self.state.lock().unwrap().completed.clone()
    }
}

impl MessageProcessor for RecordingProcessor {
    async fn process(&self, message: InboundMessage, _cancel: CancellationToken) {
        let label = format!("{}/{}", message.session_key(), message.content);
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.started.push(label.clone());
            state.delays.get(&message.content).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().unwrap().completed.push(label);
    }
}
