//! Strictly sequential consolidation of conversation turns.
//!
//! All consolidations in the process pass through one FIFO gate (a fair
//! `tokio::sync::Mutex`). A caller reserves a [`ConsolidationSlot`] and holds
//! it across read-memory, summarize, and apply, so a later consolidation
//! always sees the memory written by the one before it. The slot is the only
//! code path that writes long-term memory or the history log.

use std::time::Duration;

use courier_types::config::HostConfig;
use courier_types::error::{ConsolidationError, RepositoryError};
use courier_types::llm::CompletionRequest;
use courier_types::memory::ConsolidationResult;
use courier_types::session::ConversationEntry;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::parse::parse_consolidation;
use super::prompt::{CONSOLIDATION_SYSTEM_PROMPT, build_consolidation_prompt};
use super::repository::MemoryRepository;
use crate::llm::BoxLlmProvider;

const CONSOLIDATION_MAX_TOKENS: u32 = 4096;

/// Sequential consolidation worker over a memory repository and a summarizer.
pub struct ConsolidationPipeline<M: MemoryRepository> {
    memory: M,
    summarizer: BoxLlmProvider,
    model: String,
    compress_threshold: usize,
    gate: Mutex<()>,
}

impl<M: MemoryRepository> ConsolidationPipeline<M> {
    pub fn new(memory: M, summarizer: BoxLlmProvider, config: &HostConfig) -> Self {
        Self {
            memory,
            summarizer,
            model: config.summary_model.clone(),
            compress_threshold: config.memory_compress_threshold,
            gate: Mutex::new(()),
        }
    }

    /// Wait for this caller's turn at the gate.
    ///
    /// Slots are granted in the order `reserve` was called.
    pub async fn reserve(&self) -> ConsolidationSlot<'_, M> {
        let guard = self.gate.lock().await;
        ConsolidationSlot {
            pipeline: self,
            _guard: guard,
        }
    }

    /// Reserve a slot and summarize one batch against `current_memory`.
    ///
    /// Nothing is written; use [`ConsolidationSlot::run`] to apply results.
    pub async fn consolidate(
        &self,
        entries: &[ConversationEntry],
        current_memory: &str,
    ) -> Result<ConsolidationResult, ConsolidationError> {
        self.reserve().await.consolidate(entries, current_memory).await
    }

    /// Current long-term memory, read without taking the gate.
    pub async fn read_memory(&self) -> Result<String, RepositoryError> {
        self.memory.read_memory().await
    }
}

impl<M: MemoryRepository> std::fmt::Debug for ConsolidationPipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsolidationPipeline")
            .field("summarizer", &self.summarizer.name())
            .field("model", &self.model)
            .field("compress_threshold", &self.compress_threshold)
            .finish()
    }
}

/// Exclusive access to long-term memory for one consolidation.
///
/// Dropping the slot releases the gate to the next waiter.
pub struct ConsolidationSlot<'a, M: MemoryRepository> {
    pipeline: &'a ConsolidationPipeline<M>,
    _guard: MutexGuard<'a, ()>,
}

impl<M: MemoryRepository> ConsolidationSlot<'_, M> {
    pub async fn read_memory(&self) -> Result<String, RepositoryError> {
        self.pipeline.memory.read_memory().await
    }

    pub async fn write_memory(&self, content: &str) -> Result<(), RepositoryError> {
        self.pipeline.memory.write_memory(content).await
    }

    pub async fn append_history(&self, entry: &str) -> Result<(), RepositoryError> {
        self.pipeline.memory.append_history(entry).await
    }

    /// Summarize `entries` against `current_memory` and parse the response.
    ///
    /// An empty batch returns an empty result without calling the summarizer.
    /// An empty result from a non-empty batch means the response was unusable.
    #[tracing::instrument(name = "consolidate", skip_all, fields(entries = entries.len()))]
    pub async fn consolidate(
        &self,
        entries: &[ConversationEntry],
        current_memory: &str,
    ) -> Result<ConsolidationResult, ConsolidationError> {
        if entries.is_empty() {
            return Ok(ConsolidationResult::default());
        }

        let compress = current_memory.len() > self.pipeline.compress_threshold;
        let request = CompletionRequest {
            model: self.pipeline.model.clone(),
            prompt: build_consolidation_prompt(entries, current_memory, compress),
            system: Some(CONSOLIDATION_SYSTEM_PROMPT.to_string()),
            max_tokens: CONSOLIDATION_MAX_TOKENS,
            temperature: Some(0.0),
        };

        let response = self.pipeline.summarizer.complete(&request).await?;
        debug!(
            compress,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "summarizer responded"
        );
        Ok(parse_consolidation(&response.content))
    }

    /// Read memory, summarize within `deadline`, and apply the result.
    ///
    /// Memory is rewritten only when the update differs from the text read in
    /// this slot, then the history entry is appended. On timeout the
    /// summarizer future is dropped, so a late response is never applied.
    /// Summarizer and memory-write errors leave both documents untouched.
    pub async fn run(
        &self,
        entries: &[ConversationEntry],
        deadline: Duration,
    ) -> Result<ConsolidationResult, ConsolidationError> {
        let current = self.read_memory().await?;

        let result = tokio::time::timeout(deadline, self.consolidate(entries, &current))
            .await
            .map_err(|_| ConsolidationError::Timeout(deadline))??;
        if result.is_empty() {
            return Err(ConsolidationError::Unparseable);
        }

        // Memory before history: a failed memory write leaves no history entry.
        let mut memory_changed = false;
        if let Some(update) = result.memory_update.as_deref() {
            if update != current {
                self.write_memory(update).await?;
                memory_changed = true;
            }
        }
        if let Some(entry) = result.history_entry.as_deref() {
            self.append_history(entry).await?;
        }

        info!(entries = entries.len(), memory_changed, "consolidation applied");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use courier_types::llm::LlmError;

    use super::*;
    use crate::test_support::{InMemoryMemory, ScriptedSummarizer};

    fn turns(n: usize) -> Vec<ConversationEntry> {
        (0..n)
            .map(|i| ConversationEntry::new("user", format!("turn {i}")))
            .collect()
    }

    fn pipeline(
        memory: &InMemoryMemory,
        summarizer: &ScriptedSummarizer,
    ) -> ConsolidationPipeline<InMemoryMemory> {
        ConsolidationPipeline::new(
            memory.clone(),
            BoxLlmProvider::new(summarizer.clone()),
            &HostConfig::default(),
        )
    }

    #[tokio::test]
    async fn empty_batch_skips_summarizer() {
        let memory = InMemoryMemory::new();
        let summarizer = ScriptedSummarizer::new();
        let pipeline = pipeline(&memory, &summarizer);

        let result = pipeline.consolidate(&[], "anything").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(summarizer.call_count(), 0);
    }

    #[tokio::test]
    async fn run_applies_history_and_memory() {
        let memory = InMemoryMemory::with_memory("Old facts.");
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply(r#"{"history_entry":"[t] Talked.","memory_update":"New facts."}"#);
        let pipeline = pipeline(&memory, &summarizer);

        let slot = pipeline.reserve().await;
        let result = slot.run(&turns(3), Duration::from_secs(1)).await.unwrap();
        drop(slot);

        assert_eq!(result.history_entry.as_deref(), Some("[t] Talked."));
        assert_eq!(memory.memory(), "New facts.");
        assert_eq!(memory.history_entries(), vec!["[t] Talked.".to_string()]);

        let prompt = &summarizer.prompts()[0];
        assert!(prompt.contains("Old facts."));
        assert!(prompt.contains("USER: turn 2"));
    }

    #[tokio::test]
    async fn unchanged_memory_is_not_rewritten() {
        let memory = InMemoryMemory::with_memory("Same.");
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply(r#"{"history_entry":"H","memory_update":"Same."}"#);
        let pipeline = pipeline(&memory, &summarizer);

        pipeline
            .reserve()
            .await
            .run(&turns(1), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(memory.memory_writes(), 0);
    }

    #[tokio::test]
    async fn unparseable_response_writes_nothing() {
        let memory = InMemoryMemory::with_memory("Keep.");
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply("Sorry, I cannot help with that.");
        let pipeline = pipeline(&memory, &summarizer);

        let err = pipeline
            .reserve()
            .await
            .run(&turns(2), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsolidationError::Unparseable));
        assert_eq!(memory.memory(), "Keep.");
        assert!(memory.history_entries().is_empty());
    }

    #[tokio::test]
    async fn failed_memory_write_appends_no_history() {
        let memory = InMemoryMemory::with_memory("Keep.");
        memory.fail_memory_writes();
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply(r#"{"history_entry":"H","memory_update":"Changed."}"#);
        let pipeline = pipeline(&memory, &summarizer);

        let err = pipeline
            .reserve()
            .await
            .run(&turns(2), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsolidationError::Repository(_)));
        assert_eq!(memory.memory(), "Keep.");
        assert!(memory.history_entries().is_empty());
    }

    #[tokio::test]
    async fn summarizer_error_is_surfaced() {
        let memory = InMemoryMemory::new();
        let summarizer = ScriptedSummarizer::new();
        summarizer.fail(LlmError::Overloaded("busy".into()));
        let pipeline = pipeline(&memory, &summarizer);

        let err = pipeline
            .reserve()
            .await
            .run(&turns(2), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsolidationError::Summarizer(_)));
    }

    #[tokio::test]
    async fn timeout_drops_late_result() {
        let memory = InMemoryMemory::with_memory("Original.");
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply_after(
            Duration::from_millis(500),
            r#"{"history_entry":"late","memory_update":"late memory"}"#,
        );
        let pipeline = pipeline(&memory, &summarizer);

        let err = pipeline
            .reserve()
            .await
            .run(&turns(2), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ConsolidationError::Timeout(_)));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(memory.memory(), "Original.");
        assert!(memory.history_entries().is_empty());
    }

    #[tokio::test]
    async fn compression_instruction_above_threshold() {
        let memory = InMemoryMemory::with_memory(&"m".repeat(9000));
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply(r#"{"history_entry":"H"}"#);
        let pipeline = pipeline(&memory, &summarizer);

        pipeline
            .reserve()
            .await
            .run(&turns(1), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(summarizer.prompts()[0].contains("compress it"));
    }

    #[tokio::test]
    async fn concurrent_consolidations_read_previous_write() {
        let memory = InMemoryMemory::with_memory("M0");
        let summarizer = ScriptedSummarizer::new();
        summarizer.reply_after(
            Duration::from_millis(100),
            r#"{"history_entry":"first","memory_update":"M1"}"#,
        );
        summarizer.reply(r#"{"history_entry":"second","memory_update":"M2"}"#);
        let pipeline = Arc::new(pipeline(&memory, &summarizer));

        let first = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let slot = pipeline.reserve().await;
                slot.run(&turns(2), Duration::from_secs(2)).await
            })
        };
        // Let the first task take the gate.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let slot = pipeline.reserve().await;
                slot.run(&turns(2), Duration::from_secs(2)).await
            })
        };

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let prompts = summarizer.prompts();
        assert!(prompts[0].contains("M0"));
        assert!(prompts[1].contains("M1"));
        assert_eq!(memory.memory(), "M2");
        assert_eq!(
            memory.history_entries(),
            vec!["first".to_string(), "second".to_string()]
        );
    }
}
