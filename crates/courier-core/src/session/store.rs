//! Session store: cached, write-through access to per-conversation logs.
//!
//! The durable log owned by the [`SessionLogRepository`] is the source of
//! truth; the in-memory cache mirrors it. Every mutation is written to the
//! repository before the cache changes, so a failed write never leaves the
//! cache ahead of disk.
//!
//! The store does not serialize concurrent mutation of the same key. The
//! dispatcher guarantees at most one in-flight step per key.

use courier_types::error::RepositoryError;
use courier_types::session::{ConversationEntry, Session};
use dashmap::DashMap;
use tracing::debug;

use super::repository::SessionLogRepository;

/// Per-conversation session state with a write-through cache.
pub struct SessionStore<R: SessionLogRepository> {
    repo: R,
    cache: DashMap<String, Session>,
}

impl<R: SessionLogRepository> SessionStore<R> {
    /// Create a store over the given log repository.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            cache: DashMap::new(),
        }
    }

    /// Make sure `key` is cached, loading it from the log or creating it empty.
    async fn ensure_loaded(&self, key: &str) -> Result<(), RepositoryError> {
        if self.cache.contains_key(key) {
            return Ok(());
        }

        let session = match self.repo.load(key).await? {
            Some(session) => {
                debug!(session_key = key, messages = session.messages.len(), "loaded session log");
                session
            }
            None => Session::new(key),
        };
        self.cache.entry(key.to_string()).or_insert(session);
        Ok(())
    }

    /// Snapshot of the current session state.
    fn snapshot(&self, key: &str) -> Session {
        self.cache
            .get(key)
            .map(|s| s.clone())
            .unwrap_or_else(|| Session::new(key))
    }

    /// Return the session for `key`, loading it on first access.
    pub async fn get(&self, key: &str) -> Result<Session, RepositoryError> {
        self.ensure_loaded(key).await?;
        Ok(self.snapshot(key))
    }

    /// Append a turn stamped with the current time.
    pub async fn append(&self, key: &str, role: &str, content: &str) -> Result<(), RepositoryError> {
        self.append_entry(key, ConversationEntry::new(role, content))
            .await
    }

    /// Append a prepared turn to the log and the cache.
    pub async fn append_entry(
        &self,
        key: &str,
        entry: ConversationEntry,
    ) -> Result<(), RepositoryError> {
        self.ensure_loaded(key).await?;

        let metadata = self.snapshot(key).metadata();
        self.repo.append(&metadata, &entry).await?;

        if let Some(mut session) = self.cache.get_mut(key) {
            session.messages.push(entry);
        }
        Ok(())
    }

    /// Reset the conversation to empty with a fresh `created_at`.
    pub async fn clear(&self, key: &str) -> Result<(), RepositoryError> {
        self.ensure_loaded(key).await?;

        let mut session = self.snapshot(key);
        session.clear();
        self.repo.rewrite(&session).await?;
        self.cache.insert(key.to_string(), session);

        debug!(session_key = key, "session cleared");
        Ok(())
    }

    /// Keep `messages[cutoff..]`, reset `last_consolidated` to 0, and rewrite
    /// the log. `created_at` is preserved.
    pub async fn trim_before(&self, key: &str, cutoff: usize) -> Result<(), RepositoryError> {
        self.ensure_loaded(key).await?;

        let mut session = self.snapshot(key);
        let before = session.messages.len();
        session.trim_before(cutoff);
        self.repo.rewrite(&session).await?;

        debug!(
            session_key = key,
            cutoff,
            before,
            after = session.messages.len(),
            "session trimmed"
        );
        self.cache.insert(key.to_string(), session);
        Ok(())
    }

    /// Advance the consolidation marker and persist it.
    ///
    /// The index is clamped to the current message count.
    pub async fn update_consolidated(&self, key: &str, index: usize) -> Result<(), RepositoryError> {
        self.ensure_loaded(key).await?;

        let mut session = self.snapshot(key);
        session.last_consolidated = index.min(session.messages.len());
        self.repo.rewrite(&session).await?;
        self.cache.insert(key.to_string(), session);
        Ok(())
    }

    /// Current number of messages in the session.
    pub async fn message_count(&self, key: &str) -> Result<usize, RepositoryError> {
        self.ensure_loaded(key).await?;
        Ok(self.cache.get(key).map(|s| s.messages.len()).unwrap_or(0))
    }

    /// Conversation keys with a durable log.
    pub async fn list_keys(&self) -> Result<Vec<String>, RepositoryError> {
        self.repo.list_keys().await
    }

    /// Drop the cached copy of `key`; the next access reloads from the log.
    pub fn invalidate(&self, key: &str) {
        self.cache.remove(key);
    }
}

impl<R: SessionLogRepository> std::fmt::Debug for SessionStore<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("cached_sessions", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemorySessionLog;

    const KEY: &str = "telegram:42";

    #[tokio::test]
    async fn get_unknown_key_creates_empty_session_without_writing() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());

        let session = store.get(KEY).await.unwrap();
        assert_eq!(session.key, KEY);
        assert!(session.messages.is_empty());
        assert!(!log.exists(KEY));
    }

    #[tokio::test]
    async fn append_increments_count_and_reloads_identically() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());

        store.append(KEY, "user", "hello").await.unwrap();
        store.append(KEY, "assistant", "hi there").await.unwrap();
        assert_eq!(store.message_count(KEY).await.unwrap(), 2);

        let tools = ConversationEntry::new("assistant", "checked").with_tools(vec!["web_search".into()]);
        store.append_entry(KEY, tools).await.unwrap();
        assert_eq!(store.message_count(KEY).await.unwrap(), 3);

        let original = store.get(KEY).await.unwrap();
        let reloaded = SessionStore::new(log).get(KEY).await.unwrap();
        assert_eq!(reloaded.messages, original.messages);
        assert_eq!(reloaded.created_at, original.created_at);
        assert_eq!(
            reloaded.messages[2].tools_used.as_deref(),
            Some(&["web_search".to_string()][..])
        );
    }

    #[tokio::test]
    async fn trim_before_keeps_tail_and_created_at() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());
        for i in 0..10 {
            store.append(KEY, "user", &format!("m{i}")).await.unwrap();
        }
        store.update_consolidated(KEY, 4).await.unwrap();
        let created = store.get(KEY).await.unwrap().created_at;

        store.trim_before(KEY, 6).await.unwrap();

        let reloaded = SessionStore::new(log).get(KEY).await.unwrap();
        let contents: Vec<_> = reloaded.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m6", "m7", "m8", "m9"]);
        assert_eq!(reloaded.last_consolidated, 0);
        assert_eq!(reloaded.created_at, created);
    }

    #[tokio::test]
    async fn clear_resets_created_at_and_messages() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());
        store.append(KEY, "user", "hello").await.unwrap();
        let created = store.get(KEY).await.unwrap().created_at;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.clear(KEY).await.unwrap();

        let reloaded = SessionStore::new(log).get(KEY).await.unwrap();
        assert!(reloaded.messages.is_empty());
        assert_eq!(reloaded.key, KEY);
        assert_ne!(reloaded.created_at, created);
    }

    #[tokio::test]
    async fn update_consolidated_persists_and_clamps() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());
        store.append(KEY, "user", "a").await.unwrap();
        store.append(KEY, "assistant", "b").await.unwrap();

        store.update_consolidated(KEY, 1).await.unwrap();
        assert_eq!(SessionStore::new(log.clone()).get(KEY).await.unwrap().last_consolidated, 1);

        store.update_consolidated(KEY, 99).await.unwrap();
        assert_eq!(store.get(KEY).await.unwrap().last_consolidated, 2);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());
        store.append(KEY, "user", "kept").await.unwrap();

        log.fail_writes(true);
        assert!(store.append(KEY, "user", "lost").await.is_err());
        assert!(store.trim_before(KEY, 1).await.is_err());

        assert_eq!(store.message_count(KEY).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn list_keys_delegates_to_repository() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log);
        store.append("cli:direct", "user", "x").await.unwrap();
        store.append(KEY, "user", "y").await.unwrap();

        let mut keys = store.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cli:direct".to_string(), KEY.to_string()]);
    }

    #[tokio::test]
    async fn invalidate_forces_reload() {
        let log = InMemorySessionLog::new();
        let store = SessionStore::new(log.clone());
        store.append(KEY, "user", "a").await.unwrap();

        // Another writer appends behind the store's back.
        let other = SessionStore::new(log);
        other.append(KEY, "user", "b").await.unwrap();

        assert_eq!(store.message_count(KEY).await.unwrap(), 1);
        store.invalidate(KEY);
        assert_eq!(store.message_count(KEY).await.unwrap(), 2);
    }
}
