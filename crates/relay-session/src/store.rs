//! Concurrent per-conversation state.
//!
//! The store is a map of session id to a per-session mutex, guarded by a
//! read-write lock. Operations on an existing session take the map read lock
//! plus that session's mutex, so different sessions never contend. The map
//! write lock is taken only to create or remove sessions.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};

use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use relay_core::config::SessionConfig;
use relay_core::{Role, Route};

use crate::context::ResultContext;
use crate::session::{PendingDisambiguation, Session, SessionSummary};

/// Thread-safe owner of every [`Session`].
///
/// Sessions are created on first access and every access refreshes their
/// idle timer. Eviction is driven by [`crate::SessionJanitor`].
pub struct SessionStore {
    config: SessionConfig,
    sessions: RwLock<HashMap<String, Mutex<Session>>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.config.ttl_secs)
    }

    /// Clone of the session, creating an empty one if absent.
    pub fn get_or_create(&self, session_id: &str) -> Session {
        self.with_session(session_id, |s| s.clone())
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Record a user message, truncated to `max_user_chars`.
    pub fn append_user(&self, session_id: &str, text: &str) {
        let text = truncate_chars(text, self.config.max_user_chars);
        let max_turns = self.config.max_turns;
        self.with_session(session_id, |s| s.push_turn(Role::User, text, max_turns));
    }

    /// Record an agent reply, truncated to `max_agent_chars`.
    pub fn append_agent(&self, session_id: &str, text: &str) {
        let text = truncate_chars(text, self.config.max_agent_chars);
        let max_turns = self.config.max_turns;
        self.with_session(session_id, |s| s.push_turn(Role::Agent, text, max_turns));
    }

    /// History as `"User: ...\nAgent: ..."`, empty for a new session.
    pub fn render_history(&self, session_id: &str) -> String {
        self.with_session(session_id, |s| {
            s.history
                .iter()
                .map(|t| format!("{}: {}", t.role.label(), t.text))
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    /// The most recent user question, if any.
    pub fn last_user_question(&self, session_id: &str) -> Option<String> {
        self.with_session(session_id, |s| s.user_questions().last().map(str::to_string))
    }

    /// Up to `n` most recent user questions, oldest first.
    pub fn recent_user_questions(&self, session_id: &str, n: usize) -> Vec<String> {
        self.with_session(session_id, |s| {
            let questions: Vec<&str> = s.user_questions().collect();
            let start = questions.len().saturating_sub(n);
            questions[start..].iter().map(|q| q.to_string()).collect()
        })
    }

    // =========================================================================
    // Routing state
    // =========================================================================

    /// Remember the route that last answered. Meta and out-of-scope routes
    /// are not remembered.
    pub fn set_route(&self, session_id: &str, route: Route) {
        if !route.is_answering() {
            debug!(session = %session_id, route = %route, "Not recording non-answering route");
            return;
        }
        self.with_session(session_id, |s| s.last_route = Some(route));
    }

    pub fn get_route(&self, session_id: &str) -> Option<Route> {
        self.with_session(session_id, |s| s.last_route)
    }

    pub fn set_pending_disambiguation(&self, session_id: &str, pending: PendingDisambiguation) {
        self.with_session(session_id, |s| s.pending_disambiguation = Some(pending));
    }

    pub fn get_pending_disambiguation(&self, session_id: &str) -> Option<PendingDisambiguation> {
        self.with_session(session_id, |s| s.pending_disambiguation.clone())
    }

    pub fn has_pending_disambiguation(&self, session_id: &str) -> bool {
        self.with_session(session_id, |s| s.pending_disambiguation.is_some())
    }

    pub fn clear_pending_disambiguation(&self, session_id: &str) {
        self.with_session(session_id, |s| s.pending_disambiguation = None);
    }

    /// Remove and return the pending clarification in one step, so two
    /// concurrent replies cannot both consume it.
    pub fn take_pending_disambiguation(&self, session_id: &str) -> Option<PendingDisambiguation> {
        self.with_session(session_id, |s| s.pending_disambiguation.take())
    }

    // =========================================================================
    // Result context
    // =========================================================================

    pub fn set_result_context(&self, session_id: &str, context: ResultContext) {
        self.with_session(session_id, |s| s.last_result_context = Some(context));
    }

    pub fn get_result_context(&self, session_id: &str) -> Option<ResultContext> {
        self.with_session(session_id, |s| s.last_result_context.clone())
    }

    /// The stored result context rendered for a prompt, empty when none.
    pub fn render_context_summary(&self, session_id: &str) -> String {
        self.with_session(session_id, |s| {
            s.last_result_context
                .as_ref()
                .map(ResultContext::render)
                .unwrap_or_default()
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Reset history, route, pending clarification, and result context.
    /// The session itself stays alive.
    pub fn clear(&self, session_id: &str) {
        self.with_session(session_id, Session::reset);
        info!(session = %session_id, "Session cleared");
    }

    /// Drop a session entirely. Returns whether it existed.
    pub fn delete(&self, session_id: &str) -> bool {
        let removed = self.write_map().remove(session_id).is_some();
        if removed {
            info!(session = %session_id, "Session deleted");
        }
        removed
    }

    /// Clone of a session's full state without creating it.
    pub fn snapshot(&self, session_id: &str) -> Option<Session> {
        let map = self.read_map();
        map.get(session_id).map(|entry| lock(entry).clone())
    }

    pub fn list_sessions(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_map().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.read_map().len()
    }

    /// Listing entries for every live session, sorted by id.
    pub fn summaries(&self) -> Vec<SessionSummary> {
        let now = Instant::now();
        let map = self.read_map();
        let mut out: Vec<SessionSummary> = map
            .values()
            .map(|entry| SessionSummary::of(&lock(entry), now))
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    /// Remove every session idle for longer than the TTL. Returns how many
    /// were removed.
    ///
    /// Candidates are collected under the read lock; each is then re-checked
    /// and removed under the write lock, so a session touched in between
    /// survives.
    pub fn evict_expired(&self) -> usize {
        let ttl = self.ttl();
        let now = Instant::now();

        let expired: Vec<String> = {
            let map = self.read_map();
            map.iter()
                .filter(|(_, entry)| lock(entry).is_expired(now, ttl))
                .map(|(id, _)| id.clone())
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }

        let mut map = self.write_map();
        let mut removed = 0;
        for id in expired {
            let still_expired = map
                .get_mut(&id)
                .map(|entry| {
                    entry
                        .get_mut()
                        .unwrap_or_else(PoisonError::into_inner)
                        .is_expired(Instant::now(), ttl)
                })
                .unwrap_or(false);
            if still_expired {
                map.remove(&id);
                removed += 1;
                debug!(session = %id, "Evicted idle session");
            }
        }
        removed
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run `f` against the session, creating it if absent and refreshing its
    /// idle timer.
    fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        {
            let map = self.read_map();
            if let Some(entry) = map.get(session_id) {
                let mut session = lock(entry);
                session.touch();
                return f(&mut *session);
            }
        }

        let mut map = self.write_map();
        let entry = map.entry(session_id.to_string()).or_insert_with(|| {
            debug!(session = %session_id, "Creating session");
            Mutex::new(Session::new(session_id))
        });
        let session = entry.get_mut().unwrap_or_else(PoisonError::into_inner);
        session.touch();
        f(session)
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Mutex<Session>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Mutex<Session>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock(entry: &Mutex<Session>) -> std::sync::MutexGuard<'_, Session> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keep at most `max` characters, respecting char boundaries.
fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn small_store(max_turns: usize) -> SessionStore {
        SessionStore::new(SessionConfig {
            max_turns,
            ..SessionConfig::default()
        })
    }

    // ---- History ----

    #[test]
    fn test_render_history_new_session_is_empty() {
        let store = SessionStore::default();
        assert_eq!(store.render_history("fresh"), "");
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_render_history_format() {
        let store = SessionStore::default();
        store.append_user("s", "How many waybills today?");
        store.append_agent("s", "There are 42.");
        assert_eq!(
            store.render_history("s"),
            "User: How many waybills today?\nAgent: There are 42."
        );
    }

    #[test]
    fn test_history_trimmed_to_max_turns() {
        let store = SessionStore::default();
        for i in 0..60 {
            store.append_user("s", &format!("q{}", i));
        }
        let session = store.snapshot("s").unwrap();
        assert_eq!(session.history.len(), 50);
        assert_eq!(session.history[0].text, "q10");
        assert_eq!(session.history[49].text, "q59");
    }

    #[test]
    fn test_user_text_truncated_by_chars() {
        let store = SessionStore::new(SessionConfig {
            max_user_chars: 4,
            max_agent_chars: 2,
            ..SessionConfig::default()
        });
        store.append_user("s", "كمية الطلب");
        store.append_agent("s", "abcdef");
        let session = store.snapshot("s").unwrap();
        assert_eq!(session.history[0].text, "كمية");
        assert_eq!(session.history[1].text, "ab");
    }

    #[test]
    fn test_last_and_recent_user_questions() {
        let store = SessionStore::default();
        assert!(store.last_user_question("s").is_none());

        store.append_user("s", "q1");
        store.append_agent("s", "a1");
        store.append_user("s", "q2");
        store.append_agent("s", "a2");
        store.append_user("s", "q3");

        assert_eq!(store.last_user_question("s").as_deref(), Some("q3"));
        assert_eq!(store.recent_user_questions("s", 2), vec!["q2", "q3"]);
        assert_eq!(store.recent_user_questions("s", 10).len(), 3);
    }

    // ---- Routing state ----

    #[test]
    fn test_route_round_trip() {
        let store = SessionStore::default();
        assert!(store.get_route("s").is_none());
        store.set_route("s", Route::Csv);
        assert_eq!(store.get_route("s"), Some(Route::Csv));
    }

    #[test]
    fn test_non_answering_routes_not_recorded() {
        let store = SessionStore::default();
        store.set_route("s", Route::Sql);
        store.set_route("s", Route::Meta);
        store.set_route("s", Route::OutOfScope);
        assert_eq!(store.get_route("s"), Some(Route::Sql));
    }

    #[test]
    fn test_pending_disambiguation_lifecycle() {
        let store = SessionStore::default();
        let pending = PendingDisambiguation {
            original_query: "show quantity for ACME".into(),
            ambiguous_term: "quantity".into(),
            route: Route::Sql,
        };
        store.set_pending_disambiguation("s", pending.clone());
        assert!(store.has_pending_disambiguation("s"));
        assert_eq!(store.get_pending_disambiguation("s"), Some(pending.clone()));

        assert_eq!(store.take_pending_disambiguation("s"), Some(pending));
        assert!(store.take_pending_disambiguation("s").is_none());

        store.set_pending_disambiguation(
            "s",
            PendingDisambiguation {
                original_query: "q".into(),
                ambiguous_term: "date".into(),
                route: Route::Sql,
            },
        );
        store.clear_pending_disambiguation("s");
        assert!(store.get_pending_disambiguation("s").is_none());
    }

    // ---- Result context ----

    #[test]
    fn test_context_summary_empty_without_context() {
        let store = SessionStore::default();
        assert_eq!(store.render_context_summary("s"), "");
    }

    #[test]
    fn test_context_summary_renders_stored_context() {
        let store = SessionStore::default();
        store.set_result_context(
            "s",
            ResultContext::Single {
                values: vec![crate::ColumnValue {
                    column: "Vendor Name".into(),
                    value: serde_json::json!("ACME"),
                }],
            },
        );
        let summary = store.render_context_summary("s");
        assert!(summary.starts_with("## Previous Query Result Context:"));
        assert!(summary.contains("- Vendor Name: ACME"));
    }

    // ---- Lifecycle ----

    #[test]
    fn test_clear_resets_state_but_keeps_session() {
        let store = SessionStore::default();
        store.append_user("s", "q");
        store.set_route("s", Route::Pdf);
        store.set_pending_disambiguation(
            "s",
            PendingDisambiguation {
                original_query: "q".into(),
                ambiguous_term: "date".into(),
                route: Route::Sql,
            },
        );
        store.clear("s");

        assert_eq!(store.session_count(), 1);
        assert_eq!(store.render_history("s"), "");
        assert!(store.get_route("s").is_none());
        assert!(store.get_pending_disambiguation("s").is_none());
        assert!(store.get_result_context("s").is_none());
    }

    #[test]
    fn test_clear_keeps_sequence_numbers_monotonic() {
        let store = SessionStore::default();
        store.append_user("s", "a");
        store.append_user("s", "b");
        store.clear("s");
        store.append_user("s", "c");
        assert_eq!(store.snapshot("s").unwrap().history[0].sequence_no, 2);
    }

    #[test]
    fn test_delete_and_listing() {
        let store = SessionStore::default();
        store.append_user("b", "q");
        store.append_user("a", "q");
        assert_eq!(store.list_sessions(), vec!["a", "b"]);

        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert_eq!(store.list_sessions(), vec!["b"]);
    }

    #[test]
    fn test_get_or_create_returns_existing_state() {
        let store = SessionStore::default();
        let fresh = store.get_or_create("s");
        assert!(fresh.history.is_empty());

        store.append_user("s", "q");
        let existing = store.get_or_create("s");
        assert_eq!(existing.history.len(), 1);
        assert_eq!(existing.created_at, fresh.created_at);
        assert_eq!(store.session_count(), 1);
    }

    #[test]
    fn test_snapshot_does_not_create() {
        let store = SessionStore::default();
        assert!(store.snapshot("ghost").is_none());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_summaries() {
        let store = SessionStore::default();
        store.append_user("s", "q");
        store.append_agent("s", "a");
        store.set_route("s", Route::Math);

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "s");
        assert_eq!(summaries[0].turns, 2);
        assert_eq!(summaries[0].last_route, Some(Route::Math));
        assert!(!summaries[0].pending);
    }

    // ---- Expiry ----

    #[tokio::test(start_paused = true)]
    async fn test_evict_expired_removes_idle_sessions() {
        let store = SessionStore::new(SessionConfig {
            ttl_secs: 60,
            ..SessionConfig::default()
        });
        store.append_user("old", "q");
        tokio::time::advance(Duration::from_secs(45)).await;
        store.append_user("young", "q");
        tokio::time::advance(Duration::from_secs(16)).await;

        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.list_sessions(), vec!["young"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_access_refreshes_idle_timer() {
        let store = SessionStore::new(SessionConfig {
            ttl_secs: 60,
            ..SessionConfig::default()
        });
        store.append_user("s", "q");
        tokio::time::advance(Duration::from_secs(50)).await;
        let _ = store.get_route("s");
        tokio::time::advance(Duration::from_secs(50)).await;

        assert_eq!(store.evict_expired(), 0);
        assert_eq!(store.session_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_exactly_at_ttl_is_kept() {
        let store = SessionStore::new(SessionConfig {
            ttl_secs: 60,
            ..SessionConfig::default()
        });
        store.append_user("s", "q");
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(store.evict_expired(), 0);
    }

    // ---- Concurrency ----

    #[test]
    fn test_concurrent_appends_same_session() {
        let store = Arc::new(small_store(50));
        std::thread::scope(|scope| {
            for i in 0..32 {
                let store = Arc::clone(&store);
                scope.spawn(move || store.append_user("shared", &format!("q{}", i)));
            }
        });
        let session = store.snapshot("shared").unwrap();
        assert_eq!(session.history.len(), 32);

        let mut seqs: Vec<u64> = session.history.iter().map(|t| t.sequence_no).collect();
        seqs.sort_unstable();
        seqs.dedup();
        assert_eq!(seqs.len(), 32);
    }

    #[test]
    fn test_concurrent_appends_respect_cap() {
        let store = Arc::new(small_store(50));
        std::thread::scope(|scope| {
            for t in 0..8 {
                let store = Arc::clone(&store);
                scope.spawn(move || {
                    for i in 0..20 {
                        store.append_user("shared", &format!("t{}-{}", t, i));
                    }
                });
            }
        });
        assert_eq!(store.snapshot("shared").unwrap().history.len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sessions_are_isolated() {
        let store = Arc::new(SessionStore::default());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let id = format!("session-{}", i);
                store.append_user(&id, "hello");
                store.set_route(&id, Route::Sql);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.session_count(), 16);
        for summary in store.summaries() {
            assert_eq!(summary.turns, 1);
            assert_eq!(summary.last_route, Some(Route::Sql));
        }
    }

    // ---- Helpers ----

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("", 3), "");
        assert_eq!(truncate_chars("مدة", 2), "مد");
    }
}
