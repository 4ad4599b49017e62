//! Session and turn types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

use relay_core::{Role, Route};

use crate::context::ResultContext;

/// One message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// Monotonic per session; never reused, not reset by `clear`.
    pub sequence_no: u64,
    pub at: DateTime<Utc>,
}

/// A clarifying question the previous turn asked and the user has not
/// answered yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDisambiguation {
    /// The query as the user first typed it.
    pub original_query: String,
    /// The vague term the question was about (e.g. "quantity").
    pub ambiguous_term: String,
    /// Collaborator that receives the resolved query.
    pub route: Route,
}

/// Per-conversation state.
///
/// Only [`crate::SessionStore`] mutates sessions; callers receive clones.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub history: Vec<Turn>,
    pub last_route: Option<Route>,
    pub pending_disambiguation: Option<PendingDisambiguation>,
    pub last_result_context: Option<ResultContext>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: Instant,
    next_sequence: u64,
}

impl Session {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            history: Vec::new(),
            last_route: None,
            pending_disambiguation: None,
            last_result_context: None,
            created_at: Utc::now(),
            last_accessed: Instant::now(),
            next_sequence: 0,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }

    /// Strictly longer than `ttl` since the last access.
    pub(crate) fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_accessed) > ttl
    }

    /// Append a turn, then drop the oldest turns beyond `max_turns`.
    pub(crate) fn push_turn(&mut self, role: Role, text: String, max_turns: usize) {
        self.history.push(Turn {
            role,
            text,
            sequence_no: self.next_sequence,
            at: Utc::now(),
        });
        self.next_sequence += 1;

        if self.history.len() > max_turns {
            let excess = self.history.len() - max_turns;
            self.history.drain(..excess);
        }
    }

    /// Reset conversational state while keeping the session alive.
    pub(crate) fn reset(&mut self) {
        self.history.clear();
        self.last_route = None;
        self.pending_disambiguation = None;
        self.last_result_context = None;
    }

    /// User questions in insertion order.
    pub fn user_questions(&self) -> impl Iterator<Item = &str> {
        self.history
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }
}

/// Lightweight listing entry for a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub turns: usize,
    pub last_route: Option<Route>,
    pub pending: bool,
    pub idle_secs: u64,
}

impl SessionSummary {
    pub(crate) fn of(session: &Session, now: Instant) -> Self {
        Self {
            id: session.id.clone(),
            turns: session.history.len(),
            last_route: session.last_route,
            pending: session.pending_disambiguation.is_some(),
            idle_secs: now.saturating_duration_since(session.last_accessed).as_secs(),
        }
    }
}
