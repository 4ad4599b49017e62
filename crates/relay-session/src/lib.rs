//! Conversation state for relay.
//!
//! Owns every per-conversation [`Session`] behind a concurrent
//! [`SessionStore`], turns collaborator output into compact
//! [`ResultContext`] summaries for follow-up questions, and evicts idle
//! sessions from a background [`SessionJanitor`].

pub mod context;
pub mod janitor;
pub mod session;
pub mod store;

pub use context::{ColumnValue, ContextExtractor, KeyColumn, KeyValue, ResultContext};
pub use janitor::{JanitorHandle, SessionJanitor};
pub use session::{PendingDisambiguation, Session, SessionSummary, Turn};
pub use store::SessionStore;
