//! Request sequencing for relay.
//!
//! Ties the router, the disambiguation round-trip, the answering
//! collaborators, and the visualization selector into a single
//! `handle(query)` call.

pub mod collaborator;
pub mod error;
pub mod orchestrator;

pub use collaborator::{Collaborator, CollaboratorRegistry, CollaboratorReply, CollaboratorRequest};
pub use error::WorkflowError;
pub use orchestrator::{Orchestrator, WorkflowReply};
