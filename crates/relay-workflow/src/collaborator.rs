//! Answering collaborators and their registry.
//!
//! A collaborator is whatever actually produces an answer for a route: a
//! SQL agent, a dataframe agent, document retrieval, a calculator. The
//! workflow treats each one as a black box behind [`Collaborator`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_core::{Route, TableData};

use crate::error::WorkflowError;

/// What a collaborator is asked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorRequest {
    /// The query to answer, already rewritten if a clarification resolved.
    pub query: String,
    pub session_id: String,
    /// Rendered conversation so far, excluding `query`.
    pub history: String,
    /// Rendered summary of the previous result, empty when there is none.
    pub context_summary: String,
}

/// What a collaborator answers.
///
/// Failures travel in `error`; the workflow never interprets them beyond
/// skipping context extraction and charting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CollaboratorReply {
    pub content: String,
    pub sources: Vec<String>,
    pub table: Option<TableData>,
    pub error: Option<String>,
}

impl CollaboratorReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            content: format!("Error: {}", error),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// A downstream answer producer for one route.
#[async_trait]
pub trait Collaborator: Send + Sync {
    /// The route this collaborator answers.
    fn route(&self) -> Route;

    /// Answer a query. Never fails; errors go into [`CollaboratorReply::error`].
    async fn answer(&self, request: &CollaboratorRequest) -> CollaboratorReply;
}

/// Lookup from route to the collaborator that answers it.
#[derive(Default)]
pub struct CollaboratorRegistry {
    collaborators: HashMap<Route, Arc<dyn Collaborator>>,
}

impl CollaboratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collaborator under its route, replacing any previous one.
    ///
    /// Only routes that answer queries (sql, csv, pdf, math) accept one.
    pub fn register(&mut self, collaborator: Arc<dyn Collaborator>) -> Result<(), WorkflowError> {
        let route = collaborator.route();
        if !route.is_answering() {
            return Err(WorkflowError::NotAnswering(route));
        }
        self.collaborators.insert(route, collaborator);
        Ok(())
    }

    pub fn get(&self, route: Route) -> Option<Arc<dyn Collaborator>> {
        self.collaborators.get(&route).cloned()
    }

    /// Registered routes, in a stable order.
    pub fn routes(&self) -> Vec<Route> {
        let mut routes: Vec<Route> = self.collaborators.keys().copied().collect();
        routes.sort_by_key(|r| r.as_str());
        routes
    }
}
