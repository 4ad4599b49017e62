//! Workflow orchestrator.
//!
//! Sequences a single request: validation, meta answers, the clarification
//! round-trip, routing, the collaborator call, and post-processing of the
//! collaborator's result into session context and a chart spec.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use relay_core::config::WorkflowConfig;
use relay_core::{ClassificationResult, Confidence, Route, TableData};
use relay_router::disambiguation::{detect, offer_for, resolve, DisambiguationOffer, Domain};
use relay_router::Router;
use relay_session::{ContextExtractor, PendingDisambiguation, SessionStore};
use relay_viz::VisualizationSpec;

use crate::collaborator::{CollaboratorRegistry, CollaboratorRequest};
use crate::error::WorkflowError;

/// Source label for replies the workflow composes itself.
const SYSTEM_SOURCE: &str = "System";

/// Everything the caller needs to render one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReply {
    pub session_id: String,
    pub route: Route,
    pub content: String,
    pub sources: Vec<String>,
    pub table: Option<TableData>,
    pub visualization: Option<VisualizationSpec>,
    /// Set when the turn is a clarifying question instead of an answer.
    pub disambiguation: Option<DisambiguationOffer>,
    pub error: Option<String>,
}

impl WorkflowReply {
    fn message(session_id: &str, route: Route, content: String, source: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            route,
            content,
            sources: vec![source.to_string()],
            table: None,
            visualization: None,
            disambiguation: None,
            error: None,
        }
    }

    pub fn needs_disambiguation(&self) -> bool {
        self.disambiguation.is_some()
    }
}

/// Coordinates the router, the collaborators, and result post-processing.
pub struct Orchestrator {
    router: Arc<Router>,
    registry: CollaboratorRegistry,
    extractor: ContextExtractor,
    config: WorkflowConfig,
}

impl Orchestrator {
    pub fn new(
        router: Arc<Router>,
        registry: CollaboratorRegistry,
        extractor: ContextExtractor,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            router,
            registry,
            extractor,
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.router.store()
    }

    /// Handle one user turn.
    ///
    /// A new session id is generated when `session_id` is `None`.
    /// `forced_route` skips classification (the caller already knows which
    /// collaborator should answer). A pending clarification for the session
    /// takes precedence over both: the query is then read as the user's
    /// choice, not as a new question.
    pub async fn handle(
        &self,
        query: &str,
        session_id: Option<&str>,
        forced_route: Option<Route>,
    ) -> Result<WorkflowReply, WorkflowError> {
        let query = self.validate(query)?;
        if let Some(route) = forced_route {
            if !route.is_answering() {
                return Err(WorkflowError::NotAnswering(route));
            }
        }

        let session_id = match session_id {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => Uuid::new_v4().to_string(),
        };
        let store = self.store();

        if let Some(meta) = self.router.answer_meta(query, &session_id) {
            let content = meta.reply.unwrap_or_default();
            return Ok(WorkflowReply::message(
                &session_id,
                Route::Meta,
                content,
                SYSTEM_SOURCE,
            ));
        }

        if let Some(pending) = store.take_pending_disambiguation(&session_id) {
            let selected = Domain::from_route(pending.route)
                .and_then(|domain| offer_for(&pending.ambiguous_term, domain))
                .map(|offer| offer.choose(query))
                .unwrap_or_else(|| query.to_string());
            let resolved = resolve(&pending.original_query, &pending.ambiguous_term, &selected);
            info!(
                session = %session_id,
                route = %pending.route,
                term = %pending.ambiguous_term,
                selected = %selected,
                "Clarification resolved"
            );
            store.set_route(&session_id, pending.route);
            return self.dispatch(&resolved, &session_id, pending.route).await;
        }

        let classification = match forced_route {
            Some(route) => {
                store.set_route(&session_id, route);
                ClassificationResult::new(route, Confidence::High, "Route forced by caller")
            }
            None => self.router.classify(query, &session_id).await,
        };
        debug!(
            session = %session_id,
            route = %classification.route,
            confidence = %classification.confidence,
            "Query routed"
        );

        match classification.route {
            Route::OutOfScope => Ok(WorkflowReply::message(
                &session_id,
                Route::OutOfScope,
                self.config.out_of_scope_message.clone(),
                SYSTEM_SOURCE,
            )),
            Route::Meta => Ok(WorkflowReply::message(
                &session_id,
                Route::Meta,
                classification.reply.unwrap_or_default(),
                SYSTEM_SOURCE,
            )),
            route => {
                if let Some(offer) = self.ask_to_clarify(query, &session_id, route) {
                    let mut reply = WorkflowReply::message(
                        &session_id,
                        route,
                        offer.question.clone(),
                        route.description(),
                    );
                    reply.disambiguation = Some(offer);
                    return Ok(reply);
                }
                self.dispatch(query, &session_id, route).await
            }
        }
    }

    fn validate<'q>(&self, query: &'q str) -> Result<&'q str, WorkflowError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(WorkflowError::EmptyQuery);
        }
        let chars = query.chars().count();
        if chars > self.config.max_query_chars {
            return Err(WorkflowError::QueryTooLong(chars));
        }
        Ok(query)
    }

    /// Park the query and return the clarifying question, if the route has
    /// column vocabulary and the query uses one of its vague terms.
    fn ask_to_clarify(&self, query: &str, session_id: &str, route: Route) -> Option<DisambiguationOffer> {
        let offer = detect(query, Domain::from_route(route)?)?;
        self.store().set_pending_disambiguation(
            session_id,
            PendingDisambiguation {
                original_query: query.to_string(),
                ambiguous_term: offer.ambiguous_term.clone(),
                route,
            },
        );
        info!(
            session = %session_id,
            route = %route,
            term = %offer.ambiguous_term,
            options = offer.options.len(),
            "Asking for clarification"
        );
        Some(offer)
    }

    /// Send `query` to the route's collaborator and fold the reply back into
    /// the session.
    async fn dispatch(&self, query: &str, session_id: &str, route: Route) -> Result<WorkflowReply, WorkflowError> {
        let collaborator = self
            .registry
            .get(route)
            .ok_or(WorkflowError::NoCollaborator(route))?;
        let store = self.store();

        let request = CollaboratorRequest {
            query: query.to_string(),
            session_id: session_id.to_string(),
            history: store.render_history(session_id),
            context_summary: store.render_context_summary(session_id),
        };
        let answer = collaborator.answer(&request).await;

        store.append_user(session_id, query);
        store.append_agent(session_id, &answer.content);

        let mut visualization = None;
        match &answer.error {
            Some(error) => {
                warn!(session = %session_id, route = %route, error = %error, "Collaborator reported an error");
            }
            None => {
                if let Some(table) = &answer.table {
                    if let Some(context) = self.extractor.extract(table) {
                        store.set_result_context(session_id, context);
                    }
                    visualization = Some(VisualizationSpec::for_table(table, query));
                }
            }
        }

        Ok(WorkflowReply {
            session_id: session_id.to_string(),
            route,
            content: answer.content,
            sources: answer.sources,
            table: answer.table,
            visualization,
            disambiguation: None,
            error: answer.error,
        })
    }
}
