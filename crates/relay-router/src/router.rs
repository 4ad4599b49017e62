//! Query classification.
//!
//! A query moves through four stages and stops at the first that assigns a
//! route:
//!
//! 1. conversation meta questions, answered from history;
//! 2. fast-path vocabulary tables (no model call);
//! 3. the classification model, given recent questions and the last route;
//! 4. follow-up rescue, turning an out-of-scope verdict whose reason reads
//!    like a follow-up into the previous route.
//!
//! Session state is read before the model call and written after it; no
//! lock is held while waiting on the model.

use std::sync::Arc;

use tracing::{debug, info};

use relay_core::config::RouterConfig;
use relay_core::{ClassificationResult, Confidence, Route};
use relay_session::SessionStore;

use crate::model::{ClassificationModel, ModelVerdict};
use crate::patterns::{FastPathMatch, FastPathTable};

pub const SYSTEM_PROMPT: &str =
    "You are a query classification assistant. Respond only with valid JSON.";

const TAXONOMY: &str = r#"You are a query router for a dispatch assistant system.

Analyze the user's query and classify it with confidence level.

## Data Sources:

1. "sql" - Dispatch database:
   - Waybills, dispatch operations, deliveries, schedules
   - Contractors, vendors, routes, plants, power plants
   - Data counts, lists, statistics about dispatch operations
   - Arabic questions about the above

2. "csv" - Vehicle dwell time data:
   - How long vehicles stayed in zones/geofences
   - Zone entry/exit times, dwell time analysis
   - Driver IDs, driver analysis, zone traffic
   - Keywords: dwell, zone, geofence, stay duration

3. "pdf" - Grid Code documents:
   - Grid code regulations, policies, compliance
   - Technical procedures, specifications, standards
   - Documentation questions

4. "math" - Mathematical calculations:
   - Any arithmetic: add, subtract, multiply, divide
   - Advanced math: sqrt, power, sin, cos, log, factorial
   - Natural language math: "what is 5 plus 3", "calculate 100 divided by 4"
   - Percentages: "10 percent of 200"
   - Arabic math: حساب، جمع، طرح، ضرب، قسمة

5. "out_of_scope" - Use when:
   - Query is about general knowledge (geography, history, science)
   - Query is completely unrelated to dispatch, vehicles, grid code, or math
   - Query asks for personal opinions, jokes, or advice
   - Query is vague AND there's no conversation context to help"#;

const RULES: &str = r#"## Rules:
- If query clearly mentions specific keywords (waybill, dispatch, plant, dwell, zone, grid code), classify confidently
- If query is a follow-up using pronouns AND there's a previous route, use that route with "high" confidence
- If query is general knowledge or unrelated to our data sources, return "out_of_scope"
- NEVER default to "pdf" when uncertain - use "out_of_scope" instead

Respond with JSON:
{"route": "sql"|"csv"|"pdf"|"math"|"out_of_scope", "confidence": "high"|"medium"|"low", "reason": "brief explanation"}"#;

/// Build the classification prompt.
///
/// The context block is omitted entirely for a fresh conversation.
pub fn build_prompt(query: &str, recent_questions: &[String], last_route: Option<Route>) -> String {
    let mut context = Vec::new();
    if !recent_questions.is_empty() {
        let rendered = serde_json::to_string(recent_questions).unwrap_or_default();
        context.push(format!("Previous questions: {}", rendered));
    }
    if let Some(route) = last_route {
        context.push(format!("Last route used: {}", route));
    }

    let context_block = if context.is_empty() {
        String::new()
    } else {
        format!("## Conversation Context:\n{}\n\n", context.join("\n"))
    };

    format!(
        "{}\n\n{}Current Question: {}\n\n{}",
        TAXONOMY, context_block, query, RULES
    )
}

/// Assigns every query a route.
pub struct Router {
    store: Arc<SessionStore>,
    model: Arc<dyn ClassificationModel>,
    table: FastPathTable,
    config: RouterConfig,
}

impl Router {
    pub fn new(
        store: Arc<SessionStore>,
        model: Arc<dyn ClassificationModel>,
        config: RouterConfig,
    ) -> Self {
        Self {
            store,
            model,
            table: FastPathTable::new(),
            config,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Classify `query` for `session_id`. Never fails; every degradation
    /// ends in an out-of-scope result.
    ///
    /// Must run before the query itself is appended to history, so meta
    /// answers and the prompt see only earlier questions.
    pub async fn classify(&self, query: &str, session_id: &str) -> ClassificationResult {
        if let Some(result) = self.answer_meta(query, session_id) {
            return result;
        }

        if let Some(hit) = self.fast_path(query) {
            info!(
                session = %session_id,
                route = %hit.route,
                matched = %hit.matched,
                "Fast-path route"
            );
            let result = ClassificationResult::new(hit.route, Confidence::High, hit.reason());
            self.remember(session_id, &result);
            return result;
        }

        let last_route = self.store.get_route(session_id);
        let recent = self
            .store
            .recent_user_questions(session_id, self.config.history_questions);
        let prompt = build_prompt(query, &recent, last_route);

        let verdict = ModelVerdict::from_output(self.model.complete(SYSTEM_PROMPT, &prompt).await);
        let rescuable = matches!(verdict, ModelVerdict::Classified(_));
        let mut result = verdict.into_result();
        info!(
            session = %session_id,
            model = %self.model.name(),
            route = %result.route,
            confidence = %result.confidence,
            reason = %result.reason,
            "Model classification"
        );

        if rescuable && result.route == Route::OutOfScope {
            if let Some(previous) = last_route {
                if self.reads_as_follow_up(&result.reason) {
                    info!(session = %session_id, route = %previous, "Follow-up rescued to previous route");
                    result = ClassificationResult::new(
                        previous,
                        Confidence::Medium,
                        format!("Detected as follow-up to previous {} query", previous),
                    );
                }
            }
        }

        self.remember(session_id, &result);
        result
    }

    /// Answer a question about the conversation itself, if it is one.
    pub fn answer_meta(&self, query: &str, session_id: &str) -> Option<ClassificationResult> {
        if !self.table.is_meta(query) {
            return None;
        }

        let reply = match self.store.last_user_question(session_id) {
            Some(q) => format!("Your last question was: \"{}\"", q),
            None => "This is your first question in our conversation.".to_string(),
        };
        debug!(session = %session_id, "Answered conversation meta question");

        let mut result = ClassificationResult::new(
            Route::Meta,
            Confidence::High,
            "Question about the conversation history",
        );
        result.reply = Some(reply);
        Some(result)
    }

    /// Deterministic route from vocabulary alone.
    pub fn fast_path(&self, query: &str) -> Option<FastPathMatch> {
        self.table.match_query(query)
    }

    fn reads_as_follow_up(&self, reason: &str) -> bool {
        let reason = reason.to_lowercase();
        self.config
            .follow_up_indicators
            .iter()
            .any(|w| reason.contains(&w.to_lowercase()))
    }

    fn remember(&self, session_id: &str, result: &ClassificationResult) {
        if result.route != Route::OutOfScope {
            self.store.set_route(session_id, result.route);
        }
    }
}
