use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Which downstream collaborator should answer a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Structured-data (waybill database) agent.
    Sql,
    /// Tabular-analysis (vehicle dwell time) agent.
    Csv,
    /// Document-retrieval agent.
    Pdf,
    /// Arithmetic agent.
    Math,
    /// Question about the conversation itself, answered from history.
    Meta,
    /// Nothing in the system can answer this.
    OutOfScope,
}

impl Route {
    /// Every route the classification model is allowed to return.
    pub const MODEL_ROUTES: [Route; 5] = [
        Route::Sql,
        Route::Csv,
        Route::Pdf,
        Route::Math,
        Route::OutOfScope,
    ];

    /// Stable wire label (`"sql"`, `"out_of_scope"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Sql => "sql",
            Route::Csv => "csv",
            Route::Pdf => "pdf",
            Route::Math => "math",
            Route::Meta => "meta",
            Route::OutOfScope => "out_of_scope",
        }
    }

    /// Whether this route is served by an answering collaborator.
    ///
    /// Only these routes are remembered as a session's `last_route`.
    pub fn is_answering(&self) -> bool {
        matches!(self, Route::Sql | Route::Csv | Route::Pdf | Route::Math)
    }

    /// Human-readable label of the data source behind the route.
    pub fn description(&self) -> &'static str {
        match self {
            Route::Sql => "Dispatch & Waybill Database",
            Route::Csv => "Vehicle Dwell Time Data",
            Route::Pdf => "Grid Code Documents",
            Route::Math => "Math Calculator",
            Route::Meta => "Conversation History",
            Route::OutOfScope => "Unknown",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known route label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRoute(pub String);

impl fmt::Display for UnknownRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown route: {}", self.0)
    }
}

impl std::error::Error for UnknownRoute {}

impl FromStr for Route {
    type Err = UnknownRoute;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sql" => Ok(Route::Sql),
            "csv" => Ok(Route::Csv),
            "pdf" => Ok(Route::Pdf),
            "math" => Ok(Route::Math),
            "meta" => Ok(Route::Meta),
            "out_of_scope" => Ok(Route::OutOfScope),
            other => Err(UnknownRoute(other.to_string())),
        }
    }
}

/// How sure the router is about a classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    /// Parse a model-provided label, degrading anything unknown to `Low`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// Prefix used when rendering history into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Agent => "Agent",
        }
    }
}

// =============================================================================
// Structs
// =============================================================================

/// Outcome of routing a single query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub route: Route,
    pub confidence: Confidence,
    pub reason: String,
    /// Answer composed directly from history for `Route::Meta`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl ClassificationResult {
    pub fn new(route: Route, confidence: Confidence, reason: impl Into<String>) -> Self {
        Self {
            route,
            confidence,
            reason: reason.into(),
            reply: None,
        }
    }

    /// The safe default every degradation falls back to.
    pub fn out_of_scope(reason: impl Into<String>) -> Self {
        Self::new(Route::OutOfScope, Confidence::Low, reason)
    }
}

/// Tabular output of a collaborator: column names plus row cells.
///
/// Cells are JSON scalars so that SQL rows and dataframe rows share one shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl TableData {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.rows.is_empty()
    }
}

/// Render a JSON scalar the way a person would read it (strings unquoted).
pub fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// =============================================================================
// Tests
// =============================================================================
