//! Error types for the workflow orchestrator.

use relay_core::{RelayError, Route};

/// Errors that reject a request before any collaborator sees it.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Query must not be empty")]
    EmptyQuery,
    #[error("Query is {0} characters long, over the configured limit")]
    QueryTooLong(usize),
    #[error("No collaborator registered for route: {0}")]
    NoCollaborator(Route),
    #[error("Route does not answer queries: {0}")]
    NotAnswering(Route),
}

impl From<WorkflowError> for RelayError {
    fn from(err: WorkflowError) -> Self {
        RelayError::Collaborator(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(WorkflowError::EmptyQuery.to_string(), "Query must not be empty");
        assert_eq!(
            WorkflowError::NoCollaborator(Route::Pdf).to_string(),
            "No collaborator registered for route: pdf"
        );
        assert_eq!(
            WorkflowError::NotAnswering(Route::Meta).to_string(),
            "Route does not answer queries: meta"
        );
    }

    #[test]
    fn test_relay_error_conversion() {
        let err: RelayError = WorkflowError::QueryTooLong(12_000).into();
        assert!(matches!(err, RelayError::Collaborator(_)));
        assert!(err.to_string().contains("12000"));
    }
}
