//! Stand-in collaborators for the interactive console.
//!
//! They report which route a query reached and what context came with it,
//! so routing, clarification, and memory can be exercised without any
//! data source behind them.

use async_trait::async_trait;

use relay_core::Route;
use relay_workflow::{Collaborator, CollaboratorReply, CollaboratorRequest};

pub struct EchoCollaborator {
    route: Route,
}

impl EchoCollaborator {
    pub fn new(route: Route) -> Self {
        Self { route }
    }
}

#[async_trait]
impl Collaborator for EchoCollaborator {
    fn route(&self) -> Route {
        self.route
    }

    async fn answer(&self, request: &CollaboratorRequest) -> CollaboratorReply {
        let turns = request.history.lines().filter(|l| !l.is_empty()).count();
        let mut content = format!(
            "{} would answer: {} ({} earlier lines of history)",
            self.route.description(),
            request.query,
            turns
        );
        if !request.context_summary.is_empty() {
            content.push('\n');
            content.push_str(&request.context_summary);
        }
        CollaboratorReply {
            content,
            sources: vec![self.route.description().to_string()],
            ..CollaboratorReply::default()
        }
    }
}
