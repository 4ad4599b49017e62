//! Query routing for relay.
//!
//! Decides which collaborator answers a query: conversation meta questions
//! are answered from history, explicit vocabulary is routed by ordered
//! keyword tables, and everything else goes to a classification model with
//! follow-up rescue. Also hosts the column-disambiguation tables the fast
//! path and the orchestrator share.

pub mod disambiguation;
pub mod model;
pub mod patterns;
pub mod router;

pub use disambiguation::{detect, resolve, DisambiguationOffer, DisambiguationOption, Domain};
pub use model::{ClassificationModel, ModelError, ModelVerdict, OllamaClassifier};
pub use patterns::{FastPathMatch, FastPathTable};
pub use router::Router;
