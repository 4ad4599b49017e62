//! Classification model seam.
//!
//! The router talks to a language model only through [`ClassificationModel`].
//! Whatever comes back is folded into a [`ModelVerdict`] so that malformed
//! output and provider failures are values, never panics or escaping errors.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use relay_core::config::ModelConfig;
use relay_core::{ClassificationResult, Confidence, RelayError, Route};

/// Errors from the classification provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Could not decode provider response: {0}")]
    Decode(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl From<ModelError> for RelayError {
    fn from(e: ModelError) -> Self {
        RelayError::Model(e.to_string())
    }
}

/// A language model that answers a classification prompt with raw text.
#[async_trait]
pub trait ClassificationModel: Send + Sync {
    /// Send a system message and a user prompt; return the model's reply text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ModelError>;

    /// Identifier used in logs.
    fn name(&self) -> &str;
}

// =============================================================================
// Verdicts
// =============================================================================

/// What a classification call produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelVerdict {
    /// Output parsed into a route (possibly degraded to out-of-scope).
    Classified(ClassificationResult),
    /// Output was not a JSON object of the expected shape.
    ParseError(String),
    /// The provider could not be reached or failed.
    ProviderError(String),
}

impl ModelVerdict {
    pub fn from_output(output: Result<String, ModelError>) -> Self {
        match output {
            Ok(raw) => parse_verdict(&raw),
            Err(e) => ModelVerdict::ProviderError(e.to_string()),
        }
    }

    /// Collapse to a classification, degrading failures to out-of-scope.
    pub fn into_result(self) -> ClassificationResult {
        match self {
            ModelVerdict::Classified(result) => result,
            ModelVerdict::ParseError(e) => {
                tracing::warn!(error = %e, "Could not parse classification output");
                ClassificationResult::out_of_scope("Could not parse router response")
            }
            ModelVerdict::ProviderError(e) => {
                tracing::warn!(error = %e, "Classification provider failed");
                ClassificationResult::out_of_scope(format!("Router error: {}", e))
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawVerdict {
    route: Option<String>,
    confidence: Option<String>,
    reason: Option<String>,
}

/// Parse model output of the form `{"route", "confidence", "reason"}`.
///
/// Tolerates prose or code fences around the object. A missing route or the
/// legacy `clarify` route means out-of-scope; a route outside the closed set
/// degrades to out-of-scope with low confidence.
pub fn parse_verdict(raw: &str) -> ModelVerdict {
    let Some(body) = json_object_span(raw) else {
        return ModelVerdict::ParseError(format!("no JSON object in output: {:?}", truncate(raw)));
    };
    let parsed: RawVerdict = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return ModelVerdict::ParseError(e.to_string()),
    };

    let label = parsed.route.unwrap_or_else(|| "out_of_scope".to_string());
    let confidence = Confidence::from_label(parsed.confidence.as_deref().unwrap_or("low"));
    let reason = parsed.reason.unwrap_or_default();

    let route = if label.trim().eq_ignore_ascii_case("clarify") {
        Route::OutOfScope
    } else {
        match label.parse::<Route>() {
            Ok(route) if Route::MODEL_ROUTES.contains(&route) => route,
            _ => {
                tracing::warn!(route = %label, "Model returned an unknown route");
                return ModelVerdict::Classified(ClassificationResult::out_of_scope(
                    "Invalid route returned",
                ));
            }
        }
    };

    ModelVerdict::Classified(ClassificationResult::new(route, confidence, reason))
}

fn json_object_span(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

fn truncate(raw: &str) -> String {
    raw.chars().take(120).collect()
}

// =============================================================================
// Ollama
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    format: &'static str,
    options: ChatOptions,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Classifier backed by an Ollama server's `/api/chat` endpoint in JSON mode.
pub struct OllamaClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl OllamaClassifier {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    fn request(&self, system: &str, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ClassificationModel for OllamaClassifier {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = self.request(system, prompt);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout(self.timeout_secs)
                } else {
                    ModelError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(ModelError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ModelError::Decode(e.to_string()))?;
        tracing::debug!(model = %self.model, response = %parsed.message.content, "Classifier replied");
        Ok(parsed.message.content)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(verdict: ModelVerdict) -> ClassificationResult {
        match verdict {
            ModelVerdict::Classified(r) => r,
            other => panic!("expected classification, got {:?}", other),
        }
    }

    // ---- parse_verdict ----

    #[test]
    fn test_parse_valid_verdict() {
        let r = classified(parse_verdict(
            r#"{"route": "pdf", "confidence": "high", "reason": "grid code question"}"#,
        ));
        assert_eq!(r.route, Route::Pdf);
        assert_eq!(r.confidence, Confidence::High);
        assert_eq!(r.reason, "grid code question");
    }

    #[test]
    fn test_parse_tolerates_wrapping() {
        let raw = "Here you go:\n```json\n{\"route\":\"sql\",\"confidence\":\"medium\",\"reason\":\"x\"}\n```";
        let r = classified(parse_verdict(raw));
        assert_eq!(r.route, Route::Sql);
        assert_eq!(r.confidence, Confidence::Medium);
    }

    #[test]
    fn test_parse_clarify_is_out_of_scope() {
        let r = classified(parse_verdict(
            r#"{"route": "clarify", "confidence": "medium", "reason": "vague pronoun"}"#,
        ));
        assert_eq!(r.route, Route::OutOfScope);
        assert_eq!(r.confidence, Confidence::Medium);
        assert_eq!(r.reason, "vague pronoun");
    }

    #[test]
    fn test_parse_unknown_route_degrades() {
        let r = classified(parse_verdict(
            r#"{"route": "weather", "confidence": "high", "reason": "forecast"}"#,
        ));
        assert_eq!(r, ClassificationResult::out_of_scope("Invalid route returned"));
    }

    #[test]
    fn test_parse_meta_is_not_a_model_route() {
        let r = classified(parse_verdict(r#"{"route": "meta"}"#));
        assert_eq!(r.route, Route::OutOfScope);
        assert_eq!(r.reason, "Invalid route returned");
    }

    #[test]
    fn test_parse_missing_fields_use_defaults() {
        let r = classified(parse_verdict("{}"));
        assert_eq!(r.route, Route::OutOfScope);
        assert_eq!(r.confidence, Confidence::Low);
        assert_eq!(r.reason, "");
    }

    #[test]
    fn test_parse_unknown_confidence_is_low() {
        let r = classified(parse_verdict(r#"{"route": "csv", "confidence": "very"}"#));
        assert_eq!(r.route, Route::Csv);
        assert_eq!(r.confidence, Confidence::Low);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_verdict("no json here"), ModelVerdict::ParseError(_)));
        assert!(matches!(parse_verdict("{not json}"), ModelVerdict::ParseError(_)));
        assert!(matches!(parse_verdict("} backwards {"), ModelVerdict::ParseError(_)));
        assert!(matches!(
            parse_verdict(r#"{"route": 5}"#),
            ModelVerdict::ParseError(_)
        ));
    }

    // ---- Degradation ----

    #[test]
    fn test_into_result_degrades_failures() {
        let parse = ModelVerdict::ParseError("bad".into()).into_result();
        assert_eq!(parse.route, Route::OutOfScope);
        assert_eq!(parse.confidence, Confidence::Low);
        assert_eq!(parse.reason, "Could not parse router response");

        let provider =
            ModelVerdict::from_output(Err(ModelError::Timeout(60))).into_result();
        assert_eq!(provider.route, Route::OutOfScope);
        assert!(provider.reason.starts_with("Router error:"));
        assert!(provider.reason.contains("60s"));
    }

    #[test]
    fn test_model_error_into_relay_error() {
        let err: RelayError = ModelError::Status {
            status: 503,
            body: "busy".into(),
        }
        .into();
        assert!(matches!(err, RelayError::Model(ref m) if m.contains("503")));
    }

    // ---- Ollama ----

    #[test]
    fn test_ollama_request_serialization() {
        let classifier = OllamaClassifier::new(&ModelConfig::default()).unwrap();
        let request = classifier.request("sys", "classify this");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-oss:latest");
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
        assert_eq!(json["options"]["temperature"], 0.0);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "classify this");
    }

    #[test]
    fn test_ollama_base_url_trailing_slash_trimmed() {
        let config = ModelConfig {
            base_url: "http://ollama:11434/".to_string(),
            ..ModelConfig::default()
        };
        let classifier = OllamaClassifier::new(&config).unwrap();
        assert_eq!(classifier.base_url, "http://ollama:11434");
        assert_eq!(classifier.name(), "gpt-oss:latest");
    }

    #[test]
    fn test_ollama_response_decoding() {
        let body = r#"{"model":"m","message":{"role":"assistant","content":"{\"route\":\"sql\"}"},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, r#"{"route":"sql"}"#);
    }
}
