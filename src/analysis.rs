use crate::config::AnalysisConfig;
use crate::entry::SuggestedAction;
use crate::resources::ResourceBundle;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest<'a> {
    pub journal_entry: &'a str,
}

/// Successful analysis of one entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnalysisReport {
    pub response: Option<String>,
    pub sentiment: Option<String>,
    pub suggestions: Option<Vec<SuggestedAction>>,
    pub is_concerning: bool,
    pub resources: Option<ResourceBundle>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Analysis service unreachable: {0}")]
    Transport(String),
    #[error("Analysis service returned an unreadable reply: {0}")]
    Decode(String),
    #[error("Analysis service declined the entry")]
    Declined { fallback_response: Option<String> },
}

impl AnalysisError {
    /// Server-supplied apology text, when the service sent one.
    pub fn fallback_response(&self) -> Option<&str> {
        match self {
            AnalysisError::Declined { fallback_response } => fallback_response.as_deref(),
            _ => None,
        }
    }
}

/// Remote sentiment and response generation.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, journal_entry: &str) -> Result<AnalysisReport, AnalysisError>;
}

/// Reply body as sent by the service. Everything past `success` is decoded
/// loosely: a malformed optional field is dropped on its own so the risk flag
/// still reaches the merge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    response: Option<Value>,
    #[serde(default)]
    sentiment: Option<Value>,
    #[serde(default)]
    suggestions: Option<Value>,
    #[serde(default, rename = "is_concerning", alias = "isConcerning")]
    is_concerning: Option<Value>,
    #[serde(default)]
    resources: Option<Value>,
    #[serde(default)]
    fallback_response: Option<Value>,
}

fn text_field(field: &str, value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text),
        Value::Null => None,
        other => {
            log::debug!("Ignoring non-text {field} from analysis service: {other}");
            None
        }
    }
}

impl WireReply {
    fn into_result(self) -> Result<AnalysisReport, AnalysisError> {
        if !self.success {
            return Err(AnalysisError::Declined {
                fallback_response: text_field("fallbackResponse", self.fallback_response),
            });
        }

        let suggestions = match self.suggestions {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .into_iter()
                    .filter_map(|item| match serde_json::from_value::<SuggestedAction>(item) {
                        Ok(action) => Some(action),
                        Err(e) => {
                            log::debug!("Ignoring malformed suggestion from analysis service: {e}");
                            None
                        }
                    })
                    .collect(),
            ),
            Some(other) => {
                log::debug!("Ignoring non-list suggestions from analysis service: {other}");
                None
            }
        };

        let is_concerning = match self.is_concerning {
            Some(Value::Bool(flag)) => flag,
            None | Some(Value::Null) => false,
            Some(other) => {
                log::debug!("Ignoring non-boolean is_concerning from analysis service: {other}");
                false
            }
        };

        let resources = match self.resources {
            None | Some(Value::Null) => None,
            Some(value) => match serde_json::from_value::<ResourceBundle>(value) {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    log::debug!("Ignoring malformed resource bundle from analysis service: {e}");
                    None
                }
            },
        };

        Ok(AnalysisReport {
            response: text_field("response", self.response),
            sentiment: text_field("sentiment", self.sentiment),
            suggestions,
            is_concerning,
            resources,
        })
    }
}

/// Analysis service reached over HTTP with a JSON body.
pub struct HttpAnalysisClient {
    client: Client,
    endpoint: Url,
}

impl HttpAnalysisClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AnalysisError::Transport(format!("invalid endpoint: {e}")))?;

        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(seconds) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder
            .build()
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn analyze(&self, journal_entry: &str) -> Result<AnalysisReport, AnalysisError> {
        log::debug!(
            "Posting {} chars to analysis service at {}",
            journal_entry.len(),
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&AnalysisRequest { journal_entry })
            .send()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        // Failure replies arrive with an error status but still carry a JSON
        // body, so the body is decoded regardless of status.
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;
        log::debug!("Analysis service answered {status}");

        let reply: WireReply = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::Decode(format!("status {status}: {e}")))?;
        reply.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::IconKey;
    use crate::orchestrator::SubmissionOrchestrator;
    use crate::store::{EntryStore, MemoryBlobStore};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> AnalysisConfig {
        AnalysisConfig {
            endpoint: format!("{}/api/journal", server.uri()),
            timeout_seconds: Some(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_success_reply_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/journal"))
            .and(body_json(json!({"journalEntry": "Today was a wonderful day"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "response": "That sounds lovely!",
                "sentiment": "positive",
                "is_concerning": false,
                "suggestions": [
                    {"title": "Savor it", "description": "Write down the best moment", "icon": "gratitude"},
                    {"description": "missing title"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpAnalysisClient::new(&config_for(&server)).unwrap();
        let report = client.analyze("Today was a wonderful day").await.unwrap();

        assert_eq!(report.response.as_deref(), Some("That sounds lovely!"));
        assert_eq!(report.sentiment.as_deref(), Some("positive"));
        assert!(!report.is_concerning);
        assert!(report.resources.is_none());
        let suggestions = report.suggestions.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].icon_key, IconKey::Gratitude);
    }

    #[tokio::test]
    async fn test_error_status_with_fallback_body_is_declined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": "Failed to connect to backend",
                "success": false,
                "fallbackResponse": "I'm sorry, please try again later."
            })))
            .mount(&server)
            .await;

        let client = HttpAnalysisClient::new(&config_for(&server)).unwrap();
        let err = client.analyze("hello").await.unwrap_err();

        assert!(matches!(err, AnalysisError::Declined { .. }));
        assert_eq!(
            err.fallback_response(),
            Some("I'm sorry, please try again later.")
        );
    }

    #[tokio::test]
    async fn test_unreadable_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let client = HttpAnalysisClient::new(&config_for(&server)).unwrap();
        let err = client.analyze("hello").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
        assert_eq!(err.fallback_response(), None);
    }

    #[tokio::test]
    async fn test_slow_service_times_out_as_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "response": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = HttpAnalysisClient::new(&config_for(&server)).unwrap();
        let err = client.analyze("hello").await.unwrap_err();
        assert!(matches!(err, AnalysisError::Transport(_)));
    }

    #[test]
    fn test_missing_optional_fields() {
        let reply: WireReply = serde_json::from_str(r#"{"success": true}"#).unwrap();
        let report = reply.into_result().unwrap();
        assert_eq!(report, AnalysisReport::default());
    }

    #[test]
    fn test_malformed_optional_fields_are_dropped_individually() {
        let reply: WireReply = serde_json::from_str(
            r#"{"success": true, "response": "I hear you", "sentiment": 3,
                "is_concerning": true, "resources": {"hotlines": []},
                "suggestions": "none"}"#,
        )
        .unwrap();
        let report = reply.into_result().unwrap();

        assert!(report.is_concerning);
        assert_eq!(report.response.as_deref(), Some("I hear you"));
        assert_eq!(report.sentiment, None);
        assert_eq!(report.resources, None);
        assert_eq!(report.suggestions, None);
    }

    #[tokio::test]
    async fn test_broken_bundle_keeps_server_flag_through_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "response": "I hear you",
                "is_concerning": true,
                "resources": {"hotlines": []}
            })))
            .mount(&server)
            .await;

        let client = HttpAnalysisClient::new(&config_for(&server)).unwrap();
        let store = EntryStore::open(Box::new(MemoryBlobStore::new()));
        let orchestrator = SubmissionOrchestrator::new(
            Arc::new(client),
            Arc::new(tokio::sync::Mutex::new(store)),
        );

        let outcome = orchestrator.submit("I'm so tired of everything").await.unwrap();
        assert!(!outcome.is_degraded());
        assert!(outcome.entry.is_concerning);
        assert_eq!(outcome.entry.ai_response, "I hear you");
        assert_eq!(outcome.resources, Some(ResourceBundle::built_in()));
    }

    #[test]
    fn test_declined_without_fallback() {
        let reply: WireReply = serde_json::from_str(r#"{"success": false}"#).unwrap();
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.fallback_response(), None);
    }
}
