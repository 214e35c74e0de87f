//! Blocking client for the Gemini `generateContent` REST endpoint.

use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Part, VisionModel};
use crate::error::{InsightError, InsightResult};

/// Public Gemini API base URL.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Gemini client holding the session credential.
pub struct GeminiClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeminiClient {
    /// Build a client. `timeout` of `None` means a slow reply blocks indefinitely.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> InsightResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(InsightError::Credential("API key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| InsightError::network("client setup", e))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url_for(&self, model: &str) -> String {
        format!("{}/v1beta/{}:generateContent", self.endpoint, model_path(model))
    }
}

impl VisionModel for GeminiClient {
    fn generate(&self, model: &str, parts: &[Part]) -> InsightResult<String> {
        let url = self.url_for(model);
        let body = build_request(parts);
        debug!(model, parts = parts.len(), "calling generateContent");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| InsightError::network("generateContent", e))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| InsightError::network("reading generateContent reply", e))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "generateContent failed");
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(InsightError::Credential(format!(
                    "endpoint rejected the API key ({})",
                    status
                )));
            }
            return Err(InsightError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_response(&text)
    }
}

/// Qualify a bare model name with the `models/` collection prefix.
pub fn model_path(model: &str) -> String {
    let model = model.trim().trim_start_matches('/');
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<WirePart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WirePart<'a> {
    Text { text: &'a str },
    Inline { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

/// Build the request body for one user turn.
pub fn build_request(parts: &[Part]) -> GenerateRequest<'_> {
    let parts = parts
        .iter()
        .map(|part| match part {
            Part::Text(text) => WirePart::Text { text },
            Part::Image { mime_type, data } => WirePart::Inline {
                inline_data: InlineData {
                    mime_type,
                    data: general_purpose::STANDARD.encode(data),
                },
            },
        })
        .collect();
    GenerateRequest {
        contents: vec![Content { role: "user", parts }],
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Debug, Deserialize)]
struct ReplyPart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Extract the reply text of the first candidate, concatenating its text parts.
pub fn parse_response(body: &str) -> InsightResult<String> {
    let resp: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| InsightError::UnexpectedReply(format!("unreadable envelope: {}", e)))?;

    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(InsightError::UnexpectedReply(format!("prompt blocked: {}", reason)));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(InsightError::UnexpectedReply(format!(
            "candidate has no text (finishReason={})",
            reason
        )));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_prefixing() {
        assert_eq!(model_path("gemini-1.5-flash"), "models/gemini-1.5-flash");
        assert_eq!(model_path("models/gemini-1.5-flash"), "models/gemini-1.5-flash");
        assert_eq!(model_path(" /gemini-pro "), "models/gemini-pro");
        assert_eq!(model_path("tunedModels/poster-v2"), "tunedModels/poster-v2");
    }

    #[test]
    fn test_request_body_shape() {
        let parts = vec![Part::text("describe"), Part::image("image/png", vec![1, 2, 3])];
        let body = serde_json::to_value(build_request(&parts)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": "describe" },
                        { "inline_data": { "mime_type": "image/png", "data": "AQID" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_parse_response_joins_text_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_response(body).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_response_blocked_prompt() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
        assert_eq!(err.category(), "unexpected_reply");
    }

    #[test]
    fn test_parse_response_empty_candidate() {
        let body = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn test_empty_key_is_a_credential_error() {
        let err = GeminiClient::new(DEFAULT_ENDPOINT, "  ", None).err().unwrap();
        assert_eq!(err.category(), "credential");
    }

    #[test]
    fn test_url_for_trims_endpoint_slash() {
        let client = GeminiClient::new("http://localhost:8080/", "k", None).unwrap();
        assert_eq!(
            client.url_for("gemini-1.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
