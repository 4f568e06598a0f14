//! Google generative language API client.
//!
//! Covers the three calls the pipeline needs: text generation for prompt
//! refinement, long-running video generation, and operation polling.

use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{GenAiError, GenAiResult};

/// Gemini / Veo API client.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    api_base: String,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// A long-running operation.
#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Where the generated video lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoPayload {
    /// Downloadable URI
    Uri(String),
    /// Inline base64 bytes
    Inline(String),
}

impl Operation {
    /// Locate the first generated video in a finished operation.
    pub fn video_payload(&self) -> GenAiResult<VideoPayload> {
        if let Some(err) = &self.error {
            return Err(GenAiError::OperationFailed(format!(
                "{} (code {})",
                err.message, err.code
            )));
        }

        let response = self
            .response
            .as_ref()
            .ok_or_else(|| GenAiError::EmptyResult("operation has no response".into()))?;

        let sample = response
            .pointer("/generateVideoResponse/generatedSamples/0/video")
            .or_else(|| response.pointer("/videos/0"))
            .ok_or_else(|| GenAiError::EmptyResult("no generated video samples".into()))?;

        let field = |key: &str| {
            sample
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        if let Some(uri) = field("uri").or_else(|| field("gcsUri")) {
            return Ok(VideoPayload::Uri(uri));
        }
        if let Some(data) = field("bytesBase64Encoded").or_else(|| field("encodedVideo")) {
            return Ok(VideoPayload::Inline(data));
        }

        Err(GenAiError::EmptyResult(
            "video sample has neither uri nor inline bytes".into(),
        ))
    }
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> GenAiResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1beta/{}", self.api_base, path.trim_start_matches('/'))
    }

    async fn check(response: reqwest::Response) -> GenAiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GenAiError::from_http_status(status.as_u16(), body))
    }

    /// Single-turn text generation. Returns the first candidate's text.
    pub async fn generate_text(&self, model: &str, prompt: &str) -> GenAiResult<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(self.url(&format!("models/{}:generateContent", model)))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let parsed: GenerateContentResponse = Self::check(response).await?.json().await?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(GenAiError::EmptyResult("no candidate text".into()));
        }
        Ok(text)
    }

    /// Submit a video generation request. Returns the operation name.
    pub async fn start_video_generation(&self, model: &str, prompt: &str) -> GenAiResult<String> {
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": { "sampleCount": 1 }
        });

        let response = self
            .client
            .post(self.url(&format!("models/{}:predictLongRunning", model)))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let op: Operation = Self::check(response).await?.json().await?;
        debug!("Started video operation {}", op.name);

        if op.name.is_empty() {
            return Err(GenAiError::invalid_response("operation name missing"));
        }
        Ok(op.name)
    }

    /// Fetch the current state of an operation.
    pub async fn get_operation(&self, name: &str) -> GenAiResult<Operation> {
        let response = self
            .client
            .get(self.url(name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        Ok(Self::check(response).await?.json().await?)
    }

    /// Resolve a payload to raw video bytes.
    pub async fn fetch_video(&self, payload: &VideoPayload) -> GenAiResult<Vec<u8>> {
        let bytes = match payload {
            VideoPayload::Inline(data) => base64::engine::general_purpose::STANDARD.decode(data)?,
            VideoPayload::Uri(uri) => {
                let response = self
                    .client
                    .get(uri)
                    .header("x-goog-api-key", &self.api_key)
                    .send()
                    .await?;
                Self::check(response).await?.bytes().await?.to_vec()
            }
        };

        if bytes.is_empty() {
            return Err(GenAiError::EmptyResult("video payload is empty".into()));
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("test-key", server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn operation(response: Value) -> Operation {
        serde_json::from_value(json!({ "name": "operations/1", "done": true, "response": response }))
            .unwrap()
    }

    #[tokio::test]
    async fn test_generate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "A fox at dusk" }] } }]
            })))
            .mount(&server)
            .await;

        let text = client(&server)
            .generate_text("gemini-2.0-flash", "a fox")
            .await
            .unwrap();
        assert_eq!(text, "A fox at dusk");
    }

    #[tokio::test]
    async fn test_generate_text_empty_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let err = client(&server).generate_text("m", "p").await.unwrap_err();
        assert!(matches!(err, GenAiError::EmptyResult(_)));
    }

    #[tokio::test]
    async fn test_quota_error_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
            .mount(&server)
            .await;

        let err = client(&server).generate_text("m", "p").await.unwrap_err();
        assert!(matches!(err, GenAiError::QuotaExhausted(_)));
    }

    #[tokio::test]
    async fn test_start_and_poll_operation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/veo-2.0-generate-001:predictLongRunning"))
            .and(body_partial_json(json!({
                "instances": [{ "prompt": "a red fox" }],
                "parameters": { "sampleCount": 1 }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": "models/veo/operations/abc" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models/veo/operations/abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "models/veo/operations/abc",
                "done": false
            })))
            .mount(&server)
            .await;

        let c = client(&server);
        let name = c
            .start_video_generation("veo-2.0-generate-001", "a red fox")
            .await
            .unwrap();
        assert_eq!(name, "models/veo/operations/abc");

        let op = c.get_operation(&name).await.unwrap();
        assert!(!op.done);
    }

    #[test]
    fn test_video_payload_extraction() {
        let op = operation(json!({
            "generateVideoResponse": {
                "generatedSamples": [{ "video": { "uri": "https://files/v.mp4" } }]
            }
        }));
        assert_eq!(
            op.video_payload().unwrap(),
            VideoPayload::Uri("https://files/v.mp4".into())
        );

        let op = operation(json!({ "videos": [{ "bytesBase64Encoded": "AAEC" }] }));
        assert_eq!(op.video_payload().unwrap(), VideoPayload::Inline("AAEC".into()));

        let op = operation(json!({ "generateVideoResponse": { "generatedSamples": [] } }));
        assert!(matches!(op.video_payload(), Err(GenAiError::EmptyResult(_))));
    }

    #[test]
    fn test_operation_error_surfaces() {
        let op: Operation = serde_json::from_value(json!({
            "name": "operations/1",
            "done": true,
            "error": { "code": 3, "message": "prompt rejected by safety filter" }
        }))
        .unwrap();

        assert!(matches!(
            op.video_payload(),
            Err(GenAiError::OperationFailed(msg)) if msg.contains("safety")
        ));
    }

    #[tokio::test]
    async fn test_fetch_inline_and_uri() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/files/v.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"video-bytes".to_vec()))
            .mount(&server)
            .await;

        let c = client(&server);
        let bytes = c
            .fetch_video(&VideoPayload::Uri(format!("{}/files/v.mp4", server.uri())))
            .await
            .unwrap();
        assert_eq!(bytes, b"video-bytes");

        let bytes = c
            .fetch_video(&VideoPayload::Inline("AAEC".into()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0u8, 1, 2]);
    }
}
