//! Minimal client for an OpenAI-compatible Responses endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::advice::prompt::Prompt;
use crate::error::{AppError, Result};

#[derive(Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: &'a str,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponsesReply {
    /// Concatenated `output_text` parts; the convenience field wins when set.
    fn text(&self) -> String {
        if let Some(t) = self.output_text.as_deref().filter(|t| !t.trim().is_empty()) {
            return t.trim().to_string();
        }
        self.output
            .iter()
            .flat_map(|item| &item.content)
            .filter(|part| part.kind == "output_text")
            .map(|part| part.text.as_str())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

pub struct AdviceClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AdviceClient {
    pub fn new(base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    pub async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/responses", self.base_url);
        let body = ResponsesRequest {
            model: &self.model,
            input: &prompt.text,
            max_output_tokens: prompt.max_tokens,
        };

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(AppError::Advice(format!("{url} returned {status}: {detail}")));
        }

        let reply: ResponsesReply = resp.json().await?;
        let text = reply.text();
        debug!(model = %self.model, chars = text.len(), "advice generated");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AdviceMode;
    use axum::{http::HeaderMap, routing::post, Json, Router};

    fn prompt() -> Prompt {
        Prompt { mode: AdviceMode::Short, text: "hello".into(), max_tokens: 150 }
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1/")
    }

    #[test]
    fn reply_text_joins_output_text_parts() {
        let reply: ResponsesReply = serde_json::from_value(serde_json::json!({
            "output": [
                { "type": "reasoning", "content": [] },
                { "type": "message", "content": [
                    { "type": "output_text", "text": "Cut dining " },
                    { "type": "refusal", "text": "ignored" },
                    { "type": "output_text", "text": "by 20%." }
                ]}
            ]
        }))
        .unwrap();
        assert_eq!(reply.text(), "Cut dining by 20%.");
    }

    #[test]
    fn reply_without_output_is_empty() {
        let reply: ResponsesReply = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(reply.text(), "");
    }

    #[tokio::test]
    async fn posts_prompt_with_bearer_key() {
        let router = Router::new().route(
            "/v1/responses",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers["authorization"], "Bearer sk-test");
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["input"], "hello");
                assert_eq!(body["max_output_tokens"], 150);
                Json(serde_json::json!({
                    "output": [{ "content": [{ "type": "output_text", "text": "Spend less." }] }]
                }))
            }),
        );
        let base = serve(router).await;

        let client = AdviceClient::new(&base, "sk-test", "test-model", Duration::from_secs(5)).unwrap();
        assert_eq!(client.generate(&prompt()).await.unwrap(), "Spend less.");
    }

    #[tokio::test]
    async fn error_status_is_an_advice_error() {
        let router = Router::new().route(
            "/v1/responses",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
        );
        let base = serve(router).await;

        let client = AdviceClient::new(&base, "nope", "m", Duration::from_secs(5)).unwrap();
        let err = client.generate(&prompt()).await.unwrap_err();
        assert!(matches!(err, AppError::Advice(msg) if msg.contains("401")));
    }
}
