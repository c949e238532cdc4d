//! A `ModelProvider` backed by the OpenAI chat completions API.
//!
//! A thin `reqwest::Client` wrapper configured via `from_env`/builder
//! methods, posting to `{base_url}/chat/completions` with bearer auth,
//! with a markdown-code-fence-tolerant JSON parser for responses that
//! don't strictly honor `response_format`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecoverableAIError;
use crate::security::credentials::SecretString;
use crate::traits::model::{ImageAttachment, ModelProvider, ModelRequest, ModelResponse};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// An OpenAI-backed `ModelProvider`. Vision requests (`ModelRequest::images`
/// non-empty) are sent as multi-part content arrays per OpenAI's vision
/// format; text-only requests use a plain string content body.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: SecretString::new(api_key),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Reads `OPENAI_API_KEY` from the environment.
    pub fn from_env() -> Result<Self, RecoverableAIError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RecoverableAIError("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn content_for(prompt: &str, images: &[ImageAttachment]) -> Value {
        if images.is_empty() {
            return Value::String(prompt.to_string());
        }

        let mut parts = vec![serde_json::json!({ "type": "text", "text": prompt })];
        for image in images {
            parts.push(serde_json::json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image.media_type, image.base64_data),
                }
            }));
        }
        Value::Array(parts)
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, RecoverableAIError> {
        let model = request.model.as_deref().unwrap_or(&self.model);
        let content = Self::content_for(&request.prompt, &request.images);

        let body = ChatRequest {
            model: model.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
            response_format: request.expects_json.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| RecoverableAIError(format!("openai request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RecoverableAIError(format!("openai returned {status}: {text}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RecoverableAIError(format!("failed to parse openai response envelope: {e}")))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RecoverableAIError("openai response had no choices".to_string()))?;

        let parsed_json = extract_json(&text);

        Ok(ModelResponse { text, parsed: parsed_json })
    }
}

/// OpenAI occasionally wraps JSON in a markdown code fence even when
/// `response_format` is requested; strip it before parsing, and fall
/// back to `None` rather than erroring, since not every caller expects
/// JSON back.
fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();
    serde_json::from_str(trimmed).ok()
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "response_format")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_strips_markdown_fence() {
        let text = "```json\n{\"score\": 80}\n```";
        let value = extract_json(text).unwrap();
        assert_eq!(value["score"], 80);
    }

    #[test]
    fn extract_json_parses_bare_json() {
        let value = extract_json("{\"ok\": true}").unwrap();
        assert_eq!(value["ok"], true);
    }

    #[test]
    fn extract_json_returns_none_for_prose() {
        assert!(extract_json("this is not json").is_none());
    }

    #[test]
    fn content_for_without_images_is_a_plain_string() {
        let content = OpenAiProvider::content_for("hello", &[]);
        assert_eq!(content, Value::String("hello".to_string()));
    }

    #[test]
    fn content_for_with_images_is_a_multipart_array() {
        let images = vec![ImageAttachment {
            base64_data: "abc123".to_string(),
            media_type: "image/png".to_string(),
        }];
        let content = OpenAiProvider::content_for("describe this", &images);
        let parts = content.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert!(parts[1]["image_url"]["url"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }
}
