//! The opaque AI model capability.
//!
//! A single `call` entry point: prompt construction and wire format are
//! the caller's concern, not something this crate dictates.
//! Analyzer/selector/dedup/ranker/validator stages each build a
//! `ModelRequest` and parse the `ModelResponse` back into their own
//! result types.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RecoverableAIError;

/// An optional image attached to a model call, for vision-capable
/// requests (screenshot analysis, artifact validation).
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    /// Base64-encoded image bytes.
    pub base64_data: String,
    pub media_type: String,
}

/// A single call to the model provider.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Logical prompt name, resolved via `PromptLoader` by callers that
    /// want externally-editable prompt text. Opaque to this trait.
    pub prompt: String,
    pub images: Vec<ImageAttachment>,
    /// Provider/model identifier (e.g. a deployment name); implementations
    /// may ignore this and always use their configured default.
    pub model: Option<String>,
    /// Hint that the caller expects strict JSON back, for providers that
    /// support structured-output modes.
    pub expects_json: bool,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            images: Vec::new(),
            model: None,
            expects_json: true,
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// The model provider's response. `parsed` is populated whenever the
/// provider could parse its own output as JSON; callers that need a
/// specific shape deserialize from it and treat a parse failure as
/// `RecoverableAIError`, per the fallback paths each AI-assisted stage
/// documents.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub text: String,
    pub parsed: Option<Value>,
}

/// The single opaque AI-calling capability every AI-assisted stage
/// depends on (`PageSelector`, `AnalyzerRuntime`, `IssueDeduper`,
/// `TopIssueRanker`, `VisionValidator`, `BenchmarkMatcher`).
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, RecoverableAIError>;
}

/// Resolves a named prompt template to text. Kept separate from
/// `ModelProvider` so prompt storage (files, a database, inline
/// constants) can vary independently of which model backs the calls.
pub trait PromptLoader: Send + Sync {
    fn load_prompt(&self, name: &str) -> Option<String>;
}
