//! AI provider adapters for the audit pipeline.
//!
//! This module provides reference implementations of the `ModelProvider`
//! and `PromptLoader` traits. Callers may use these directly or bring
//! their own — nothing in the core pipeline depends on a specific
//! provider.

#[cfg(feature = "http-provider")]
mod openai;

#[cfg(feature = "http-provider")]
pub use openai::OpenAiProvider;

use std::collections::HashMap;

use crate::traits::model::PromptLoader;

/// A `PromptLoader` backed by an in-memory map, for callers that keep
/// their prompt text as compiled-in constants or load it once at
/// startup rather than resolving it per call.
#[derive(Default)]
pub struct StaticPromptLoader {
    prompts: HashMap<String, String>,
}

impl StaticPromptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(name.into(), text.into());
        self
    }
}

impl PromptLoader for StaticPromptLoader {
    fn load_prompt(&self, name: &str) -> Option<String> {
        self.prompts.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_prompt_loader_returns_registered_prompt() {
        let loader = StaticPromptLoader::new().with_prompt("seo", "analyze SEO for {url}");
        assert_eq!(loader.load_prompt("seo").as_deref(), Some("analyze SEO for {url}"));
        assert!(loader.load_prompt("missing").is_none());
    }
}
