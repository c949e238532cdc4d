//! AI-assisted page selection per analyzer category (C4).

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::error::RecoverableAIError;
use crate::traits::model::{ModelProvider, ModelRequest};
use crate::types::config::BusinessContext;
use crate::types::selection::PageSelection;

#[derive(Debug, Deserialize)]
struct SelectionResponse {
    seo_pages: Vec<String>,
    content_pages: Vec<String>,
    visual_pages: Vec<String>,
    social_pages: Vec<String>,
    reasoning: String,
}

/// Keyword heuristics used by the fallback path, tried against the URL
/// path in order; the first category whose keyword appears wins a slot.
const KEYWORD_HINTS: &[&str] = &["/about", "/services", "/contact", "/blog", "/products", "/pricing"];

pub struct PageSelector<'a> {
    model: &'a dyn ModelProvider,
}

impl<'a> PageSelector<'a> {
    pub fn new(model: &'a dyn ModelProvider) -> Self {
        Self { model }
    }

    pub async fn select(
        &self,
        discovered: &BTreeSet<String>,
        business_context: &BusinessContext,
        max_pages_per_module: usize,
    ) -> PageSelection {
        match self.select_via_model(discovered, business_context).await {
            Ok(mut selection) => {
                selection.retain_discovered(discovered);
                selection
            }
            Err(e) => {
                tracing::warn!(error = %e, "page selector AI call failed, falling back to heuristic");
                heuristic_select(discovered, max_pages_per_module)
            }
        }
    }

    async fn select_via_model(
        &self,
        discovered: &BTreeSet<String>,
        business_context: &BusinessContext,
    ) -> Result<PageSelection, RecoverableAIError> {
        let prompt = format!(
            "select pages for industry={:?} company={:?} from {} discovered URLs",
            business_context.industry,
            business_context.company_name,
            discovered.len()
        );
        let response = self.model.call(ModelRequest::new(prompt)).await?;
        let parsed = response
            .parsed
            .ok_or_else(|| RecoverableAIError("page selector response was not JSON".to_string()))?;
        let parsed: SelectionResponse = serde_json::from_value(parsed)
            .map_err(|e| RecoverableAIError(format!("page selector response did not match schema: {e}")))?;

        Ok(PageSelection {
            seo_pages: parsed.seo_pages.into_iter().collect(),
            content_pages: parsed.content_pages.into_iter().collect(),
            visual_pages: parsed.visual_pages.into_iter().collect(),
            social_pages: parsed.social_pages.into_iter().collect(),
            reasoning: parsed.reasoning,
        })
    }
}

/// Deterministic fallback: homepage plus up to `max_pages_per_module - 1`
/// additional URLs chosen by keyword match on the URL path, identically
/// for every category (the source gives each category the same pool).
fn heuristic_select(discovered: &BTreeSet<String>, max_pages_per_module: usize) -> PageSelection {
    let homepage = discovered
        .iter()
        .find(|u| crate::types::page::Page::is_homepage_url(u))
        .cloned();

    let mut picked: Vec<String> = homepage.iter().cloned().collect();
    for hint in KEYWORD_HINTS {
        if picked.len() >= max_pages_per_module {
            break;
        }
        if let Some(url) = discovered.iter().find(|u| u.contains(hint) && !picked.contains(u)) {
            picked.push(url.clone());
        }
    }

    let set: BTreeSet<String> = picked.into_iter().collect();
    PageSelection {
        seo_pages: set.clone(),
        content_pages: set.clone(),
        visual_pages: set.clone(),
        social_pages: set,
        reasoning: "AI selection unavailable; used homepage + keyword-matched fallback".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_select_includes_homepage_and_keyword_matches() {
        let discovered: BTreeSet<String> = [
            "/".to_string(),
            "/about".to_string(),
            "/services".to_string(),
            "/contact".to_string(),
            "/blog/post-1".to_string(),
        ]
        .into_iter()
        .collect();

        let selection = heuristic_select(&discovered, 4);
        assert!(selection.seo_pages.contains("/"));
        assert!(selection.seo_pages.len() <= 4);
        assert!(selection.unique_pages().is_subset(&discovered));
    }

    #[test]
    fn heuristic_select_on_empty_discovered_is_all_empty() {
        let discovered = BTreeSet::new();
        let selection = heuristic_select(&discovered, 4);
        assert!(selection.unique_pages().is_empty());
    }
}
