//! Page-selection output (C4).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The curated subset of discovered URLs each analyzer category should see.
///
/// Invariant: each subset is a subset of the discovered URL set handed to
/// the `PageSelector`; `unique_pages()` is what the Crawler must fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSelection {
    pub seo_pages: BTreeSet<String>,
    pub content_pages: BTreeSet<String>,
    pub visual_pages: BTreeSet<String>,
    pub social_pages: BTreeSet<String>,
    pub reasoning: String,
}

impl PageSelection {
    /// Union of the four category subsets — what the Crawler must fetch.
    pub fn unique_pages(&self) -> BTreeSet<String> {
        self.seo_pages
            .iter()
            .chain(self.content_pages.iter())
            .chain(self.visual_pages.iter())
            .chain(self.social_pages.iter())
            .cloned()
            .collect()
    }

    /// Drop any URL in any subset that isn't in `discovered`, logging a
    /// warning for each drop. Used to sanity-check AI selector output.
    pub fn retain_discovered(&mut self, discovered: &BTreeSet<String>) {
        for (name, set) in [
            ("seo", &mut self.seo_pages),
            ("content", &mut self.content_pages),
            ("visual", &mut self.visual_pages),
            ("social", &mut self.social_pages),
        ] {
            let dropped: Vec<String> = set.iter().filter(|u| !discovered.contains(*u)).cloned().collect();
            for url in &dropped {
                tracing::warn!(category = name, url, "page selector returned undiscovered URL, dropping");
            }
            set.retain(|u| discovered.contains(u));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_pages_is_union() {
        let mut sel = PageSelection::default();
        sel.seo_pages.insert("/a".into());
        sel.content_pages.insert("/b".into());
        sel.visual_pages.insert("/a".into());
        assert_eq!(sel.unique_pages().len(), 2);
    }

    #[test]
    fn retain_discovered_drops_unknown_urls() {
        let mut sel = PageSelection::default();
        sel.seo_pages.insert("/known".into());
        sel.seo_pages.insert("/unknown".into());
        let discovered: BTreeSet<String> = ["/known".to_string()].into_iter().collect();
        sel.retain_discovered(&discovered);
        assert_eq!(sel.seo_pages.len(), 1);
        assert!(sel.seo_pages.contains("/known"));
    }
}
