//! Page-enumeration stage (C3): sitemap, then robots.txt hints, then an
//! HTML-link fallback crawl from the root.

pub mod robots;

use std::collections::{HashSet, VecDeque};

use regex::Regex;
use url::Url;

use crate::security::UrlValidator;
use robots::{fetch_robots_txt, RobotsTxt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoverySource {
    Sitemap,
    Robots,
    Fallback,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoveryErrors {
    pub sitemap: Option<String>,
    pub robots: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    pub total_pages: usize,
    pub urls: Vec<String>,
    pub sources: HashSet<DiscoverySource>,
    pub errors: DiscoveryErrors,
}

impl DiscoveryResult {
    pub fn used_fallback(&self) -> bool {
        self.sources.contains(&DiscoverySource::Fallback)
    }
}

pub struct Discoverer {
    client: reqwest::Client,
    validator: UrlValidator,
    max_fallback_pages: usize,
}

impl Discoverer {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("failed to build discovery HTTP client"),
            validator: UrlValidator::new(),
            max_fallback_pages: 100,
        }
    }

    pub fn with_max_fallback_pages(mut self, n: usize) -> Self {
        self.max_fallback_pages = n;
        self
    }

    pub async fn discover(&self, site_url: &str) -> DiscoveryResult {
        let mut urls: HashSet<String> = HashSet::new();
        let mut sources = HashSet::new();
        let mut errors = DiscoveryErrors::default();

        match self.fetch_sitemap_urls(site_url).await {
            Ok(found) if !found.is_empty() => {
                sources.insert(DiscoverySource::Sitemap);
                urls.extend(found);
            }
            Ok(_) => {}
            Err(e) => errors.sitemap = Some(e),
        }

        match fetch_robots_txt(&self.client, site_url).await {
            Ok(robots) => {
                if !robots.sitemaps().is_empty() {
                    sources.insert(DiscoverySource::Robots);
                    for sitemap_url in robots.sitemaps() {
                        if let Ok(found) = self.fetch_sitemap_at(sitemap_url).await {
                            urls.extend(found);
                        }
                    }
                }
            }
            Err(e) => errors.robots = Some(e.to_string()),
        }

        if urls.is_empty() {
            match self.fallback_crawl(site_url).await {
                Ok(found) => {
                    sources.insert(DiscoverySource::Fallback);
                    urls.extend(found);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "fallback discovery crawl failed");
                }
            }
        }

        let mut urls: Vec<String> = urls.into_iter().map(|u| relativize(&u)).collect();
        urls.sort();
        urls.dedup();

        DiscoveryResult {
            total_pages: urls.len(),
            urls,
            sources,
            errors,
        }
    }

    async fn fetch_sitemap_urls(&self, site_url: &str) -> Result<Vec<String>, String> {
        let sitemap_url = format!("{}/sitemap.xml", site_url.trim_end_matches('/'));
        self.fetch_sitemap_at(&sitemap_url).await
    }

    async fn fetch_sitemap_at(&self, sitemap_url: &str) -> Result<Vec<String>, String> {
        if self.validator.validate(sitemap_url).is_err() {
            return Err("sitemap URL failed security validation".to_string());
        }
        let response = self
            .client
            .get(sitemap_url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("sitemap fetch returned {}", response.status()));
        }
        let body = response.text().await.map_err(|e| e.to_string())?;
        Ok(extract_sitemap_locs(&body))
    }

    /// HTML-link fallback: BFS from the root up to `max_fallback_pages`,
    /// following only same-host links.
    async fn fallback_crawl(&self, site_url: &str) -> Result<Vec<String>, String> {
        let root = Url::parse(site_url).map_err(|e| e.to_string())?;
        let host = root.host_str().ok_or("root URL has no host")?.to_string();

        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(site_url.to_string());
        seen.insert(site_url.to_string());

        let link_re = Regex::new(r#"(?i)href\s*=\s*["']([^"'#]+)"#).unwrap();

        while let Some(current) = queue.pop_front() {
            if seen.len() >= self.max_fallback_pages {
                break;
            }
            if self.validator.validate(&current).is_err() {
                continue;
            }
            let html = match self.client.get(&current).send().await {
                Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
                _ => continue,
            };

            for capture in link_re.captures_iter(&html) {
                let href = &capture[1];
                let Ok(resolved) = root.join(href) else { continue };
                if resolved.host_str() != Some(host.as_str()) {
                    continue;
                }
                if resolved.scheme() != "http" && resolved.scheme() != "https" {
                    continue;
                }
                let normalized = resolved.to_string();
                if seen.insert(normalized.clone()) {
                    queue.push_back(normalized);
                    if seen.len() >= self.max_fallback_pages {
                        break;
                    }
                }
            }
        }

        Ok(seen.into_iter().collect())
    }
}

impl Default for Discoverer {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip scheme+host from an absolute URL, keeping path+query — every
/// stage downstream of discovery (`PageSelector`, `Crawler`, `Page::url`)
/// deals in relative URLs. Sitemap `<loc>` entries and the fallback
/// crawl's resolved links are both always absolute, so this runs once
/// here rather than being the caller's job. Falls back to the input
/// unchanged if it doesn't parse as an absolute URL.
fn relativize(absolute: &str) -> String {
    match Url::parse(absolute) {
        Ok(url) => match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        },
        Err(_) => absolute.to_string(),
    }
}

fn extract_sitemap_locs(xml: &str) -> Vec<String> {
    let loc_re = Regex::new(r"(?is)<loc>\s*([^<]+?)\s*</loc>").unwrap();
    loc_re
        .captures_iter(xml)
        .map(|c| c[1].trim().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_sitemap_locs_parses_multiple_entries() {
        let xml = r#"
            <urlset>
              <url><loc>https://example.com/</loc></url>
              <url><loc>https://example.com/about</loc></url>
            </urlset>
        "#;
        let locs = extract_sitemap_locs(xml);
        assert_eq!(locs, vec!["https://example.com/", "https://example.com/about"]);
    }

    #[test]
    fn extract_sitemap_locs_on_empty_input_is_empty() {
        assert!(extract_sitemap_locs("").is_empty());
    }

    #[test]
    fn relativize_strips_scheme_and_host() {
        assert_eq!(relativize("https://example.com/"), "/");
        assert_eq!(relativize("https://example.com/about"), "/about");
    }

    #[test]
    fn relativize_keeps_query_string() {
        assert_eq!(relativize("https://example.com/search?q=seo"), "/search?q=seo");
    }

    #[test]
    fn relativize_passes_through_unparseable_input() {
        assert_eq!(relativize("not a url"), "not a url");
    }
}
