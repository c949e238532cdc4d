//! Signal-string heuristics the Crawler uses to derive a page's
//! `BusinessIntelligence`. Pure functions over page text; never fail.

use crate::types::page::BusinessIntelligence;

const SIZE_SIGNALS: &[&str] = &["employees", "team of", "offices in", "locations nationwide"];
const PREMIUM_SIGNALS: &[&str] = &["enterprise plan", "premium", "white-glove", "dedicated account manager"];
const DECISION_MAKER_SIGNALS: &[&str] = &["request a demo", "talk to sales", "contact our team", "book a call"];
const PRICING_SIGNALS: &[&str] = &["pricing", "$", "/mo", "/month", "per month"];

pub fn extract(html: &str) -> BusinessIntelligence {
    let lower = html.to_lowercase();

    let size_signals = SIZE_SIGNALS
        .iter()
        .filter(|s| lower.contains(*s))
        .map(|s| s.to_string())
        .collect();

    let years_in_business = extract_years_in_business(&lower);

    let pricing_visible = PRICING_SIGNALS.iter().any(|s| lower.contains(s));

    let premium_features = PREMIUM_SIGNALS
        .iter()
        .filter(|s| lower.contains(*s))
        .map(|s| s.to_string())
        .collect();

    let decision_maker_accessible = DECISION_MAKER_SIGNALS.iter().any(|s| lower.contains(s));

    BusinessIntelligence {
        size_signals,
        years_in_business,
        pricing_visible,
        premium_features,
        decision_maker_accessible,
    }
}

/// Looks for "since 19XX"/"since 20XX" or "N years" phrasing.
fn extract_years_in_business(lower_html: &str) -> Option<String> {
    if let Some(idx) = lower_html.find("since ") {
        let rest = &lower_html[idx + "since ".len()..];
        let year: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if year.len() == 4 {
            return Some(format!("since {year}"));
        }
    }
    if let Some(idx) = lower_html.find(" years") {
        let before = &lower_html[..idx];
        let digits: String = before.chars().rev().take_while(|c| c.is_ascii_digit()).collect();
        let digits: String = digits.chars().rev().collect();
        if !digits.is_empty() {
            return Some(format!("{digits} years"));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pricing_and_decision_maker_signals() {
        let html = "<p>See our pricing. Request a demo today.</p>";
        let intel = extract(html);
        assert!(intel.pricing_visible);
        assert!(intel.decision_maker_accessible);
    }

    #[test]
    fn detects_years_in_business_since_phrasing() {
        let intel = extract("Proudly serving clients since 1998.");
        assert_eq!(intel.years_in_business.as_deref(), Some("since 1998"));
    }

    #[test]
    fn detects_years_in_business_count_phrasing() {
        let intel = extract("With over 25 years of experience.");
        assert_eq!(intel.years_in_business.as_deref(), Some("25 years"));
    }

    #[test]
    fn absent_signals_yield_empty_defaults() {
        let intel = extract("<p>Hello world</p>");
        assert!(intel.size_signals.is_empty());
        assert!(!intel.pricing_visible);
        assert!(intel.years_in_business.is_none());
    }
}
