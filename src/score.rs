//! URL normalization, relevance and academic scoring, relevance filtering.
//!
//! All functions here are pure. Scores are clamped to `[0, 1]`.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::models::RawResult;
use crate::rules::ExtractionRules;

static EMAIL_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[\w.-]+@[\w.-]+\.\w+\b").unwrap());

/// Query parameters that identify a campaign or click, not a page.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "yclid", "msclkid", "mc_cid", "mc_eid", "_ga"];

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// Canonical form used as the dedup key.
///
/// Lowercases scheme and host, drops default ports and the fragment,
/// removes tracking parameters, sorts the remaining query and strips a
/// trailing slash. Unparsable input is trimmed and lowercased.
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.trim().to_lowercase();
    };

    parsed.set_fragment(None);

    if parsed.port() == Some(80) && parsed.scheme() == "http"
        || parsed.port() == Some(443) && parsed.scheme() == "https"
    {
        let _ = parsed.set_port(None);
    }

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if pairs.is_empty() {
        parsed.set_query(None);
    } else {
        pairs.sort();
        let sorted: Vec<String> = pairs
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        parsed.set_query(Some(&sorted.join("&")));
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(path.trim_end_matches('/'));
    }

    let mut result = parsed.to_string();
    if result.ends_with('/') {
        result.pop();
    }
    result
}

/// Source-independent baseline relevance.
///
/// Starts at 1.0, loses 0.1 per position past the first, gains 0.2 for an
/// email-like token, 0.15 for a social-platform keyword and 0.1 for a
/// snippet longer than 100 characters.
pub fn relevance_score(title: &str, snippet: &str, rank: usize, rules: &ExtractionRules) -> f64 {
    let mut score = 1.0 - rank.saturating_sub(1) as f64 * 0.1;
    if snippet.chars().count() > 100 {
        score += 0.1;
    }
    let text = format!("{title} {snippet}");
    if EMAIL_LIKE.is_match(&text) {
        score += 0.2;
    }
    let lower = text.to_lowercase();
    if rules
        .social_keywords
        .iter()
        .any(|k| lower.contains(k.as_str()))
    {
        score += 0.15;
    }
    score.clamp(0.0, 1.0)
}

/// Academic score of a hit.
///
/// +0.4 for a known academic platform, +0.3 for a `.edu` URL, the weight of
/// every academic keyword present, +0.2 for a degree keyword and +0.3 when
/// the target email itself appears.
pub fn academic_score(
    title: &str,
    snippet: &str,
    url: &str,
    email: &str,
    rules: &ExtractionRules,
) -> f64 {
    let text = format!("{title} {snippet} {url}").to_lowercase();
    let mut score = 0.0;

    if rules.academic_domains.iter().any(|d| url.contains(d.as_str())) {
        score += 0.4;
    }
    if url.contains(".edu") {
        score += 0.3;
    }
    score += rules
        .academic_keywords
        .iter()
        .filter(|k| text.contains(k.term.as_str()))
        .map(|k| k.weight)
        .sum::<f64>();
    if rules.degree_keywords.iter().any(|d| text.contains(d.as_str())) {
        score += 0.2;
    }
    if !email.is_empty() && text.contains(&email.to_lowercase()) {
        score += 0.3;
    }
    score.min(1.0)
}

/// Labels for the academic signals present in a hit.
pub fn academic_indicators(title: &str, snippet: &str, url: &str) -> Vec<String> {
    let text = format!("{title} {snippet} {url}").to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| text.contains(w));
    let mut out = Vec::new();
    if ["scholar.google.com", "researchgate.net", "academia.edu"]
        .iter()
        .any(|d| url.contains(d))
    {
        out.push("academic_platform");
    }
    if url.contains(".edu") {
        out.push("university_domain");
    }
    if any(&["phd", "ph.d", "md", "doctor"]) {
        out.push("degree_mentioned");
    }
    if any(&["professor", "faculty", "researcher"]) {
        out.push("academic_position");
    }
    if any(&["publication", "journal", "conference", "paper"]) {
        out.push("publications");
    }
    if text.contains("research") {
        out.push("research_activity");
    }
    out.into_iter().map(str::to_string).collect()
}

fn contains_word(text: &str, terms: &[String]) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|w| !w.is_empty() && terms.iter().any(|t| t == w))
}

/// Whether a hit survives the relevance filter.
///
/// A block-listed word excludes the hit outright. Otherwise it is kept when
/// the email or username appears, when a profile/contact indicator appears,
/// or when its score exceeds `threshold`.
pub fn is_relevant(
    result: &RawResult,
    email: &str,
    username: &str,
    threshold: f64,
    rules: &ExtractionRules,
) -> bool {
    let text = result.text().to_lowercase();
    if contains_word(&text, &rules.irrelevant_terms) {
        return false;
    }
    if text.contains(&email.to_lowercase())
        || (!username.is_empty() && text.contains(&username.to_lowercase()))
    {
        return true;
    }
    if rules
        .profile_indicators
        .iter()
        .any(|i| text.contains(i.as_str()))
    {
        return true;
    }
    result.rank_score() > threshold
}
