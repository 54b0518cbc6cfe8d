//! Content analysis: raw pages and search hits into [`ExtractedFacts`].
//!
//! | Input | Entry point | Yields |
//! |-------|-------------|--------|
//! | fetched HTML page | [`ContentAnalyzer::analyze`] | person fields, contacts, social links, keywords, sentiment |
//! | search hit | [`ContentAnalyzer::facts_from_result`] | provenance, website or social link, labelled snippet fields |
//!
//! Nothing here fails. Empty or malformed input gives empty facts, which is
//! the same thing as "not found".

pub mod name;
pub mod sentiment;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use scraper::{ElementRef, Html, Selector};

use crate::models::{ExtractedFacts, PersonInfo, RawResult, SocialLink, SourceKind};
use crate::rules::CompiledRules;
use crate::sources::engine::{element_text, resolve_link};
use crate::validate::extract_emails;

pub use name::is_likely_name;
pub use sentiment::{analyze_sentiment, LexiconSentiment, TextAnalysisBackend};

const MAX_FIELD_LEN: usize = 100;
const MAX_KEYWORDS: usize = 20;

/// Keep digits and `+`; `None` when fewer than ten characters remain.
pub fn clean_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    (cleaned.len() >= 10).then_some(cleaned)
}

/// Handle from a profile URL: the segment after `/in/` on LinkedIn,
/// otherwise the last non-empty path segment.
pub fn username_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .collect();
    let handle = match segments.iter().position(|s| *s == "in") {
        Some(i) if parsed.host_str().is_some_and(|h| h.contains("linkedin.com")) => {
            segments.get(i + 1).copied()
        }
        _ => segments.last().copied(),
    }?;
    Some(handle.trim_start_matches('@').to_string())
}

/// Word frequency over 3+ letter words minus stop words; words seen more
/// than once, most frequent first (ties by first appearance), at most 20.
pub fn keyword_frequency(text: &str, stop_words: &[String]) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in lower.split(|c: char| !c.is_ascii_alphabetic()) {
        if word.len() < 3 || stop_words.iter().any(|s| s == word) {
            continue;
        }
        let n = counts.entry(word).or_insert(0);
        if *n == 0 {
            order.push(word);
        }
        *n += 1;
    }
    let mut ranked: Vec<(&str, usize)> = order
        .into_iter()
        .map(|w| (w, counts[w]))
        .filter(|(_, n)| *n > 1)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(w, _)| w.to_string())
        .collect()
}

/// `Label: value.` fields inside a snippet, e.g. `Company: Acme.`
fn labelled_field(snippet: &str, label: &str) -> Option<String> {
    let needle = format!("{label}: ");
    let start = snippet.find(&needle)? + needle.len();
    let rest = &snippet[start..];
    let end = rest.find(". ").unwrap_or(rest.len());
    let value = rest[..end].trim().trim_end_matches('.').trim();
    (!value.is_empty() && value.chars().count() < MAX_FIELD_LEN).then(|| value.to_string())
}

/// Page title and meta tags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub title: Option<String>,
    /// `description`, `keywords`, `author`, `og_*` and `twitter_*` entries.
    pub tags: BTreeMap<String, String>,
}

/// Page-level analysis: facts plus the page's own metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageAnalysis {
    pub meta: PageMeta,
    pub facts: ExtractedFacts,
}

// ═══════════════════════════════════════════════════════════════════════
// ContentAnalyzer
// ═══════════════════════════════════════════════════════════════════════

pub struct ContentAnalyzer {
    rules: Arc<CompiledRules>,
    backend: Option<Arc<dyn TextAnalysisBackend>>,
    lexicon: LexiconSentiment,
}

impl ContentAnalyzer {
    pub fn new(rules: Arc<CompiledRules>, backend: Option<Arc<dyn TextAnalysisBackend>>) -> Self {
        let tables = rules.tables();
        let lexicon =
            LexiconSentiment::new(tables.positive_words.clone(), tables.negative_words.clone());
        Self {
            rules,
            backend,
            lexicon,
        }
    }

    pub fn rules(&self) -> &CompiledRules {
        &self.rules
    }

    pub fn is_likely_name(&self, text: &str) -> bool {
        is_likely_name(text, &self.rules.tables().name_blocklist)
    }

    /// Facts found in an HTML page.
    pub fn analyze(&self, html: &str, url: &str) -> ExtractedFacts {
        self.analyze_page(html, url).facts
    }

    pub fn analyze_page(&self, html: &str, url: &str) -> PageAnalysis {
        if html.trim().is_empty() {
            return PageAnalysis::default();
        }
        let document = Html::parse_document(html);
        let meta = page_meta(&document);
        let text = visible_text(&document);

        let mut person_info = self.person_info(&document);
        if person_info.name.is_none() {
            person_info.name = meta
                .tags
                .get("author")
                .filter(|a| self.is_likely_name(a))
                .cloned();
        }

        let mut facts = ExtractedFacts {
            person_info,
            social_links: self.social_links(&document, url),
            keywords: keyword_frequency(&text, &self.rules.tables().stop_words),
            sentiment: analyze_sentiment(self.backend.as_deref(), &self.lexicon, &text),
            ..ExtractedFacts::default()
        };
        facts.contacts.emails = extract_emails(&text);
        facts.contacts.phones = self.phones(&text);
        PageAnalysis { meta, facts }
    }

    /// Plain-text variant for snippets and PDF text.
    pub fn analyze_text(&self, text: &str) -> ExtractedFacts {
        let mut facts = ExtractedFacts {
            keywords: keyword_frequency(text, &self.rules.tables().stop_words),
            sentiment: analyze_sentiment(self.backend.as_deref(), &self.lexicon, text),
            ..ExtractedFacts::default()
        };
        facts.contacts.emails = extract_emails(text);
        facts.contacts.phones = self.phones(text);
        facts
    }

    /// What a search hit says on its own, without fetching the page.
    ///
    /// Social URLs become social links, carrying the hit's verification;
    /// other URLs become websites. Labelled `Company:` and `Location:`
    /// fields in the snippet fill the person record, and a social hit whose
    /// title reads as a name supplies the name.
    pub fn facts_from_result(&self, result: &RawResult) -> ExtractedFacts {
        let mut facts = ExtractedFacts::with_source(result.source_label());

        match self.rules.social_platform(&result.url) {
            Some(platform) => facts.social_links.push(SocialLink {
                platform: platform.to_string(),
                url: result.url.clone(),
                username: username_from_url(&result.url),
                verified: result.verified,
            }),
            None => facts.websites.push(result.url.clone()),
        }

        if result.kind == SourceKind::Social && self.is_likely_name(&result.title) {
            facts.person_info.name = Some(result.title.trim().to_string());
        }
        facts.person_info.company = labelled_field(&result.snippet, "Company");
        facts.person_info.location = labelled_field(&result.snippet, "Location");

        facts.contacts.emails = extract_emails(&result.text());
        facts.contacts.phones = self.phones(&result.snippet);
        facts
    }

    fn first_match(
        &self,
        document: &Html,
        selectors: &[Selector],
        accept: impl Fn(&str) -> bool,
    ) -> Option<String> {
        selectors.iter().find_map(|sel| {
            document
                .select(sel)
                .map(|el| element_text(&el))
                .find(|t| !t.is_empty() && accept(t.as_str()))
        })
    }

    fn person_info(&self, document: &Html) -> PersonInfo {
        let short = |t: &str| t.chars().count() < MAX_FIELD_LEN;
        PersonInfo {
            name: self.first_match(document, &self.rules.name_selectors, |t| {
                self.is_likely_name(t)
            }),
            occupation: self.first_match(document, &self.rules.occupation_selectors, short),
            company: self.first_match(document, &self.rules.company_selectors, short),
            location: self.first_match(document, &self.rules.location_selectors, short),
        }
    }

    fn social_links(&self, document: &Html, base_url: &str) -> Vec<SocialLink> {
        let Ok(anchors) = Selector::parse("a[href]") else {
            return Vec::new();
        };
        let mut links: Vec<SocialLink> = Vec::new();
        for a in document.select(&anchors) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_link(href, base_url) else {
                continue;
            };
            let Some(platform) = self.rules.social_platform(&url) else {
                continue;
            };
            if links.iter().any(|l| l.url == url) {
                continue;
            }
            links.push(SocialLink {
                platform: platform.to_string(),
                username: username_from_url(&url),
                url,
                verified: false,
            });
        }
        links
    }

    fn phones(&self, text: &str) -> Vec<String> {
        let mut phones: Vec<String> = Vec::new();
        for pattern in &self.rules.phone_patterns {
            for m in pattern.find_iter(text) {
                if let Some(phone) = clean_phone(m.as_str()) {
                    if !phones.contains(&phone) {
                        phones.push(phone);
                    }
                }
            }
        }
        phones
    }
}

fn page_meta(document: &Html) -> PageMeta {
    let mut meta = PageMeta::default();
    if let Ok(title) = Selector::parse("title") {
        meta.title = document
            .select(&title)
            .next()
            .map(|t| element_text(&t))
            .filter(|t| !t.is_empty());
    }
    let Ok(tags) = Selector::parse("meta[content]") else {
        return meta;
    };
    for tag in document.select(&tags) {
        let el = tag.value();
        let content = el.attr("content").unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        let key = match (el.attr("property"), el.attr("name")) {
            (Some(p), _) if p.starts_with("og:") => format!("og_{}", &p[3..]),
            (_, Some(n)) if n.starts_with("twitter:") => format!("twitter_{}", &n[8..]),
            (_, Some(n)) if matches!(n, "description" | "keywords" | "author") => n.to_string(),
            _ => continue,
        };
        meta.tags.entry(key).or_insert_with(|| content.to_string());
    }
    meta
}

/// Text of the page outside `script`, `style` and `noscript`.
fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|p| matches!(p.value().name(), "script" | "style" | "noscript"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_PAGE: &str = r#"<!doctype html>
<html><head>
  <title>Ivan Petrov | Clinic staff</title>
  <meta name="description" content="Rehabilitation physician at Moscow Clinic">
  <meta property="og:title" content="Ivan Petrov">
  <meta name="author" content="Clinic Web Team">
  <script>var track = "fraud fraud fraud";</script>
</head><body>
  <h1>Staff page</h1>
  <div class="profile-name">Ivan Petrov</div>
  <div class="job-title">Rehabilitation physician</div>
  <div class="company">Moscow Clinic</div>
  <div class="location">Moscow, Russia</div>
  <p>Write to buch1202@mail.ru or call (555) 123-4567.</p>
  <p>Rehabilitation is our profile. Rehabilitation works. An outstanding team.</p>
  <a href="https://www.linkedin.com/in/ipetrov/">LinkedIn</a>
  <a href="https://vk.com/ipetrov">VK</a>
  <a href="https://www.linkedin.com/in/ipetrov/">again</a>
  <a href="/about">About</a>
</body></html>"#;

    fn analyzer() -> ContentAnalyzer {
        ContentAnalyzer::new(Arc::new(CompiledRules::builtin().unwrap()), None)
    }

    #[test]
    fn phone_cleaning_and_usernames() {
        assert_eq!(clean_phone("+7 (495) 123-45-67"), Some("+74951234567".to_string()));
        assert_eq!(clean_phone("123-45"), None);
        assert_eq!(
            username_from_url("https://www.linkedin.com/in/jdoe/details?x=1"),
            Some("jdoe".to_string())
        );
        assert_eq!(
            username_from_url("https://twitter.com/jdoe?ref=abc"),
            Some("jdoe".to_string())
        );
        assert_eq!(username_from_url("https://github.com/"), None);
    }

    #[test]
    fn page_yields_person_contacts_and_links() {
        let page = analyzer().analyze_page(PROFILE_PAGE, "https://clinic.ru/staff/ivan");
        let facts = &page.facts;
        // "Staff page" under h1 is rejected, the next selector supplies the name.
        assert_eq!(facts.person_info.name.as_deref(), Some("Ivan Petrov"));
        assert_eq!(
            facts.person_info.occupation.as_deref(),
            Some("Rehabilitation physician")
        );
        assert_eq!(facts.person_info.company.as_deref(), Some("Moscow Clinic"));
        assert_eq!(facts.person_info.location.as_deref(), Some("Moscow, Russia"));
        assert_eq!(facts.contacts.emails, vec!["buch1202@mail.ru"]);
        assert_eq!(facts.contacts.phones, vec!["5551234567"]);
        assert_eq!(facts.social_links.len(), 2);
        assert_eq!(facts.social_links[0].platform, "LinkedIn");
        assert_eq!(facts.social_links[0].username.as_deref(), Some("ipetrov"));
        assert_eq!(facts.social_links[1].platform, "VK");
        assert_eq!(facts.keywords[0], "rehabilitation");
        // Script text does not count toward sentiment.
        assert_eq!(facts.sentiment.as_ref().map(|s| s.label.as_str()), Some("positive"));

        assert_eq!(page.meta.title.as_deref(), Some("Ivan Petrov | Clinic staff"));
        assert_eq!(page.meta.tags.get("og_title").map(String::as_str), Some("Ivan Petrov"));
        assert!(page.meta.tags.contains_key("description"));
    }

    #[test]
    fn empty_and_malformed_input_yield_empty_facts() {
        let a = analyzer();
        assert!(a.analyze("", "https://x.com").is_empty());
        assert!(a.analyze("<<<not html", "https://x.com").is_empty());
        assert!(a.analyze("<html><body></body></html>", "https://x.com").is_empty());
    }

    #[test]
    fn facts_from_a_github_hit() {
        let mut hit = RawResult::new(
            "Ivan Petrov",
            "https://github.com/ipetrov",
            "GitHub user ipetrov. Company: moscow-clinic. Location: Moscow.",
            "GitHub",
            SourceKind::Social,
            1,
        );
        hit.verified = true;
        let facts = analyzer().facts_from_result(&hit);
        assert_eq!(facts.source.as_deref(), Some("GitHub"));
        assert_eq!(facts.person_info.name.as_deref(), Some("Ivan Petrov"));
        assert_eq!(facts.person_info.company.as_deref(), Some("moscow-clinic"));
        assert_eq!(facts.person_info.location.as_deref(), Some("Moscow"));
        assert!(facts.social_links[0].verified);
        assert!(facts.websites.is_empty());
    }

    #[test]
    fn web_hit_becomes_a_website() {
        let hit = RawResult::new(
            "Page Title",
            "https://clinic.ru/staff",
            "Contact buch1202@mail.ru",
            "Google",
            SourceKind::GenericSearch,
            1,
        );
        let facts = analyzer().facts_from_result(&hit);
        assert_eq!(facts.source.as_deref(), Some("Search-Google"));
        assert_eq!(facts.websites, vec!["https://clinic.ru/staff"]);
        assert!(facts.person_info.name.is_none());
        assert_eq!(facts.contacts.emails, vec!["buch1202@mail.ru"]);
    }

    #[test]
    fn keywords_drop_stop_words_and_singletons() {
        let stop = crate::rules::ExtractionRules::default().stop_words;
        let words = keyword_frequency("the clinic and the clinic; the staff; a staff; once", &stop);
        assert_eq!(words, vec!["clinic", "staff"]);
    }
}
