//! Generic web search engines.
//!
//! Each engine is a URL template plus four CSS selectors: the result
//! block, and within it the title, link and snippet. Result pages are
//! parsed synchronously so the non-`Send` HTML tree never lives across an
//! await point.

use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::IntelError;
use crate::fetch::FetchContext;
use crate::models::{Query, RawResult, SourceKind};
use crate::rules::CompiledRules;
use crate::score::relevance_score;
use crate::sources::SourceFetcher;

/// Static description of a result page layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSpec {
    pub name: &'static str,
    /// Contains `{query}` (form-encoded on substitution) and optionally `{num}`.
    pub url_template: &'static str,
    pub result: &'static str,
    pub title: &'static str,
    pub link: &'static str,
    pub snippet: &'static str,
}

pub const GOOGLE: EngineSpec = EngineSpec {
    name: "Google",
    url_template: "https://www.google.com/search?q={query}&num={num}",
    result: "div.g",
    title: "h3",
    link: "a[href]",
    snippet: ".VwiC3b, .s3v9rd",
};

pub const BING: EngineSpec = EngineSpec {
    name: "Bing",
    url_template: "https://www.bing.com/search?q={query}&count={num}",
    result: ".b_algo",
    title: "h2 a",
    link: "h2 a[href]",
    snippet: ".b_caption p",
};

pub const DUCKDUCKGO: EngineSpec = EngineSpec {
    name: "DuckDuckGo",
    url_template: "https://html.duckduckgo.com/html/?q={query}",
    result: ".result",
    title: ".result__title a",
    link: ".result__title a[href]",
    snippet: ".result__snippet",
};

pub const YANDEX: EngineSpec = EngineSpec {
    name: "Yandex",
    url_template: "https://yandex.com/search/?text={query}&numdoc={num}",
    result: ".serp-item",
    title: ".organic__title a",
    link: ".organic__title a[href]",
    snippet: ".organic__text",
};

pub fn builtin_engine(name: &str) -> Option<EngineSpec> {
    match name.to_lowercase().as_str() {
        "google" => Some(GOOGLE),
        "bing" => Some(BING),
        "duckduckgo" | "ddg" => Some(DUCKDUCKGO),
        "yandex" => Some(YANDEX),
        _ => None,
    }
}

/// Parsed selectors of an [`EngineSpec`].
pub struct ResultSelectors {
    result: Selector,
    title: Selector,
    link: Selector,
    snippet: Selector,
}

impl ResultSelectors {
    pub fn new(spec: &EngineSpec) -> Result<Self, IntelError> {
        let parse = |s: &str| {
            Selector::parse(s).map_err(|e| {
                IntelError::Rules(format!("{} selector '{s}': {e:?}", spec.name))
            })
        };
        Ok(Self {
            result: parse(spec.result)?,
            title: parse(spec.title)?,
            link: parse(spec.link)?,
            snippet: parse(spec.snippet)?,
        })
    }
}

/// One hit as read off a result page, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub rank: usize,
}

/// Visible text of an element with whitespace collapsed.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn a result-page href into an absolute target URL.
///
/// Unwraps Google `/url?q=` and DuckDuckGo `uddg=` redirects and resolves
/// relative links against `base`. Only http(s) targets are returned.
pub fn resolve_link(href: &str, base: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    let absolute = match Url::parse(href) {
        Ok(u) => u,
        Err(_) => Url::parse(base).ok()?.join(href).ok()?,
    };

    let is_google_redirect = absolute.path() == "/url";
    let is_ddg_redirect = absolute.path().starts_with("/l/");
    if is_google_redirect || is_ddg_redirect {
        let wanted = if is_google_redirect { ["q", "url"] } else { ["uddg", "uddg"] };
        if let Some((_, target)) = absolute
            .query_pairs()
            .find(|(k, _)| wanted.contains(&k.as_ref()))
        {
            return resolve_link(&target, base);
        }
    }

    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}

/// Read up to `max` result blocks from a page. Blocks without a link or a
/// title are skipped but still count toward the rank.
pub fn parse_result_page(
    html: &str,
    base_url: &str,
    selectors: &ResultSelectors,
    max: usize,
) -> Vec<ParsedHit> {
    let document = Html::parse_document(html);
    let mut hits = Vec::new();

    for (i, block) in document.select(&selectors.result).take(max).enumerate() {
        let title = block
            .select(&selectors.title)
            .next()
            .map(|e| element_text(&e))
            .unwrap_or_default();
        let Some(url) = block
            .select(&selectors.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };
        let snippet = block
            .select(&selectors.snippet)
            .next()
            .map(|e| element_text(&e))
            .unwrap_or_default();

        if !title.is_empty() {
            hits.push(ParsedHit {
                title,
                url,
                snippet,
                rank: i + 1,
            });
        }
    }

    hits
}

/// Fill a URL template with a form-encoded query.
pub fn search_url(template: &str, query: &str, num: usize) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    template
        .replace("{query}", &encoded)
        .replace("{num}", &num.to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// GenericSearchEngine
// ═══════════════════════════════════════════════════════════════════════

pub struct GenericSearchEngine {
    spec: EngineSpec,
    selectors: ResultSelectors,
    ctx: Arc<FetchContext>,
    rules: Arc<CompiledRules>,
    max_results: usize,
}

impl GenericSearchEngine {
    pub fn new(
        spec: EngineSpec,
        ctx: Arc<FetchContext>,
        rules: Arc<CompiledRules>,
        max_results: usize,
    ) -> Result<Self, IntelError> {
        Ok(Self {
            selectors: ResultSelectors::new(&spec)?,
            spec,
            ctx,
            rules,
            max_results,
        })
    }
}

#[async_trait]
impl SourceFetcher for GenericSearchEngine {
    fn name(&self) -> &str {
        self.spec.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::GenericSearch
    }

    async fn fetch(&self, query: &Query) -> Vec<RawResult> {
        let url = search_url(self.spec.url_template, &query.text, self.max_results);
        let Ok(response) = self.ctx.get(&url).await else {
            return Vec::new();
        };

        let hits = parse_result_page(&response.text(), &url, &self.selectors, self.max_results);
        tracing::debug!(engine = self.spec.name, query = %query.text, hits = hits.len(), "parsed results");

        hits.into_iter()
            .map(|hit| {
                let mut result = RawResult::new(
                    hit.title,
                    hit.url,
                    hit.snippet,
                    self.spec.name,
                    SourceKind::GenericSearch,
                    hit.rank,
                );
                result.relevance_score =
                    relevance_score(&result.title, &result.snippet, result.rank, self.rules.tables());
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{context, ScriptedFetcher};

    const GOOGLE_PAGE: &str = r#"
        <html><body>
          <div class="g">
            <a href="/url?q=https://example.com/team/ivan&amp;sa=U"><h3>Ivan Petrov - Team</h3></a>
            <div class="VwiC3b">Contact buch1202@mail.ru for details</div>
          </div>
          <div class="g"><span>ad block without link</span></div>
          <div class="g">
            <a href="https://github.com/ipetrov"><h3>ipetrov (Ivan) · GitHub</h3></a>
            <div class="VwiC3b">Repositories</div>
          </div>
        </body></html>"#;

    #[test]
    fn resolves_redirects_and_relative_links() {
        assert_eq!(
            resolve_link("/url?q=https://a.com/x&sa=U", "https://www.google.com/search?q=z"),
            Some("https://a.com/x".to_string())
        );
        assert_eq!(
            resolve_link(
                "//duckduckgo.com/l/?uddg=https%3A%2F%2Fb.org%2Fp&rut=1",
                "https://html.duckduckgo.com/html/?q=z"
            ),
            Some("https://b.org/p".to_string())
        );
        assert_eq!(
            resolve_link("/ck/a?u=1", "https://www.bing.com/search?q=z"),
            Some("https://www.bing.com/ck/a?u=1".to_string())
        );
        assert_eq!(resolve_link("mailto:a@b.com", "https://x.com"), None);
        assert_eq!(resolve_link("#top", "https://x.com"), None);
    }

    #[test]
    fn parses_google_layout_with_ranks() {
        let selectors = ResultSelectors::new(&GOOGLE).unwrap();
        let hits = parse_result_page(GOOGLE_PAGE, "https://www.google.com/search?q=x", &selectors, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Ivan Petrov - Team");
        assert_eq!(hits[0].url, "https://example.com/team/ivan");
        assert_eq!(hits[0].snippet, "Contact buch1202@mail.ru for details");
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 3);
    }

    #[test]
    fn malformed_html_yields_nothing() {
        let selectors = ResultSelectors::new(&BING).unwrap();
        assert!(parse_result_page("<<<not html", "https://bing.com", &selectors, 10).is_empty());
    }

    #[test]
    fn query_is_form_encoded() {
        assert_eq!(
            search_url(GOOGLE.url_template, "\"a@b.com\" profile", 10),
            "https://www.google.com/search?q=%22a%40b.com%22+profile&num=10"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_scores_hits_and_swallows_failures() {
        let fetcher = Arc::new(ScriptedFetcher::new().html("google.com/search", GOOGLE_PAGE));
        let ctx = Arc::new(context(fetcher));
        let rules = Arc::new(CompiledRules::builtin().unwrap());
        let engine = GenericSearchEngine::new(GOOGLE, ctx.clone(), rules.clone(), 10).unwrap();
        let query = Query {
            text: "\"buch1202@mail.ru\"".to_string(),
            affinity: SourceKind::GenericSearch,
            priority: 0,
            email: "buch1202@mail.ru".to_string(),
        };

        let results = engine.fetch(&query).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "Google");
        assert_eq!(results[0].relevance_score, 1.0);
        // Rank 3 loses 0.2 and gains 0.15 for the GitHub keyword.
        assert!((results[1].relevance_score - 0.95).abs() < 1e-9);

        let bing = GenericSearchEngine::new(BING, ctx.clone(), rules, 10).unwrap();
        assert!(bing.fetch(&query).await.is_empty());
        assert_eq!(ctx.tracker().len(), 1);
    }
}
