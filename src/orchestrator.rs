//! Search orchestration: query generation, bounded fan-out, dedup and ranking.
//!
//! ```text
//!   EmailAddress
//!        │ generate_queries / academic_queries
//!        ▼
//!   Query × SourceFetcher (matching kind) ──cache hit──▶ cached hits
//!        │ miss
//!        ▼
//!   buffer_unordered(max_concurrency) ── deadline ──▶ partial run
//!        │
//!        ▼
//!   rank_results: dedup by normalized URL ─▶ sort ─▶ relevance filter ─▶ top N
//! ```
//!
//! Completion order never leaks into the output: [`rank_results`] orders by a
//! total key, so the same hits always come back in the same order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::Instrument;

use crate::cache::ResultCache;
use crate::config::SearchConfig;
use crate::fetch::FetchContext;
use crate::models::{Query, RawResult, SourceKind};
use crate::rate_limit::RateState;
use crate::rules::{CompiledRules, ExtractionRules};
use crate::score::{is_relevant, normalize_url};
use crate::sources::{SourceFetcher, SourceRegistry};
use crate::validate::EmailAddress;

// ═══════════════════════════════════════════════════════════════════════
// Query generation
// ═══════════════════════════════════════════════════════════════════════

fn push(out: &mut Vec<Query>, email: &str, affinity: SourceKind, text: String) {
    let priority = out.len() as u32;
    out.push(Query {
        text,
        affinity,
        priority,
        email: email.to_string(),
    });
}

/// General, social and PDF query variants, at most `max`.
pub fn generate_queries(address: &EmailAddress, max: usize) -> Vec<Query> {
    let EmailAddress {
        email,
        username,
        domain,
    } = address;
    let mut out = Vec::new();
    let general = [
        format!("\"{email}\""),
        format!("\"{username}\" site:{domain}"),
        format!("\"{username}\" \"{domain}\""),
        format!("\"{email}\" profile"),
        format!("\"{email}\" contact"),
        format!("\"{email}\" linkedin"),
        format!("\"{email}\" twitter"),
        format!("\"{email}\" facebook"),
        format!("\"{email}\" github"),
        format!("\"{username}\" profile {domain}"),
    ];
    for text in general {
        push(&mut out, email, SourceKind::GenericSearch, text);
    }
    push(&mut out, email, SourceKind::Social, email.clone());
    push(&mut out, email, SourceKind::Social, username.clone());
    push(&mut out, email, SourceKind::Pdf, format!("\"{email}\" filetype:pdf"));
    out.truncate(max);
    out
}

/// Role, platform, username and publication variants, at most `max`.
pub fn academic_queries(address: &EmailAddress, max: usize) -> Vec<Query> {
    let EmailAddress {
        email,
        username,
        domain,
    } = address;
    let mut texts: Vec<String> = [
        "professor",
        "PhD",
        "research",
        "university",
        "publication",
        "scholar",
        "academic",
        "faculty",
    ]
    .iter()
    .map(|role| format!("\"{email}\" {role}"))
    .collect();
    texts.extend(
        [
            "scholar.google.com",
            "researchgate.net",
            "academia.edu",
            "orcid.org",
            "arxiv.org",
            "pubmed.ncbi.nlm.nih.gov",
        ]
        .iter()
        .map(|site| format!("\"{email}\" site:{site}")),
    );
    texts.push(format!("\"{username}\" professor university"));
    texts.push(format!("\"{username}\" PhD {domain}"));
    texts.push(format!("\"{username}\" research publication"));
    texts.push(format!("\"{username}\" academic {domain}"));
    texts.extend(
        ["\"published in\"", "\"journal\"", "\"conference\"", "\"proceedings\"", "DOI"]
            .iter()
            .map(|term| format!("\"{email}\" {term}")),
    );

    let mut out = Vec::new();
    for text in texts.into_iter().take(max) {
        push(&mut out, email, SourceKind::Academic, text);
    }
    out
}

/// Follow-up query once a name is known.
pub fn enhanced_query(name: &str, email: &str) -> Query {
    Query {
        text: format!("\"{name}\" {email}"),
        affinity: SourceKind::GenericSearch,
        priority: 0,
        email: email.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Ranking
// ═══════════════════════════════════════════════════════════════════════

/// Total order used for both dedup winners and the final list: higher
/// score, then earlier rank, then source and URL.
fn better(a: &RawResult, b: &RawResult) -> Ordering {
    b.rank_score()
        .partial_cmp(&a.rank_score())
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.rank.cmp(&b.rank))
        .then_with(|| a.source.cmp(&b.source))
        .then_with(|| a.url.cmp(&b.url))
        .then_with(|| a.title.cmp(&b.title))
}

/// Deduplicate by normalized URL, sort, drop irrelevant hits, keep `max`.
pub fn rank_results(
    results: Vec<RawResult>,
    address: &EmailAddress,
    threshold: f64,
    max: usize,
    rules: &ExtractionRules,
) -> Vec<RawResult> {
    let mut best: HashMap<String, RawResult> = HashMap::new();
    for result in results {
        let key = normalize_url(&result.url);
        match best.get(&key) {
            Some(current) if better(current, &result) != Ordering::Greater => {}
            _ => {
                best.insert(key, result);
            }
        }
    }

    let mut ranked: Vec<RawResult> = best.into_values().collect();
    ranked.sort_by(better);
    ranked
        .into_iter()
        .filter(|r| is_relevant(r, &address.email, &address.username, threshold, rules))
        .take(max)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Orchestrator
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchStats {
    pub queries: usize,
    pub jobs: usize,
    pub cache_hits: usize,
    pub raw_results: usize,
    pub unique_results: usize,
    pub returned_results: usize,
    pub per_source: BTreeMap<String, usize>,
    pub errors: usize,
    pub cache_size: usize,
    pub deadline_hit: bool,
    pub rate_state: BTreeMap<String, RateState>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchRun {
    pub results: Vec<RawResult>,
    pub stats: SearchStats,
}

struct JobOutcome {
    label: String,
    results: Vec<RawResult>,
    cached: bool,
}

pub struct SearchOrchestrator {
    registry: Arc<SourceRegistry>,
    cache: Arc<ResultCache>,
    rules: Arc<CompiledRules>,
    ctx: Arc<FetchContext>,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        cache: Arc<ResultCache>,
        rules: Arc<CompiledRules>,
        ctx: Arc<FetchContext>,
        config: SearchConfig,
    ) -> Self {
        Self {
            registry,
            cache,
            rules,
            ctx,
            config,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Generated queries against every matching source, ranked.
    pub async fn collect(&self, address: &EmailAddress) -> SearchRun {
        let queries = generate_queries(address, self.config.max_queries);
        self.run(address, queries).await
    }

    /// Run `queries` against the sources whose kind matches each query's
    /// affinity. Never fails; sources that error contribute nothing.
    pub async fn run(&self, address: &EmailAddress, queries: Vec<Query>) -> SearchRun {
        let span = tracing::info_span!(
            "search",
            email = %address.email,
            run_id = %uuid::Uuid::new_v4()
        );
        self.run_inner(address, queries).instrument(span).await
    }

    async fn run_inner(&self, address: &EmailAddress, queries: Vec<Query>) -> SearchRun {
        let errors_before = self.ctx.tracker().len();
        let jobs: Vec<(Query, Arc<dyn SourceFetcher>)> = queries
            .iter()
            .flat_map(|q| {
                self.registry
                    .by_kind(q.affinity)
                    .into_iter()
                    .map(move |f| (q.clone(), f))
            })
            .collect();
        tracing::info!(queries = queries.len(), jobs = jobs.len(), "search started");

        let mut stats = SearchStats {
            queries: queries.len(),
            jobs: jobs.len(),
            ..SearchStats::default()
        };

        let cache = &self.cache;
        let outcomes = stream::iter(jobs.into_iter().map(|(query, fetcher)| async move {
            let label = fetcher.source_label();
            if let Some(results) = cache.get(&query.text, &label) {
                tracing::debug!(source = %label, query = %query.text, "cache hit");
                return JobOutcome {
                    label,
                    results,
                    cached: true,
                };
            }
            let results = fetcher.fetch(&query).await;
            if !results.is_empty() {
                cache.put(&query.text, &label, results.clone());
            }
            JobOutcome {
                label,
                results,
                cached: false,
            }
        }))
        .buffer_unordered(self.config.max_concurrency.max(1));

        let deadline = self.config.collect_deadline();
        let timer = async move {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let mut outcomes = Box::pin(outcomes.take_until(timer));

        let mut raw = Vec::new();
        let mut finished = 0;
        while let Some(outcome) = outcomes.next().await {
            finished += 1;
            if outcome.cached {
                stats.cache_hits += 1;
            }
            *stats.per_source.entry(outcome.label).or_insert(0) += outcome.results.len();
            raw.extend(outcome.results);
        }
        if finished < stats.jobs {
            stats.deadline_hit = true;
            tracing::warn!(finished, jobs = stats.jobs, "collection deadline reached");
        }

        stats.raw_results = raw.len();
        stats.unique_results = {
            let mut keys: Vec<String> = raw.iter().map(|r| normalize_url(&r.url)).collect();
            keys.sort();
            keys.dedup();
            keys.len()
        };
        let results = rank_results(
            raw,
            address,
            self.config.relevance_threshold,
            self.config.max_results,
            self.rules.tables(),
        );
        stats.returned_results = results.len();
        stats.errors = self.ctx.tracker().len().saturating_sub(errors_before);
        stats.cache_size = self.cache.len();
        stats.rate_state = self.ctx.limiter().snapshot();

        tracing::info!(
            raw = stats.raw_results,
            unique = stats.unique_results,
            returned = stats.returned_results,
            cache_hits = stats.cache_hits,
            errors = stats.errors,
            "search finished"
        );
        SearchRun { results, stats }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::parse_email;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    fn address() -> EmailAddress {
        parse_email("buch1202@mail.ru").unwrap()
    }

    fn hit(url: &str, title: &str, source: &str, rank: usize, score: f64) -> RawResult {
        let mut r = RawResult::new(title, url, "", source, SourceKind::GenericSearch, rank);
        r.relevance_score = score;
        r
    }

    /// Serves fixed hits after an optional delay, counting calls.
    struct StaticSource {
        name: &'static str,
        kind: SourceKind,
        hits: Vec<RawResult>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(name: &'static str, hits: Vec<RawResult>, delay_ms: u64) -> Self {
            Self {
                name,
                kind: SourceKind::GenericSearch,
                hits,
                delay: Duration::from_millis(delay_ms),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SourceFetcher for StaticSource {
        fn name(&self) -> &str {
            self.name
        }
        fn kind(&self) -> SourceKind {
            self.kind
        }
        async fn fetch(&self, _query: &Query) -> Vec<RawResult> {
            self.calls.fetch_add(1, AtomicOrdering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.hits.clone()
        }
    }

    fn orchestrator(sources: Vec<Arc<dyn SourceFetcher>>, config: SearchConfig) -> SearchOrchestrator {
        use crate::fetch::testing::{context, ScriptedFetcher};
        let mut registry = SourceRegistry::new();
        for s in sources {
            registry.register(s);
        }
        SearchOrchestrator::new(
            Arc::new(registry),
            Arc::new(ResultCache::new(Duration::from_secs(3600))),
            Arc::new(CompiledRules::builtin().unwrap()),
            Arc::new(context(Arc::new(ScriptedFetcher::new()))),
            config,
        )
    }

    #[test]
    fn general_queries_come_first_and_are_capped() {
        let queries = generate_queries(&address(), 15);
        assert_eq!(queries.len(), 13);
        assert_eq!(queries[0].text, "\"buch1202@mail.ru\"");
        assert_eq!(queries[1].text, "\"buch1202\" site:mail.ru");
        assert_eq!(queries[9].text, "\"buch1202\" profile mail.ru");
        assert_eq!(queries[10].affinity, SourceKind::Social);
        assert_eq!(queries[12].affinity, SourceKind::Pdf);
        assert_eq!(generate_queries(&address(), 3).len(), 3);
        assert!(queries.iter().enumerate().all(|(i, q)| q.priority == i as u32));
    }

    #[test]
    fn academic_query_families() {
        let all = academic_queries(&address(), 100);
        assert_eq!(all.len(), 23);
        assert_eq!(all[8].text, "\"buch1202@mail.ru\" site:scholar.google.com");
        assert_eq!(all[15].text, "\"buch1202\" PhD mail.ru");
        assert_eq!(all[22].text, "\"buch1202@mail.ru\" DOI");
        let capped = academic_queries(&address(), 15);
        assert_eq!(capped.len(), 15);
        assert_eq!(capped[14].text, "\"buch1202\" professor university");
    }

    #[test]
    fn dedup_keeps_the_higher_score() {
        let rules = ExtractionRules::default();
        let results = vec![
            hit("https://ex.com/a/", "Profile A", "Bing", 2, 0.8),
            hit("https://ex.com/a?utm_source=x", "Profile A", "Google", 1, 0.9),
            hit("https://ex.com/b", "Profile B", "Google", 3, 0.7),
        ];
        let ranked = rank_results(results, &address(), 0.3, 10, &rules);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].source, "Google");
        assert_eq!(ranked[0].relevance_score, 0.9);
    }

    #[test]
    fn equal_scores_prefer_the_earlier_rank() {
        let rules = ExtractionRules::default();
        let results = vec![
            hit("https://ex.com/a", "Profile A", "Bing", 4, 0.8),
            hit("https://ex.com/a", "Profile A", "Google", 2, 0.8),
            hit("https://ex.com/c", "Profile C", "Yandex", 1, 0.8),
        ];
        let ranked = rank_results(results, &address(), 0.3, 10, &rules);
        assert_eq!(ranked[0].url, "https://ex.com/c");
        assert_eq!(ranked[1].source, "Google");
    }

    #[test]
    fn ranking_ignores_input_order() {
        let rules = ExtractionRules::default();
        let results = vec![
            hit("https://a.com", "Profile one", "Google", 1, 0.5),
            hit("https://b.com", "Profile two", "Bing", 1, 0.5),
            hit("https://c.com", "Profile three", "Google", 2, 0.9),
            hit("https://a.com/", "Profile one", "Bing", 1, 0.5),
        ];
        let forward = rank_results(results.clone(), &address(), 0.3, 10, &rules);
        let mut reversed_input = results;
        reversed_input.reverse();
        let backward = rank_results(reversed_input, &address(), 0.3, 10, &rules);
        let urls = |v: &[RawResult]| v.iter().map(|r| (r.url.clone(), r.source.clone())).collect::<Vec<_>>();
        assert_eq!(urls(&forward), urls(&backward));
        assert_eq!(forward[0].url, "https://c.com");
    }

    #[test]
    fn blocklisted_hit_is_filtered_and_top_n_applies() {
        let rules = ExtractionRules::default();
        let results = vec![
            hit("https://ex.com/1", "buch1202 scam warning", "Google", 1, 1.0),
            hit("https://ex.com/2", "Profile", "Google", 2, 0.9),
            hit("https://ex.com/3", "Contact page", "Google", 3, 0.8),
        ];
        let ranked = rank_results(results, &address(), 0.3, 1, &rules);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].url, "https://ex.com/2");
    }

    #[tokio::test(start_paused = true)]
    async fn second_run_is_served_from_cache() {
        let source = Arc::new(StaticSource::new(
            "Google",
            vec![hit("https://ex.com/p", "buch1202 profile", "Google", 1, 0.9)],
            10,
        ));
        let orch = orchestrator(vec![source.clone()], SearchConfig::default());
        let queries = vec![enhanced_query("Ivan Petrov", "buch1202@mail.ru")];

        let first = orch.run(&address(), queries.clone()).await;
        assert_eq!(first.results.len(), 1);
        assert_eq!(first.stats.cache_hits, 0);

        let second = orch.run(&address(), queries).await;
        assert_eq!(second.stats.cache_hits, 1);
        assert_eq!(source.calls.load(AtomicOrdering::SeqCst), 1);
        assert_eq!(second.stats.per_source.get("Search-Google"), Some(&1));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_returns_partial_results() {
        let fast = Arc::new(StaticSource::new(
            "Fast",
            vec![hit("https://fast.com/p", "buch1202 profile", "Fast", 1, 0.9)],
            10,
        ));
        let slow = Arc::new(StaticSource::new(
            "Slow",
            vec![hit("https://slow.com/p", "buch1202 profile", "Slow", 1, 0.9)],
            600_000,
        ));
        let config = SearchConfig {
            collect_deadline_secs: Some(60),
            ..SearchConfig::default()
        };
        let orch = orchestrator(vec![fast, slow], config);
        let run = orch
            .run(&address(), vec![enhanced_query("Ivan Petrov", "buch1202@mail.ru")])
            .await;
        assert!(run.stats.deadline_hit);
        assert_eq!(run.results.len(), 1);
        assert_eq!(run.results[0].url, "https://fast.com/p");
    }

    #[tokio::test(start_paused = true)]
    async fn queries_only_reach_sources_of_their_kind() {
        let web = Arc::new(StaticSource::new("Google", Vec::new(), 0));
        let mut social = StaticSource::new("GitHub", Vec::new(), 0);
        social.kind = SourceKind::Social;
        let social = Arc::new(social);
        let orch = orchestrator(vec![web.clone(), social.clone()], SearchConfig::default());

        let run = orch.collect(&address()).await;
        assert_eq!(run.stats.queries, 13);
        // 10 general queries to the engine, 2 social queries, no PDF source.
        assert_eq!(run.stats.jobs, 12);
        assert_eq!(web.calls.load(AtomicOrdering::SeqCst), 10);
        assert_eq!(social.calls.load(AtomicOrdering::SeqCst), 2);
    }
}
