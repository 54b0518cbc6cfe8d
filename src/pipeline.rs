//! Pipeline entry points.
//!
//! ```text
//!  collect_profile(email)
//!     │ parse_email ──invalid──▶ IntelError::InvalidEmail (no I/O)
//!     │ store.get ──fresh──▶ stored profile
//!     ▼
//!  ┌──────────────────────────┐   ┌────────────────────┐
//!  │ orchestrator.run         │   │ PDF repositories   │   concurrently
//!  │ (general/social/academic)│   │ download + analyze │
//!  └────────────┬─────────────┘   └─────────┬──────────┘
//!               ▼                           ▼
//!     facts per hit + scraped top pages   facts per document
//!               └────────────┬──────────────┘
//!                            ▼
//!          ProfileAggregator::merge ─▶ enhanced "<name>" query ─▶ store.upsert
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use tracing::Instrument;

use crate::academic::{AcademicExtractor, AcademicFacts};
use crate::aggregate::{facts_from_pdf, ProfileAggregator};
use crate::analyzer::{ContentAnalyzer, TextAnalysisBackend};
use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::IntelError;
use crate::error_tracker::ErrorTracker;
use crate::fetch::{FetchContext, HttpPageFetcher, PageFetcher};
use crate::models::{ExtractedFacts, PdfResult, Profile, RawResult, SourceKind};
use crate::orchestrator::{
    academic_queries, enhanced_query, generate_queries, SearchOrchestrator, SearchRun,
};
use crate::pdf::PdfAnalyzer;
use crate::rate_limit::RateLimiter;
use crate::rules::ExtractionRules;
use crate::sources::pdf::PdfRepository;
use crate::sources::SourceRegistry;
use crate::store::{InMemoryProfileStore, ProfileStore};
use crate::twin::{DigitalTwin, DigitalTwinSynthesizer};
use crate::validate::{parse_email, EmailAddress};

pub struct PipelineBuilder {
    config: Config,
    page_fetcher: Option<Arc<dyn PageFetcher>>,
    store: Option<Arc<dyn ProfileStore>>,
    rules: Option<ExtractionRules>,
    text_backend: Option<Arc<dyn TextAnalysisBackend>>,
}

impl PipelineBuilder {
    /// Transport for every request. Defaults to [`HttpPageFetcher`].
    pub fn page_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.page_fetcher = Some(fetcher);
        self
    }

    /// Defaults to an [`InMemoryProfileStore`].
    pub fn store(mut self, store: Arc<dyn ProfileStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Overrides both the built-in tables and `config.rules_path`.
    pub fn rules(mut self, rules: ExtractionRules) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn text_backend(mut self, backend: Arc<dyn TextAnalysisBackend>) -> Self {
        self.text_backend = Some(backend);
        self
    }

    pub fn build(self) -> anyhow::Result<Pipeline> {
        let config = self.config;
        config.validate()?;

        let tables = match (self.rules, &config.rules_path) {
            (Some(rules), _) => rules,
            (None, Some(path)) => ExtractionRules::load(path)?,
            (None, None) => ExtractionRules::default(),
        };
        let rules = Arc::new(tables.compile()?);

        let fetcher: Arc<dyn PageFetcher> = match self.page_fetcher {
            Some(f) => f,
            None => Arc::new(HttpPageFetcher::new().context("Failed to build HTTP client")?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryProfileStore::new()));

        let ctx = Arc::new(FetchContext::new(
            fetcher,
            Arc::new(RateLimiter::new(config.rate_limit.clone())),
            Arc::new(ErrorTracker::new()),
            config.fetch.clone(),
            config.search.user_agents.clone(),
            config.search.max_concurrency,
        ));
        let pdf = Arc::new(PdfAnalyzer::new(config.pdf.clone()));
        let registry = Arc::new(SourceRegistry::from_config(
            &config,
            ctx.clone(),
            rules.clone(),
            pdf.clone(),
        ));
        tracing::debug!(sources = registry.len(), "source registry built");

        let pdf_sources = config
            .pdf
            .sources
            .iter()
            .map(|src| {
                Arc::new(PdfRepository::new(
                    src.clone(),
                    config.pdf.clone(),
                    ctx.clone(),
                    pdf.clone(),
                ))
            })
            .collect();

        let orchestrator = SearchOrchestrator::new(
            registry,
            Arc::new(ResultCache::new(Duration::from_secs(config.cache.ttl_secs))),
            rules.clone(),
            ctx.clone(),
            config.search.clone(),
        );

        Ok(Pipeline {
            analyzer: ContentAnalyzer::new(rules.clone(), self.text_backend),
            academic: AcademicExtractor::new(rules),
            twins: DigitalTwinSynthesizer::new(config.twin.clone()),
            aggregator: ProfileAggregator::new(),
            orchestrator,
            ctx,
            pdf,
            pdf_sources,
            store,
            config,
        })
    }
}

pub struct Pipeline {
    config: Config,
    store: Arc<dyn ProfileStore>,
    ctx: Arc<FetchContext>,
    orchestrator: SearchOrchestrator,
    analyzer: ContentAnalyzer,
    academic: AcademicExtractor,
    pdf: Arc<PdfAnalyzer>,
    pdf_sources: Vec<Arc<PdfRepository>>,
    aggregator: ProfileAggregator,
    twins: DigitalTwinSynthesizer,
}

impl Pipeline {
    pub fn builder(config: Config) -> PipelineBuilder {
        PipelineBuilder {
            config,
            page_fetcher: None,
            store: None,
            rules: None,
            text_backend: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    pub fn fetch_context(&self) -> &FetchContext {
        &self.ctx
    }

    // ═══════════════════════════════════════════════════════════════════
    // Profiles
    // ═══════════════════════════════════════════════════════════════════

    /// Collect, merge and store the profile for `email`.
    ///
    /// Without `force_refresh` a stored profile younger than
    /// `cache.profile_ttl_secs` is returned untouched and an older one is
    /// refreshed in place. `force_refresh` starts from an empty profile.
    pub async fn collect_profile(
        &self,
        email: &str,
        force_refresh: bool,
    ) -> Result<Profile, IntelError> {
        let address = parse_email(email)?;
        let span = tracing::info_span!(
            "collect",
            email = %address.email,
            run_id = %uuid::Uuid::new_v4()
        );
        self.collect_inner(address, force_refresh)
            .instrument(span)
            .await
    }

    async fn collect_inner(
        &self,
        address: EmailAddress,
        force_refresh: bool,
    ) -> Result<Profile, IntelError> {
        let stored = self.load(&address.email).await?;
        let base = match stored {
            Some(profile) if !force_refresh && self.is_fresh(&profile) => {
                tracing::info!("returning stored profile");
                return Ok(profile);
            }
            Some(_) if force_refresh => None,
            other => other,
        };

        let mut queries: Vec<_> = generate_queries(&address, self.config.search.max_queries)
            .into_iter()
            .filter(|q| q.affinity != SourceKind::Pdf)
            .collect();
        let offset = queries.len() as u32;
        queries.extend(
            academic_queries(&address, self.config.search.collect_academic_queries)
                .into_iter()
                .map(|mut q| {
                    q.priority += offset;
                    q
                }),
        );
        let (run, documents) = tokio::join!(
            self.orchestrator.run(&address, queries),
            self.pdf_documents(&address.email)
        );
        tracing::info!(
            results = run.results.len(),
            documents = documents.len(),
            "sources collected"
        );

        let mut facts = self.facts_from_results(&run.results);
        facts.extend(self.scrape_top_pages(&run.results).await);
        facts.extend(
            documents
                .iter()
                .filter(|d| d.email_found)
                .map(|d| facts_from_pdf(d, &address.email)),
        );

        let mut profile = self.aggregator.merge(&address.email, base, facts);
        profile.email_info = Some(address.info());
        self.aggregator.attach_search_results(&mut profile, &run.results);
        self.aggregator.attach_pdf_documents(
            &mut profile,
            &documents
                .into_iter()
                .filter(|d| d.email_found)
                .collect::<Vec<_>>(),
        );

        if let Some(name) = profile.person_info.name.clone() {
            let extra = self
                .orchestrator
                .run(&address, vec![enhanced_query(&name, &address.email)])
                .await;
            tracing::info!(name = %name, results = extra.results.len(), "enhanced search done");
            let facts = self.facts_from_results(&extra.results);
            profile = self.aggregator.merge(&address.email, Some(profile), facts);
            self.aggregator.attach_search_results(&mut profile, &extra.results);
        }

        self.save(&profile).await?;
        tracing::info!(
            confidence = profile.confidence_score(),
            completeness = profile.completeness_score(),
            "profile collected"
        );
        Ok(profile)
    }

    /// The stored profile, without collecting.
    pub async fn profile(&self, email: &str) -> Result<Option<Profile>, IntelError> {
        let address = parse_email(email)?;
        self.load(&address.email).await
    }

    fn is_fresh(&self, profile: &Profile) -> bool {
        let age = chrono::Utc::now() - profile.last_updated;
        age < chrono::Duration::seconds(self.config.cache.profile_ttl_secs as i64)
    }

    async fn load(&self, email: &str) -> Result<Option<Profile>, IntelError> {
        self.store.get(email).await.map_err(|e| {
            tracing::error!(email, "profile store read failed: {e:#}");
            IntelError::Store(e)
        })
    }

    async fn save(&self, profile: &Profile) -> Result<(), IntelError> {
        self.store.upsert(profile).await.map_err(|e| {
            tracing::error!(email = %profile.email, "profile store write failed: {e:#}");
            IntelError::Store(e)
        })
    }

    fn facts_from_results(&self, results: &[RawResult]) -> Vec<ExtractedFacts> {
        results
            .iter()
            .flat_map(|r| {
                let academic = self.academic.facts_from_result(r);
                let academic = (!academic.academic.is_empty()).then_some(academic);
                std::iter::once(self.analyzer.facts_from_result(r)).chain(academic)
            })
            .collect()
    }

    /// Fetch and analyze the top web pages, in rank order.
    async fn scrape_top_pages(&self, results: &[RawResult]) -> Vec<ExtractedFacts> {
        let urls: Vec<String> = results
            .iter()
            .filter(|r| r.kind != SourceKind::Pdf)
            .filter(|r| r.url.starts_with("http"))
            .take(self.config.search.scrape_top_pages)
            .map(|r| r.url.clone())
            .collect();

        stream::iter(urls)
            .map(|url| async move {
                let page = self.ctx.get(&url).await.ok()?;
                let facts = self.analyzer.analyze(&page.text(), &url);
                tracing::debug!(url = %url, empty = facts.is_empty(), "page analyzed");
                (!facts.is_empty()).then_some(facts)
            })
            .buffered(self.config.search.max_concurrency.max(1))
            .filter_map(|facts| async move { facts })
            .collect()
            .await
    }

    // ═══════════════════════════════════════════════════════════════════
    // Narrower entry points
    // ═══════════════════════════════════════════════════════════════════

    /// Generated queries against every enabled source, ranked.
    pub async fn search(&self, email: &str) -> Result<SearchRun, IntelError> {
        let address = parse_email(email)?;
        Ok(self.orchestrator.collect(&address).await)
    }

    /// Academic queries, then degree/position/publication extraction.
    pub async fn analyze_academic(&self, email: &str) -> Result<AcademicFacts, IntelError> {
        let address = parse_email(email)?;
        let queries = academic_queries(&address, self.config.search.max_queries);
        let run = self.orchestrator.run(&address, queries).await;
        tracing::info!(results = run.results.len(), "academic search done");
        Ok(self.academic.build(&address.email, run.results))
    }

    /// Documents from every PDF source that mention `email`.
    ///
    /// When text extraction is disabled the result is a single
    /// `PDF Processing Unavailable` entry.
    pub async fn analyze_pdf(&self, email: &str) -> Result<Vec<PdfResult>, IntelError> {
        let address = parse_email(email)?;
        Ok(self.pdf_documents(&address.email).await)
    }

    /// Analyze a local PDF for `email`.
    pub async fn analyze_pdf_file(
        &self,
        path: &Path,
        email: &str,
    ) -> Result<PdfResult, IntelError> {
        let address = parse_email(email)?;
        Ok(self.pdf.analyze_file(path, &address.email).await)
    }

    /// Academic analysis folded into a digital twin. Social profiles come
    /// from the stored profile when one exists.
    pub async fn digital_twin(&self, email: &str) -> Result<DigitalTwin, IntelError> {
        let academic = self.analyze_academic(email).await?;
        let social = self
            .load(&academic.email)
            .await?
            .map(|p| p.social_profiles)
            .unwrap_or_default();
        Ok(self
            .twins
            .synthesize(&academic.email, &academic, &academic.search_results, &social))
    }

    async fn pdf_documents(&self, email: &str) -> Vec<PdfResult> {
        if !self.pdf.is_available() {
            return vec![self.pdf.unavailable("", "PDF")];
        }
        let per_source: Vec<Vec<PdfResult>> = stream::iter(self.pdf_sources.iter())
            .map(|s| s.fetch_documents(email))
            .buffered(self.config.search.max_concurrency.max(1))
            .collect()
            .await;
        per_source.into_iter().flatten().collect()
    }
}
