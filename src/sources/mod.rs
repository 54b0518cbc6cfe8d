//! Source fetchers: one query against one external source.
//!
//! Four families share the [`SourceFetcher`] trait:
//!
//! | Variant | Module | Produces |
//! |---------|--------|----------|
//! | [`GenericSearchEngine`](engine::GenericSearchEngine) | [`engine`] | web hits with relevance scores |
//! | [`AcademicRepository`](academic::AcademicRepository) | [`academic`] | hits with academic scores and indicators |
//! | [`GitHubUsers`](social::GitHubUsers) | [`social`] | profile hits, verified when matched by email |
//! | [`PdfRepository`](pdf::PdfRepository) | [`pdf`] | documents that mention the target email |
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                SourceRegistry                 │
//! │ ┌─────────┐ ┌──────────┐ ┌────────┐ ┌───────┐ │
//! │ │ Engines │ │ Academic │ │ Social │ │  PDF  │ │
//! │ └─────────┘ └──────────┘ └────────┘ └───────┘ │
//! └───────────────────────┬───────────────────────┘
//!                         ▼
//!              FetchContext (limit, retry, track)
//!                         ▼
//!                    PageFetcher
//! ```
//!
//! A fetcher never fails: network and parse problems are recorded in the
//! [`ErrorTracker`](crate::error_tracker::ErrorTracker) by the fetch
//! context and the fetcher returns an empty list.

pub mod academic;
pub mod engine;
pub mod pdf;
pub mod social;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::fetch::FetchContext;
use crate::models::{Query, RawResult, SourceKind};
use crate::pdf::PdfAnalyzer;
use crate::rules::CompiledRules;

// ═══════════════════════════════════════════════════════════════════════
// SourceFetcher Trait
// ═══════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Display name, e.g. `"Google"` or `"ResearchGate"`.
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Provenance label recorded on profiles, also used as the cache key.
    fn source_label(&self) -> String {
        self.kind().label_for(self.name())
    }

    /// Run one query. Returns an empty list on any failure.
    async fn fetch(&self, query: &Query) -> Vec<RawResult>;
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

#[derive(Default)]
pub struct SourceRegistry {
    fetchers: Vec<Arc<dyn SourceFetcher>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every source enabled in `config`. Unknown names are skipped
    /// with a warning.
    pub fn from_config(
        config: &Config,
        ctx: Arc<FetchContext>,
        rules: Arc<CompiledRules>,
        pdf: Arc<PdfAnalyzer>,
    ) -> Self {
        let mut registry = Self::new();
        let per_source = config.search.max_results_per_source;

        for name in &config.search.engines {
            match engine::builtin_engine(name) {
                Some(spec) => match engine::GenericSearchEngine::new(
                    spec,
                    ctx.clone(),
                    rules.clone(),
                    per_source,
                ) {
                    Ok(e) => registry.register(Arc::new(e)),
                    Err(e) => tracing::warn!(engine = %name, "engine disabled: {e}"),
                },
                None => tracing::warn!(engine = %name, "unknown search engine, skipping"),
            }
        }

        for name in &config.search.academic_sources {
            match academic::AcademicRepository::builtin(name, ctx.clone(), rules.clone(), per_source)
            {
                Some(Ok(repo)) => registry.register(Arc::new(repo)),
                Some(Err(e)) => tracing::warn!(source = %name, "academic source disabled: {e}"),
                None => tracing::warn!(source = %name, "unknown academic source, skipping"),
            }
        }

        for name in &config.search.social_sources {
            match name.as_str() {
                "github" => registry.register(Arc::new(social::GitHubUsers::new(
                    ctx.clone(),
                    config.search.github_token.clone(),
                    per_source,
                ))),
                other => tracing::warn!(source = %other, "unknown social source, skipping"),
            }
        }

        if config.pdf.enabled {
            for src in &config.pdf.sources {
                registry.register(Arc::new(pdf::PdfRepository::new(
                    src.clone(),
                    config.pdf.clone(),
                    ctx.clone(),
                    pdf.clone(),
                )));
            }
        }

        registry
    }

    pub fn register(&mut self, fetcher: Arc<dyn SourceFetcher>) {
        self.fetchers.push(fetcher);
    }

    pub fn fetchers(&self) -> &[Arc<dyn SourceFetcher>] {
        &self.fetchers
    }

    pub fn by_kind(&self, kind: SourceKind) -> Vec<Arc<dyn SourceFetcher>> {
        self.fetchers
            .iter()
            .filter(|f| f.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn SourceFetcher>> {
        self.fetchers.iter().find(|f| f.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}
