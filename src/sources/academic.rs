//! Academic repositories: result pages scored for academic signal.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IntelError;
use crate::fetch::FetchContext;
use crate::models::{Query, RawResult, SourceKind};
use crate::rules::CompiledRules;
use crate::score::{academic_indicators, academic_score, relevance_score};
use crate::sources::engine::{parse_result_page, search_url, EngineSpec, ResultSelectors, GOOGLE};
use crate::sources::SourceFetcher;

pub const GOOGLE_SCHOLAR: EngineSpec = EngineSpec {
    name: "Google Scholar",
    url_template: "https://scholar.google.com/scholar?q={query}&hl=en&num={num}",
    result: "div.gs_ri",
    title: "h3.gs_rt",
    link: "h3.gs_rt a[href]",
    snippet: "div.gs_rs",
};

pub struct AcademicRepository {
    name: String,
    spec: EngineSpec,
    selectors: ResultSelectors,
    ctx: Arc<FetchContext>,
    rules: Arc<CompiledRules>,
    max_results: usize,
}

impl AcademicRepository {
    pub fn new(
        name: impl Into<String>,
        spec: EngineSpec,
        ctx: Arc<FetchContext>,
        rules: Arc<CompiledRules>,
        max_results: usize,
    ) -> Result<Self, IntelError> {
        Ok(Self {
            name: name.into(),
            selectors: ResultSelectors::new(&spec)?,
            spec,
            ctx,
            rules,
            max_results,
        })
    }

    /// `google_scholar`, or `google` for web search with academic scoring.
    pub fn builtin(
        name: &str,
        ctx: Arc<FetchContext>,
        rules: Arc<CompiledRules>,
        max_results: usize,
    ) -> Option<Result<Self, IntelError>> {
        match name {
            "google_scholar" | "scholar" => Some(Self::new(
                "Google Scholar",
                GOOGLE_SCHOLAR,
                ctx,
                rules,
                max_results,
            )),
            "google" => Some(Self::new("Google", GOOGLE, ctx, rules, max_results)),
            _ => None,
        }
    }
}

#[async_trait]
impl SourceFetcher for AcademicRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Academic
    }

    async fn fetch(&self, query: &Query) -> Vec<RawResult> {
        let url = search_url(self.spec.url_template, &query.text, self.max_results);
        let Ok(response) = self.ctx.get(&url).await else {
            return Vec::new();
        };

        let tables = self.rules.tables();
        parse_result_page(&response.text(), &url, &self.selectors, self.max_results)
            .into_iter()
            .map(|hit| {
                let mut result = RawResult::new(
                    hit.title,
                    hit.url,
                    hit.snippet,
                    self.name.clone(),
                    SourceKind::Academic,
                    hit.rank,
                );
                result.relevance_score =
                    relevance_score(&result.title, &result.snippet, result.rank, tables);
                result.academic_score = Some(academic_score(
                    &result.title,
                    &result.snippet,
                    &result.url,
                    &query.email,
                    tables,
                ));
                result.academic_indicators =
                    academic_indicators(&result.title, &result.snippet, &result.url);
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::{context, ScriptedFetcher};

    const SCHOLAR_PAGE: &str = r#"
        <div class="gs_r">
          <div class="gs_ri">
            <h3 class="gs_rt"><a href="https://arxiv.org/abs/2101.00001">Deep learning for protein folding</a></h3>
            <div class="gs_rs">I Petrov - Journal of Computational Biology, 2021. Contact: buch1202@mail.ru</div>
          </div>
        </div>"#;

    #[tokio::test(start_paused = true)]
    async fn scholar_hits_carry_academic_scores() {
        let fetcher = Arc::new(ScriptedFetcher::new().html("scholar.google.com", SCHOLAR_PAGE));
        let ctx = Arc::new(context(fetcher));
        let rules = Arc::new(CompiledRules::builtin().unwrap());
        let repo = AcademicRepository::builtin("google_scholar", ctx, rules, 10)
            .unwrap()
            .unwrap();
        let query = Query {
            text: "\"buch1202@mail.ru\" research".to_string(),
            affinity: SourceKind::Academic,
            priority: 2,
            email: "buch1202@mail.ru".to_string(),
        };

        let results = repo.fetch(&query).await;
        assert_eq!(results.len(), 1);
        let hit = &results[0];
        assert_eq!(hit.kind, SourceKind::Academic);
        assert_eq!(hit.url, "https://arxiv.org/abs/2101.00001");
        // Platform 0.4, journal 0.25 and the email 0.3 already exceed 0.9.
        assert!(hit.academic_score.unwrap() > 0.9);
        assert!(hit.academic_indicators.contains(&"publications".to_string()));
        assert_eq!(repo.source_label(), "Academic-Google Scholar");
    }
}
