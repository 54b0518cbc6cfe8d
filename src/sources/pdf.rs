//! PDF search: find PDF links for an address, download and analyze them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{PdfConfig, PdfSourceConfig};
use crate::fetch::{FetchContext, Request};
use crate::models::{PdfResult, Query, RawResult, SourceKind};
use crate::pdf::{extract_pdf_links, PdfAnalyzer};
use crate::sources::SourceFetcher;

/// One configured PDF source: a search page template whose results are
/// scanned for PDF links.
pub struct PdfRepository {
    source: PdfSourceConfig,
    config: PdfConfig,
    ctx: Arc<FetchContext>,
    analyzer: Arc<PdfAnalyzer>,
}

impl PdfRepository {
    pub fn new(
        source: PdfSourceConfig,
        config: PdfConfig,
        ctx: Arc<FetchContext>,
        analyzer: Arc<PdfAnalyzer>,
    ) -> Self {
        Self {
            source,
            config,
            ctx,
            analyzer,
        }
    }

    pub fn search_url(&self, email: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(email.as_bytes()).collect();
        self.source.url_template.replace("{email}", &encoded)
    }

    /// Documents from this source that mention `email`, at most
    /// `max_documents_per_source`.
    pub async fn fetch_documents(&self, email: &str) -> Vec<PdfResult> {
        let search_url = self.search_url(email);
        let Ok(page) = self.ctx.get(&search_url).await else {
            return Vec::new();
        };
        let links = extract_pdf_links(&page.text(), &search_url, self.config.max_links_per_page);
        tracing::debug!(source = %self.source.name, links = links.len(), "pdf links found");

        let timeout = Duration::from_secs(self.config.download_timeout_secs);
        let mut documents = Vec::new();
        for link in links {
            if documents.len() >= self.config.max_documents_per_source {
                break;
            }
            let Ok(response) = self
                .ctx
                .send(Request::pdf(&link, self.config.min_bytes, timeout))
                .await
            else {
                continue;
            };

            let analyzer = self.analyzer.clone();
            let (source, url, target, search) = (
                self.source.name.clone(),
                link.clone(),
                email.to_string(),
                search_url.clone(),
            );
            let analyzed = tokio::task::spawn_blocking(move || {
                analyzer.analyze_bytes(&response.body, &url, &target, &source, &search)
            })
            .await;

            match analyzed {
                Ok(doc) if doc.email_found => documents.push(doc),
                Ok(doc) => {
                    tracing::debug!(url = %doc.url, "pdf does not mention the address");
                }
                Err(e) => tracing::warn!(url = %link, "pdf analysis task failed: {e}"),
            }
        }
        documents
    }
}

/// Search-result view of an analyzed document.
pub fn document_to_result(doc: &PdfResult, rank: usize) -> RawResult {
    let snippet = doc
        .email_contexts
        .first()
        .map(|c| c.line.clone())
        .unwrap_or_default();
    let mut result = RawResult::new(
        doc.title.clone(),
        doc.url.clone(),
        snippet,
        doc.source.clone(),
        SourceKind::Pdf,
        rank,
    );
    result.relevance_score = doc.confidence_score;
    result.verified = doc.email_found;
    result
}

#[async_trait]
impl SourceFetcher for PdfRepository {
    fn name(&self) -> &str {
        &self.source.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Pdf
    }

    async fn fetch(&self, query: &Query) -> Vec<RawResult> {
        self.fetch_documents(&query.email)
            .await
            .iter()
            .enumerate()
            .map(|(i, doc)| document_to_result(doc, i + 1))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::testing::{context, ScriptedFetcher};
    use crate::fetch::PageResponse;
    use crate::pdf::minimal_pdf;

    fn pdf_response(lines: &[&str]) -> Result<PageResponse, FetchError> {
        Ok(PageResponse {
            status: 200,
            content_type: Some("application/pdf".to_string()),
            body: minimal_pdf(lines),
        })
    }

    fn repository(fetcher: Arc<ScriptedFetcher>) -> PdfRepository {
        let config = PdfConfig::default();
        PdfRepository::new(
            PdfSourceConfig {
                name: "Google".to_string(),
                url_template: "https://www.google.com/search?q=%22{email}%22+filetype:pdf"
                    .to_string(),
            },
            config.clone(),
            Arc::new(context(fetcher)),
            Arc::new(PdfAnalyzer::new(config)),
        )
    }

    #[test]
    fn search_url_encodes_the_address() {
        let repo = repository(Arc::new(ScriptedFetcher::new()));
        assert_eq!(
            repo.search_url("buch1202@mail.ru"),
            "https://www.google.com/search?q=%22buch1202%40mail.ru%22+filetype:pdf"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_only_documents_mentioning_the_address() {
        let page = r#"<a href="https://clinic.ru/report.pdf">r</a>
                      <a href="https://other.org/menu.pdf">m</a>
                      <a href="https://tiny.org/stub.pdf">s</a>"#;
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .html("google.com/search", page)
                .route(
                    "clinic.ru/report.pdf",
                    vec![pdf_response(&["Annual clinic report", "Contact buch1202@mail.ru"])],
                )
                .route(
                    "other.org/menu.pdf",
                    vec![pdf_response(&["Cafeteria menu for spring", "Soup and bread"])],
                )
                .route(
                    "tiny.org/stub.pdf",
                    vec![Ok(PageResponse {
                        status: 200,
                        content_type: Some("application/pdf".to_string()),
                        body: b"%PDF-1.4".to_vec(),
                    })],
                ),
        );
        let repo = repository(fetcher.clone());

        let docs = repo.fetch_documents("buch1202@mail.ru").await;
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].url, "https://clinic.ru/report.pdf");
        assert_eq!(docs[0].source, "Google");
        assert!(docs[0].search_url.contains("buch1202%40mail.ru"));

        let query = Query {
            text: "\"buch1202@mail.ru\" filetype:pdf".to_string(),
            affinity: SourceKind::Pdf,
            priority: 12,
            email: "buch1202@mail.ru".to_string(),
        };
        let results = repo.fetch(&query).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].kind, SourceKind::Pdf);
        assert!(results[0].verified);
        assert_eq!(repo.source_label(), "PDF-Google");
    }
}
