//! End-to-end collection through a scripted fetcher: search results,
//! scraped pages and a real PDF, merged into one stored profile.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use email_intel::config::{Config, PdfSourceConfig};
use email_intel::error::FetchError;
use email_intel::fetch::{PageFetcher, PageResponse};
use email_intel::store::{InMemoryProfileStore, ProfileStore};
use email_intel::{IntelError, Pipeline};

const EMAIL: &str = "buch1202@mail.ru";

const GOOGLE_PAGE: &str = r#"
<html><body>
  <div class="g">
    <a href="https://clinic.test/staff/petrov"><h3>Dr. Petrov - Clinic Staff</h3></a>
    <div class="VwiC3b">Contact buch1202@mail.ru for appointments. Company: City Clinic.</div>
  </div>
  <div class="g">
    <a href="https://www.linkedin.com/in/ipetrov"><h3>Rehabilitation physician | LinkedIn</h3></a>
    <div class="VwiC3b">Rehabilitation physician reachable at buch1202@mail.ru</div>
  </div>
</body></html>
"#;

const STAFF_PAGE: &str = r#"
<html><head><title>Staff</title></head><body>
  <h1>Ivan Petrov</h1>
  <p class="job-title">Rehabilitation physician</p>
  <p class="location">Moscow</p>
  <p>Phone: (555) 123-4567</p>
</body></html>
"#;

const PDF_SEARCH_PAGE: &str =
    r#"<html><body><a href="https://clinic.test/files/annual-report.pdf">Annual report</a></body></html>"#;

/// Serves canned responses by URL substring; unmatched URLs get 404.
struct Scripted {
    routes: Vec<(&'static str, PageResponse)>,
    calls: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(routes: Vec<(&'static str, PageResponse)>) -> Self {
        Self {
            routes,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for Scripted {
    async fn fetch(
        &self,
        url: &str,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<PageResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        let hit = self
            .routes
            .iter()
            .find(|(needle, _)| url.contains(needle))
            .map(|(_, response)| response.clone());
        Ok(hit.unwrap_or(PageResponse {
            status: 404,
            content_type: Some("text/html".to_string()),
            body: Vec::new(),
        }))
    }
}

fn html(body: &str) -> PageResponse {
    PageResponse {
        status: 200,
        content_type: Some("text/html; charset=utf-8".to_string()),
        body: body.as_bytes().to_vec(),
    }
}

/// One page of Courier text, one line per entry.
fn pdf_bytes(lines: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![72.into(), 720.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn config() -> Config {
    let mut config = Config::default();
    config.search.engines = vec!["google".to_string()];
    config.search.academic_sources = Vec::new();
    config.search.social_sources = Vec::new();
    config.search.user_agents = Vec::new();
    config.search.max_queries = 3;
    config.search.scrape_top_pages = 2;
    config.fetch.max_attempts = 1;
    config.rate_limit.initial_delay_secs = 0.0;
    config.rate_limit.min_delay_secs = 0.0;
    config.pdf.min_bytes = 100;
    config.pdf.sources = vec![PdfSourceConfig {
        name: "Clinic".to_string(),
        url_template: "https://pdfsearch.test/search?q={email}".to_string(),
    }];
    config
}

fn scripted() -> Arc<Scripted> {
    let pdf = PageResponse {
        status: 200,
        content_type: Some("application/pdf".to_string()),
        body: pdf_bytes(&[
            "Annual Rehabilitation Report",
            "Ivan Petrov",
            "Correspondence: buch1202@mail.ru",
            "Co-author: anna.sidorova@clinic.ru",
        ]),
    };
    Arc::new(Scripted::new(vec![
        ("pdfsearch.test", html(PDF_SEARCH_PAGE)),
        ("annual-report.pdf", pdf),
        ("clinic.test/staff/petrov", html(STAFF_PAGE)),
        ("google.com/search", html(GOOGLE_PAGE)),
    ]))
}

#[tokio::test]
async fn collect_merges_search_pages_and_pdfs() {
    let fetcher = scripted();
    let store = Arc::new(InMemoryProfileStore::new());
    let pipeline = Pipeline::builder(config())
        .page_fetcher(fetcher.clone())
        .store(store.clone())
        .build()
        .unwrap();

    let profile = pipeline.collect_profile(" Buch1202@Mail.ru ", false).await.unwrap();

    assert_eq!(profile.email, EMAIL);
    assert_eq!(profile.person_info.name.as_deref(), Some("Ivan Petrov"));
    assert_eq!(profile.person_info.company.as_deref(), Some("City Clinic"));
    assert_eq!(profile.person_info.location.as_deref(), Some("Moscow"));
    assert!(profile.phone_numbers.contains(&"5551234567".to_string()));

    assert_eq!(profile.social_profiles.len(), 1);
    assert_eq!(profile.social_profiles[0].platform, "LinkedIn");
    assert_eq!(profile.social_profiles[0].username.as_deref(), Some("ipetrov"));

    assert!(profile
        .websites
        .iter()
        .any(|w| w.contains("clinic.test/staff/petrov")));
    assert!(profile
        .websites
        .iter()
        .any(|w| w.contains("annual-report.pdf")));

    assert_eq!(profile.search_results.len(), 2);
    assert_eq!(profile.pdf_documents.len(), 1);
    assert!(profile.pdf_documents[0].email_found);

    let related: Vec<&str> = profile
        .related_emails
        .iter()
        .map(|r| r.email.as_str())
        .collect();
    assert_eq!(related, vec!["anna.sidorova@clinic.ru"]);
    assert!(profile.related_emails[0].source.starts_with("PDF: "));

    assert!(profile.confidence_score() > 0.5);
    assert!(profile.completeness_score() > 0.5);

    let stored = store.get(EMAIL).await.unwrap().unwrap();
    assert_eq!(stored.person_info, profile.person_info);
}

#[tokio::test]
async fn second_collect_is_served_from_the_store() {
    let fetcher = scripted();
    let pipeline = Pipeline::builder(config())
        .page_fetcher(fetcher.clone())
        .build()
        .unwrap();

    let first = pipeline.collect_profile(EMAIL, false).await.unwrap();
    let calls = fetcher.calls();
    let second = pipeline.collect_profile(EMAIL, false).await.unwrap();

    assert_eq!(fetcher.calls(), calls);
    assert_eq!(first.last_updated, second.last_updated);
}

#[tokio::test]
async fn pdf_analysis_reports_documents_for_the_address() {
    let pipeline = Pipeline::builder(config())
        .page_fetcher(scripted())
        .build()
        .unwrap();

    let docs = pipeline.analyze_pdf(EMAIL).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source, "Clinic");
    assert!(docs[0]
        .all_emails
        .contains(&"anna.sidorova@clinic.ru".to_string()));
    assert!(docs[0].confidence_score >= 0.4);
}

#[tokio::test]
async fn invalid_addresses_never_reach_the_network() {
    let fetcher = scripted();
    let pipeline = Pipeline::builder(config())
        .page_fetcher(fetcher.clone())
        .build()
        .unwrap();

    for bad in ["", "plainaddress", "a@b", "@mail.ru"] {
        let err = pipeline.collect_profile(bad, true).await.unwrap_err();
        assert!(matches!(err, IntelError::InvalidEmail { .. }), "{bad}");
    }
    assert!(pipeline.analyze_academic("nope").await.is_err());
    assert_eq!(fetcher.calls(), 0);
}

/// Sleeps on every call and records the most calls ever running at once.
#[derive(Default)]
struct Counting {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

#[async_trait]
impl PageFetcher for Counting {
    async fn fetch(
        &self,
        _url: &str,
        _headers: &[(String, String)],
        _timeout: Duration,
    ) -> Result<PageResponse, FetchError> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(html("<html><body></body></html>"))
    }
}

#[tokio::test(start_paused = true)]
async fn collection_respects_the_concurrency_limit() {
    let mut config = config();
    config.search.max_concurrency = 1;
    config.pdf.sources = (0..6)
        .map(|i| PdfSourceConfig {
            name: format!("Repo {i}"),
            url_template: format!("https://repo{i}.test/search?q={{email}}"),
        })
        .collect();
    let fetcher = Arc::new(Counting::default());
    let pipeline = Pipeline::builder(config)
        .page_fetcher(fetcher.clone())
        .build()
        .unwrap();

    pipeline.collect_profile(EMAIL, true).await.unwrap();

    assert!(fetcher.total.load(Ordering::SeqCst) > 6);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 1);
}
