//! PDF analysis: link discovery, text extraction and document facts.
//!
//! ```text
//! result page ──extract_pdf_links──▶ URLs ──download──▶ bytes
//!                                                        │
//!                         pdf-extract ──(error/empty)──▶ lopdf
//!                                                        ▼
//!                                                       text
//!                                                        │
//!   email contexts · title · authors · institutions · emails · keywords
//!                                                        ▼
//!                                                    PdfResult
//! ```
//!
//! Everything after the download is a pure function of the text, so most of
//! this module is tested without any PDF at all.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use chrono::Utc;
use regex::{Regex, RegexBuilder};

use crate::config::PdfConfig;
use crate::models::{EmailContext, PdfResult, PdfSummary};
use crate::sources::engine::resolve_link;
use crate::validate::extract_emails;

pub const UNAVAILABLE_TITLE: &str = "PDF Processing Unavailable";
pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const LOCAL_SOURCE: &str = "Local Analysis";

static PDF_LINK_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#"href="([^"]*\.pdf[^"]*)""#,
        r#"href='([^']*\.pdf[^']*)'"#,
        r#"https?://[^"'\s<>]*\.pdf[^"'\s<>&]*"#,
    ]
    .iter()
    .map(|p| RegexBuilder::new(p).case_insensitive(true).build().unwrap())
    .collect()
});

static AUTHOR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[А-ЯЁ][а-яё]+\s+[А-ЯЁ]\.\s*[А-ЯЁ]\.\s*[А-ЯЁ][а-яё]+",
        r"[A-Z][a-z]+\s+[A-Z]\.\s*[A-Z]\.\s*[A-Z][a-z]+",
        r"[A-Z][a-z]+\s+[A-Z][a-z]+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static INSTITUTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"[А-ЯЁ][а-яё]*\s+[а-яё]*\s*[Уу]ниверситет",
        r"[А-ЯЁ][а-яё]*\s+[а-яё]*\s*[Ии]нститут",
        r"[А-ЯЁ][а-яё]*\s+[а-яё]*\s*[Аа]кадеми[яи]",
        r"[A-Z][a-z]+\s+University",
        r"[A-Z][a-z]+\s+Institute",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[а-яёА-ЯЁa-zA-Z]{4,}\b").unwrap());

/// Text extraction failed in every backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("PDF text extraction failed: {0}")]
pub struct ExtractionError(pub String);

/// Primary extractor, then lopdf page-by-page when the primary errors out or
/// returns nothing but whitespace.
pub fn extract_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let primary = pdf_extract::extract_text_from_mem(bytes);
    match primary {
        Ok(text) if !text.trim().is_empty() => return Ok(text),
        Ok(_) => tracing::debug!("pdf-extract returned no text, trying lopdf"),
        Err(e) => tracing::debug!("pdf-extract failed ({e}), trying lopdf"),
    }

    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError(e.to_string()))?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    doc.extract_text(&pages)
        .map_err(|e| ExtractionError(e.to_string()))
}

/// PDF links on a search or repository page: quoted `href`s and bare
/// URLs, redirect-unwrapped, http(s) only, first-seen order, at most `max`.
pub fn extract_pdf_links(html: &str, base_url: &str, max: usize) -> Vec<String> {
    let mut links: Vec<String> = Vec::new();
    for pattern in PDF_LINK_PATTERNS.iter() {
        for caps in pattern.captures_iter(html) {
            let raw = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str());
            let Some(raw) = raw else { continue };
            let raw = raw.replace("&amp;", "&");
            let Some(link) = resolve_link(&raw, base_url) else {
                continue;
            };
            if link.to_lowercase().contains(".pdf") && !links.contains(&link) {
                links.push(link);
            }
        }
    }
    links.truncate(max);
    links
}

/// Every line mentioning `email` (case-insensitive) with `radius` lines
/// on each side.
pub fn find_email_contexts(text: &str, email: &str, radius: usize) -> Vec<EmailContext> {
    let needle = email.to_lowercase();
    let lines: Vec<&str> = text.split('\n').collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.to_lowercase().contains(&needle))
        .map(|(i, line)| {
            let start = i.saturating_sub(radius);
            let end = (i + radius + 1).min(lines.len());
            EmailContext {
                line_number: i + 1,
                line: line.trim().to_string(),
                context: lines[start..end].join("\n"),
                context_range: format!("lines {}-{}", start + 1, end),
            }
        })
        .collect()
}

/// First of the leading ten non-empty lines that is 11..200 characters
/// long and has no digit in its first ten characters.
pub fn extract_title(text: &str) -> String {
    text.split('\n')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .take(10)
        .find(|l| {
            let len = l.chars().count();
            len > 10 && len < 200 && !l.chars().take(10).any(|c| c.is_ascii_digit())
        })
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}

fn collect_matches(patterns: &[Regex], text: &str, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for pattern in patterns {
        for m in pattern.find_iter(text) {
            let found = m.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
            if !out.contains(&found) {
                out.push(found);
            }
        }
    }
    out.truncate(max);
    out
}

/// Cyrillic and Latin "Surname I. I. Surname" forms, then plain
/// "First Last" pairs.
pub fn extract_authors(text: &str, max: usize) -> Vec<String> {
    collect_matches(&AUTHOR_PATTERNS, text, max)
}

pub fn extract_institutions(text: &str, max: usize) -> Vec<String> {
    collect_matches(&INSTITUTION_PATTERNS, text, max)
}

/// Ten most frequent 4+ letter words occurring more than twice. Ties keep
/// first-appearance order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut order: Vec<&str> = Vec::new();
    let mut freq: HashMap<&str, usize> = HashMap::new();
    for m in KEYWORD.find_iter(&lower) {
        let count = freq.entry(m.as_str()).or_insert(0);
        if *count == 0 {
            order.push(m.as_str());
        }
        *count += 1;
    }
    let mut ranked: Vec<(usize, &str)> = order.into_iter().map(|w| (freq[w], w)).collect();
    // Stable sort keeps first appearance among equal counts.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked
        .into_iter()
        .take(10)
        .filter(|(count, _)| *count > 2)
        .map(|(_, w)| w.to_string())
        .collect()
}

pub fn pdf_confidence(
    contexts: usize,
    has_authors: bool,
    has_institutions: bool,
    has_emails: bool,
) -> f64 {
    let mut score = 0.0;
    if contexts > 0 {
        score += 0.4 + (contexts as f64 * 0.05).min(0.2);
    }
    if has_authors {
        score += 0.2;
    }
    if has_institutions {
        score += 0.1;
    }
    if has_emails {
        score += 0.1;
    }
    f64::min(score, 1.0)
}

/// Aggregate over analyzed documents. The summed author and institution
/// counts are capped at `max_authors` / `max_institutions` for the whole
/// collection, not per document. The mean confidence is rounded to three
/// decimals.
pub fn summarize_pdfs(docs: &[PdfResult], max_authors: usize, max_institutions: usize) -> PdfSummary {
    let mut unique_sources: Vec<String> = Vec::new();
    for doc in docs {
        if !unique_sources.contains(&doc.source) {
            unique_sources.push(doc.source.clone());
        }
    }
    let average_confidence = if docs.is_empty() {
        0.0
    } else {
        let mean = docs.iter().map(|d| d.confidence_score).sum::<f64>() / docs.len() as f64;
        (mean * 1000.0).round() / 1000.0
    };
    PdfSummary {
        total_documents: docs.len(),
        documents_with_email: docs.iter().filter(|d| d.email_found).count(),
        unique_sources,
        average_confidence,
        total_authors: docs.iter().map(|d| d.authors.len()).sum::<usize>().min(max_authors),
        total_institutions: docs
            .iter()
            .map(|d| d.institutions.len())
            .sum::<usize>()
            .min(max_institutions),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PdfAnalyzer
// ═══════════════════════════════════════════════════════════════════════

/// Configured document analyzer shared by every PDF source.
pub struct PdfAnalyzer {
    config: PdfConfig,
}

impl PdfAnalyzer {
    pub fn new(config: PdfConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PdfConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        self.config.enabled
    }

    /// Placeholder reported when text extraction is switched off.
    pub fn unavailable(&self, url: &str, source: &str) -> PdfResult {
        let mut result = empty_result(url, source, "");
        result.title = UNAVAILABLE_TITLE.to_string();
        result.error = Some("PDF text extraction disabled".to_string());
        result
    }

    /// Facts from already-extracted text.
    pub fn analyze_text(
        &self,
        text: &str,
        url: &str,
        email: &str,
        source: &str,
        search_url: &str,
    ) -> PdfResult {
        let contexts = find_email_contexts(text, email, self.config.context_lines);
        let authors = extract_authors(text, self.config.max_authors);
        let institutions = extract_institutions(text, self.config.max_institutions);
        let all_emails = extract_emails(text);
        let confidence_score = pdf_confidence(
            contexts.len(),
            !authors.is_empty(),
            !institutions.is_empty(),
            !all_emails.is_empty(),
        );

        PdfResult {
            url: url.to_string(),
            title: extract_title(text),
            authors,
            institutions,
            email_found: !contexts.is_empty(),
            email_contexts: contexts,
            text_length: text.chars().count(),
            all_emails,
            keywords: extract_keywords(text),
            confidence_score,
            analysis_timestamp: Utc::now(),
            source: source.to_string(),
            search_url: search_url.to_string(),
            error: None,
        }
    }

    /// Extract then analyze. Extraction failure yields a result carrying
    /// the error and `email_found = false`.
    pub fn analyze_bytes(
        &self,
        bytes: &[u8],
        url: &str,
        email: &str,
        source: &str,
        search_url: &str,
    ) -> PdfResult {
        if !self.is_available() {
            return self.unavailable(url, source);
        }
        match extract_text(bytes) {
            Ok(text) => self.analyze_text(&text, url, email, source, search_url),
            Err(e) => {
                tracing::warn!(url, "{e}");
                let mut result = empty_result(url, source, search_url);
                result.error = Some(e.to_string());
                result
            }
        }
    }

    /// Analyze a document on disk, reported under the `Local Analysis` source.
    pub async fn analyze_file(&self, path: &Path, email: &str) -> PdfResult {
        let url = path.display().to_string();
        match tokio::fs::read(path).await {
            Ok(bytes) => self.analyze_bytes(&bytes, &url, email, LOCAL_SOURCE, ""),
            Err(e) => {
                let mut result = empty_result(&url, LOCAL_SOURCE, "");
                result.error = Some(format!("Failed to read {url}: {e}"));
                result
            }
        }
    }
}

fn empty_result(url: &str, source: &str, search_url: &str) -> PdfResult {
    PdfResult {
        url: url.to_string(),
        title: UNKNOWN_TITLE.to_string(),
        authors: Vec::new(),
        institutions: Vec::new(),
        email_found: false,
        email_contexts: Vec::new(),
        text_length: 0,
        all_emails: Vec::new(),
        keywords: Vec::new(),
        confidence_score: 0.0,
        analysis_timestamp: Utc::now(),
        source: source.to_string(),
        search_url: search_url.to_string(),
        error: None,
    }
}

/// Single-page PDF with one Helvetica text line per entry of `lines`,
/// a little over 1 KB.
#[cfg(test)]
pub(crate) fn minimal_pdf(lines: &[&str]) -> Vec<u8> {
    let mut content = String::from("BT /F1 12 Tf 72 720 Td 14 TL\n");
    for line in lines {
        let escaped = line
            .replace('\\', "\\\\")
            .replace('(', "\\(")
            .replace(')', "\\)");
        content.push_str(&format!("({escaped}) Tj T*\n"));
    }
    content.push_str("ET");

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    // Comment padding keeps the file above the download size floor.
    out.push(b'%');
    out.extend(std::iter::repeat(b'x').take(1100));
    out.push(b'\n');
    let mut offsets = Vec::new();
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{xref_start}\n%%EOF\n").as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = "Clinical outcomes of early rehabilitation\n\
Ivan Petrov, Anna Smirnova\n\
Moscow State University\n\
Abstract\n\
Rehabilitation after surgery improves outcomes.\n\
Correspondence: buch1202@mail.ru\n\
Rehabilitation programs were compared.\n\
Secretary: secretary@clinic.ru\n\
Rehabilitation works.";

    fn analyzer() -> PdfAnalyzer {
        PdfAnalyzer::new(PdfConfig::default())
    }

    #[test]
    fn email_contexts_carry_window_and_range() {
        let contexts = find_email_contexts(PAPER, "BUCH1202@mail.ru", 3);
        assert_eq!(contexts.len(), 1);
        let c = &contexts[0];
        assert_eq!(c.line_number, 6);
        assert_eq!(c.line, "Correspondence: buch1202@mail.ru");
        assert_eq!(c.context_range, "lines 3-9");
        assert_eq!(c.context.lines().count(), 7);
    }

    #[test]
    fn window_is_clipped_at_document_edges() {
        let contexts = find_email_contexts("a@b.com\nsecond", "a@b.com", 3);
        assert_eq!(contexts[0].context_range, "lines 1-2");
    }

    #[test]
    fn title_skips_short_and_numbered_lines() {
        assert_eq!(
            extract_title("Draft\n2021-03-04 report header\nClinical outcomes of early rehabilitation"),
            "Clinical outcomes of early rehabilitation"
        );
        assert_eq!(extract_title("1\n2\n3"), UNKNOWN_TITLE);
    }

    #[test]
    fn authors_and_institutions_in_both_scripts() {
        let text = "Иванов И. И. Петров\nСмирнова А. В. Кузнецова\nJohn A. B. Smith\n\
                    Московский государственный университет\nStanford University";
        let authors = extract_authors(text, 10);
        assert_eq!(authors[0], "Иванов И. И. Петров");
        assert_eq!(authors[1], "Смирнова А. В. Кузнецова");
        assert!(authors.contains(&"John A. B. Smith".to_string()));
        let institutions = extract_institutions(text, 5);
        assert!(institutions.contains(&"Московский государственный университет".to_string()));
        assert!(institutions.contains(&"Stanford University".to_string()));
        assert!(extract_authors(text, 1).len() == 1);
    }

    #[test]
    fn keywords_need_three_occurrences() {
        let keywords = extract_keywords(PAPER);
        assert_eq!(keywords, vec!["rehabilitation"]);
    }

    #[test]
    fn analyze_text_scores_the_document() {
        let result = analyzer().analyze_text(
            PAPER,
            "https://example.org/paper.pdf",
            "buch1202@mail.ru",
            "Google",
            "https://www.google.com/search?q=x",
        );
        assert!(result.email_found);
        assert_eq!(result.title, "Clinical outcomes of early rehabilitation");
        assert_eq!(result.all_emails, vec!["buch1202@mail.ru", "secretary@clinic.ru"]);
        // 0.4 + 0.05 + authors 0.2 + institutions 0.1 + emails 0.1
        assert!((result.confidence_score - 0.85).abs() < 1e-9);
        assert!(result.error.is_none());
    }

    #[test]
    fn confidence_caps_occurrence_bonus() {
        assert!((pdf_confidence(10, false, false, false) - 0.6).abs() < 1e-9);
        assert_eq!(pdf_confidence(0, false, false, false), 0.0);
        assert_eq!(pdf_confidence(4, true, true, true), 1.0);
    }

    #[test]
    fn pdf_links_are_unwrapped_and_capped() {
        let page = r#"
            <a href="/url?q=https://uni.edu/papers/a.pdf&amp;sa=U">A</a>
            <a href='https://b.org/doc.PDF'>B</a>
            <a href="/local/c.pdf">C</a>
            see https://b.org/doc.PDF and ftp://x.org/y.pdf
        "#;
        let links = extract_pdf_links(page, "https://www.google.com/search?q=x", 5);
        assert_eq!(
            links,
            vec![
                "https://uni.edu/papers/a.pdf",
                "https://www.google.com/local/c.pdf",
                "https://b.org/doc.PDF",
            ]
        );
        assert_eq!(extract_pdf_links(page, "https://www.google.com", 1).len(), 1);
    }

    #[test]
    fn disabled_extraction_reports_unavailable() {
        let analyzer = PdfAnalyzer::new(PdfConfig {
            enabled: false,
            ..PdfConfig::default()
        });
        let result = analyzer.analyze_bytes(b"%PDF", "https://x.org/a.pdf", "a@b.com", "Google", "");
        assert_eq!(result.title, UNAVAILABLE_TITLE);
        assert!(!result.email_found);
        assert!(result.error.is_some());
    }

    #[test]
    fn garbage_bytes_yield_an_error_result() {
        let result = analyzer().analyze_bytes(b"not a pdf", "https://x.org/a.pdf", "a@b.com", "Bing", "");
        assert!(!result.email_found);
        assert!(result.error.is_some());
    }

    #[test]
    fn extracts_text_from_a_real_pdf() {
        let bytes = minimal_pdf(&["Annual clinic report", "Contact buch1202@mail.ru"]);
        let text = extract_text(&bytes).unwrap();
        assert!(text.contains("buch1202@mail.ru"));
    }

    #[test]
    fn summary_of_three_documents() {
        let doc = |source: &str, authors: usize, institutions: usize, confidence: f64| {
            let mut d = empty_result("https://x.org/a.pdf", source, "");
            d.email_found = true;
            d.authors = (0..authors).map(|i| format!("Author {i}")).collect();
            d.institutions = (0..institutions).map(|i| format!("Institute {i}")).collect();
            d.confidence_score = confidence;
            d
        };
        let docs = vec![
            doc(LOCAL_SOURCE, 6, 2, 0.95),
            doc("Google Scholar", 3, 2, 0.87),
            doc("ResearchGate", 3, 2, 0.92),
        ];
        let summary = summarize_pdfs(&docs, 10, 5);
        assert_eq!(summary.total_documents, 3);
        assert_eq!(summary.documents_with_email, 3);
        assert_eq!(
            summary.unique_sources,
            vec![LOCAL_SOURCE, "Google Scholar", "ResearchGate"]
        );
        assert_eq!(summary.average_confidence, 0.913);
        assert_eq!(summary.total_authors, 10);
        assert_eq!(summary.total_institutions, 5);
        assert_eq!(summarize_pdfs(&[], 10, 5), PdfSummary::default());
    }

    #[test]
    fn summary_caps_totals_across_the_collection() {
        let doc = |authors: usize, institutions: usize| {
            let mut d = empty_result("https://x.org/a.pdf", "Google", "");
            d.authors = (0..authors).map(|i| format!("Author {i}")).collect();
            d.institutions = (0..institutions).map(|i| format!("Institute {i}")).collect();
            d
        };
        let docs = vec![doc(5, 5), doc(5, 5), doc(5, 5), doc(5, 5)];
        let summary = summarize_pdfs(&docs, 10, 5);
        assert_eq!(summary.total_documents, 4);
        assert_eq!(summary.total_authors, 10);
        assert_eq!(summary.total_institutions, 5);

        let small = summarize_pdfs(&[doc(2, 1), doc(3, 1), doc(1, 0), doc(0, 2)], 10, 5);
        assert_eq!(small.total_authors, 6);
        assert_eq!(small.total_institutions, 4);
    }
}
