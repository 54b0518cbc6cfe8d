//! Core data models used throughout the pipeline.
//!
//! These types represent the queries, search hits, extracted facts and
//! aggregated profiles that flow from the source fetchers through the
//! analyzer into the profile aggregator.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validate::EmailInfo;

/// Which family of [`SourceFetcher`](crate::sources::SourceFetcher) a query
/// or result belongs to.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    GenericSearch,
    Academic,
    Social,
    Pdf,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::GenericSearch => "search",
            SourceKind::Academic => "academic",
            SourceKind::Social => "social",
            SourceKind::Pdf => "pdf",
        }
    }

    /// Provenance label for a source of this kind, e.g. `Search-Google`.
    pub fn label_for(&self, name: &str) -> String {
        match self {
            SourceKind::GenericSearch => format!("Search-{name}"),
            SourceKind::Academic => format!("Academic-{name}"),
            SourceKind::Social => name.to_string(),
            SourceKind::Pdf => format!("PDF-{name}"),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One query variant for a target email.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub text: String,
    pub affinity: SourceKind,
    /// Lower is more important; equals the generation order.
    pub priority: u32,
    /// Normalized target address the query was derived from.
    pub email: String,
}

/// One search hit as produced by a source fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Display name of the producing source, e.g. `Google`.
    pub source: String,
    #[serde(default)]
    pub kind: SourceKind,
    /// 1-based position on the source's result page.
    pub rank: usize,
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub relevance_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub academic_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub academic_indicators: Vec<String>,
    /// The source itself matched the target address (e.g. an API lookup by email).
    #[serde(default)]
    pub verified: bool,
}

impl RawResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        source: impl Into<String>,
        kind: SourceKind,
        rank: usize,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            source: source.into(),
            kind,
            rank,
            fetched_at: Utc::now(),
            relevance_score: 0.0,
            academic_score: None,
            academic_indicators: Vec::new(),
            verified: false,
        }
    }

    /// Score used for ranking: the academic score when the producing source
    /// computed one, otherwise the relevance score.
    pub fn rank_score(&self) -> f64 {
        self.academic_score.unwrap_or(self.relevance_score)
    }

    pub fn source_label(&self) -> String {
        self.kind.label_for(&self.source)
    }

    /// `title + " " + snippet`, the text most scoring functions look at.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.snippet)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonInfo {
    pub name: Option<String>,
    pub occupation: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
}

impl PersonInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.occupation.is_none()
            && self.company.is_none()
            && self.location.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contacts {
    pub emails: Vec<String>,
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Degree {
    pub degree: String,
    pub university: Option<String>,
    pub year: Option<String>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position: String,
    pub department: Option<String>,
    pub university: Option<String>,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    pub journal: Option<String>,
    pub year: Option<String>,
    pub doi: Option<String>,
    pub context: String,
}

/// Academic sub-record shared by facts and profiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub degrees: Vec<Degree>,
    pub positions: Vec<Position>,
    pub institutions: Vec<String>,
    pub publications: Vec<Publication>,
    pub research_areas: Vec<String>,
    #[serde(default)]
    pub academic_ids: BTreeMap<String, String>,
    #[serde(default)]
    pub academic_websites: Vec<String>,
}

impl AcademicRecord {
    pub fn is_empty(&self) -> bool {
        self.degrees.is_empty()
            && self.positions.is_empty()
            && self.institutions.is_empty()
            && self.publications.is_empty()
            && self.research_areas.is_empty()
            && self.academic_ids.is_empty()
            && self.academic_websites.is_empty()
    }
}

/// Another address seen next to the target (e.g. co-authors in a PDF).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedEmail {
    pub email: String,
    pub source: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    /// In `[-1, 1]`.
    pub polarity: f64,
    pub label: String,
    /// Which backend produced it (`rules` for the built-in lexicon).
    pub method: String,
}

/// Partial facts from one result, page or document.
///
/// Every field is empty by default; absence means "not found here".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFacts {
    /// Provenance label added to the profile's `sources`.
    pub source: Option<String>,
    pub person_info: PersonInfo,
    pub contacts: Contacts,
    pub social_links: Vec<SocialLink>,
    pub websites: Vec<String>,
    pub academic: AcademicRecord,
    pub keywords: Vec<String>,
    pub related_emails: Vec<RelatedEmail>,
    pub sentiment: Option<Sentiment>,
}

impl ExtractedFacts {
    pub fn with_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A line of a PDF that mentions the target email, with surrounding lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailContext {
    /// 1-based.
    pub line_number: usize,
    pub line: String,
    pub context: String,
    pub context_range: String,
}

/// Analysis of one PDF document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfResult {
    pub url: String,
    pub title: String,
    pub authors: Vec<String>,
    pub institutions: Vec<String>,
    pub email_found: bool,
    pub email_contexts: Vec<EmailContext>,
    pub text_length: usize,
    pub all_emails: Vec<String>,
    pub keywords: Vec<String>,
    pub confidence_score: f64,
    pub analysis_timestamp: DateTime<Utc>,
    pub source: String,
    pub search_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate over a set of [`PdfResult`]s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdfSummary {
    pub total_documents: usize,
    pub documents_with_email: usize,
    pub unique_sources: Vec<String>,
    pub average_confidence: f64,
    pub total_authors: usize,
    pub total_institutions: usize,
}

/// The aggregate record for one email address.
///
/// `confidence_score` and `completeness_score` are derived by the
/// [`ProfileAggregator`](crate::aggregate::ProfileAggregator) and have no
/// public setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub email: String,
    pub person_info: PersonInfo,
    pub social_profiles: Vec<SocialLink>,
    pub websites: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub addresses: Vec<String>,
    pub sources: Vec<String>,
    pub academic: AcademicRecord,
    pub keywords: Vec<String>,
    pub related_emails: Vec<RelatedEmail>,
    pub search_results: Vec<RawResult>,
    pub pdf_documents: Vec<PdfResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_info: Option<EmailInfo>,
    pub(crate) confidence_score: f64,
    pub(crate) completeness_score: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Profile {
    pub fn new(email: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            email: email.into(),
            person_info: PersonInfo::default(),
            social_profiles: Vec::new(),
            websites: Vec::new(),
            phone_numbers: Vec::new(),
            addresses: Vec::new(),
            sources: Vec::new(),
            academic: AcademicRecord::default(),
            keywords: Vec::new(),
            related_emails: Vec::new(),
            search_results: Vec::new(),
            pdf_documents: Vec::new(),
            email_info: None,
            confidence_score: 0.0,
            completeness_score: 0.0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn confidence_score(&self) -> f64 {
        self.confidence_score
    }

    pub fn completeness_score(&self) -> f64 {
        self.completeness_score
    }

    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            email: self.email.clone(),
            name: self
                .person_info
                .name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            social_count: self.social_profiles.len(),
            sources_count: self.sources.len(),
            confidence_score: self.confidence_score,
            completeness_score: self.completeness_score,
            last_updated: self.last_updated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub email: String,
    pub name: String,
    pub social_count: usize,
    pub sources_count: usize,
    pub confidence_score: f64,
    pub completeness_score: f64,
    pub last_updated: DateTime<Utc>,
}
