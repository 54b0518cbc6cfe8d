//! Academic extraction over search hits.
//!
//! Each hit's `title + snippet` is scanned for degrees, positions,
//! publications, research areas and identifiers; the per-hit records are
//! merged with the profile's academic merge policy and summarised into
//! [`AcademicFacts`].
//!
//! ```text
//!   RawResult ─► facts_from_result ─► AcademicRecord ─┐
//!   RawResult ─► facts_from_result ─► AcademicRecord ─┼─► merge_academic ─► AcademicProfile
//!   RawResult ─► ...                                  ─┘          │
//!                                                   summary + confidence ─► AcademicFacts
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::aggregate::merge_academic;
use crate::models::{AcademicRecord, Degree, ExtractedFacts, Position, Publication, RawResult};
use crate::rules::CompiledRules;

const DEGREE_RADIUS: usize = 100;
const POSITION_RADIUS: usize = 150;
const PUBLICATION_RADIUS: usize = 200;

/// Hits above this academic score count as academic.
const ACADEMIC_THRESHOLD: f64 = 0.3;
/// Hits above this academic score count as high confidence.
const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.6;

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("valid regex"));

static UNIVERSITY: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bat\s+([A-Z][a-zA-Z\s]+(?:University|College|Institute))",
        r"\bfrom\s+([A-Z][a-zA-Z\s]+(?:University|College|Institute))",
        r"([A-Z][a-zA-Z\s]+(?:University|College|Institute))",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static DEPARTMENT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bof\s+([A-Z][a-zA-Z\s]+(?:Science|Studies|Engineering|Medicine))",
        r"\bin\s+([A-Z][a-zA-Z\s]+(?:Department|School|College))",
        r"([A-Z][a-zA-Z\s]+(?:Department|School|College))",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static QUOTED_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]{20,200})""#).expect("valid regex"));

static LONG_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z][a-zA-Z\s,:-]{30,200}(?:\.|$)").expect("valid regex"));

static JOURNAL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bin\s+([A-Z][a-zA-Z\s&]+(?:Journal|Review|Proceedings|Conference))",
        r"\bpublished in\s+([A-Z][a-zA-Z\s&]+)",
        r"([A-Z][a-zA-Z\s&]+(?:Journal|Review|Proceedings|Conference))",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static DOI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b10\.\d{4,}/[^\s]+").expect("valid regex"));

static ORCID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}-\d{4}-\d{4}-\d{3}[\dX])\b").expect("valid regex"));

static RESEARCHER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]-\d{4}-\d{4})\b").expect("valid regex"));

static SCHOLAR_USER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"scholar\.google\.[a-z.]+/citations\?(?:[^\s]*&)?user=([^&\s]+)")
        .expect("valid regex")
});

static NAME_IN_CONTEXT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b([A-Z][a-z]+\s+[A-Z][a-z]+)\b",
        r"\bDr\.?\s+([A-Z][a-z]+\s+[A-Z][a-z]+)\b",
        r"\bProf\.?\s+([A-Z][a-z]+\s+[A-Z][a-z]+)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// `text[start - radius .. end + radius]`, widened to char boundaries.
fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let mut lo = start.saturating_sub(radius);
    while !text.is_char_boundary(lo) {
        lo -= 1;
    }
    let mut hi = (end + radius).min(text.len());
    while !text.is_char_boundary(hi) {
        hi += 1;
    }
    &text[lo..hi]
}

fn first_group(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|p| p.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn year_in(text: &str) -> Option<String> {
    YEAR.find(text).map(|m| m.as_str().to_string())
}

/// Uppercase the first letter of each alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Institution name from a `.edu` host: `www.cs.stanford.edu` → `Cs.Stanford`.
pub fn institution_from_edu(url: &str) -> Option<String> {
    let host = url::Url::parse(url).ok()?.host_str()?.to_lowercase();
    if !host.contains(".edu") {
        return None;
    }
    let name = host.replace(".edu", "").replace("www.", "");
    (!name.is_empty()).then(|| title_case(&name))
}

// ═══════════════════════════════════════════════════════════════════════
// Output records
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicProfile {
    pub email: String,
    pub name: Option<String>,
    /// Highest-ranked position title found.
    pub academic_rank: Option<String>,
    #[serde(flatten)]
    pub record: AcademicRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_search_results: usize,
    pub academic_results: usize,
    pub high_confidence_results: usize,
    pub platforms_found: usize,
    pub degrees_found: usize,
    pub positions_found: usize,
    pub publications_found: usize,
    pub institutions_found: usize,
    pub research_areas_found: usize,
    pub has_name: bool,
    pub has_academic_rank: bool,
    pub academic_ids_found: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicConfidence {
    pub academic_status: f64,
    pub degrees: f64,
    pub positions: f64,
    pub publications: f64,
    /// Mean of the four above.
    pub overall: f64,
}

/// Everything `analyze_academic` returns for one address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicFacts {
    pub email: String,
    pub profile: AcademicProfile,
    pub search_results: Vec<RawResult>,
    pub analysis_summary: AnalysisSummary,
    pub confidence_scores: AcademicConfidence,
    pub collected_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Extractor
// ═══════════════════════════════════════════════════════════════════════

pub struct AcademicExtractor {
    rules: Arc<CompiledRules>,
}

impl AcademicExtractor {
    pub fn new(rules: Arc<CompiledRules>) -> Self {
        Self { rules }
    }

    pub fn degrees(&self, text: &str) -> Vec<Degree> {
        let mut out = Vec::new();
        for pattern in &self.rules.degree_patterns {
            for m in pattern.find_iter(text) {
                let context = window(text, m.start(), m.end(), DEGREE_RADIUS);
                out.push(Degree {
                    degree: m.as_str().trim().to_string(),
                    university: first_group(&UNIVERSITY, context),
                    year: year_in(context),
                    context: context.trim().to_string(),
                });
            }
        }
        out
    }

    pub fn positions(&self, text: &str) -> Vec<Position> {
        let mut out = Vec::new();
        for pattern in &self.rules.position_patterns {
            for m in pattern.find_iter(text) {
                let context = window(text, m.start(), m.end(), POSITION_RADIUS);
                out.push(Position {
                    position: m.as_str().trim().to_string(),
                    department: first_group(&DEPARTMENT, context),
                    university: first_group(&self.rules.institution_patterns, context),
                    context: context.trim().to_string(),
                });
            }
        }
        out
    }

    pub fn publications(&self, text: &str) -> Vec<Publication> {
        let quoted = QUOTED_TITLE
            .captures_iter(text)
            .filter_map(|c| c.get(1));
        let long = LONG_TITLE.find_iter(text);

        let mut out = Vec::new();
        for m in quoted.chain(long) {
            let title = m.as_str().trim();
            let len = title.chars().count();
            if !(20..=300).contains(&len) {
                continue;
            }
            let context = window(text, m.start(), m.end(), PUBLICATION_RADIUS);
            out.push(Publication {
                title: title.to_string(),
                journal: first_group(&JOURNAL, context),
                year: year_in(context),
                doi: DOI.find(context).map(|d| d.as_str().to_string()),
                context: context.trim().to_string(),
            });
        }
        out
    }

    /// Research-area keywords present in `text`, title-cased.
    pub fn research_areas(&self, text: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        self.rules
            .tables()
            .research_areas
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .map(|k| title_case(k))
            .collect()
    }

    /// ORCID, ResearcherID and Google Scholar user id found in `text`.
    pub fn academic_ids(text: &str) -> BTreeMap<String, String> {
        let mut ids = BTreeMap::new();
        let found = [
            ("orcid", &*ORCID),
            ("researcher_id", &*RESEARCHER_ID),
            ("google_scholar", &*SCHOLAR_USER),
        ];
        for (key, pattern) in found {
            if let Some(m) = pattern.captures(text).and_then(|c| c.get(1)) {
                ids.insert(key.to_string(), m.as_str().to_string());
            }
        }
        ids
    }

    /// Academic record for one hit.
    pub fn record_for(&self, result: &RawResult) -> AcademicRecord {
        let text = result.text();
        let mut record = AcademicRecord {
            degrees: self.degrees(&text),
            positions: self.positions(&text),
            publications: self.publications(&text),
            research_areas: self.research_areas(&text),
            academic_ids: Self::academic_ids(&format!("{text} {}", result.url)),
            ..AcademicRecord::default()
        };
        if self.rules.academic_platform(&result.url).is_some() {
            record.academic_websites.push(result.url.clone());
        }
        if let Some(inst) = institution_from_edu(&result.url) {
            record.institutions.push(inst);
        }
        record
    }

    /// Profile facts carrying only the academic record of one hit.
    pub fn facts_from_result(&self, result: &RawResult) -> ExtractedFacts {
        let mut facts = ExtractedFacts::with_source(result.source_label());
        facts.academic = self.record_for(result);
        facts
    }

    /// Assemble the academic view of `results` for `email`.
    pub fn build(&self, email: &str, results: Vec<RawResult>) -> AcademicFacts {
        let mut record = AcademicRecord::default();
        for result in &results {
            merge_academic(&mut record, self.record_for(result));
        }

        let profile = AcademicProfile {
            email: email.to_string(),
            name: self.name_from_positions(&record.positions),
            academic_rank: self.academic_rank(&record.positions),
            record,
        };
        let analysis_summary = self.summary(&profile, &results);
        let confidence_scores = confidence(&profile.record, &results);
        tracing::debug!(
            email,
            degrees = profile.record.degrees.len(),
            positions = profile.record.positions.len(),
            publications = profile.record.publications.len(),
            overall = confidence_scores.overall,
            "academic profile assembled"
        );

        AcademicFacts {
            email: email.to_string(),
            profile,
            search_results: results,
            analysis_summary,
            confidence_scores,
            collected_at: Utc::now(),
        }
    }

    /// First position title with the highest rank in the rank table.
    fn academic_rank(&self, positions: &[Position]) -> Option<String> {
        let mut best: Option<(&Position, u32)> = None;
        for p in positions {
            let rank = self.rules.position_rank(&p.position);
            if best.map_or(true, |(_, r)| rank > r) {
                best = Some((p, rank));
            }
        }
        best.map(|(p, _)| p.position.clone())
    }

    /// A capitalised two-word name near a position mention that is not
    /// itself an institution or a position title.
    fn name_from_positions(&self, positions: &[Position]) -> Option<String> {
        let rejected = |candidate: &str| {
            let lower = candidate.to_lowercase();
            ["university", "department", "college"]
                .iter()
                .any(|w| lower.contains(w))
                || self
                    .rules
                    .position_patterns
                    .iter()
                    .any(|p| p.is_match(candidate))
        };
        positions.iter().find_map(|p| {
            NAME_IN_CONTEXT.iter().find_map(|pattern| {
                pattern
                    .captures_iter(&p.context)
                    .filter_map(|c| c.get(1))
                    .map(|m| m.as_str())
                    .find(|candidate| !rejected(candidate))
                    .map(str::to_string)
            })
        })
    }

    fn summary(&self, profile: &AcademicProfile, results: &[RawResult]) -> AnalysisSummary {
        let record = &profile.record;
        let platforms: BTreeSet<&str> = results
            .iter()
            .filter_map(|r| self.rules.academic_platform(&r.url))
            .collect();
        AnalysisSummary {
            total_search_results: results.len(),
            academic_results: count_above(results, ACADEMIC_THRESHOLD),
            high_confidence_results: count_above(results, HIGH_CONFIDENCE_THRESHOLD),
            platforms_found: platforms.len(),
            degrees_found: record.degrees.len(),
            positions_found: record.positions.len(),
            publications_found: record.publications.len(),
            institutions_found: record.institutions.len(),
            research_areas_found: record.research_areas.len(),
            has_name: profile.name.is_some(),
            has_academic_rank: profile.academic_rank.is_some(),
            academic_ids_found: record.academic_ids.len(),
        }
    }
}

fn count_above(results: &[RawResult], threshold: f64) -> usize {
    results
        .iter()
        .filter(|r| r.academic_score.unwrap_or(0.0) > threshold)
        .count()
}

fn distinct_contexts<'a>(contexts: impl Iterator<Item = &'a str>) -> f64 {
    contexts.collect::<BTreeSet<_>>().len() as f64
}

/// Per-dimension confidence: academic hits over 5, distinct degree contexts
/// over 3, position contexts over 2, publication contexts over 3; each
/// capped at 1. `overall` is their mean.
pub fn confidence(record: &AcademicRecord, results: &[RawResult]) -> AcademicConfidence {
    let academic_status = (count_above(results, ACADEMIC_THRESHOLD) as f64 / 5.0).min(1.0);
    let degrees =
        (distinct_contexts(record.degrees.iter().map(|d| d.context.as_str())) / 3.0).min(1.0);
    let positions =
        (distinct_contexts(record.positions.iter().map(|p| p.context.as_str())) / 2.0).min(1.0);
    let publications =
        (distinct_contexts(record.publications.iter().map(|p| p.context.as_str())) / 3.0).min(1.0);
    AcademicConfidence {
        academic_status,
        degrees,
        positions,
        publications,
        overall: (academic_status + degrees + positions + publications) / 4.0,
    }
}
