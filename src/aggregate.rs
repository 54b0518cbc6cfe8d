//! Profile aggregation: fold [`ExtractedFacts`] into a [`Profile`].
//!
//! Every profile field has exactly one merge strategy, listed in
//! [`MERGE_POLICY`]:
//!
//! | Strategy | Fields |
//! |----------|--------|
//! | first non-empty wins | name, occupation, company, location |
//! | ordered union, deduplicated | social profiles and websites (by normalized URL), phones, addresses, sources, keywords |
//! | keyed union | degrees `(degree, university)`, positions `(position, university)`, publications (title) |
//! | set | institutions, research areas, academic websites |
//! | max confidence | related emails |
//!
//! After any merge the confidence and completeness scores are recomputed;
//! nothing else writes them.

use std::collections::HashSet;

use chrono::Utc;

use crate::models::{
    AcademicRecord, ExtractedFacts, PdfResult, Profile, RawResult, RelatedEmail, SocialLink,
    SourceKind,
};
use crate::score::normalize_url;

type FieldMerge = fn(&mut Profile, &ExtractedFacts);

/// Field name and the function that merges it, applied in this order.
pub const MERGE_POLICY: &[(&str, FieldMerge)] = &[
    ("person_info.name", merge_name),
    ("person_info.occupation", merge_occupation),
    ("person_info.company", merge_company),
    ("person_info.location", merge_location),
    ("social_profiles", merge_social_profiles),
    ("websites", merge_websites),
    ("phone_numbers", merge_phones),
    ("addresses", merge_addresses),
    ("sources", merge_sources),
    ("keywords", merge_keywords),
    ("academic", merge_academic_field),
    ("related_emails", merge_related_field),
];

fn merge_name(p: &mut Profile, f: &ExtractedFacts) {
    first_non_empty(&mut p.person_info.name, &f.person_info.name);
}

fn merge_occupation(p: &mut Profile, f: &ExtractedFacts) {
    first_non_empty(&mut p.person_info.occupation, &f.person_info.occupation);
}

fn merge_company(p: &mut Profile, f: &ExtractedFacts) {
    first_non_empty(&mut p.person_info.company, &f.person_info.company);
}

fn merge_location(p: &mut Profile, f: &ExtractedFacts) {
    first_non_empty(&mut p.person_info.location, &f.person_info.location);
}

fn merge_social_profiles(p: &mut Profile, f: &ExtractedFacts) {
    merge_social(&mut p.social_profiles, &f.social_links);
}

fn merge_websites(p: &mut Profile, f: &ExtractedFacts) {
    merge_urls(&mut p.websites, &f.websites);
}

fn merge_phones(p: &mut Profile, f: &ExtractedFacts) {
    union(&mut p.phone_numbers, &f.contacts.phones);
}

fn merge_addresses(p: &mut Profile, f: &ExtractedFacts) {
    union(&mut p.addresses, &f.contacts.addresses);
}

fn merge_sources(p: &mut Profile, f: &ExtractedFacts) {
    union(&mut p.sources, f.source.as_slice());
}

fn merge_keywords(p: &mut Profile, f: &ExtractedFacts) {
    union(&mut p.keywords, &f.keywords);
}

fn merge_academic_field(p: &mut Profile, f: &ExtractedFacts) {
    merge_academic(&mut p.academic, f.academic.clone());
}

/// The profile's own address is never related to itself.
fn merge_related_field(p: &mut Profile, f: &ExtractedFacts) {
    let others = f
        .related_emails
        .iter()
        .filter(|r| r.email != p.email)
        .cloned()
        .collect();
    merge_related_emails(&mut p.related_emails, others);
}

fn first_non_empty(slot: &mut Option<String>, candidate: &Option<String>) {
    if slot.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        return;
    }
    if let Some(value) = candidate.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        *slot = Some(value.to_string());
    }
}

fn union(into: &mut Vec<String>, from: &[String]) {
    for item in from {
        let item = item.trim();
        if !item.is_empty() && !into.iter().any(|x| x == item) {
            into.push(item.to_string());
        }
    }
}

fn merge_urls(into: &mut Vec<String>, from: &[String]) {
    let mut seen: HashSet<String> = into.iter().map(|u| normalize_url(u)).collect();
    for url in from {
        if seen.insert(normalize_url(url)) {
            into.push(url.clone());
        }
    }
}

/// Social links by normalized URL. A repeat sighting can only upgrade the
/// stored link: verification is sticky and a missing username is filled.
fn merge_social(into: &mut Vec<SocialLink>, from: &[SocialLink]) {
    for link in from {
        let key = normalize_url(&link.url);
        match into.iter_mut().find(|l| normalize_url(&l.url) == key) {
            Some(existing) => {
                existing.verified |= link.verified;
                if existing.username.is_none() {
                    existing.username.clone_from(&link.username);
                }
            }
            None => into.push(link.clone()),
        }
    }
}

/// Academic sub-record merge shared by profiles and [`AcademicFacts`](crate::academic::AcademicFacts).
pub fn merge_academic(into: &mut AcademicRecord, from: AcademicRecord) {
    for degree in from.degrees {
        let dup = into
            .degrees
            .iter()
            .any(|d| d.degree == degree.degree && d.university == degree.university);
        if !dup {
            into.degrees.push(degree);
        }
    }
    for position in from.positions {
        let dup = into
            .positions
            .iter()
            .any(|p| p.position == position.position && p.university == position.university);
        if !dup {
            into.positions.push(position);
        }
    }
    for publication in from.publications {
        if !into.publications.iter().any(|p| p.title == publication.title) {
            into.publications.push(publication);
        }
    }
    union(&mut into.institutions, &from.institutions);
    union(&mut into.research_areas, &from.research_areas);
    union(&mut into.academic_websites, &from.academic_websites);
    for (key, value) in from.academic_ids {
        into.academic_ids.entry(key).or_insert(value);
    }
}

/// One entry per address, keeping the highest-confidence sighting.
pub fn merge_related_emails(into: &mut Vec<RelatedEmail>, from: Vec<RelatedEmail>) {
    for related in from {
        match into.iter_mut().find(|r| r.email == related.email) {
            Some(existing) if related.confidence > existing.confidence => *existing = related,
            Some(_) => {}
            None => into.push(related),
        }
    }
}

/// Profile facts contributed by one PDF document about `email`.
///
/// The first author and institution are name and company candidates, the
/// other addresses in the document are related emails, and the document
/// itself is a website.
pub fn facts_from_pdf(doc: &PdfResult, email: &str) -> ExtractedFacts {
    let mut facts = ExtractedFacts::with_source(SourceKind::Pdf.label_for(&doc.source));
    facts.person_info.name = doc.authors.first().cloned();
    facts.person_info.company = doc.institutions.first().cloned();
    facts.websites.push(doc.url.clone());
    facts.keywords = doc.keywords.clone();
    let target = email.to_lowercase();
    facts.related_emails = doc
        .all_emails
        .iter()
        .filter(|e| e.to_lowercase() != target)
        .map(|e| RelatedEmail {
            email: e.to_lowercase(),
            source: format!("PDF: {}", doc.title),
            confidence: doc.confidence_score,
        })
        .collect();
    facts
}

// ═══════════════════════════════════════════════════════════════════════
// ProfileAggregator
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Copy)]
pub struct ProfileAggregator;

impl ProfileAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Fold `facts` into `existing` (or a fresh profile for `email`).
    pub fn merge(
        &self,
        email: &str,
        existing: Option<Profile>,
        facts: impl IntoIterator<Item = ExtractedFacts>,
    ) -> Profile {
        let mut profile = existing.unwrap_or_else(|| Profile::new(email));
        for f in facts {
            self.apply(&mut profile, &f);
        }
        self.recompute(&mut profile);
        profile
    }

    /// Merge one facts value without recomputing scores.
    fn apply(&self, profile: &mut Profile, facts: &ExtractedFacts) {
        for (_, merge) in MERGE_POLICY {
            merge(profile, facts);
        }
    }

    /// Append search hits not already attached, by normalized URL.
    pub fn attach_search_results(&self, profile: &mut Profile, results: &[RawResult]) {
        let mut seen: HashSet<String> = profile
            .search_results
            .iter()
            .map(|r| normalize_url(&r.url))
            .collect();
        for r in results {
            if seen.insert(normalize_url(&r.url)) {
                profile.search_results.push(r.clone());
            }
        }
        self.recompute(profile);
    }

    /// Append analyzed documents not already attached, by URL.
    pub fn attach_pdf_documents(&self, profile: &mut Profile, docs: &[PdfResult]) {
        for doc in docs {
            if !profile.pdf_documents.iter().any(|d| d.url == doc.url) {
                profile.pdf_documents.push(doc.clone());
            }
        }
        self.recompute(profile);
    }

    pub fn recompute(&self, profile: &mut Profile) {
        profile.confidence_score = confidence_score(profile);
        profile.completeness_score = completeness_score(profile);
        profile.last_updated = Utc::now();
    }
}

/// `0.3·name + 0.2·min(social, 3) + 0.1·min(websites, 2) +
/// 0.1·min(sources, 5) + 0.1·verified`, capped at 1.
pub fn confidence_score(profile: &Profile) -> f64 {
    let mut score = 0.0;
    if profile.person_info.name.is_some() {
        score += 0.3;
    }
    score += 0.2 * profile.social_profiles.len().min(3) as f64;
    score += 0.1 * profile.websites.len().min(2) as f64;
    score += 0.1 * profile.sources.len().min(5) as f64;
    score += 0.1 * profile.social_profiles.iter().filter(|s| s.verified).count() as f64;
    score.min(1.0)
}

/// Fraction of the checklist that holds.
pub fn completeness_score(profile: &Profile) -> f64 {
    let checks = [
        profile.person_info.name.is_some(),
        profile.person_info.location.is_some(),
        !profile.academic.is_empty(),
        !profile.social_profiles.is_empty(),
        !profile.search_results.is_empty(),
        !profile.phone_numbers.is_empty(),
        !profile.websites.is_empty(),
    ];
    checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64
}
