//! Extraction rule tables.
//!
//! Everything the analyzer and the scorers match against lives here as
//! plain data: CSS selectors for person fields, the social-platform domain
//! map, phone/degree/position/institution patterns, keyword weights and
//! block-lists. [`ExtractionRules`] is the serializable form (built-in
//! defaults, or a TOML file named by `rules_path`); [`CompiledRules`] is
//! what the pipeline actually runs, with every regex and selector parsed
//! once up front.
//!
//! A rules file only needs the tables it overrides:
//!
//! ```toml
//! name_blocklist = ["page", "company", "newsletter"]
//!
//! [[social_domains]]
//! domain = "mastodon.social"
//! platform = "Mastodon"
//! ```

use std::path::Path;

use anyhow::Context;
use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::Deserialize;

use crate::error::IntelError;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DomainLabel {
    pub domain: String,
    #[serde(alias = "platform")]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Weighted {
    pub term: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Ranked {
    pub phrase: String,
    pub rank: u32,
}

/// Serializable rule tables. Missing fields keep their built-in value.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExtractionRules {
    pub name_selectors: Vec<String>,
    pub occupation_selectors: Vec<String>,
    pub company_selectors: Vec<String>,
    pub location_selectors: Vec<String>,
    /// Lowercase words that disqualify a candidate person name.
    pub name_blocklist: Vec<String>,
    pub social_domains: Vec<DomainLabel>,
    pub phone_patterns: Vec<String>,
    pub stop_words: Vec<String>,

    pub degree_patterns: Vec<String>,
    pub position_patterns: Vec<String>,
    pub institution_patterns: Vec<String>,
    pub academic_platforms: Vec<DomainLabel>,
    /// Domains adding the platform bonus to an academic score.
    pub academic_domains: Vec<String>,
    pub academic_keywords: Vec<Weighted>,
    pub degree_keywords: Vec<String>,
    pub research_areas: Vec<String>,
    pub position_ranks: Vec<Ranked>,

    /// Social-platform words that bump a generic relevance score.
    pub social_keywords: Vec<String>,
    /// Words that mark a result as a likely profile or contact page.
    pub profile_indicators: Vec<String>,
    /// Words that force a result out of the ranked list.
    pub irrelevant_terms: Vec<String>,

    pub positive_words: Vec<String>,
    pub negative_words: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn labels(items: &[(&str, &str)]) -> Vec<DomainLabel> {
    items
        .iter()
        .map(|(domain, label)| DomainLabel {
            domain: domain.to_string(),
            label: label.to_string(),
        })
        .collect()
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            name_selectors: strings(&[
                "h1",
                ".name",
                "#name",
                ".author",
                ".profile-name",
                "[itemprop=\"name\"]",
                ".full-name",
                ".display-name",
            ]),
            occupation_selectors: strings(&[
                ".job-title",
                ".position",
                ".title",
                "[itemprop=\"jobTitle\"]",
                ".occupation",
                ".role",
            ]),
            company_selectors: strings(&[
                ".company",
                "[itemprop=\"worksFor\"]",
                ".organization",
                ".employer",
                ".workplace",
            ]),
            location_selectors: strings(&[
                ".location",
                "[itemprop=\"address\"]",
                ".address",
                ".city",
                ".country",
                ".region",
            ]),
            name_blocklist: strings(&[
                "page", "title", "company", "email", "contact", "home", "about", "login",
                "profile", "search", "privacy", "terms", "menu", "welcome", "inc", "llc",
                "ltd", "corporation", "website", "copyright",
            ]),
            social_domains: labels(&[
                ("linkedin.com", "LinkedIn"),
                ("twitter.com", "Twitter"),
                ("x.com", "Twitter"),
                ("facebook.com", "Facebook"),
                ("instagram.com", "Instagram"),
                ("github.com", "GitHub"),
                ("youtube.com", "YouTube"),
                ("tiktok.com", "TikTok"),
                ("t.me", "Telegram"),
                ("telegram.org", "Telegram"),
                ("vk.com", "VK"),
            ]),
            phone_patterns: strings(&[
                r"\+?1?[-.\s]?\(?[0-9]{3}\)?[-.\s]?[0-9]{3}[-.\s]?[0-9]{4}",
                r"\(\d{3}\)\s?\d{3}-\d{4}",
                r"\+[1-9]\d{9,14}",
            ]),
            stop_words: strings(&[
                "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
                "from", "up", "about", "into", "through", "during", "before", "after", "above",
                "below", "between", "among", "this", "that", "these", "those", "are", "was",
                "were", "been", "have", "has", "had", "will", "would", "could", "should", "may",
                "might", "must", "can",
            ]),

            degree_patterns: strings(&[
                r"\b(?:Ph\.?D\.?|PhD|Doctor of Philosophy|Doctorate)\b",
                r"\b(?:M\.?D\.?|MD|Doctor of Medicine)\b",
                r"\b(?:M\.?S\.?|MS|Master of Science)\b",
                r"\b(?:M\.?A\.?|MA|Master of Arts)\b",
                r"\b(?:M\.?B\.?A\.?|MBA|Master of Business Administration)\b",
                r"\b(?:B\.?S\.?|BS|Bachelor of Science)\b",
                r"\b(?:B\.?A\.?|BA|Bachelor of Arts)\b",
                r"\b(?:LL\.?M\.?|LLM|Master of Laws)\b",
                r"\b(?:J\.?D\.?|JD|Juris Doctor)\b",
                r"\b(?:Ed\.?D\.?|EdD|Doctor of Education)\b",
                r"\b(?:D\.?Sc\.?|DSc|Doctor of Science)\b",
                r"\b(?:Sc\.?D\.?|ScD|Doctor of Science)\b",
            ]),
            position_patterns: strings(&[
                r"\b(?:Professor|Prof\.?)\b",
                r"\b(?:Associate Professor|Assoc\.? Prof\.?)\b",
                r"\b(?:Assistant Professor|Asst\.? Prof\.?)\b",
                r"\b(?:Adjunct Professor|Adjunct Prof\.?)\b",
                r"\b(?:Visiting Professor|Visiting Prof\.?)\b",
                r"\b(?:Professor Emeritus|Prof\.? Emeritus)\b",
                r"\b(?:Research Professor|Research Prof\.?)\b",
                r"\b(?:Clinical Professor|Clinical Prof\.?)\b",
                r"\b(?:Lecturer|Senior Lecturer)\b",
                r"\b(?:Research Scientist|Principal Research Scientist)\b",
                r"\b(?:Postdoctoral Researcher|Postdoc|Post-doc)\b",
                r"\b(?:Graduate Student|PhD Student|Doctoral Student)\b",
                r"\b(?:Research Fellow|Senior Research Fellow)\b",
                r"\b(?:Principal Investigator|PI)\b",
                r"\b(?:Department Chair|Chair|Head of Department)\b",
                r"\b(?:Dean|Vice Dean|Associate Dean)\b",
                r"\b(?:Provost|Vice Provost)\b",
                r"\b(?:Chancellor|Vice Chancellor)\b",
            ]),
            institution_patterns: strings(&[
                r"\b(?:University|Univ\.?)\b",
                r"\b(?:College|Coll\.?)\b",
                r"\b(?:Institute|Inst\.?)\b",
                r"\b(?:Laboratory|Lab\.?)\b",
                r"\b(?:Center|Centre)\b",
                r"\b(?:School|Academy)\b",
                r"\b(?:Hospital|Medical Center)\b",
                r"\b(?:Research Center|Research Centre)\b",
            ]),
            academic_platforms: labels(&[
                ("scholar.google.com", "Google Scholar"),
                ("researchgate.net", "ResearchGate"),
                ("academia.edu", "Academia.edu"),
                ("orcid.org", "ORCID"),
                ("publons.com", "Publons"),
                ("arxiv.org", "arXiv"),
                ("pubmed.ncbi.nlm.nih.gov", "PubMed"),
                ("ieee.org", "IEEE Xplore"),
                ("acm.org", "ACM Digital Library"),
                ("jstor.org", "JSTOR"),
                ("scopus.com", "Scopus"),
                ("mendeley.com", "Mendeley"),
            ]),
            academic_domains: strings(&[
                "scholar.google.com",
                "researchgate.net",
                "academia.edu",
                "orcid.org",
                "arxiv.org",
                "pubmed.ncbi.nlm.nih.gov",
                "ieee.org",
                "acm.org",
                "springer.com",
                "elsevier.com",
            ]),
            academic_keywords: [
                ("professor", 0.3),
                ("phd", 0.25),
                ("doctor", 0.2),
                ("research", 0.2),
                ("university", 0.25),
                ("college", 0.2),
                ("faculty", 0.25),
                ("publication", 0.3),
                ("journal", 0.25),
                ("conference", 0.2),
                ("paper", 0.15),
                ("study", 0.1),
                ("academic", 0.2),
                ("scholar", 0.25),
                ("researcher", 0.25),
                ("scientist", 0.2),
                ("laboratory", 0.2),
                ("institute", 0.2),
                ("department", 0.15),
            ]
            .iter()
            .map(|(term, weight)| Weighted {
                term: term.to_string(),
                weight: *weight,
            })
            .collect(),
            degree_keywords: strings(&["phd", "ph.d", "md", "m.d", "msc", "m.sc", "mba", "m.b.a"]),
            research_areas: strings(&[
                "artificial intelligence",
                "machine learning",
                "deep learning",
                "computer science",
                "data science",
                "bioinformatics",
                "computational biology",
                "neuroscience",
                "cognitive science",
                "robotics",
                "computer vision",
                "natural language processing",
                "mathematics",
                "statistics",
                "physics",
                "chemistry",
                "biology",
                "medicine",
                "engineering",
                "psychology",
                "economics",
                "finance",
                "linguistics",
                "philosophy",
                "sociology",
                "anthropology",
                "political science",
            ]),
            position_ranks: [
                ("professor", 5),
                ("associate professor", 4),
                ("assistant professor", 3),
                ("lecturer", 2),
                ("postdoc", 1),
                ("graduate student", 0),
            ]
            .iter()
            .map(|(phrase, rank)| Ranked {
                phrase: phrase.to_string(),
                rank: *rank,
            })
            .collect(),

            social_keywords: strings(&["linkedin", "twitter", "facebook", "instagram", "github"]),
            profile_indicators: strings(&[
                "profile", "about", "bio", "contact", "linkedin", "twitter", "facebook",
            ]),
            irrelevant_terms: strings(&["spam", "scam", "fake", "bot", "advertisement"]),

            positive_words: strings(&[
                "good", "great", "excellent", "award", "best", "outstanding", "success",
                "innovative", "leading", "renowned", "distinguished", "honored",
            ]),
            negative_words: strings(&[
                "bad", "poor", "fraud", "failure", "worst", "terrible", "lawsuit", "complaint",
                "controversy", "fired", "banned",
            ]),
        }
    }
}

impl ExtractionRules {
    /// Load a rules file; absent tables keep their built-in values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        let rules: ExtractionRules =
            toml::from_str(&content).with_context(|| "Failed to parse rules file")?;
        Ok(rules)
    }

    /// Parse every selector and pattern.
    pub fn compile(&self) -> Result<CompiledRules, IntelError> {
        Ok(CompiledRules {
            name_selectors: selectors(&self.name_selectors)?,
            occupation_selectors: selectors(&self.occupation_selectors)?,
            company_selectors: selectors(&self.company_selectors)?,
            location_selectors: selectors(&self.location_selectors)?,
            phone_patterns: patterns(&self.phone_patterns, false)?,
            degree_patterns: patterns(&self.degree_patterns, true)?,
            position_patterns: patterns(&self.position_patterns, true)?,
            institution_patterns: self
                .institution_patterns
                .iter()
                .map(|p| compile_regex(&format!(r"([A-Z][a-zA-Z\s]+{p})"), false))
                .collect::<Result<_, _>>()?,
            source: self.clone(),
        })
    }
}

fn compile_regex(pattern: &str, case_insensitive: bool) -> Result<Regex, IntelError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| IntelError::Rules(format!("pattern '{pattern}': {e}")))
}

fn patterns(items: &[String], case_insensitive: bool) -> Result<Vec<Regex>, IntelError> {
    items
        .iter()
        .map(|p| compile_regex(p, case_insensitive))
        .collect()
}

fn selectors(items: &[String]) -> Result<Vec<Selector>, IntelError> {
    items
        .iter()
        .map(|s| {
            Selector::parse(s).map_err(|e| IntelError::Rules(format!("selector '{s}': {e:?}")))
        })
        .collect()
}

/// Rules with every selector and pattern parsed.
pub struct CompiledRules {
    pub name_selectors: Vec<Selector>,
    pub occupation_selectors: Vec<Selector>,
    pub company_selectors: Vec<Selector>,
    pub location_selectors: Vec<Selector>,
    pub phone_patterns: Vec<Regex>,
    pub degree_patterns: Vec<Regex>,
    pub position_patterns: Vec<Regex>,
    /// Institution patterns wrapped to capture the preceding capitalised name.
    pub institution_patterns: Vec<Regex>,
    source: ExtractionRules,
}

impl CompiledRules {
    /// The built-in tables, compiled.
    pub fn builtin() -> Result<Self, IntelError> {
        ExtractionRules::default().compile()
    }

    pub fn tables(&self) -> &ExtractionRules {
        &self.source
    }

    /// Platform for a link whose host is, or is a subdomain of, a known
    /// social domain.
    pub fn social_platform(&self, url: &str) -> Option<&str> {
        let host = url::Url::parse(url).ok()?.host_str()?.to_lowercase();
        self.source
            .social_domains
            .iter()
            .find(|d| host == d.domain || host.ends_with(&format!(".{}", d.domain)))
            .map(|d| d.label.as_str())
    }

    /// Academic platform name for a URL (substring match on the domain).
    pub fn academic_platform(&self, url: &str) -> Option<&str> {
        self.source
            .academic_platforms
            .iter()
            .find(|p| url.contains(p.domain.as_str()))
            .map(|p| p.label.as_str())
    }

    /// Highest rank among table phrases contained in `position`.
    pub fn position_rank(&self, position: &str) -> u32 {
        let lower = position.to_lowercase();
        self.source
            .position_ranks
            .iter()
            .filter(|r| lower.contains(r.phrase.as_str()))
            .map(|r| r.rank)
            .max()
            .unwrap_or(0)
    }
}
