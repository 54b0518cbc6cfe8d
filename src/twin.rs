//! Digital twin synthesis.
//!
//! A pure derivation from [`AcademicFacts`] and the raw hits behind them;
//! nothing here touches the network.
//!
//! ```text
//!                    ┌─► personality  (keyword votes over titles + snippets)
//!                    ├─► network      (collaborators, communities, influence)
//!  AcademicFacts ────┼─► career       (milestones, progression, experience)
//!  + RawResult[]     ├─► impact       (citation/research/teaching/industry/social)
//!                    └─► visualization + confidence + completeness
//! ```
//!
//! Every threshold and weight comes from [`TwinWeights`].

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::academic::{AcademicFacts, AcademicProfile};
use crate::config::TwinWeights;
use crate::models::{Degree, Position, RawResult, SocialLink};

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid regex"))
        .collect()
}

static COMMUNICATION: LazyLock<Vec<(CommunicationStyle, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            CommunicationStyle::Formal,
            compile_all(&[
                r"\b(?:furthermore|moreover|consequently|therefore|nevertheless)\b",
                r"\b(?:Dr\.|Prof\.|Professor)\b",
                r"\b(?:research|study|investigation|analysis|examination)\b",
                r"\b(?:results|findings|conclusions|implications)\b",
            ]),
        ),
        (
            CommunicationStyle::Casual,
            compile_all(&[
                r"\b(?:cool|awesome|great|amazing|fantastic)\b",
                r"\b(?:hey|hi|hello|thanks|cheers)\b",
                r"\b(?:stuff|things|pretty|really|super)\b",
            ]),
        ),
        (
            CommunicationStyle::Academic,
            compile_all(&[
                r"\b(?:hypothesis|methodology|literature|empirical|theoretical)\b",
                r"\b(?:publication|journal|conference|proceedings)\b",
                r"\b(?:significant|correlation|statistical|experimental)\b",
            ]),
        ),
    ]
});

static EXPERTISE: LazyLock<Vec<(ExpertiseLevel, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            ExpertiseLevel::Authority,
            compile_all(&[
                r"\b(?:pioneer|leader|expert|authority|renowned)\b",
                r"\b(?:established|recognized|distinguished|eminent)\b",
                r"\b(?:founding|groundbreaking|seminal|influential)\b",
            ]),
        ),
        (
            ExpertiseLevel::Expert,
            compile_all(&[
                r"\b(?:experienced|skilled|proficient|specialist)\b",
                r"\b(?:advanced|sophisticated|comprehensive|extensive)\b",
                r"\b(?:developed|created|designed|implemented)\b",
            ]),
        ),
        (
            ExpertiseLevel::Intermediate,
            compile_all(&[
                r"\b(?:working|learning|developing|exploring)\b",
                r"\b(?:interested|focused|studying|researching)\b",
            ]),
        ),
    ]
});

static COLLABORATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z][a-z]+\s+[A-Z][a-z]+)\b").expect("valid regex"));

const COLLABORATION_WORDS: &[&str] = &["collaboration", "team", "joint", "together", "partner"];
const LEADERSHIP_WORDS: &[&str] = &["lead", "director", "head", "chair", "chief"];
const INDIVIDUAL_WORDS: &[&str] = &["independent", "solo", "individual", "personal"];

const THEORETICAL_WORDS: &[&str] = &["theory", "theoretical", "model", "framework", "concept"];
const APPLIED_WORDS: &[&str] = &[
    "application",
    "practical",
    "implementation",
    "real-world",
    "industry",
];
const INTERDISCIPLINARY_WORDS: &[&str] = &[
    "interdisciplinary",
    "multidisciplinary",
    "cross-disciplinary",
];

const INNOVATION_WORDS: &[&str] = &[
    "innovative",
    "breakthrough",
    "novel",
    "pioneering",
    "groundbreaking",
    "revolutionary",
    "cutting-edge",
];
const TEACHING_WORDS: &[&str] = &["professor", "lecturer", "instructor"];
const APPLIED_AREA_WORDS: &[&str] = &["engineering", "technology", "application", "industry"];
const ENGAGEMENT_WORDS: &[&str] = &["public", "society", "community", "outreach"];
const SOCIAL_SITES: &[&str] = &["twitter", "linkedin", "facebook"];

/// Research area fragment → communities it belongs to.
const COMMUNITIES: &[(&str, &[&str])] = &[
    ("computer science", &["ACM", "IEEE Computer Society"]),
    ("machine learning", &["ICML", "NeurIPS", "ICLR"]),
    (
        "biology",
        &["Society for Molecular Biology", "American Society for Cell Biology"],
    ),
    ("physics", &["American Physical Society", "Institute of Physics"]),
    (
        "medicine",
        &["American Medical Association", "World Health Organization"],
    ),
];

const RADAR_CATEGORIES: [&str; 6] = [
    "Research Excellence",
    "Teaching Impact",
    "Industry Relevance",
    "Collaboration",
    "Innovation",
    "Digital Presence",
];
const RADAR_NETWORK_NORM: f64 = 20.0;
const KEY_COLLABORATORS: usize = 5;
const SPECIALIZATIONS: usize = 5;

fn count_words(text: &str, words: &[&str]) -> usize {
    words.iter().map(|w| text.matches(w).count()).sum()
}

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn is_phd(degree: &Degree) -> bool {
    let lower = degree.degree.to_lowercase().replace('.', "");
    lower.contains("phd") || lower.contains("doctor of philosophy")
}

fn is_professor(position: &Position) -> bool {
    position.position.to_lowercase().contains("professor")
}

/// First category with the highest positive score.
fn vote<T: Copy>(scores: &[(T, usize)]) -> Option<T> {
    let mut best: Option<(T, usize)> = None;
    for &(label, score) in scores {
        if score > 0 && best.map_or(true, |(_, b)| score > b) {
            best = Some((label, score));
        }
    }
    best.map(|(label, _)| label)
}

// ═══════════════════════════════════════════════════════════════════════
// Classifications
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommunicationStyle {
    Formal,
    Casual,
    Academic,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExpertiseLevel {
    Intermediate,
    Expert,
    Authority,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollaborationTendency {
    Individual,
    Collaborative,
    Leader,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResearchFocus {
    Theoretical,
    Applied,
    Interdisciplinary,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CareerStage {
    Student,
    EarlyCareer,
    MidCareer,
    Senior,
    Emeritus,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DigitalPresence {
    #[default]
    Minimal,
    Moderate,
    Active,
    Prominent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CareerProgression {
    Ascending,
    Stable,
    Transitioning,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalityProfile {
    pub communication_style: CommunicationStyle,
    pub expertise_level: ExpertiseLevel,
    pub collaboration_tendency: CollaborationTendency,
    pub research_focus: ResearchFocus,
    pub career_stage: CareerStage,
    pub digital_presence: DigitalPresence,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkAnalysis {
    pub collaborators: Vec<String>,
    pub institutions: Vec<String>,
    pub research_communities: Vec<String>,
    pub influence_score: f64,
    pub centrality_score: f64,
    pub network_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    Degree,
    Position,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(rename = "type")]
    pub kind: MilestoneKind,
    /// `None` when the year is unknown.
    pub year: Option<String>,
    pub description: String,
    /// 1 (lowest) to 5.
    pub importance: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CareerTrajectory {
    pub career_milestones: Vec<Milestone>,
    pub career_progression: CareerProgression,
    pub experience_years: Option<i32>,
    pub career_changes: Vec<String>,
    pub specialization_evolution: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitationImpact {
    pub publication_count: usize,
    pub estimated_citations: usize,
    pub h_index_estimate: usize,
    pub publication_venues: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchImpact {
    pub research_breadth: usize,
    pub research_visibility: usize,
    pub interdisciplinary_scope: usize,
    pub innovation_indicators: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeachingImpact {
    pub teaching_positions: usize,
    pub educational_impact_estimate: usize,
    pub institutions_taught: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndustryImpact {
    pub applied_research_areas: usize,
    pub industry_relevance_score: f64,
    pub potential_applications: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocialImpact {
    pub digital_presence: usize,
    pub public_engagement_score: usize,
    pub social_media_activity: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImpactMetrics {
    pub citation_impact: CitationImpact,
    pub research_impact: ResearchImpact,
    pub teaching_impact: TeachingImpact,
    pub industry_impact: IndustryImpact,
    pub social_impact: SocialImpact,
    pub overall_impact_score: f64,
}

// ═══════════════════════════════════════════════════════════════════════
// Visualization payloads
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCard {
    pub name: String,
    pub email: String,
    pub primary_affiliation: String,
    pub career_stage: CareerStage,
    pub expertise_level: ExpertiseLevel,
    pub confidence_score: f64,
    pub completeness_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRadar {
    pub categories: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CareerTimeline {
    pub events: Vec<Milestone>,
    pub career_progression: CareerProgression,
    pub experience_years: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactBreakdown {
    pub citation_impact: usize,
    pub research_visibility: usize,
    pub teaching_positions: usize,
    pub industry_relevance: f64,
    pub social_engagement: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactChart {
    pub overall_score: f64,
    pub breakdown: ImpactBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudWord {
    pub text: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollaborationView {
    pub centrality_score: f64,
    pub network_size: usize,
    pub influence_score: f64,
    pub key_collaborators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearCount {
    pub year: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationTrends {
    pub yearly_counts: Vec<YearCount>,
    pub total_publications: usize,
    pub active_years: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    pub profile_summary: ProfileCard,
    pub skill_radar: SkillRadar,
    pub career_timeline: CareerTimeline,
    pub network_graph: NetworkGraph,
    pub impact_metrics: ImpactChart,
    pub research_areas_cloud: Vec<CloudWord>,
    pub collaboration_network: CollaborationView,
    pub publication_trends: PublicationTrends,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigitalTwin {
    pub email: String,
    pub name: Option<String>,
    pub primary_affiliation: Option<String>,
    pub academic_profile: AcademicProfile,
    pub personality: PersonalityProfile,
    pub network: NetworkAnalysis,
    pub career: CareerTrajectory,
    pub impact: ImpactMetrics,
    pub visualization: Option<Visualization>,
    pub confidence_score: f64,
    pub completeness_score: f64,
    pub data_sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Compact view of a twin for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwinSummary {
    pub name: String,
    pub email: String,
    pub primary_affiliation: String,
    pub career_stage: CareerStage,
    pub expertise_level: ExpertiseLevel,
    pub academic_rank: Option<String>,
    pub research_areas_count: usize,
    pub overall_impact_score: f64,
    pub publication_count: usize,
    pub network_size: usize,
    pub digital_presence: DigitalPresence,
    pub confidence_score: f64,
    pub completeness_score: f64,
    pub data_sources_count: usize,
    pub visualization_ready: bool,
}

impl DigitalTwin {
    pub fn summary(&self) -> TwinSummary {
        TwinSummary {
            name: self.name.clone().unwrap_or_else(|| "Unknown".to_string()),
            email: self.email.clone(),
            primary_affiliation: self
                .primary_affiliation
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            career_stage: self.personality.career_stage,
            expertise_level: self.personality.expertise_level,
            academic_rank: self.academic_profile.academic_rank.clone(),
            research_areas_count: self.academic_profile.record.research_areas.len(),
            overall_impact_score: self.impact.overall_impact_score,
            publication_count: self.academic_profile.record.publications.len(),
            network_size: self.network.network_size,
            digital_presence: self.personality.digital_presence,
            confidence_score: self.confidence_score,
            completeness_score: self.completeness_score,
            data_sources_count: self.data_sources.len(),
            visualization_ready: self.visualization.is_some(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Synthesizer
// ═══════════════════════════════════════════════════════════════════════

pub struct DigitalTwinSynthesizer {
    weights: TwinWeights,
}

/// [`DigitalTwinSynthesizer::synthesize`] with default weights and no
/// social profiles.
pub fn synthesize_digital_twin(
    email: &str,
    academic: &AcademicFacts,
    results: &[RawResult],
) -> DigitalTwin {
    DigitalTwinSynthesizer::new(TwinWeights::default()).synthesize(email, academic, results, &[])
}

impl DigitalTwinSynthesizer {
    pub fn new(weights: TwinWeights) -> Self {
        Self { weights }
    }

    pub fn synthesize(
        &self,
        email: &str,
        academic: &AcademicFacts,
        results: &[RawResult],
        social_profiles: &[SocialLink],
    ) -> DigitalTwin {
        self.synthesize_at(email, academic, results, social_profiles, Utc::now())
    }

    /// [`synthesize`](Self::synthesize) with an explicit clock, which fixes
    /// `experience_years` and `created_at`.
    pub fn synthesize_at(
        &self,
        email: &str,
        academic: &AcademicFacts,
        results: &[RawResult],
        social_profiles: &[SocialLink],
        now: DateTime<Utc>,
    ) -> DigitalTwin {
        let profile = &academic.profile;
        let text = results
            .iter()
            .flat_map(|r| [r.title.as_str(), r.snippet.as_str()])
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        let mut twin = DigitalTwin {
            email: email.to_string(),
            name: profile.name.clone(),
            primary_affiliation: profile.record.institutions.first().cloned(),
            academic_profile: profile.clone(),
            personality: self.personality(&text, profile, social_profiles),
            network: self.network(profile, results),
            career: self.career(profile, now.year()),
            impact: self.impact(profile, results),
            visualization: None,
            confidence_score: self.confidence(academic, results),
            completeness_score: 0.0,
            data_sources: data_sources(results),
            created_at: now,
        };
        twin.completeness_score = completeness(&twin);
        twin.visualization = Some(visualize(&twin));

        tracing::info!(
            email,
            confidence = twin.confidence_score,
            completeness = twin.completeness_score,
            "digital twin synthesized"
        );
        twin
    }

    fn personality(
        &self,
        text: &str,
        profile: &AcademicProfile,
        social_profiles: &[SocialLink],
    ) -> PersonalityProfile {
        PersonalityProfile {
            communication_style: communication_style(text),
            expertise_level: self.expertise_level(text, profile),
            collaboration_tendency: collaboration_tendency(text),
            research_focus: research_focus(text),
            career_stage: career_stage(profile),
            digital_presence: self.digital_presence(profile, social_profiles),
        }
    }

    fn expertise_level(&self, text: &str, profile: &AcademicProfile) -> ExpertiseLevel {
        let w = &self.weights;
        let record = &profile.record;
        let mut scores: Vec<(ExpertiseLevel, usize)> = EXPERTISE
            .iter()
            .map(|(level, patterns)| {
                (
                    *level,
                    patterns.iter().map(|p| p.find_iter(text).count()).sum(),
                )
            })
            .collect();
        let mut bump = |level: ExpertiseLevel, by: usize| {
            if let Some(entry) = scores.iter_mut().find(|(l, _)| *l == level) {
                entry.1 += by;
            }
        };

        if record.degrees.iter().any(is_phd) {
            bump(ExpertiseLevel::Expert, w.phd_expert_bonus);
        }
        if record.positions.iter().any(is_professor) {
            bump(ExpertiseLevel::Authority, w.professor_authority_bonus);
        }
        let publications = record.publications.len();
        if publications > w.many_publications {
            bump(ExpertiseLevel::Authority, w.many_publications_bonus);
        } else if publications > w.some_publications {
            bump(ExpertiseLevel::Expert, w.some_publications_bonus);
        }
        vote(&scores).unwrap_or_default()
    }

    fn digital_presence(
        &self,
        profile: &AcademicProfile,
        social_profiles: &[SocialLink],
    ) -> DigitalPresence {
        let w = &self.weights;
        let total = profile.record.academic_websites.len() + social_profiles.len();
        if total >= w.presence_prominent {
            DigitalPresence::Prominent
        } else if total >= w.presence_active {
            DigitalPresence::Active
        } else if total >= w.presence_moderate {
            DigitalPresence::Moderate
        } else {
            DigitalPresence::Minimal
        }
    }

    fn network(&self, profile: &AcademicProfile, results: &[RawResult]) -> NetworkAnalysis {
        let w = &self.weights;
        let record = &profile.record;

        let mut collaborators: Vec<String> = Vec::new();
        for publication in &record.publications {
            for c in COLLABORATOR.captures_iter(&publication.context) {
                let name = &c[1];
                if collaborators.len() < w.collaborator_limit
                    && !collaborators.iter().any(|n| n == name)
                {
                    collaborators.push(name.to_string());
                }
            }
        }

        let mut communities: Vec<String> = Vec::new();
        for area in &record.research_areas {
            let lower = area.to_lowercase();
            for (fragment, names) in COMMUNITIES {
                if lower.contains(fragment) {
                    for name in *names {
                        if !communities.iter().any(|c| c == name) {
                            communities.push(name.to_string());
                        }
                    }
                }
            }
        }

        let network_size = collaborators.len() + record.institutions.len();
        let high = results
            .iter()
            .filter(|r| r.academic_score.unwrap_or(0.0) > w.high_academic_threshold)
            .count();
        let professors = record.positions.iter().filter(|p| is_professor(p)).count();
        let influence = record.publications.len() as f64 * w.influence_per_publication
            + record.academic_websites.len() as f64 * w.influence_per_website
            + high as f64 * w.influence_per_high_result
            + professors as f64 * w.influence_per_professor;
        let centrality = if network_size == 0 {
            0.0
        } else {
            (network_size as f64 / w.centrality_max_network as f64).min(1.0)
        };

        NetworkAnalysis {
            collaborators,
            institutions: record.institutions.clone(),
            research_communities: communities,
            influence_score: influence.min(1.0),
            centrality_score: centrality,
            network_size,
        }
    }

    fn career(&self, profile: &AcademicProfile, current_year: i32) -> CareerTrajectory {
        let record = &profile.record;
        let university = |u: &Option<String>| u.clone().unwrap_or_else(|| "Unknown".to_string());

        let mut milestones: Vec<Milestone> = record
            .degrees
            .iter()
            .filter(|d| d.year.is_some())
            .map(|d| Milestone {
                kind: MilestoneKind::Degree,
                year: d.year.clone(),
                description: format!("{} from {}", d.degree, university(&d.university)),
                importance: degree_importance(&d.degree),
            })
            .chain(record.positions.iter().map(|p| Milestone {
                kind: MilestoneKind::Position,
                year: None,
                description: format!("{} at {}", p.position, university(&p.university)),
                importance: position_importance(&p.position),
            }))
            .collect();
        // Known years first, ascending.
        milestones.sort_by(|a, b| (a.year.is_none(), &a.year).cmp(&(b.year.is_none(), &b.year)));

        let experience_years = record
            .degrees
            .iter()
            .filter_map(|d| d.year.as_deref()?.parse::<i32>().ok())
            .min()
            .map(|earliest| current_year - earliest);

        let mut changes = Vec::new();
        if record.institutions.len() > 1 {
            changes.push(format!(
                "Institution changes: {} different institutions",
                record.institutions.len()
            ));
        }
        if record.research_areas.len() > 3 {
            changes.push(format!(
                "Diverse research interests: {} areas",
                record.research_areas.len()
            ));
        }

        CareerTrajectory {
            career_progression: self.progression(&milestones),
            career_milestones: milestones,
            experience_years,
            career_changes: changes,
            specialization_evolution: record
                .research_areas
                .iter()
                .take(SPECIALIZATIONS)
                .cloned()
                .collect(),
        }
    }

    fn progression(&self, milestones: &[Milestone]) -> CareerProgression {
        if milestones.len() < 2 {
            return CareerProgression::Unknown;
        }
        let trend: Vec<u8> = milestones
            .iter()
            .filter(|m| m.year.is_some())
            .map(|m| m.importance)
            .collect();
        if trend.len() < 2 {
            return CareerProgression::Stable;
        }
        let rising = trend.windows(2).filter(|w| w[1] > w[0]).count() as f64;
        let n = trend.len() as f64;
        if rising >= n * self.weights.ascending_ratio {
            CareerProgression::Ascending
        } else if rising <= n * self.weights.transitioning_ratio {
            CareerProgression::Transitioning
        } else {
            CareerProgression::Stable
        }
    }

    fn impact(&self, profile: &AcademicProfile, results: &[RawResult]) -> ImpactMetrics {
        let w = &self.weights;
        let record = &profile.record;

        let publication_count = record.publications.len();
        let mut venues: Vec<String> = Vec::new();
        for p in &record.publications {
            let venue = p.journal.clone().unwrap_or_else(|| "Unknown".to_string());
            if !venues.contains(&venue) {
                venues.push(venue);
            }
        }
        let citation_impact = CitationImpact {
            publication_count,
            estimated_citations: publication_count * w.citations_per_publication,
            h_index_estimate: publication_count.min(w.h_index_cap),
            publication_venues: venues,
        };

        let research_impact = ResearchImpact {
            research_breadth: record.research_areas.len(),
            research_visibility: results
                .iter()
                .filter(|r| r.academic_score.unwrap_or(0.0) > w.visibility_threshold)
                .count(),
            interdisciplinary_scope: record
                .research_areas
                .iter()
                .filter(|a| a.to_lowercase().contains("interdisciplinary"))
                .count(),
            innovation_indicators: results
                .iter()
                .map(|r| {
                    let text = r.text().to_lowercase();
                    INNOVATION_WORDS.iter().filter(|t| text.contains(*t)).count()
                })
                .sum(),
        };

        let teaching: Vec<&Position> = record
            .positions
            .iter()
            .filter(|p| contains_any(&p.position.to_lowercase(), TEACHING_WORDS))
            .collect();
        let taught: HashSet<&str> = teaching
            .iter()
            .map(|p| p.university.as_deref().unwrap_or(""))
            .collect();
        let teaching_impact = TeachingImpact {
            teaching_positions: teaching.len(),
            educational_impact_estimate: teaching.len() * 2,
            institutions_taught: taught.len(),
        };

        let applied: Vec<String> = record
            .research_areas
            .iter()
            .filter(|a| contains_any(&a.to_lowercase(), APPLIED_AREA_WORDS))
            .cloned()
            .collect();
        let industry_impact = IndustryImpact {
            applied_research_areas: applied.len(),
            industry_relevance_score: (applied.len() as f64 / w.impact_industry_norm).min(1.0),
            potential_applications: applied,
        };

        let social_impact = SocialImpact {
            digital_presence: record.academic_websites.len(),
            public_engagement_score: results
                .iter()
                .filter(|r| contains_any(&r.snippet.to_lowercase(), ENGAGEMENT_WORDS))
                .count(),
            social_media_activity: record
                .academic_websites
                .iter()
                .filter(|u| contains_any(u, SOCIAL_SITES))
                .count(),
        };

        let norm = |count: usize, by: f64| (count as f64 / by).min(1.0);
        let overall = (norm(publication_count, w.impact_publication_norm)
            + norm(research_impact.research_visibility, w.impact_visibility_norm)
            + norm(teaching_impact.teaching_positions, w.impact_teaching_norm)
            + industry_impact.industry_relevance_score
            + norm(social_impact.public_engagement_score, w.impact_engagement_norm))
            / 5.0;

        ImpactMetrics {
            citation_impact,
            research_impact,
            teaching_impact,
            industry_impact,
            social_impact,
            overall_impact_score: overall,
        }
    }

    /// Mean of the academic overall confidence and the share of
    /// high-academic hits.
    fn confidence(&self, academic: &AcademicFacts, results: &[RawResult]) -> f64 {
        let w = &self.weights;
        let high = results
            .iter()
            .filter(|r| r.academic_score.unwrap_or(0.0) > w.high_academic_threshold)
            .count();
        let search = (high as f64 / w.confidence_result_norm).min(1.0);
        (academic.confidence_scores.overall + search) / 2.0
    }
}

fn communication_style(text: &str) -> CommunicationStyle {
    let scores: Vec<(CommunicationStyle, usize)> = COMMUNICATION
        .iter()
        .map(|(style, patterns)| {
            (
                *style,
                patterns.iter().map(|p| p.find_iter(text).count()).sum(),
            )
        })
        .collect();
    vote(&scores).unwrap_or_default()
}

fn collaboration_tendency(text: &str) -> CollaborationTendency {
    let collab = count_words(text, COLLABORATION_WORDS);
    let leader = count_words(text, LEADERSHIP_WORDS);
    let individual = count_words(text, INDIVIDUAL_WORDS);
    if leader > collab && leader > individual {
        CollaborationTendency::Leader
    } else if collab > individual {
        CollaborationTendency::Collaborative
    } else if individual > 0 {
        CollaborationTendency::Individual
    } else {
        CollaborationTendency::Unknown
    }
}

fn research_focus(text: &str) -> ResearchFocus {
    let theoretical = count_words(text, THEORETICAL_WORDS);
    let applied = count_words(text, APPLIED_WORDS);
    if count_words(text, INTERDISCIPLINARY_WORDS) > 0 {
        ResearchFocus::Interdisciplinary
    } else if applied > theoretical {
        ResearchFocus::Applied
    } else if theoretical > 0 {
        ResearchFocus::Theoretical
    } else {
        ResearchFocus::Unknown
    }
}

/// Decided by the first position that names a stage, else by a PhD.
fn career_stage(profile: &AcademicProfile) -> CareerStage {
    let record = &profile.record;
    if record.positions.is_empty() && record.degrees.is_empty() {
        return CareerStage::Unknown;
    }
    for position in &record.positions {
        let title = position.position.to_lowercase();
        if title.contains("emeritus") {
            return CareerStage::Emeritus;
        }
        if title.contains("professor") && !title.contains("assistant") && !title.contains("associate")
        {
            return CareerStage::Senior;
        }
        if title.contains("associate professor") {
            return CareerStage::MidCareer;
        }
        if title.contains("assistant professor") {
            return CareerStage::EarlyCareer;
        }
        if contains_any(&title, &["student", "phd", "doctoral"]) {
            return CareerStage::Student;
        }
    }
    if record.degrees.iter().any(is_phd) {
        return CareerStage::EarlyCareer;
    }
    CareerStage::Unknown
}

pub fn degree_importance(degree: &str) -> u8 {
    let lower = degree.to_lowercase().replace('.', "");
    if lower.contains("phd") || lower.contains("doctor") {
        5
    } else if lower.contains("master") || lower.contains("mba") {
        3
    } else if lower.contains("bachelor") {
        2
    } else {
        1
    }
}

pub fn position_importance(position: &str) -> u8 {
    let lower = position.to_lowercase();
    if contains_any(&lower, &["professor", "dean", "chair"]) {
        5
    } else if contains_any(&lower, &["researcher", "scientist"]) {
        3
    } else if lower.contains("student") {
        1
    } else {
        2
    }
}

/// Ten presence checks over the twin, as a fraction.
fn completeness(twin: &DigitalTwin) -> f64 {
    let record = &twin.academic_profile.record;
    let checks = [
        twin.name.is_some(),
        !record.degrees.is_empty(),
        !record.positions.is_empty(),
        !record.institutions.is_empty(),
        !record.publications.is_empty(),
        !record.research_areas.is_empty(),
        !twin.network.collaborators.is_empty(),
        !twin.career.career_milestones.is_empty(),
        twin.impact.overall_impact_score > 0.0,
        !record.academic_websites.is_empty(),
    ];
    checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64
}

/// Distinct hosts of the hits, in first-seen order.
fn data_sources(results: &[RawResult]) -> Vec<String> {
    let mut hosts: Vec<String> = Vec::new();
    for r in results {
        let Some(host) = url::Url::parse(&r.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
        else {
            continue;
        };
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    hosts
}

fn visualize(twin: &DigitalTwin) -> Visualization {
    let record = &twin.academic_profile.record;
    let network = &twin.network;
    let impact = &twin.impact;
    let unknown = || "Unknown".to_string();

    let mut nodes = vec![GraphNode {
        id: twin.email.clone(),
        label: twin.name.clone().unwrap_or_else(|| twin.email.clone()),
        kind: "person".to_string(),
        size: 10,
    }];
    let mut edges = Vec::new();
    for inst in &network.institutions {
        nodes.push(GraphNode {
            id: inst.clone(),
            label: inst.clone(),
            kind: "institution".to_string(),
            size: 5,
        });
        edges.push(GraphEdge {
            from: twin.email.clone(),
            to: inst.clone(),
            kind: "affiliation".to_string(),
        });
    }
    for collab in &network.collaborators {
        nodes.push(GraphNode {
            id: collab.clone(),
            label: collab.clone(),
            kind: "collaborator".to_string(),
            size: 3,
        });
        edges.push(GraphEdge {
            from: twin.email.clone(),
            to: collab.clone(),
            kind: "collaboration".to_string(),
        });
    }

    let mut years: BTreeMap<String, usize> = BTreeMap::new();
    for p in &record.publications {
        if let Some(year) = p.year.as_deref().filter(|y| y.chars().all(|c| c.is_ascii_digit())) {
            *years.entry(year.to_string()).or_default() += 1;
        }
    }

    Visualization {
        profile_summary: ProfileCard {
            name: twin.name.clone().unwrap_or_else(unknown),
            email: twin.email.clone(),
            primary_affiliation: twin.primary_affiliation.clone().unwrap_or_else(unknown),
            career_stage: twin.personality.career_stage,
            expertise_level: twin.personality.expertise_level,
            confidence_score: twin.confidence_score,
            completeness_score: twin.completeness_score,
        },
        skill_radar: SkillRadar {
            categories: RADAR_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            values: vec![
                impact.research_impact.research_visibility as f64 / 10.0,
                impact.teaching_impact.teaching_positions as f64 / 5.0,
                impact.industry_impact.industry_relevance_score,
                (network.network_size as f64 / RADAR_NETWORK_NORM).min(1.0),
                (impact.research_impact.innovation_indicators as f64 / 5.0).min(1.0),
                (impact.social_impact.digital_presence as f64 / 5.0).min(1.0),
            ],
        },
        career_timeline: CareerTimeline {
            events: twin.career.career_milestones.clone(),
            career_progression: twin.career.career_progression,
            experience_years: twin.career.experience_years,
        },
        network_graph: NetworkGraph { nodes, edges },
        impact_metrics: ImpactChart {
            overall_score: impact.overall_impact_score,
            breakdown: ImpactBreakdown {
                citation_impact: impact.citation_impact.publication_count,
                research_visibility: impact.research_impact.research_visibility,
                teaching_positions: impact.teaching_impact.teaching_positions,
                industry_relevance: impact.industry_impact.industry_relevance_score,
                social_engagement: impact.social_impact.public_engagement_score,
            },
        },
        research_areas_cloud: record
            .research_areas
            .iter()
            .map(|a| CloudWord {
                text: a.clone(),
                size: 20 + a.chars().count(),
            })
            .collect(),
        collaboration_network: CollaborationView {
            centrality_score: network.centrality_score,
            network_size: network.network_size,
            influence_score: network.influence_score,
            key_collaborators: network
                .collaborators
                .iter()
                .take(KEY_COLLABORATORS)
                .cloned()
                .collect(),
        },
        publication_trends: PublicationTrends {
            active_years: years.len(),
            yearly_counts: years
                .into_iter()
                .map(|(year, count)| YearCount { year, count })
                .collect(),
            total_publications: record.publications.len(),
        },
    }
}
