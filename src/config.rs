use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub pdf: PdfConfig,
    #[serde(default)]
    pub twin: TwinWeights,
    /// Optional TOML file overriding the built-in extraction rules.
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/eint.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_max_results_per_source")]
    pub max_results_per_source: usize,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    #[serde(default = "default_collect_deadline_secs")]
    pub collect_deadline_secs: Option<u64>,
    #[serde(default = "default_scrape_top_pages")]
    pub scrape_top_pages: usize,
    /// Academic query variants added to every profile collection.
    #[serde(default = "default_collect_academic_queries")]
    pub collect_academic_queries: usize,
    #[serde(default = "default_engines")]
    pub engines: Vec<String>,
    #[serde(default = "default_academic_sources")]
    pub academic_sources: Vec<String>,
    #[serde(default = "default_social_sources")]
    pub social_sources: Vec<String>,
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,
    #[serde(default)]
    pub github_token: Option<String>,
}

fn default_max_queries() -> usize {
    15
}
fn default_max_results() -> usize {
    20
}
fn default_max_results_per_source() -> usize {
    10
}
fn default_max_concurrency() -> usize {
    5
}
fn default_relevance_threshold() -> f64 {
    0.3
}
fn default_collect_deadline_secs() -> Option<u64> {
    Some(120)
}
fn default_scrape_top_pages() -> usize {
    5
}
fn default_collect_academic_queries() -> usize {
    3
}
fn default_engines() -> Vec<String> {
    ["google", "bing", "duckduckgo", "yandex"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
fn default_academic_sources() -> Vec<String> {
    vec!["google_scholar".to_string()]
}
fn default_social_sources() -> Vec<String> {
    vec!["github".to_string()]
}
fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
    ]
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_queries: default_max_queries(),
            max_results: default_max_results(),
            max_results_per_source: default_max_results_per_source(),
            max_concurrency: default_max_concurrency(),
            relevance_threshold: default_relevance_threshold(),
            collect_deadline_secs: default_collect_deadline_secs(),
            scrape_top_pages: default_scrape_top_pages(),
            collect_academic_queries: default_collect_academic_queries(),
            engines: default_engines(),
            academic_sources: default_academic_sources(),
            social_sources: default_social_sources(),
            user_agents: default_user_agents(),
            github_token: None,
        }
    }
}

impl SearchConfig {
    pub fn collect_deadline(&self) -> Option<Duration> {
        self.collect_deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    /// Linear backoff step: attempt `n` waits `n * backoff_ms` before retrying.
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            backoff_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub initial_delay_secs: f64,
    pub min_delay_secs: f64,
    pub max_delay_secs: f64,
    pub success_factor: f64,
    pub failure_factor: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 1.0,
            min_delay_secs: 0.5,
            max_delay_secs: 10.0,
            success_factor: 0.9,
            failure_factor: 1.5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    /// A stored profile younger than this is returned without refreshing.
    pub profile_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            profile_ttl_secs: 86_400,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PdfSourceConfig {
    pub name: String,
    /// URL with an `{email}` placeholder (already percent-encoded on substitution).
    pub url_template: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PdfConfig {
    pub enabled: bool,
    pub download_timeout_secs: u64,
    pub min_bytes: usize,
    pub max_links_per_page: usize,
    pub max_documents_per_source: usize,
    pub context_lines: usize,
    pub max_authors: usize,
    pub max_institutions: usize,
    pub sources: Vec<PdfSourceConfig>,
}

impl Default for PdfConfig {
    fn default() -> Self {
        let source = |name: &str, url: &str| PdfSourceConfig {
            name: name.to_string(),
            url_template: url.to_string(),
        };
        Self {
            enabled: true,
            download_timeout_secs: 30,
            min_bytes: 1000,
            max_links_per_page: 5,
            max_documents_per_source: 3,
            context_lines: 3,
            max_authors: 10,
            max_institutions: 5,
            sources: vec![
                source(
                    "Google",
                    "https://www.google.com/search?q=%22{email}%22+filetype:pdf",
                ),
                source(
                    "Bing",
                    "https://www.bing.com/search?q=%22{email}%22+filetype:pdf",
                ),
                source(
                    "DuckDuckGo",
                    "https://html.duckduckgo.com/html/?q=%22{email}%22+filetype:pdf",
                ),
                source(
                    "Yandex",
                    "https://yandex.ru/search/?text={email}%20filetype%3Apdf",
                ),
                source(
                    "Google Scholar",
                    "https://scholar.google.com/scholar?q=%22{email}%22",
                ),
                source("ResearchGate", "https://www.researchgate.net/search?q={email}"),
            ],
        }
    }
}

/// Weights and thresholds used by the digital-twin synthesizer.
///
/// Defaults reproduce the reference constants exactly; golden-output tests
/// depend on them.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TwinWeights {
    pub high_academic_threshold: f64,
    pub visibility_threshold: f64,
    pub influence_per_publication: f64,
    pub influence_per_website: f64,
    pub influence_per_high_result: f64,
    pub influence_per_professor: f64,
    pub centrality_max_network: usize,
    pub collaborator_limit: usize,
    pub presence_prominent: usize,
    pub presence_active: usize,
    pub presence_moderate: usize,
    pub phd_expert_bonus: usize,
    pub professor_authority_bonus: usize,
    pub many_publications: usize,
    pub many_publications_bonus: usize,
    pub some_publications: usize,
    pub some_publications_bonus: usize,
    pub citations_per_publication: usize,
    pub h_index_cap: usize,
    pub impact_publication_norm: f64,
    pub impact_visibility_norm: f64,
    pub impact_teaching_norm: f64,
    pub impact_industry_norm: f64,
    pub impact_engagement_norm: f64,
    pub ascending_ratio: f64,
    pub transitioning_ratio: f64,
    pub confidence_result_norm: f64,
}

impl Default for TwinWeights {
    fn default() -> Self {
        Self {
            high_academic_threshold: 0.6,
            visibility_threshold: 0.7,
            influence_per_publication: 0.1,
            influence_per_website: 0.2,
            influence_per_high_result: 0.15,
            influence_per_professor: 0.3,
            centrality_max_network: 50,
            collaborator_limit: 10,
            presence_prominent: 5,
            presence_active: 3,
            presence_moderate: 1,
            phd_expert_bonus: 2,
            professor_authority_bonus: 3,
            many_publications: 10,
            many_publications_bonus: 2,
            some_publications: 5,
            some_publications_bonus: 1,
            citations_per_publication: 5,
            h_index_cap: 10,
            impact_publication_norm: 20.0,
            impact_visibility_norm: 10.0,
            impact_teaching_norm: 5.0,
            impact_industry_norm: 5.0,
            impact_engagement_norm: 5.0,
            ascending_ratio: 0.6,
            transitioning_ratio: 0.2,
            confidence_result_norm: 5.0,
        }
    }
}

impl Config {
    /// Defaults with the database under the current directory.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.search;
        if s.max_queries == 0 {
            anyhow::bail!("search.max_queries must be >= 1");
        }
        if s.max_results == 0 {
            anyhow::bail!("search.max_results must be >= 1");
        }
        if s.max_results_per_source == 0 {
            anyhow::bail!("search.max_results_per_source must be >= 1");
        }
        if !(1..=64).contains(&s.max_concurrency) {
            anyhow::bail!("search.max_concurrency must be in [1, 64]");
        }
        if !(0.0..=1.0).contains(&s.relevance_threshold) {
            anyhow::bail!("search.relevance_threshold must be in [0.0, 1.0]");
        }
        if s.collect_deadline_secs == Some(0) {
            anyhow::bail!("search.collect_deadline_secs must be > 0 when set");
        }

        if self.fetch.max_attempts == 0 {
            anyhow::bail!("fetch.max_attempts must be >= 1");
        }
        if self.fetch.timeout_secs == 0 {
            anyhow::bail!("fetch.timeout_secs must be > 0");
        }

        let r = &self.rate_limit;
        if r.min_delay_secs < 0.0 || r.min_delay_secs > r.max_delay_secs {
            anyhow::bail!("rate_limit.min_delay_secs must be in [0, max_delay_secs]");
        }
        if r.initial_delay_secs < 0.0 {
            anyhow::bail!("rate_limit.initial_delay_secs must be >= 0");
        }
        if !(r.success_factor > 0.0 && r.success_factor <= 1.0) {
            anyhow::bail!("rate_limit.success_factor must be in (0.0, 1.0]");
        }
        if r.failure_factor < 1.0 {
            anyhow::bail!("rate_limit.failure_factor must be >= 1.0");
        }

        if self.cache.ttl_secs == 0 {
            anyhow::bail!("cache.ttl_secs must be > 0");
        }

        for src in &self.pdf.sources {
            if !src.url_template.contains("{email}") {
                anyhow::bail!(
                    "pdf source '{}' url_template must contain {{email}}",
                    src.name
                );
            }
        }

        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}
