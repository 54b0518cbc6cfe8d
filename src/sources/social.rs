//! Social platforms. GitHub is the one with a public lookup API.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::fetch::{FetchContext, Request};
use crate::models::{Query, RawResult, SourceKind};
use crate::sources::engine::search_url;
use crate::sources::SourceFetcher;

const SEARCH_URL: &str = "https://api.github.com/search/users?q={query}&per_page={num}";
const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Deserialize)]
struct UserSearch {
    #[serde(default)]
    items: Vec<UserItem>,
}

#[derive(Debug, Deserialize)]
struct UserItem {
    login: String,
    html_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct UserDetail {
    name: Option<String>,
    company: Option<String>,
    location: Option<String>,
    bio: Option<String>,
}

/// GitHub user search. A query containing `@` is matched against public
/// emails and its first hit is marked verified; anything else is matched
/// against logins.
pub struct GitHubUsers {
    ctx: Arc<FetchContext>,
    token: Option<String>,
    max_results: usize,
}

impl GitHubUsers {
    pub fn new(ctx: Arc<FetchContext>, token: Option<String>, max_results: usize) -> Self {
        Self {
            ctx,
            token,
            max_results,
        }
    }

    fn request<'a>(&self, url: &'a str) -> Request<'a> {
        let request = Request {
            accept: ACCEPT,
            ..Request::json(url)
        };
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {token}")),
            None => request,
        }
    }

    async fn detail(&self, login: &str) -> UserDetail {
        let url = format!("https://api.github.com/users/{login}");
        match self.ctx.send(self.request(&url)).await {
            Ok(response) => serde_json::from_slice(&response.body).unwrap_or_default(),
            Err(_) => UserDetail::default(),
        }
    }
}

/// `"GitHub user jdoe. Bio. Company: Acme. Location: Berlin."`
fn describe(login: &str, detail: &UserDetail) -> String {
    let mut parts = vec![format!("GitHub user {login}.")];
    if let Some(bio) = detail.bio.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("{}.", bio.trim().trim_end_matches('.')));
    }
    if let Some(company) = detail.company.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Company: {}.", company.trim().trim_start_matches('@')));
    }
    if let Some(location) = detail.location.as_deref().filter(|s| !s.trim().is_empty()) {
        parts.push(format!("Location: {}.", location.trim()));
    }
    parts.join(" ")
}

#[async_trait]
impl SourceFetcher for GitHubUsers {
    fn name(&self) -> &str {
        "GitHub"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    async fn fetch(&self, query: &Query) -> Vec<RawResult> {
        let term = query.text.trim().trim_matches('"');
        let by_email = term.contains('@');
        let qualifier = if by_email { "in:email" } else { "in:login" };
        let url = search_url(SEARCH_URL, &format!("{term} {qualifier}"), self.max_results);

        let Ok(response) = self.ctx.send(self.request(&url)).await else {
            return Vec::new();
        };
        let search: UserSearch = match serde_json::from_slice(&response.body) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(url = %url, "unreadable GitHub search response: {e}");
                return Vec::new();
            }
        };

        let mut results = Vec::new();
        for (i, item) in search.items.into_iter().take(self.max_results).enumerate() {
            // Only the best match is worth a second request.
            let detail = if i == 0 {
                self.detail(&item.login).await
            } else {
                UserDetail::default()
            };
            let title = detail.name.clone().unwrap_or_else(|| item.login.clone());
            let mut result = RawResult::new(
                title,
                item.html_url,
                describe(&item.login, &detail),
                "GitHub",
                SourceKind::Social,
                i + 1,
            );
            result.verified = by_email && i == 0;
            result.relevance_score = if result.verified { 1.0 } else { 0.5 };
            results.push(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::fetch::testing::{context, ScriptedFetcher};
    use crate::fetch::PageResponse;

    fn json(body: &str) -> Result<PageResponse, FetchError> {
        Ok(PageResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.as_bytes().to_vec(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn email_lookup_is_verified_and_enriched() {
        let fetcher = Arc::new(
            ScriptedFetcher::new()
                .route(
                    "search/users",
                    vec![json(
                        r#"{"total_count":1,"items":[{"login":"ipetrov","html_url":"https://github.com/ipetrov"}]}"#,
                    )],
                )
                .route(
                    "users/ipetrov",
                    vec![json(
                        r#"{"name":"Ivan Petrov","company":"@moscow-clinic","location":"Moscow","bio":null}"#,
                    )],
                ),
        );
        let ctx = Arc::new(context(fetcher));
        let github = GitHubUsers::new(ctx, None, 10);
        let query = Query {
            text: "buch1202@mail.ru".to_string(),
            affinity: SourceKind::Social,
            priority: 10,
            email: "buch1202@mail.ru".to_string(),
        };

        let results = github.fetch(&query).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].verified);
        assert_eq!(results[0].title, "Ivan Petrov");
        assert_eq!(
            results[0].snippet,
            "GitHub user ipetrov. Company: moscow-clinic. Location: Moscow."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn garbage_json_yields_nothing() {
        let fetcher = Arc::new(ScriptedFetcher::new().route("search/users", vec![json("<html>")]));
        let github = GitHubUsers::new(Arc::new(context(fetcher)), None, 10);
        let query = Query {
            text: "buch1202".to_string(),
            affinity: SourceKind::Social,
            priority: 11,
            email: "buch1202@mail.ru".to_string(),
        };
        assert!(github.fetch(&query).await.is_empty());
    }
}
