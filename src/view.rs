//! Plain data a UI layer renders the recent repositories from.
//! Nothing here knows how it is displayed.

use std::sync::Arc;

use serde::Serialize;

use crate::api_errors::Result;
use crate::github_api::{Client, ClientConfig, Limit};
use crate::github_client::{QueryOptions, Transport};
use crate::github_data::{Language, Repository};

/// Widget shows a couple more than the client returns by default
pub const WIDGET_DEFAULT_LIMIT: i64 = 7;

/// Externally supplied widget settings
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub username: String,
    pub options: QueryOptions,
    /// -1 means unlimited
    pub limit: i64,
    /// Endpoints and user agent of the client the widget builds
    pub api: ClientConfig,
}

impl WidgetConfig {
    pub fn new(username: &str) -> Self {
        let api = ClientConfig::default();

        Self {
            username: username.to_string(),
            options: api.default_options(),
            limit: WIDGET_DEFAULT_LIMIT,
            api,
        }
    }

    /// Client for these settings, talking through `transport`
    pub fn client(&self, transport: Arc<dyn Transport>) -> Client {
        Client::with_transport(
            &self.username,
            Some(self.options.clone()),
            self.api.clone(),
            transport,
        )
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LanguageShare {
    pub name: String,
    pub lines: u64,
    /// 0 to 100
    pub percent: f64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RepoView {
    pub name: String,
    pub description: String,
    /// RFC 3339
    pub pushed_at: String,
    pub stars: u64,
    pub owner_login: String,
    pub owner_avatar_url: String,
    pub languages: Vec<LanguageShare>,
    /// `None` when the count could not be fetched
    pub authored_commits: Option<u64>,
    /// The count stopped at one page, there may be more
    pub authored_commits_capped: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecentRepos {
    pub username: String,
    pub repos: Vec<RepoView>,
}

fn language_shares(languages: &[Language]) -> Vec<LanguageShare> {
    let total: u64 = languages.iter().map(|l| l.lines).sum();

    languages
        .iter()
        .map(|l| LanguageShare {
            name: l.name.clone(),
            lines: l.lines,
            percent: if total == 0 {
                0.0
            } else {
                l.lines as f64 * 100.0 / total as f64
            },
        })
        .collect()
}

impl From<&Repository> for RepoView {
    fn from(repo: &Repository) -> Self {
        Self {
            name: repo.name.clone(),
            description: repo.description.clone(),
            pushed_at: repo.pushed_at.to_rfc3339(),
            stars: repo.stars,
            owner_login: repo.owner.login.clone(),
            owner_avatar_url: repo.owner.avatar_url.clone(),
            languages: language_shares(&repo.languages),
            authored_commits: repo.authored_commits.map(|c| c.count),
            authored_commits_capped: repo.authored_commits.map_or(false, |c| c.capped),
        }
    }
}

impl RecentRepos {
    pub fn new(username: &str, repos: &[Repository]) -> Self {
        Self {
            username: username.to_string(),
            repos: repos.iter().map(RepoView::from).collect(),
        }
    }
}

/// Fetches through `client` and turns the result into render data
pub async fn recent_repos(client: &Client, limit: i64) -> Result<RecentRepos> {
    let repos = client.get_recent_repos(Some(Limit::from(limit))).await?;
    Ok(RecentRepos::new(client.username(), &repos))
}

/// Everything the widget needs for one render, from its settings and the
/// transport to fetch through
pub async fn load_recent_repos(
    config: &WidgetConfig,
    transport: Arc<dyn Transport>,
) -> Result<RecentRepos> {
    let client = config.client(transport);
    recent_repos(&client, config.limit).await
}
