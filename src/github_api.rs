use std::sync::Arc;

use futures::future::try_join_all;

use crate::api_errors::Result;
use crate::github_client::{QueryOptions, ReqwestTransport, Requester, Transport};
use crate::github_data::{repository_from_response, Repository};
use crate::object::as_array;

/// Default value of `get_recent_repos` limit
pub const DEFAULT_LIMIT: Limit = Limit::AtMost(5);
/// Default `sort` option sent to the repository listing
pub const DEFAULT_SORT: &str = "pushed";
/// Users resource of the GitHub API
pub const URL_USERS: &str = "https://api.github.com/users";
/// Appended after `URL_USERS/<username>`, lists the user's repositories
pub const URL_PART_REPOS: &str = "/repos";
pub const USER_AGENT_NAME: &str = "recent_github";

/// How many repositories the caller wants back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    Unlimited,
    AtMost(u32),
}

impl From<i64> for Limit {
    /// Negative values, -1 by convention, mean no limit
    fn from(value: i64) -> Self {
        if value < 0 {
            Limit::Unlimited
        } else {
            Limit::AtMost(value.min(u32::MAX as i64) as u32)
        }
    }
}

/// Where and how the client talks to GitHub
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub users_url: String,
    pub repos_path: String,
    pub user_agent: String,
    pub default_limit: Limit,
    pub default_sort: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            users_url: URL_USERS.to_string(),
            repos_path: URL_PART_REPOS.to_string(),
            user_agent: USER_AGENT_NAME.to_string(),
            default_limit: DEFAULT_LIMIT,
            default_sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Options used when the caller supplies none: `sort=<default_sort>`
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions::new().with("sort", &self.default_sort)
    }
}

/// Fetches recent repository activity of one GitHub user
pub struct Client {
    username: String,
    options: QueryOptions,
    config: ClientConfig,
    requester: Requester,
}

impl Client {
    /// `options` may hold anything the user repos endpoint accepts,
    /// https://docs.github.com/en/rest/repos/repos#list-repositories-for-a-user
    /// Without options the listing is sorted by last push.
    pub fn new(username: &str, options: Option<QueryOptions>) -> Result<Self> {
        let config = ClientConfig::default();
        let transport = ReqwestTransport::new(&config.user_agent)?;

        Ok(Self::with_transport(
            username,
            options,
            config,
            Arc::new(transport),
        ))
    }

    pub fn with_transport(
        username: &str,
        options: Option<QueryOptions>,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let options = options.unwrap_or_else(|| config.default_options());

        Self {
            username: username.to_string(),
            options,
            config,
            requester: Requester::new(transport),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn repos_endpoint(&self) -> String {
        format!(
            "{}/{}{}",
            self.config.users_url, self.username, self.config.repos_path
        )
    }

    /// Repositories of the user, in the order the listing returns them; with
    /// the default options that is most recently pushed first.
    ///
    /// `limit` is accepted but not enforced: the listing comes back whole.
    /// A failed listing request is returned as the unmodified
    /// `Error::Request` outcome. Any repository that cannot be built fails
    /// the whole call.
    pub async fn get_recent_repos(&self, limit: Option<Limit>) -> Result<Vec<Repository>> {
        let limit = limit.unwrap_or(self.config.default_limit);
        let endpoint = self.repos_endpoint();

        debug!("Repos endpoint {}, limit {:?}", endpoint, limit);

        let outcome = self.requester.get(&endpoint, &self.options).await?;
        let listing = outcome.into_parsed();
        let items = as_array(&listing, "repository listing")?;

        let repos = try_join_all(
            items
                .iter()
                .map(|item| repository_from_response(item, &self.requester)),
        )
        .await?;

        debug!("Got {} repositories of {}", repos.len(), self.username);

        Ok(repos)
    }
}
