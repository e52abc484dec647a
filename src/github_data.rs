//! Domain entities built from GitHub API responses.
//! Responses are kept as `serde_json::Value` until a builder has checked that
//! every required key is there, so a missing field is reported by name, all of
//! them at once, instead of failing on the first one serde trips over. Only
//! then are they deserialized into the raw structs below.
//! Construction is all-or-nothing: a builder either returns a complete entity
//! or an error, never something half filled. The one exception is the authored
//! commit count, which is informational and left out when it cannot be had.
//!
//! Used endpoints:
//! - https://api.github.com/users/USER/repos
//! - https://api.github.com/users/USER
//! - https://api.github.com/repos/USER/REPO/languages
//! - https://api.github.com/repos/USER/REPO/commits
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api_errors::{Error, Result};
use crate::github_client::{QueryOptions, Requester};
use crate::object::{as_array, as_object, count_value, require_keys};

/// Keys a user object must carry, https://api.github.com/users/USER
pub const USER_KEYS: [&str; 4] = ["login", "id", "avatar_url", "name"];

/// Keys an item of https://api.github.com/users/USER/repos must carry
pub const REPOSITORY_KEYS: [&str; 7] = [
    "name",
    "owner",
    "description",
    "pushed_at",
    "stargazers_count",
    "languages_url",
    "commits_url",
];

/// Commits are counted from a single page of this size
pub const COMMITS_PER_PAGE: u32 = 100;

#[derive(Deserialize, Debug)]
struct RawUser {
    login: String,
    id: u64,
    avatar_url: String,
    name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawRepository {
    name: String,
    owner: Value,
    description: Option<String>,
    pushed_at: DateTime<Utc>,
    stargazers_count: u64,
    languages_url: String,
    commits_url: String,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
/// GitHub account
pub struct User {
    pub login: String,
    pub id: u64,
    pub avatar_url: String,
    /// Display name, null for accounts that never set one
    pub name: Option<String>,
}

impl From<RawUser> for User {
    fn from(raw: RawUser) -> Self {
        Self {
            login: raw.login,
            id: raw.id,
            avatar_url: raw.avatar_url,
            name: raw.name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
/// Language used in a repository, with the amount of code written in it
pub struct Language {
    pub name: String,
    pub lines: u64,
}

/// Commits authored by the repository owner, counted from one page
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthoredCommits {
    pub count: u64,
    /// The page came back full, so the owner may have authored more
    pub capped: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Repository {
    pub name: String,
    pub owner: User,
    /// Empty when the repository has no description
    pub description: String,
    pub pushed_at: DateTime<Utc>,
    pub stars: u64,
    pub languages: Vec<Language>,
    /// `None` when GitHub would not list the commits, e.g. an empty
    /// repository answers 409
    pub authored_commits: Option<AuthoredCommits>,
}

/// Builds a `User` from a user object
pub fn user_from_response(resp: &Value) -> Result<User> {
    let obj = as_object(resp, "user")?;
    require_keys(obj, &USER_KEYS)?;

    let raw = RawUser::deserialize(resp).map_err(|source| Error::Decode {
        context: "user",
        source,
    })?;

    Ok(raw.into())
}

/// Turns a languages map, `{"Rust": 1234, "Shell": 56}`, into languages in the
/// map's order. Stops at the first value that is not a line count.
pub fn languages_from_response(resp: &Value) -> Result<Vec<Language>> {
    let obj = as_object(resp, "languages")?;

    obj.iter()
        .map(|(name, lines)| {
            Ok(Language {
                name: name.clone(),
                lines: count_value(name, lines)?,
            })
        })
        .collect()
}

/// Builds a `Repository` from an item of the user's repository listing.
/// The listing only references languages and commits by url, so both are
/// fetched here, as is the owner when the embedded object lacks a name.
pub async fn repository_from_response(resp: &Value, requester: &Requester) -> Result<Repository> {
    let obj = as_object(resp, "repository")?;
    require_keys(obj, &REPOSITORY_KEYS)?;

    let RawRepository {
        name,
        owner: raw_owner,
        description,
        pushed_at,
        stargazers_count: stars,
        languages_url,
        commits_url,
    } = RawRepository::deserialize(resp).map_err(|source| Error::Decode {
        context: "repository",
        source,
    })?;

    let owner = async {
        owner_from_response(&raw_owner, requester)
            .await
            .map_err(|e| Error::User(Box::new(e)))
    };
    let languages = async {
        fetch_languages(&languages_url, requester)
            .await
            .map_err(|e| Error::Languages {
                repo: name.clone(),
                source: Box::new(e),
            })
    };
    let (owner, languages) = futures::try_join!(owner, languages)?;

    let authored_commits =
        match count_authored_commits(&commits_url, &owner.login, requester).await {
            Ok(commits) => Some(commits),
            Err(e) => {
                warn!("Could not count commits of {}: {}", name, e);
                None
            }
        };

    debug!(
        "Repository {} by {}, stars {}, {} languages, authored commits {:?}",
        name,
        owner.login,
        stars,
        languages.len(),
        authored_commits
    );

    Ok(Repository {
        name,
        owner,
        description: description.unwrap_or_default(),
        pushed_at,
        stars,
        languages,
        authored_commits,
    })
}

/// Listings embed a short owner object without `name`; the full user is then
/// fetched from the owner's `url`.
async fn owner_from_response(owner: &Value, requester: &Requester) -> Result<User> {
    let obj = as_object(owner, "owner")?;

    if obj.contains_key("name") {
        return user_from_response(owner);
    }

    match obj.get("url").and_then(Value::as_str) {
        Some(url) => {
            debug!("Owner endpoint {}", url);
            let outcome = requester.get(url, &QueryOptions::new()).await?;
            user_from_response(&outcome.into_parsed())
        }
        // Nothing to enrich from, report what is missing
        None => user_from_response(owner),
    }
}

async fn fetch_languages(languages_url: &str, requester: &Requester) -> Result<Vec<Language>> {
    debug!("Languages endpoint {}", languages_url);

    let outcome = requester.get(languages_url, &QueryOptions::new()).await?;
    languages_from_response(&outcome.into_parsed())
}

/// One page only; a full page is reported as capped
async fn count_authored_commits(
    commits_url: &str,
    author: &str,
    requester: &Requester,
) -> Result<AuthoredCommits> {
    let endpoint = strip_uri_template(commits_url);
    let options = QueryOptions::new()
        .with("author", author)
        .with("per_page", COMMITS_PER_PAGE);

    debug!("Commits endpoint {}", endpoint);

    let outcome = requester.get(endpoint, &options).await?;
    let commits = outcome.into_parsed();
    let count = as_array(&commits, "commit listing")?.len() as u64;

    Ok(AuthoredCommits {
        count,
        capped: count >= u64::from(COMMITS_PER_PAGE),
    })
}

/// `https://api.github.com/repos/o/r/commits{/sha}` -> `.../commits`
fn strip_uri_template(url: &str) -> &str {
    match url.find('{') {
        Some(idx) => &url[..idx],
        None => url,
    }
}
