//! Recently pushed repositories of a GitHub user, as typed data.
//!
//! ```no_run
//! # async fn run() -> recent_github::api_errors::Result<()> {
//! use recent_github::github_api::Client;
//!
//! let client = Client::new("octocat", None)?;
//! for repo in client.get_recent_repos(None).await? {
//!     println!("{} ({} stars)", repo.name, repo.stars);
//! }
//! # Ok(())
//! # }
//! ```

#[macro_use]
extern crate log;

pub mod api_errors;
pub mod github_api;
pub mod github_client;
pub mod github_data;
pub mod object;
pub mod view;
