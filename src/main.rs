#[macro_use]
extern crate log;

use std::{process, sync::Arc};

use structopt::StructOpt;

use recent_github::api_errors::Result;
use recent_github::github_client::ReqwestTransport;
use recent_github::view::{load_recent_repos, RecentRepos, WidgetConfig};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "recent_github",
    about = "Lists repositories a GitHub user recently pushed to."
)]
struct Opt {
    /// GitHub username
    username: String,

    /// Number of repositories to ask for, -1 for no limit
    #[structopt(short, long, default_value = "7", allow_hyphen_values = true)]
    limit: i64,

    /// Sort key of the repository listing
    #[structopt(short, long, default_value = "pushed")]
    sort: String,

    /// Extra listing option as key=value, may be repeated
    #[structopt(short = "o", long = "option", parse(try_from_str = parse_option))]
    options: Vec<(String, String)>,

    /// Base url of the users resource
    #[structopt(long, default_value = "https://api.github.com/users")]
    users_url: String,

    /// Print JSON instead of text
    #[structopt(long)]
    json: bool,
}

fn parse_option(s: &str) -> std::result::Result<(String, String), String> {
    match s.find('=') {
        Some(idx) => Ok((s[..idx].to_string(), s[idx + 1..].to_string())),
        None => Err(format!("expected key=value, got {}", s)),
    }
}

impl Opt {
    fn widget_config(&self) -> WidgetConfig {
        let mut config = WidgetConfig::new(&self.username);
        config.limit = self.limit;
        config.api.users_url = self.users_url.trim_end_matches('/').to_string();
        config.options.insert("sort", &self.sort);
        for (key, value) in &self.options {
            config.options.insert(key.as_str(), value);
        }
        config
    }
}

fn print_text(recent: &RecentRepos) {
    println!("Recent repositories of {}", recent.username);

    for repo in &recent.repos {
        println!();
        println!("{} ★ {}  pushed {}", repo.name, repo.stars, repo.pushed_at);
        if !repo.description.is_empty() {
            println!("  {}", repo.description);
        }
        let languages = repo
            .languages
            .iter()
            .map(|l| format!("{} {:.1}%", l.name, l.percent))
            .collect::<Vec<_>>()
            .join(", ");
        if !languages.is_empty() {
            println!("  {}", languages);
        }
        match repo.authored_commits {
            Some(count) if repo.authored_commits_capped => {
                println!("  {}+ commits by {}", count, repo.owner_login)
            }
            Some(count) => println!("  {} commits by {}", count, repo.owner_login),
            None => println!("  commits by {} unknown", repo.owner_login),
        }
    }
}

async fn run(opt: &Opt) -> Result<RecentRepos> {
    let widget = opt.widget_config();
    debug!(
        "Fetching for {} with {}, limit {}",
        widget.username,
        widget.options.to_query_string(),
        widget.limit
    );

    let transport = ReqwestTransport::new(&widget.api.user_agent)?;
    load_recent_repos(&widget, Arc::new(transport)).await
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let opt = Opt::from_args();
    if opt.limit < -1 {
        warn!("Limit {} treated as unlimited", opt.limit);
    }

    match run(&opt).await {
        Ok(recent) if opt.json => match serde_json::to_string_pretty(&recent) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Could not serialize result: {}", e);
                process::exit(1);
            }
        },
        Ok(recent) => print_text(&recent),
        Err(e) => {
            error!("{}", e);
            if let Some(outcome) = e.outcome() {
                debug!("Request outcome {:?}", outcome);
            }
            process::exit(1);
        }
    }
}
