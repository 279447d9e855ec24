//! GitHub REST client for a user's public repositories, and the selection of
//! recently active projects shown in the README.

use crate::config::GitHubConfig;
use crate::error::{ReadmeError, Result};
use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub language: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// All public repositories of `config.user`. `token` raises the rate limit
/// when present.
pub fn fetch_repositories(config: &GitHubConfig, token: Option<&str>) -> Result<Vec<Repository>> {
    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?;
    let base = config.api_base.trim_end_matches('/');
    let url = format!("{base}/users/{}/repos", config.user);

    let mut repos = Vec::new();
    for page in 1..=MAX_PAGES {
        tracing::debug!(%url, page, "fetching repositories");
        let mut req = client
            .get(&url)
            .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())])
            .header(USER_AGENT, concat!("readmegen/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ReadmeError::GitHubStatus {
                status: status.as_u16(),
                url,
            });
        }
        let batch: Vec<Repository> = resp.json()?;
        let last = batch.len() < PER_PAGE;
        repos.extend(batch);
        if last {
            break;
        }
    }
    tracing::info!(count = repos.len(), user = %config.user, "fetched repositories");
    Ok(repos)
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

/// Whole days between the last update and `now`.
pub fn days_since_update(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - updated_at).num_days()
}

/// `None` for the profile repository itself, which is never listed.
pub fn describe_repository(
    repo: &Repository,
    config: &GitHubConfig,
    now: DateTime<Utc>,
) -> Option<String> {
    if repo.full_name == config.profile_repo() {
        return None;
    }
    let language = repo
        .language
        .as_deref()
        .map(|l| format!(" and is mainly written in {l}"))
        .unwrap_or_default();
    Some(format!(
        "repository [{}]({}) which was updated {} days ago{language}",
        repo.full_name,
        repo.html_url,
        days_since_update(repo.updated_at, now)
    ))
}

/// The README's `projects` text.
///
/// Up to `max_repos_listed` repositories updated within `max_recent_activity`
/// days, most recent first. With none recent, the single most recently
/// updated repository is used instead. Empty when there is nothing to list.
pub fn describe_activity(
    repos: &[Repository],
    config: &GitHubConfig,
    now: DateTime<Utc>,
) -> String {
    let mut described: Vec<(i64, String)> = repos
        .iter()
        .filter_map(|r| {
            describe_repository(r, config, now).map(|d| (days_since_update(r.updated_at, now), d))
        })
        .collect();
    described.sort_by_key(|(days, _)| *days);

    let recent: Vec<String> = described
        .iter()
        .filter(|(days, _)| *days < config.max_recent_activity)
        .take(config.max_repos_listed)
        .map(|(_, d)| d.clone())
        .collect();

    let projects = if recent.is_empty() {
        described.into_iter().take(1).map(|(_, d)| d).collect()
    } else {
        recent
    };
    projects.join(" as well as ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 20, 12, 0, 0).unwrap()
    }

    fn repo(name: &str, days_ago: i64, language: Option<&str>) -> Repository {
        Repository {
            full_name: format!("nicojahn/{name}"),
            html_url: format!("https://github.com/nicojahn/{name}"),
            language: language.map(String::from),
            updated_at: now() - chrono::Duration::days(days_ago) - chrono::Duration::hours(1),
        }
    }

    fn config() -> GitHubConfig {
        GitHubConfig::new("nicojahn")
    }

    #[test]
    fn description_with_and_without_language() {
        let cfg = config();
        assert_eq!(
            describe_repository(&repo("dtw", 3, Some("Rust")), &cfg, now()).unwrap(),
            "repository [nicojahn/dtw](https://github.com/nicojahn/dtw) which was updated 3 days ago and is mainly written in Rust"
        );
        assert_eq!(
            describe_repository(&repo("notes", 0, None), &cfg, now()).unwrap(),
            "repository [nicojahn/notes](https://github.com/nicojahn/notes) which was updated 0 days ago"
        );
    }

    #[test]
    fn profile_repository_is_excluded() {
        let repos = vec![repo("nicojahn", 0, Some("Python")), repo("a", 2, None)];
        let text = describe_activity(&repos, &config(), now());
        assert!(!text.contains("nicojahn/nicojahn"));
        assert!(text.contains("nicojahn/a"));
    }

    #[test]
    fn recent_projects_sorted_and_capped() {
        let mut cfg = config();
        cfg.max_repos_listed = 2;
        let repos = vec![
            repo("c", 10, None),
            repo("a", 1, None),
            repo("b", 5, None),
            repo("old", 30, None),
        ];
        let text = describe_activity(&repos, &cfg, now());
        let parts: Vec<&str> = text.split(" as well as ").collect();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("nicojahn/a"));
        assert!(parts[1].contains("nicojahn/b"));
    }

    #[test]
    fn recency_window_is_exclusive() {
        let repos = vec![repo("edge", 14, None), repo("inside", 13, None)];
        let text = describe_activity(&repos, &config(), now());
        assert!(text.contains("nicojahn/inside"));
        assert!(!text.contains("nicojahn/edge"));
    }

    #[test]
    fn falls_back_to_most_recent_when_nothing_is_recent() {
        let repos = vec![repo("older", 90, None), repo("old", 40, Some("Go"))];
        let text = describe_activity(&repos, &config(), now());
        assert_eq!(
            text,
            "repository [nicojahn/old](https://github.com/nicojahn/old) which was updated 40 days ago and is mainly written in Go"
        );
    }

    #[test]
    fn nothing_to_list_is_empty() {
        assert_eq!(describe_activity(&[], &config(), now()), "");
        let only_profile = vec![repo("nicojahn", 1, None)];
        assert_eq!(describe_activity(&only_profile, &config(), now()), "");
    }

    #[test]
    fn fetch_parses_api_response() {
        let mut server = mockito::Server::new();
        let body = r#"[
            {"full_name": "octo/a", "html_url": "https://github.com/octo/a", "language": "Rust",
             "updated_at": "2024-05-18T08:00:00Z", "stargazers_count": 3},
            {"full_name": "octo/b", "html_url": "https://github.com/octo/b", "language": null,
             "updated_at": "2024-01-01T00:00:00Z"}
        ]"#;
        let mock = server
            .mock("GET", "/users/octo/repos")
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();

        let mut cfg = GitHubConfig::new("octo");
        cfg.api_base = server.url();
        let repos = fetch_repositories(&cfg, Some("secret")).unwrap();
        mock.assert();
        assert_eq!(repos.len(), 2);
        assert_eq!(repos[0].language.as_deref(), Some("Rust"));
        assert_eq!(repos[1].language, None);
    }

    #[test]
    fn fetch_surfaces_http_errors() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/users/ghost/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(404)
            .create();
        let mut cfg = GitHubConfig::new("ghost");
        cfg.api_base = server.url();
        let err = fetch_repositories(&cfg, None).unwrap_err();
        assert!(matches!(err, ReadmeError::GitHubStatus { status: 404, .. }));
    }
}
