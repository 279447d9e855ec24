use crate::output::print_json;
use anyhow::Context;
use chrono::Utc;
use readmegen_core::{config::Config, generate, github};
use std::path::Path;

pub fn run(root: &Path, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());

    let repos = github::fetch_repositories(&config.github, token.as_deref())
        .with_context(|| format!("failed to fetch repositories of {}", config.github.user))?;
    let report = generate::run(root, &config, &repos, Utc::now(), dry_run)
        .context("failed to render README")?;

    if json {
        return print_json(&report);
    }

    let verb = match (report.changed, dry_run) {
        (true, true) => "would update",
        (true, false) => "updated",
        (false, _) => "unchanged:",
    };
    println!("{verb} {}", report.path.display());
    if report.projects.is_empty() {
        println!("No public repositories to list.");
    } else {
        println!("Projects: {}", report.projects);
    }
    Ok(())
}
