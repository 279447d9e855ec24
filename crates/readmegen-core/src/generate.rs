use crate::config::Config;
use crate::error::{ReadmeError, Result};
use crate::github::{self, Repository};
use crate::template::{self, Values};
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// strftime pattern for the `date` region, e.g. `Monday, 20 May 2024, CEST`.
pub const DATE_FORMAT: &str = "%A, %d %B %Y, %Z";

/// Keys the generator fills in.
pub const KEYS: &[&str] = &[
    "city", "contact", "date", "filename", "github", "name", "projects",
];

pub fn build_values(config: &Config, repos: &[Repository], now: DateTime<Utc>) -> Result<Values> {
    let tz = config.tz()?;
    let mut values = Values::new();
    values.insert("city".into(), config.profile.city.clone());
    values.insert("contact".into(), config.profile.contact.clone());
    values.insert(
        "date".into(),
        now.with_timezone(&tz).format(DATE_FORMAT).to_string(),
    );
    values.insert("filename".into(), config.readme.clone());
    values.insert("github".into(), format!("github.com/{}", config.github.user));
    values.insert("name".into(), config.profile.name.clone());
    values.insert(
        "projects".into(),
        github::describe_activity(repos, &config.github, now),
    );
    Ok(values)
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub path: PathBuf,
    pub changed: bool,
    /// Regions found in the README, in order.
    pub regions: Vec<String>,
    pub projects: String,
}

/// Render the README in place. With `dry_run` nothing is written, but
/// `changed` still reports whether a write would happen.
pub fn run(
    root: &Path,
    config: &Config,
    repos: &[Repository],
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<GenerateReport> {
    let path = paths::readme_path(root, &config.readme);
    if !path.exists() {
        return Err(ReadmeError::FileNotFound(config.readme.clone()));
    }
    let original = std::fs::read_to_string(&path)?;
    let values = build_values(config, repos, now)?;
    let rendered = template::render(&original, &values);

    let changed = if dry_run {
        rendered != original
    } else {
        io::write_if_changed(&path, rendered.as_bytes())?
    };
    tracing::info!(path = %path.display(), changed, dry_run, "README rendered");

    Ok(GenerateReport {
        path,
        changed,
        regions: template::region_keys(&original),
        projects: values.get("projects").cloned().unwrap_or_default(),
    })
}

/// Starter README with a region for every key.
pub fn readme_template(config: &Config) -> String {
    format!(
        "# Hi, I'm <!-- name -->{name}<!-- name -->\n\
         \n\
         Based in <!-- city -->{city}<!-- city -->. \
         Find me at <!-- github --><!-- github -->.\n\
         \n\
         Lately I have been working on the <!-- projects --><!-- projects -->.\n\
         \n\
         Contact: <!-- contact --><!-- contact -->\n\
         \n\
         <sub>This <!-- filename --><!-- filename --> was generated on <!-- date --><!-- date -->.</sub>\n",
        name = config.profile.name,
        city = config.profile.city,
    )
}
