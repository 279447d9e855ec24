//! Thin wrappers over the `git` executable.

use crate::error::{ReadmeError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn run(root: &Path, args: &[&str]) -> Result<Output> {
    tracing::debug!(args = ?args, "git");
    Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .map_err(|e| ReadmeError::SpawnFailed {
            program: "git".to_string(),
            reason: e.to_string(),
        })
}

/// Run git and return trimmed stdout, or an error carrying stderr.
fn git(root: &Path, args: &[&str]) -> Result<String> {
    let output = run(root, args)?;
    if !output.status.success() {
        return Err(ReadmeError::Git {
            command: args.first().copied().unwrap_or_default().to_string(),
            output: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn is_work_tree(root: &Path) -> bool {
    git(root, &["rev-parse", "--is-inside-work-tree"])
        .map(|out| out == "true")
        .unwrap_or(false)
}

/// Added, copied, modified, or renamed paths in the index, relative to `root`.
pub fn staged_files(root: &Path) -> Result<Vec<PathBuf>> {
    let out = git(
        root,
        &["diff", "--cached", "--name-only", "--diff-filter=ACMR"],
    )?;
    Ok(out.lines().filter(|l| !l.is_empty()).map(PathBuf::from).collect())
}

/// Paths staged as new files, for `check-added-large-files`.
pub fn added_files(root: &Path) -> Result<Vec<PathBuf>> {
    let out = git(root, &["diff", "--cached", "--name-only", "--diff-filter=A"])?;
    Ok(out.lines().filter(|l| !l.is_empty()).map(PathBuf::from).collect())
}

/// Every tracked file, for `hooks run --all-files`.
pub fn tracked_files(root: &Path) -> Result<Vec<PathBuf>> {
    let out = git(root, &["ls-files"])?;
    Ok(out.lines().filter(|l| !l.is_empty()).map(PathBuf::from).collect())
}

pub fn current_branch(root: &Path) -> Result<String> {
    git(root, &["rev-parse", "--abbrev-ref", "HEAD"])
}

fn is_full_sha(rev: &str) -> bool {
    rev.len() == 40 && rev.chars().all(|c| c.is_ascii_hexdigit())
}

/// Whether `rev` names a tag or branch of `repo`. Full commit ids are
/// accepted without a network round-trip.
pub fn remote_has_revision(repo: &str, rev: &str) -> Result<bool> {
    if is_full_sha(rev) {
        return Ok(true);
    }
    let cwd = std::env::temp_dir();
    let out = git(&cwd, &["ls-remote", "--tags", "--heads", repo, rev])?;
    let tag = format!("refs/tags/{rev}");
    let head = format!("refs/heads/{rev}");
    Ok(out.lines().any(|line| {
        line.split_whitespace()
            .nth(1)
            .is_some_and(|r| r == tag || r == head || r == format!("{tag}^{{}}"))
    }))
}

/// Contents of `path` in `repo` at `rev`, via a shallow fetch into a scratch
/// repository. `Ok(None)` when the revision exists but the file does not.
pub fn read_remote_file(repo: &str, rev: &str, path: &str) -> Result<Option<String>> {
    let scratch = tempfile::TempDir::new()?;
    let dir = scratch.path();
    git(dir, &["init", "-q"])?;
    git(dir, &["fetch", "-q", "--depth", "1", repo, rev])?;
    let spec = format!("FETCH_HEAD:{path}");
    let output = run(dir, &["show", &spec])?;
    if !output.status.success() {
        tracing::debug!(%repo, %rev, %path, "file not present at revision");
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
}

// ---------------------------------------------------------------------------
// Publish
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub message: String,
    /// Pathspecs to stage; empty means everything.
    pub pathspecs: Vec<String>,
    pub branch: Option<String>,
    pub author_name: String,
    pub author_email: String,
    pub remote: String,
    pub token: Option<String>,
    pub push: bool,
}

impl PublishRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            pathspecs: Vec::new(),
            branch: None,
            author_name: "github-actions[bot]".to_string(),
            author_email: "41898282+github-actions[bot]@users.noreply.github.com".to_string(),
            remote: "origin".to_string(),
            token: None,
            push: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PublishOutcome {
    Committed { commit: String, pushed: bool },
    NothingToCommit,
}

/// Stage, commit, and push. A clean index after staging is a successful
/// no-op rather than an error.
pub fn commit_and_push(root: &Path, req: &PublishRequest) -> Result<PublishOutcome> {
    let mut add: Vec<&str> = vec!["add", "--"];
    if req.pathspecs.is_empty() {
        add.push(".");
    } else {
        add.extend(req.pathspecs.iter().map(String::as_str));
    }
    git(root, &add)?;

    let diff = run(root, &["diff", "--cached", "--quiet"])?;
    if diff.status.success() {
        tracing::info!("nothing to commit");
        return Ok(PublishOutcome::NothingToCommit);
    }

    let name = format!("user.name={}", req.author_name);
    let email = format!("user.email={}", req.author_email);
    git(
        root,
        &["-c", &name, "-c", &email, "commit", "-q", "-m", &req.message],
    )?;
    let commit = git(root, &["rev-parse", "HEAD"])?;
    tracing::info!(%commit, "committed");

    if !req.push {
        return Ok(PublishOutcome::Committed {
            commit,
            pushed: false,
        });
    }

    let branch = match &req.branch {
        Some(b) => b.clone(),
        None => current_branch(root)?,
    };
    let target = match &req.token {
        Some(token) => authenticated_url(&git(root, &["remote", "get-url", &req.remote])?, token),
        None => req.remote.clone(),
    };
    let refspec = format!("HEAD:{branch}");
    let output = run(root, &["push", "-q", &target, &refspec])?;
    if !output.status.success() {
        // stderr may echo the remote URL; never surface the token.
        let mut stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if let Some(token) = &req.token {
            stderr = stderr.replace(token.as_str(), "***");
        }
        return Err(ReadmeError::Git {
            command: "push".to_string(),
            output: stderr,
        });
    }
    tracing::info!(%branch, "pushed");

    Ok(PublishOutcome::Committed {
        commit,
        pushed: true,
    })
}

/// Embed an access token into an https remote URL; other URLs pass through.
fn authenticated_url(url: &str, token: &str) -> String {
    match url.strip_prefix("https://") {
        Some(rest) => {
            let host_path = rest.split_once('@').map(|(_, hp)| hp).unwrap_or(rest);
            format!("https://x-access-token:{token}@{host_path}")
        }
        None => url.to_string(),
    }
}
