//! Pre-commit hook manifest: model, validation, and the orchestrator that
//! runs each hook against the staged files.

use crate::builtin_hooks;
use crate::config::ConfigWarning;
use crate::error::{ReadmeError, Result};
use crate::{git, paths};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pseudo-repositories that pre-commit resolves without a revision.
const LOCAL_REPOS: &[&str] = &["local", "meta"];

/// Revisions that float instead of pinning a release.
const FLOATING_REVS: &[&str] = &["main", "master", "HEAD", "develop", "trunk"];

// ---------------------------------------------------------------------------
// Manifest model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookManifest {
    #[serde(default)]
    pub repos: Vec<HookRepo>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fail_fast: bool,
    /// Global exclude pattern applied before each hook's own filters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookRepo {
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default)]
    pub hooks: Vec<HookSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

/// One (source, revision, hook-id, arguments) tuple, in manifest order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookEntry {
    pub repo: String,
    pub rev: Option<String>,
    pub id: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

impl HookRepo {
    pub fn is_local(&self) -> bool {
        LOCAL_REPOS.contains(&self.repo.as_str())
    }
}

impl HookManifest {
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::hook_manifest_path(root);
        if !path.exists() {
            return Err(ReadmeError::FileNotFound(paths::HOOK_MANIFEST_FILE.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        Self::parse(&data)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&paths::hook_manifest_path(root), data.as_bytes())
    }

    pub fn entries(&self) -> Vec<HookEntry> {
        self.repos
            .iter()
            .flat_map(|r| {
                r.hooks.iter().map(move |h| HookEntry {
                    repo: r.repo.clone(),
                    rev: r.rev.clone(),
                    id: h.id.clone(),
                    args: h.args.clone(),
                    files: h.files.clone(),
                    exclude: h.exclude.clone(),
                })
            })
            .collect()
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.repos.is_empty() {
            warnings.push(ConfigWarning::error("manifest lists no repositories"));
        }
        if let Some(pattern) = &self.exclude {
            if Regex::new(pattern).is_err() {
                warnings.push(ConfigWarning::error(format!(
                    "global exclude '{pattern}' is not a valid regex"
                )));
            }
        }

        for repo in &self.repos {
            let label = &repo.repo;
            if repo.hooks.is_empty() {
                warnings.push(ConfigWarning::error(format!("{label}: no hooks listed")));
            }

            if !repo.is_local() {
                if !(repo.repo.starts_with("https://")
                    || repo.repo.starts_with("http://")
                    || repo.repo.starts_with("git@")
                    || repo.repo.starts_with("file://"))
                {
                    warnings.push(ConfigWarning::error(format!(
                        "{label}: repo is neither a URL nor 'local'/'meta'"
                    )));
                }
                match repo.rev.as_deref().map(str::trim) {
                    None | Some("") => warnings.push(ConfigWarning::error(format!(
                        "{label}: missing rev"
                    ))),
                    Some(rev) if FLOATING_REVS.contains(&rev) => {
                        warnings.push(ConfigWarning::warning(format!(
                            "{label}: rev '{rev}' is a branch, pin a tag or commit"
                        )))
                    }
                    Some(_) => {}
                }
            }

            let mut seen = HashSet::new();
            for hook in &repo.hooks {
                if hook.id.trim().is_empty() {
                    warnings.push(ConfigWarning::error(format!("{label}: hook with empty id")));
                    continue;
                }
                if !seen.insert(hook.id.as_str()) {
                    warnings.push(ConfigWarning::error(format!(
                        "{label}: duplicate hook id '{}'",
                        hook.id
                    )));
                }
                for (what, pattern) in [("files", &hook.files), ("exclude", &hook.exclude)] {
                    if let Some(p) = pattern {
                        if Regex::new(p).is_err() {
                            warnings.push(ConfigWarning::error(format!(
                                "{label}: hook '{}' has invalid {what} regex '{p}'",
                                hook.id
                            )));
                        }
                    }
                }
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Revision verification
// ---------------------------------------------------------------------------

/// File at the root of a hook repository that lists the hooks it provides.
pub const HOOK_REGISTRY_FILE: &str = ".pre-commit-hooks.yaml";

#[derive(Debug, Clone, Serialize)]
pub struct RevisionCheck {
    pub repo: String,
    pub rev: String,
    pub resolved: bool,
    /// Hook ids the manifest uses that the repository does not provide at `rev`.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_hooks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RevisionCheck {
    pub fn is_ok(&self) -> bool {
        self.resolved && self.missing_hooks.is_empty() && self.error.is_none()
    }
}

/// Where pinned revisions and hook registries are looked up.
pub trait HookSource {
    fn has_revision(&mut self, repo: &str, rev: &str) -> Result<bool>;

    /// Hook ids `repo` declares at `rev`.
    fn hook_ids(&mut self, repo: &str, rev: &str) -> Result<Vec<String>>;
}

#[derive(Deserialize)]
struct RegistryHook {
    id: String,
}

/// Ids listed in a `.pre-commit-hooks.yaml` document.
pub fn parse_registry(data: &str) -> Result<Vec<String>> {
    let hooks: Vec<RegistryHook> = serde_yaml::from_str(data)
        .map_err(|e| ReadmeError::InvalidManifest(format!("{HOOK_REGISTRY_FILE}: {e}")))?;
    Ok(hooks.into_iter().map(|h| h.id).collect())
}

/// Resolves against the real repositories with `git`.
pub struct GitHookSource;

impl HookSource for GitHookSource {
    fn has_revision(&mut self, repo: &str, rev: &str) -> Result<bool> {
        git::remote_has_revision(repo, rev)
    }

    fn hook_ids(&mut self, repo: &str, rev: &str) -> Result<Vec<String>> {
        match git::read_remote_file(repo, rev, HOOK_REGISTRY_FILE)? {
            Some(data) => parse_registry(&data),
            None => Err(ReadmeError::InvalidManifest(format!(
                "{repo}@{rev} has no {HOOK_REGISTRY_FILE}"
            ))),
        }
    }
}

/// Check that each remote block's pinned revision exists and that every hook
/// id it uses is declared in the repository's registry at that revision.
/// Local/meta blocks and blocks without a revision are not checked.
pub fn verify_revisions<S: HookSource>(
    manifest: &HookManifest,
    source: &mut S,
) -> Vec<RevisionCheck> {
    manifest
        .repos
        .iter()
        .filter(|r| !r.is_local())
        .filter_map(|r| r.rev.as_ref().map(|rev| (r, rev)))
        .map(|(r, rev)| {
            let mut check = RevisionCheck {
                repo: r.repo.clone(),
                rev: rev.clone(),
                resolved: false,
                missing_hooks: Vec::new(),
                error: None,
            };
            match source.has_revision(&r.repo, rev) {
                Ok(true) => check.resolved = true,
                Ok(false) => return check,
                Err(e) => {
                    check.error = Some(e.to_string());
                    return check;
                }
            }
            match source.hook_ids(&r.repo, rev) {
                Ok(ids) => {
                    check.missing_hooks = r
                        .hooks
                        .iter()
                        .filter(|h| !ids.contains(&h.id))
                        .map(|h| h.id.clone())
                        .collect();
                }
                Err(e) => check.error = Some(e.to_string()),
            }
            check
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookStatus {
    Passed,
    Failed,
    /// No file matched the hook's filters.
    NoFiles,
    /// Not run because an earlier hook failed and `fail_fast` is set.
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookOutcome {
    pub id: String,
    pub status: HookStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub modified_files: Vec<PathBuf>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookReport {
    pub passed: bool,
    pub outcomes: Vec<HookOutcome>,
}

/// Run every hook in manifest order against `files` (paths relative to `root`).
///
/// All hooks run even after a failure unless the manifest sets `fail_fast`.
/// The report fails if any hook failed; the caller blocks the commit.
pub fn run_hooks(root: &Path, manifest: &HookManifest, files: &[PathBuf]) -> Result<HookReport> {
    let global_exclude = compile(manifest.exclude.as_deref())?;
    let mut outcomes = Vec::new();
    let mut failed = false;

    for entry in manifest.entries() {
        if failed && manifest.fail_fast {
            outcomes.push(HookOutcome {
                id: entry.id,
                status: HookStatus::Skipped,
                modified_files: Vec::new(),
                output: String::new(),
            });
            continue;
        }

        let include = compile(entry.files.as_deref())?;
        let exclude = compile(entry.exclude.as_deref())?;
        let selected: Vec<PathBuf> = files
            .iter()
            .filter(|f| {
                let s = f.to_string_lossy();
                !global_exclude.as_ref().is_some_and(|re| re.is_match(&s))
                    && include.as_ref().map_or(true, |re| re.is_match(&s))
                    && !exclude.as_ref().is_some_and(|re| re.is_match(&s))
            })
            .cloned()
            .collect();

        if selected.is_empty() {
            tracing::debug!(hook = %entry.id, "no files to check");
            outcomes.push(HookOutcome {
                id: entry.id,
                status: HookStatus::NoFiles,
                modified_files: Vec::new(),
                output: String::new(),
            });
            continue;
        }

        let outcome = match builtin_hooks::lookup(&entry.id) {
            Some(hook) => {
                tracing::debug!(hook = %entry.id, files = selected.len(), "running built-in hook");
                let result = hook(root, &selected, &entry.args)?;
                HookOutcome {
                    id: entry.id.clone(),
                    status: if result.passed {
                        HookStatus::Passed
                    } else {
                        HookStatus::Failed
                    },
                    modified_files: result.modified,
                    output: result.output,
                }
            }
            None => run_external(root, &entry, &selected)?,
        };

        if outcome.status == HookStatus::Failed {
            tracing::info!(hook = %outcome.id, "hook failed");
            failed = true;
        }
        outcomes.push(outcome);
    }

    Ok(HookReport {
        passed: !failed,
        outcomes,
    })
}

fn compile(pattern: Option<&str>) -> Result<Option<Regex>> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| ReadmeError::InvalidManifest(format!("regex '{p}': {e}")))
        })
        .transpose()
}

/// Spawn `<id> <args...> <files...>` from `PATH`. Exit status decides the
/// outcome; a hook that rewrites any of its files also fails.
fn run_external(root: &Path, entry: &HookEntry, files: &[PathBuf]) -> Result<HookOutcome> {
    let Ok(program) = which::which(&entry.id) else {
        return Ok(HookOutcome {
            id: entry.id.clone(),
            status: HookStatus::Failed,
            modified_files: Vec::new(),
            output: format!("executable '{}' not found on PATH", entry.id),
        });
    };

    let before = snapshot(root, files);
    tracing::debug!(hook = %entry.id, program = %program.display(), "spawning external hook");
    let output = Command::new(&program)
        .args(&entry.args)
        .args(files)
        .current_dir(root)
        .output()
        .map_err(|e| ReadmeError::SpawnFailed {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;
    let after = snapshot(root, files);

    let modified: Vec<PathBuf> = files
        .iter()
        .filter(|f| before.get(*f) != after.get(*f))
        .cloned()
        .collect();

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    if !modified.is_empty() {
        text.push_str("files were modified by this hook\n");
    }

    Ok(HookOutcome {
        id: entry.id.clone(),
        status: if output.status.success() && modified.is_empty() {
            HookStatus::Passed
        } else {
            HookStatus::Failed
        },
        modified_files: modified,
        output: text,
    })
}

fn snapshot(root: &Path, files: &[PathBuf]) -> HashMap<PathBuf, Vec<u8>> {
    files
        .iter()
        .filter_map(|f| std::fs::read(root.join(f)).ok().map(|b| (f.clone(), b)))
        .collect()
}

// ---------------------------------------------------------------------------
// Default manifest
// ---------------------------------------------------------------------------

pub const DEFAULT_MANIFEST: &str = r#"repos:
  - repo: https://github.com/pre-commit/pre-commit-hooks
    rev: v4.6.0
    hooks:
      - id: trailing-whitespace
      - id: end-of-file-fixer
      - id: check-yaml
      - id: check-added-large-files
  - repo: https://github.com/psf/black
    rev: 24.4.2
    hooks:
      - id: black
        args: [--line-length=88]
  - repo: https://github.com/PyCQA/isort
    rev: 5.13.2
    hooks:
      - id: isort
        args: [--profile=black]
  - repo: https://github.com/gitleaks/gitleaks
    rev: v8.18.4
    hooks:
      - id: gitleaks
  - repo: https://github.com/pylint-dev/pylint
    rev: v3.2.5
    hooks:
      - id: pylint
        args: [--disable=import-error]
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest(yaml: &str) -> HookManifest {
        HookManifest::parse(yaml).unwrap()
    }

    #[test]
    fn default_manifest_is_valid_and_ordered() {
        let m = manifest(DEFAULT_MANIFEST);
        assert!(m.validate().is_empty(), "{:?}", m.validate());
        let ids: Vec<String> = m.entries().into_iter().map(|e| e.id).collect();
        assert_eq!(
            ids,
            [
                "trailing-whitespace",
                "end-of-file-fixer",
                "check-yaml",
                "check-added-large-files",
                "black",
                "isort",
                "gitleaks",
                "pylint"
            ]
        );
    }

    #[test]
    fn entries_carry_repo_rev_and_args() {
        let m = manifest(DEFAULT_MANIFEST);
        let black = m.entries().into_iter().find(|e| e.id == "black").unwrap();
        assert_eq!(black.repo, "https://github.com/psf/black");
        assert_eq!(black.rev.as_deref(), Some("24.4.2"));
        assert_eq!(black.args, ["--line-length=88"]);
    }

    #[test]
    fn validate_flags_missing_rev_and_duplicates() {
        let m = manifest(
            "repos:\n  - repo: https://example.com/hooks\n    hooks:\n      - id: a\n      - id: a\n",
        );
        let msgs: Vec<String> = m.validate().into_iter().map(|w| w.message).collect();
        assert!(msgs.iter().any(|m| m.contains("missing rev")));
        assert!(msgs.iter().any(|m| m.contains("duplicate hook id 'a'")));
    }

    #[test]
    fn validate_warns_on_floating_rev() {
        let m = manifest(
            "repos:\n  - repo: https://example.com/hooks\n    rev: main\n    hooks:\n      - id: a\n",
        );
        let warnings = m.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, crate::config::WarnLevel::Warning);
    }

    #[test]
    fn local_repo_needs_no_rev() {
        let m = manifest("repos:\n  - repo: local\n    hooks:\n      - id: cargo-fmt\n");
        assert!(m.validate().is_empty());
    }

    #[test]
    fn empty_manifest_is_an_error() {
        let m = manifest("repos: []\n");
        assert!(crate::config::has_errors(&m.validate()));
    }

    /// Serves revisions and registries from memory.
    #[derive(Default)]
    struct FakeSource {
        missing_revs: Vec<(&'static str, &'static str)>,
        registries: HashMap<String, Vec<String>>,
        unreachable: bool,
    }

    impl HookSource for FakeSource {
        fn has_revision(&mut self, repo: &str, rev: &str) -> Result<bool> {
            if self.unreachable {
                return Err(ReadmeError::Git {
                    command: "ls-remote".into(),
                    output: "unreachable".into(),
                });
            }
            Ok(!self.missing_revs.iter().any(|(r, v)| repo.contains(r) && rev == *v))
        }

        fn hook_ids(&mut self, repo: &str, _rev: &str) -> Result<Vec<String>> {
            self.registries
                .get(repo)
                .cloned()
                .ok_or_else(|| ReadmeError::InvalidManifest(format!("{repo}: no registry")))
        }
    }

    fn registries_for(m: &HookManifest) -> HashMap<String, Vec<String>> {
        m.repos
            .iter()
            .map(|r| (r.repo.clone(), r.hooks.iter().map(|h| h.id.clone()).collect()))
            .collect()
    }

    #[test]
    fn verify_revisions_uses_resolver() {
        let m = manifest(DEFAULT_MANIFEST);
        let mut source = FakeSource {
            missing_revs: vec![("black", "24.4.2")],
            registries: registries_for(&m),
            ..Default::default()
        };
        let checks = verify_revisions(&m, &mut source);
        assert_eq!(checks.len(), 5);
        let failing: Vec<&RevisionCheck> = checks.iter().filter(|c| !c.is_ok()).collect();
        assert_eq!(failing.len(), 1);
        assert_eq!(failing[0].repo, "https://github.com/psf/black");
        assert!(!failing[0].resolved);
    }

    #[test]
    fn verify_revisions_reports_unknown_hook_ids() {
        let m = manifest(DEFAULT_MANIFEST);
        let mut registries = registries_for(&m);
        registries.insert(
            "https://github.com/pre-commit/pre-commit-hooks".into(),
            vec!["trailing-whitespace".into(), "end-of-file-fixer".into(), "check-yaml".into()],
        );
        let mut source = FakeSource {
            registries,
            ..Default::default()
        };
        let checks = verify_revisions(&m, &mut source);
        let stock = checks
            .iter()
            .find(|c| c.repo.ends_with("pre-commit-hooks"))
            .unwrap();
        assert!(stock.resolved);
        assert_eq!(stock.missing_hooks, ["check-added-large-files"]);
        assert!(!stock.is_ok());
        assert_eq!(checks.iter().filter(|c| c.is_ok()).count(), 4);
    }

    #[test]
    fn verify_revisions_records_resolver_errors() {
        let m = manifest(
            "repos:\n  - repo: https://example.com/x\n    rev: v1\n    hooks:\n      - id: a\n  - repo: local\n    hooks:\n      - id: b\n",
        );
        let mut source = FakeSource {
            unreachable: true,
            ..Default::default()
        };
        let checks = verify_revisions(&m, &mut source);
        assert_eq!(checks.len(), 1);
        assert!(!checks[0].resolved);
        assert!(checks[0].error.as_deref().unwrap().contains("unreachable"));
    }

    #[test]
    fn missing_registry_is_an_error_not_a_pass() {
        let m = manifest(
            "repos:\n  - repo: https://example.com/x\n    rev: v1\n    hooks:\n      - id: a\n",
        );
        let checks = verify_revisions(&m, &mut FakeSource::default());
        assert!(checks[0].resolved);
        assert!(checks[0].error.as_deref().unwrap().contains("no registry"));
        assert!(!checks[0].is_ok());
    }

    #[test]
    fn registry_ids_are_parsed() {
        let ids = parse_registry(
            "- id: black\n  name: black\n  entry: black\n  language: python\n- id: black-jupyter\n  entry: black\n",
        )
        .unwrap();
        assert_eq!(ids, ["black", "black-jupyter"]);
        assert!(parse_registry("id: not-a-list\n").is_err());
    }

    #[test]
    fn trailing_whitespace_blocks_commit() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.md"), "hello   \nworld\n").unwrap();
        let m = manifest(
            "repos:\n  - repo: https://github.com/pre-commit/pre-commit-hooks\n    rev: v4.6.0\n    hooks:\n      - id: trailing-whitespace\n",
        );
        let report = run_hooks(dir.path(), &m, &[PathBuf::from("notes.md")]).unwrap();
        assert!(!report.passed);
        assert_eq!(report.outcomes[0].status, HookStatus::Failed);
        assert_eq!(report.outcomes[0].modified_files, [PathBuf::from("notes.md")]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.md")).unwrap(),
            "hello\nworld\n"
        );
    }

    #[test]
    fn clean_files_pass_and_filters_apply() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "clean\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "dirty  \n").unwrap();
        let m = manifest(
            "repos:\n  - repo: local\n    hooks:\n      - id: trailing-whitespace\n        files: '\\.md$'\n",
        );
        let files = [PathBuf::from("a.md"), PathBuf::from("b.txt")];
        let report = run_hooks(dir.path(), &m, &files).unwrap();
        assert!(report.passed);
        assert_eq!(report.outcomes[0].status, HookStatus::Passed);
    }

    #[test]
    fn unmatched_hook_reports_no_files() {
        let dir = TempDir::new().unwrap();
        let m = manifest(
            "exclude: '^vendor/'\nrepos:\n  - repo: local\n    hooks:\n      - id: check-yaml\n",
        );
        let report = run_hooks(dir.path(), &m, &[PathBuf::from("vendor/x.yaml")]).unwrap();
        assert!(report.passed);
        assert_eq!(report.outcomes[0].status, HookStatus::NoFiles);
    }

    #[test]
    fn missing_external_executable_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("x.py"), "x = 1\n").unwrap();
        let m = manifest(
            "repos:\n  - repo: local\n    hooks:\n      - id: definitely-not-a-real-hook-binary\n",
        );
        let report = run_hooks(dir.path(), &m, &[PathBuf::from("x.py")]).unwrap();
        assert!(!report.passed);
        assert!(report.outcomes[0].output.contains("not found"));
    }

    #[test]
    fn fail_fast_skips_remaining_hooks() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.md"), "x \n").unwrap();
        let m = manifest(
            "fail_fast: true\nrepos:\n  - repo: local\n    hooks:\n      - id: trailing-whitespace\n      - id: end-of-file-fixer\n",
        );
        let report = run_hooks(dir.path(), &m, &[PathBuf::from("a.md")]).unwrap();
        assert!(!report.passed);
        assert_eq!(report.outcomes[1].status, HookStatus::Skipped);
    }
}
