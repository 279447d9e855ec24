//! GitHub Actions workflow model: triggers, jobs, and ordered steps.

use crate::config::ConfigWarning;
use crate::error::{ReadmeError, Result};
use crate::schedule::CronExpr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub type Inputs = BTreeMap<String, serde_yaml::Value>;

/// Render a YAML scalar the way the runner passes it to a process.
pub fn scalar(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::Null => String::new(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PushTrigger {
    /// Empty means every branch.
    pub branches: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Triggers {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushTrigger>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schedule: Vec<String>,
    pub workflow_dispatch: bool,
    /// Events the local runner does not model (pull_request, release, ...).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<String>,
}

impl Triggers {
    pub fn is_empty(&self) -> bool {
        self.push.is_none() && self.schedule.is_empty() && !self.workflow_dispatch && self.other.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTriggers {
    One(String),
    Many(Vec<String>),
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl<'de> Deserialize<'de> for Triggers {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = RawTriggers::deserialize(d)?;
        let events: Vec<(String, serde_yaml::Value)> = match raw {
            RawTriggers::One(e) => vec![(e, serde_yaml::Value::Null)],
            RawTriggers::Many(es) => es.into_iter().map(|e| (e, serde_yaml::Value::Null)).collect(),
            RawTriggers::Map(m) => m.into_iter().collect(),
        };

        let mut t = Triggers::default();
        for (event, params) in events {
            match event.as_str() {
                "push" => {
                    let branches = params
                        .get("branches")
                        .and_then(|b| b.as_sequence())
                        .map(|seq| seq.iter().map(scalar).collect())
                        .unwrap_or_default();
                    t.push = Some(PushTrigger { branches });
                }
                "schedule" => {
                    let entries = params.as_sequence().ok_or_else(|| {
                        serde::de::Error::custom("schedule must be a list of {cron: ...}")
                    })?;
                    for entry in entries {
                        let cron = entry.get("cron").map(scalar).ok_or_else(|| {
                            serde::de::Error::custom("schedule entry without cron")
                        })?;
                        t.schedule.push(cron);
                    }
                }
                "workflow_dispatch" => t.workflow_dispatch = true,
                _ => t.other.push(event),
            }
        }
        Ok(t)
    }
}

/// An event delivered to a workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Push { branch: String },
    Schedule { cron: String },
    Dispatch,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Push { .. } => "push",
            Event::Schedule { .. } => "schedule",
            Event::Dispatch => "workflow_dispatch",
        }
    }
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub with: Inputs,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: Inputs,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub continue_on_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

/// Where a step sits in the checkout → setup → install → script → publish pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Checkout,
    Setup,
    Install,
    Script,
    Publish,
    /// An action the pipeline order says nothing about.
    Other,
}

impl StepKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StepKind::Checkout => "checkout",
            StepKind::Setup => "setup",
            StepKind::Install => "install",
            StepKind::Script => "script",
            StepKind::Publish => "publish",
            StepKind::Other => "other",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions that stage, commit, and push the working tree.
pub const PUBLISH_ACTIONS: &[&str] = &[
    "stefanzweifel/git-auto-commit-action",
    "EndBug/add-and-commit",
    "ad-m/github-push-action",
];

const INSTALL_COMMANDS: &[&str] = &[
    "pip install",
    "pip3 install",
    "poetry install",
    "cargo install",
    "cargo build",
    "cargo fetch",
    "npm ci",
    "npm install",
    "apt-get install",
];

impl Step {
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(uses) = &self.uses {
            return format!("Run {uses}");
        }
        self.run
            .as_deref()
            .and_then(|r| r.lines().next())
            .map(|l| format!("Run {l}"))
            .unwrap_or_else(|| "(unnamed step)".to_string())
    }

    pub fn action(&self) -> Option<ActionRef> {
        self.uses.as_deref().and_then(ActionRef::parse)
    }

    pub fn kind(&self) -> StepKind {
        if let Some(action) = self.action() {
            let name = action.name.as_str();
            if name == "actions/checkout" {
                return StepKind::Checkout;
            }
            if PUBLISH_ACTIONS.contains(&name) {
                return StepKind::Publish;
            }
            let repo = name.rsplit('/').next().unwrap_or(name);
            if repo.starts_with("setup-") || repo.ends_with("-toolchain") {
                return StepKind::Setup;
            }
            return StepKind::Other;
        }
        match &self.run {
            Some(cmd) if cmd.contains("git push") => StepKind::Publish,
            Some(cmd) if INSTALL_COMMANDS.iter().any(|c| cmd.contains(c)) => StepKind::Install,
            Some(_) => StepKind::Script,
            None => StepKind::Other,
        }
    }

    pub fn input(&self, key: &str) -> Option<String> {
        self.with.get(key).map(scalar)
    }
}

/// `owner/repo[/path]@ref`, `./local-path`, or `docker://image`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRef {
    /// `owner/repo`, or the whole reference for local/docker actions.
    pub name: String,
    pub path: Option<String>,
    pub version: Option<String>,
}

impl ActionRef {
    pub fn parse(uses: &str) -> Option<Self> {
        let uses = uses.trim();
        if uses.starts_with("./") || uses.starts_with("docker://") {
            return Some(Self {
                name: uses.to_string(),
                path: None,
                version: None,
            });
        }
        let (target, version) = match uses.split_once('@') {
            Some((t, v)) => (t, Some(v.to_string())),
            None => (uses, None),
        };
        let mut parts = target.splitn(3, '/');
        let owner = parts.next().filter(|s| !s.is_empty())?;
        let repo = parts.next().filter(|s| !s.is_empty())?;
        Some(Self {
            name: format!("{owner}/{repo}"),
            path: parts.next().map(String::from),
            version,
        })
    }

    pub fn is_remote(&self) -> bool {
        !self.name.starts_with("./") && !self.name.starts_with("docker://")
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Job {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<serde_yaml::Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: Inputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "on")]
    pub triggers: Triggers,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: Inputs,
    #[serde(default)]
    pub jobs: BTreeMap<String, Job>,
}

impl Workflow {
    pub fn parse(data: &str) -> Result<Self> {
        serde_yaml::from_str(data).map_err(|e| ReadmeError::InvalidWorkflow(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ReadmeError::FileNotFound(path.display().to_string()));
        }
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn job(&self, id: &str) -> Result<&Job> {
        self.jobs
            .get(id)
            .ok_or_else(|| ReadmeError::JobNotFound(id.to_string()))
    }

    /// The only job, or the named one when several exist.
    pub fn select_job<'a>(&'a self, id: Option<&'a str>) -> Result<(&'a str, &'a Job)> {
        match id {
            Some(id) => self.job(id).map(|j| (id, j)),
            None => {
                let mut iter = self.jobs.iter();
                match (iter.next(), iter.next()) {
                    (Some((id, job)), None) => Ok((id.as_str(), job)),
                    (None, _) => Err(ReadmeError::InvalidWorkflow("no jobs defined".into())),
                    _ => Err(ReadmeError::InvalidWorkflow(
                        "several jobs defined: pass --job".into(),
                    )),
                }
            }
        }
    }

    pub fn schedules(&self) -> Result<Vec<CronExpr>> {
        self.triggers
            .schedule
            .iter()
            .map(|c| CronExpr::parse(c))
            .collect()
    }

    pub fn fires_on(&self, event: &Event) -> bool {
        match event {
            Event::Push { branch } => self
                .triggers
                .push
                .as_ref()
                .is_some_and(|p| p.branches.is_empty() || p.branches.iter().any(|b| b == branch)),
            Event::Schedule { cron } => self
                .triggers
                .schedule
                .iter()
                .any(|c| c.split_whitespace().eq(cron.split_whitespace())),
            Event::Dispatch => self.triggers.workflow_dispatch,
        }
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.triggers.is_empty() {
            warnings.push(ConfigWarning::error("workflow has no triggers"));
        }
        if let Some(push) = &self.triggers.push {
            if push.branches.iter().any(|b| b.trim().is_empty()) {
                warnings.push(ConfigWarning::error("push trigger lists an empty branch"));
            }
        }
        for cron in &self.triggers.schedule {
            if let Err(e) = CronExpr::parse(cron) {
                warnings.push(ConfigWarning::error(e.to_string()));
            }
        }
        for event in &self.triggers.other {
            warnings.push(ConfigWarning::warning(format!(
                "trigger '{event}' is not simulated by the local runner"
            )));
        }

        if self.jobs.is_empty() {
            warnings.push(ConfigWarning::error("workflow defines no jobs"));
        }
        for (job_id, job) in &self.jobs {
            validate_job(job_id, job, &mut warnings);
        }

        warnings
    }
}

fn validate_job(job_id: &str, job: &Job, warnings: &mut Vec<ConfigWarning>) {
    if job.steps.is_empty() {
        warnings.push(ConfigWarning::error(format!("job '{job_id}' has no steps")));
        return;
    }

    let mut last: Option<(StepKind, String)> = None;
    for (i, step) in job.steps.iter().enumerate() {
        let label = format!("job '{job_id}' step {} ({})", i + 1, step.display_name());
        match (&step.uses, &step.run) {
            (Some(_), Some(_)) => warnings.push(ConfigWarning::error(format!(
                "{label}: has both 'uses' and 'run'"
            ))),
            (None, None) => warnings.push(ConfigWarning::error(format!(
                "{label}: needs 'uses' or 'run'"
            ))),
            (Some(uses), None) => match ActionRef::parse(uses) {
                None => warnings.push(ConfigWarning::error(format!(
                    "{label}: malformed action reference '{uses}'"
                ))),
                Some(a) if a.is_remote() && a.version.as_deref().map_or(true, str::is_empty) => {
                    warnings.push(ConfigWarning::error(format!(
                        "{label}: action '{uses}' is not pinned to a version"
                    )))
                }
                Some(_) => {}
            },
            (None, Some(cmd)) if cmd.trim().is_empty() => {
                warnings.push(ConfigWarning::error(format!("{label}: empty 'run'")))
            }
            (None, Some(_)) => {}
        }

        let kind = step.kind();
        if kind == StepKind::Other {
            continue;
        }
        if let Some((prev, prev_label)) = &last {
            if kind < *prev {
                warnings.push(ConfigWarning::error(format!(
                    "{label}: {kind} step runs after {prev} step {prev_label}"
                )));
            }
        }
        if last.as_ref().map_or(true, |(prev, _)| kind >= *prev) {
            last = Some((kind, label));
        }
    }
}

// ---------------------------------------------------------------------------
// Action verification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ActionCheck {
    pub job: String,
    /// 1-based step number.
    pub step: usize,
    pub uses: String,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionRef {
    /// Repository hosting a remote action.
    pub fn repository_url(&self) -> String {
        format!("https://github.com/{}", self.name)
    }
}

/// Ask `resolve(repository_url, version)` whether each remote action's pinned
/// version exists. Each distinct reference is resolved once; local and docker
/// actions are not checked.
pub fn verify_actions<F>(workflow: &Workflow, mut resolve: F) -> Vec<ActionCheck>
where
    F: FnMut(&str, &str) -> Result<bool>,
{
    let mut seen: BTreeMap<(String, String), std::result::Result<bool, String>> = BTreeMap::new();
    let mut checks = Vec::new();

    for (job_id, job) in &workflow.jobs {
        for (i, step) in job.steps.iter().enumerate() {
            let (Some(uses), Some(action)) = (&step.uses, step.action()) else {
                continue;
            };
            if !action.is_remote() {
                continue;
            }
            let result = match action.version.as_deref().filter(|v| !v.is_empty()) {
                None => Err("no version pinned".to_string()),
                Some(version) => seen
                    .entry((action.name.clone(), version.to_string()))
                    .or_insert_with(|| {
                        resolve(&action.repository_url(), version).map_err(|e| e.to_string())
                    })
                    .clone(),
            };
            checks.push(ActionCheck {
                job: job_id.clone(),
                step: i + 1,
                uses: uses.clone(),
                resolved: result.as_ref().is_ok_and(|r| *r),
                error: result.err(),
            });
        }
    }
    checks
}

// ---------------------------------------------------------------------------
// Default workflow
// ---------------------------------------------------------------------------

pub const DEFAULT_WORKFLOW: &str = r#"name: Update README

on:
  push:
    branches: [main]
  schedule:
    - cron: "*/30 * * * *"
  workflow_dispatch:

jobs:
  update-readme:
    runs-on: ubuntu-latest
    steps:
      - name: Checkout
        uses: actions/checkout@v4
      - name: Set up Rust
        uses: dtolnay/rust-toolchain@stable
      - name: Install readmegen
        run: cargo install --locked --path crates/readmegen-cli
      - name: Generate README
        run: readmegen generate
        env:
          GITHUB_TOKEN: ${{ secrets.GITHUB_TOKEN }}
      - name: Commit and push
        uses: stefanzweifel/git-auto-commit-action@v5
        with:
          commit_message: Update README
          file_pattern: README.md
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
