//! Local execution of a workflow job.
//!
//! Steps run strictly in order. The first failing step without
//! `continue-on-error` halts the job and every later step is reported as
//! skipped, so a failed script never reaches the publish step.

use crate::error::{ReadmeError, Result};
use crate::git::{self, PublishOutcome, PublishRequest};
use crate::workflow::{scalar, Event, Inputs, Step, StepKind, Workflow, PUBLISH_ACTIONS};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Success,
    Failed { exit_code: Option<i32> },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub status: StepStatus,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            status: StepStatus::Success,
            output: String::new(),
            note: None,
        }
    }

    pub fn failed(exit_code: Option<i32>, note: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed { exit_code },
            output: String::new(),
            note: Some(note.into()),
        }
    }

    pub fn skipped(note: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Skipped,
            output: String::new(),
            note: Some(note.into()),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub kind: StepKind,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workflow: Option<String>,
    pub job: String,
    pub event: String,
    pub success: bool,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn reached(&self, kind: StepKind) -> bool {
        self.steps
            .iter()
            .any(|s| s.kind == kind && s.outcome.status != StepStatus::Skipped)
    }
}

// ---------------------------------------------------------------------------
// Executor seam
// ---------------------------------------------------------------------------

/// Everything a step can see besides its own definition.
pub struct StepContext<'a> {
    pub root: &'a Path,
    pub event: &'a Event,
    /// Workflow, job, and step `env`, merged and expanded.
    pub env: BTreeMap<String, String>,
    /// Step `with` inputs, expanded.
    pub inputs: BTreeMap<String, String>,
}

pub trait StepExecutor {
    fn execute(&mut self, ctx: &StepContext<'_>, step: &Step) -> Result<StepOutcome>;
}

/// Run job `job_id` (or the only job) of `workflow` for `event`.
pub fn run_job<E: StepExecutor>(
    root: &Path,
    workflow: &Workflow,
    job_id: Option<&str>,
    event: &Event,
    executor: &mut E,
) -> Result<RunReport> {
    if !workflow.fires_on(event) {
        return Err(ReadmeError::NotTriggered(event.name().to_string()));
    }
    let (job_id, job) = workflow.select_job(job_id)?;
    tracing::info!(job = job_id, event = event.name(), steps = job.steps.len(), "starting job");

    let mut steps = Vec::with_capacity(job.steps.len());
    let mut halted = false;
    let mut success = true;

    for (index, step) in job.steps.iter().enumerate() {
        let name = step.display_name();
        let kind = step.kind();

        if halted {
            steps.push(StepRecord {
                index,
                name,
                kind,
                outcome: StepOutcome::skipped("an earlier step failed"),
            });
            continue;
        }

        let env = expand_env(&[&workflow.env, &job.env, &step.env], event);
        let inputs = step
            .with
            .iter()
            .map(|(k, v)| (k.clone(), expand(&scalar(v), &env, event)))
            .collect();
        let ctx = StepContext {
            root,
            event,
            env,
            inputs,
        };

        tracing::info!(step = index + 1, %name, %kind, "running step");
        let outcome = match executor.execute(&ctx, step) {
            Ok(o) => o,
            Err(e) => StepOutcome::failed(None, e.to_string()),
        };

        if let StepStatus::Failed { exit_code } = outcome.status {
            if step.continue_on_error {
                tracing::warn!(step = index + 1, ?exit_code, "step failed, continuing");
            } else {
                tracing::warn!(step = index + 1, ?exit_code, "step failed, halting job");
                halted = true;
                success = false;
            }
        }
        steps.push(StepRecord {
            index,
            name,
            kind,
            outcome,
        });
    }

    Ok(RunReport {
        workflow: workflow.name.clone(),
        job: job_id.to_string(),
        event: event.name().to_string(),
        success,
        steps,
    })
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

static EXPR_RE: OnceLock<Regex> = OnceLock::new();

fn expr_re() -> &'static Regex {
    EXPR_RE.get_or_init(|| Regex::new(r"\$\{\{\s*([A-Za-z_][A-Za-z0-9_.\-]*)\s*\}\}").unwrap())
}

/// Expand `${{ secrets.X }}`, `${{ env.X }}`, and a few `github.*` contexts.
/// Secrets come from the process environment; unknown expressions expand to
/// an empty string.
pub fn expand(text: &str, env: &BTreeMap<String, String>, event: &Event) -> String {
    expr_re()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let path = &caps[1];
            match path.split_once('.') {
                Some(("secrets", name)) => std::env::var(name).unwrap_or_default(),
                Some(("env", name)) => env
                    .get(name)
                    .cloned()
                    .or_else(|| std::env::var(name).ok())
                    .unwrap_or_default(),
                Some(("github", "event_name")) => event.name().to_string(),
                Some(("github", "ref_name")) => match event {
                    Event::Push { branch } => branch.clone(),
                    _ => String::new(),
                },
                _ => String::new(),
            }
        })
        .into_owned()
}

fn expand_env(layers: &[&Inputs], event: &Event) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    for layer in layers {
        for (k, v) in layer.iter() {
            let value = expand(&scalar(v), &env, event);
            env.insert(k.clone(), value);
        }
    }
    env
}

// ---------------------------------------------------------------------------
// LocalExecutor
// ---------------------------------------------------------------------------

/// Runs steps on this machine. `run` steps go through `sh -c`; checkout,
/// toolchain setup, and publish actions are emulated; other actions are
/// skipped.
pub struct LocalExecutor {
    /// When false the publish step commits but does not push.
    pub push: bool,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self { push: true }
    }
}

impl StepExecutor for LocalExecutor {
    fn execute(&mut self, ctx: &StepContext<'_>, step: &Step) -> Result<StepOutcome> {
        if let Some(cmd) = &step.run {
            let dir = match &step.working_directory {
                Some(d) => ctx.root.join(d),
                None => ctx.root.to_path_buf(),
            };
            return run_shell(&expand(cmd, &ctx.env, ctx.event), &dir, &ctx.env);
        }

        let Some(action) = step.action() else {
            return Ok(StepOutcome::failed(None, "step has neither 'uses' nor 'run'"));
        };
        match step.kind() {
            StepKind::Checkout => Ok(if git::is_work_tree(ctx.root) {
                StepOutcome::success().with_note("using the existing work tree")
            } else {
                StepOutcome::failed(None, format!("{} is not a git work tree", ctx.root.display()))
            }),
            StepKind::Setup => Ok(setup_toolchain(&action.name, ctx)),
            StepKind::Publish if PUBLISH_ACTIONS.contains(&action.name.as_str()) => {
                self.publish(&action.name, ctx)
            }
            _ => Ok(StepOutcome::skipped(format!(
                "action '{}' is not emulated locally",
                action.name
            ))),
        }
    }
}

impl LocalExecutor {
    fn publish(&self, action: &str, ctx: &StepContext<'_>) -> Result<StepOutcome> {
        let input = |key: &str| ctx.inputs.get(key).filter(|v| !v.is_empty()).cloned();

        let message = input("commit_message")
            .or_else(|| input("message"))
            .unwrap_or_else(|| "Automated update".to_string());
        let mut req = PublishRequest::new(message);
        req.pathspecs = input("file_pattern")
            .or_else(|| input("add"))
            .map(|p| p.split_whitespace().map(String::from).collect())
            .unwrap_or_default();
        req.branch = input("branch").or_else(|| match ctx.event {
            Event::Push { branch } => Some(branch.clone()),
            _ => None,
        });
        req.token = input("github_token")
            .or_else(|| ctx.env.get("GITHUB_TOKEN").cloned())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty());
        if let Some(name) = input("commit_user_name").or_else(|| input("author_name")) {
            req.author_name = name;
        }
        if let Some(email) = input("commit_user_email").or_else(|| input("author_email")) {
            req.author_email = email;
        }
        req.push = self.push;

        tracing::debug!(action, pathspecs = ?req.pathspecs, push = req.push, "publishing");
        Ok(match git::commit_and_push(ctx.root, &req)? {
            PublishOutcome::NothingToCommit => StepOutcome::success().with_note("nothing to commit"),
            PublishOutcome::Committed { commit, pushed } => StepOutcome::success().with_note(
                if pushed {
                    format!("committed {commit} and pushed")
                } else {
                    format!("committed {commit}")
                },
            ),
        })
    }
}

/// Executables a setup action is expected to put on `PATH`.
fn toolchain_candidates(action: &str) -> Vec<String> {
    let repo = action.rsplit('/').next().unwrap_or(action);
    match repo {
        "setup-python" => vec!["python3".into(), "python".into()],
        "rust-toolchain" => vec!["cargo".into()],
        "setup-node" => vec!["node".into()],
        "setup-java" => vec!["java".into()],
        other => {
            let tool = other
                .strip_prefix("setup-")
                .or_else(|| other.strip_suffix("-toolchain"))
                .unwrap_or(other);
            vec![tool.to_string()]
        }
    }
}

fn setup_toolchain(action: &str, ctx: &StepContext<'_>) -> StepOutcome {
    let candidates = toolchain_candidates(action);
    let requested = ctx
        .inputs
        .iter()
        .find(|(k, _)| k.ends_with("-version") || k.as_str() == "toolchain")
        .map(|(k, v)| format!(" ({k} {v} requested)"))
        .unwrap_or_default();
    for tool in &candidates {
        if let Ok(path) = which::which(tool) {
            return StepOutcome::success().with_note(format!("using {}{requested}", path.display()));
        }
    }
    StepOutcome::failed(None, format!("none of {candidates:?} found on PATH"))
}

fn run_shell(cmd: &str, dir: &Path, env: &BTreeMap<String, String>) -> Result<StepOutcome> {
    tracing::debug!(%cmd, dir = %dir.display(), "sh -c");
    let output = Command::new("sh")
        .arg("-e")
        .arg("-c")
        .arg(cmd)
        .current_dir(dir)
        .envs(env)
        .output()
        .map_err(|e| ReadmeError::SpawnFailed {
            program: "sh".to_string(),
            reason: e.to_string(),
        })?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    let status = if output.status.success() {
        StepStatus::Success
    } else {
        StepStatus::Failed {
            exit_code: output.status.code(),
        }
    };
    Ok(StepOutcome {
        status,
        output: text,
        note: None,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
