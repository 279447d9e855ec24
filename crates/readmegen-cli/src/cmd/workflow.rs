use crate::output::{print_json, print_table, report_warnings};
use anyhow::Context;
use chrono::Utc;
use clap::{Subcommand, ValueEnum};
use readmegen_core::{
    git, paths,
    runner::{self, LocalExecutor, StepStatus},
    schedule::ScheduleSummary,
    workflow::{self, Event, Workflow},
};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum WorkflowSubcommand {
    /// Show triggers and the ordered steps of each job
    Show {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Validate triggers, cron expressions, and step lists
    Validate {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Check that every remote action's pinned version exists upstream
    VerifyActions {
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run a job locally, step by step, halting at the first failure
    Run {
        #[arg(long)]
        file: Option<PathBuf>,
        /// Event to simulate
        #[arg(long, value_enum, default_value = "dispatch")]
        event: EventKind,
        /// Branch for push events (default: current branch)
        #[arg(long)]
        branch: Option<String>,
        /// Cron expression for schedule events (default: the first listed)
        #[arg(long)]
        cron: Option<String>,
        /// Job id, required when the workflow has several jobs
        #[arg(long)]
        job: Option<String>,
        /// Commit but do not push in the publish step
        #[arg(long)]
        no_push: bool,
    },

    /// List upcoming scheduled runs
    Schedule {
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "5")]
        count: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EventKind {
    Push,
    Schedule,
    Dispatch,
}

pub fn run(root: &Path, subcmd: WorkflowSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        WorkflowSubcommand::Show { file } => show(&load(root, file)?, json),
        WorkflowSubcommand::Validate { file } => {
            let wf = load(root, file)?;
            report_warnings("workflow", &wf.validate(), json)
        }
        WorkflowSubcommand::VerifyActions { file } => verify_actions(&load(root, file)?, json),
        WorkflowSubcommand::Run {
            file,
            event,
            branch,
            cron,
            job,
            no_push,
        } => {
            let wf = load(root, file)?;
            let event = resolve_event(root, &wf, event, branch, cron)?;
            run_job(root, &wf, job.as_deref(), &event, !no_push, json)
        }
        WorkflowSubcommand::Schedule { file, count } => schedule(&load(root, file)?, count, json),
    }
}

fn load(root: &Path, file: Option<PathBuf>) -> anyhow::Result<Workflow> {
    let path = match file {
        Some(f) if f.is_absolute() => f,
        Some(f) => root.join(f),
        None => paths::workflow_path(root),
    };
    Workflow::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn resolve_event(
    root: &Path,
    wf: &Workflow,
    kind: EventKind,
    branch: Option<String>,
    cron: Option<String>,
) -> anyhow::Result<Event> {
    Ok(match kind {
        EventKind::Push => Event::Push {
            branch: match branch {
                Some(b) => b,
                None => git::current_branch(root)
                    .context("failed to detect current branch; pass --branch")?,
            },
        },
        EventKind::Schedule => Event::Schedule {
            cron: match cron {
                Some(c) => c,
                None => wf
                    .triggers
                    .schedule
                    .first()
                    .cloned()
                    .context("workflow has no schedule trigger")?,
            },
        },
        EventKind::Dispatch => Event::Dispatch,
    })
}

fn show(wf: &Workflow, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(wf);
    }

    println!("Workflow: {}", wf.name.as_deref().unwrap_or("(unnamed)"));
    println!("Triggers:");
    if let Some(push) = &wf.triggers.push {
        if push.branches.is_empty() {
            println!("  push: any branch");
        } else {
            println!("  push: {}", push.branches.join(", "));
        }
    }
    for cron in &wf.triggers.schedule {
        let description = readmegen_core::schedule::CronExpr::parse(cron)
            .map(|c| c.describe())
            .unwrap_or_else(|e| e.to_string());
        println!("  schedule: {cron} ({description})");
    }
    if wf.triggers.workflow_dispatch {
        println!("  workflow_dispatch");
    }

    for (id, job) in &wf.jobs {
        println!("\nJob: {id}");
        let rows = job
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| {
                vec![
                    (i + 1).to_string(),
                    s.kind().to_string(),
                    s.display_name(),
                    s.uses.clone().unwrap_or_else(|| "run".to_string()),
                ]
            })
            .collect();
        print_table(&["#", "KIND", "NAME", "USES"], rows);
    }
    Ok(())
}

fn verify_actions(wf: &Workflow, json: bool) -> anyhow::Result<()> {
    let checks = workflow::verify_actions(wf, git::remote_has_revision);

    if json {
        print_json(&checks)?;
    } else if checks.is_empty() {
        println!("Workflow uses no remote actions.");
    } else {
        let rows = checks
            .iter()
            .map(|c| {
                let status = match (&c.error, c.resolved) {
                    (Some(e), _) => format!("error: {e}"),
                    (None, true) => "ok".to_string(),
                    (None, false) => "missing".to_string(),
                };
                vec![c.job.clone(), c.step.to_string(), c.uses.clone(), status]
            })
            .collect();
        print_table(&["JOB", "STEP", "USES", "STATUS"], rows);
    }

    let unresolved = checks.iter().filter(|c| !c.resolved).count();
    if unresolved > 0 {
        anyhow::bail!("{unresolved} action reference(s) could not be resolved");
    }
    Ok(())
}

fn run_job(
    root: &Path,
    wf: &Workflow,
    job: Option<&str>,
    event: &Event,
    push: bool,
    json: bool,
) -> anyhow::Result<()> {
    let mut executor = LocalExecutor { push };
    let report = runner::run_job(root, wf, job, event, &mut executor).context("workflow run failed")?;

    if json {
        print_json(&report)?;
    } else {
        println!("Job '{}' on {}:", report.job, report.event);
        for step in &report.steps {
            let status = match &step.outcome.status {
                StepStatus::Success => "ok".to_string(),
                StepStatus::Skipped => "skipped".to_string(),
                StepStatus::Failed {
                    exit_code: Some(code),
                } => format!("failed (exit {code})"),
                StepStatus::Failed { exit_code: None } => "failed".to_string(),
            };
            let note = step
                .outcome
                .note
                .as_deref()
                .map(|n| format!(" - {n}"))
                .unwrap_or_default();
            println!("  {}. [{}] {}: {status}{note}", step.index + 1, step.kind, step.name);
            if matches!(step.outcome.status, StepStatus::Failed { .. }) {
                for line in step.outcome.output.lines() {
                    println!("      {line}");
                }
            }
        }
    }

    if !report.success {
        anyhow::bail!("job '{}' failed", report.job);
    }
    Ok(())
}

fn schedule(wf: &Workflow, count: usize, json: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let summaries = wf
        .schedules()
        .context("invalid schedule trigger")?
        .iter()
        .map(|c| ScheduleSummary::new(c, now, count))
        .collect::<Vec<_>>();

    if json {
        return print_json(&summaries);
    }
    if summaries.is_empty() {
        println!("Workflow has no schedule trigger.");
        return Ok(());
    }
    for s in &summaries {
        println!("{} ({})", s.cron, s.description);
        for t in &s.upcoming {
            println!("  {}", t.format("%Y-%m-%d %H:%M UTC"));
        }
    }
    Ok(())
}
