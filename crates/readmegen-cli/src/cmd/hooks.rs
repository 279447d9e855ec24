use crate::output::{print_json, print_table, report_warnings};
use anyhow::Context;
use clap::Subcommand;
use readmegen_core::{
    builtin_hooks, git,
    hooks::{self, GitHookSource, HookManifest, HookStatus},
    paths,
};
use std::path::{Path, PathBuf};

#[derive(Subcommand)]
pub enum HooksSubcommand {
    /// List hook entries in execution order
    List,

    /// Validate the manifest for common mistakes
    Validate,

    /// Run the hooks against staged files (or the given files)
    Run {
        /// Check every tracked file instead of the staged ones
        #[arg(long, conflicts_with = "files")]
        all_files: bool,
        /// Files to check, relative to the repository root
        files: Vec<PathBuf>,
    },

    /// Check that every pinned revision exists and provides the listed hooks
    VerifyRevs,
}

pub fn run(root: &Path, subcmd: HooksSubcommand, json: bool) -> anyhow::Result<()> {
    let manifest = HookManifest::load(root)
        .with_context(|| format!("failed to load {}", paths::HOOK_MANIFEST_FILE))?;
    match subcmd {
        HooksSubcommand::List => list(&manifest, json),
        HooksSubcommand::Validate => {
            report_warnings(paths::HOOK_MANIFEST_FILE, &manifest.validate(), json)
        }
        HooksSubcommand::Run { all_files, files } => {
            run_hooks(root, &manifest, all_files, files, json)
        }
        HooksSubcommand::VerifyRevs => verify_revs(&manifest, json),
    }
}

fn list(manifest: &HookManifest, json: bool) -> anyhow::Result<()> {
    let entries = manifest.entries();
    if json {
        return print_json(&entries);
    }
    let rows = entries
        .iter()
        .map(|e| {
            vec![
                e.id.clone(),
                e.rev.clone().unwrap_or_else(|| "-".to_string()),
                e.repo.clone(),
                e.args.join(" "),
                if builtin_hooks::is_builtin(&e.id) {
                    "built-in".to_string()
                } else {
                    "external".to_string()
                },
            ]
        })
        .collect();
    print_table(&["ID", "REV", "REPO", "ARGS", "RUNS"], rows);
    Ok(())
}

fn run_hooks(
    root: &Path,
    manifest: &HookManifest,
    all_files: bool,
    files: Vec<PathBuf>,
    json: bool,
) -> anyhow::Result<()> {
    let files = if all_files {
        git::tracked_files(root).context("failed to list tracked files")?
    } else if files.is_empty() {
        git::staged_files(root).context("failed to list staged files")?
    } else {
        files
    };

    let report = hooks::run_hooks(root, manifest, &files).context("failed to run hooks")?;

    if json {
        print_json(&report)?;
    } else {
        for outcome in &report.outcomes {
            let status = match outcome.status {
                HookStatus::Passed => "Passed",
                HookStatus::Failed => "Failed",
                HookStatus::NoFiles => "(no files to check) Skipped",
                HookStatus::Skipped => "Skipped",
            };
            println!("{:.<60}{status}", format!("{} ", outcome.id));
            if outcome.status == HookStatus::Failed {
                for f in &outcome.modified_files {
                    println!("  - modified: {}", f.display());
                }
                for line in outcome.output.lines() {
                    println!("  {line}");
                }
            }
        }
    }

    if !report.passed {
        anyhow::bail!("hooks failed: commit blocked");
    }
    Ok(())
}

fn verify_revs(manifest: &HookManifest, json: bool) -> anyhow::Result<()> {
    let checks = hooks::verify_revisions(manifest, &mut GitHookSource);

    if json {
        print_json(&checks)?;
    } else {
        let rows = checks
            .iter()
            .map(|c| {
                let status = if let Some(e) = &c.error {
                    format!("error: {e}")
                } else if !c.resolved {
                    "missing revision".to_string()
                } else if !c.missing_hooks.is_empty() {
                    format!("unknown hooks: {}", c.missing_hooks.join(", "))
                } else {
                    "ok".to_string()
                };
                vec![c.repo.clone(), c.rev.clone(), status]
            })
            .collect();
        print_table(&["REPO", "REV", "STATUS"], rows);
    }

    let failing = checks.iter().filter(|c| !c.is_ok()).count();
    if failing > 0 {
        anyhow::bail!("hook verification failed for {failing} repo(s)");
    }
    Ok(())
}
