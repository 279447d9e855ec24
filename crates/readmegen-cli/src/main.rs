mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, hooks::HooksSubcommand, workflow::WorkflowSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "readmegen",
    about = "Keep a profile README current: commit hooks, scheduled workflow, and generator",
    version,
    propagate_version = true
)]
struct Cli {
    /// Repository root (default: auto-detect from .readmegen/ or .git/)
    #[arg(long, global = true, env = "READMEGEN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold config, hook manifest, workflow, and README template
    Init {
        /// GitHub user whose repositories are listed
        #[arg(long)]
        user: String,
        /// Display name for the README
        #[arg(long)]
        name: Option<String>,
    },

    /// Fetch GitHub activity and rewrite the README's tagged regions
    Generate {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Inspect and validate .readmegen/config.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Inspect, validate, and run the pre-commit hook manifest
    Hooks {
        #[command(subcommand)]
        subcommand: HooksSubcommand,
    },

    /// Inspect, validate, and run the scheduled workflow
    Workflow {
        #[command(subcommand)]
        subcommand: WorkflowSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Generate { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { user, name } => cmd::init::run(&root, &user, name.as_deref()),
        Commands::Generate { dry_run } => cmd::generate::run(&root, dry_run, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
        Commands::Hooks { subcommand } => cmd::hooks::run(&root, subcommand, cli.json),
        Commands::Workflow { subcommand } => cmd::workflow::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
