use anyhow::Context;
use readmegen_core::{config::Config, generate, hooks, io, paths, workflow};
use std::path::Path;

pub fn run(root: &Path, user: &str, name: Option<&str>) -> anyhow::Result<()> {
    println!("Initializing readmegen in: {}", root.display());

    io::ensure_dir(&paths::readmegen_dir(root))
        .with_context(|| format!("failed to create {}", paths::READMEGEN_DIR))?;

    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
        Config::load(root).context("failed to load existing config")?
    } else {
        let cfg = Config::new(user, name.unwrap_or(user));
        cfg.save(root).context("failed to write config")?;
        println!("  created: {}", paths::CONFIG_FILE);
        cfg
    };

    let files = [
        (paths::HOOK_MANIFEST_FILE, hooks::DEFAULT_MANIFEST.to_string()),
        (paths::WORKFLOW_FILE, workflow::DEFAULT_WORKFLOW.to_string()),
        (config.readme.as_str(), generate::readme_template(&config)),
    ];
    for (rel, content) in files {
        let written = io::write_if_missing(&root.join(rel), content.as_bytes())
            .with_context(|| format!("failed to write {rel}"))?;
        if written {
            println!("  created: {rel}");
        } else {
            println!("  exists:  {rel}");
        }
    }

    println!("\nNext: run 'readmegen generate' to fill in the README.");
    Ok(())
}
