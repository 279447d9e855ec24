use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

pub const READMEGEN_DIR: &str = ".readmegen";
pub const CONFIG_FILE: &str = ".readmegen/config.yaml";
pub const HOOK_MANIFEST_FILE: &str = ".pre-commit-config.yaml";
pub const WORKFLOW_FILE: &str = ".github/workflows/update-readme.yml";
pub const DEFAULT_README: &str = "README.md";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn readmegen_dir(root: &Path) -> PathBuf {
    root.join(READMEGEN_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn hook_manifest_path(root: &Path) -> PathBuf {
    root.join(HOOK_MANIFEST_FILE)
}

pub fn workflow_path(root: &Path) -> PathBuf {
    root.join(WORKFLOW_FILE)
}

pub fn readme_path(root: &Path, filename: &str) -> PathBuf {
    root.join(filename)
}
