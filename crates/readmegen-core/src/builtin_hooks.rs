//! In-process versions of the stock `pre-commit-hooks` checks.
//!
//! Fixers (`trailing-whitespace`, `end-of-file-fixer`) rewrite offending files
//! and still fail, so the developer re-stages the fixed content.

use crate::error::Result;
use crate::git;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub struct BuiltinResult {
    pub passed: bool,
    pub modified: Vec<PathBuf>,
    pub output: String,
}

pub type BuiltinHook = fn(&Path, &[PathBuf], &[String]) -> Result<BuiltinResult>;

pub fn lookup(id: &str) -> Option<BuiltinHook> {
    match id {
        "trailing-whitespace" => Some(trailing_whitespace as BuiltinHook),
        "end-of-file-fixer" => Some(end_of_file_fixer as BuiltinHook),
        "check-yaml" => Some(check_yaml as BuiltinHook),
        "check-added-large-files" => Some(check_added_large_files as BuiltinHook),
        _ => None,
    }
}

pub fn is_builtin(id: &str) -> bool {
    lookup(id).is_some()
}

/// Binary files are skipped by the text fixers.
fn read_text(path: &Path) -> Result<Option<String>> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8(bytes).ok())
}

fn trailing_whitespace(root: &Path, files: &[PathBuf], _args: &[String]) -> Result<BuiltinResult> {
    let mut modified = Vec::new();
    let mut output = String::new();
    for file in files {
        let path = root.join(file);
        let Some(content) = read_text(&path)? else {
            continue;
        };
        let fixed = strip_trailing_whitespace(&content);
        if fixed != content {
            crate::io::atomic_write(&path, fixed.as_bytes())?;
            output.push_str(&format!("Fixing {}\n", file.display()));
            modified.push(file.clone());
        }
    }
    Ok(BuiltinResult {
        passed: modified.is_empty(),
        modified,
        output,
    })
}

fn strip_trailing_whitespace(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    for line in content.split_inclusive('\n') {
        let (body, eol) = match line.strip_suffix("\r\n") {
            Some(b) => (b, "\r\n"),
            None => match line.strip_suffix('\n') {
                Some(b) => (b, "\n"),
                None => (line, ""),
            },
        };
        out.push_str(body.trim_end_matches([' ', '\t']));
        out.push_str(eol);
    }
    out
}

fn end_of_file_fixer(root: &Path, files: &[PathBuf], _args: &[String]) -> Result<BuiltinResult> {
    let mut modified = Vec::new();
    let mut output = String::new();
    for file in files {
        let path = root.join(file);
        let Some(content) = read_text(&path)? else {
            continue;
        };
        let trimmed = content.trim_end_matches(['\n', '\r']);
        let fixed = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed}\n")
        };
        if fixed != content {
            crate::io::atomic_write(&path, fixed.as_bytes())?;
            output.push_str(&format!("Fixing {}\n", file.display()));
            modified.push(file.clone());
        }
    }
    Ok(BuiltinResult {
        passed: modified.is_empty(),
        modified,
        output,
    })
}

fn check_yaml(root: &Path, files: &[PathBuf], _args: &[String]) -> Result<BuiltinResult> {
    let mut output = String::new();
    for file in files {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext != "yaml" && ext != "yml" {
            continue;
        }
        let data = std::fs::read_to_string(root.join(file))?;
        for doc in serde_yaml::Deserializer::from_str(&data) {
            if let Err(e) = serde_yaml::Value::deserialize(doc) {
                output.push_str(&format!("{}: {e}\n", file.display()));
                break;
            }
        }
    }
    Ok(BuiltinResult {
        passed: output.is_empty(),
        modified: Vec::new(),
        output,
    })
}

const DEFAULT_MAX_KB: u64 = 500;

/// Only files staged as new are checked, so large files already in history
/// pass under `--all-files`. `--enforce-all` checks every file, as does
/// running outside a git work tree.
fn check_added_large_files(
    root: &Path,
    files: &[PathBuf],
    args: &[String],
) -> Result<BuiltinResult> {
    let max_kb = args
        .iter()
        .find_map(|a| a.strip_prefix("--maxkb="))
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_MAX_KB);
    let enforce_all = args.iter().any(|a| a == "--enforce-all");
    let added: Option<HashSet<PathBuf>> = if enforce_all || !git::is_work_tree(root) {
        None
    } else {
        Some(git::added_files(root)?.into_iter().collect())
    };

    let mut output = String::new();
    for file in files {
        if added.as_ref().is_some_and(|a| !a.contains(file)) {
            continue;
        }
        let size_kb = std::fs::metadata(root.join(file))?.len().div_ceil(1024);
        if size_kb > max_kb {
            output.push_str(&format!(
                "{} ({size_kb} KB) exceeds {max_kb} KB\n",
                file.display()
            ));
        }
    }
    Ok(BuiltinResult {
        passed: output.is_empty(),
        modified: Vec::new(),
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, data: &[u8]) -> PathBuf {
        std::fs::write(dir.path().join(name), data).unwrap();
        PathBuf::from(name)
    }

    #[test]
    fn lookup_knows_stock_hooks() {
        assert!(is_builtin("trailing-whitespace"));
        assert!(is_builtin("check-yaml"));
        assert!(!is_builtin("black"));
    }

    #[test]
    fn strip_keeps_line_endings() {
        assert_eq!(strip_trailing_whitespace("a  \r\nb\t\nc "), "a\r\nb\nc");
        assert_eq!(strip_trailing_whitespace("clean\n"), "clean\n");
    }

    #[test]
    fn trailing_whitespace_fixes_and_fails() {
        let dir = TempDir::new().unwrap();
        let f = write(&dir, "a.py", b"x = 1   \n");
        let r = trailing_whitespace(dir.path(), &[f.clone()], &[]).unwrap();
        assert!(!r.passed);
        assert_eq!(r.modified, [f]);
        let again = trailing_whitespace(dir.path(), &[PathBuf::from("a.py")], &[]).unwrap();
        assert!(again.passed);
    }

    #[test]
    fn trailing_whitespace_skips_binary() {
        let dir = TempDir::new().unwrap();
        let f = write(&dir, "img.bin", &[0xff, 0xfe, b' ', b'\n']);
        let r = trailing_whitespace(dir.path(), &[f], &[]).unwrap();
        assert!(r.passed);
    }

    #[test]
    fn end_of_file_fixer_normalizes_final_newline() {
        let dir = TempDir::new().unwrap();
        let missing = write(&dir, "a.txt", b"text");
        let extra = write(&dir, "b.txt", b"text\n\n\n");
        let good = write(&dir, "c.txt", b"text\n");
        let r = end_of_file_fixer(dir.path(), &[missing, extra, good], &[]).unwrap();
        assert!(!r.passed);
        assert_eq!(r.modified.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "text\n");
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "text\n");
    }

    #[test]
    fn check_yaml_reports_broken_documents() {
        let dir = TempDir::new().unwrap();
        let ok = write(&dir, "ok.yml", b"a: 1\n---\nb: 2\n");
        let bad = write(&dir, "bad.yaml", b"a: [1, 2\n");
        let other = write(&dir, "notes.txt", b"a: [\n");
        let r = check_yaml(dir.path(), &[ok, bad, other], &[]).unwrap();
        assert!(!r.passed);
        assert!(r.output.contains("bad.yaml"));
        assert!(!r.output.contains("ok.yml"));
        assert!(!r.output.contains("notes.txt"));
    }

    #[test]
    fn large_files_respect_maxkb() {
        let dir = TempDir::new().unwrap();
        let big = write(&dir, "big.bin", &vec![0u8; 3 * 1024]);
        let args = vec!["--maxkb=2".to_string()];
        let r = check_added_large_files(dir.path(), &[big.clone()], &args).unwrap();
        assert!(!r.passed);
        let r = check_added_large_files(dir.path(), &[big], &[]).unwrap();
        assert!(r.passed);
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(["-c", "user.name=t", "-c", "user.email=t@example.com"])
            .args(args)
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?}");
    }

    #[test]
    fn large_files_only_flags_newly_added() {
        let dir = TempDir::new().unwrap();
        git(dir.path(), &["init", "-q"]);
        let tracked = write(&dir, "tracked.bin", &vec![0u8; 3 * 1024]);
        git(dir.path(), &["add", "tracked.bin"]);
        git(dir.path(), &["commit", "-q", "-m", "seed"]);
        let added = write(&dir, "added.bin", &vec![0u8; 3 * 1024]);
        git(dir.path(), &["add", "added.bin"]);

        let files = [tracked.clone(), added];
        let args = vec!["--maxkb=2".to_string()];
        let r = check_added_large_files(dir.path(), &files, &args).unwrap();
        assert!(!r.passed);
        assert!(r.output.contains("added.bin"));
        assert!(!r.output.contains("tracked.bin"));

        let args = vec!["--maxkb=2".to_string(), "--enforce-all".to_string()];
        let r = check_added_large_files(dir.path(), &[tracked], &args).unwrap();
        assert!(!r.passed);
    }
}
