// Is the stored index behind the working tree?

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use crate::index::Index;
use crate::indexer::Indexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMethod {
    Hash,
    Git,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StalenessReport {
    pub method: CheckMethod,
    pub stale: bool,
    pub generated_at: String,
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub deleted: Vec<String>,
}

/// Exact check: re-hash every indexable file and compare.
pub fn check_hashes(indexer: &Indexer, index: &Index) -> Result<StalenessReport> {
    let mut warnings = Vec::new();
    let changes = indexer
        .detect_changes(index, &mut warnings)
        .context("Failed to compare files with the index")?;
    Ok(StalenessReport {
        method: CheckMethod::Hash,
        stale: !changes.is_empty(),
        generated_at: index.meta.generated_at.clone(),
        added: changes.added,
        changed: changes.updated,
        deleted: changes.deleted,
    })
}

/// Cheap proxy: files git reports as committed after the index was
/// generated, plus uncommitted changes, limited to the project directory.
pub fn check_git(indexer: &Indexer, index: &Index) -> Result<StalenessReport> {
    let root = indexer.root();
    let generated = chrono::DateTime::parse_from_rfc3339(&index.meta.generated_at)
        .with_context(|| format!("Invalid index timestamp: {}", index.meta.generated_at))?
        .timestamp();

    // Git reports paths from the repository top level
    let prefix = run_git(root, &["rev-parse", "--show-prefix"])?.trim().to_string();
    let since = format!("--since={}", index.meta.generated_at);
    let log = run_git(
        root,
        &["log", &since, "--name-only", "--pretty=format:%x1f%ct", "--", "."],
    )?;
    let status = run_git(root, &["status", "--porcelain", "--untracked-files=all", "--", "."])?;

    let mut touched: BTreeSet<String> = committed_after(&log, generated).into_iter().collect();
    touched.extend(status.lines().filter_map(porcelain_path));
    let touched: BTreeSet<String> = touched
        .into_iter()
        .filter_map(|p| p.strip_prefix(prefix.as_str()).map(str::to_string))
        .collect();

    let mut report = StalenessReport {
        method: CheckMethod::Git,
        stale: false,
        generated_at: index.meta.generated_at.clone(),
        added: Vec::new(),
        changed: Vec::new(),
        deleted: Vec::new(),
    };
    for path in touched {
        let indexed = index.file(&path).is_some();
        let exists = root.join(&path).exists();
        match (indexed, exists) {
            (true, true) => report.changed.push(path),
            (true, false) => report.deleted.push(path),
            (false, true) if indexer.is_indexable(&path) => report.added.push(path),
            _ => {}
        }
    }
    report.stale = !(report.added.is_empty() && report.changed.is_empty() && report.deleted.is_empty());
    Ok(report)
}

fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(["-c", "core.quotepath=off"])
        .args(args)
        .current_dir(root)
        .output()
        .context("Failed to run git")?;
    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Files of commits made strictly after `generated` (unix seconds) in
/// `git log --name-only --pretty=format:%x1f%ct` output. `--since` alone is
/// inclusive and would report the commit the index was built from.
fn committed_after(log: &str, generated: i64) -> Vec<String> {
    let mut files = Vec::new();
    let mut newer = false;
    for line in log.lines() {
        if let Some(stamp) = line.strip_prefix('\u{1f}') {
            newer = stamp.trim().parse::<i64>().map(|t| t > generated).unwrap_or(true);
            continue;
        }
        let line = line.trim();
        if newer && !line.is_empty() {
            files.push(line.to_string());
        }
    }
    files
}

/// Path of a `git status --porcelain` line; the destination for renames.
fn porcelain_path(line: &str) -> Option<String> {
    let path = line.get(3..)?.trim();
    let path = path.rsplit(" -> ").next().unwrap_or(path);
    let path = path.trim_matches('"');
    (!path.is_empty()).then(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_hash_check_detects_edits() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "def foo():\n    pass\n").unwrap();
        let indexer = Indexer::new(dir.path(), Config::default());
        let index = indexer.full_scan().unwrap().index;

        let fresh = check_hashes(&indexer, &index).unwrap();
        assert!(!fresh.stale);

        fs::write(dir.path().join("a.py"), "def foo():\n    return 1\n").unwrap();
        fs::write(dir.path().join("b.py"), "def bar():\n    pass\n").unwrap();
        let stale = check_hashes(&indexer, &index).unwrap();
        assert!(stale.stale);
        assert_eq!(stale.changed, vec!["a.py"]);
        assert_eq!(stale.added, vec!["b.py"]);
    }

    #[test]
    fn test_porcelain_path() {
        assert_eq!(porcelain_path(" M src/a.py"), Some("src/a.py".to_string()));
        assert_eq!(porcelain_path("R  old.py -> new.py"), Some("new.py".to_string()));
        assert_eq!(porcelain_path("?? \"with space.py\""), Some("with space.py".to_string()));
        assert_eq!(porcelain_path("M"), None);
    }

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .args(["-c", "user.name=codeindex", "-c", "user.email=codeindex@localhost", "-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    /// A repository with one commit, or `None` when git is unavailable.
    fn repo(files: &[(&str, &str)]) -> Option<tempfile::TempDir> {
        let dir = tempdir().unwrap();
        if !git(dir.path(), &["init", "-q"]) {
            return None;
        }
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        assert!(git(dir.path(), &["add", "-A"]));
        assert!(git(dir.path(), &["commit", "-q", "-m", "init"]));
        Some(dir)
    }

    #[test]
    fn test_git_check_at_repo_root() {
        let Some(dir) = repo(&[("a.py", "def foo():\n    pass\n")]) else {
            return;
        };
        let indexer = Indexer::new(dir.path(), Config::default());
        let index = indexer.full_scan().unwrap().index;

        // The commit the index was built from does not count
        let fresh = check_git(&indexer, &index).unwrap();
        assert!(!fresh.stale, "{:?}", fresh);

        fs::create_dir_all(dir.path().join("pkg")).unwrap();
        fs::write(dir.path().join("pkg/new.py"), "def bar():\n    pass\n").unwrap();
        let stale = check_git(&indexer, &index).unwrap();
        assert!(stale.stale);
        assert_eq!(stale.added, vec!["pkg/new.py"]);
        assert!(stale.changed.is_empty());
    }

    #[test]
    fn test_git_check_in_subdirectory() {
        let Some(dir) = repo(&[
            ("proj/a.py", "def foo():\n    pass\n"),
            ("other/b.py", "def bar():\n    pass\n"),
        ]) else {
            return;
        };
        let project = dir.path().join("proj");
        let indexer = Indexer::new(&project, Config::default());
        let index = indexer.full_scan().unwrap().index;

        fs::write(dir.path().join("other/b.py"), "def bar():\n    return 2\n").unwrap();
        assert!(!check_git(&indexer, &index).unwrap().stale);

        fs::remove_file(project.join("a.py")).unwrap();
        fs::write(project.join("c.py"), "def baz():\n    pass\n").unwrap();
        let stale = check_git(&indexer, &index).unwrap();
        assert!(stale.stale);
        assert_eq!(stale.deleted, vec!["a.py"]);
        assert_eq!(stale.added, vec!["c.py"]);

        fs::write(project.join("a.py"), "def foo():\n    return 1\n").unwrap();
        let stale = check_git(&indexer, &index).unwrap();
        assert_eq!(stale.changed, vec!["a.py"]);
    }

    #[test]
    fn test_committed_after_is_strict() {
        let log = "\u{1f}200\nlater.py\n\n\u{1f}100\nsame.py\nsrc/x.py\n";
        assert_eq!(committed_after(log, 100), vec!["later.py"]);
        assert_eq!(committed_after(log, 99), vec!["later.py", "same.py", "src/x.py"]);
    }
}
