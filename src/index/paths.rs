// Path conventions: file categories, test detection, module names

use std::path::Path;

/// Category derived from path patterns. First match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Test,
    Migration,
    Config,
    Script,
    Api,
    Model,
    Util,
    Source,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Test => "test",
            FileCategory::Migration => "migration",
            FileCategory::Config => "config",
            FileCategory::Script => "script",
            FileCategory::Api => "api",
            FileCategory::Model => "model",
            FileCategory::Util => "util",
            FileCategory::Source => "source",
        }
    }
}

pub fn categorize(path: &str) -> FileCategory {
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower.split('/').collect();
    let dirs = &segments[..segments.len().saturating_sub(1)];
    let stem = file_stem(&lower);
    let has_dir = |names: &[&str]| dirs.iter().any(|d| names.contains(d));

    if is_test_path(path) {
        FileCategory::Test
    } else if has_dir(&["migrations", "alembic"]) {
        FileCategory::Migration
    } else if matches!(stem, "settings" | "config" | "conf" | "configuration") || has_dir(&["config", "conf", "settings"]) {
        FileCategory::Config
    } else if has_dir(&["scripts", "bin", "tools"]) || stem == "manage" {
        FileCategory::Script
    } else if has_dir(&["api", "routes", "routers", "endpoints", "views", "handlers"])
        || matches!(stem, "routes" | "views" | "api" | "endpoints" | "urls")
    {
        FileCategory::Api
    } else if has_dir(&["models", "schemas", "entities"]) || matches!(stem, "models" | "schemas" | "entities") {
        FileCategory::Model
    } else if has_dir(&["utils", "helpers", "lib", "common"]) || matches!(stem, "utils" | "helpers" | "util" | "common") {
        FileCategory::Util
    } else {
        FileCategory::Source
    }
}

/// Test-file naming conventions across the supported languages.
pub fn is_test_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    let name = lower.rsplit('/').next().unwrap_or(&lower);
    let stem = file_stem(&lower);
    let in_test_dir = lower
        .split('/')
        .rev()
        .skip(1)
        .any(|d| matches!(d, "tests" | "test" | "__tests__" | "spec" | "testing"));

    in_test_dir
        || stem.starts_with("test_")
        || stem.ends_with("_test")
        || stem.ends_with("_tests")
        || stem.ends_with("test") && name.ends_with(".java")
        || name == "conftest.py"
        || name.contains(".test.")
        || name.contains(".spec.")
}

/// File name without directories and extension.
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Dotted module path of a source file: `pkg/sub/mod.py` -> `pkg.sub.mod`,
/// `pkg/__init__.py` -> `pkg`.
pub fn module_name(path: &str) -> String {
    let without_ext = match path.rsplit_once('.') {
        Some((base, ext)) if !ext.contains('/') && !base.is_empty() && !base.ends_with('/') => base,
        _ => path,
    };
    let dotted = without_ext.replace('/', ".");
    match dotted.strip_suffix(".__init__") {
        Some(pkg) => pkg.to_string(),
        None if dotted == "__init__" => String::new(),
        None => dotted,
    }
}

/// An import path with `::` and `/` separators rewritten as dots.
pub fn dotted_import(import: &str) -> String {
    import.replace("::", ".").replace('/', ".")
}

/// Whether a raw import reference points at the file `target`.
///
/// Matches absolute dotted imports by module suffix (`app.db.models`
/// matches `src/app/db/models.py`), `from pkg import mod` forms, and
/// relative imports by their last segment. Slash and `::` paths are
/// compared in dotted form.
pub fn import_refers_to(import: &str, target: &str) -> bool {
    let target_module = module_name(target);
    if target_module.is_empty() {
        return false;
    }
    let import = dotted_import(import);
    let trimmed = import.trim_start_matches('.');
    if trimmed.is_empty() {
        return false;
    }
    let is_relative = import.starts_with('.');

    if trimmed == target_module || target_module.ends_with(&format!(".{}", trimmed)) {
        return true;
    }
    if is_relative {
        let last = trimmed.rsplit('.').next().unwrap_or(trimmed);
        return last == file_stem(target) || target_module.ends_with(&format!(".{}", last));
    }
    false
}

/// Convert an on-disk path under `root` to the `/`-separated relative form.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
