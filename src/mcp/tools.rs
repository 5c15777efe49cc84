// MCP tool handlers

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::index::store;
use crate::mcp::McpContext;
use crate::query::{check_git, check_hashes, QueryEngine, QueryResult};

type Args = Map<String, Value>;

const DEFAULT_COUPLING_LIMIT: usize = 5;

fn text(body: String) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": body
        }]
    })
}

fn structured<T: Serialize>(value: &T) -> Result<Value> {
    Ok(text(serde_json::to_string_pretty(value)?))
}

fn required<'a>(args: &'a Args, name: &str) -> Result<&'a str> {
    args.get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("Missing {}", name))
}

fn wants_json(args: &Args) -> bool {
    args.get("format").and_then(|v| v.as_str()) == Some("json")
}

fn render_results(lines: &mut Vec<String>, results: &[QueryResult]) {
    for result in results {
        lines.push(format!(
            "  {}:{} - {} ({})",
            result.file, result.line, result.qualified_name, result.kind
        ));
    }
}

/// Callers, callees or tests of a symbol.
pub fn query(ctx: &McpContext, args: &Args) -> Result<Value> {
    let query_type = required(args, "query_type")?;
    let target = required(args, "target")?;

    let index = ctx.state.read();
    let engine = QueryEngine::new(&index, ctx.indexer.rules());

    let answer = match query_type {
        "callers" => engine.find_callers(target),
        "callees" => engine.find_callees(target),
        "tests" => {
            let reports = engine.tests_for(target);
            if wants_json(args) {
                return structured(&reports);
            }
            let mut lines = Vec::new();
            if reports.is_empty() {
                lines.push(format!("No symbol matches '{}'", target));
            }
            for report in reports {
                let key = report.symbol.map(|k| k.to_string()).unwrap_or_default();
                if report.test_files.is_empty() {
                    lines.push(format!("{}: no tests found", key));
                } else {
                    lines.push(format!("{}: {}", key, report.test_files.join(", ")));
                }
            }
            return Ok(text(lines.join("\n")));
        }
        _ => return Err(anyhow!("Unknown query type: {}", query_type)),
    };

    if wants_json(args) {
        return structured(&answer);
    }

    let mut lines = Vec::new();
    if answer.results.is_empty() {
        lines.push(format!("No {} found for '{}'", query_type, target));
    } else {
        lines.push(format!("Found {} {} of '{}':", answer.results.len(), query_type, target));
        render_results(&mut lines, &answer.results);
    }
    if !answer.external.is_empty() {
        lines.push(format!("External: {}", answer.external.join(", ")));
    }
    Ok(text(lines.join("\n")))
}

/// Blast radius of a change to one file.
pub fn impact(ctx: &McpContext, args: &Args) -> Result<Value> {
    let file = required(args, "file")?;
    let index = ctx.state.read();
    let engine = QueryEngine::new(&index, ctx.indexer.rules());
    let report = engine.impact(file);

    if wants_json(args) {
        return structured(&report);
    }

    let keys = |keys: &[crate::index::SymbolKey]| -> String {
        keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
    };
    let mut lines = vec![
        format!("Impact of changes to {}", report.file),
        format!("Direct callers ({}): {}", report.direct_callers.len(), keys(&report.direct_callers)),
        format!(
            "Transitive callers ({}): {}",
            report.transitive_callers.len(),
            keys(&report.transitive_callers)
        ),
        format!(
            "Affected tests ({}): {}",
            report.affected_tests.len(),
            report.affected_tests.join(", ")
        ),
    ];
    for endpoint in &report.affected_endpoints {
        lines.push(format!(
            "Endpoint {} {} -> {}:{}",
            endpoint.method, endpoint.path, endpoint.file, endpoint.handler
        ));
    }
    Ok(text(lines.join("\n")))
}

pub fn coupling(ctx: &McpContext, args: &Args) -> Result<Value> {
    let file = required(args, "file")?;
    let limit = args
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(DEFAULT_COUPLING_LIMIT);

    let index = ctx.state.read();
    let engine = QueryEngine::new(&index, ctx.indexer.rules());
    let partners = engine.coupled(file, limit);

    if wants_json(args) {
        return structured(&partners);
    }
    if partners.is_empty() {
        return Ok(text(format!("No files coupled with {}", file)));
    }
    let mut lines = vec![format!("Files coupled with {}:", file)];
    for partner in partners {
        lines.push(format!("  {:.3}  {}", partner.score, partner.file));
    }
    Ok(text(lines.join("\n")))
}

pub fn stats(ctx: &McpContext, args: &Args) -> Result<Value> {
    let index = ctx.state.read();
    let engine = QueryEngine::new(&index, ctx.indexer.rules());
    let stats = engine.stats();

    if wants_json(args) {
        return structured(&stats);
    }
    let c = stats.counts;
    Ok(text(format!(
        "Index Statistics:\n- Files: {}\n- Functions: {}\n- Classes: {}\n- Methods: {}\n- Call graph entries: {}\n- Endpoints: {}\n- Core symbols: {}\n- Execution flows: {}\n- Duplicate groups: {}\n- Generated: {}",
        c.files,
        c.functions,
        c.classes,
        c.methods,
        c.call_graph_entries,
        c.endpoints,
        stats.core_symbols,
        stats.flows,
        stats.duplicate_groups,
        stats.generated_at
    )))
}

/// Bring the shared index up to date with the working tree and save it.
pub async fn update(ctx: &McpContext, args: &Args) -> Result<Value> {
    let rebuild = args.get("rebuild").and_then(|v| v.as_bool()).unwrap_or(false);
    let indexer = ctx.indexer.clone();
    let state = ctx.state.clone();

    let report = tokio::task::spawn_blocking(move || -> Result<_> {
        let report = if rebuild {
            indexer.full_scan()?
        } else {
            let prior = state.read().clone();
            indexer.update(prior)?
        };
        let path = indexer.index_path();
        store::save(&report.index, &path)
            .with_context(|| format!("Failed to save index to {}", path.display()))?;
        let summary = (report.counts, report.warnings.len());
        *state.write() = report.index;
        Ok(summary)
    })
    .await
    .context("Update task panicked")??;

    let (counts, warnings) = report;
    Ok(text(format!(
        "Index updated: {} added, {} updated, {} deleted, {} unchanged ({} warnings)",
        counts.added, counts.updated, counts.deleted, counts.unchanged, warnings
    )))
}

/// Whether the shared index is behind the working tree.
pub async fn check(ctx: &McpContext, args: &Args) -> Result<Value> {
    let git = args.get("git").and_then(|v| v.as_bool()).unwrap_or(false);
    let indexer = ctx.indexer.clone();
    let index = ctx.state.read().clone();

    let report = tokio::task::spawn_blocking(move || {
        if git {
            check_git(&indexer, &index)
        } else {
            check_hashes(&indexer, &index)
        }
    })
    .await
    .context("Check task panicked")??;

    if wants_json(args) {
        return structured(&report);
    }
    if !report.stale {
        return Ok(text(format!("Index is up to date (generated {})", report.generated_at)));
    }
    Ok(text(format!(
        "Index is stale (generated {})\nAdded: {}\nChanged: {}\nDeleted: {}",
        report.generated_at,
        report.added.join(", "),
        report.changed.join(", "),
        report.deleted.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::indexer::Indexer;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write(root: &Path, path: &str, content: &str) {
        let full = root.join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }

    fn context(root: &Path) -> McpContext {
        write(root, "a.py", "from b import bar\n\ndef foo():\n    bar()\n");
        write(root, "b.py", "def bar():\n    pass\n");
        write(root, "tests/test_a.py", "from a import foo\n\ndef test_foo():\n    foo()\n");
        let indexer = Arc::new(Indexer::new(root, Config::default()));
        let report = indexer.full_scan().unwrap();
        McpContext::new(indexer, report.index)
    }

    fn args(value: Value) -> Args {
        value.as_object().unwrap().clone()
    }

    fn body(value: &Value) -> &str {
        value["content"][0]["text"].as_str().unwrap()
    }

    #[test]
    fn test_query_callers_text() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let result = query(&ctx, &args(json!({"query_type": "callers", "target": "bar"}))).unwrap();
        assert!(body(&result).starts_with("Found 1 callers of 'bar':"));
        assert!(body(&result).contains("a.py:3 - foo (function)"));
    }

    #[test]
    fn test_query_tests_json() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let result = query(
            &ctx,
            &args(json!({"query_type": "tests", "target": "b.py:bar", "format": "json"})),
        )
        .unwrap();
        let parsed: Value = serde_json::from_str(body(&result)).unwrap();
        assert_eq!(parsed[0]["testFiles"], json!(["tests/test_a.py"]));
    }

    #[test]
    fn test_query_rejects_unknown_type() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let err = query(&ctx, &args(json!({"query_type": "references", "target": "bar"}))).unwrap_err();
        assert!(err.to_string().contains("Unknown query type"));
        assert!(query(&ctx, &args(json!({"query_type": "callers"}))).is_err());
    }

    #[test]
    fn test_impact_lists_tests() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());
        let result = impact(&ctx, &args(json!({"file": "b.py"}))).unwrap();
        assert!(body(&result).contains("Direct callers (1): a.py:foo"));
        assert!(body(&result).contains("tests/test_a.py"));
    }

    #[tokio::test]
    async fn test_update_then_check() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path());

        let result = check(&ctx, &Args::new()).await.unwrap();
        assert!(body(&result).starts_with("Index is up to date"));

        write(dir.path(), "c.py", "def baz():\n    bar()\n");
        let result = check(&ctx, &args(json!({"format": "json"}))).await.unwrap();
        let parsed: Value = serde_json::from_str(body(&result)).unwrap();
        assert_eq!(parsed["stale"], json!(true));
        assert_eq!(parsed["added"], json!(["c.py"]));

        let result = update(&ctx, &Args::new()).await.unwrap();
        assert!(body(&result).starts_with("Index updated: 1 added, 0 updated, 0 deleted"));
        assert!(ctx.state.read().file("c.py").is_some());
        assert!(dir.path().join(".codeindex.json").exists());

        let result = check(&ctx, &Args::new()).await.unwrap();
        assert!(body(&result).starts_with("Index is up to date"));
    }
}
