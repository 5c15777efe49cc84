use anyhow::Result;

use super::{load_index, open_project, print_json, OutputFormat};
use crate::query::{check_git, check_hashes, CheckMethod};

/// Report whether the stored index is behind the working tree.
/// Returns `true` when it is stale.
pub async fn check_index(project: String, git: bool, format: OutputFormat) -> Result<bool> {
    let indexer = open_project(&project)?;
    let index = load_index(&indexer)?;

    let report = if git {
        check_git(&indexer, &index)?
    } else {
        check_hashes(&indexer, &index)?
    };

    if format == OutputFormat::Json {
        print_json(&report)?;
        return Ok(report.stale);
    }

    let method = match report.method {
        CheckMethod::Hash => "content hashes",
        CheckMethod::Git => "git history",
    };
    if !report.stale {
        println!("Index is up to date ({}, generated {})", method, report.generated_at);
        return Ok(false);
    }

    println!("Index is stale ({}, generated {})", method, report.generated_at);
    for (label, paths) in [("Added", &report.added), ("Changed", &report.changed), ("Deleted", &report.deleted)] {
        if paths.is_empty() {
            continue;
        }
        println!("{} ({}):", label, paths.len());
        for path in paths {
            println!("  {}", path);
        }
    }
    println!("\nRun 'codeindex index --update --project {}' to refresh.", project);
    Ok(true)
}
