// Incremental update: re-parse changed files and merge into a prior index

use std::collections::{BTreeSet, HashMap};
use std::io::ErrorKind;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{merge_parsed, walker, Indexer, ScanReport};
use crate::error::{IndexError, Result};
use crate::index::{Index, UpdateCounts};

/// Fingerprint of one on-disk file.
enum Fingerprint {
    Hash(String),
    Vanished,
    Unreadable(IndexError),
}

/// How a path changed since the prior index.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn counts(&self) -> UpdateCounts {
        UpdateCounts {
            added: self.added.len(),
            updated: self.updated.len(),
            deleted: self.deleted.len(),
            unchanged: self.unchanged.len(),
        }
    }
}

impl Indexer {
    /// Compare the files on disk with `prior` without touching it.
    pub fn detect_changes(&self, prior: &Index, warnings: &mut Vec<IndexError>) -> Result<ChangeSet> {
        let on_disk = self.discover(warnings);
        let fingerprints = self.run_parallel(&on_disk, "Hashing", |path| {
            match std::fs::read(self.root().join(path)) {
                Ok(bytes) => Fingerprint::Hash(walker::content_hash(&bytes)),
                Err(e) if e.kind() == ErrorKind::NotFound => Fingerprint::Vanished,
                Err(source) => Fingerprint::Unreadable(IndexError::UnreadableFile {
                    path: self.root().join(path),
                    source,
                }),
            }
        })?;

        let prior_hashes: HashMap<&str, &str> = prior
            .files
            .iter()
            .map(|f| (f.path.as_str(), f.content_hash.as_str()))
            .collect();

        let mut changes = ChangeSet::default();
        let mut present: BTreeSet<&str> = BTreeSet::new();
        for (path, fingerprint) in on_disk.iter().zip(fingerprints) {
            let previous = prior_hashes.get(path.as_str()).copied();
            match fingerprint {
                Fingerprint::Hash(hash) => {
                    present.insert(path.as_str());
                    match previous {
                        None => changes.added.push(path.clone()),
                        Some(old) if old == hash => changes.unchanged.push(path.clone()),
                        Some(_) => changes.updated.push(path.clone()),
                    }
                }
                Fingerprint::Vanished => {}
                Fingerprint::Unreadable(e) => {
                    warn!("{}", e);
                    warnings.push(e);
                    // Keep what we knew rather than dropping the file
                    if previous.is_some() {
                        present.insert(path.as_str());
                        changes.unchanged.push(path.clone());
                    }
                }
            }
        }

        for file in &prior.files {
            if present.contains(file.path.as_str()) {
                continue;
            }
            if self.registry().for_path(&file.path).is_none() {
                debug!("Retaining {} (no parser registered)", file.path);
                continue;
            }
            changes.deleted.push(file.path.clone());
        }

        Ok(changes)
    }

    /// Bring `prior` up to date with the files on disk. Only added and
    /// updated files are parsed; records of unchanged files, including
    /// fields written by other tools, are carried over untouched.
    pub fn update(&self, mut index: Index) -> Result<ScanReport> {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let mut changes = self.detect_changes(&index, &mut warnings)?;
        info!(
            "Changes: {} added, {} updated, {} deleted, {} unchanged",
            changes.added.len(),
            changes.updated.len(),
            changes.deleted.len(),
            changes.unchanged.len()
        );

        let to_parse: Vec<String> = changes
            .added
            .iter()
            .chain(changes.updated.iter())
            .cloned()
            .collect();
        let outcomes = self.parse_all(&to_parse)?;

        for path in changes.updated.iter().chain(changes.deleted.iter()) {
            index.remove_file(path);
        }

        let mut rebuilt = BTreeSet::new();
        for outcome in outcomes {
            if let Some(warning) = outcome.warning {
                warn!("{}", warning);
                warnings.push(warning);
            }
            match outcome.parsed {
                Some(parsed) => {
                    debug!("Re-parsed {}", parsed.path);
                    rebuilt.insert(parsed.path.clone());
                    merge_parsed(&mut index, parsed);
                }
                None => {
                    // Gone (or unreadable) between hashing and parsing
                    let path = outcome.path;
                    changes.added.retain(|p| *p != path);
                    if let Some(pos) = changes.updated.iter().position(|p| *p == path) {
                        changes.updated.remove(pos);
                        changes.deleted.push(path);
                    }
                }
            }
        }

        let counts = changes.counts();
        index.meta.last_update = counts;
        self.finish(&mut index, &rebuilt);

        info!("Index updated in {:?}", start.elapsed());
        Ok(ScanReport {
            index,
            warnings,
            counts,
        })
    }
}
