// JSON persistence for the index document

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use super::Index;
use crate::error::{IndexError, Result};

/// Top-level fields every index document must carry.
const REQUIRED_FIELDS: &[(&str, &str)] = &[
    ("meta", "object"),
    ("files", "array"),
    ("symbols", "object"),
    ("callGraph", "object"),
];

/// Load an index, failing fast on structurally invalid documents.
pub fn load(path: &Path) -> Result<Index> {
    let raw = fs::read_to_string(path)?;
    let index = from_str(&raw)?;
    info!(
        "Loaded index from {} ({} files, {} symbols)",
        path.display(),
        index.files.len(),
        index.symbols.len()
    );
    Ok(index)
}

/// Load an index if one exists at `path`.
pub fn load_if_exists(path: &Path) -> Result<Option<Index>> {
    if !path.exists() {
        debug!("No index at {}", path.display());
        return Ok(None);
    }
    load(path).map(Some)
}

pub fn from_str(raw: &str) -> Result<Index> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| IndexError::IndexCorrupt(format!("not valid JSON: {}", e)))?;
    validate(&value)?;
    serde_json::from_value(value).map_err(|e| IndexError::IndexCorrupt(e.to_string()))
}

/// Check the document shape before deserializing it.
pub fn validate(value: &Value) -> Result<()> {
    let object = value
        .as_object()
        .ok_or_else(|| IndexError::IndexCorrupt("top level is not an object".to_string()))?;

    for (field, expected) in REQUIRED_FIELDS {
        let present = match object.get(*field) {
            Some(Value::Object(_)) => *expected == "object",
            Some(Value::Array(_)) => *expected == "array",
            Some(_) => false,
            None => {
                return Err(IndexError::IndexCorrupt(format!(
                    "missing required field '{}'",
                    field
                )))
            }
        };
        if !present {
            return Err(IndexError::IndexCorrupt(format!(
                "field '{}' must be an {}",
                field, expected
            )));
        }
    }

    for field in ["generatedAt", "root"] {
        if object["meta"].get(field).and_then(Value::as_str).is_none() {
            return Err(IndexError::IndexCorrupt(format!("meta.{} is missing", field)));
        }
    }

    Ok(())
}

/// Write the index atomically: serialize to a sibling temp file, then rename.
pub fn save(index: &Index, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(index)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    info!("Saved index to {} ({} bytes)", path.display(), json.len());
    Ok(())
}
