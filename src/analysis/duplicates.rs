// Structurally identical bodies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::index::{SymbolKey, SymbolSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    pub body_hash: String,
    pub symbols: Vec<SymbolKey>,
}

/// Groups of two or more symbols sharing a body hash, largest first.
pub fn find(symbols: &SymbolSet) -> Vec<DuplicateGroup> {
    let mut by_hash: BTreeMap<&str, Vec<SymbolKey>> = BTreeMap::new();
    for symbol in symbols.iter() {
        if let Some(hash) = symbol.body_hash.as_deref() {
            by_hash.entry(hash).or_default().push(symbol.key());
        }
    }

    let mut groups: Vec<DuplicateGroup> = by_hash
        .into_iter()
        .filter(|(_, keys)| keys.len() >= 2)
        .map(|(hash, mut keys)| {
            keys.sort();
            DuplicateGroup {
                body_hash: hash.to_string(),
                symbols: keys,
            }
        })
        .collect();
    groups.sort_by(|a, b| {
        b.symbols
            .len()
            .cmp(&a.symbols.len())
            .then_with(|| a.body_hash.cmp(&b.body_hash))
    });
    groups
}
