// Symbol table: global lookup of symbols by key and by bare name

use serde_json::Map;
use std::collections::HashMap;

use super::capture::{Capture, FunctionCapture};
use super::{Symbol, SymbolKey, SymbolKind, SymbolSet};

/// Build the symbols owned by one file from its capture.
///
/// Emits one symbol per top-level function, one per class and one per
/// method (`Class.method`). Items inside an inline module are prefixed with
/// its path (`tests.helper`). A qualified name defined twice in the same file
/// keeps the later definition, matching how the module would bind it.
pub fn from_capture(path: &str, capture: &Capture) -> Vec<Symbol> {
    let mut symbols: Vec<Symbol> = Vec::with_capacity(capture.symbol_count());

    for func in &capture.functions {
        symbols.push(callable_symbol(path, func, None));
    }

    for class in &capture.classes {
        let class_name = qualify(class.scope.as_deref(), &class.name);
        symbols.push(Symbol {
            name: class.name.clone(),
            qualified_name: class_name.clone(),
            kind: SymbolKind::Class,
            file: path.to_string(),
            line: class.line,
            end_line: class.end_line,
            signature: None,
            docstring: class.docstring.clone(),
            decorators: class.decorators.clone(),
            bases: class.bases.clone(),
            calls: Vec::new(),
            body_hash: None,
            extra: Map::new(),
        });
        for method in &class.methods {
            symbols.push(callable_symbol(path, method, Some(&class_name)));
        }
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<Symbol> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match seen.get(&symbol.qualified_name) {
            Some(&slot) => deduped[slot] = symbol,
            None => {
                seen.insert(symbol.qualified_name.clone(), deduped.len());
                deduped.push(symbol);
            }
        }
    }
    deduped
}

fn callable_symbol(path: &str, func: &FunctionCapture, class: Option<&str>) -> Symbol {
    let (kind, qualified_name) = match class {
        Some(class) => (SymbolKind::Method, format!("{}.{}", class, func.name)),
        None => (SymbolKind::Function, qualify(func.scope.as_deref(), &func.name)),
    };

    Symbol {
        name: func.name.clone(),
        qualified_name,
        kind,
        file: path.to_string(),
        line: func.line,
        end_line: func.end_line,
        signature: Some(func.signature.clone()),
        docstring: func.docstring.clone(),
        decorators: func.decorators.clone(),
        bases: Vec::new(),
        calls: func.calls.clone(),
        body_hash: func.body_hash.clone(),
        extra: Map::new(),
    }
}

fn qualify(scope: Option<&str>, name: &str) -> String {
    match scope {
        Some(scope) => format!("{}.{}", scope, name),
        None => name.to_string(),
    }
}

/// Read-only view over every symbol in an index.
pub struct SymbolTable<'a> {
    by_key: HashMap<SymbolKey, &'a Symbol>,
    by_bare_name: HashMap<&'a str, Vec<SymbolKey>>,
}

impl<'a> SymbolTable<'a> {
    pub fn build(symbols: &'a SymbolSet) -> Self {
        let mut by_key = HashMap::with_capacity(symbols.len());
        let mut by_bare_name: HashMap<&'a str, Vec<SymbolKey>> = HashMap::new();

        for symbol in symbols.iter() {
            let key = symbol.key();
            by_bare_name
                .entry(symbol.name.as_str())
                .or_default()
                .push(key.clone());
            by_key.insert(key, symbol);
        }

        for keys in by_bare_name.values_mut() {
            keys.sort();
            keys.dedup();
        }

        Self { by_key, by_bare_name }
    }

    pub fn get(&self, key: &SymbolKey) -> Option<&'a Symbol> {
        self.by_key.get(key).copied()
    }

    pub fn contains(&self, key: &SymbolKey) -> bool {
        self.by_key.contains_key(key)
    }

    /// All keys whose bare name is `name`, sorted.
    pub fn candidates(&self, name: &str) -> &[SymbolKey] {
        self.by_bare_name
            .get(name)
            .map(|keys| keys.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SymbolKey, &'a Symbol)> + '_ {
        self.by_key.iter().map(|(k, v)| (k, *v))
    }

    /// Resolve a user-supplied target: a full `file:qualified` key, a
    /// qualified name (`Class.method`) or a bare name.
    pub fn lookup(&self, target: &str) -> Vec<SymbolKey> {
        if let Some(key) = SymbolKey::parse(target) {
            if self.contains(&key) {
                return vec![key];
            }
        }

        let bare = target.rsplit('.').next().unwrap_or(target);
        let mut keys: Vec<SymbolKey> = self
            .candidates(bare)
            .iter()
            .filter(|k| !target.contains('.') || k.qualified_name == target)
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}
