// Heuristic call resolution by bare name

use crate::index::{SymbolKey, SymbolSet, SymbolTable};

/// Outcome of resolving one raw call expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Resolution {
    /// A live symbol in the index.
    Resolved(SymbolKey),
    /// No indexed symbol matched; carries the raw call text.
    External(String),
}

impl Resolution {
    pub fn key(&self) -> Option<&SymbolKey> {
        match self {
            Resolution::Resolved(key) => Some(key),
            Resolution::External(_) => None,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Resolution::External(_))
    }
}

/// Syntactic resolver. No scopes or imports are consulted: a call binds to
/// a symbol with the same bare name, preferring the caller's own file and
/// otherwise the lexicographically first candidate.
pub struct CallResolver<'a> {
    table: SymbolTable<'a>,
}

impl<'a> CallResolver<'a> {
    pub fn new(symbols: &'a SymbolSet) -> Self {
        Self {
            table: SymbolTable::build(symbols),
        }
    }

    pub fn table(&self) -> &SymbolTable<'a> {
        &self.table
    }

    pub fn resolve(&self, caller_file: &str, raw: &str) -> Resolution {
        let name = bare_call_name(raw);
        let candidates = self.table.candidates(name);

        // Callables first; a class name only binds when nothing callable
        // matches (constructor call).
        let callable: Vec<&SymbolKey> = candidates
            .iter()
            .filter(|k| self.table.get(k).map(|s| s.kind.is_callable()).unwrap_or(false))
            .collect();
        let pool: Vec<&SymbolKey> = if callable.is_empty() {
            candidates.iter().collect()
        } else {
            callable
        };

        let chosen = pool
            .iter()
            .find(|k| k.file == caller_file)
            .or_else(|| pool.first());

        match chosen {
            Some(key) => Resolution::Resolved((*key).clone()),
            None => Resolution::External(raw.to_string()),
        }
    }
}

/// The probable function name of a call: its last dotted segment.
pub fn bare_call_name(raw: &str) -> &str {
    raw.rsplit('.').next().unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolKind;
    use crate::test_support::symbol;

    fn set(symbols: Vec<crate::index::Symbol>) -> SymbolSet {
        let mut set = SymbolSet::default();
        for s in symbols {
            set.push(s);
        }
        set
    }

    #[test]
    fn test_same_file_wins() {
        let symbols = set(vec![
            symbol("a.py", "save", SymbolKind::Function, 1),
            symbol("b.py", "save", SymbolKind::Function, 1),
        ]);
        let resolver = CallResolver::new(&symbols);
        assert_eq!(
            resolver.resolve("b.py", "save"),
            Resolution::Resolved(SymbolKey::new("b.py", "save"))
        );
        // No same-file candidate: deterministic first key
        assert_eq!(
            resolver.resolve("c.py", "self.store.save"),
            Resolution::Resolved(SymbolKey::new("a.py", "save"))
        );
    }

    #[test]
    fn test_methods_resolve_by_bare_name() {
        let symbols = set(vec![symbol("db.py", "Repo.save", SymbolKind::Method, 2)]);
        let resolver = CallResolver::new(&symbols);
        assert_eq!(
            resolver.resolve("svc.py", "self.repo.save"),
            Resolution::Resolved(SymbolKey::new("db.py", "Repo.save"))
        );
    }

    #[test]
    fn test_class_only_when_nothing_callable() {
        let symbols = set(vec![
            symbol("models.py", "User", SymbolKind::Class, 1),
            symbol("factory.py", "User", SymbolKind::Function, 1),
        ]);
        let resolver = CallResolver::new(&symbols);
        assert_eq!(
            resolver.resolve("models.py", "User"),
            Resolution::Resolved(SymbolKey::new("factory.py", "User"))
        );

        let only_class = set(vec![symbol("models.py", "User", SymbolKind::Class, 1)]);
        let resolver = CallResolver::new(&only_class);
        assert_eq!(
            resolver.resolve("api.py", "User"),
            Resolution::Resolved(SymbolKey::new("models.py", "User"))
        );
    }

    #[test]
    fn test_unknown_is_external() {
        let symbols = set(vec![symbol("a.py", "foo", SymbolKind::Function, 1)]);
        let resolver = CallResolver::new(&symbols);
        let resolution = resolver.resolve("a.py", "json.dumps");
        assert_eq!(resolution, Resolution::External("json.dumps".to_string()));
        assert!(resolution.is_external());
        assert_eq!(resolution.key(), None);
    }
}
