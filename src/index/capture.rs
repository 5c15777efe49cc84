// Per-file extraction output shared by every language parser

use serde::{Deserialize, Serialize};

/// Whether a capture came from a full parse or a best-effort pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fidelity {
    #[default]
    Full,
    Degraded,
}

/// One function parameter as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_hint: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_default: bool,
}

/// Function or method signature.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_async: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionCapture {
    pub name: String,
    /// Enclosing inline module path (`tests`, `a.b`) for free items.
    pub scope: Option<String>,
    pub line: u32,
    pub end_line: Option<u32>,
    pub signature: Signature,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
    pub calls: Vec<String>,
    pub body_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassCapture {
    pub name: String,
    pub scope: Option<String>,
    pub line: u32,
    pub end_line: Option<u32>,
    pub bases: Vec<String>,
    pub docstring: Option<String>,
    pub decorators: Vec<String>,
    pub methods: Vec<FunctionCapture>,
}

/// A raw import reference: `import a.b` has module `a.b`, `from x import y`
/// has module `x` and names `[y]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportRef {
    pub module: String,
    pub names: Vec<String>,
    pub line: u32,
}

/// HTTP route detected from a decorator or registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteCapture {
    pub method: String,
    pub path: String,
    pub handler: String,
    pub line: u32,
}

/// Parser-specific metadata kept out of the core graph.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureExtras {
    pub routes: Vec<RouteCapture>,
}

/// Everything a parser extracts from one file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Capture {
    pub language: String,
    pub fidelity: Fidelity,
    pub functions: Vec<FunctionCapture>,
    pub classes: Vec<ClassCapture>,
    pub imports: Vec<ImportRef>,
    /// Calls made at module level, outside any function or class.
    pub module_calls: Vec<String>,
    /// The file runs code under `if __name__ == "__main__":`.
    pub has_main_guard: bool,
    /// Calls made inside that guard.
    pub main_calls: Vec<String>,
    pub extras: CaptureExtras,
}

impl Capture {
    pub fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Default::default()
        }
    }

    /// An empty capture standing in for a file that could not be parsed.
    pub fn failed(language: &str) -> Self {
        Self {
            language: language.to_string(),
            fidelity: Fidelity::Degraded,
            ..Default::default()
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.fidelity == Fidelity::Degraded
    }

    pub fn symbol_count(&self) -> usize {
        self.functions.len()
            + self.classes.len()
            + self.classes.iter().map(|c| c.methods.len()).sum::<usize>()
    }
}

/// Append `call` unless it was already recorded, keeping first-seen order.
pub fn push_call(calls: &mut Vec<String>, call: String) {
    if !call.is_empty() && !calls.contains(&call) {
        calls.push(call);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_call_dedupes_in_order() {
        let mut calls = Vec::new();
        push_call(&mut calls, "bar".to_string());
        push_call(&mut calls, "self.save".to_string());
        push_call(&mut calls, "bar".to_string());
        push_call(&mut calls, String::new());
        assert_eq!(calls, vec!["bar", "self.save"]);
    }

    #[test]
    fn test_symbol_count() {
        let mut capture = Capture::new("python");
        capture.functions.push(FunctionCapture {
            name: "foo".to_string(),
            line: 1,
            ..Default::default()
        });
        capture.classes.push(ClassCapture {
            name: "Foo".to_string(),
            line: 3,
            methods: vec![FunctionCapture {
                name: "bar".to_string(),
                line: 4,
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(capture.symbol_count(), 3);
        assert!(!capture.is_degraded());
        assert!(Capture::failed("python").is_degraded());
    }
}
