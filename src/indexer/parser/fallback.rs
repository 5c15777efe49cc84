// Line-oriented regex pass for Python files tree-sitter cannot parse

use once_cell::sync::Lazy;
use regex::Regex;

use crate::index::capture::{push_call, ClassCapture, FunctionCapture, ImportRef};
use crate::index::{Capture, Fidelity, Param};

static DECORATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*@(.+?)\s*$").expect("valid regex"));
static DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\s*)(async\s+)?def\s+([A-Za-z_]\w*)\s*\(([^)]*)\)?(?:\s*->\s*([^:]+))?").expect("valid regex")
});
static CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^class\s+([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*:").expect("valid regex"));
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*import\s+([\w\.]+)").expect("valid regex"));
static FROM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*from\s+([\w\.]+)\s+import\s+\(?([^)#]+)").expect("valid regex"));
static MAIN_GUARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^if\s+__name__\s*==\s*['"]__main__['"]"#).expect("valid regex"));
static CALL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Za-z_][\w\.]*)\s*\(").expect("valid regex"));
static DEFINES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:async\s+)?(?:def|class)\s+([A-Za-z_]\w*)").expect("valid regex"));

const KEYWORDS: &[&str] = &[
    "if", "elif", "while", "for", "return", "def", "class", "and", "or", "not", "in", "is", "with",
    "assert", "yield", "await", "lambda", "except", "raise", "del", "print",
];

enum Open {
    Function(usize),
    Method(usize, usize),
}

/// Best-effort capture: functions, classes, methods, imports and calls
/// recovered by indentation. Always tagged degraded.
pub fn scan_python(source: &[u8]) -> Capture {
    let text = String::from_utf8_lossy(source);
    let mut capture = Capture::new("python");
    capture.fidelity = Fidelity::Degraded;

    let mut class: Option<(usize, usize)> = None;
    let mut open: Option<(usize, Open)> = None;
    let mut decorators: Vec<String> = Vec::new();
    let mut in_main = false;

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx as u32 + 1;
        let trimmed = raw.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = raw.len() - trimmed.len();
        if indent == 0 {
            in_main = false;
        }

        if matches!(open, Some((level, _)) if indent <= level) {
            open = None;
        }
        if matches!(class, Some((level, _)) if indent <= level) {
            class = None;
        }

        if let Some(caps) = DECORATOR_RE.captures(raw) {
            decorators.push(caps[1].to_string());
            continue;
        }

        if let Some(caps) = DEF_RE.captures(raw) {
            if open.is_none() {
                let func = FunctionCapture {
                    name: caps[3].to_string(),
                    line: line_no,
                    end_line: Some(line_no),
                    signature: crate::index::Signature {
                        params: parse_params(caps.get(4).map_or("", |m| m.as_str())),
                        return_type: caps.get(5).map(|m| m.as_str().trim().to_string()),
                        is_async: caps.get(2).is_some(),
                    },
                    decorators: std::mem::take(&mut decorators),
                    ..Default::default()
                };
                match class {
                    Some((level, class_idx)) if indent > level => {
                        let methods = &mut capture.classes[class_idx].methods;
                        methods.push(func);
                        open = Some((indent, Open::Method(class_idx, methods.len() - 1)));
                    }
                    _ if indent == 0 => {
                        capture.functions.push(func);
                        open = Some((indent, Open::Function(capture.functions.len() - 1)));
                    }
                    _ => {}
                }
                continue;
            }
        }
        decorators.clear();

        if indent == 0 {
            if let Some(caps) = CLASS_RE.captures(raw) {
                capture.classes.push(ClassCapture {
                    name: caps[1].to_string(),
                    line: line_no,
                    end_line: Some(line_no),
                    bases: caps
                        .get(2)
                        .map(|m| {
                            m.as_str()
                                .split(',')
                                .map(str::trim)
                                .filter(|b| !b.is_empty() && !b.contains('='))
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                    ..Default::default()
                });
                class = Some((0, capture.classes.len() - 1));
                continue;
            }
            if MAIN_GUARD_RE.is_match(raw) {
                capture.has_main_guard = true;
                in_main = true;
                continue;
            }
        }

        if let Some(caps) = FROM_RE.captures(raw) {
            capture.imports.push(ImportRef {
                module: caps[1].to_string(),
                names: caps[2]
                    .split(',')
                    .filter_map(|n| n.split_whitespace().next())
                    .filter(|n| *n != "*")
                    .map(str::to_string)
                    .collect(),
                line: line_no,
            });
            continue;
        }
        if let Some(caps) = IMPORT_RE.captures(raw) {
            capture.imports.push(ImportRef {
                module: caps[1].to_string(),
                names: Vec::new(),
                line: line_no,
            });
            continue;
        }

        let target = match &open {
            Some((_, Open::Function(i))) => {
                let func = &mut capture.functions[*i];
                func.end_line = Some(line_no);
                Some(&mut func.calls)
            }
            Some((_, Open::Method(c, m))) => {
                let method = &mut capture.classes[*c].methods[*m];
                method.end_line = Some(line_no);
                Some(&mut method.calls)
            }
            None if class.is_none() => Some(&mut capture.module_calls),
            None => None,
        };
        let guarded = in_main && open.is_none() && class.is_none();
        if let Some(calls) = target {
            // a nested `def name(` names a definition, not a call
            let defined = DEFINES_RE.captures(trimmed).map(|caps| caps[1].to_string());
            for caps in CALL_RE.captures_iter(code_part(trimmed)) {
                let callee = &caps[1];
                if KEYWORDS.contains(&callee) || defined.as_deref() == Some(callee) {
                    continue;
                }
                push_call(calls, callee.to_string());
                if guarded {
                    push_call(&mut capture.main_calls, callee.to_string());
                }
            }
        }
        if let Some((_, class_idx)) = class {
            capture.classes[class_idx].end_line = Some(line_no);
        }
    }

    capture
}

/// The line up to a trailing comment, ignoring `#` inside quotes.
fn code_part(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match (quote, c) {
            (None, '#') => return &line[..i],
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            _ => {}
        }
    }
    line
}

fn parse_params(raw: &str) -> Vec<Param> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty() && *p != "/" && *p != "*")
        .map(|p| {
            let (head, has_default) = match p.split_once('=') {
                Some((head, _)) => (head.trim(), true),
                None => (p, false),
            };
            let (name, type_hint) = match head.split_once(':') {
                Some((name, ty)) => (name.trim(), Some(ty.trim().to_string())),
                None => (head, None),
            };
            Param {
                name: name.to_string(),
                type_hint,
                has_default,
            }
        })
        .filter(|p| !p.name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovers_structure() {
        let src = r#"
import os
from app.db import models, session

@decorated
def ok(a, b: int = 2):
    helper()  # trailing(comment)
    os.path.join("x", "y")

class Broken(Base):
    def method(self):
        self.save(

def after(:
    pass

if __name__ == "__main__":
    ok()
"#;
        let capture = scan_python(src.as_bytes());
        assert!(capture.is_degraded());
        assert_eq!(capture.imports.len(), 2);
        assert_eq!(capture.imports[1].names, vec!["models", "session"]);

        let ok = &capture.functions[0];
        assert_eq!(ok.name, "ok");
        assert_eq!(ok.decorators, vec!["decorated"]);
        assert_eq!(ok.calls, vec!["helper", "os.path.join"]);
        assert_eq!(ok.signature.params[1].type_hint.as_deref(), Some("int"));
        assert!(ok.signature.params[1].has_default);

        assert_eq!(capture.classes[0].bases, vec!["Base"]);
        assert_eq!(capture.classes[0].methods[0].name, "method");
        assert_eq!(capture.classes[0].methods[0].calls, vec!["self.save"]);

        assert!(capture.functions.iter().any(|f| f.name == "after"));
        assert!(capture.has_main_guard);
        assert_eq!(capture.module_calls, vec!["ok"]);
    }

    #[test]
    fn test_nested_definitions_are_not_calls() {
        let src = "def outer():\n    def inner(x):\n        return x\n    class Local(Base):\n        pass\n    return inner(1)\n\nsetup()\nif __name__ == '__main__':\n    outer()\nteardown()\n";
        let capture = scan_python(src.as_bytes());
        assert_eq!(capture.functions.len(), 1);
        assert_eq!(capture.functions[0].calls, vec!["inner"]);
        assert_eq!(capture.functions[0].end_line, Some(6));
        assert_eq!(capture.main_calls, vec!["outer"]);
        assert_eq!(capture.module_calls, vec!["setup", "outer", "teardown"]);
    }
}
