// Go parser using tree-sitter

use tree_sitter::Node;

use super::{body_hash, end_line, field_text, leading_doc_comment, node_text, parse_tree, squash, start_line, LanguageParser};
use crate::index::capture::{push_call, ClassCapture, FunctionCapture, ImportRef};
use crate::index::{Capture, Fidelity, Param, Signature};

/// Go parser: functions, named types as classes, receiver methods attached
/// to their type.
#[derive(Default)]
pub struct GoParser;

impl GoParser {
    pub fn new() -> Self {
        Self
    }

    fn extract(&self, root: Node, source: &[u8]) -> Capture {
        let mut capture = Capture::new("go");
        let mut methods: Vec<(String, FunctionCapture, u32)> = Vec::new();

        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration" => {
                    let func = self.extract_function(child, source);
                    capture.functions.push(func);
                }
                "method_declaration" => {
                    if let Some(receiver) = child.child_by_field_name("receiver").and_then(|r| receiver_type(r, source)) {
                        let method = self.extract_function(child, source);
                        methods.push((receiver, method, start_line(child)));
                    }
                }
                "type_declaration" => {
                    let mut inner = child.walk();
                    for spec in child.named_children(&mut inner) {
                        if spec.kind() == "type_spec" {
                            capture.classes.push(self.extract_type(spec, child, source));
                        }
                    }
                }
                "import_declaration" => collect_imports(child, source, &mut capture.imports),
                _ => {}
            }
        }

        for (receiver, method, line) in methods {
            match capture.classes.iter_mut().find(|c| c.name == receiver) {
                Some(class) => class.methods.push(method),
                None => capture.classes.push(ClassCapture {
                    name: receiver,
                    line,
                    end_line: method.end_line,
                    methods: vec![method],
                    ..Default::default()
                }),
            }
        }

        capture
    }

    fn extract_function(&self, node: Node, source: &[u8]) -> FunctionCapture {
        let mut func = FunctionCapture {
            name: field_text(node, "name", source).unwrap_or_default(),
            line: start_line(node),
            end_line: end_line(node),
            signature: Signature {
                params: node
                    .child_by_field_name("parameters")
                    .map(|p| extract_params(p, source))
                    .unwrap_or_default(),
                return_type: node
                    .child_by_field_name("result")
                    .map(|n| squash(node_text(n, source))),
                is_async: false,
            },
            docstring: leading_doc_comment(node, source, "//"),
            ..Default::default()
        };

        if let Some(body) = node.child_by_field_name("body") {
            func.body_hash = body_hash(body, source, None);
            collect_calls(body, source, &mut func.calls);
        }
        func
    }

    fn extract_type(&self, spec: Node, declaration: Node, source: &[u8]) -> ClassCapture {
        let mut class = ClassCapture {
            name: field_text(spec, "name", source).unwrap_or_default(),
            line: start_line(spec),
            end_line: end_line(spec),
            docstring: leading_doc_comment(declaration, source, "//"),
            ..Default::default()
        };

        // Embedded fields and interfaces act as bases
        if let Some(ty) = spec.child_by_field_name("type") {
            let mut stack = vec![ty];
            while let Some(node) = stack.pop() {
                match node.kind() {
                    "field_declaration" if node.child_by_field_name("name").is_none() => {
                        if let Some(t) = node.child_by_field_name("type") {
                            class.bases.push(node_text(t, source).trim_start_matches('*').to_string());
                        }
                    }
                    "type_elem" => class.bases.push(squash(node_text(node, source))),
                    "struct_type" | "interface_type" | "field_declaration_list" => {
                        let mut cursor = node.walk();
                        let children: Vec<Node> = node.named_children(&mut cursor).collect();
                        stack.extend(children.into_iter().rev());
                    }
                    _ => {}
                }
            }
        }
        class
    }
}

impl LanguageParser for GoParser {
    fn language(&self) -> &str {
        "go"
    }

    fn extensions(&self) -> &[&str] {
        &["go"]
    }

    fn scan(&self, source: &[u8]) -> anyhow::Result<Capture> {
        let tree = parse_tree(tree_sitter_go::LANGUAGE.into(), source, "Go")?;
        let root = tree.root_node();
        let mut capture = self.extract(root, source);
        if root.has_error() {
            capture.fidelity = Fidelity::Degraded;
        }
        Ok(capture)
    }
}

/// Type name of a method receiver: `(s *Store)` -> `Store`, `(l List[T])` -> `List`.
fn receiver_type(receiver: Node, source: &[u8]) -> Option<String> {
    let mut cursor = receiver.walk();
    let param = receiver
        .named_children(&mut cursor)
        .find(|c| c.kind() == "parameter_declaration")?;
    let text = node_text(param.child_by_field_name("type")?, source);
    let name = text.trim_start_matches('*');
    let name = name.split('[').next().unwrap_or(name).trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn extract_params(params: Node, source: &[u8]) -> Vec<Param> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if !matches!(param.kind(), "parameter_declaration" | "variadic_parameter_declaration") {
            continue;
        }
        let type_hint = param.child_by_field_name("type").map(|t| {
            let ty = squash(node_text(t, source));
            if param.kind() == "variadic_parameter_declaration" {
                format!("...{}", ty)
            } else {
                ty
            }
        });

        let mut names_cursor = param.walk();
        let names: Vec<String> = param
            .children_by_field_name("name", &mut names_cursor)
            .map(|n| node_text(n, source).to_string())
            .collect();
        if names.is_empty() {
            // Unnamed parameter: only the type is known
            out.push(Param {
                name: "_".to_string(),
                type_hint,
                has_default: false,
            });
            continue;
        }
        for name in names {
            out.push(Param {
                name,
                type_hint: type_hint.clone(),
                has_default: false,
            });
        }
    }
    out
}

fn collect_imports(node: Node, source: &[u8], imports: &mut Vec<ImportRef>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "import_spec" {
            if let Some(path) = current.child_by_field_name("path") {
                let raw = node_text(path, source).trim_matches(['"', '`']);
                imports.push(ImportRef {
                    module: raw.to_string(),
                    names: Vec::new(),
                    line: start_line(current),
                });
            }
            continue;
        }
        let mut cursor = current.walk();
        let children: Vec<Node> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn collect_calls(node: Node, source: &[u8], calls: &mut Vec<String>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "call_expression" {
            if let Some(callee) = current.child_by_field_name("function").and_then(|f| callee_chain(f, source)) {
                push_call(calls, callee);
            }
        }
        let mut cursor = current.walk();
        let children: Vec<Node> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

fn callee_chain(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" => Some(node_text(node, source).to_string()),
        "selector_expression" => {
            let field = node_text(node.child_by_field_name("field")?, source);
            match node.child_by_field_name("operand").and_then(|o| callee_chain(o, source)) {
                Some(operand) => Some(format!("{}.{}", operand, field)),
                None => Some(field.to_string()),
            }
        }
        "index_expression" | "generic_type" => node
            .child_by_field_name("operand")
            .or_else(|| node.child_by_field_name("type"))
            .and_then(|o| callee_chain(o, source)),
        "parenthesized_expression" => {
            let mut cursor = node.walk();
            let inner = node.named_children(&mut cursor).next();
            inner.and_then(|i| callee_chain(i, source))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Capture {
        GoParser::new().scan(src.as_bytes()).unwrap()
    }

    #[test]
    fn test_go_extraction() {
        let capture = scan(
            r#"package main

import (
    "fmt"
    store "github.com/acme/app/internal/store"
)

// Server handles requests.
type Server struct {
    *Base
    db store.DB
}

// Run starts the server.
func (s *Server) Run(addr string, opts ...Option) error {
    s.db.Open()
    fmt.Println("listening", addr)
    return serve(addr)
}

func main() {
    s := NewServer()
    s.Run(":8080")
}
"#,
        );

        let modules: Vec<&str> = capture.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["fmt", "github.com/acme/app/internal/store"]);

        assert_eq!(capture.functions.len(), 1);
        assert_eq!(capture.functions[0].calls, vec!["NewServer", "s.Run"]);

        let server = &capture.classes[0];
        assert_eq!(server.name, "Server");
        assert_eq!(server.docstring.as_deref(), Some("Server handles requests."));
        assert_eq!(server.bases, vec!["Base"]);
        let run = &server.methods[0];
        assert_eq!(run.name, "Run");
        assert_eq!(run.docstring.as_deref(), Some("Run starts the server."));
        assert_eq!(run.calls, vec!["s.db.Open", "fmt.Println", "serve"]);
        assert_eq!(run.signature.params[1].type_hint.as_deref(), Some("...Option"));
        assert_eq!(run.signature.return_type.as_deref(), Some("error"));
    }

    #[test]
    fn test_go_params_named_and_unnamed() {
        let capture = scan("package main\n\nfunc pair(a, b int) {}\n\nfunc handler(string, *Request) {}\n");
        let pair = &capture.functions[0].signature.params;
        let names: Vec<&str> = pair.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(pair.iter().all(|p| p.type_hint.as_deref() == Some("int")));

        let handler = &capture.functions[1].signature.params;
        assert_eq!(handler.len(), 2);
        assert_eq!(handler[0].name, "_");
        assert_eq!(handler[0].type_hint.as_deref(), Some("string"));
        assert_eq!(handler[1].type_hint.as_deref(), Some("*Request"));
    }
}
