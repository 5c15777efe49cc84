// Python parser using tree-sitter

use regex::Regex;
use tree_sitter::Node;

use super::{body_hash, end_line, field_text, fallback, node_text, parse_tree, squash, start_line, LanguageParser};
use crate::config::AnalysisConfig;
use crate::error::IndexError;
use crate::index::capture::{push_call, ClassCapture, FunctionCapture, ImportRef, RouteCapture};
use crate::index::{Capture, Param, Signature};

/// Python parser with configurable HTTP route detection.
pub struct PythonParser {
    route_patterns: Vec<Regex>,
}

impl Default for PythonParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PythonParser {
    pub fn new() -> Self {
        Self::with_route_patterns(&AnalysisConfig::default().route_patterns, &mut Vec::new())
    }

    /// Compile route rules; a malformed rule is skipped and reported.
    pub fn with_route_patterns(patterns: &[String], warnings: &mut Vec<IndexError>) -> Self {
        let mut route_patterns = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            match Regex::new(pattern) {
                Ok(re) => route_patterns.push(re),
                Err(e) => {
                    tracing::warn!("Skipping invalid route pattern '{}': {}", pattern, e);
                    warnings.push(IndexError::ConfigInvalid {
                        rule: pattern.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Self { route_patterns }
    }

    fn extract(&self, root: Node, source: &[u8]) -> Capture {
        let mut capture = Capture::new("python");
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            self.visit_top_level(child, source, &mut capture);
        }
        capture
    }

    fn visit_top_level(&self, node: Node, source: &[u8], capture: &mut Capture) {
        match node.kind() {
            "function_definition" => {
                let func = self.extract_function(node, source, Vec::new());
                capture.functions.push(func);
            }
            "class_definition" => {
                let class = self.extract_class(node, source, Vec::new(), capture);
                capture.classes.push(class);
            }
            "decorated_definition" => {
                let decorators = decorators_of(node, source);
                if let Some(definition) = node.child_by_field_name("definition") {
                    match definition.kind() {
                        "function_definition" => {
                            let func = self.extract_function(definition, source, decorators);
                            self.collect_routes(&func, &func.name, capture);
                            capture.functions.push(func);
                        }
                        "class_definition" => {
                            let class = self.extract_class(definition, source, decorators, capture);
                            capture.classes.push(class);
                        }
                        _ => {}
                    }
                }
            }
            "import_statement" | "import_from_statement" => {
                if let Some(import) = extract_import(node, source) {
                    capture.imports.push(import);
                }
            }
            "if_statement" if is_main_guard(node, source) => {
                capture.has_main_guard = true;
                let mut calls = Vec::new();
                collect_module_level(node, source, &mut capture.imports, &mut calls);
                for call in calls {
                    push_call(&mut capture.module_calls, call.clone());
                    push_call(&mut capture.main_calls, call);
                }
            }
            "if_statement" | "try_statement" => self.visit_compound(node, source, capture),
            "comment" => {}
            _ => collect_module_level(node, source, &mut capture.imports, &mut capture.module_calls),
        }
    }

    /// A top-level `if` or `try`: definitions in its blocks still bind at
    /// module level.
    fn visit_compound(&self, node: Node, source: &[u8], capture: &mut Capture) {
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "block" => {
                    let mut inner = child.walk();
                    for statement in child.named_children(&mut inner) {
                        self.visit_top_level(statement, source, capture);
                    }
                }
                "elif_clause" | "else_clause" | "except_clause" | "except_group_clause" | "finally_clause" => {
                    self.visit_compound(child, source, capture)
                }
                _ => collect_module_level(child, source, &mut capture.imports, &mut capture.module_calls),
            }
        }
    }

    fn extract_function(&self, node: Node, source: &[u8], decorators: Vec<String>) -> FunctionCapture {
        let name = field_text(node, "name", source).unwrap_or_default();

        let mut signature = Signature {
            is_async: is_async(node),
            return_type: node
                .child_by_field_name("return_type")
                .map(|n| squash(node_text(n, source))),
            ..Default::default()
        };
        if let Some(params) = node.child_by_field_name("parameters") {
            signature.params = extract_params(params, source);
        }

        let mut func = FunctionCapture {
            name,
            line: start_line(node),
            end_line: end_line(node),
            signature,
            decorators,
            ..Default::default()
        };

        if let Some(body) = node.child_by_field_name("body") {
            let doc_node = docstring_node(body);
            func.docstring = doc_node.map(|n| string_value(node_text(n, source)));
            func.body_hash = body_hash(body, source, doc_node.and_then(|n| n.parent()));
            collect_calls(body, source, &mut func.calls);
        }

        func
    }

    fn extract_class(
        &self,
        node: Node,
        source: &[u8],
        decorators: Vec<String>,
        capture: &mut Capture,
    ) -> ClassCapture {
        let name = field_text(node, "name", source).unwrap_or_default();
        let mut class = ClassCapture {
            name: name.clone(),
            line: start_line(node),
            end_line: end_line(node),
            decorators,
            ..Default::default()
        };

        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for base in superclasses.named_children(&mut cursor) {
                if base.kind() != "keyword_argument" && base.kind() != "comment" {
                    class.bases.push(squash(node_text(base, source)));
                }
            }
        }

        let Some(body) = node.child_by_field_name("body") else {
            return class;
        };
        class.docstring = docstring_node(body).map(|n| string_value(node_text(n, source)));

        let mut cursor = body.walk();
        for child in body.named_children(&mut cursor) {
            let (definition, decorators) = match child.kind() {
                "function_definition" => (child, Vec::new()),
                "decorated_definition" => match child.child_by_field_name("definition") {
                    Some(def) if def.kind() == "function_definition" => (def, decorators_of(child, source)),
                    _ => continue,
                },
                _ => continue,
            };
            let method = self.extract_function(definition, source, decorators);
            self.collect_routes(&method, &format!("{}.{}", name, method.name), capture);
            class.methods.push(method);
        }

        class
    }

    fn collect_routes(&self, func: &FunctionCapture, handler: &str, capture: &mut Capture) {
        for decorator in &func.decorators {
            let (callee, args) = match decorator.split_once('(') {
                Some((callee, args)) => (callee.trim(), args),
                None => (decorator.trim(), ""),
            };
            for pattern in &self.route_patterns {
                let Some(caps) = pattern.captures(callee) else {
                    continue;
                };
                let Some(path) = first_string_literal(args) else {
                    continue;
                };
                let verb = caps.get(1).map(|m| m.as_str().to_lowercase());
                for method in route_methods(verb.as_deref(), args) {
                    capture.extras.routes.push(RouteCapture {
                        method,
                        path: path.clone(),
                        handler: handler.to_string(),
                        line: func.line,
                    });
                }
                break;
            }
        }
    }
}

impl LanguageParser for PythonParser {
    fn language(&self) -> &str {
        "python"
    }

    fn extensions(&self) -> &[&str] {
        &["py", "pyi"]
    }

    fn scan(&self, source: &[u8]) -> anyhow::Result<Capture> {
        let tree = parse_tree(tree_sitter_python::LANGUAGE.into(), source, "Python")?;
        let root = tree.root_node();
        if root.has_error() {
            tracing::debug!("Python syntax errors, using line-oriented fallback");
            return Ok(fallback::scan_python(source));
        }
        Ok(self.extract(root, source))
    }
}

fn is_async(node: Node) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == "async");
    found
}

fn decorators_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|c| squash(node_text(c, source).trim_start_matches('@')))
        .collect()
}

fn extract_params(params: Node, source: &[u8]) -> Vec<Param> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let text = |n: Option<Node>| n.map(|n| squash(node_text(n, source)));
        let p = match param.kind() {
            "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => Param {
                name: node_text(param, source).to_string(),
                ..Default::default()
            },
            "typed_parameter" => {
                let mut inner = param.walk();
                let name = param
                    .named_children(&mut inner)
                    .find(|c| c.kind() != "type")
                    .map(|c| node_text(c, source).to_string())
                    .unwrap_or_default();
                Param {
                    name,
                    type_hint: text(param.child_by_field_name("type")),
                    has_default: false,
                }
            }
            "default_parameter" => Param {
                name: text(param.child_by_field_name("name")).unwrap_or_default(),
                type_hint: None,
                has_default: true,
            },
            "typed_default_parameter" => Param {
                name: text(param.child_by_field_name("name")).unwrap_or_default(),
                type_hint: text(param.child_by_field_name("type")),
                has_default: true,
            },
            _ => continue,
        };
        if !p.name.is_empty() {
            out.push(p);
        }
    }
    out
}

/// The string node of a leading docstring statement in `body`.
fn docstring_node(body: Node) -> Option<Node> {
    let mut cursor = body.walk();
    let first = body.named_children(&mut cursor).find(|c| c.kind() != "comment")?;
    if first.kind() != "expression_statement" {
        return None;
    }
    let mut inner = first.walk();
    let expr = first.named_children(&mut inner).next()?;
    (expr.kind() == "string").then_some(expr)
}

/// Strip prefixes and quotes from a string literal.
pub(crate) fn string_value(literal: &str) -> String {
    let body = literal.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    for quote in ["\"\"\"", "'''", "\"", "'"] {
        if let Some(inner) = body.strip_prefix(quote).and_then(|b| b.strip_suffix(quote)) {
            return inner.trim().to_string();
        }
    }
    body.trim().to_string()
}

fn first_string_literal(args: &str) -> Option<String> {
    let start = args.find(['"', '\''])?;
    let quote = args[start..].chars().next()?;
    let rest = &args[start + 1..];
    let end = rest.find(quote)?;
    Some(rest[..end].to_string())
}

/// HTTP methods of a route decorator; `route` style decorators read the
/// `methods=[...]` argument and default to GET.
fn route_methods(verb: Option<&str>, args: &str) -> Vec<String> {
    match verb {
        Some("route") | None => {
            let listed: Vec<String> = args
                .split_once("methods")
                .and_then(|(_, rest)| {
                    let open = rest.find('[')?;
                    let close = rest[open..].find(']')? + open;
                    Some(rest[open + 1..close].to_string())
                })
                .map(|list| {
                    list.split(',')
                        .map(|m| m.trim().trim_matches(['"', '\'']).to_uppercase())
                        .filter(|m| !m.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            if listed.is_empty() {
                vec!["GET".to_string()]
            } else {
                listed
            }
        }
        Some("websocket") => vec!["WS".to_string()],
        Some(verb) => vec![verb.to_uppercase()],
    }
}

fn extract_import(node: Node, source: &[u8]) -> Option<ImportRef> {
    let line = start_line(node);
    let mut cursor = node.walk();
    let names: Vec<String> = node
        .children_by_field_name("name", &mut cursor)
        .map(|n| match n.kind() {
            "aliased_import" => n
                .child_by_field_name("name")
                .map(|inner| node_text(inner, source).to_string())
                .unwrap_or_default(),
            _ => node_text(n, source).to_string(),
        })
        .filter(|n| !n.is_empty())
        .collect();

    if node.kind() == "import_statement" {
        // `import a.b, c` becomes one reference per module
        let module = names.join(",");
        return (!module.is_empty()).then(|| ImportRef {
            module,
            names: Vec::new(),
            line,
        });
    }

    let module = field_text(node, "module_name", source)?;
    Some(ImportRef {
        module,
        names,
        line,
    })
}

fn is_main_guard(node: Node, source: &[u8]) -> bool {
    node.child_by_field_name("condition")
        .map(|c| {
            let text = node_text(c, source);
            text.contains("__name__") && text.contains("__main__")
        })
        .unwrap_or(false)
}

/// Imports and calls in a top-level statement that is not a definition.
fn collect_module_level(node: Node, source: &[u8], imports: &mut Vec<ImportRef>, calls: &mut Vec<String>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "function_definition" | "class_definition" | "decorated_definition" => continue,
            "import_statement" | "import_from_statement" => {
                if let Some(import) = extract_import(current, source) {
                    imports.push(import);
                }
                continue;
            }
            "call" => {
                if let Some(callee) = current.child_by_field_name("function").and_then(|f| callee_chain(f, source)) {
                    push_call(calls, callee);
                }
            }
            _ => {}
        }
        let mut cursor = current.walk();
        let children: Vec<Node> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Calls anywhere under `node`, nested functions and lambdas included.
fn collect_calls(node: Node, source: &[u8], calls: &mut Vec<String>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.kind() == "call" {
            if let Some(callee) = current.child_by_field_name("function").and_then(|f| callee_chain(f, source)) {
                push_call(calls, callee);
            }
        }
        let mut cursor = current.walk();
        let children: Vec<Node> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// Dotted text of a callee: `self.db.save`, `print`. Callees that are not
/// plain names (subscripts, call results) keep only their final attribute.
fn callee_chain(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" => Some(node_text(node, source).to_string()),
        "attribute" => {
            let attr = node_text(node.child_by_field_name("attribute")?, source);
            match node.child_by_field_name("object").and_then(|o| callee_chain(o, source)) {
                Some(object) => Some(format!("{}.{}", object, attr)),
                None => Some(attr.to_string()),
            }
        }
        _ => None,
    }
}
