// Rust parser using tree-sitter

use tree_sitter::Node;

use super::{body_hash, end_line, field_text, leading_doc_comment, node_text, parse_tree, squash, start_line, LanguageParser};
use crate::index::capture::{push_call, ClassCapture, FunctionCapture, ImportRef};
use crate::index::{Capture, Fidelity, Param, Signature};

/// Rust parser: free functions, structs/enums/traits as classes, `impl`
/// methods attached to their type.
#[derive(Default)]
pub struct RustParser;

/// Methods gathered from one `impl` block before they are attached.
struct ImplBlock {
    type_name: String,
    scope: Option<String>,
    trait_name: Option<String>,
    line: u32,
    end_line: Option<u32>,
    methods: Vec<FunctionCapture>,
}

impl RustParser {
    pub fn new() -> Self {
        Self
    }

    fn extract(&self, root: Node, source: &[u8]) -> Capture {
        let mut capture = Capture::new("rust");
        let mut impls = Vec::new();
        self.walk_items(root, source, None, &mut capture, &mut impls);

        for block in impls {
            let slot = match capture
                .classes
                .iter()
                .position(|c| c.name == block.type_name && c.scope == block.scope)
            {
                Some(slot) => slot,
                None => {
                    capture.classes.push(ClassCapture {
                        name: block.type_name.clone(),
                        scope: block.scope.clone(),
                        line: block.line,
                        end_line: block.end_line,
                        ..Default::default()
                    });
                    capture.classes.len() - 1
                }
            };
            let class = &mut capture.classes[slot];
            if let Some(trait_name) = block.trait_name {
                if !class.bases.contains(&trait_name) {
                    class.bases.push(trait_name);
                }
            }
            class.methods.extend(block.methods);
        }

        capture
    }

    /// Items of a file or inline module body; `scope` is the dotted path of
    /// the enclosing inline modules.
    fn walk_items(
        &self,
        container: Node,
        source: &[u8],
        scope: Option<&str>,
        capture: &mut Capture,
        impls: &mut Vec<ImplBlock>,
    ) {
        let mut cursor = container.walk();
        for child in container.named_children(&mut cursor) {
            match child.kind() {
                "function_item" => {
                    let mut func = self.extract_function(child, source);
                    func.scope = scope.map(str::to_string);
                    capture.functions.push(func);
                }
                "struct_item" | "enum_item" | "union_item" | "trait_item" => {
                    let mut class = self.extract_type(child, source);
                    class.scope = scope.map(str::to_string);
                    capture.classes.push(class);
                }
                "impl_item" => {
                    if let Some(mut block) = self.extract_impl(child, source) {
                        block.scope = scope.map(str::to_string);
                        impls.push(block);
                    }
                }
                "use_declaration" => {
                    if let Some(import) = extract_use(child, source) {
                        capture.imports.push(import);
                    }
                }
                "mod_item" => {
                    if let Some(body) = child.child_by_field_name("body") {
                        let name = field_text(child, "name", source).unwrap_or_default();
                        let inner = match scope {
                            Some(outer) => format!("{}.{}", outer, name),
                            None => name,
                        };
                        self.walk_items(body, source, Some(&inner), capture, impls);
                    }
                }
                _ => {}
            }
        }
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
                    .child_by_field_name("return_type")
                    .map(|n| squash(node_text(n, source))),
                is_async: is_async(node, source),
            },
            docstring: leading_doc_comment(node, source, "///"),
            decorators: attributes_of(node, source),
            ..Default::default()
        };

        if let Some(body) = node.child_by_field_name("body") {
            func.body_hash = body_hash(body, source, None);
            collect_calls(body, source, &mut func.calls);
        }
        func
    }

    fn extract_type(&self, node: Node, source: &[u8]) -> ClassCapture {
        let mut class = ClassCapture {
            name: field_text(node, "name", source).unwrap_or_default(),
            line: start_line(node),
            end_line: end_line(node),
            docstring: leading_doc_comment(node, source, "///"),
            decorators: attributes_of(node, source),
            ..Default::default()
        };

        if node.kind() == "trait_item" {
            if let Some(bounds) = node.child_by_field_name("bounds") {
                let mut cursor = bounds.walk();
                class.bases = bounds
                    .named_children(&mut cursor)
                    .map(|b| squash(node_text(b, source)))
                    .collect();
            }
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for item in body.named_children(&mut cursor) {
                    if item.kind() == "function_item" {
                        class.methods.push(self.extract_function(item, source));
                    }
                }
            }
        }
        class
    }

    fn extract_impl(&self, node: Node, source: &[u8]) -> Option<ImplBlock> {
        let type_name = type_name(node.child_by_field_name("type")?, source);
        let trait_name = node.child_by_field_name("trait").map(|t| type_name_of(t, source));

        let mut methods = Vec::new();
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for item in body.named_children(&mut cursor) {
                if item.kind() == "function_item" {
                    methods.push(self.extract_function(item, source));
                }
            }
        }

        Some(ImplBlock {
            type_name,
            scope: None,
            trait_name,
            line: start_line(node),
            end_line: end_line(node),
            methods,
        })
    }
}

impl LanguageParser for RustParser {
    fn language(&self) -> &str {
        "rust"
    }

    fn extensions(&self) -> &[&str] {
        &["rs"]
    }

    fn scan(&self, source: &[u8]) -> anyhow::Result<Capture> {
        let tree = parse_tree(tree_sitter_rust::LANGUAGE.into(), source, "Rust")?;
        let root = tree.root_node();
        let mut capture = self.extract(root, source);
        if root.has_error() {
            capture.fidelity = Fidelity::Degraded;
        }
        Ok(capture)
    }
}

fn type_name(node: Node, source: &[u8]) -> String {
    match node.kind() {
        "generic_type" => node
            .child_by_field_name("type")
            .map(|t| type_name_of(t, source))
            .unwrap_or_else(|| squash(node_text(node, source))),
        "reference_type" => node
            .child_by_field_name("type")
            .map(|t| type_name(t, source))
            .unwrap_or_default(),
        _ => type_name_of(node, source),
    }
}

/// Last path segment of a type, generics dropped: `fmt::Display` -> `Display`.
fn type_name_of(node: Node, source: &[u8]) -> String {
    let text = node_text(node, source);
    let base = text.split('<').next().unwrap_or(text);
    base.rsplit("::").next().unwrap_or(base).trim().to_string()
}

fn is_async(node: Node, source: &[u8]) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "function_modifiers" && node_text(c, source).contains("async"));
    found
}

/// `#[...]` attributes directly above an item.
fn attributes_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut attrs = Vec::new();
    let mut current = node.prev_named_sibling();
    while let Some(sibling) = current {
        match sibling.kind() {
            "attribute_item" => {
                let text = node_text(sibling, source);
                let inner = text.trim_start_matches("#[").trim_end_matches(']');
                attrs.push(squash(inner));
            }
            "line_comment" | "block_comment" => {}
            _ => break,
        }
        current = sibling.prev_named_sibling();
    }
    attrs.reverse();
    attrs
}

fn extract_params(params: Node, source: &[u8]) -> Vec<Param> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "self_parameter" => out.push(Param {
                name: "self".to_string(),
                type_hint: Some(squash(node_text(param, source))),
                has_default: false,
            }),
            "parameter" => out.push(Param {
                name: field_text(param, "pattern", source).unwrap_or_default(),
                type_hint: param
                    .child_by_field_name("type")
                    .map(|t| squash(node_text(t, source))),
                has_default: false,
            }),
            _ => {}
        }
    }
    out
}

/// `use` declarations with `crate::`/`self::` stripped and `super::` turned
/// into a relative prefix, paths dotted.
fn extract_use(node: Node, source: &[u8]) -> Option<ImportRef> {
    let mut argument = node.child_by_field_name("argument")?;
    if argument.kind() == "use_as_clause" {
        argument = argument.child_by_field_name("path")?;
    }
    let text = squash(node_text(argument, source)).replace(":: ", "::");

    let (path, names) = match text.split_once("::{") {
        Some((path, rest)) => {
            let names = rest
                .trim_end_matches('}')
                .split(',')
                .map(|n| {
                    let n = n.split(" as ").next().unwrap_or(n).trim();
                    n.rsplit("::").next().unwrap_or(n).to_string()
                })
                .filter(|n| !n.is_empty() && n != "self")
                .collect();
            (path.to_string(), names)
        }
        None => (text.clone(), Vec::new()),
    };

    let mut module = path;
    let mut relative = String::new();
    loop {
        if let Some(rest) = module.strip_prefix("crate::").or_else(|| module.strip_prefix("self::")) {
            module = rest.to_string();
        } else if let Some(rest) = module.strip_prefix("super::") {
            relative.push('.');
            module = rest.to_string();
        } else {
            break;
        }
    }
    let module = format!("{}{}", relative, module.replace("::", "."));

    Some(ImportRef {
        module,
        names,
        line: start_line(node),
    })
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

/// `self.store.save`, `Vec.new`, `helper`.
fn callee_chain(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "self" => Some(node_text(node, source).to_string()),
        "scoped_identifier" => Some(node_text(node, source).replace("::", ".")),
        "generic_function" => node
            .child_by_field_name("function")
            .and_then(|f| callee_chain(f, source)),
        "field_expression" => {
            let field = node_text(node.child_by_field_name("field")?, source);
            match node.child_by_field_name("value").and_then(|v| callee_chain(v, source)) {
                Some(value) => Some(format!("{}.{}", value, field)),
                None => Some(field.to_string()),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Capture {
        RustParser::new().scan(src.as_bytes()).unwrap()
    }

    #[test]
    fn test_functions_and_calls() {
        let capture = scan(
            r#"
/// Entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    run(&cfg).await?;
    self.store.save(1);
    Ok(())
}

fn run(cfg: &Config) {}
"#,
        );
        assert_eq!(capture.functions.len(), 2);
        let main = &capture.functions[0];
        assert_eq!(main.docstring.as_deref(), Some("Entry point."));
        assert_eq!(main.decorators, vec!["tokio::main"]);
        assert!(main.signature.is_async);
        assert_eq!(main.calls, vec!["Config.load", "run", "self.store.save", "Ok"]);
        assert_eq!(capture.functions[1].signature.params[0].name, "cfg");
        assert_eq!(capture.functions[1].signature.params[0].type_hint.as_deref(), Some("&Config"));
    }

    #[test]
    fn test_impl_methods_attach_to_type() {
        let capture = scan(
            r#"
pub struct Store { items: Vec<u8> }

impl Store {
    pub fn new() -> Self { Self { items: Vec::new() } }
    fn len(&self) -> usize { self.items.len() }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { Ok(()) }
}

impl<T> Wrapper<T> {
    fn get(&self) -> &T { &self.0 }
}
"#,
        );
        assert_eq!(capture.classes.len(), 2);
        let store = &capture.classes[0];
        assert_eq!(store.name, "Store");
        assert_eq!(store.bases, vec!["Display"]);
        let methods: Vec<&str> = store.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["new", "len", "fmt"]);
        assert_eq!(store.methods[1].signature.params[0].name, "self");
        assert_eq!(capture.classes[1].name, "Wrapper");
    }

    #[test]
    fn test_inline_modules_scope_their_items() {
        let capture = scan(
            r#"
fn foo() { bar(); }

struct Store;

mod tests {
    use super::*;

    fn foo() { setup(); }

    struct Store;

    impl Store {
        fn open() {}
    }

    mod nested {
        fn foo() {}
    }
}
"#,
        );
        let symbols = crate::index::symbols::from_capture("src/lib.rs", &capture);
        let names: Vec<&str> = symbols.iter().map(|s| s.qualified_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["foo", "tests.foo", "tests.nested.foo", "Store", "tests.Store", "tests.Store.open"]
        );
        assert_eq!(symbols[0].calls, vec!["bar"]);
        assert_eq!(symbols[1].name, "foo");
        assert_eq!(symbols[1].calls, vec!["setup"]);
        assert!(capture.classes[0].methods.is_empty());
    }

    #[test]
    fn test_use_declarations() {
        let capture = scan("use crate::index::{Capture, Param};\nuse super::store::save;\nuse std::path::Path;\n");
        let modules: Vec<&str> = capture.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["index", ".store.save", "std.path.Path"]);
        assert_eq!(capture.imports[0].names, vec!["Capture", "Param"]);
    }

    #[test]
    fn test_errors_keep_tree_but_degrade() {
        let capture = scan("fn ok() { helper(); }\nfn broken( {\n");
        assert_eq!(capture.fidelity, Fidelity::Degraded);
        assert!(capture.functions.iter().any(|f| f.name == "ok"));
    }
}
