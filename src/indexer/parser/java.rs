// Java parser using tree-sitter

use tree_sitter::Node;

use super::{body_hash, end_line, field_text, leading_doc_comment, node_text, parse_tree, squash, start_line, LanguageParser};
use crate::index::capture::{push_call, ClassCapture, FunctionCapture, ImportRef};
use crate::index::{Capture, Fidelity, Param, Signature};

/// Java parser: top-level classes, interfaces, enums and records with their
/// methods and constructors.
#[derive(Default)]
pub struct JavaParser;

impl JavaParser {
    pub fn new() -> Self {
        Self
    }

    fn extract(&self, root: Node, source: &[u8]) -> Capture {
        let mut capture = Capture::new("java");
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration" => {
                    capture.classes.push(self.extract_class(child, source));
                }
                "import_declaration" => {
                    if let Some(import) = extract_import(child, source) {
                        capture.imports.push(import);
                    }
                }
                _ => {}
            }
        }
        capture
    }

    fn extract_class(&self, node: Node, source: &[u8]) -> ClassCapture {
        let mut class = ClassCapture {
            name: field_text(node, "name", source).unwrap_or_default(),
            line: start_line(node),
            end_line: end_line(node),
            docstring: leading_doc_comment(node, source, "/**"),
            decorators: annotations_of(node, source),
            ..Default::default()
        };

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "superclass" | "super_interfaces" | "extends_interfaces" => {
                    class.bases.extend(type_names(child, source));
                }
                _ => {}
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            let mut members = vec![body];
            while let Some(container) = members.pop() {
                let mut inner = container.walk();
                for member in container.named_children(&mut inner) {
                    match member.kind() {
                        "method_declaration" | "constructor_declaration" | "compact_constructor_declaration" => {
                            class.methods.push(self.extract_method(member, source));
                        }
                        "enum_body_declarations" => members.push(member),
                        _ => {}
                    }
                }
            }
        }
        class
    }

    fn extract_method(&self, node: Node, source: &[u8]) -> FunctionCapture {
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
                    .child_by_field_name("type")
                    .map(|n| squash(node_text(n, source))),
                is_async: false,
            },
            docstring: leading_doc_comment(node, source, "/**"),
            decorators: annotations_of(node, source),
            ..Default::default()
        };

        if let Some(body) = node.child_by_field_name("body") {
            func.body_hash = body_hash(body, source, None);
            collect_calls(body, source, &mut func.calls);
        }
        func
    }
}

impl LanguageParser for JavaParser {
    fn language(&self) -> &str {
        "java"
    }

    fn extensions(&self) -> &[&str] {
        &["java"]
    }

    fn scan(&self, source: &[u8]) -> anyhow::Result<Capture> {
        let tree = parse_tree(tree_sitter_java::LANGUAGE.into(), source, "Java")?;
        let root = tree.root_node();
        let mut capture = self.extract(root, source);
        if root.has_error() {
            capture.fidelity = Fidelity::Degraded;
        }
        Ok(capture)
    }
}

/// Annotations in the declaration's modifiers, without the `@`.
fn annotations_of(node: Node, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    let Some(modifiers) = node.named_children(&mut cursor).find(|c| c.kind() == "modifiers") else {
        return Vec::new();
    };
    let mut inner = modifiers.walk();
    let annotations = modifiers
        .named_children(&mut inner)
        .filter(|c| matches!(c.kind(), "annotation" | "marker_annotation"))
        .map(|c| squash(node_text(c, source).trim_start_matches('@')))
        .collect();
    annotations
}

fn type_names(node: Node, source: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "type_identifier" | "scoped_type_identifier" | "generic_type" => {
                let text = node_text(current, source);
                names.push(text.split('<').next().unwrap_or(text).trim().to_string());
            }
            _ => {
                let mut cursor = current.walk();
                let children: Vec<Node> = current.named_children(&mut cursor).collect();
                stack.extend(children.into_iter().rev());
            }
        }
    }
    names
}

fn extract_params(params: Node, source: &[u8]) -> Vec<Param> {
    let mut out = Vec::new();
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        match param.kind() {
            "formal_parameter" => out.push(Param {
                name: field_text(param, "name", source).unwrap_or_default(),
                type_hint: param
                    .child_by_field_name("type")
                    .map(|t| squash(node_text(t, source))),
                has_default: false,
            }),
            "spread_parameter" => {
                let text = squash(node_text(param, source));
                let (ty, name) = text.rsplit_once(' ').unwrap_or(("", text.as_str()));
                out.push(Param {
                    name: name.to_string(),
                    type_hint: (!ty.is_empty()).then(|| ty.to_string()),
                    has_default: false,
                });
            }
            _ => {}
        }
    }
    out
}

fn extract_import(node: Node, source: &[u8]) -> Option<ImportRef> {
    let text = squash(node_text(node, source));
    let path = text
        .trim_start_matches("import")
        .trim()
        .trim_start_matches("static ")
        .trim_end_matches(';')
        .trim();
    let module = path.strip_suffix(".*").unwrap_or(path);
    (!module.is_empty()).then(|| ImportRef {
        module: module.to_string(),
        names: Vec::new(),
        line: start_line(node),
    })
}

fn collect_calls(node: Node, source: &[u8], calls: &mut Vec<String>) {
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        match current.kind() {
            "method_invocation" => {
                if let Some(callee) = invocation_chain(current, source) {
                    push_call(calls, callee);
                }
            }
            "object_creation_expression" => {
                if let Some(ty) = current.child_by_field_name("type") {
                    let text = node_text(ty, source);
                    push_call(calls, text.split('<').next().unwrap_or(text).trim().to_string());
                }
            }
            _ => {}
        }
        let mut cursor = current.walk();
        let children: Vec<Node> = current.named_children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
}

/// `this.repo.save`, `System.out.println`, `helper`.
fn invocation_chain(node: Node, source: &[u8]) -> Option<String> {
    let name = node_text(node.child_by_field_name("name")?, source);
    match node.child_by_field_name("object").and_then(|o| object_chain(o, source)) {
        Some(object) => Some(format!("{}.{}", object, name)),
        None => Some(name.to_string()),
    }
}

fn object_chain(node: Node, source: &[u8]) -> Option<String> {
    match node.kind() {
        "identifier" | "this" | "super" => Some(node_text(node, source).to_string()),
        "field_access" => {
            let field = node_text(node.child_by_field_name("field")?, source);
            match node.child_by_field_name("object").and_then(|o| object_chain(o, source)) {
                Some(object) => Some(format!("{}.{}", object, field)),
                None => Some(field.to_string()),
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_java_extraction() {
        let src = r#"
package com.acme.users;

import java.util.List;
import com.acme.store.*;

/**
 * Manages users.
 */
@Service
public class UserService extends BaseService implements Closeable, Auditable<User> {
    private final UserRepository repo;

    public UserService(UserRepository repo) {
        this.repo = repo;
    }

    /** Save a user. */
    @Override
    public User save(User user, String... tags) {
        validate(user);
        this.repo.persist(user);
        System.out.println("saved");
        return new User(user.getName());
    }
}
"#;
        let capture = JavaParser::new().scan(src.as_bytes()).unwrap();
        let modules: Vec<&str> = capture.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["java.util.List", "com.acme.store"]);

        let class = &capture.classes[0];
        assert_eq!(class.name, "UserService");
        assert_eq!(class.docstring.as_deref(), Some("Manages users."));
        assert_eq!(class.decorators, vec!["Service"]);
        assert_eq!(class.bases, vec!["BaseService", "Closeable", "Auditable"]);

        let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["UserService", "save"]);

        let save = &class.methods[1];
        assert_eq!(save.docstring.as_deref(), Some("Save a user."));
        assert_eq!(save.decorators, vec!["Override"]);
        assert_eq!(save.signature.return_type.as_deref(), Some("User"));
        assert_eq!(save.signature.params[0].type_hint.as_deref(), Some("User"));
        assert_eq!(save.signature.params[1].name, "tags");
        assert_eq!(
            save.calls,
            vec!["validate", "this.repo.persist", "System.out.println", "User", "user.getName"]
        );
    }
}
