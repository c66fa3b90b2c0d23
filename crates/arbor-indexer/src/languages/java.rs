//! Java symbol extraction
//!
//! Auxiliary support: classes, interfaces, enums, methods, constructors, and
//! fields. Call-site analysis is Python-only.

use std::path::Path;

use tree_sitter::{Node as TsNode, Tree};

use arbor_core::model::{Node, NodeKind, Param, Scope, Visibility};

use crate::extract::Extraction;
use crate::parser::{node_line, node_text};

/// Extract all symbols from one Java file.
pub fn extract(module: &str, file: &Path, source: &[u8], tree: &Tree) -> Extraction {
    let mut ext = Extraction::default();
    let walker = Walker { module, file, source };
    walker.walk_program(tree.root_node(), &mut ext);
    ext
}

struct Walker<'a> {
    module: &'a str,
    file: &'a Path,
    source: &'a [u8],
}

impl<'a> Walker<'a> {
    fn walk_program(&self, root: TsNode, ext: &mut Extraction) {
        let mut cursor = root.walk();
        for child in root.children(&mut cursor) {
            match child.kind() {
                "class_declaration" => self.emit_type(child, NodeKind::Class, None, ext),
                "interface_declaration" => self.emit_type(child, NodeKind::Interface, None, ext),
                "enum_declaration" => self.emit_type(child, NodeKind::Enum, None, ext),
                _ => {}
            }
        }
    }

    fn emit_type(
        &self,
        node: TsNode,
        kind: NodeKind,
        parent_fqn: Option<&str>,
        ext: &mut Extraction,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let fqn = match parent_fqn {
            Some(parent) => format!("{parent}.{name}"),
            None => format!("{}.{name}", self.module),
        };

        let mut type_node = Node::new(
            fqn.clone(),
            kind,
            name,
            self.file,
            node_line(node),
            if parent_fqn.is_some() {
                Scope::Class
            } else {
                Scope::Module
            },
        );
        type_node.byte_range = Some((node.start_byte(), node.end_byte()));
        type_node.superclass = node
            .child_by_field_name("superclass")
            .and_then(|sc| sc.named_child(0))
            .map(|t| node_text(t, self.source).to_string());
        type_node.interfaces = self.interfaces(node);
        type_node.visibility = self.visibility(node);
        ext.nodes.push(type_node);

        if let Some(body) = node.child_by_field_name("body") {
            self.walk_body(body, &fqn, ext);
        }
    }

    fn interfaces(&self, node: TsNode) -> Vec<String> {
        let Some(ifaces) = node.child_by_field_name("interfaces") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut stack = vec![ifaces];
        while let Some(n) = stack.pop() {
            let mut cursor = n.walk();
            for child in n.children(&mut cursor) {
                match child.kind() {
                    "type_identifier" | "scoped_type_identifier" => {
                        out.push(node_text(child, self.source).to_string());
                    }
                    _ => stack.push(child),
                }
            }
        }
        out
    }

    fn walk_body(&self, body: TsNode, class_fqn: &str, ext: &mut Extraction) {
        let mut cursor = body.walk();
        for child in body.children(&mut cursor) {
            match child.kind() {
                "method_declaration" => self.emit_method(child, class_fqn, false, ext),
                "constructor_declaration" => self.emit_method(child, class_fqn, true, ext),
                "field_declaration" => self.emit_field(child, class_fqn, ext),
                "class_declaration" => self.emit_type(child, NodeKind::Class, Some(class_fqn), ext),
                "interface_declaration" => {
                    self.emit_type(child, NodeKind::Interface, Some(class_fqn), ext)
                }
                "enum_declaration" => self.emit_type(child, NodeKind::Enum, Some(class_fqn), ext),
                _ => {}
            }
        }
    }

    fn emit_method(&self, node: TsNode, class_fqn: &str, is_ctor: bool, ext: &mut Extraction) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(name_node, self.source).to_string();
        let fqn = format!("{class_fqn}.{name}");

        let kind = if is_ctor {
            NodeKind::Constructor
        } else {
            NodeKind::Method
        };
        let mut method = Node::new(fqn.clone(), kind, name, self.file, node_line(node), Scope::Class);
        method.byte_range = Some((node.start_byte(), node.end_byte()));
        method.params = self.params(node);
        method.return_type = node
            .child_by_field_name("type")
            .map(|t| node_text(t, self.source).to_string());
        method.visibility = self.visibility(node);
        ext.nodes.push(method);
        ext.methods.push((class_fqn.to_string(), fqn));
    }

    fn params(&self, method: TsNode) -> Vec<Param> {
        let Some(params) = method.child_by_field_name("parameters") else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut cursor = params.walk();
        for child in params.named_children(&mut cursor) {
            if child.kind() == "formal_parameter" || child.kind() == "spread_parameter" {
                let name = child
                    .child_by_field_name("name")
                    .map(|n| node_text(n, self.source))
                    .unwrap_or_default();
                let mut p = Param::new(name);
                p.annotation = child
                    .child_by_field_name("type")
                    .map(|t| node_text(t, self.source).to_string());
                out.push(p);
            }
        }
        out
    }

    fn emit_field(&self, node: TsNode, class_fqn: &str, ext: &mut Extraction) {
        let modifiers = self.modifier_text(node);
        let is_constant = modifiers.contains("static") && modifiers.contains("final");

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };
            let name = node_text(name_node, self.source).to_string();
            let kind = if is_constant {
                NodeKind::Constant
            } else {
                NodeKind::ClassField
            };
            let mut field = Node::new(
                format!("{class_fqn}.{name}"),
                kind,
                name,
                self.file,
                node_line(child),
                Scope::Class,
            );
            field.byte_range = Some((node.start_byte(), node.end_byte()));
            field.return_type = node
                .child_by_field_name("type")
                .map(|t| node_text(t, self.source).to_string());
            field.visibility = self.visibility(node);
            ext.nodes.push(field);
        }
    }

    fn modifier_text(&self, node: TsNode) -> String {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "modifiers" {
                return node_text(child, self.source).to_string();
            }
        }
        String::new()
    }

    fn visibility(&self, node: TsNode) -> Visibility {
        let modifiers = self.modifier_text(node);
        if modifiers.contains("private") {
            Visibility::Private
        } else if modifiers.contains("protected") {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    }
}
