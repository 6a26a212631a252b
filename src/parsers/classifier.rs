//! Turns a Java syntax tree into typed dependency edges.
//!
//! Each top-level type declaration of a compilation unit is one class. Its edges are the
//! file's imports followed by everything found while walking the declaration subtree,
//! in traversal order. Nested and anonymous types count towards the enclosing class.

use std::collections::HashSet;
use std::path::Path;
use tree_sitter::Node as TSNode;

use super::common::{extract_text, find_child_by_kind, named_children};
use super::ParseResult;
use crate::core::graph::{package_of, ClassRecord, DependencyEdge, EdgeKey, EdgeKind};
use crate::error::{AnalysisError, Result};

const TYPE_DECLARATIONS: [&str; 5] = [
    "class_declaration",
    "interface_declaration",
    "enum_declaration",
    "record_declaration",
    "annotation_type_declaration",
];

/// The syntax node kinds a dependency rule is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyntaxKind {
    Import,
    TypeDeclaration,
    Superclass,
    SuperInterfaces,
    ExtendsInterfaces,
    Field,
    LocalVariable,
    CatchParameter,
    Method,
    Constructor,
    ObjectCreation,
    TypeParameter,
    Other,
}

impl SyntaxKind {
    fn of(kind: &str) -> Self {
        match kind {
            "import_declaration" => SyntaxKind::Import,
            kind if TYPE_DECLARATIONS.contains(&kind) => SyntaxKind::TypeDeclaration,
            "superclass" => SyntaxKind::Superclass,
            "super_interfaces" => SyntaxKind::SuperInterfaces,
            "extends_interfaces" => SyntaxKind::ExtendsInterfaces,
            "field_declaration" | "constant_declaration" => SyntaxKind::Field,
            "local_variable_declaration" | "enhanced_for_statement" | "resource" => {
                SyntaxKind::LocalVariable
            }
            "catch_formal_parameter" => SyntaxKind::CatchParameter,
            "method_declaration" => SyntaxKind::Method,
            "constructor_declaration" => SyntaxKind::Constructor,
            "object_creation_expression" => SyntaxKind::ObjectCreation,
            "type_parameter" => SyntaxKind::TypeParameter,
            _ => SyntaxKind::Other,
        }
    }
}

/// Collects the edges of one class while walking its syntax.
pub struct EdgeClassifier<'a> {
    class_name: &'a str,
    source: &'a [u8],
    edges: Vec<DependencyEdge>,
    seen: HashSet<EdgeKey>,
}

impl<'a> EdgeClassifier<'a> {
    pub fn new(class_name: &'a str, source: &'a [u8]) -> Self {
        Self {
            class_name,
            source,
            edges: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn finish(self) -> Vec<DependencyEdge> {
        self.edges
    }

    pub fn visit(&mut self, node: TSNode<'_>) {
        match SyntaxKind::of(node.kind()) {
            SyntaxKind::Import => self.import(node),
            SyntaxKind::TypeDeclaration => {
                if node.kind() == "record_declaration" {
                    self.record_components(node);
                }
                self.visit_children(node);
            }
            SyntaxKind::Superclass => {
                for ty in named_children(&node) {
                    self.declared_type(ty, EdgeKind::Extends);
                }
            }
            SyntaxKind::SuperInterfaces => self.type_list(node, EdgeKind::Implements),
            SyntaxKind::ExtendsInterfaces => self.type_list(node, EdgeKind::Extends),
            SyntaxKind::Field => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.add_type(ty, EdgeKind::Field);
                }
                self.visit_children(node);
            }
            SyntaxKind::LocalVariable => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.add_type(ty, EdgeKind::Variable);
                }
                self.visit_children(node);
            }
            SyntaxKind::CatchParameter => {
                if let Some(catch_type) = find_child_by_kind(&node, "catch_type") {
                    self.add_type(catch_type, EdgeKind::Variable);
                }
                self.visit_children(node);
            }
            SyntaxKind::Method => {
                if let Some(ty) = node.child_by_field_name("type") {
                    self.add_type(ty, EdgeKind::ReturnType);
                }
                self.parameters(node);
                self.visit_children(node);
            }
            SyntaxKind::Constructor => {
                self.parameters(node);
                self.visit_children(node);
            }
            SyntaxKind::ObjectCreation => {
                if let Some(name) = node
                    .child_by_field_name("type")
                    .and_then(|ty| self.type_name(ty))
                {
                    self.push(name, EdgeKind::Creation, None);
                }
                self.visit_children(node);
            }
            SyntaxKind::TypeParameter => {
                for child in named_children(&node) {
                    match child.kind() {
                        "type_identifier" | "identifier" => {
                            let name = self.text(child);
                            self.push(name, EdgeKind::TypeParameterBound, None);
                        }
                        "type_bound" => self.add_type(child, EdgeKind::TypeParameterBound),
                        _ => {}
                    }
                }
            }
            SyntaxKind::Other => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: TSNode<'_>) {
        for child in named_children(&node) {
            self.visit(child);
        }
    }

    fn import(&mut self, node: TSNode<'_>) {
        let Some(name_node) = named_children(&node)
            .into_iter()
            .find(|child| matches!(child.kind(), "scoped_identifier" | "identifier"))
        else {
            return;
        };
        let name = self.text(name_node);
        if name == "java.lang" || name.starts_with("java.lang.") {
            return;
        }

        if find_child_by_kind(&node, "asterisk").is_some() {
            self.push(name, EdgeKind::PackageImport, None);
        } else {
            let package = package_of(&name).unwrap_or_default().to_string();
            self.push(name, EdgeKind::TypeImport, Some(package));
        }
    }

    fn type_list(&mut self, node: TSNode<'_>, kind: EdgeKind) {
        if let Some(list) = find_child_by_kind(&node, "type_list") {
            for ty in named_children(&list) {
                self.declared_type(ty, kind);
            }
        }
    }

    /// Supertypes are recorded by name only; their type arguments are not dependencies.
    fn declared_type(&mut self, ty: TSNode<'_>, kind: EdgeKind) {
        if let Some(name) = self.type_name(ty) {
            self.push(name, kind, None);
        }
    }

    fn record_components(&mut self, node: TSNode<'_>) {
        if let Some(params) = node.child_by_field_name("parameters") {
            for param in named_children(&params) {
                if let Some(ty) = param.child_by_field_name("type") {
                    self.add_type(ty, EdgeKind::Field);
                }
            }
        }
    }

    fn parameters(&mut self, node: TSNode<'_>) {
        let Some(params) = node.child_by_field_name("parameters") else {
            return;
        };
        for param in named_children(&params) {
            let ty = match param.kind() {
                "formal_parameter" => param.child_by_field_name("type"),
                "spread_parameter" => named_children(&param)
                    .into_iter()
                    .find(|child| is_type_node(child.kind())),
                _ => None,
            };
            if let Some(ty) = ty {
                self.add_type(ty, EdgeKind::Parameter);
            }
        }
    }

    /// Records a type usage: arrays unwrap to their element, generics record the base and
    /// every argument, wildcards/unions/bounds recurse, primitives and `var` are dropped.
    fn add_type(&mut self, node: TSNode<'_>, kind: EdgeKind) {
        match node.kind() {
            "integral_type" | "floating_point_type" | "boolean_type" | "void_type" => {}
            "type_identifier" => {
                let name = self.text(node);
                if name != "var" {
                    self.push(name, kind, None);
                }
            }
            "scoped_type_identifier" => {
                if let Some(name) = self.type_name(node) {
                    self.push(name, kind, None);
                }
            }
            "generic_type" => {
                for child in named_children(&node) {
                    if child.kind() == "type_arguments" {
                        for argument in named_children(&child) {
                            self.add_type(argument, kind);
                        }
                    } else {
                        self.add_type(child, kind);
                    }
                }
            }
            "array_type" => {
                if let Some(element) = node.child_by_field_name("element") {
                    self.add_type(element, kind);
                }
            }
            "annotated_type" | "wildcard" | "catch_type" | "type_bound" | "type_list" => {
                for child in named_children(&node) {
                    self.add_type(child, kind);
                }
            }
            _ => {}
        }
    }

    /// Name of a class type without type arguments; `Outer.Inner` keeps its scope.
    fn type_name(&self, node: TSNode<'_>) -> Option<String> {
        match node.kind() {
            "type_identifier" => Some(self.text(node)),
            "generic_type" => named_children(&node)
                .into_iter()
                .find(|child| child.kind() != "type_arguments")
                .and_then(|base| self.type_name(base)),
            "scoped_type_identifier" => {
                let parts: Vec<String> = named_children(&node)
                    .into_iter()
                    .filter_map(|child| self.type_name(child))
                    .collect();
                (!parts.is_empty()).then(|| parts.join("."))
            }
            "annotated_type" => named_children(&node)
                .into_iter()
                .last()
                .and_then(|ty| self.type_name(ty)),
            _ => None,
        }
    }

    fn push(&mut self, target: String, kind: EdgeKind, context: Option<String>) {
        if target.is_empty() {
            return;
        }
        let mut edge = DependencyEdge::new(self.class_name, target, kind);
        edge.context = context;
        if self.seen.insert(edge.key()) {
            self.edges.push(edge);
        }
    }

    fn text(&self, node: TSNode<'_>) -> String {
        extract_text(&node, self.source)
            .split_whitespace()
            .collect()
    }
}

fn is_type_node(kind: &str) -> bool {
    matches!(
        kind,
        "type_identifier"
            | "scoped_type_identifier"
            | "generic_type"
            | "array_type"
            | "annotated_type"
            | "integral_type"
            | "floating_point_type"
            | "boolean_type"
    )
}

/// Classifies every top-level type of a parsed compilation unit.
///
/// The tree must be free of syntax errors; the caller rejects broken trees.
pub fn classify_unit(root: &TSNode<'_>, source: &[u8], file_path: &Path) -> Result<ParseResult> {
    let mut package: Option<String> = None;
    let mut imports = Vec::new();
    let mut declarations = Vec::new();

    for child in named_children(root) {
        match child.kind() {
            "package_declaration" => {
                package = named_children(&child)
                    .into_iter()
                    .find(|n| matches!(n.kind(), "scoped_identifier" | "identifier"))
                    .map(|n| extract_text(&n, source).split_whitespace().collect());
            }
            "import_declaration" => imports.push(child),
            kind if TYPE_DECLARATIONS.contains(&kind) => declarations.push(child),
            _ => {}
        }
    }

    let mut classes = Vec::with_capacity(declarations.len());
    let mut edges = Vec::new();

    for declaration in declarations {
        let line_number = declaration.start_position().row + 1;
        let name_node = declaration.child_by_field_name("name").ok_or_else(|| {
            AnalysisError::classify(
                file_path,
                format!("{} at line {} has no name", declaration.kind(), line_number),
            )
        })?;
        let record = ClassRecord::new(
            package.as_deref(),
            extract_text(&name_node, source),
            file_path.to_path_buf(),
            line_number,
        );

        let mut classifier = EdgeClassifier::new(&record.name, source);
        for import in &imports {
            classifier.visit(*import);
        }
        classifier.visit(declaration);
        edges.extend(classifier.finish());
        classes.push(record);
    }

    Ok(ParseResult {
        package,
        classes,
        edges,
    })
}
