use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tree_sitter::{Language, Node as TSNode, Parser, Tree};

use crate::error::{AnalysisError, Result};

pub struct TreeSitterParser {
    parser: Parser,
}

impl TreeSitterParser {
    pub fn new(language: Language) -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(language)
            .map_err(|err| AnalysisError::Pipeline(format!("grammar load failed: {:?}", err)))?;
        Ok(Self { parser })
    }

    pub fn parse_source(&mut self, file_path: &Path, source: &str) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| AnalysisError::parse(file_path, "parser produced no tree"))
    }

    /// Buffered read sized to the file.
    pub fn read_source(file_path: &Path) -> Result<String> {
        let file = File::open(file_path).map_err(|err| AnalysisError::io(file_path, &err))?;
        let file_size = file
            .metadata()
            .map(|metadata| metadata.len() as usize)
            .unwrap_or(0);

        let mut reader = BufReader::with_capacity(file_size.clamp(1, 8192), file);
        let mut content = String::with_capacity(file_size);
        reader
            .read_to_string(&mut content)
            .map_err(|err| AnalysisError::io(file_path, &err))?;
        Ok(content)
    }
}

pub fn extract_text<'a>(node: &TSNode, source: &'a [u8]) -> &'a str {
    std::str::from_utf8(&source[node.byte_range()]).unwrap_or("")
}

pub fn find_child_by_kind<'a>(node: &TSNode<'a>, kind: &str) -> Option<TSNode<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

pub fn named_children<'a>(node: &TSNode<'a>) -> Vec<TSNode<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// First syntax error in the tree, as `(line, column)` one-based.
pub fn first_error_position(node: &TSNode) -> Option<(usize, usize)> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        let point = node.start_position();
        return Some((point.row + 1, point.column + 1));
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .iter()
        .find_map(first_error_position)
        .or_else(|| {
            let point = node.start_position();
            Some((point.row + 1, point.column + 1))
        })
}
