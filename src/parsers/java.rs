use std::path::Path;
use tracing::debug;

use super::classifier::classify_unit;
use super::common::{first_error_position, TreeSitterParser};
use super::{LanguageParser, ParseResult};
use crate::error::{AnalysisError, Result};

/// tree-sitter based Java front end.
///
/// Trees with syntax errors are rejected instead of partially classified.
pub struct JavaParser;

impl JavaParser {
    pub fn new() -> Result<Self> {
        // Fail early if the grammar and runtime disagree on the ABI version.
        TreeSitterParser::new(tree_sitter_java::language())?;
        Ok(Self)
    }

    pub fn parse_source(&self, file_path: &Path, source: &str) -> Result<ParseResult> {
        let mut parser = TreeSitterParser::new(tree_sitter_java::language())?;
        let tree = parser.parse_source(file_path, source)?;
        let root_node = tree.root_node();

        if let Some((line, column)) = first_error_position(&root_node) {
            return Err(AnalysisError::parse(
                file_path,
                format!("syntax error at {}:{}", line, column),
            ));
        }

        let result = classify_unit(&root_node, source.as_bytes(), file_path)?;
        debug!(
            file = %file_path.display(),
            classes = result.classes.len(),
            edges = result.edges.len(),
            "classified"
        );
        Ok(result)
    }
}

impl LanguageParser for JavaParser {
    fn parse_file(&self, file_path: &Path) -> Result<ParseResult> {
        let source = TreeSitterParser::read_source(file_path)?;
        self.parse_source(file_path, &source)
    }

    fn language_name(&self) -> &str {
        "java"
    }
}
