pub mod classifier;
pub mod common;
pub mod java;

use std::path::Path;

use crate::core::{ClassRecord, DependencyEdge};
use crate::error::Result;

/// Everything one compilation unit contributes; edges are grouped by class.
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    pub package: Option<String>,
    pub classes: Vec<ClassRecord>,
    pub edges: Vec<DependencyEdge>,
}

pub trait LanguageParser {
    fn parse_file(&self, file_path: &Path) -> Result<ParseResult>;
    fn language_name(&self) -> &str;
}
