//! # classlens
//!
//! Streaming class-dependency extraction for Java source trees, with a live
//! force-directed layout of the growing graph.
//!
//! ## Pipeline
//!
//! - **Extraction**: files are parsed with tree-sitter on a bounded worker pool and
//!   classified into typed edges (imports, inheritance, members, creations, bounds)
//! - **Aggregation**: one task deduplicates edges and republishes the graph and a status line
//! - **Layout**: an incremental simulation positions every class as the graph grows
//!
//! ## Output Formats
//!
//! - **Details**: per-class uses / used-by listing
//! - **Reports**: per-class, per-package and per-project dependency summaries
//! - **JSON-Compact**: graph and positions in a minimal JSON document

pub mod config;
pub mod core;
pub mod error;
pub mod formatters;
pub mod parsers;

pub use crate::config::Config;
pub use crate::core::{AnalysisSession, AnalysisStatus, DependencyEdge, EdgeKind};
pub use crate::error::{AnalysisError, Result};
