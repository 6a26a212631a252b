use anyhow::Result;
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::core::{DependencyEdge, LayoutFrame};

/// Compact JSON export of an edge set and, optionally, its layout.
///
/// Classes are listed once and referenced by index; edges are `[source, target, kind]`
/// triples with numeric kind codes.
pub struct JsonCompactFormatter {
    /// Drop edge contexts and keep only the triples.
    minimal: bool,
}

impl JsonCompactFormatter {
    pub fn new() -> Self {
        Self { minimal: true }
    }

    pub fn with_context(mut self, include: bool) -> Self {
        self.minimal = !include;
        self
    }

    pub fn format_to_file(
        &self,
        edges: &[DependencyEdge],
        frame: Option<&LayoutFrame>,
        output_path: &Path,
    ) -> Result<()> {
        let json_content = self.format(edges, frame)?;
        fs::write(output_path, json_content)?;
        Ok(())
    }

    pub fn format(&self, edges: &[DependencyEdge], frame: Option<&LayoutFrame>) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value(edges, frame))?)
    }

    pub fn to_value(&self, edges: &[DependencyEdge], frame: Option<&LayoutFrame>) -> Value {
        let classes: Vec<&str> = edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let ids: HashMap<&str, usize> = classes.iter().enumerate().map(|(i, c)| (*c, i)).collect();

        let edges_json: Vec<Value> = edges
            .iter()
            .map(|edge| {
                let source = ids[edge.source.as_str()];
                let target = ids[edge.target.as_str()];
                match (&edge.context, self.minimal) {
                    (Some(context), false) => json!([source, target, edge.kind.code(), context]),
                    _ => json!([source, target, edge.kind.code()]),
                }
            })
            .collect();

        let positions: Vec<Value> = match frame {
            Some(frame) => classes
                .iter()
                .map(|class| match frame.positions.get(*class) {
                    Some(p) => json!([round(p.x), round(p.y)]),
                    None => Value::Null,
                })
                .collect(),
            None => Vec::new(),
        };

        json!({
            "meta": {
                "classes": classes.len(),
                "edges": edges.len(),
                "settled": frame.is_some_and(LayoutFrame::settled),
            },
            "classes": classes,
            "edges": edges_json,
            "positions": positions,
        })
    }
}

impl Default for JsonCompactFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
