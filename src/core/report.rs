//! Per-class, per-package and per-project summaries of an edge set.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::graph::{package_of, DependencyEdge, EdgeKind};

pub const DEFAULT_PACKAGE_NAME: &str = "(default)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassReport {
    pub class_name: String,
    /// Every type the class depends on; wildcard package imports are not types and are left out.
    pub used_types: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub package_name: String,
    pub classes: Vec<ClassReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub packages: Vec<PackageReport>,
}

impl ClassReport {
    /// `None` when `class` has no outgoing edges.
    pub fn from_edges<'a>(
        class: &str,
        edges: impl IntoIterator<Item = &'a DependencyEdge>,
    ) -> Option<Self> {
        let mut report = None::<ClassReport>;
        for edge in edges.into_iter().filter(|e| e.source == class) {
            let report = report.get_or_insert_with(|| ClassReport {
                class_name: class.to_string(),
                used_types: BTreeSet::new(),
            });
            if edge.kind != EdgeKind::PackageImport {
                report.used_types.insert(edge.target.clone());
            }
        }
        report
    }
}

impl PackageReport {
    pub fn from_edges<'a>(
        package: &str,
        edges: impl IntoIterator<Item = &'a DependencyEdge>,
    ) -> Self {
        let wanted = (package != DEFAULT_PACKAGE_NAME).then_some(package);
        let edges = edges
            .into_iter()
            .filter(|e| package_of(&e.source) == wanted);
        ProjectReport::from_edges(edges)
            .packages
            .into_iter()
            .next()
            .unwrap_or_else(|| PackageReport {
                package_name: package.to_string(),
                classes: Vec::new(),
            })
    }
}

impl ProjectReport {
    /// Groups source classes by package; packages and classes are sorted by name.
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a DependencyEdge>) -> Self {
        let mut packages: BTreeMap<String, BTreeMap<String, BTreeSet<String>>> = BTreeMap::new();
        for edge in edges {
            let package = package_of(&edge.source).unwrap_or(DEFAULT_PACKAGE_NAME);
            let used = packages
                .entry(package.to_string())
                .or_default()
                .entry(edge.source.clone())
                .or_default();
            if edge.kind != EdgeKind::PackageImport {
                used.insert(edge.target.clone());
            }
        }

        let packages = packages
            .into_iter()
            .map(|(package_name, classes)| PackageReport {
                package_name,
                classes: classes
                    .into_iter()
                    .map(|(class_name, used_types)| ClassReport {
                        class_name,
                        used_types,
                    })
                    .collect(),
            })
            .collect();
        Self { packages }
    }

    pub fn class_count(&self) -> usize {
        self.packages.iter().map(|p| p.classes.len()).sum()
    }
}

impl fmt::Display for ProjectReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for package in &self.packages {
            writeln!(f, "package {}", package.package_name)?;
            for class in &package.classes {
                writeln!(f, "  {} ({})", class.class_name, class.used_types.len())?;
                for used in &class.used_types {
                    writeln!(f, "    -> {}", used)?;
                }
            }
        }
        Ok(())
    }
}
