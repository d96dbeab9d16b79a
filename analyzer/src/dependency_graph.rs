//! Import graph of the loaded packages
//!
//! Packages are checked dependency-first. [`DependencyGraph::analyze`] groups
//! them into levels: every package in a level only imports packages of
//! earlier levels, so the packages of one level can be processed in
//! parallel. Import cycles are reported and leave the affected packages out
//! of the levels.

use std::collections::{BTreeMap, BTreeSet};

/// Import graph keyed by import path
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// importer -> imported
    imports: BTreeMap<String, BTreeSet<String>>,

    /// imported -> importers
    importers: BTreeMap<String, BTreeSet<String>>,
}

/// Result of dependency analysis
#[derive(Debug)]
pub struct DependencyAnalysis {
    /// Packages grouped so that each only depends on earlier groups
    pub levels: Vec<Vec<String>>,

    /// Detected import cycles (if any)
    pub circular_dependencies: Vec<CircularDependency>,
}

impl DependencyAnalysis {
    pub fn has_cycles(&self) -> bool {
        !self.circular_dependencies.is_empty()
    }
}

/// An import cycle, first package repeated at the end
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularDependency {
    pub cycle: Vec<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package with no imports yet
    pub fn add_package(&mut self, path: &str) {
        self.imports.entry(path.to_string()).or_default();
        self.importers.entry(path.to_string()).or_default();
    }

    /// Record that `importer` imports `imported`
    pub fn add_import(&mut self, importer: &str, imported: &str) {
        self.add_package(importer);
        self.add_package(imported);

        self.imports
            .entry(importer.to_string())
            .or_default()
            .insert(imported.to_string());
        self.importers
            .entry(imported.to_string())
            .or_default()
            .insert(importer.to_string());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.imports.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    /// Detect cycles and compute dependency levels
    pub fn analyze(&self) -> DependencyAnalysis {
        let mut circular_dependencies = Vec::new();

        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();

        for package in self.imports.keys() {
            if !visited.contains(package) {
                self.detect_cycles(
                    package,
                    &mut visited,
                    &mut rec_stack,
                    &mut path,
                    &mut circular_dependencies,
                );
            }
        }

        DependencyAnalysis {
            levels: self.levels(),
            circular_dependencies,
        }
    }

    fn detect_cycles(
        &self,
        package: &str,
        visited: &mut BTreeSet<String>,
        rec_stack: &mut BTreeSet<String>,
        path: &mut Vec<String>,
        cycles: &mut Vec<CircularDependency>,
    ) {
        visited.insert(package.to_string());
        rec_stack.insert(package.to_string());
        path.push(package.to_string());

        if let Some(imported) = self.imports.get(package) {
            for next in imported {
                if !visited.contains(next) {
                    self.detect_cycles(next, visited, rec_stack, path, cycles);
                } else if rec_stack.contains(next) {
                    if let Some(start) = path.iter().position(|p| p == next) {
                        let mut cycle = path[start..].to_vec();
                        cycle.push(next.clone());
                        cycles.push(CircularDependency { cycle });
                    }
                }
            }
        }

        path.pop();
        rec_stack.remove(package);
    }

    /// Kahn's algorithm, one wave per level
    fn levels(&self) -> Vec<Vec<String>> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .imports
            .iter()
            .map(|(package, imported)| (package.as_str(), imported.len()))
            .collect();

        let mut current: Vec<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(package, _)| *package)
            .collect();

        let mut levels = Vec::new();
        while !current.is_empty() {
            let mut next = BTreeSet::new();
            for package in &current {
                if let Some(importers) = self.importers.get(*package) {
                    for importer in importers {
                        if let Some(degree) = in_degree.get_mut(importer.as_str()) {
                            *degree -= 1;
                            if *degree == 0 {
                                next.insert(importer.as_str());
                            }
                        }
                    }
                }
            }
            levels.push(current.iter().map(|p| p.to_string()).collect());
            current = next.into_iter().collect();
        }

        levels
    }
}

impl CircularDependency {
    pub fn format_error(&self) -> String {
        format!("Import cycle detected:\n  {}", self.cycle.join(" -> "))
    }
}
