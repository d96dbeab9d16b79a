//! Driver: runs the summarizer and the checker over a loaded program
//!
//! Packages are processed one dependency level at a time so that facts of
//! imported packages exist before their importers are summarized. Packages
//! inside a level share nothing but the fact store and run in parallel.

use log::{debug, info};
use rayon::prelude::*;

use super::checker::AssignmentChecker;
use super::classifier::Classifier;
use super::fact_store::{FactError, FactStore};
use super::query::PackageView;
use super::sink::Finding;
use super::summarizer::{SummaryReport, Summarizer};
use crate::config::AnalysisConfig;
use crate::loader::{Package, Program};

/// Summarize every package and return the populated fact store
pub fn summarize(program: &Program, config: &AnalysisConfig) -> Result<FactStore, FactError> {
    let facts = FactStore::new();
    summarize_into(program, &facts, config)?;
    Ok(facts)
}

/// Summarize every package into an existing store; returns one report per
/// summarized package, in dependency order
pub fn summarize_into(
    program: &Program,
    facts: &FactStore,
    config: &AnalysisConfig,
) -> Result<Vec<(String, SummaryReport)>, FactError> {
    info!("Summarizing {} packages", program.packages.len());
    let mut reports = Vec::new();

    for level in &program.levels {
        let results: Vec<Result<(String, SummaryReport), FactError>> = level
            .par_iter()
            .filter_map(|&index| program.packages.get(index))
            .filter(|package| !package.is_stub)
            .map(|package| {
                summarize_package(program, package, facts, config)
                    .map(|report| (package.path.clone(), report))
            })
            .collect();

        for result in results {
            reports.push(result?);
        }
    }

    Ok(reports)
}

/// Check every requested package against a complete fact store
pub fn check(program: &Program, facts: &FactStore, config: &AnalysisConfig) -> Vec<Finding> {
    info!("Checking packages");
    let packages: Vec<&Package> = program
        .requested_packages()
        .filter(|package| !package.is_stub)
        .collect();

    let mut findings: Vec<Finding> = packages
        .par_iter()
        .flat_map_iter(|package| check_package(program, package, facts, config))
        .collect();

    sort_findings(&mut findings);
    findings
}

/// Summarize and check, level by level
pub fn analyze(
    program: &Program,
    facts: &FactStore,
    config: &AnalysisConfig,
) -> Result<Vec<Finding>, FactError> {
    info!(
        "Analyzing {} packages in {} levels",
        program.packages.len(),
        program.levels.len()
    );
    let mut findings = Vec::new();

    for (depth, level) in program.levels.iter().enumerate() {
        debug!("level {}: {} packages", depth, level.len());

        let results: Vec<Result<Vec<Finding>, FactError>> = level
            .par_iter()
            .filter_map(|&index| program.packages.get(index))
            .filter(|package| !package.is_stub)
            .map(|package| {
                summarize_package(program, package, facts, config)?;
                if package.requested {
                    Ok(check_package(program, package, facts, config))
                } else {
                    Ok(Vec::new())
                }
            })
            .collect();

        for result in results {
            findings.extend(result?);
        }
    }

    sort_findings(&mut findings);
    Ok(findings)
}

fn summarize_package(
    program: &Program,
    package: &Package,
    facts: &FactStore,
    config: &AnalysisConfig,
) -> Result<SummaryReport, FactError> {
    let classifier = Classifier::new(&program.types, program.closer);
    let view = PackageView::new(program, package);
    let report = Summarizer::new(view, &classifier, facts, config).run()?;

    debug!(
        "{}: {} facts in {} passes",
        package.path,
        report.facts.len(),
        report.passes
    );
    Ok(report)
}

fn check_package(
    program: &Program,
    package: &Package,
    facts: &FactStore,
    config: &AnalysisConfig,
) -> Vec<Finding> {
    let classifier = Classifier::new(&program.types, program.closer);
    let view = PackageView::new(program, package);
    let mut findings = Vec::new();
    let verified =
        AssignmentChecker::new(view, &classifier, facts, config).check_package(&mut findings);

    debug!(
        "{}: {} bodies verified, {} findings",
        package.path,
        verified,
        findings.len()
    );
    findings
}

fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        a.file
            .cmp(&b.file)
            .then(a.span.start.byte_offset.cmp(&b.span.start.byte_offset))
            .then(a.code.cmp(&b.code))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::loader::{load_tree, SourceTree};
    use crate::types::FuncKey;

    fn tree() -> SourceTree {
        let mut tree = SourceTree::new();
        tree.add_file(
            "lib",
            "lib.go",
            r#"package lib

import "io"

func Release(c io.Closer) {
    drop(c)
}

func drop(c io.Closer) {
    c.Close()
}
"#,
        );
        tree.add_file(
            "app",
            "app.go",
            r#"package app

import (
    "lib"
    "os"
)

func ok() {
    f, _ := os.Open("a")
    lib.Release(f)
}

func leak() {
    f, _ := os.Open("b")
}
"#,
        );
        tree
    }

    #[test]
    fn test_facts_cross_package_boundaries() {
        let program = load_tree(&tree(), &[], &Config::default()).unwrap();
        let config = AnalysisConfig::default();

        let facts = summarize(&program, &config).unwrap();
        assert!(facts.is_disposer(&FuncKey::from("lib.Release")));

        let findings = check(&program, &facts, &config);
        let messages: Vec<&str> = findings.iter().map(|f| f.message.as_str()).collect();
        assert_eq!(messages, vec!["f (*os.File) was not closed"]);
    }

    #[test]
    fn test_analyze_matches_summarize_then_check() {
        let program = load_tree(&tree(), &[], &Config::default()).unwrap();
        let config = AnalysisConfig::default();

        let combined = analyze(&program, &FactStore::new(), &config).unwrap();
        let facts = summarize(&program, &config).unwrap();
        let separate = check(&program, &facts, &config);

        let key = |f: &Finding| (f.file.clone(), f.line, f.message.clone());
        assert_eq!(
            combined.iter().map(key).collect::<Vec<_>>(),
            separate.iter().map(key).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_only_requested_packages_are_checked() {
        let mut tree = tree();
        tree.add_file(
            "other",
            "other.go",
            r#"package other

import "os"

func leak() {
    f, _ := os.Open("c")
}
"#,
        );
        let program = load_tree(&tree, &["app".to_string()], &Config::default()).unwrap();
        let config = AnalysisConfig::default();

        let findings = analyze(&program, &FactStore::new(), &config).unwrap();
        assert!(findings.iter().all(|f| f.package == "app"));
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_reports_are_in_dependency_order() {
        let program = load_tree(&tree(), &[], &Config::default()).unwrap();
        let facts = FactStore::new();
        let reports = summarize_into(&program, &facts, &AnalysisConfig::default()).unwrap();

        let order: Vec<&str> = reports.iter().map(|(path, _)| path.as_str()).collect();
        let lib = order.iter().position(|p| *p == "lib").unwrap();
        let app = order.iter().position(|p| *p == "app").unwrap();
        assert!(lib < app);
    }
}
