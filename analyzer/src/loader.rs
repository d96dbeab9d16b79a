//! Package loading
//!
//! Import paths are directories relative to the analysis root (GOPATH
//! style). An import resolves to a bundled standard library stub first and
//! to a directory of the [`SourceTree`] second; anything else is an
//! unresolved import. Loading is all-or-nothing: a file that fails to parse,
//! an unresolved import or an import cycle aborts before any analysis.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

use diagnostics::closecheck::CloseCheckDiagnostics;
use diagnostics::Diagnostic;
use fxhash::FxHashMap;
use indexmap::IndexMap;
use log::{debug, info};
use parser::{parse_go_file_with_diagnostics, GoFile, Span};
use source_map::{FileId, SourceMap, SourceSpan};
use walkdir::WalkDir;

use crate::config::{Config, ConfigError, LoadConfig};
use crate::dependency_graph::{CircularDependency, DependencyGraph};
use crate::types::stdlib::stub_package;
use crate::types::{
    check_package, PackageScope, SymbolKind, SymbolTable, TypeId, TypeInfo, TypeTable, Universe,
};

/// One source file of a [`SourceTree`]
#[derive(Debug, Clone)]
pub struct TreeFile {
    pub name: String,
    pub content: String,
}

/// Go sources grouped by import path
#[derive(Debug, Clone, Default)]
pub struct SourceTree {
    packages: BTreeMap<String, Vec<TreeFile>>,
}

impl SourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an in-memory file to package `package`
    pub fn add_file(&mut self, package: &str, file_name: &str, content: impl Into<String>) {
        self.packages
            .entry(package.to_string())
            .or_default()
            .push(TreeFile {
                name: format!("{}/{}", package, file_name),
                content: content.into(),
            });
    }

    /// Discover packages below `root`
    ///
    /// Hidden directories, directories named in `exclude`, `_test.go` files
    /// and files directly in `root` are skipped.
    pub fn from_dir(root: &Path, config: &LoadConfig) -> Result<Self, LoadError> {
        let mut tree = Self::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !name.starts_with('.')
                    && !name.starts_with('_')
                    && !config.exclude.iter().any(|excluded| *excluded == name)
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                LoadError::Io { path, source }
            })?;

            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !entry.file_type().is_file()
                || !file_name.ends_with(".go")
                || file_name.ends_with("_test.go")
            {
                continue;
            }

            let Some(package) = path
                .parent()
                .and_then(|dir| dir.strip_prefix(root).ok())
                .map(import_path_of)
                .filter(|package| !package.is_empty())
            else {
                debug!("skipping {} outside a package directory", path.display());
                continue;
            };

            let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;

            tree.packages.entry(package).or_default().push(TreeFile {
                name: path.display().to_string(),
                content,
            });
        }

        debug!("discovered {} packages under {}", tree.packages.len(), root.display());
        Ok(tree)
    }

    pub fn contains(&self, package: &str) -> bool {
        self.packages.contains_key(package)
    }

    pub fn files(&self, package: &str) -> Option<&[TreeFile]> {
        self.packages.get(package).map(Vec::as_slice)
    }

    pub fn package_paths(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Expand package patterns: exact paths, `dir/...` and `...`
    ///
    /// No patterns selects every package in the tree.
    pub fn match_patterns(&self, patterns: &[String]) -> Result<Vec<String>, LoadError> {
        if patterns.is_empty() {
            return Ok(self.packages.keys().cloned().collect());
        }

        let mut matched: Vec<String> = Vec::new();
        for pattern in patterns {
            let pattern = pattern.trim_start_matches("./").trim_end_matches('/');
            let hits: Vec<&String> = match pattern.strip_suffix("...") {
                Some(prefix) => {
                    let prefix = prefix.trim_end_matches('/');
                    self.packages
                        .keys()
                        .filter(|path| {
                            prefix.is_empty()
                                || path.as_str() == prefix
                                || path
                                    .strip_prefix(prefix)
                                    .is_some_and(|rest| rest.starts_with('/'))
                        })
                        .collect()
                }
                None => self.packages.keys().filter(|path| *path == pattern).collect(),
            };

            if hits.is_empty() {
                return Err(LoadError::NoMatch {
                    pattern: pattern.to_string(),
                });
            }
            for hit in hits {
                if !matched.contains(hit) {
                    matched.push(hit.clone());
                }
            }
        }

        matched.sort();
        Ok(matched)
    }
}

fn import_path_of(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// A parsed and type checked package
#[derive(Debug)]
pub struct Package {
    pub path: String,
    /// Name from the package clause
    pub name: String,
    pub files: Vec<(FileId, GoFile)>,
    pub scope: PackageScope,
    pub info: TypeInfo,
    pub imports: Vec<String>,
    pub is_stub: bool,
    /// Selected by the package patterns, as opposed to only imported
    pub requested: bool,
}

/// Everything loading produces
#[derive(Debug)]
pub struct Program {
    pub source_map: SourceMap,
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub universe: Universe,
    /// Packages in dependency order
    pub packages: Vec<Package>,
    /// Indices into `packages`, dependencies first
    pub levels: Vec<Vec<usize>>,
    /// The resolved disposable interface
    pub closer: TypeId,
}

impl Program {
    pub fn package(&self, path: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.path == path)
    }

    pub fn requested_packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.iter().filter(|p| p.requested)
    }

    pub fn span(&self, file: FileId, span: Span) -> Option<SourceSpan> {
        self.source_map.span_from_offsets(file, span.start, span.end)
    }
}

#[derive(Debug)]
pub enum LoadError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(Box<Diagnostic>),
    UnresolvedImport {
        path: String,
        diagnostic: Box<Diagnostic>,
    },
    ImportCycle(CircularDependency),
    /// The disposable interface does not resolve to an interface type
    MissingCapability { name: String },
    NoMatch { pattern: String },
    Config(ConfigError),
}

impl LoadError {
    pub fn code(&self) -> &'static str {
        match self {
            LoadError::Parse(_) => "E0001",
            LoadError::Io { .. } | LoadError::UnresolvedImport { .. } | LoadError::NoMatch { .. } => {
                "E4001"
            }
            LoadError::ImportCycle(_) => "E4002",
            LoadError::MissingCapability { .. } => "E4003",
            LoadError::Config(e) => e.code(),
        }
    }

    /// Source-located diagnostic, for errors that point into a file
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            LoadError::Parse(diagnostic) => Some(diagnostic),
            LoadError::UnresolvedImport { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => write!(f, "failed to read {}: {}", path.display(), source),
            LoadError::Parse(diagnostic) => write!(f, "{}", diagnostic.message),
            LoadError::UnresolvedImport { path, .. } => {
                write!(f, "cannot resolve import \"{}\"", path)
            }
            LoadError::ImportCycle(cycle) => write!(f, "{}", cycle.format_error()),
            LoadError::MissingCapability { name } => {
                write!(f, "disposable interface {} is not an interface type", name)
            }
            LoadError::NoMatch { pattern } => write!(f, "pattern \"{}\" matched no packages", pattern),
            LoadError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        LoadError::Config(e)
    }
}

/// A package after parsing, before checking
struct ParsedPackage {
    path: String,
    files: Vec<(FileId, GoFile)>,
    imports: Vec<String>,
    is_stub: bool,
}

/// Loads packages into a [`Program`]
///
/// The loader keeps the source map of a failed load so its diagnostics can
/// still be rendered.
pub struct Loader<'c> {
    config: &'c Config,
    source_map: SourceMap,
}

impl<'c> Loader<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self {
            config,
            source_map: SourceMap::new(),
        }
    }

    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }

    /// Load the packages of `tree` selected by `patterns`, plus their imports
    pub fn load(&mut self, tree: &SourceTree, patterns: &[String]) -> Result<Program, LoadError> {
        let Some((closer_package, closer_name)) =
            self.config.analysis.disposable_interface_parts()
        else {
            return Err(ConfigError::Invalid(format!(
                "disposable-interface \"{}\" is not a qualified name",
                self.config.analysis.disposable_interface
            ))
            .into());
        };

        let requested = tree.match_patterns(patterns)?;
        info!("loading {} packages", requested.len());

        let parsed = self.parse_closure(tree, &requested, closer_package)?;

        let mut graph = DependencyGraph::new();
        for package in parsed.values() {
            graph.add_package(&package.path);
            for import in &package.imports {
                graph.add_import(&package.path, import);
            }
        }
        let analysis = graph.analyze();
        if let Some(cycle) = analysis.circular_dependencies.into_iter().next() {
            return Err(LoadError::ImportCycle(cycle));
        }

        let mut types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let universe = Universe::new(&mut types, &mut symbols);

        let mut parsed = parsed;
        let mut packages: Vec<Package> = Vec::with_capacity(parsed.len());
        let mut levels = Vec::with_capacity(analysis.levels.len());

        for level in &analysis.levels {
            let mut indices = Vec::with_capacity(level.len());
            for path in level {
                let Some(package) = parsed.shift_remove(path) else {
                    continue;
                };

                let checked = {
                    let deps: FxHashMap<&str, &PackageScope> = packages
                        .iter()
                        .filter(|p| package.imports.contains(&p.path))
                        .map(|p| (p.path.as_str(), &p.scope))
                        .collect();
                    check_package(
                        &package.path,
                        &package.files,
                        &mut types,
                        &mut symbols,
                        &universe,
                        &deps,
                    )
                };

                let name = package
                    .files
                    .first()
                    .map(|(_, file)| file.package.name.clone())
                    .unwrap_or_default();

                indices.push(packages.len());
                packages.push(Package {
                    requested: requested.contains(&package.path),
                    path: package.path,
                    name,
                    files: package.files,
                    scope: checked.scope,
                    info: checked.info,
                    imports: package.imports,
                    is_stub: package.is_stub,
                });
            }
            levels.push(indices);
        }

        let closer = packages
            .iter()
            .find(|p| p.path == closer_package)
            .and_then(|p| p.scope.get(closer_name))
            .and_then(|id| symbols.get(*id))
            .filter(|symbol| symbol.kind == SymbolKind::TypeName && types.is_interface(symbol.ty))
            .map(|symbol| symbol.ty)
            .ok_or_else(|| LoadError::MissingCapability {
                name: self.config.analysis.disposable_interface.clone(),
            })?;

        info!(
            "loaded {} packages in {} levels",
            packages.len(),
            levels.len()
        );

        Ok(Program {
            source_map: std::mem::take(&mut self.source_map),
            types,
            symbols,
            universe,
            packages,
            levels,
            closer,
        })
    }

    /// Parse the requested packages and everything they import
    fn parse_closure(
        &mut self,
        tree: &SourceTree,
        requested: &[String],
        closer_package: &str,
    ) -> Result<IndexMap<String, ParsedPackage>, LoadError> {
        let mut parsed: IndexMap<String, ParsedPackage> = IndexMap::new();
        let mut worklist: VecDeque<String> = requested.iter().cloned().collect();

        if stub_package(closer_package).is_some() || tree.contains(closer_package) {
            worklist.push_back(closer_package.to_string());
        } else {
            return Err(LoadError::MissingCapability {
                name: self.config.analysis.disposable_interface.clone(),
            });
        }

        while let Some(path) = worklist.pop_front() {
            if parsed.contains_key(&path) {
                continue;
            }

            let package = if let Some(stub) = stub_package(&path) {
                let file_id = self
                    .source_map
                    .add_file(stub.display_name(), stub.source);
                let file = self.parse(file_id)?;
                ParsedPackage {
                    path: path.clone(),
                    files: vec![(file_id, file)],
                    imports: Vec::new(),
                    is_stub: true,
                }
            } else if let Some(tree_files) = tree.files(&path) {
                let mut files = Vec::with_capacity(tree_files.len());
                for tree_file in tree_files {
                    let file_id = self
                        .source_map
                        .add_file(tree_file.name.clone(), tree_file.content.clone());
                    files.push((file_id, self.parse(file_id)?));
                }
                ParsedPackage {
                    path: path.clone(),
                    files,
                    imports: Vec::new(),
                    is_stub: false,
                }
            } else {
                // Requested paths and the closer package come from the tree
                // or the stubs, so only imports reach this point.
                return Err(LoadError::NoMatch { pattern: path });
            };

            let mut package = package;
            for (file_id, file) in &package.files {
                for import in &file.imports {
                    if stub_package(&import.path).is_none() && !tree.contains(&import.path) {
                        let span = self
                            .source_map
                            .span_from_offsets(*file_id, import.span.start, import.span.end)
                            .unwrap_or_else(|| {
                                SourceSpan::single_position(
                                    source_map::SourcePosition::new(1, 1, 0),
                                    *file_id,
                                )
                            });
                        return Err(LoadError::UnresolvedImport {
                            path: import.path.clone(),
                            diagnostic: Box::new(CloseCheckDiagnostics::unresolved_import(
                                span,
                                &import.path,
                            )),
                        });
                    }
                    if !package.imports.contains(&import.path) {
                        package.imports.push(import.path.clone());
                    }
                    worklist.push_back(import.path.clone());
                }
            }

            debug!(
                "parsed {} ({} files, {} imports{})",
                package.path,
                package.files.len(),
                package.imports.len(),
                if package.is_stub { ", stub" } else { "" }
            );
            parsed.insert(path, package);
        }

        Ok(parsed)
    }

    fn parse(&self, file_id: FileId) -> Result<GoFile, LoadError> {
        parse_go_file_with_diagnostics(&self.source_map, file_id)
            .map_err(|diagnostic| LoadError::Parse(Box::new(diagnostic)))
    }
}

/// Discover and load packages below `root`
pub fn load(root: &Path, patterns: &[String], config: &Config) -> Result<Program, LoadError> {
    let tree = SourceTree::from_dir(root, &config.load)?;
    load_tree(&tree, patterns, config)
}

/// Load packages from an already built tree
pub fn load_tree(
    tree: &SourceTree,
    patterns: &[String],
    config: &Config,
) -> Result<Program, LoadError> {
    Loader::new(config).load(tree, patterns)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(files: &[(&str, &str)]) -> SourceTree {
        let mut tree = SourceTree::new();
        for (package, content) in files {
            tree.add_file(package, "main.go", *content);
        }
        tree
    }

    #[test]
    fn test_loads_imports_dependencies_first() {
        let tree = tree(&[
            (
                "app",
                "package app\n\nimport (\n\t\"app/store\"\n\t\"net/http\"\n)\n\nfunc Run() {\n\tstore.Open()\n\thttp.Get(\"x\")\n}\n",
            ),
            (
                "app/store",
                "package store\n\nimport \"os\"\n\nfunc Open() (*os.File, error) { return os.Open(\"db\") }\n",
            ),
        ]);

        let program = load_tree(&tree, &["app".to_string()], &Config::default()).unwrap();

        let order: Vec<&str> = program.packages.iter().map(|p| p.path.as_str()).collect();
        let position = |path: &str| order.iter().position(|p| *p == path).unwrap();
        assert!(order.contains(&"io"));
        assert!(position("os") < position("app/store"));
        assert!(position("app/store") < position("app"));
        assert!(position("net/http") < position("app"));

        let requested: Vec<&str> = program.requested_packages().map(|p| p.path.as_str()).collect();
        assert_eq!(requested, vec!["app"]);
        assert!(program.package("net/http").unwrap().is_stub);
        assert_eq!(program.package("app/store").unwrap().name, "store");
        assert_eq!(program.types.type_string(program.closer), "io.Closer");
    }

    #[test]
    fn test_patterns() {
        let tree = tree(&[
            ("app", "package app\n"),
            ("app/store", "package store\n"),
            ("apple", "package apple\n"),
        ]);

        assert_eq!(
            tree.match_patterns(&["app/...".to_string()]).unwrap(),
            vec!["app", "app/store"]
        );
        assert_eq!(tree.match_patterns(&["...".to_string()]).unwrap().len(), 3);
        assert_eq!(tree.match_patterns(&[]).unwrap().len(), 3);
        assert!(matches!(
            tree.match_patterns(&["missing".to_string()]),
            Err(LoadError::NoMatch { .. })
        ));
    }

    #[test]
    fn test_unresolved_import() {
        let tree = tree(&[("app", "package app\n\nimport \"github.com/x/y\"\n")]);

        let err = load_tree(&tree, &[], &Config::default()).unwrap_err();
        assert_eq!(err.code(), "E4001");
        let diagnostic = err.diagnostic().unwrap();
        assert_eq!(diagnostic.code.as_deref(), Some("E4001"));
        assert_eq!(diagnostic.message, "cannot resolve import \"github.com/x/y\"");
    }

    #[test]
    fn test_import_cycle() {
        let tree = tree(&[
            ("a", "package a\n\nimport \"b\"\n"),
            ("b", "package b\n\nimport \"a\"\n"),
        ]);

        let err = load_tree(&tree, &[], &Config::default()).unwrap_err();
        assert_eq!(err.code(), "E4002");
        assert!(err.to_string().contains("a -> b -> a"));
    }

    #[test]
    fn test_parse_error_is_fatal() {
        let tree = tree(&[("app", "package app\n\nfunc {\n")]);

        let config = Config::default();
        let mut loader = Loader::new(&config);
        let Err(err) = loader.load(&tree, &[]) else {
            panic!("expected a parse error");
        };
        assert_eq!(err.code(), "E0001");
        assert!(err.diagnostic().is_some());
        assert!(!loader.source_map().is_empty());
    }

    #[test]
    fn test_disposable_interface_must_be_an_interface() {
        let tree = tree(&[("app", "package app\n")]);
        let mut config = Config::default();
        config.analysis.disposable_interface = "os.File".to_string();

        let err = load_tree(&tree, &[], &config).unwrap_err();
        assert_eq!(err.code(), "E4003");

        config.analysis.disposable_interface = "example.com/missing.Closer".to_string();
        let err = load_tree(&tree, &[], &config).unwrap_err();
        assert!(matches!(err, LoadError::MissingCapability { .. }));
    }

    #[test]
    fn test_custom_interface_from_tree() {
        let tree = tree(&[(
            "pool",
            "package pool\n\ntype Releaser interface {\n\tRelease()\n}\n",
        )]);
        let mut config = Config::default();
        config.analysis.disposable_interface = "pool.Releaser".to_string();

        let program = load_tree(&tree, &[], &config).unwrap();
        assert_eq!(program.types.type_string(program.closer), "pool.Releaser");
    }
}
