//! `closecheck.toml` parsing
//!
//! ```toml
//! [analysis]
//! disposable-interface = "io.Closer"
//! disposal-method = "Close"
//! nop-wrappers = ["io.NopCloser", "io/ioutil.NopCloser"]
//! max-summary-passes = 2
//! trace = false
//!
//! [load]
//! exclude = ["vendor", "testdata"]
//!
//! [output]
//! format = "text"
//! color = true
//! ```
//!
//! Every key is optional; a missing file means all defaults.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "closecheck.toml";

/// Complete analyzer configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub load: LoadConfig,
    pub output: OutputConfig,
}

/// `[analysis]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Qualified name of the interface that marks a type disposable
    pub disposable_interface: String,
    /// Method whose call disposes a value
    pub disposal_method: String,
    /// Functions whose results are never tracked (`pkg/path.Func`)
    pub nop_wrappers: Vec<String>,
    /// Upper bound on summarizer passes over the candidate functions
    pub max_summary_passes: usize,
    /// Emit a statement-by-statement trace of both passes
    pub trace: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            disposable_interface: "io.Closer".to_string(),
            disposal_method: "Close".to_string(),
            nop_wrappers: vec!["io.NopCloser".to_string(), "io/ioutil.NopCloser".to_string()],
            max_summary_passes: 2,
            trace: false,
        }
    }
}

impl AnalysisConfig {
    /// Split `disposable-interface` into package path and type name
    pub fn disposable_interface_parts(&self) -> Option<(&str, &str)> {
        self.disposable_interface
            .rsplit_once('.')
            .filter(|(package, name)| !package.is_empty() && !name.is_empty())
    }
}

/// `[load]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct LoadConfig {
    /// Directory names skipped while discovering packages
    pub exclude: Vec<String>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            exclude: vec!["vendor".to_string(), "testdata".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// `[output]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            color: true,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: Option<PathBuf>, message: String },
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        "E1001"
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            ConfigError::Parse {
                path: Some(path),
                message,
            } => write!(f, "failed to parse {}: {}", path.display(), message),
            ConfigError::Parse {
                path: None,
                message,
            } => write!(f, "failed to parse configuration: {}", message),
            ConfigError::Invalid(message) => write!(f, "invalid configuration: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl Config {
    /// Reject values the analysis cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.max_summary_passes == 0 {
            return Err(ConfigError::Invalid(
                "max-summary-passes must be at least 1".to_string(),
            ));
        }
        if self.analysis.disposable_interface_parts().is_none() {
            return Err(ConfigError::Invalid(format!(
                "disposable-interface must be a qualified name like \"io.Closer\", got \"{}\"",
                self.analysis.disposable_interface
            )));
        }
        if self.analysis.disposal_method.is_empty() {
            return Err(ConfigError::Invalid(
                "disposal-method must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a `closecheck.toml` string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: None,
        message: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}

/// Read and parse a config file
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content).map_err(|e| match e {
        ConfigError::Parse { message, .. } => ConfigError::Parse {
            path: Some(path.to_path_buf()),
            message,
        },
        other => other,
    })
}

/// Load `<root>/closecheck.toml` if present, else defaults
pub fn discover(root: &Path) -> Result<Config, ConfigError> {
    let path = root.join(CONFIG_FILE_NAME);
    if path.is_file() {
        log::info!("using configuration {}", path.display());
        load_config(&path)
    } else {
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.disposable_interface, "io.Closer");
        assert_eq!(config.analysis.disposal_method, "Close");
        assert_eq!(config.analysis.max_summary_passes, 2);
        assert_eq!(config.analysis.nop_wrappers.len(), 2);
        assert_eq!(config.output.format, OutputFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full() {
        let config = parse_config(
            r#"
[analysis]
disposable-interface = "example.com/res.Releaser"
disposal-method = "Release"
nop-wrappers = []
max-summary-passes = 4
trace = true

[load]
exclude = ["third_party"]

[output]
format = "json"
color = false
"#,
        )
        .unwrap();

        assert_eq!(
            config.analysis.disposable_interface_parts(),
            Some(("example.com/res", "Releaser"))
        );
        assert_eq!(config.analysis.disposal_method, "Release");
        assert!(config.analysis.nop_wrappers.is_empty());
        assert_eq!(config.analysis.max_summary_passes, 4);
        assert!(config.analysis.trace);
        assert_eq!(config.load.exclude, vec!["third_party"]);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(!config.output.color);
    }

    #[test]
    fn test_partial_keeps_defaults() {
        let config = parse_config("[analysis]\ntrace = true\n").unwrap();
        assert!(config.analysis.trace);
        assert_eq!(config.analysis.disposal_method, "Close");
        assert_eq!(config.load.exclude, vec!["vendor", "testdata"]);
    }

    #[test]
    fn test_rejects_zero_passes() {
        let err = parse_config("[analysis]\nmax-summary-passes = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert_eq!(err.code(), "E1001");
    }

    #[test]
    fn test_rejects_unqualified_interface() {
        let err = parse_config("[analysis]\ndisposable-interface = \"Closer\"\n").unwrap_err();
        assert!(err.to_string().contains("qualified name"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let err = parse_config("[analysis]\nmax-passes = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
