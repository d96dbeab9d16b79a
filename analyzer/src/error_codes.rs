//! Registry of finding and error codes
//!
//! # Code Ranges
//!
//! - C1001-C1999: closecheck findings (leaked disposable values)
//! - E0001-E0999: parse errors in analyzed sources
//! - E1000-E1999: configuration errors
//! - E4000-E4999: package loading and import errors
//!
//! Findings are reported as warnings; `E` codes abort the run before any
//! analysis happens.

use std::collections::HashMap;
use std::fmt;

/// A registered code with its category and help text
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// `C` for findings, `E` for errors
    pub prefix: char,
    pub code: u16,
    pub category: &'static str,
    pub description: &'static str,
    pub help: Option<&'static str>,
}

impl ErrorCode {
    pub const fn new(
        prefix: char,
        code: u16,
        category: &'static str,
        description: &'static str,
        help: Option<&'static str>,
    ) -> Self {
        Self {
            prefix,
            code,
            category,
            description,
            help,
        }
    }

    /// Format as e.g. "C1005" or "E4001"
    pub fn format_code(&self) -> String {
        format!("{}{:04}", self.prefix, self.code)
    }

    pub fn is_finding(&self) -> bool {
        self.prefix == 'C'
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}]: {}",
            self.format_code(),
            self.category,
            self.description
        )
    }
}

/// All known codes, keyed by their formatted form
pub struct ErrorCodeRegistry {
    codes: HashMap<String, ErrorCode>,
}

impl ErrorCodeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            codes: HashMap::new(),
        };
        registry.register_all_codes();
        registry
    }

    /// Look up a code by its formatted string (e.g. "C1001")
    pub fn get(&self, code: &str) -> Option<&ErrorCode> {
        self.codes.get(code)
    }

    fn register(&mut self, error_code: ErrorCode) {
        self.codes.insert(error_code.format_code(), error_code);
    }

    fn register_all_codes(&mut self) {
        // ===== FINDINGS (C1001-C1999) =====
        self.register(ErrorCode::new(
            'C',
            1001,
            "Disposal",
            "Disposable result of a call is never assigned",
            Some("Assign the result and close it, or return it to the caller"),
        ));
        self.register(ErrorCode::new(
            'C',
            1002,
            "Disposal",
            "Disposable result of a deferred call is dropped",
            Some("Call the function before the defer and defer closing its result"),
        ));
        self.register(ErrorCode::new(
            'C',
            1003,
            "Disposal",
            "Disposable result of a goroutine call is dropped",
            Some("Close the value inside the goroutine"),
        ));
        self.register(ErrorCode::new(
            'C',
            1004,
            "Disposal",
            "Disposable value assigned to the blank identifier",
            Some("Bind the value to a name and close it"),
        ));
        self.register(ErrorCode::new(
            'C',
            1005,
            "Disposal",
            "Disposable value is never closed",
            Some("Close the value, defer its closing, return it, or pass it to a function that closes it"),
        ));

        // ===== PARSE ERRORS (E0001-E0999) =====
        self.register(ErrorCode::new(
            'E',
            1,
            "Parser",
            "Invalid syntax",
            Some("The analyzed file must be valid Go"),
        ));

        // ===== CONFIGURATION ERRORS (E1000-E1999) =====
        self.register(ErrorCode::new(
            'E',
            1001,
            "Config",
            "Invalid configuration",
            Some("Check closecheck.toml and the command-line flags"),
        ));

        // ===== LOAD ERRORS (E4000-E4999) =====
        self.register(ErrorCode::new(
            'E',
            4001,
            "Import",
            "Unresolved import",
            Some("Imports must name a bundled standard library package or a directory under the analysis root"),
        ));
        self.register(ErrorCode::new(
            'E',
            4002,
            "Import",
            "Import cycle",
            Some("Break the cycle between the listed packages"),
        ));
        self.register(ErrorCode::new(
            'E',
            4003,
            "Import",
            "Disposable interface not found",
            Some("`disposable-interface` must name an interface type, e.g. \"io.Closer\""),
        ));
    }

    /// Codes sharing a prefix, sorted by number
    pub fn get_prefix(&self, prefix: char) -> Vec<&ErrorCode> {
        let mut codes: Vec<&ErrorCode> = self
            .codes
            .values()
            .filter(|code| code.prefix == prefix)
            .collect();
        codes.sort_by_key(|code| code.code);
        codes
    }

    pub fn findings(&self) -> Vec<&ErrorCode> {
        self.get_prefix('C')
    }

    pub fn is_valid_code(&self, code: &str) -> bool {
        self.codes.contains_key(code)
    }
}

impl Default for ErrorCodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: std::sync::OnceLock<ErrorCodeRegistry> = std::sync::OnceLock::new();

/// The process-wide registry
pub fn error_registry() -> &'static ErrorCodeRegistry {
    REGISTRY.get_or_init(ErrorCodeRegistry::new)
}

/// Look up a code in the global registry
pub fn get_error_code(code: &str) -> Option<&'static ErrorCode> {
    error_registry().get(code)
}

/// Split "C1005" into `('C', 1005)`
pub fn parse_error_code(code_str: &str) -> Option<(char, u16)> {
    let mut chars = code_str.chars();
    let prefix = chars.next().filter(|c| *c == 'C' || *c == 'E')?;
    let number = chars.as_str();
    if number.len() != 4 {
        return None;
    }
    number.parse::<u16>().ok().map(|n| (prefix, n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_creation() {
        let code = ErrorCode::new('C', 1005, "Disposal", "not closed", Some("close it"));
        assert_eq!(code.format_code(), "C1005");
        assert!(code.is_finding());
        assert_eq!(
            code.to_string(),
            "C1005 [Disposal]: not closed"
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ErrorCodeRegistry::new();
        assert_eq!(registry.get("C1004").map(|c| c.code), Some(1004));
        assert_eq!(registry.get("E0001").map(|c| c.category), Some("Parser"));
        assert!(registry.get("C9999").is_none());
    }

    #[test]
    fn test_findings_are_sorted() {
        let registry = error_registry();
        let codes: Vec<u16> = registry.findings().iter().map(|c| c.code).collect();
        assert_eq!(codes, vec![1001, 1002, 1003, 1004, 1005]);
    }

    #[test]
    fn test_parse_error_code() {
        assert_eq!(parse_error_code("C1001"), Some(('C', 1001)));
        assert_eq!(parse_error_code("E0001"), Some(('E', 1)));
        assert_eq!(parse_error_code("X1001"), None);
        assert_eq!(parse_error_code("C12"), None);
    }

    #[test]
    fn test_diagnostic_codes_are_registered() {
        use diagnostics::closecheck::UnassignedCause;

        for cause in [
            UnassignedCause::NotAssigned,
            UnassignedCause::Defer,
            UnassignedCause::Go,
        ] {
            assert!(error_registry().is_valid_code(cause.code()));
        }
    }
}
