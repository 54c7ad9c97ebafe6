//! Quarantine targets and their normalization.
//!
//! A target pairs a Go package import path with the tests to quarantine in it.
//! Test names are either bare function names (`TestFoo`) or hierarchical
//! subtest names (`TestFoo/case_1`); the hierarchy is resolved by the rewriter,
//! not here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A (package, tests) pair requested for quarantine or unquarantine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineTarget {
    /// Package import path, e.g. `example.com/mod/pkg`.
    pub package: String,
    /// Test names within the package, in request order.
    pub tests: Vec<String>,
}

impl QuarantineTarget {
    pub fn new(package: impl Into<String>, tests: Vec<String>) -> Self {
        Self {
            package: package.into(),
            tests,
        }
    }

    /// The top-level function name a test name resolves to (`TestFoo/a/b`
    /// resolves against the declaration `TestFoo`).
    pub fn function_name(test: &str) -> &str {
        test.split('/').next().unwrap_or(test)
    }
}

impl fmt::Display for QuarantineTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.tests.join(","))
    }
}

/// Parse the CLI form `import/path:TestName[/sub[/..]]`.
///
/// One test per parsed target; `normalize` merges repeats of a package.
impl FromStr for QuarantineTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((package, test)) = s.split_once(':') else {
            return Err(TargetParseError::MissingSeparator(s.to_string()));
        };
        if package.is_empty() {
            return Err(TargetParseError::EmptyPackage(s.to_string()));
        }
        if test.is_empty() || test.split('/').any(str::is_empty) {
            return Err(TargetParseError::EmptyTest(s.to_string()));
        }
        Ok(QuarantineTarget::new(package, vec![test.to_string()]))
    }
}

/// Error parsing the `pkg:Test` command-line form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetParseError {
    #[error("target '{0}' is missing the ':' between package and test name")]
    MissingSeparator(String),
    #[error("target '{0}' has an empty package path")]
    EmptyPackage(String),
    #[error("target '{0}' has an empty test name")]
    EmptyTest(String),
}

/// Merge targets addressing the same package and drop duplicate test names.
///
/// Package order is first-seen across the input; test order is first-seen
/// within each package. Normalization is idempotent, so callers may pass raw
/// or already-normalized lists interchangeably.
pub fn normalize(targets: &[QuarantineTarget]) -> Vec<QuarantineTarget> {
    let mut out: Vec<QuarantineTarget> = Vec::new();
    for target in targets {
        match out.iter_mut().find(|t| t.package == target.package) {
            Some(existing) => {
                for test in &target.tests {
                    if !existing.tests.contains(test) {
                        existing.tests.push(test.clone());
                    }
                }
            }
            None => {
                let mut tests: Vec<String> = Vec::new();
                for test in &target.tests {
                    if !tests.contains(test) {
                        tests.push(test.clone());
                    }
                }
                out.push(QuarantineTarget::new(target.package.clone(), tests));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_merges_same_package() {
        let targets = vec![
            QuarantineTarget::new("example/pkg", vec!["TestA".into()]),
            QuarantineTarget::new("example/other", vec!["TestX".into()]),
            QuarantineTarget::new("example/pkg", vec!["TestB".into(), "TestA".into()]),
        ];
        let normalized = normalize(&targets);
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].package, "example/pkg");
        assert_eq!(normalized[0].tests, vec!["TestA", "TestB"]);
        assert_eq!(normalized[1].package, "example/other");
        assert_eq!(normalized[1].tests, vec!["TestX"]);
    }

    #[test]
    fn test_normalize_dedupes_within_one_target() {
        let targets = vec![QuarantineTarget::new(
            "example/pkg",
            vec!["TestA".into(), "TestA".into(), "TestB".into()],
        )];
        let normalized = normalize(&targets);
        assert_eq!(normalized[0].tests, vec!["TestA", "TestB"]);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let targets = vec![
            QuarantineTarget::new("a", vec!["TestA".into()]),
            QuarantineTarget::new("b", vec!["TestB".into()]),
            QuarantineTarget::new("a", vec!["TestC".into()]),
        ];
        let once = normalize(&targets);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_empty_input() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn test_function_name_strips_subtest_path() {
        assert_eq!(QuarantineTarget::function_name("TestFoo"), "TestFoo");
        assert_eq!(QuarantineTarget::function_name("TestFoo/a/b"), "TestFoo");
    }

    #[test]
    fn test_parse_target_with_subtest() {
        let t: QuarantineTarget = "example.com/mod/pkg:TestFoo/case_1".parse().unwrap();
        assert_eq!(t.package, "example.com/mod/pkg");
        assert_eq!(t.tests, vec!["TestFoo/case_1"]);
    }

    #[test]
    fn test_parse_target_rejects_bad_forms() {
        assert!("no-separator".parse::<QuarantineTarget>().is_err());
        assert!(":TestFoo".parse::<QuarantineTarget>().is_err());
        assert!("pkg:".parse::<QuarantineTarget>().is_err());
        assert!("pkg:TestFoo//x".parse::<QuarantineTarget>().is_err());
    }
}
