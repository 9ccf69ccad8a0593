//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`ModulePath`] - Validated module identifier (e.g. `github.com/org/lib`)
//! - [`SemVer`] - Parsed `vMAJOR.MINOR.PATCH` release tag
//! - [`RepoId`] - Identity of a repository in the working set (its path)
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use modfleet::core::types::{BranchName, ModulePath, SemVer};
//!
//! let branch = BranchName::new("deps/update").unwrap();
//! let module = ModulePath::new("github.com/acme/widgets").unwrap();
//! let version = SemVer::parse("v1.4.2").unwrap();
//!
//! assert_eq!(branch.as_str(), "deps/update");
//! assert_eq!(module.as_str(), "github.com/acme/widgets");
//! assert_eq!(version.bump_patch().to_string(), "v1.4.3");
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(ModulePath::new("has space").is_err());
//! ```

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid module path: {0}")]
    InvalidModulePath(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |why: &str| Err(TypeError::InvalidBranchName(why.to_string()));

        if name.is_empty() {
            return reject("branch name cannot be empty");
        }
        if name == "@" {
            return reject("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return reject("branch name cannot start with '.' or '-'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return reject("branch name cannot end with '.lock' or '/'");
        }
        for seq in ["..", "@{", "//"] {
            if name.contains(seq) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{seq}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name
            .chars()
            .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
        {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot contain {c:?}"
            )));
        }

        if name
            .split('/')
            .any(|component| component.starts_with('.') || component.ends_with(".lock"))
        {
            return reject("path component cannot start with '.' or end with '.lock'");
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated module identifier.
///
/// Module paths are slash-separated import paths such as
/// `github.com/acme/widgets` or `example.com/tools/v2`. They are compared
/// byte-for-byte; no case folding is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModulePath(String);

impl ModulePath {
    /// Create a new validated module path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidModulePath` if the path is empty, contains
    /// whitespace or control characters, or has empty path components.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        if path.is_empty() {
            return Err(TypeError::InvalidModulePath(
                "module path cannot be empty".into(),
            ));
        }
        if path
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '"' || c == '`')
        {
            return Err(TypeError::InvalidModulePath(format!(
                "module path contains invalid characters: {path:?}"
            )));
        }
        if path.split('/').any(str::is_empty) {
            return Err(TypeError::InvalidModulePath(format!(
                "module path has an empty component: {path:?}"
            )));
        }
        Ok(Self(path))
    }

    /// Get the module path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path element, ignoring a trailing major-version suffix (`/v2`).
    pub fn short_name(&self) -> &str {
        let mut parts = self.0.rsplit('/');
        let last = parts.next().unwrap_or(&self.0);
        if is_major_suffix(last) {
            parts.next().unwrap_or(last)
        } else {
            last
        }
    }
}

fn is_major_suffix(component: &str) -> bool {
    component
        .strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

impl TryFrom<String> for ModulePath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ModulePath> for String {
    fn from(path: ModulePath) -> Self {
        path.0
    }
}

impl AsRef<str> for ModulePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ModulePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A semantic version as used in release tags (`v1.2.3`, `v1.2.3-rc.1`).
///
/// Build metadata (`+...`) is accepted and ignored for ordering. Pre-release
/// identifiers sort before the corresponding release and are compared as
/// plain strings otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
}

impl SemVer {
    /// Parse a version string. The leading `v` is optional.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidVersion` for anything that is not
    /// `MAJOR.MINOR.PATCH` with an optional pre-release suffix.
    pub fn parse(input: &str) -> Result<Self, TypeError> {
        let invalid = || TypeError::InvalidVersion(input.to_string());

        let body = input.strip_prefix('v').unwrap_or(input);
        let body = body.split_once('+').map_or(body, |(core, _build)| core);
        let (core, pre) = match body.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(invalid()),
            None => (body, None),
        };

        let mut numbers = core.split('.').map(|n| {
            if n.is_empty() || (n.len() > 1 && n.starts_with('0')) {
                None
            } else {
                n.parse::<u64>().ok()
            }
        });
        let major = numbers.next().flatten().ok_or_else(invalid)?;
        let minor = numbers.next().flatten().ok_or_else(invalid)?;
        let patch = numbers.next().flatten().ok_or_else(invalid)?;
        if numbers.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    /// Next patch release. Pre-release information is dropped.
    pub fn bump_patch(&self) -> Self {
        Self {
            major: self.major,
            minor: self.minor,
            patch: self.patch + 1,
            pre: None,
        }
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for SemVer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

/// Identity of a repository in the working set.
///
/// Two repositories are the same iff their working-tree paths are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId(PathBuf);

impl RepoId {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl AsRef<Path> for RepoId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_common_names() {
            for name in ["main", "deps/update", "feature-1", "user@topic", "v1.2"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn rejects_invalid_names() {
            for name in [
                "", "@", ".hidden", "-flag", "x.lock", "x/", "a..b", "a@{b", "a//b", "a b",
                "a~b", "a^b", "a:b", "a?b", "a*b", "a[b", "a/.b", "a\u{7f}",
            ] {
                assert!(BranchName::new(name).is_err(), "{name:?} should be invalid");
            }
        }

        #[test]
        fn serde_rejects_invalid() {
            let parsed: Result<BranchName, _> = serde_json::from_str("\"a..b\"");
            assert!(parsed.is_err());
        }
    }

    mod module_path {
        use super::*;

        #[test]
        fn accepts_import_paths() {
            let m = ModulePath::new("github.com/acme/widgets").unwrap();
            assert_eq!(m.as_str(), "github.com/acme/widgets");
            assert_eq!(m.to_string(), "github.com/acme/widgets");
        }

        #[test]
        fn rejects_bad_paths() {
            assert!(ModulePath::new("").is_err());
            assert!(ModulePath::new("a b").is_err());
            assert!(ModulePath::new("a//b").is_err());
            assert!(ModulePath::new("/abs").is_err());
            assert!(ModulePath::new("quoted\"").is_err());
        }

        #[test]
        fn short_name_skips_major_suffix() {
            assert_eq!(
                ModulePath::new("github.com/acme/widgets").unwrap().short_name(),
                "widgets"
            );
            assert_eq!(
                ModulePath::new("github.com/acme/widgets/v3").unwrap().short_name(),
                "widgets"
            );
            assert_eq!(ModulePath::new("v2").unwrap().short_name(), "v2");
        }
    }

    mod semver {
        use super::*;

        #[test]
        fn parses_with_and_without_prefix() {
            assert_eq!(
                SemVer::parse("v1.2.3").unwrap(),
                SemVer::parse("1.2.3").unwrap()
            );
            let v = SemVer::parse("v0.10.7-rc.1+build5").unwrap();
            assert_eq!((v.major, v.minor, v.patch), (0, 10, 7));
            assert_eq!(v.pre.as_deref(), Some("rc.1"));
        }

        #[test]
        fn rejects_malformed() {
            for input in ["", "v1", "v1.2", "v1.2.3.4", "v1.02.3", "v1.2.x", "v1.2.3-"] {
                assert!(SemVer::parse(input).is_err(), "{input:?} should be invalid");
            }
        }

        #[test]
        fn ordering_puts_prerelease_first() {
            let rc = SemVer::parse("v1.0.0-rc.1").unwrap();
            let release = SemVer::parse("v1.0.0").unwrap();
            let next = SemVer::parse("v1.0.1").unwrap();
            assert!(rc < release);
            assert!(release < next);
        }

        #[test]
        fn bump_patch_drops_prerelease() {
            let v = SemVer::parse("v2.3.4-beta").unwrap();
            assert_eq!(v.bump_patch().to_string(), "v2.3.5");
        }
    }
}
