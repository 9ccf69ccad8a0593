//! core::manifest
//!
//! Reading a repository's declared and resolved module dependencies.
//!
//! # Formats
//!
//! Repositories in the fleet are Go modules:
//! - `go.mod` holds the module path and its `require` directives. Entries
//!   annotated `// indirect` are recorded but are not explicit declarations.
//! - `go.sum` holds the resolved transitive closure, one
//!   `module version hash` triple per line.
//!
//! # Modes
//!
//! - [`ManifestMode::Direct`]: only explicit (non-indirect) `go.mod` requires.
//! - [`ManifestMode::Recursive`]: every module named in `go.sum` plus every
//!   `go.mod` require.
//!
//! # Conflicting constraints
//!
//! When a module is reachable both directly and transitively, the most
//! direct declaration wins: a `go.mod` require beats any `go.sum` entry, and
//! among several `go.sum` versions the highest semantic version wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::types::{ModulePath, SemVer};

/// File name of the declared manifest.
pub const MANIFEST_FILE: &str = "go.mod";

/// File name of the resolved dependency set.
pub const LOCK_FILE: &str = "go.sum";

/// Errors from reading a manifest.
///
/// Any of these excludes the repository from the chain; none of them aborts
/// the run.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no go.mod found in {path}")]
    Missing { path: PathBuf },

    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed dependency declaration in '{path}' line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Which dependency set to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestMode {
    /// Only explicitly declared dependencies.
    Direct,
    /// The full resolved transitive set.
    #[default]
    Recursive,
}

/// How a dependency entered the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    Direct,
    Transitive,
}

/// A version constraint on one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub version: String,
    pub kind: DependencyKind,
}

impl Requirement {
    pub fn is_direct(&self) -> bool {
        self.kind == DependencyKind::Direct
    }
}

/// A repository's module identity and dependency set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub module: ModulePath,
    pub requirements: BTreeMap<ModulePath, Requirement>,
}

impl Manifest {
    pub fn new(module: ModulePath) -> Self {
        Self {
            module,
            requirements: BTreeMap::new(),
        }
    }

    /// Whether this manifest names `module` as a dependency.
    pub fn depends_on(&self, module: &ModulePath) -> bool {
        self.requirements.contains_key(module)
    }

    /// Record a requirement, keeping the most direct declaration.
    ///
    /// A direct entry replaces a transitive one. Between two entries of the
    /// same kind the higher semantic version wins; unparseable versions
    /// never replace an existing entry.
    pub fn insert(&mut self, module: ModulePath, incoming: Requirement) {
        use std::collections::btree_map::Entry;

        match self.requirements.entry(module) {
            Entry::Vacant(slot) => {
                slot.insert(incoming);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get();
                let replace = match (current.kind, incoming.kind) {
                    (DependencyKind::Transitive, DependencyKind::Direct) => true,
                    (DependencyKind::Direct, DependencyKind::Transitive) => false,
                    _ => match (
                        SemVer::parse(&current.version),
                        SemVer::parse(&incoming.version),
                    ) {
                        (Ok(have), Ok(new)) => new > have,
                        (Err(_), Ok(_)) => true,
                        _ => false,
                    },
                };
                if replace {
                    slot.insert(incoming);
                }
            }
        }
    }
}

/// Capability for reading manifests.
///
/// Manifest reads are synchronous: they are small local file reads done once
/// per repository during graph construction.
pub trait ManifestSource: Send + Sync {
    /// Read the manifest of the repository rooted at `repo`.
    fn read(&self, repo: &Path, mode: ManifestMode) -> Result<Manifest, ManifestError>;
}

/// Reads `go.mod` / `go.sum` from the working tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoModules;

impl ManifestSource for GoModules {
    fn read(&self, repo: &Path, mode: ManifestMode) -> Result<Manifest, ManifestError> {
        let mod_path = repo.join(MANIFEST_FILE);
        if !mod_path.is_file() {
            return Err(ManifestError::Missing {
                path: repo.to_path_buf(),
            });
        }
        let contents = read_file(&mod_path)?;
        let parsed = parse_go_mod(&mod_path, &contents)?;

        let mut manifest = Manifest::new(parsed.module);

        if mode == ManifestMode::Recursive {
            let sum_path = repo.join(LOCK_FILE);
            if sum_path.is_file() {
                let sums = read_file(&sum_path)?;
                for (module, version) in parse_go_sum(&sum_path, &sums)? {
                    if module == manifest.module {
                        continue;
                    }
                    manifest.insert(
                        module,
                        Requirement {
                            version,
                            kind: DependencyKind::Transitive,
                        },
                    );
                }
            }
        }

        for require in parsed.requires {
            if require.module == manifest.module {
                continue;
            }
            match (mode, require.indirect) {
                (ManifestMode::Direct, true) => continue,
                (_, indirect) => {
                    let requirement = Requirement {
                        version: require.version,
                        kind: if indirect {
                            DependencyKind::Transitive
                        } else {
                            DependencyKind::Direct
                        },
                    };
                    // go.mod is authoritative over go.sum, even for indirect entries
                    manifest.requirements.remove(&require.module);
                    manifest.insert(require.module, requirement);
                }
            }
        }

        Ok(manifest)
    }
}

fn read_file(path: &Path) -> Result<String, ManifestError> {
    fs::read_to_string(path).map_err(|source| ManifestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// A single `require` entry from `go.mod`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoRequire {
    pub module: ModulePath,
    pub version: String,
    pub indirect: bool,
}

/// The parts of `go.mod` that matter for ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoMod {
    pub module: ModulePath,
    pub requires: Vec<GoRequire>,
}

/// Parse the contents of a `go.mod` file.
///
/// Only `module` and `require` directives are interpreted; every other
/// directive (and its block, if any) is skipped.
pub fn parse_go_mod(path: &Path, contents: &str) -> Result<GoMod, ManifestError> {
    let parse_err = |line: usize, message: String| ManifestError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut module = None;
    let mut requires = Vec::new();
    // Some(true) inside a require block, Some(false) inside any other block
    let mut block: Option<bool> = None;

    for (idx, raw) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let (code, comment) = match raw.split_once("//") {
            Some((code, comment)) => (code.trim(), Some(comment.trim())),
            None => (raw.trim(), None),
        };
        let indirect = comment.is_some_and(|c| c.split(';').any(|p| p.trim() == "indirect"));
        if code.is_empty() {
            continue;
        }

        if let Some(in_require) = block {
            if code == ")" {
                block = None;
            } else if in_require {
                requires.push(parse_require(code, indirect).map_err(|m| parse_err(line_no, m))?);
            }
            continue;
        }

        let (directive, rest) = code
            .split_once(char::is_whitespace)
            .map(|(d, r)| (d, r.trim()))
            .unwrap_or((code, ""));

        match directive {
            "module" => {
                let name = unquote(rest);
                let parsed = ModulePath::new(name).map_err(|e| parse_err(line_no, e.to_string()))?;
                module = Some(parsed);
            }
            "require" if rest == "(" => block = Some(true),
            "require" => {
                requires.push(parse_require(rest, indirect).map_err(|m| parse_err(line_no, m))?);
            }
            _ if rest.ends_with('(') => block = Some(false),
            _ => {}
        }
    }

    if block.is_some() {
        return Err(parse_err(
            contents.lines().count(),
            "unterminated block".to_string(),
        ));
    }

    let module = module.ok_or_else(|| parse_err(1, "missing module directive".to_string()))?;
    Ok(GoMod { module, requires })
}

fn parse_require(spec: &str, indirect: bool) -> Result<GoRequire, String> {
    let fields: Vec<&str> = spec.split_whitespace().collect();
    match fields.as_slice() {
        [module, version] => Ok(GoRequire {
            module: ModulePath::new(unquote(module)).map_err(|e| e.to_string())?,
            version: (*version).to_string(),
            indirect,
        }),
        _ => Err(format!("expected `<module> <version>`, found {spec:?}")),
    }
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '`')
}

/// Parse the contents of a `go.sum` file into `(module, version)` pairs.
///
/// `/go.mod` hash lines are folded into the module version they describe.
pub fn parse_go_sum(path: &Path, contents: &str) -> Result<Vec<(ModulePath, String)>, ManifestError> {
    let mut entries = Vec::new();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let [module, version, _hash] = fields.as_slice() else {
            return Err(ManifestError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                message: format!("expected `<module> <version> <hash>`, found {line:?}"),
            });
        };
        let module = ModulePath::new(*module).map_err(|e| ManifestError::Parse {
            path: path.to_path_buf(),
            line: idx + 1,
            message: e.to_string(),
        })?;
        let version = version.strip_suffix("/go.mod").unwrap_or(*version);
        entries.push((module, version.to_string()));
    }
    Ok(entries)
}

/// Manifest source backed by a map, for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifests {
    manifests: BTreeMap<PathBuf, Manifest>,
}

impl InMemoryManifests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a manifest for the repository at `repo`.
    pub fn insert(&mut self, repo: impl Into<PathBuf>, manifest: Manifest) {
        self.manifests.insert(repo.into(), manifest);
    }
}

impl ManifestSource for InMemoryManifests {
    fn read(&self, repo: &Path, mode: ManifestMode) -> Result<Manifest, ManifestError> {
        let manifest = self
            .manifests
            .get(repo)
            .ok_or_else(|| ManifestError::Missing {
                path: repo.to_path_buf(),
            })?;
        if mode == ManifestMode::Recursive {
            return Ok(manifest.clone());
        }
        let mut direct = Manifest::new(manifest.module.clone());
        direct.requirements = manifest
            .requirements
            .iter()
            .filter(|(_, req)| req.is_direct())
            .map(|(m, r)| (m.clone(), r.clone()))
            .collect();
        Ok(direct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn module(s: &str) -> ModulePath {
        ModulePath::new(s).unwrap()
    }

    const GO_MOD: &str = r#"module github.com/acme/app

go 1.21

require github.com/acme/log v1.0.0

require (
	github.com/acme/core v1.2.0
	github.com/other/yaml v3.0.1 // indirect
)

replace (
	github.com/acme/core => ../core
)
"#;

    #[test]
    fn parses_module_and_requires() {
        let parsed = parse_go_mod(Path::new("go.mod"), GO_MOD).unwrap();
        assert_eq!(parsed.module, module("github.com/acme/app"));
        assert_eq!(parsed.requires.len(), 3);
        assert!(!parsed.requires[0].indirect);
        assert!(parsed.requires[2].indirect);
        assert_eq!(parsed.requires[1].version, "v1.2.0");
    }

    #[test]
    fn missing_module_directive_is_parse_error() {
        let err = parse_go_mod(Path::new("go.mod"), "require a v1.0.0\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn malformed_require_reports_line() {
        let err =
            parse_go_mod(Path::new("go.mod"), "module x\n\nrequire (\n\tonly-module\n)\n").unwrap_err();
        match err {
            ManifestError::Parse { line, .. } => assert_eq!(line, 4),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unterminated_block_is_parse_error() {
        let err = parse_go_mod(Path::new("go.mod"), "module x\nrequire (\n a v1.0.0\n").unwrap_err();
        assert!(matches!(err, ManifestError::Parse { .. }));
    }

    #[test]
    fn go_sum_folds_go_mod_lines() {
        let sum = "a.com/x v1.0.0 h1:abc=\na.com/x v1.0.0/go.mod h1:def=\n";
        let entries = parse_go_sum(Path::new("go.sum"), sum).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|(_, v)| v == "v1.0.0"));
    }

    #[test]
    fn go_sum_rejects_short_lines() {
        assert!(parse_go_sum(Path::new("go.sum"), "a.com/x v1.0.0\n").is_err());
    }

    #[test]
    fn direct_mode_reads_only_explicit_requires() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), GO_MOD).unwrap();

        let manifest = GoModules.read(dir.path(), ManifestMode::Direct).unwrap();
        let names: Vec<_> = manifest.requirements.keys().map(|m| m.as_str()).collect();
        assert_eq!(names, vec!["github.com/acme/core", "github.com/acme/log"]);
        assert!(manifest.requirements.values().all(Requirement::is_direct));
    }

    #[test]
    fn recursive_mode_merges_go_sum_with_direct_winning() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), GO_MOD).unwrap();
        fs::write(
            dir.path().join(LOCK_FILE),
            "github.com/acme/core v1.3.0 h1:x=\n\
             github.com/acme/base v0.1.0 h1:y=\n\
             github.com/acme/base v0.2.0/go.mod h1:z=\n",
        )
        .unwrap();

        let manifest = GoModules.read(dir.path(), ManifestMode::Recursive).unwrap();

        let core = &manifest.requirements[&module("github.com/acme/core")];
        assert_eq!(core.version, "v1.2.0");
        assert!(core.is_direct());

        let base = &manifest.requirements[&module("github.com/acme/base")];
        assert_eq!(base.version, "v0.2.0");
        assert_eq!(base.kind, DependencyKind::Transitive);

        let yaml = &manifest.requirements[&module("github.com/other/yaml")];
        assert_eq!(yaml.kind, DependencyKind::Transitive);
    }

    #[test]
    fn missing_go_mod_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = GoModules.read(dir.path(), ManifestMode::Direct).unwrap_err();
        assert!(matches!(err, ManifestError::Missing { .. }));
    }

    #[test]
    fn insert_prefers_direct_then_higher_version() {
        let mut manifest = Manifest::new(module("root"));
        let dep = module("dep");
        let req = |version: &str, kind| Requirement {
            version: version.to_string(),
            kind,
        };

        manifest.insert(dep.clone(), req("v1.0.0", DependencyKind::Transitive));
        manifest.insert(dep.clone(), req("v1.5.0", DependencyKind::Transitive));
        assert_eq!(manifest.requirements[&dep].version, "v1.5.0");

        manifest.insert(dep.clone(), req("v1.1.0", DependencyKind::Direct));
        assert_eq!(manifest.requirements[&dep].version, "v1.1.0");

        manifest.insert(dep.clone(), req("v9.0.0", DependencyKind::Transitive));
        assert_eq!(manifest.requirements[&dep].version, "v1.1.0");
    }

    #[test]
    fn in_memory_direct_mode_filters_transitive() {
        let mut manifest = Manifest::new(module("a"));
        manifest.insert(
            module("b"),
            Requirement {
                version: "v1.0.0".into(),
                kind: DependencyKind::Direct,
            },
        );
        manifest.insert(
            module("c"),
            Requirement {
                version: "v1.0.0".into(),
                kind: DependencyKind::Transitive,
            },
        );
        let mut source = InMemoryManifests::new();
        source.insert("/fleet/a", manifest);

        let direct = source.read(Path::new("/fleet/a"), ManifestMode::Direct).unwrap();
        assert_eq!(direct.requirements.len(), 1);
        let all = source
            .read(Path::new("/fleet/a"), ManifestMode::Recursive)
            .unwrap();
        assert_eq!(all.requirements.len(), 2);
    }
}
