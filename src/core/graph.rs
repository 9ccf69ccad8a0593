//! core::graph
//!
//! Dependency graph across the working set and its topological ordering.
//!
//! # Architecture
//!
//! The graph is a DAG where:
//! - Nodes are repositories whose manifest could be read
//! - An edge A -> B means A declares a dependency on B's module
//! - Modules outside the working set are not nodes
//!
//! Ordering uses Kahn's algorithm. Among repositories that are ready at the
//! same time, the one discovered first is emitted first, so identical inputs
//! always produce an identical [`Chain`].
//!
//! # Invariants
//!
//! - The graph must be acyclic; a cycle fails the build and names every
//!   implicated repository
//! - Filtering never changes relative order: the full graph is ordered first
//!   and the filtered set is taken from that order
//!
//! # Example
//!
//! ```
//! use modfleet::core::graph::{build, BuildOptions};
//! use modfleet::core::manifest::{
//!     DependencyKind, InMemoryManifests, Manifest, Requirement,
//! };
//! use modfleet::core::repository::DiscoveredRepo;
//! use modfleet::core::types::ModulePath;
//!
//! let module = |s: &str| ModulePath::new(s).unwrap();
//! let requires = |m: &mut Manifest, dep: &str| {
//!     m.insert(module(dep), Requirement { version: "v1.0.0".into(), kind: DependencyKind::Direct });
//! };
//!
//! let mut a = Manifest::new(module("x/a"));
//! requires(&mut a, "x/b");
//! let mut b = Manifest::new(module("x/b"));
//! requires(&mut b, "x/c");
//! let c = Manifest::new(module("x/c"));
//!
//! let mut manifests = InMemoryManifests::new();
//! manifests.insert("/fleet/a", a);
//! manifests.insert("/fleet/b", b);
//! manifests.insert("/fleet/c", c);
//!
//! let repos: Vec<_> = ["a", "b", "c"]
//!     .iter()
//!     .map(|n| DiscoveredRepo::new(format!("/fleet/{n}")))
//!     .collect();
//!
//! let built = build(&repos, &manifests, &BuildOptions::default()).unwrap();
//! let order: Vec<_> = built.chain.iter().map(|r| r.module().as_str()).collect();
//! assert_eq!(order, vec!["x/c", "x/b", "x/a"]);
//! assert_eq!(built.dep_count, 3);
//! ```

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use thiserror::Error;

use super::chain::Chain;
use super::manifest::{ManifestMode, ManifestSource};
use super::repository::{DiscoveredRepo, Repository};
use super::types::{ModulePath, RepoId};

/// Errors from graph construction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// The working set contains a dependency cycle.
    #[error("dependency cycle detected involving: {}", format_repos(.repos))]
    CycleDetected { repos: Vec<RepoId> },
}

fn format_repos(repos: &[RepoId]) -> String {
    repos
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A dependency between two repositories in the working set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub dependent: RepoId,
    pub dependency: RepoId,
    pub is_direct: bool,
}

/// Module identifiers restricting the chain.
///
/// When non-empty, only repositories depending directly or transitively on
/// one of these modules are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet(BTreeSet<ModulePath>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, module: &ModulePath) -> bool {
        self.0.contains(module)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModulePath> {
        self.0.iter()
    }
}

impl FromIterator<ModulePath> for FilterSet {
    fn from_iter<I: IntoIterator<Item = ModulePath>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::fmt::Display for FilterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.0.iter().map(ModulePath::as_str).collect();
        write!(f, "[{}]", names.join(" "))
    }
}

/// Inputs that shape the build besides the repository list.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub mode: ManifestMode,
    pub filter: FilterSet,
    /// Explicit version pins by module.
    pub pins: HashMap<ModulePath, String>,
}

/// A repository left out of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excluded {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct GraphBuild {
    pub chain: Chain,
    /// Number of repositories in the chain (after filtering).
    pub dep_count: usize,
    /// Every in-set edge of the unfiltered graph.
    pub edges: Vec<DependencyEdge>,
    pub excluded: Vec<Excluded>,
}

/// Build the dependency chain for the working set.
///
/// `repos` must be in discovery order; that order breaks ties.
///
/// # Errors
///
/// Returns [`GraphError::CycleDetected`] if the in-set graph is not a DAG.
/// Manifest failures are not errors: the affected repository is reported
/// in [`GraphBuild::excluded`].
pub fn build(
    repos: &[DiscoveredRepo],
    manifests: &dyn ManifestSource,
    options: &BuildOptions,
) -> Result<GraphBuild, GraphError> {
    let mut excluded = Vec::new();
    let mut nodes: Vec<Repository> = Vec::new();
    let mut by_module: HashMap<ModulePath, usize> = HashMap::new();

    for discovered in repos {
        let manifest = match manifests.read(&discovered.path, options.mode) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(repo = %discovered.path.display(), error = %e, "excluding repository");
                excluded.push(Excluded {
                    path: discovered.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if let Some(&first) = by_module.get(&manifest.module) {
            let reason = format!(
                "module {} is already provided by {}",
                manifest.module,
                nodes[first].path().display()
            );
            tracing::warn!(repo = %discovered.path.display(), %reason, "excluding repository");
            excluded.push(Excluded {
                path: discovered.path.clone(),
                reason,
            });
            continue;
        }

        let mut repo = Repository::new(discovered, manifest);
        if let Some(pin) = options.pins.get(repo.module()) {
            repo = repo.with_pin(pin.clone());
        }
        by_module.insert(repo.module().clone(), nodes.len());
        nodes.push(repo);
    }

    let graph = IndexGraph::new(&nodes, &by_module);
    let order = graph.kahn_order().map_err(|stuck| GraphError::CycleDetected {
        repos: stuck.into_iter().map(|i| nodes[i].id().clone()).collect(),
    })?;

    let edges = graph.edges(&nodes);

    let keep: Option<HashSet<usize>> = if options.filter.is_empty() {
        None
    } else {
        Some(graph.dependents_of_filter(&nodes, &options.filter))
    };

    let mut slots: Vec<Option<Repository>> = nodes.into_iter().map(Some).collect();
    let ordered = order
        .into_iter()
        .filter(|i| keep.as_ref().map_or(true, |k| k.contains(i)))
        .filter_map(|i| slots[i].take());
    let chain = Chain::new(ordered);

    Ok(GraphBuild {
        dep_count: chain.len(),
        chain,
        edges,
        excluded,
    })
}

/// Adjacency over node indices.
struct IndexGraph {
    /// `deps[i]` = nodes that `i` depends on, with directness
    deps: Vec<Vec<(usize, bool)>>,
    /// `dependents[j]` = nodes that depend on `j`
    dependents: Vec<Vec<usize>>,
}

impl IndexGraph {
    fn new(nodes: &[Repository], by_module: &HashMap<ModulePath, usize>) -> Self {
        let mut deps = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];

        for (i, node) in nodes.iter().enumerate() {
            for (module, requirement) in node.requirements() {
                if let Some(&j) = by_module.get(module) {
                    if i != j {
                        deps[i].push((j, requirement.is_direct()));
                        dependents[j].push(i);
                    }
                }
            }
        }

        Self { deps, dependents }
    }

    /// Kahn's algorithm with smallest-index-first tie breaking.
    ///
    /// On failure returns the nodes implicated in a cycle.
    fn kahn_order(&self) -> Result<Vec<usize>, Vec<usize>> {
        let n = self.deps.len();
        let mut in_degree: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &d)| d == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(i)) = ready.pop() {
            order.push(i);
            for &d in &self.dependents[i] {
                in_degree[d] -= 1;
                if in_degree[d] == 0 {
                    ready.push(Reverse(d));
                }
            }
        }

        if order.len() == n {
            return Ok(order);
        }

        let mut stuck: HashSet<usize> = (0..n).filter(|&i| in_degree[i] > 0).collect();
        // Drop pure downstream dependents until only cycle members remain.
        loop {
            let leaves: Vec<usize> = stuck
                .iter()
                .copied()
                .filter(|&i| !self.dependents[i].iter().any(|d| stuck.contains(d)))
                .collect();
            if leaves.is_empty() {
                break;
            }
            for leaf in leaves {
                stuck.remove(&leaf);
            }
        }

        let mut stuck: Vec<usize> = stuck.into_iter().collect();
        stuck.sort_unstable();
        Err(stuck)
    }

    fn edges(&self, nodes: &[Repository]) -> Vec<DependencyEdge> {
        self.deps
            .iter()
            .enumerate()
            .flat_map(|(i, deps)| {
                deps.iter().map(move |&(j, is_direct)| DependencyEdge {
                    dependent: nodes[i].id().clone(),
                    dependency: nodes[j].id().clone(),
                    is_direct,
                })
            })
            .collect()
    }

    /// Nodes that depend, directly or through other nodes, on a filter module.
    fn dependents_of_filter(&self, nodes: &[Repository], filter: &FilterSet) -> HashSet<usize> {
        let mut result = HashSet::new();
        let mut queue: VecDeque<usize> = nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| filter.iter().any(|m| n.depends_on(m)))
            .map(|(i, _)| i)
            .collect();

        // Repositories that provide a filter module pull in their dependents too.
        for (i, node) in nodes.iter().enumerate() {
            if filter.contains(node.module()) {
                queue.extend(self.dependents[i].iter().copied());
            }
        }

        while let Some(current) = queue.pop_front() {
            if result.insert(current) {
                queue.extend(self.dependents[current].iter().copied());
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{
        DependencyKind, InMemoryManifests, Manifest, ManifestError, Requirement,
    };
    use std::path::Path;

    fn module(s: &str) -> ModulePath {
        ModulePath::new(s).unwrap()
    }

    /// Fleet fixture: `(name, [(dependency, direct)])`, in discovery order.
    fn fleet(spec: &[(&str, &[(&str, bool)])]) -> (Vec<DiscoveredRepo>, InMemoryManifests) {
        let mut manifests = InMemoryManifests::new();
        let mut repos = Vec::new();
        for (name, deps) in spec {
            let mut manifest = Manifest::new(module(&format!("x/{name}")));
            for (dep, direct) in *deps {
                manifest.insert(
                    module(&format!("x/{dep}")),
                    Requirement {
                        version: "v1.0.0".into(),
                        kind: if *direct {
                            DependencyKind::Direct
                        } else {
                            DependencyKind::Transitive
                        },
                    },
                );
            }
            let path = format!("/fleet/{name}");
            manifests.insert(path.clone(), manifest);
            repos.push(DiscoveredRepo::new(path));
        }
        (repos, manifests)
    }

    fn names(build: &GraphBuild) -> Vec<String> {
        build
            .chain
            .iter()
            .map(|r| r.module().short_name().to_string())
            .collect()
    }

    #[test]
    fn linear_chain_orders_dependencies_first() {
        let (repos, manifests) = fleet(&[
            ("a", &[("b", true)]),
            ("b", &[("c", true)]),
            ("c", &[]),
        ]);
        let built = build(&repos, &manifests, &BuildOptions::default()).unwrap();
        assert_eq!(names(&built), vec!["c", "b", "a"]);
        assert_eq!(built.dep_count, 3);
        assert_eq!(built.edges.len(), 2);
    }

    #[test]
    fn ties_follow_discovery_order() {
        let (repos, manifests) = fleet(&[
            ("d", &[("a", true)]),
            ("b", &[]),
            ("a", &[]),
            ("c", &[]),
        ]);
        let built = build(&repos, &manifests, &BuildOptions::default()).unwrap();
        // d becomes ready once a is emitted and outranks c by discovery index
        assert_eq!(names(&built), vec!["b", "a", "d", "c"]);
    }

    #[test]
    fn external_dependencies_are_not_nodes() {
        let (repos, manifests) = fleet(&[("a", &[("external", true)]), ("b", &[])]);
        let built = build(&repos, &manifests, &BuildOptions::default()).unwrap();
        assert_eq!(names(&built), vec!["a", "b"]);
        assert!(built.edges.is_empty());
    }

    #[test]
    fn cycle_names_every_member() {
        let (repos, manifests) = fleet(&[
            ("a", &[("b", true)]),
            ("b", &[("c", true)]),
            ("c", &[("a", true)]),
        ]);
        let err = build(&repos, &manifests, &BuildOptions::default()).unwrap_err();
        let GraphError::CycleDetected { repos: members } = err;
        let members: Vec<_> = members.iter().map(|r| r.to_string()).collect();
        assert_eq!(members, vec!["/fleet/a", "/fleet/b", "/fleet/c"]);
    }

    #[test]
    fn cycle_report_excludes_downstream_dependents() {
        let (repos, manifests) = fleet(&[
            ("top", &[("a", true)]),
            ("a", &[("b", true)]),
            ("b", &[("a", true)]),
            ("free", &[]),
        ]);
        let GraphError::CycleDetected { repos: members } =
            build(&repos, &manifests, &BuildOptions::default()).unwrap_err();
        assert_eq!(
            members,
            vec![RepoId::new("/fleet/a"), RepoId::new("/fleet/b")]
        );
    }

    #[test]
    fn cycle_error_display_lists_repos() {
        let err = GraphError::CycleDetected {
            repos: vec![RepoId::new("/r/a"), RepoId::new("/r/b")],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle detected involving: /r/a, /r/b"
        );
    }

    #[test]
    fn direct_mode_ignores_transitive_edges() {
        let (repos, manifests) = fleet(&[("a", &[("b", false)]), ("b", &[])]);
        let options = BuildOptions {
            mode: ManifestMode::Direct,
            ..Default::default()
        };
        let built = build(&repos, &manifests, &options).unwrap();
        assert!(built.edges.is_empty());
        assert_eq!(names(&built), vec!["a", "b"]);

        let built = build(&repos, &manifests, &BuildOptions::default()).unwrap();
        assert_eq!(names(&built), vec!["b", "a"]);
        assert!(!built.edges[0].is_direct);
    }

    #[test]
    fn filter_keeps_transitive_dependents_in_order() {
        let (repos, manifests) = fleet(&[
            ("app", &[("svc", true)]),
            ("svc", &[("lib", true)]),
            ("lib", &[("base", true)]),
            ("base", &[]),
            ("tool", &[]),
        ]);
        let options = BuildOptions {
            filter: [module("x/base")].into_iter().collect(),
            ..Default::default()
        };
        let built = build(&repos, &manifests, &options).unwrap();
        assert_eq!(names(&built), vec!["lib", "svc", "app"]);
        assert_eq!(built.dep_count, 3);
    }

    #[test]
    fn filter_on_external_module() {
        let (repos, manifests) = fleet(&[
            ("a", &[("b", true)]),
            ("b", &[("ext", true)]),
            ("c", &[]),
        ]);
        let options = BuildOptions {
            filter: [module("x/ext")].into_iter().collect(),
            ..Default::default()
        };
        let built = build(&repos, &manifests, &options).unwrap();
        assert_eq!(names(&built), vec!["b", "a"]);
    }

    #[test]
    fn pins_are_applied_by_module() {
        let (repos, manifests) = fleet(&[("a", &[]), ("b", &[])]);
        let options = BuildOptions {
            pins: [(module("x/b"), "v2.0.0".to_string())].into_iter().collect(),
            ..Default::default()
        };
        let built = build(&repos, &manifests, &options).unwrap();
        assert_eq!(built.chain.get(0).unwrap().pinned_version(), None);
        assert_eq!(built.chain.get(1).unwrap().pinned_version(), Some("v2.0.0"));
    }

    struct Broken(InMemoryManifests);

    impl ManifestSource for Broken {
        fn read(&self, repo: &Path, mode: ManifestMode) -> Result<Manifest, ManifestError> {
            if repo.ends_with("bad") {
                return Err(ManifestError::Parse {
                    path: repo.join("go.mod"),
                    line: 3,
                    message: "garbage".into(),
                });
            }
            self.0.read(repo, mode)
        }
    }

    #[test]
    fn unreadable_manifest_excludes_only_that_repo() {
        let (mut repos, manifests) = fleet(&[("a", &[("b", true)]), ("b", &[])]);
        repos.insert(1, DiscoveredRepo::new("/fleet/bad"));

        let built = build(&repos, &Broken(manifests), &BuildOptions::default()).unwrap();
        assert_eq!(names(&built), vec!["b", "a"]);
        assert_eq!(built.excluded.len(), 1);
        assert_eq!(built.excluded[0].path, PathBuf::from("/fleet/bad"));
    }

    #[test]
    fn duplicate_module_keeps_first_discovered() {
        let (mut repos, mut manifests) = fleet(&[("a", &[])]);
        manifests.insert("/elsewhere/a", Manifest::new(module("x/a")));
        repos.push(DiscoveredRepo::new("/elsewhere/a"));

        let built = build(&repos, &manifests, &BuildOptions::default()).unwrap();
        assert_eq!(built.dep_count, 1);
        assert_eq!(built.chain.get(0).unwrap().path(), Path::new("/fleet/a"));
        assert_eq!(built.excluded.len(), 1);
    }

    #[test]
    fn empty_working_set_builds_empty_chain() {
        let built = build(&[], &InMemoryManifests::new(), &BuildOptions::default()).unwrap();
        assert!(built.chain.is_empty());
        assert_eq!(built.dep_count, 0);
    }
}
