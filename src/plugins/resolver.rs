//! Plugin load-order resolution.
//!
//! # Responsibilities
//! - Expand declared `load_before`/`load_after` constraints against the
//!   full set of exports, wildcards included
//! - Resolve contradictions between constraints by specificity
//! - Produce a deterministic topological load order, or a fatal error
//!   naming the plugins involved in a cycle
//!
//! # Design Decisions
//! - Specificity is total: exact > scope wildcard > global wildcard. A
//!   strictly more specific constraint replaces an opposing less specific
//!   one; equally specific opposing constraints both stand, and the cycle
//!   check reports the contradiction
//! - Ties in the topological order break by declaration index, so the
//!   order is reproducible run to run

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::plugins::{ConstraintTarget, OrderConstraint, PluginExport};

/// How precisely a constraint names its target. Ordering is the
/// override priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Specificity {
    Wildcard,
    ScopeWildcard,
    Exact,
}

impl From<&ConstraintTarget> for Specificity {
    fn from(target: &ConstraintTarget) -> Self {
        match target {
            ConstraintTarget::Exact(_) => Self::Exact,
            ConstraintTarget::ScopeWildcard(_) => Self::ScopeWildcard,
            ConstraintTarget::Wildcard => Self::Wildcard,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("duplicate plugin export name {0:?}")]
    DuplicateName(String),

    #[error("plugin {0:?} declares a load order constraint on itself")]
    SelfReference(String),

    #[error("plugin {plugin:?} requires load ordering against {target:?}, which matched no plugin")]
    UnsatisfiedRequired { plugin: String, target: String },

    #[error("plugin load order contains a cycle involving: {}", names.join(", "))]
    Cycle { names: Vec<String> },
}

/// Direction of a declared constraint relative to the declaring plugin.
#[derive(Clone, Copy)]
enum Direction {
    /// Declarer loads before the target.
    Before,
    /// Declarer loads after the target.
    After,
}

/// Compute the load order for `exports`, returned as indices into the
/// input slice.
pub fn sort_exports(exports: &[PluginExport]) -> Result<Vec<usize>, ResolveError> {
    let mut by_name = HashMap::with_capacity(exports.len());
    for (idx, export) in exports.iter().enumerate() {
        if by_name.insert(export.name().to_string(), idx).is_some() {
            return Err(ResolveError::DuplicateName(export.name().to_string()));
        }
    }

    // Edge key is (dependency, dependent): dependency loads first.
    let mut edges: HashMap<(usize, usize), Specificity> = HashMap::new();

    for (idx, export) in exports.iter().enumerate() {
        for (constraints, direction) in [
            (export.load_before_constraints(), Direction::Before),
            (export.load_after_constraints(), Direction::After),
        ] {
            for constraint in constraints {
                let matches = expand(idx, export, constraint, exports)?;
                let spec = Specificity::from(&constraint.target);
                for target in matches {
                    let (first, second) = match direction {
                        Direction::Before => (idx, target),
                        Direction::After => (target, idx),
                    };
                    insert_edge(&mut edges, first, second, spec);
                }
            }
        }
    }

    kahn(exports, &edges)
}

/// Indices of exports a constraint matches. Exact self-targeting is a
/// declaration error; a wildcard sweeping up the declarer is expected
/// and silently skipped.
fn expand(
    declarer: usize,
    export: &PluginExport,
    constraint: &OrderConstraint,
    exports: &[PluginExport],
) -> Result<Vec<usize>, ResolveError> {
    let mut matches = Vec::new();
    for (idx, candidate) in exports.iter().enumerate() {
        let hit = match &constraint.target {
            ConstraintTarget::Exact(name) => candidate.name() == name,
            ConstraintTarget::ScopeWildcard(scope) => candidate
                .name()
                .strip_prefix(scope.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some(),
            ConstraintTarget::Wildcard => true,
        };
        if !hit {
            continue;
        }
        if idx == declarer {
            if matches!(constraint.target, ConstraintTarget::Exact(_)) {
                return Err(ResolveError::SelfReference(export.name().to_string()));
            }
            continue;
        }
        matches.push(idx);
    }
    if matches.is_empty() && constraint.required {
        return Err(ResolveError::UnsatisfiedRequired {
            plugin: export.name().to_string(),
            target: constraint.target.to_string(),
        });
    }
    Ok(matches)
}

fn insert_edge(
    edges: &mut HashMap<(usize, usize), Specificity>,
    first: usize,
    second: usize,
    spec: Specificity,
) {
    if let Some(&opposing) = edges.get(&(second, first)) {
        if spec > opposing {
            // Strictly more specific: the opposing edge yields.
            debug!(?spec, ?opposing, "load order constraint overridden");
            edges.remove(&(second, first));
        } else if spec < opposing {
            return;
        }
        // Equal specificity: keep both and let the cycle check report it.
    }
    edges
        .entry((first, second))
        .and_modify(|existing| {
            if spec > *existing {
                *existing = spec;
            }
        })
        .or_insert(spec);
}

fn kahn(
    exports: &[PluginExport],
    edges: &HashMap<(usize, usize), Specificity>,
) -> Result<Vec<usize>, ResolveError> {
    let n = exports.len();
    let mut indegree = vec![0usize; n];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(first, second) in edges.keys() {
        indegree[second] += 1;
        successors[first].push(second);
    }

    // Min-heap on declaration index keeps unconstrained order stable.
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&idx| indegree[idx] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &next in &successors[idx] {
            indegree[next] -= 1;
            if indegree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() < n {
        let names = (0..n)
            .filter(|&idx| indegree[idx] > 0)
            .map(|idx| exports[idx].name().to_string())
            .collect();
        return Err(ResolveError::Cycle { names });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{OrderConstraint, PluginExport};

    fn export(name: &str) -> PluginExport {
        PluginExport::new(name, |_| async { Ok(Vec::new()) })
    }

    fn names(exports: &[PluginExport], order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&idx| exports[idx].name().to_string())
            .collect()
    }

    #[test]
    fn unconstrained_keeps_declaration_order() {
        let exports = vec![export("c"), export("a"), export("b")];
        let order = sort_exports(&exports).unwrap();
        assert_eq!(names(&exports, &order), ["c", "a", "b"]);
    }

    #[test]
    fn wildcard_before_and_exact_after() {
        let exports = vec![
            export("a").load_before("*"),
            export("b"),
            export("c").load_after("a"),
        ];
        let order = sort_exports(&exports).unwrap();
        let ordered = names(&exports, &order);
        let pos = |n: &str| ordered.iter().position(|x| x == n).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
    }

    #[test]
    fn scope_wildcard_matches_only_its_scope() {
        let exports = vec![
            export("@acme/core"),
            export("standalone").load_before("@acme/*"),
            export("@acme/extras"),
        ];
        let order = sort_exports(&exports).unwrap();
        let ordered = names(&exports, &order);
        let pos = |n: &str| ordered.iter().position(|x| x == n).unwrap();
        assert!(pos("standalone") < pos("@acme/core"));
        assert!(pos("standalone") < pos("@acme/extras"));
    }

    #[test]
    fn exact_overrides_opposing_wildcard() {
        // b sweeps everything after itself with a wildcard, but a's exact
        // constraint against b wins the pairwise direction.
        let exports = vec![
            export("a").load_after("b"),
            export("b").load_after("*"),
            export("c"),
        ];
        let order = sort_exports(&exports).unwrap();
        let ordered = names(&exports, &order);
        let pos = |n: &str| ordered.iter().position(|x| x == n).unwrap();
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("b"));
    }

    #[test]
    fn contradictory_exact_constraints_are_a_cycle() {
        let exports = vec![
            export("a").load_before("b"),
            export("b").load_before("a"),
        ];
        let err = sort_exports(&exports).unwrap_err();
        match err {
            ResolveError::Cycle { names } => {
                assert!(names.contains(&"a".to_string()));
                assert!(names.contains(&"b".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn exact_self_reference_is_fatal() {
        let exports = vec![export("a").load_after("a")];
        assert_eq!(
            sort_exports(&exports).unwrap_err(),
            ResolveError::SelfReference("a".into())
        );
    }

    #[test]
    fn wildcard_self_match_is_skipped() {
        let exports = vec![export("a").load_before("*")];
        assert!(sort_exports(&exports).is_ok());
    }

    #[test]
    fn required_constraint_with_no_match_is_fatal() {
        let exports = vec![export("a").load_after(OrderConstraint::required("missing"))];
        assert_eq!(
            sort_exports(&exports).unwrap_err(),
            ResolveError::UnsatisfiedRequired {
                plugin: "a".into(),
                target: "missing".into(),
            }
        );
    }

    #[test]
    fn optional_constraint_with_no_match_is_ignored() {
        let exports = vec![export("a").load_after("missing"), export("b")];
        let order = sort_exports(&exports).unwrap();
        assert_eq!(names(&exports, &order), ["a", "b"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let exports = vec![export("a"), export("a")];
        assert_eq!(
            sort_exports(&exports).unwrap_err(),
            ResolveError::DuplicateName("a".into())
        );
    }
}
