//! # Redirect Resolver
//!
//! Collapses one-hop redirect edges into canonical ("ultimate") redirects.
//!
//! The edges form a functional graph once conflicting sources are reduced to
//! their smallest target. Every title is walked at most once: a walk stops at
//! a terminal title, at a title resolved by an earlier walk, or when it
//! revisits a title of its own path (a cycle).
//!
//! | Kind | Resolves to | Hops |
//! |------|-------------|------|
//! | `Chain` | the first title that does not redirect | edges followed |
//! | `Cycle` | itself | cycle length |
//! | `CycleTail` | the node where it enters the cycle | distance to that node |
//!
//! Titles are interned in sorted order, so output order and cycle rotation
//! are independent of edge order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// =============================================================================
// TYPES
// =============================================================================

/// A raw one-hop redirect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RedirectEdge {
    pub source: String,
    pub target: String,
}

impl RedirectEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// How a redirect source resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectKind {
    Chain,
    Cycle,
    CycleTail,
}

impl RedirectKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RedirectKind::Chain => "chain",
            RedirectKind::Cycle => "cycle",
            RedirectKind::CycleTail => "cycle_tail",
        }
    }
}

impl fmt::Display for RedirectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The resolution of one redirect source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRedirect {
    pub source: String,
    pub target: String,
    pub hops: u32,
    pub kind: RedirectKind,
}

// =============================================================================
// RESULT SET
// =============================================================================

/// Every canonical redirect of a snapshot, sorted by source title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalRedirects {
    entries: Vec<CanonicalRedirect>,
    cycles: Vec<Vec<String>>,
    conflicts: usize,
}

impl CanonicalRedirects {
    /// Resolve a title. Titles that are not redirect sources resolve to
    /// themselves with 0 hops.
    #[must_use]
    pub fn resolve<'a>(&'a self, title: &'a str) -> (&'a str, u32) {
        match self.get(title) {
            Some(entry) => (entry.target.as_str(), entry.hops),
            None => (title, 0),
        }
    }

    /// The canonical redirect for a source title.
    #[must_use]
    pub fn get(&self, source: &str) -> Option<&CanonicalRedirect> {
        self.entries
            .binary_search_by(|entry| entry.source.as_str().cmp(source))
            .ok()
            .and_then(|idx| self.entries.get(idx))
    }

    /// All entries, sorted by source.
    #[must_use]
    pub fn entries(&self) -> &[CanonicalRedirect] {
        &self.entries
    }

    /// Detected cycles, each starting at its smallest member, sorted.
    #[must_use]
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Number of sources that had more than one distinct target.
    #[must_use]
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolves transitive redirect chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectResolver;

/// Resolution of a title during the walk: `(target, hops, kind)`.
type Resolution = (usize, u32, RedirectKind);

impl RedirectResolver {
    /// Resolve every edge. Input order does not affect the result.
    pub fn resolve_all<I>(edges: I) -> CanonicalRedirects
    where
        I: IntoIterator<Item = RedirectEdge>,
    {
        // Reduce to one target per source, keeping the smallest.
        let mut targets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for edge in edges {
            targets.entry(edge.source).or_default().insert(edge.target);
        }
        let mut conflicts = 0;
        let mut graph: BTreeMap<String, String> = BTreeMap::new();
        for (source, set) in targets {
            if set.len() > 1 {
                conflicts += 1;
                tracing::warn!(
                    source = %source,
                    targets = ?set,
                    "conflicting redirect targets, keeping the smallest"
                );
            }
            if let Some(target) = set.into_iter().next() {
                graph.insert(source, target);
            }
        }

        // Intern titles in sorted order.
        let titles: Vec<String> = graph
            .iter()
            .flat_map(|(s, t)| [s.clone(), t.clone()])
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let id = |title: &str| titles.binary_search_by(|t| t.as_str().cmp(title)).ok();
        let mut next: Vec<Option<usize>> = vec![None; titles.len()];
        for (source, target) in &graph {
            if let (Some(s), Some(t)) = (id(source), id(target)) {
                next[s] = Some(t);
            }
        }

        let mut memo: Vec<Option<Resolution>> = vec![None; titles.len()];
        let mut position: Vec<Option<usize>> = vec![None; titles.len()];
        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut path: Vec<usize> = Vec::new();

        for start in 0..titles.len() {
            if next[start].is_none() || memo[start].is_some() {
                continue;
            }
            path.clear();
            let mut current = start;
            loop {
                if let Some(pos) = position[current] {
                    let cycle = &path[pos..];
                    let len = hop_count(cycle.len());
                    for &member in cycle {
                        memo[member] = Some((member, len, RedirectKind::Cycle));
                    }
                    for (i, &tail) in path[..pos].iter().enumerate() {
                        memo[tail] = Some((current, hop_count(pos - i), RedirectKind::CycleTail));
                    }
                    let members = rotate_to_min(cycle)
                        .into_iter()
                        .filter_map(|m| titles.get(m).cloned())
                        .collect::<Vec<_>>();
                    tracing::info!(members = ?members, length = len, "cycle detected");
                    cycles.push(members);
                    break;
                }
                if let Some((target, hops, kind)) = memo[current] {
                    let k = path.len();
                    for (i, &node) in path.iter().enumerate() {
                        let walked = hop_count(k - i);
                        memo[node] = Some(match kind {
                            RedirectKind::Chain => (target, walked.saturating_add(hops), RedirectKind::Chain),
                            RedirectKind::Cycle => (current, walked, RedirectKind::CycleTail),
                            RedirectKind::CycleTail => {
                                (target, walked.saturating_add(hops), RedirectKind::CycleTail)
                            }
                        });
                    }
                    break;
                }
                match next[current] {
                    None => {
                        let k = path.len();
                        for (i, &node) in path.iter().enumerate() {
                            memo[node] = Some((current, hop_count(k - i), RedirectKind::Chain));
                        }
                        break;
                    }
                    Some(following) => {
                        position[current] = Some(path.len());
                        path.push(current);
                        current = following;
                    }
                }
            }
            for &node in &path {
                position[node] = None;
            }
        }

        let entries = (0..titles.len())
            .filter(|&i| next[i].is_some())
            .filter_map(|i| {
                let (target, hops, kind) = memo[i]?;
                Some(CanonicalRedirect {
                    source: titles.get(i)?.clone(),
                    target: titles.get(target)?.clone(),
                    hops,
                    kind,
                })
            })
            .collect();
        cycles.sort();

        CanonicalRedirects {
            entries,
            cycles,
            conflicts,
        }
    }
}

fn hop_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn rotate_to_min(cycle: &[usize]) -> Vec<usize> {
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, &node)| node)
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn edges(pairs: &[(&str, &str)]) -> Vec<RedirectEdge> {
        pairs.iter().map(|(s, t)| RedirectEdge::new(*s, *t)).collect()
    }

    #[test]
    fn chain_collapses() {
        let result = RedirectResolver::resolve_all(edges(&[("A", "B"), ("B", "C"), ("C", "D")]));
        assert_eq!(result.resolve("A"), ("D", 3));
        assert_eq!(result.resolve("B"), ("D", 2));
        assert_eq!(result.resolve("C"), ("D", 1));
        assert_eq!(result.resolve("D"), ("D", 0));
        assert!(result.cycles().is_empty());
    }

    #[test]
    fn three_cycle_resolves_to_self() {
        let result = RedirectResolver::resolve_all(edges(&[("B", "C"), ("C", "A"), ("A", "B")]));
        for title in ["A", "B", "C"] {
            let entry = result.get(title).unwrap();
            assert_eq!(entry.target, title);
            assert_eq!(entry.hops, 3);
            assert_eq!(entry.kind, RedirectKind::Cycle);
        }
        assert_eq!(result.cycles(), &[vec!["A".to_string(), "B".into(), "C".into()]]);
    }

    #[test]
    fn tails_resolve_to_cycle_entry() {
        let result = RedirectResolver::resolve_all(edges(&[
            ("T1", "T2"),
            ("T2", "X"),
            ("X", "Y"),
            ("Y", "X"),
        ]));
        let t1 = result.get("T1").unwrap();
        assert_eq!((t1.target.as_str(), t1.hops, t1.kind), ("X", 2, RedirectKind::CycleTail));
        let t2 = result.get("T2").unwrap();
        assert_eq!((t2.target.as_str(), t2.hops, t2.kind), ("X", 1, RedirectKind::CycleTail));
        assert_eq!(result.get("Y").unwrap().kind, RedirectKind::Cycle);
    }

    #[test]
    fn tail_through_memoized_tail() {
        // "A" sorts first and walks into the cycle before "P" is visited.
        let result = RedirectResolver::resolve_all(edges(&[
            ("A", "M"),
            ("M", "N"),
            ("N", "M"),
            ("P", "A"),
        ]));
        let p = result.get("P").unwrap();
        assert_eq!((p.target.as_str(), p.hops, p.kind), ("M", 2, RedirectKind::CycleTail));
    }

    #[test]
    fn self_loop_is_a_cycle_of_one() {
        let result = RedirectResolver::resolve_all(edges(&[("A", "A")]));
        let a = result.get("A").unwrap();
        assert_eq!((a.target.as_str(), a.hops, a.kind), ("A", 1, RedirectKind::Cycle));
    }

    #[test]
    fn conflicting_sources_keep_smallest_target() {
        let result = RedirectResolver::resolve_all(edges(&[("A", "Z"), ("A", "B"), ("A", "B")]));
        assert_eq!(result.resolve("A"), ("B", 1));
        assert_eq!(result.conflicts(), 1);
    }

    #[test]
    fn dangling_target_is_terminal() {
        let result = RedirectResolver::resolve_all(edges(&[("A", "Nowhere")]));
        assert_eq!(result.resolve("A"), ("Nowhere", 1));
        assert_eq!(result.len(), 1);
        assert_eq!(result.resolve("Nowhere"), ("Nowhere", 0));
    }

    #[test]
    fn entries_sorted_by_source() {
        let result = RedirectResolver::resolve_all(edges(&[("c", "x"), ("a", "x"), ("b", "x")]));
        let sources: Vec<_> = result.entries().iter().map(|e| e.source.as_str()).collect();
        assert_eq!(sources, vec!["a", "b", "c"]);
    }
}
