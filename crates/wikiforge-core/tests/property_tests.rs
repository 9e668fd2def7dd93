//! # Property-Based Tests
//!
//! Determinism and coverage invariants of the partitioner and the redirect
//! resolver, checked with proptest.

use proptest::collection::vec;
use proptest::prelude::*;
use std::num::NonZeroU64;
use wikiforge_core::partition::{partition, partition_fixed};
use wikiforge_core::{EntityCap, RedirectEdge, RedirectKind, RedirectResolver};

fn cap_strategy() -> impl Strategy<Value = EntityCap> {
    prop_oneof![
        Just(EntityCap::Unlimited),
        (1u64..500).prop_map(|n| NonZeroU64::new(n).map_or(EntityCap::Unlimited, EntityCap::Limited)),
    ]
}

/// Edges over a small title alphabet so chains and cycles are common.
fn edge_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    vec((0u8..12, 0u8..12), 0..40)
}

/// An edge list together with a permutation of it.
fn shuffled_edges() -> impl Strategy<Value = (Vec<(u8, u8)>, Vec<(u8, u8)>)> {
    edge_strategy().prop_flat_map(|pairs| (Just(pairs.clone()), Just(pairs).prop_shuffle()))
}

fn to_edges(pairs: &[(u8, u8)]) -> Vec<RedirectEdge> {
    pairs
        .iter()
        .map(|(s, t)| RedirectEdge::new(format!("T{s}"), format!("T{t}")))
        .collect()
}

// =============================================================================
// PARTITIONER
// =============================================================================

proptest! {
    /// Ranges are contiguous, disjoint, indexed in order and cover
    /// exactly `min(size, cap)` units.
    #[test]
    fn partition_covers_the_capped_input(
        size in 0u64..2_000,
        count in 1usize..64,
        cap in cap_strategy(),
    ) {
        let ranges = partition(size, count, cap).expect("partition");
        let mut expected_start = 0u64;
        for (i, range) in ranges.iter().enumerate() {
            prop_assert_eq!(range.index as usize, i);
            prop_assert_eq!(range.start, expected_start);
            prop_assert!(range.end > range.start);
            expected_start = range.end;
        }
        prop_assert_eq!(expected_start, cap.clamp(size));
        prop_assert!(ranges.len() <= count);
    }

    /// A cap only clips: surviving chunks keep their uncapped boundaries,
    /// except the one that straddles the cap.
    #[test]
    fn cap_does_not_move_boundaries(
        size in 1u64..2_000,
        chunk_size in 1u64..300,
        cap in cap_strategy(),
    ) {
        let full = partition_fixed(size, chunk_size, EntityCap::Unlimited).expect("partition");
        let capped = partition_fixed(size, chunk_size, cap).expect("partition");
        prop_assert!(capped.len() <= full.len());
        for (clipped, original) in capped.iter().zip(&full) {
            prop_assert_eq!(clipped.index, original.index);
            prop_assert_eq!(clipped.start, original.start);
            prop_assert!(clipped.end <= original.end);
        }
        if let Some(last) = capped.last() {
            prop_assert_eq!(last.end, cap.clamp(size));
        }
    }
}

// =============================================================================
// REDIRECT RESOLVER
// =============================================================================

proptest! {
    /// Every entry is a redirect source; chain ends are never sources.
    #[test]
    fn chain_targets_are_terminal(pairs in edge_strategy()) {
        let resolved = RedirectResolver::resolve_all(to_edges(&pairs));
        for entry in resolved.entries() {
            prop_assert!(entry.hops >= 1);
            match entry.kind {
                RedirectKind::Chain => prop_assert!(resolved.get(&entry.target).is_none()),
                RedirectKind::Cycle => prop_assert_eq!(&entry.target, &entry.source),
                RedirectKind::CycleTail => {
                    let target = resolved.get(&entry.target).expect("cycle entry");
                    prop_assert_eq!(target.kind, RedirectKind::Cycle);
                }
            }
        }
    }

    /// Resolving the result again changes nothing.
    #[test]
    fn resolution_is_idempotent(pairs in edge_strategy()) {
        let resolved = RedirectResolver::resolve_all(to_edges(&pairs));
        for entry in resolved.entries() {
            let (again, _) = resolved.resolve(&entry.target);
            match entry.kind {
                RedirectKind::Chain => prop_assert_eq!(again, entry.target.as_str()),
                RedirectKind::Cycle | RedirectKind::CycleTail => {
                    prop_assert_eq!(resolved.get(again).map(|e| e.kind), Some(RedirectKind::Cycle));
                }
            }
        }
    }

    /// Input order never changes the serialized result.
    #[test]
    fn edge_order_does_not_matter((pairs, shuffled) in shuffled_edges()) {
        let forward = RedirectResolver::resolve_all(to_edges(&pairs));
        let reordered = RedirectResolver::resolve_all(to_edges(&shuffled));

        let a = serde_json::to_vec(forward.entries()).expect("serialize");
        let b = serde_json::to_vec(reordered.entries()).expect("serialize");
        prop_assert_eq!(a, b);
        prop_assert_eq!(forward.cycles(), reordered.cycles());
    }
}
