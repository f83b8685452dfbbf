//! Builds the canonical, connectivity-annotated validator view from a raw
//! validator-set snapshot (spec §4.2). This is a pure function: it never
//! mutates its input, it produces a new `ConnectedCanonicalValidators`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::types::{ConnectedCanonicalValidators, NodeId, Validator};

/// A single entry as reported by the `ValidatorSource`, before dedup by
/// public key. The same public key may appear more than once if a
/// validator rotated or shares keys across node ids.
#[derive(Clone, Debug)]
pub struct RawValidator {
	pub public_key_bytes: [u8; 96],
	pub weight: u64,
	pub node_ids: Vec<NodeId>,
}

/// Dedups by BLS public key (merging node ids, summing weights), sorts by
/// `public_key_bytes` ascending, builds the node index map, and computes
/// connected weight relative to `connected_nodes`.
pub fn build_canonical_validators(
	raw: &[RawValidator],
	connected_nodes: &HashSet<NodeId>,
) -> ConnectedCanonicalValidators {
	let mut merged: BTreeMap<[u8; 96], (u64, BTreeSet<NodeId>)> = BTreeMap::new();
	for entry in raw {
		let (weight, node_ids) =
			merged.entry(entry.public_key_bytes).or_insert_with(|| (0, BTreeSet::new()));
		*weight += entry.weight;
		node_ids.extend(entry.node_ids.iter().copied());
	}

	let validators: Vec<Validator> = merged
		.into_iter()
		.map(|(public_key_bytes, (weight, node_ids))| Validator {
			public_key_bytes,
			weight,
			node_ids,
		})
		.collect();

	let total_weight = validators.iter().map(|v| v.weight).sum();

	let mut node_index_map = HashMap::new();
	for (index, validator) in validators.iter().enumerate() {
		for node_id in &validator.node_ids {
			node_index_map.insert(*node_id, index);
		}
	}

	let connected_weight = validators
		.iter()
		.filter(|v| v.node_ids.iter().any(|n| connected_nodes.contains(n)))
		.map(|v| v.weight)
		.sum();

	ConnectedCanonicalValidators { validators, node_index_map, connected_weight, total_weight }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn node(byte: u8) -> NodeId {
		NodeId([byte; 20])
	}

	fn key(byte: u8) -> [u8; 96] {
		[byte; 96]
	}

	#[test]
	fn sorts_by_public_key_bytes_ascending() {
		let raw = vec![
			RawValidator { public_key_bytes: key(3), weight: 1, node_ids: vec![node(1)] },
			RawValidator { public_key_bytes: key(1), weight: 1, node_ids: vec![node(2)] },
			RawValidator { public_key_bytes: key(2), weight: 1, node_ids: vec![node(3)] },
		];
		let view = build_canonical_validators(&raw, &HashSet::new());
		let keys: Vec<_> = view.validators.iter().map(|v| v.public_key_bytes[0]).collect();
		assert_eq!(keys, vec![1, 2, 3]);
	}

	#[test]
	fn merges_duplicate_public_keys() {
		let raw = vec![
			RawValidator { public_key_bytes: key(1), weight: 3, node_ids: vec![node(1)] },
			RawValidator { public_key_bytes: key(1), weight: 4, node_ids: vec![node(2)] },
		];
		let view = build_canonical_validators(&raw, &HashSet::new());
		assert_eq!(view.validators.len(), 1);
		assert_eq!(view.validators[0].weight, 7);
		assert_eq!(view.validators[0].node_ids.len(), 2);
		assert_eq!(view.total_weight, 7);
	}

	#[test]
	fn connected_weight_counts_validators_with_any_connected_node() {
		let raw = vec![
			RawValidator { public_key_bytes: key(1), weight: 5, node_ids: vec![node(1), node(2)] },
			RawValidator { public_key_bytes: key(2), weight: 5, node_ids: vec![node(3)] },
		];
		let connected: HashSet<NodeId> = [node(2)].into_iter().collect();
		let view = build_canonical_validators(&raw, &connected);
		assert_eq!(view.connected_weight, 5);
		assert_eq!(view.total_weight, 10);
	}

	#[test]
	fn node_index_map_covers_every_bound_node() {
		let raw = vec![RawValidator {
			public_key_bytes: key(1),
			weight: 1,
			node_ids: vec![node(1), node(2)],
		}];
		let view = build_canonical_validators(&raw, &HashSet::new());
		assert_eq!(view.index_of(&node(1)), Some(0));
		assert_eq!(view.index_of(&node(2)), Some(0));
		assert_eq!(view.index_of(&node(9)), None);
	}

	#[test]
	fn empty_set_has_zero_weight() {
		let view = build_canonical_validators(&[], &HashSet::new());
		assert_eq!(view.total_weight, 0);
		assert!(view.validators.is_empty());
	}
}
