//! Core data model shared by every component: the unsigned message, the
//! canonical validator set, and the signed result.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a single P2P-reachable peer. A validator may bind
/// more than one of these; any one of them may answer a signature request
/// on the validator's behalf.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub [u8; 20]);

impl fmt::Debug for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "NodeId({})", hex::encode(self.0))
	}
}

impl fmt::Display for NodeId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", hex::encode(self.0))
	}
}

/// Identifies the subnet whose validator set is being asked to sign.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubnetId(pub [u8; 32]);

impl fmt::Debug for SubnetId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SubnetId({})", bs58::encode(self.0).into_string())
	}
}

impl fmt::Display for SubnetId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", bs58::encode(self.0).into_string())
	}
}

/// The unsigned cross-chain message. Its canonical byte encoding (`to_bytes`)
/// is both the input to BLS signing and part of the cache fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedMessage {
	pub network_id: u32,
	pub source_chain_id: [u8; 32],
	pub payload: Vec<u8>,
}

impl UnsignedMessage {
	/// `network_id || source_chain_id || payload`, in that order, with no
	/// length prefixes: fields are either fixed-size or trailing.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut bytes = Vec::with_capacity(4 + 32 + self.payload.len());
		bytes.extend_from_slice(&self.network_id.to_be_bytes());
		bytes.extend_from_slice(&self.source_chain_id);
		bytes.extend_from_slice(&self.payload);
		bytes
	}
}

/// A single validator in the canonical, deduplicated set. Ordering by
/// `public_key_bytes` ascending defines bit positions in a `signers` set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
	pub public_key_bytes: [u8; 96],
	pub weight: u64,
	pub node_ids: BTreeSet<NodeId>,
}

impl Validator {
	/// The first node id, used as the preferred target for a request.
	pub fn preferred_node(&self) -> Option<NodeId> {
		self.node_ids.iter().next().copied()
	}
}

/// A snapshot of a subnet's validator set in canonical order, plus
/// connectivity information relative to the current peer set.
#[derive(Clone, Debug)]
pub struct ConnectedCanonicalValidators {
	pub validators: Vec<Validator>,
	pub node_index_map: std::collections::HashMap<NodeId, usize>,
	pub connected_weight: u64,
	pub total_weight: u64,
}

impl ConnectedCanonicalValidators {
	pub fn index_of(&self, node: &NodeId) -> Option<usize> {
		self.node_index_map.get(node).copied()
	}

	/// Weight contributed by the given set of validator indices.
	pub fn weight_of(&self, indices: impl IntoIterator<Item = usize>) -> u64 {
		indices.into_iter().filter_map(|i| self.validators.get(i)).map(|v| v.weight).sum()
	}

	pub fn required_weight(&self, quorum_numerator: u8) -> u64 {
		required_weight(self.total_weight, quorum_numerator)
	}
}

/// `ceil(total_weight * quorum_numerator / 100)`.
pub fn required_weight(total_weight: u64, quorum_numerator: u8) -> u64 {
	let total = total_weight as u128;
	let num = quorum_numerator as u128;
	(((total * num) + 99) / 100) as u64
}

/// 32-byte cache fingerprint, see `cache::fingerprint`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Debug for Fingerprint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Fingerprint({})", hex::encode(self.0))
	}
}

/// Raw 96-byte BLS signature as returned by a validator.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub [u8; 96]);

impl fmt::Debug for Signature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Signature({}..)", hex::encode(&self.0[..8]))
	}
}

/// Result of a successful aggregation: the message, the aggregate
/// signature, and the bitset of validator indices that contributed.
#[derive(Clone, Debug)]
pub struct SignedMessage {
	pub unsigned: UnsignedMessage,
	pub aggregate_signature: Signature,
	pub signers: bitvec::vec::BitVec<u8, bitvec::order::Lsb0>,
}

impl SignedMessage {
	pub fn signer_count(&self) -> usize {
		self.signers.count_ones()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn required_weight_rounds_up() {
		assert_eq!(required_weight(5, 80), 4);
		assert_eq!(required_weight(5, 81), 5);
		assert_eq!(required_weight(100, 67), 67);
		assert_eq!(required_weight(3, 67), 2);
		assert_eq!(required_weight(0, 67), 0);
	}

	#[test]
	fn unsigned_message_encoding_is_deterministic() {
		let a = UnsignedMessage { network_id: 1, source_chain_id: [2; 32], payload: vec![3, 4] };
		let b = a.clone();
		assert_eq!(a.to_bytes(), b.to_bytes());
	}
}
