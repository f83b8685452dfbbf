//! Bounded LRU mapping from a signed-message fingerprint to the set of
//! per-validator signatures gathered so far.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use crate::errors::AggregatorError;
use crate::types::{Fingerprint, Signature};

/// Thread-safe, bounded by `capacity` entries. Eviction is LRU by
/// fingerprint; reads see a consistent snapshot (a cloned `BTreeMap`) per
/// key rather than a reference into the locked cache.
pub struct SignatureCache {
	inner: Mutex<LruCache<Fingerprint, BTreeMap<usize, Signature>>>,
}

impl SignatureCache {
	pub fn new(capacity: usize) -> Self {
		let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
		Self { inner: Mutex::new(LruCache::new(capacity)) }
	}

	pub fn get(&self, fingerprint: &Fingerprint) -> Option<BTreeMap<usize, Signature>> {
		self.inner.lock().unwrap().get(fingerprint).cloned()
	}

	/// Idempotent: storing the same `(validator_index, signature)` twice is
	/// a no-op. A conflicting signature for the same validator index is
	/// rejected as an internal inconsistency — the validator can only have
	/// signed `msg.bytes` one way.
	pub fn put(
		&self,
		fingerprint: Fingerprint,
		validator_index: usize,
		signature: Signature,
	) -> Result<(), AggregatorError> {
		let mut guard = self.inner.lock().unwrap();
		let entry = guard.get_or_insert_mut(fingerprint, BTreeMap::new);
		match entry.get(&validator_index) {
			Some(existing) if *existing == signature => Ok(()),
			Some(_) => Err(AggregatorError::Internal(format!(
				"cache conflict for fingerprint {fingerprint:?}, validator {validator_index}"
			))),
			None => {
				entry.insert(validator_index, signature);
				Ok(())
			},
		}
	}

	pub fn len(&self) -> usize {
		self.inner.lock().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn fp(byte: u8) -> Fingerprint {
		Fingerprint([byte; 32])
	}

	fn sig(byte: u8) -> Signature {
		Signature([byte; 96])
	}

	#[test]
	fn put_then_get_round_trips() {
		let cache = SignatureCache::new(4);
		cache.put(fp(1), 0, sig(9)).unwrap();
		let entry = cache.get(&fp(1)).unwrap();
		assert_eq!(entry.get(&0), Some(&sig(9)));
	}

	#[test]
	fn repeated_identical_put_is_a_no_op() {
		let cache = SignatureCache::new(4);
		cache.put(fp(1), 0, sig(9)).unwrap();
		cache.put(fp(1), 0, sig(9)).unwrap();
		assert_eq!(cache.get(&fp(1)).unwrap().len(), 1);
	}

	#[test]
	fn conflicting_put_is_rejected() {
		let cache = SignatureCache::new(4);
		cache.put(fp(1), 0, sig(9)).unwrap();
		let err = cache.put(fp(1), 0, sig(10)).unwrap_err();
		assert!(matches!(err, AggregatorError::Internal(_)));
	}

	#[test]
	fn capacity_is_respected_via_lru_eviction() {
		let cache = SignatureCache::new(2);
		cache.put(fp(1), 0, sig(1)).unwrap();
		cache.put(fp(2), 0, sig(2)).unwrap();
		cache.put(fp(3), 0, sig(3)).unwrap();
		assert_eq!(cache.len(), 2);
		assert!(cache.get(&fp(1)).is_none());
	}
}

/// Computes the fingerprint of `(msg.bytes || justification || signing_subnet_id || quorum_numerator)`.
pub fn fingerprint(
	msg_bytes: &[u8],
	justification: Option<&[u8]>,
	signing_subnet_id: &crate::types::SubnetId,
	quorum_numerator: u8,
) -> Fingerprint {
	use sha2::{Digest, Sha256};
	let mut hasher = Sha256::new();
	hasher.update(msg_bytes);
	if let Some(j) = justification {
		hasher.update(j);
	}
	hasher.update(signing_subnet_id.0);
	hasher.update([quorum_numerator]);
	let digest = hasher.finalize();
	let mut out = [0u8; 32];
	out.copy_from_slice(&digest);
	Fingerprint(out)
}
