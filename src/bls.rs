//! Thin wrapper over `blst`, the BLS12-381 library the engine consumes as
//! a cryptographic primitive (spec §1) — this module never implements BLS
//! itself, it only adapts `blst`'s API to the domain's typed
//! `Validator`/`Signature` model.
//!
//! Scheme: `min_sig` (public keys live in G2, signatures in G1, giving the
//! smaller of the two group elements for the value that is sent over the
//! wire on every request). Public keys are stored compressed (96 bytes);
//! signatures are stored in the raw/uncompressed 96-byte form the wire
//! schema specifies (spec §6).

use blst::min_sig::{AggregateSignature, PublicKey, Signature as BlstSignature};
use blst::BLST_ERROR;

use crate::errors::AggregatorError;
use crate::types::Signature;

/// Domain separation tag for signing/verifying, per the BLS ciphersuite
/// convention (`..._POP_` because keys are assumed to carry a separate
/// proof-of-possession check upstream, performed by the `ValidatorSource`
/// when the validator set is admitted — out of scope for this engine).
const DST: &[u8] = b"SIGNATURE_AGGREGATOR_BLS_SIG_BLS12381G1_XMD:SHA-256_SSWU_RO_POP_";

fn map_blst_error(context: &str, err: BLST_ERROR) -> AggregatorError {
	AggregatorError::Internal(format!("{context}: blst error {err:?}"))
}

/// Verifies a single validator's raw signature over `msg_bytes`.
///
/// Malformed public keys/signatures and verification failures are both
/// reported as `Ok(false)` rather than an error: per spec §7 these are
/// per-response failures that get counted and logged, never bubbled up.
pub fn verify(public_key_bytes: &[u8; 96], msg_bytes: &[u8], signature: &Signature) -> bool {
	let Ok(public_key) = PublicKey::from_bytes(public_key_bytes) else { return false };
	if public_key.validate().is_err() {
		return false;
	}
	let Ok(sig) = BlstSignature::deserialize(&signature.0) else { return false };
	sig.verify(true, msg_bytes, DST, &[], &public_key, true) == BLST_ERROR::BLST_SUCCESS
}

/// Aggregates one or more individually-verified raw signatures into a
/// single BLS multi-signature. The caller is responsible for having
/// already verified each input signature; aggregation itself does not
/// re-verify (aggregate verification is the caller's job, see
/// `aggregator::finalize`).
pub fn aggregate(signatures: &[Signature]) -> Result<Signature, AggregatorError> {
	if signatures.is_empty() {
		return Err(AggregatorError::Internal("aggregate called with no signatures".into()));
	}

	let parsed: Vec<BlstSignature> = signatures
		.iter()
		.map(|s| BlstSignature::deserialize(&s.0))
		.collect::<Result<_, _>>()
		.map_err(|e| map_blst_error("parsing signature for aggregation", e))?;
	let refs: Vec<&BlstSignature> = parsed.iter().collect();

	let aggregate = AggregateSignature::aggregate(&refs, true)
		.map_err(|e| map_blst_error("aggregating signatures", e))?;

	Ok(Signature(aggregate.to_signature().serialize()))
}

#[cfg(test)]
pub mod test_support {
	//! Key generation helpers used only by tests and the in-memory network
	//! adapter's simulated validators — never used by production code
	//! paths.
	use blst::min_sig::SecretKey;

	pub struct TestValidatorKey {
		pub secret: SecretKey,
	}

	impl TestValidatorKey {
		pub fn generate(seed: u8) -> Self {
			let ikm = [seed; 32];
			let secret = SecretKey::key_gen(&ikm, &[]).expect("valid ikm");
			Self { secret }
		}

		pub fn public_key_bytes(&self) -> [u8; 96] {
			self.secret.sk_to_pk().compress().try_into().expect("G2 compressed is 96 bytes")
		}

		pub fn sign(&self, msg_bytes: &[u8]) -> crate::types::Signature {
			let sig = self.secret.sign(msg_bytes, super::DST, &[]);
			crate::types::Signature(sig.serialize())
		}
	}
}
