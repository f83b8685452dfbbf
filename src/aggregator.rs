//! The aggregation engine itself: the state machine carrying a request
//! for a signed message through to either a `SignedMessage` or a
//! terminal `AggregatorError`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use bitvec::prelude::*;
use rand::Rng;
use tracing::{debug, info, instrument};

use crate::bls;
use crate::cache::{self, SignatureCache};
use crate::coordinator::collect_round;
use crate::errors::AggregatorError;
use crate::metrics;
use crate::network::NetworkAdapter;
use crate::types::{required_weight, Signature, SignedMessage, SubnetId, UnsignedMessage};
use crate::validators::build_canonical_validators;

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Exponential backoff with full jitter in the second half of the
/// interval, mirroring the engine's own retrier: doubling capped at
/// `BACKOFF_CAP`, then a random point between half and the full interval.
fn backoff_duration(attempt: u32) -> Duration {
	let doubled = BACKOFF_BASE.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
	let capped = doubled.min(BACKOFF_CAP);
	let half = capped / 2;
	let jitter = rand::thread_rng().gen_range(0..=(capped - half).as_millis().max(1) as u64);
	half + Duration::from_millis(jitter)
}

/// A request to have the engine produce a cross-chain-ready signed
/// message (spec §4 "Public API").
#[derive(Clone, Debug)]
pub struct SigningRequest {
	pub unsigned: UnsignedMessage,
	pub justification: Option<Vec<u8>>,
	/// `None` means the caller left the signing subnet unspecified; it is
	/// then derived from `unsigned.source_chain_id` (spec §4.5 step 1).
	pub signing_subnet_id: Option<SubnetId>,
	pub quorum_numerator: u8,
}

#[derive(Clone, Debug)]
pub struct AggregatorSettings {
	pub max_attempts: u32,
	pub per_attempt_deadline: Duration,
}

pub struct AggregatorCore {
	network: Arc<dyn NetworkAdapter>,
	cache: Arc<SignatureCache>,
	settings: AggregatorSettings,
}

impl AggregatorCore {
	pub fn new(
		network: Arc<dyn NetworkAdapter>,
		cache: Arc<SignatureCache>,
		settings: AggregatorSettings,
	) -> Self {
		Self { network, cache, settings }
	}

	/// Produces a BLS-aggregated, quorum-satisfying signed message for
	/// `request`, re-entrant and safe to call concurrently from multiple
	/// callers (no single-flight coalescing, see the open question this
	/// engine settles in favor of simplicity).
	pub async fn create_signed_message(
		&self,
		request: SigningRequest,
	) -> Result<SignedMessage, AggregatorError> {
		let start = std::time::Instant::now();
		let result = self.create_signed_message_inner(request).await;
		let outcome = match &result {
			Ok(_) => "success",
			Err(err) => {
				metrics::AGGREGATION_FAILURES.with_label_values(&[err.label()]).inc();
				err.label()
			},
		};
		metrics::AGGREGATION_LATENCY_SECONDS
			.with_label_values(&[outcome])
			.observe(start.elapsed().as_secs_f64());
		result
	}

	#[instrument(skip(self, request), fields(subnet = tracing::field::Empty))]
	async fn create_signed_message_inner(
		&self,
		request: SigningRequest,
	) -> Result<SignedMessage, AggregatorError> {
		if !(1..=100).contains(&request.quorum_numerator) {
			return Err(AggregatorError::InvalidRequest(format!(
				"quorum_numerator must be in 1..=100, got {}",
				request.quorum_numerator
			)));
		}

		let signing_subnet_id = match request.signing_subnet_id {
			Some(subnet) => subnet,
			None => self.network.get_subnet_id(request.unsigned.source_chain_id).await?,
		};
		tracing::Span::current().record("subnet", tracing::field::display(signing_subnet_id));

		self.network.track_subnet(signing_subnet_id).await;

		let validator_fetch_start = std::time::Instant::now();
		let (raw, connected) =
			self.network.get_connected_canonical_validators(signing_subnet_id).await?;
		metrics::VALIDATOR_FETCH_LATENCY_SECONDS
			.with_label_values(&[&signing_subnet_id.to_string()])
			.observe(validator_fetch_start.elapsed().as_secs_f64());
		let view = build_canonical_validators(&raw, &connected);

		if view.total_weight == 0 {
			return Err(AggregatorError::NoValidators);
		}

		let required = required_weight(view.total_weight, request.quorum_numerator);
		if view.connected_weight < required {
			return Err(AggregatorError::InsufficientConnectedStake {
				connected_weight: view.connected_weight,
				total_weight: view.total_weight,
				quorum: request.quorum_numerator,
			});
		}

		let msg_bytes = request.unsigned.to_bytes();
		let fingerprint = cache::fingerprint(
			&msg_bytes,
			request.justification.as_deref(),
			&signing_subnet_id,
			request.quorum_numerator,
		);

		let mut signatures: BTreeMap<usize, Signature> = match self.cache.get(&fingerprint) {
			Some(cached) => {
				metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
				cached
					.into_iter()
					.filter(|(index, signature)| {
						view.validators
							.get(*index)
							.is_some_and(|v| bls::verify(&v.public_key_bytes, &msg_bytes, signature))
					})
					.collect()
			},
			None => {
				metrics::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
				BTreeMap::new()
			},
		};

		let mut achieved_weight = view.weight_of(signatures.keys().copied());
		if achieved_weight < required {
			debug!(
				cached_signers = signatures.len(),
				achieved_weight, required, "seeded from cache, starting request rounds"
			);
		}

		let mut attempts = 0;
		while achieved_weight < required && attempts < self.settings.max_attempts {
			let targets: BTreeMap<usize, _> = view
				.validators
				.iter()
				.enumerate()
				.filter(|(index, _)| !signatures.contains_key(index))
				.collect();

			let collected = collect_round(
				&self.network,
				&msg_bytes,
				request.justification.as_deref(),
				&targets,
				self.settings.per_attempt_deadline,
			)
			.await;

			metrics::ROUND_RESPONSE_COUNT
				.with_label_values(&[&signing_subnet_id.to_string()])
				.observe(collected.len() as f64);

			for (index, signature) in collected {
				self.cache.put(fingerprint, index, signature)?;
				signatures.insert(index, signature);
			}

			achieved_weight = view.weight_of(signatures.keys().copied());
			attempts += 1;

			if achieved_weight < required && attempts < self.settings.max_attempts {
				tokio::time::sleep(backoff_duration(attempts)).await;
			}
		}

		if achieved_weight < required {
			return Err(AggregatorError::NotEnoughSignatures {
				achieved_weight,
				required_weight: required,
				attempts,
			});
		}

		let aggregate_signature = bls::aggregate(&signatures.values().copied().collect::<Vec<_>>())?;

		let mut signers = bitvec![u8, Lsb0; 0; view.validators.len()];
		for index in signatures.keys() {
			signers.set(*index, true);
		}

		info!(
			signer_count = signatures.len(),
			achieved_weight, required, attempts, "aggregation complete"
		);

		Ok(SignedMessage { unsigned: request.unsigned, aggregate_signature, signers })
	}
}
