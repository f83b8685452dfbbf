//! Error taxonomy surfaced by the aggregation engine. Per-response errors
//! (bad decode, invalid signature) never reach this type: they are counted
//! and logged at `debug`, then treated as a silent refusal.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregatorError {
	#[error("invalid request: {0}")]
	InvalidRequest(String),

	#[error("signing subnet has no registered validators")]
	NoValidators,

	#[error(
		"insufficient connected stake: {connected_weight}/{total_weight} connected, quorum {quorum}%"
	)]
	InsufficientConnectedStake { connected_weight: u64, total_weight: u64, quorum: u8 },

	#[error(
		"not enough signatures after {attempts} attempt(s): achieved {achieved_weight}, required {required_weight}"
	)]
	NotEnoughSignatures { achieved_weight: u64, required_weight: u64, attempts: u32 },

	#[error("network unavailable: {0}")]
	NetworkUnavailable(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl AggregatorError {
	/// Stable label for metrics, avoiding unbounded cardinality from the
	/// human-readable messages carried by some variants.
	pub fn label(&self) -> &'static str {
		match self {
			AggregatorError::InvalidRequest(_) => "invalid_request",
			AggregatorError::NoValidators => "no_validators",
			AggregatorError::InsufficientConnectedStake { .. } => "insufficient_connected_stake",
			AggregatorError::NotEnoughSignatures { .. } => "not_enough_signatures",
			AggregatorError::NetworkUnavailable(_) => "network_unavailable",
			AggregatorError::Internal(_) => "internal",
		}
	}
}
