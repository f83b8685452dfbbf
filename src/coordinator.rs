//! Request/response coordination for a single aggregation round (spec
//! §4.4). Given a set of validators still missing a signature, sends one
//! `AppRequest` to each (preferring an already-connected node), and
//! collects whatever responses arrive before `deadline` elapses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::bls;
use crate::metrics;
use crate::network::{AppRequest, NetworkAdapter};
use crate::types::{Signature, Validator};

/// Attempts to collect a signature from each of `targets` (validator
/// index -> validator) within `deadline`. Returns the signatures that
/// verified; per-response failures (no reply, bad signature) are logged
/// and dropped, never surfaced to the caller.
pub async fn collect_round(
	network: &Arc<dyn NetworkAdapter>,
	msg_bytes: &[u8],
	justification: Option<&[u8]>,
	targets: &BTreeMap<usize, &Validator>,
	deadline: Duration,
) -> BTreeMap<usize, Signature> {
	let mut pending = Vec::with_capacity(targets.len());
	for (&index, validator) in targets {
		let Some(node) = validator.preferred_node() else {
			debug!(validator_index = index, "validator has no bound node id, skipping");
			continue;
		};
		let request_id = network.register_request_id();
		let request = AppRequest {
			request_id,
			message: msg_bytes.to_vec(),
			justification: justification.map(|j| j.to_vec()),
		};
		match network.send(node, request).await {
			Ok(rx) => pending.push((index, validator, rx)),
			Err(err) => warn!(validator_index = index, %err, "failed to dispatch request"),
		}
	}

	let mut collected = BTreeMap::new();
	let deadline_at = tokio::time::Instant::now() + deadline;
	for (index, validator, mut rx) in pending {
		let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
		match tokio::time::timeout(remaining, rx.recv()).await {
			Ok(Some(response)) => {
				let signature = Signature(response.signature);
				let verify_start = tokio::time::Instant::now();
				let valid = bls::verify(&validator.public_key_bytes, msg_bytes, &signature);
				metrics::BLS_VERIFY_LATENCY_SECONDS.observe(verify_start.elapsed().as_secs_f64());
				if valid {
					collected.insert(index, signature);
				} else {
					debug!(validator_index = index, "response failed BLS verification");
				}
			},
			Ok(None) => debug!(validator_index = index, "response channel closed with no reply"),
			Err(_) => debug!(validator_index = index, "no response within attempt deadline"),
		}
	}
	collected
}
