//! Prometheus metrics, served on a dedicated `/metrics` listener (spec
//! §4.6). Registration follows the engine's own pattern: a process-wide
//! `Registry` built once via `lazy_static!`, with each metric registered
//! into it at construction time.

use std::net::SocketAddr;

use lazy_static::lazy_static;
use prometheus::{
	exponential_buckets, register_histogram_vec_with_registry,
	register_histogram_with_registry, register_int_counter_vec_with_registry, Encoder,
	HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use tracing::info;

lazy_static! {
	pub static ref REGISTRY: Registry = Registry::new();

	/// End-to-end latency of `create_signed_message`, from the initial
	/// request to either a signed message or a terminal error.
	pub static ref AGGREGATION_LATENCY_SECONDS: HistogramVec = register_histogram_vec_with_registry!(
		"aggregator_aggregation_latency_seconds",
		"Time to produce a signed message or fail permanently",
		&["outcome"],
		exponential_buckets(0.05, 2.0, 12).unwrap(),
		REGISTRY
	)
	.unwrap();

	/// Number of validator signatures gathered per request round.
	pub static ref ROUND_RESPONSE_COUNT: HistogramVec = register_histogram_vec_with_registry!(
		"aggregator_round_response_count",
		"Validator responses collected in a single request round",
		&["subnet"],
		prometheus::linear_buckets(0.0, 5.0, 20).unwrap(),
		REGISTRY
	)
	.unwrap();

	/// Cache hits vs. misses, labeled so a ratio is a single PromQL query.
	pub static ref CACHE_LOOKUPS: IntCounterVec = register_int_counter_vec_with_registry!(
		"aggregator_cache_lookups_total",
		"Signature cache lookups by outcome",
		&["outcome"],
		REGISTRY
	)
	.unwrap();

	/// Final failures, broken down by `AggregatorError::label()`.
	pub static ref AGGREGATION_FAILURES: IntCounterVec = register_int_counter_vec_with_registry!(
		"aggregator_aggregation_failures_total",
		"Requests that ended in a terminal error, by error kind",
		&["reason"],
		REGISTRY
	)
	.unwrap();

	/// Latency of fetching a subnet's connected canonical validator set.
	pub static ref VALIDATOR_FETCH_LATENCY_SECONDS: HistogramVec = register_histogram_vec_with_registry!(
		"aggregator_validator_fetch_latency_seconds",
		"Time spent resolving a subnet's connected validator set",
		&["subnet"],
		exponential_buckets(0.01, 2.0, 10).unwrap(),
		REGISTRY
	)
	.unwrap();

	/// Latency of a single BLS signature verification.
	pub static ref BLS_VERIFY_LATENCY_SECONDS: prometheus::Histogram = register_histogram_with_registry!(
		"aggregator_bls_verify_latency_seconds",
		"Time spent verifying one validator's signature",
		exponential_buckets(0.0001, 2.0, 10).unwrap(),
		REGISTRY
	)
	.unwrap();
}

/// Binds the `/metrics` listener and serves the registry's current state
/// on every scrape, mirroring the engine's own metrics server shape.
pub async fn serve(address: SocketAddr) {
	let route = warp::path("metrics").map(|| {
		let encoder = TextEncoder::new();
		let metric_families = REGISTRY.gather();
		let mut buffer = Vec::new();
		encoder.encode(&metric_families, &mut buffer).expect("prometheus encoding never fails");
		warp::reply::with_header(buffer, "content-type", encoder.format_type().to_string())
	});

	info!(%address, "metrics server listening");
	warp::serve(route).run(address).await;
}
