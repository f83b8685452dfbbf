//! Binary entry point: loads settings, wires logging, starts the
//! metrics/health servers under a `JoinSet`, and serves the HTTP
//! aggregation route.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use signature_aggregator::{
	cache::SignatureCache,
	health, metrics,
	network::{NetworkAdapter, UnconfiguredNetworkAdapter},
	settings::{self, CliOptions},
	types::{SubnetId, UnsignedMessage},
	AggregatorCore, AggregatorError, AggregatorSettings, SigningRequest,
};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;
use warp::Filter;

#[derive(Debug, Deserialize)]
struct AggregateSignaturesBody {
	network_id: u32,
	source_chain_id: [u8; 32],
	payload: Vec<u8>,
	justification: Option<Vec<u8>>,
	signing_subnet_id: Option<[u8; 32]>,
	quorum_percentage: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.json()
		.init();

	let cli = CliOptions::parse();
	let settings = settings::load(cli)?;

	let own_subnet = SubnetId([0; 32]);
	let network: Arc<dyn NetworkAdapter> = Arc::new(UnconfiguredNetworkAdapter { own_subnet });
	let cache = Arc::new(SignatureCache::new(settings.signature_cache_size));
	let core = Arc::new(AggregatorCore::new(
		network,
		cache,
		AggregatorSettings {
			max_attempts: settings.max_attempts,
			per_attempt_deadline: Duration::from_millis(settings.per_attempt_deadline_ms),
		},
	));

	let default_quorum = settings.quorum_percentage;
	let core_filter = warp::any().map(move || core.clone());
	let route = warp::path("aggregate-signatures")
		.and(warp::post())
		.and(warp::body::json())
		.and(core_filter)
		.and_then(move |body: AggregateSignaturesBody, core: Arc<AggregatorCore>| async move {
			let request = SigningRequest {
				unsigned: UnsignedMessage {
					network_id: body.network_id,
					source_chain_id: body.source_chain_id,
					payload: body.payload,
				},
				justification: body.justification,
				signing_subnet_id: body.signing_subnet_id.map(SubnetId),
				quorum_numerator: body.quorum_percentage.unwrap_or(default_quorum),
			};
			match core.create_signed_message(request).await {
				Ok(signed) => Ok(warp::reply::json(&serde_json::json!({
					"signers_bitset": signed.signers.into_vec(),
					"aggregate_signature": hex::encode(signed.aggregate_signature.0),
				}))),
				Err(err) => Err(warp::reject::custom(HttpAggregatorError(err))),
			}
		});

	let mut tasks = JoinSet::new();
	tasks.spawn(metrics::serve(settings.metrics.socket_addr()?));
	tasks.spawn(health::serve(settings.health.socket_addr()?));
	tasks.spawn(async move {
		warp::serve(route).run(([0, 0, 0, 0], 8081)).await;
	});

	while let Some(result) = tasks.join_next().await {
		result?;
	}

	Ok(())
}

#[derive(Debug)]
struct HttpAggregatorError(AggregatorError);

impl warp::reject::Reject for HttpAggregatorError {}
