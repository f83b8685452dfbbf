//! Liveness endpoint, separate from the metrics listener so an
//! orchestrator's readiness probe doesn't have to parse Prometheus text
//! output (spec §4.6 ambient health surface).

use std::net::SocketAddr;

use tracing::info;
use warp::Filter;

pub async fn serve(address: SocketAddr) {
	let route = warp::path("health").map(|| warp::reply::with_status("ok", warp::http::StatusCode::OK));
	info!(%address, "health server listening");
	warp::serve(route).run(address).await;
}
