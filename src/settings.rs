//! Layered configuration: built-in defaults, an optional config file,
//! environment variables (double-underscore separated), and CLI flags,
//! in that override order.

use std::net::SocketAddr;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::errors::AggregatorError;

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointSettings {
	pub hostname: String,
	pub port: u16,
}

impl EndpointSettings {
	pub fn socket_addr(&self) -> Result<SocketAddr, AggregatorError> {
		format!("{}:{}", self.hostname, self.port)
			.parse()
			.map_err(|e| AggregatorError::InvalidRequest(format!("invalid listen address: {e}")))
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	pub signature_cache_size: usize,
	pub per_attempt_deadline_ms: u64,
	pub max_attempts: u32,
	pub quorum_percentage: u8,
	pub metrics: EndpointSettings,
	pub health: EndpointSettings,
}

impl Settings {
	fn validate(self) -> Result<Self, AggregatorError> {
		if !(1..=100).contains(&self.quorum_percentage) {
			return Err(AggregatorError::InvalidRequest(format!(
				"quorum_percentage must be in 1..=100, got {}",
				self.quorum_percentage
			)));
		}
		if self.max_attempts == 0 {
			return Err(AggregatorError::InvalidRequest("max_attempts must be at least 1".into()));
		}
		Ok(self)
	}
}

/// CLI flags, each optional so a layer beneath (env, config file,
/// defaults) can supply the value instead: one `Option<T>` field per
/// overridable setting.
#[derive(Parser, Debug, Default)]
#[command(name = "signature-aggregator", about = "BLS signature aggregation service")]
pub struct CliOptions {
	#[arg(long, env = "CONFIG_FILE")]
	pub config_file: Option<String>,

	#[arg(long)]
	pub signature_cache_size: Option<usize>,

	#[arg(long)]
	pub per_attempt_deadline_ms: Option<u64>,

	#[arg(long)]
	pub max_attempts: Option<u32>,

	#[arg(long)]
	pub quorum_percentage: Option<u8>,

	#[arg(long)]
	pub metrics_hostname: Option<String>,

	#[arg(long)]
	pub metrics_port: Option<u16>,

	#[arg(long)]
	pub health_hostname: Option<String>,

	#[arg(long)]
	pub health_port: Option<u16>,
}

/// Loads settings from, in increasing priority: built-in defaults, the
/// optional config file named by `--config-file`/`CONFIG_FILE`,
/// `SIGNATURE_AGGREGATOR__*` environment variables, then CLI flags.
pub fn load(cli: CliOptions) -> Result<Settings, AggregatorError> {
	let mut builder = Config::builder()
		.set_default("signature_cache_size", 1024)?
		.set_default("per_attempt_deadline_ms", 5000)?
		.set_default("max_attempts", 5)?
		.set_default("quorum_percentage", 67)?
		.set_default("metrics.hostname", "0.0.0.0")?
		.set_default("metrics.port", 9090)?
		.set_default("health.hostname", "0.0.0.0")?
		.set_default("health.port", 8080)?;

	if let Some(path) = &cli.config_file {
		builder = builder.add_source(File::with_name(path));
	}

	builder = builder.add_source(
		Environment::with_prefix("signature_aggregator").separator("__"),
	);

	if let Some(v) = cli.signature_cache_size {
		builder = builder.set_override("signature_cache_size", v as i64)?;
	}
	if let Some(v) = cli.per_attempt_deadline_ms {
		builder = builder.set_override("per_attempt_deadline_ms", v as i64)?;
	}
	if let Some(v) = cli.max_attempts {
		builder = builder.set_override("max_attempts", v as i64)?;
	}
	if let Some(v) = cli.quorum_percentage {
		builder = builder.set_override("quorum_percentage", v as i64)?;
	}
	if let Some(v) = cli.metrics_hostname {
		builder = builder.set_override("metrics.hostname", v)?;
	}
	if let Some(v) = cli.metrics_port {
		builder = builder.set_override("metrics.port", v as i64)?;
	}
	if let Some(v) = cli.health_hostname {
		builder = builder.set_override("health.hostname", v)?;
	}
	if let Some(v) = cli.health_port {
		builder = builder.set_override("health.port", v as i64)?;
	}

	let settings: Settings = builder
		.build()
		.map_err(|e| AggregatorError::InvalidRequest(format!("config error: {e}")))?
		.try_deserialize()
		.map_err(|e| AggregatorError::InvalidRequest(format!("config error: {e}")))?;

	settings.validate()
}

impl From<config::ConfigError> for AggregatorError {
	fn from(err: config::ConfigError) -> Self {
		AggregatorError::InvalidRequest(format!("config error: {err}"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_load_and_validate() {
		let settings = load(CliOptions::default()).unwrap();
		assert_eq!(settings.signature_cache_size, 1024);
		assert_eq!(settings.max_attempts, 5);
		assert_eq!(settings.quorum_percentage, 67);
	}

	#[test]
	fn cli_overrides_defaults() {
		let cli = CliOptions { quorum_percentage: Some(80), ..Default::default() };
		let settings = load(cli).unwrap();
		assert_eq!(settings.quorum_percentage, 80);
	}

	#[test]
	fn invalid_quorum_percentage_is_rejected() {
		let cli = CliOptions { quorum_percentage: Some(150), ..Default::default() };
		assert!(load(cli).is_err());
	}
}
