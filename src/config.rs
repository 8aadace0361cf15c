//! Client configuration.

use crate::sync::{EngineConfig, RefreshPolicy};
use crate::transaction::{ActionConfig, DEFAULT_CAMPAIGN_FEE};
use crate::utils::to_base_units;
use crate::wallet::Identity;

use anyhow::{Context, Result, anyhow};
use ethers::types::Address;
use std::env;

pub const DEFAULT_RPC_URL: &str = "ws://127.0.0.1:8545";

/// Client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
	/// JSON-RPC WebSocket endpoint of the wallet environment.
	pub rpc_url: String,
	/// Deployed crowdfunding contract.
	pub contract_address: Address,
	/// Campaign creation fee in display units.
	pub campaign_fee: String,
	pub refresh_policy: RefreshPolicy,
}

impl ClientConfig {
	/// Load configuration from `.env` and environment variables.
	pub fn from_env() -> Result<Self> {
		dotenvy::dotenv().ok();
		Self::from_lookup(|name| env::var(name).ok())
	}

	fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let rpc_url = lookup("CROWDFUND_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

		let contract_address = lookup("CROWDFUND_CONTRACT_ADDRESS")
			.context("CROWDFUND_CONTRACT_ADDRESS must be set")?
			.parse::<Identity>()
			.context("CROWDFUND_CONTRACT_ADDRESS is not a valid address")?
			.address();

		let campaign_fee =
			lookup("CROWDFUND_CAMPAIGN_FEE").unwrap_or_else(|| DEFAULT_CAMPAIGN_FEE.to_string());
		to_base_units(&campaign_fee).context("CROWDFUND_CAMPAIGN_FEE is not a valid amount")?;

		let refresh_policy = match lookup("CROWDFUND_REFRESH_POLICY") {
			Some(policy) => policy.parse().map_err(|e: String| anyhow!(e))?,
			None => RefreshPolicy::default(),
		};

		Ok(Self {
			rpc_url,
			contract_address,
			campaign_fee,
			refresh_policy,
		})
	}

	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			refresh_policy: self.refresh_policy,
		}
	}

	pub fn action_config(&self) -> ActionConfig {
		ActionConfig {
			campaign_fee: self.campaign_fee.clone(),
		}
	}
}
