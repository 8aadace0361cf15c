//! Typed read/write façade over the crowdfunding contract.
//!
//! Reads are independent point-in-time queries: two reads issued separately may observe
//! different contract states. Writes return as soon as the transaction is accepted for
//! processing, not when it is final.

use crate::contract::{CampaignDetail, ContractEvent, GatewayError, Subscription};

use ethers::types::{Address, TxHash, U256};
use std::sync::Arc;

/// Receives contract events from a gateway subscription.
///
/// Events are delivered one at a time; the next event is not delivered until `on_event`
/// returns.
#[async_trait::async_trait]
pub trait ContractEventHandler: Send + Sync {
	async fn on_event(&self, event: ContractEvent);

	/// Name of this handler for logging and diagnostics.
	fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait ContractGateway: Send + Sync {
	async fn owner(&self) -> Result<Address, GatewayError>;
	async fn contract_balance(&self) -> Result<U256, GatewayError>;
	async fn total_fees(&self) -> Result<U256, GatewayError>;
	async fn active_campaign_ids(&self) -> Result<Vec<U256>, GatewayError>;
	async fn fulfilled_campaign_ids(&self) -> Result<Vec<U256>, GatewayError>;
	async fn cancelled_campaign_ids(&self) -> Result<Vec<U256>, GatewayError>;
	async fn campaign_detail(&self, id: U256) -> Result<CampaignDetail, GatewayError>;

	/// `fee` is attached as the transaction value.
	async fn create_campaign(
		&self,
		from: Address,
		title: String,
		pledge_cost: U256,
		pledges_needed: U256,
		fee: U256,
	) -> Result<TxHash, GatewayError>;

	/// `value` must cover `count` pledges at the campaign's pledge cost.
	async fn pledge(
		&self,
		from: Address,
		id: U256,
		count: U256,
		value: U256,
	) -> Result<TxHash, GatewayError>;

	async fn cancel_campaign(&self, from: Address, id: U256) -> Result<TxHash, GatewayError>;
	async fn fulfill_campaign(&self, from: Address, id: U256) -> Result<TxHash, GatewayError>;
	async fn claim_refund(&self, from: Address, id: U256) -> Result<TxHash, GatewayError>;
	async fn withdraw_fees(&self, from: Address) -> Result<TxHash, GatewayError>;
	async fn change_owner(&self, from: Address, new_owner: Address)
	-> Result<TxHash, GatewayError>;
	async fn ban_entrepreneur(
		&self,
		from: Address,
		entrepreneur: Address,
	) -> Result<TxHash, GatewayError>;
	async fn destroy_contract(&self, from: Address) -> Result<TxHash, GatewayError>;

	/// Deliver every event the contract emits from now on to `handler`.
	///
	/// Events emitted before the subscription is established are not replayed.
	async fn subscribe_all(
		&self,
		handler: Arc<dyn ContractEventHandler>,
	) -> Result<Subscription, GatewayError>;
}
