//!
//! Ethers-backed client for the crowdfunding contract.
//!
//! Reads and writes go through `abigen!` bindings over a shared WebSocket provider. Writes are
//! sent with `from` set to the active identity and signed by the wallet environment behind
//! the provider (`eth_sendTransaction`). The event subscription is a single `eth_subscribe`
//! log filter on the contract address, pumped by a background task.

use crate::contract::{
	CampaignDetail, ContractEvent, ContractEventHandler, ContractGateway, GatewayError,
	Subscription,
};
use crate::wallet::rpc::USER_REJECTED_CODE;

use ethers::abi::Detokenize;
use ethers::contract::{ContractCall, ContractError, abigen};
use ethers::providers::{Middleware, Provider, RpcError, Ws};
use ethers::types::{Address, Filter, TxHash, U256};
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

abigen!(
	CrowdfundingContract,
	r#"[
		function owner() external view returns (address)
		function getContractBalance() external view returns (uint256)
		function totalFees() external view returns (uint256)
		function getActiveCampaigns() external view returns (uint256[])
		function getFulfilledCampaigns() external view returns (uint256[])
		function getCancelledCampaigns() external view returns (uint256[])
		function getCampaign(uint256 campaignId) external view returns (address, string, uint256, uint256, uint256)
		function createCampaign(string title, uint256 pledgeCost, uint256 pledgesNeeded) external payable
		function pledge(uint256 campaignId, uint256 numberOfPledges) external payable
		function cancelCampaign(uint256 campaignId) external
		function fulfillCampaign(uint256 campaignId) external
		function claimRefund(uint256 campaignId) external
		function withdrawFees() external
		function changeOwner(address newOwner) external
		function banEntrepreneur(address entrepreneur) external
		function destroyContract() external
	]"#
);

type WsContractError = ContractError<Provider<Ws>>;

/// Crowdfunding contract client
#[derive(Clone)]
pub struct EthersGateway {
	/// Shared provider, also used for the event subscription.
	provider: Arc<Provider<Ws>>,
	/// Generated bindings for the contract methods.
	contract: CrowdfundingContract<Provider<Ws>>,
	/// Deployed contract address.
	address: Address,
}

impl EthersGateway {
	pub fn new(provider: Arc<Provider<Ws>>, address: Address) -> Self {
		let contract = CrowdfundingContract::new(address, provider.clone());
		Self {
			provider,
			contract,
			address,
		}
	}

	pub fn address(&self) -> Address {
		self.address
	}

	async fn submit<D>(
		&self,
		method: &'static str,
		call: ContractCall<Provider<Ws>, D>,
	) -> Result<TxHash, GatewayError>
	where
		D: Detokenize + Send + Sync,
	{
		debug!("Submitting {} from {:?}", method, call.tx.from());
		let pending = call.send().await.map_err(|e| {
			let classified = classify_submission_error(method, e);
			error!("Submission of {} failed: {}", method, classified);
			classified
		})?;
		let tx_hash = pending.tx_hash();
		info!("Submitted {} in transaction {:?}", method, tx_hash);
		Ok(tx_hash)
	}
}

fn read_error(method: &'static str) -> impl FnOnce(WsContractError) -> GatewayError {
	move |e| {
		warn!("Read of {} failed: {}", method, e);
		GatewayError::ReadError {
			method,
			message: e.to_string(),
		}
	}
}

/// Map a failed submission onto the gateway error taxonomy.
///
/// Reverts carrying an `Error(string)` payload keep the decoded reason.
fn classify_submission_error(method: &'static str, err: WsContractError) -> GatewayError {
	if let Some(reason) = err.decode_revert::<String>() {
		return GatewayError::ExecutionReverted(reason);
	}
	if err.is_revert() {
		return GatewayError::ExecutionReverted(format!("{} reverted without a reason", method));
	}

	// `send` wraps provider failures as middleware errors.
	let response = err
		.as_middleware_error()
		.and_then(|e| RpcError::as_error_response(e))
		.or_else(|| {
			err.as_provider_error()
				.and_then(|e| RpcError::as_error_response(e))
		});
	if let Some(response) = response {
		if response.code == USER_REJECTED_CODE {
			return GatewayError::SubmissionRejected(response.message.clone());
		}
		if response.message.contains("revert") {
			return GatewayError::ExecutionReverted(response.message.clone());
		}
	}

	GatewayError::SubmissionError {
		method,
		message: err.to_string(),
	}
}

#[async_trait::async_trait]
impl ContractGateway for EthersGateway {
	async fn owner(&self) -> Result<Address, GatewayError> {
		self.contract.owner().call().await.map_err(read_error("owner"))
	}

	async fn contract_balance(&self) -> Result<U256, GatewayError> {
		self.contract
			.get_contract_balance()
			.call()
			.await
			.map_err(read_error("getContractBalance"))
	}

	async fn total_fees(&self) -> Result<U256, GatewayError> {
		self.contract
			.total_fees()
			.call()
			.await
			.map_err(read_error("totalFees"))
	}

	async fn active_campaign_ids(&self) -> Result<Vec<U256>, GatewayError> {
		self.contract
			.get_active_campaigns()
			.call()
			.await
			.map_err(read_error("getActiveCampaigns"))
	}

	async fn fulfilled_campaign_ids(&self) -> Result<Vec<U256>, GatewayError> {
		self.contract
			.get_fulfilled_campaigns()
			.call()
			.await
			.map_err(read_error("getFulfilledCampaigns"))
	}

	async fn cancelled_campaign_ids(&self) -> Result<Vec<U256>, GatewayError> {
		self.contract
			.get_cancelled_campaigns()
			.call()
			.await
			.map_err(read_error("getCancelledCampaigns"))
	}

	async fn campaign_detail(&self, id: U256) -> Result<CampaignDetail, GatewayError> {
		self.contract
			.get_campaign(id)
			.call()
			.await
			.map(CampaignDetail::from)
			.map_err(read_error("getCampaign"))
	}

	async fn create_campaign(
		&self,
		from: Address,
		title: String,
		pledge_cost: U256,
		pledges_needed: U256,
		fee: U256,
	) -> Result<TxHash, GatewayError> {
		let call = self
			.contract
			.create_campaign(title, pledge_cost, pledges_needed)
			.from(from)
			.value(fee);
		self.submit("createCampaign", call).await
	}

	async fn pledge(
		&self,
		from: Address,
		id: U256,
		count: U256,
		value: U256,
	) -> Result<TxHash, GatewayError> {
		let call = self.contract.pledge(id, count).from(from).value(value);
		self.submit("pledge", call).await
	}

	async fn cancel_campaign(&self, from: Address, id: U256) -> Result<TxHash, GatewayError> {
		let call = self.contract.cancel_campaign(id).from(from);
		self.submit("cancelCampaign", call).await
	}

	async fn fulfill_campaign(&self, from: Address, id: U256) -> Result<TxHash, GatewayError> {
		let call = self.contract.fulfill_campaign(id).from(from);
		self.submit("fulfillCampaign", call).await
	}

	async fn claim_refund(&self, from: Address, id: U256) -> Result<TxHash, GatewayError> {
		let call = self.contract.claim_refund(id).from(from);
		self.submit("claimRefund", call).await
	}

	async fn withdraw_fees(&self, from: Address) -> Result<TxHash, GatewayError> {
		let call = self.contract.withdraw_fees().from(from);
		self.submit("withdrawFees", call).await
	}

	async fn change_owner(
		&self,
		from: Address,
		new_owner: Address,
	) -> Result<TxHash, GatewayError> {
		let call = self.contract.change_owner(new_owner).from(from);
		self.submit("changeOwner", call).await
	}

	async fn ban_entrepreneur(
		&self,
		from: Address,
		entrepreneur: Address,
	) -> Result<TxHash, GatewayError> {
		let call = self.contract.ban_entrepreneur(entrepreneur).from(from);
		self.submit("banEntrepreneur", call).await
	}

	async fn destroy_contract(&self, from: Address) -> Result<TxHash, GatewayError> {
		let call = self.contract.destroy_contract().from(from);
		self.submit("destroyContract", call).await
	}

	async fn subscribe_all(
		&self,
		handler: Arc<dyn ContractEventHandler>,
	) -> Result<Subscription, GatewayError> {
		let provider = self.provider.clone();
		let filter = Filter::new().address(self.address);
		let (ready_tx, ready_rx) = oneshot::channel();

		debug!("Subscribing to all events of contract {:?}", self.address);

		let task = tokio::spawn(async move {
			let mut stream = match provider.subscribe_logs(&filter).await {
				Ok(stream) => {
					let _ = ready_tx.send(Ok(()));
					stream
				}
				Err(e) => {
					let _ = ready_tx.send(Err(GatewayError::SubscriptionError(e.to_string())));
					return;
				}
			};

			// Serial delivery: the next log is not pulled until the handler returns.
			while let Some(log) = stream.next().await {
				let event = ContractEvent::from(log);
				debug!(
					"Contract event at block {:?} (tx {:?}) -> {}",
					event.block_number,
					event.transaction_hash,
					handler.name()
				);
				handler.on_event(event).await;
			}

			warn!("Contract event stream ended");
		});

		match ready_rx.await {
			Ok(Ok(())) => {
				info!("Subscribed to contract events at {:?}", self.address);
				Ok(Subscription::from_task(task))
			}
			Ok(Err(e)) => {
				error!("Failed to subscribe to contract events: {}", e);
				Err(e)
			}
			Err(_) => Err(GatewayError::SubscriptionError(
				"Subscription task ended before the subscription was established".to_string(),
			)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethers::abi::{Token, encode};
	use ethers::providers::{JsonRpcError, ProviderError, WsClientError};
	use ethers::types::Bytes;

	fn rpc_failure(code: i64, message: &str) -> WsContractError {
		let response = JsonRpcError {
			code,
			message: message.to_string(),
			data: None,
		};
		WsContractError::from_middleware_error(ProviderError::JsonRpcClientError(Box::new(
			WsClientError::JsonRpcError(response),
		)))
	}

	#[test]
	fn revert_reason_is_decoded() {
		let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
		data.extend(encode(&[Token::String("Only the owner".to_string())]));
		let err = WsContractError::Revert(Bytes::from(data));

		match classify_submission_error("withdrawFees", err) {
			GatewayError::ExecutionReverted(reason) => assert_eq!(reason, "Only the owner"),
			other => panic!("unexpected classification: {:?}", other),
		}
	}

	#[test]
	fn bare_revert_is_still_a_revert() {
		let err = WsContractError::Revert(Bytes::new());
		assert!(matches!(
			classify_submission_error("destroyContract", err),
			GatewayError::ExecutionReverted(_)
		));
	}

	#[test]
	fn wallet_rejection_on_send_is_a_rejection() {
		let err = rpc_failure(4001, "User denied transaction signature");

		assert_eq!(
			classify_submission_error("pledge", err),
			GatewayError::SubmissionRejected("User denied transaction signature".to_string())
		);
	}

	#[test]
	fn revert_message_without_data_is_a_revert() {
		let err = rpc_failure(-32000, "execution reverted: Campaign is not live");

		assert!(matches!(
			classify_submission_error("cancelCampaign", err),
			GatewayError::ExecutionReverted(reason) if reason.contains("Campaign is not live")
		));
	}

	#[test]
	fn other_rpc_failures_stay_submission_errors() {
		let err = rpc_failure(-32603, "nonce too low");

		assert!(matches!(
			classify_submission_error("withdrawFees", err),
			GatewayError::SubmissionError { method: "withdrawFees", .. }
		));
	}
}
