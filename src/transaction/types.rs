use crate::contract::{ContractGateway, GatewayError};
use crate::utils::UnitError;
use crate::wallet::WalletError;

use ethers::types::{Address, TxHash, U256};
use serde::Serialize;
use tracing::info;

/// Creation fee attached to `createCampaign`, in display units.
pub const DEFAULT_CAMPAIGN_FEE: &str = "0.02";

/// Configuration for the action dispatcher
#[derive(Debug, Clone)]
pub struct ActionConfig {
	/// Fee attached to every campaign creation, in display units.
	pub campaign_fee: String,
}

impl Default for ActionConfig {
	fn default() -> Self {
		Self {
			campaign_fee: DEFAULT_CAMPAIGN_FEE.to_string(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
	#[error("Invalid input: {0}")]
	InvalidInput(String),

	#[error("Unauthorized: {0}")]
	Unauthorized(String),

	#[error("No wallet account connected")]
	NoIdentity,

	#[error("Contract state not synced yet")]
	NotSynced,

	#[error("Submission rejected: {0}")]
	SubmissionRejected(String),

	#[error("Execution reverted: {0}")]
	ExecutionReverted(String),

	#[error("Gateway error: {0}")]
	Gateway(String),
}

impl From<GatewayError> for ActionError {
	fn from(err: GatewayError) -> Self {
		match err {
			GatewayError::SubmissionRejected(reason) => Self::SubmissionRejected(reason),
			GatewayError::ExecutionReverted(reason) => Self::ExecutionReverted(reason),
			other => Self::Gateway(other.to_string()),
		}
	}
}

impl From<UnitError> for ActionError {
	fn from(err: UnitError) -> Self {
		Self::InvalidInput(err.to_string())
	}
}

impl From<WalletError> for ActionError {
	fn from(err: WalletError) -> Self {
		match err {
			WalletError::InvalidAddress(addr) => Self::InvalidInput(format!("invalid address '{}'", addr)),
			other => Self::Gateway(other.to_string()),
		}
	}
}

/// A validated contract mutation with its wire arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActionKind {
	CreateCampaign {
		title: String,
		pledge_cost: U256,
		pledges_needed: U256,
	},
	Pledge {
		id: U256,
		count: U256,
	},
	CancelCampaign {
		id: U256,
	},
	FulfillCampaign {
		id: U256,
	},
	ClaimRefund {
		id: U256,
	},
	WithdrawFees,
	ChangeOwner {
		new_owner: Address,
	},
	BanEntrepreneur {
		entrepreneur: Address,
	},
	DestroyContract,
}

impl ActionKind {
	/// Contract method this action calls.
	pub fn method(&self) -> &'static str {
		match self {
			Self::CreateCampaign { .. } => "createCampaign",
			Self::Pledge { .. } => "pledge",
			Self::CancelCampaign { .. } => "cancelCampaign",
			Self::FulfillCampaign { .. } => "fulfillCampaign",
			Self::ClaimRefund { .. } => "claimRefund",
			Self::WithdrawFees => "withdrawFees",
			Self::ChangeOwner { .. } => "changeOwner",
			Self::BanEntrepreneur { .. } => "banEntrepreneur",
			Self::DestroyContract => "destroyContract",
		}
	}
}

/// One prepared, not yet submitted, mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingAction {
	pub kind: ActionKind,
	/// Signer of the transaction.
	pub from: Address,
	/// Value attached to the call, in base units.
	pub value: U256,
}

impl PendingAction {
	pub fn new(kind: ActionKind, from: Address) -> Self {
		Self {
			kind,
			from,
			value: U256::zero(),
		}
	}

	pub fn with_value(mut self, value: U256) -> Self {
		self.value = value;
		self
	}

	/// Hand the action to the gateway. Resolves once the transaction is accepted.
	pub async fn submit(self, gateway: &dyn ContractGateway) -> Result<TxHash, ActionError> {
		let method = self.kind.method();
		let from = self.from;
		let tx_hash = match self.kind {
			ActionKind::CreateCampaign {
				title,
				pledge_cost,
				pledges_needed,
			} => {
				gateway
					.create_campaign(from, title, pledge_cost, pledges_needed, self.value)
					.await?
			}
			ActionKind::Pledge { id, count } => gateway.pledge(from, id, count, self.value).await?,
			ActionKind::CancelCampaign { id } => gateway.cancel_campaign(from, id).await?,
			ActionKind::FulfillCampaign { id } => gateway.fulfill_campaign(from, id).await?,
			ActionKind::ClaimRefund { id } => gateway.claim_refund(from, id).await?,
			ActionKind::WithdrawFees => gateway.withdraw_fees(from).await?,
			ActionKind::ChangeOwner { new_owner } => gateway.change_owner(from, new_owner).await?,
			ActionKind::BanEntrepreneur { entrepreneur } => {
				gateway.ban_entrepreneur(from, entrepreneur).await?
			}
			ActionKind::DestroyContract => gateway.destroy_contract(from).await?,
		};
		info!("Submitted {} from {:?}: tx {:?}", method, from, tx_hash);
		Ok(tx_hash)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_gateway_failures() {
		assert_eq!(
			ActionError::from(GatewayError::SubmissionRejected("denied".into())),
			ActionError::SubmissionRejected("denied".into())
		);
		assert_eq!(
			ActionError::from(GatewayError::ExecutionReverted("not owner".into())),
			ActionError::ExecutionReverted("not owner".into())
		);
		assert!(matches!(
			ActionError::from(GatewayError::SubscriptionError("closed".into())),
			ActionError::Gateway(_)
		));
	}

	#[test]
	fn invalid_address_is_invalid_input() {
		let err = ActionError::from(WalletError::InvalidAddress("0x12".into()));
		assert!(matches!(err, ActionError::InvalidInput(_)));
	}
}
