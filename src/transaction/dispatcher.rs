//! Validates user actions against the current identity and snapshot, then submits them.
//!
//! Every action is first prepared into a [`PendingAction`] without any I/O. Preparation fails
//! with [`ActionError::InvalidInput`] for bad arguments and [`ActionError::Unauthorized`] when
//! the identity may not take the action, so a refused action never reaches the network.

use crate::contract::ContractGateway;
use crate::sync::{Campaign, SyncedSnapshot};
use crate::transaction::permissions::{can_create, can_manage};
use crate::transaction::types::{ActionConfig, ActionError, ActionKind, PendingAction};
use crate::utils::{multiply, to_base_units};
use crate::wallet::Identity;

use ethers::types::{TxHash, U256};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct ActionDispatcher {
	gateway: Arc<dyn ContractGateway>,
	identity: watch::Receiver<Option<Identity>>,
	snapshot: watch::Receiver<Option<Arc<SyncedSnapshot>>>,
	/// Creation fee in base units.
	campaign_fee: U256,
}

impl ActionDispatcher {
	pub fn new(
		gateway: Arc<dyn ContractGateway>,
		identity: watch::Receiver<Option<Identity>>,
		snapshot: watch::Receiver<Option<Arc<SyncedSnapshot>>>,
		config: ActionConfig,
	) -> Result<Self, ActionError> {
		let campaign_fee = to_base_units(&config.campaign_fee)?;
		Ok(Self {
			gateway,
			identity,
			snapshot,
			campaign_fee,
		})
	}

	pub fn prepare_create_campaign(
		&self,
		title: &str,
		unit_cost: &str,
		pledges_needed: &str,
	) -> Result<PendingAction, ActionError> {
		let (identity, snapshot) = self.context()?;

		let title = title.trim();
		if title.is_empty() {
			return Err(ActionError::InvalidInput("campaign title is empty".into()));
		}
		let pledge_cost = to_base_units(unit_cost)?;
		if pledge_cost.is_zero() {
			return Err(ActionError::InvalidInput("pledge cost must be greater than zero".into()));
		}
		let pledges_needed = parse_count(pledges_needed, "pledge target")?;

		if !can_create(&identity, &snapshot) {
			return Err(ActionError::Unauthorized(
				"the contract owner cannot create campaigns".into(),
			));
		}

		let kind = ActionKind::CreateCampaign {
			title: title.to_string(),
			pledge_cost,
			pledges_needed,
		};
		Ok(PendingAction::new(kind, identity.address()).with_value(self.campaign_fee))
	}

	/// Pledge `count` units to a live campaign; the attached value is unit cost times count.
	pub fn prepare_pledge(&self, id: U256, count: &str) -> Result<PendingAction, ActionError> {
		let (identity, snapshot) = self.context()?;

		let count = parse_count(count, "pledge count")?;
		let campaign = snapshot
			.live_campaign(id)
			.ok_or_else(|| not_in_list(id, "live"))?;
		let value = multiply(to_base_units(&campaign.unit_cost)?, count)?;

		Ok(PendingAction::new(ActionKind::Pledge { id, count }, identity.address()).with_value(value))
	}

	pub fn prepare_cancel_campaign(&self, id: U256) -> Result<PendingAction, ActionError> {
		let (identity, snapshot) = self.context()?;

		let campaign = snapshot
			.live_campaign(id)
			.ok_or_else(|| not_in_list(id, "live"))?;
		authorize_manage(&identity, &snapshot, campaign, "cancel")?;

		Ok(PendingAction::new(ActionKind::CancelCampaign { id }, identity.address()))
	}

	pub fn prepare_fulfill_campaign(&self, id: U256) -> Result<PendingAction, ActionError> {
		let (identity, snapshot) = self.context()?;

		let campaign = snapshot
			.live_campaign(id)
			.ok_or_else(|| not_in_list(id, "live"))?;
		if !campaign.is_fully_pledged() {
			return Err(ActionError::InvalidInput(format!(
				"campaign {} has {} of {} pledges",
				id, campaign.pledges_received, campaign.pledges_needed
			)));
		}
		authorize_manage(&identity, &snapshot, campaign, "fulfill")?;

		Ok(PendingAction::new(ActionKind::FulfillCampaign { id }, identity.address()))
	}

	pub fn prepare_claim_refund(&self, id: U256) -> Result<PendingAction, ActionError> {
		let (identity, snapshot) = self.context()?;

		if snapshot.cancelled_campaign(id).is_none() {
			return Err(not_in_list(id, "cancelled"));
		}

		Ok(PendingAction::new(ActionKind::ClaimRefund { id }, identity.address()))
	}

	pub fn prepare_withdraw_fees(&self) -> Result<PendingAction, ActionError> {
		let identity = self.owner_context("withdraw fees")?;
		Ok(PendingAction::new(ActionKind::WithdrawFees, identity.address()))
	}

	pub fn prepare_change_owner(&self, new_owner: &str) -> Result<PendingAction, ActionError> {
		let new_owner = parse_address(new_owner)?;
		let identity = self.owner_context("change the owner")?;
		Ok(PendingAction::new(
			ActionKind::ChangeOwner {
				new_owner: new_owner.address(),
			},
			identity.address(),
		))
	}

	pub fn prepare_ban_entrepreneur(&self, entrepreneur: &str) -> Result<PendingAction, ActionError> {
		let entrepreneur = parse_address(entrepreneur)?;
		let identity = self.owner_context("ban entrepreneurs")?;
		Ok(PendingAction::new(
			ActionKind::BanEntrepreneur {
				entrepreneur: entrepreneur.address(),
			},
			identity.address(),
		))
	}

	pub fn prepare_destroy_contract(&self) -> Result<PendingAction, ActionError> {
		let identity = self.owner_context("destroy the contract")?;
		Ok(PendingAction::new(ActionKind::DestroyContract, identity.address()))
	}

	pub async fn create_campaign(
		&self,
		title: &str,
		unit_cost: &str,
		pledges_needed: &str,
	) -> Result<TxHash, ActionError> {
		let action = self.prepare_create_campaign(title, unit_cost, pledges_needed)?;
		self.submit(action).await
	}

	pub async fn pledge(&self, id: U256, count: &str) -> Result<TxHash, ActionError> {
		let action = self.prepare_pledge(id, count)?;
		self.submit(action).await
	}

	pub async fn cancel_campaign(&self, id: U256) -> Result<TxHash, ActionError> {
		let action = self.prepare_cancel_campaign(id)?;
		self.submit(action).await
	}

	pub async fn fulfill_campaign(&self, id: U256) -> Result<TxHash, ActionError> {
		let action = self.prepare_fulfill_campaign(id)?;
		self.submit(action).await
	}

	pub async fn claim_refund(&self, id: U256) -> Result<TxHash, ActionError> {
		let action = self.prepare_claim_refund(id)?;
		self.submit(action).await
	}

	pub async fn withdraw_fees(&self) -> Result<TxHash, ActionError> {
		let action = self.prepare_withdraw_fees()?;
		self.submit(action).await
	}

	pub async fn change_owner(&self, new_owner: &str) -> Result<TxHash, ActionError> {
		let action = self.prepare_change_owner(new_owner)?;
		self.submit(action).await
	}

	pub async fn ban_entrepreneur(&self, entrepreneur: &str) -> Result<TxHash, ActionError> {
		let action = self.prepare_ban_entrepreneur(entrepreneur)?;
		self.submit(action).await
	}

	pub async fn destroy_contract(&self) -> Result<TxHash, ActionError> {
		let action = self.prepare_destroy_contract()?;
		self.submit(action).await
	}

	/// Submit an already prepared action.
	pub async fn submit(&self, action: PendingAction) -> Result<TxHash, ActionError> {
		let method = action.kind.method();
		debug!("Submitting {} with value {}", method, action.value);
		action.submit(self.gateway.as_ref()).await.map_err(|e| {
			warn!("{} failed: {}", method, e);
			e
		})
	}

	/// Current identity and snapshot, cloned out of their cells.
	fn context(&self) -> Result<(Identity, Arc<SyncedSnapshot>), ActionError> {
		let identity = self.identity.borrow().clone().ok_or(ActionError::NoIdentity)?;
		let snapshot = self.snapshot.borrow().clone().ok_or(ActionError::NotSynced)?;
		Ok((identity, snapshot))
	}

	fn owner_context(&self, what: &str) -> Result<Identity, ActionError> {
		let (identity, snapshot) = self.context()?;
		if !snapshot.is_owner(&identity) {
			return Err(ActionError::Unauthorized(format!("only the owner can {}", what)));
		}
		Ok(identity)
	}
}

fn authorize_manage(
	identity: &Identity,
	snapshot: &SyncedSnapshot,
	campaign: &Campaign,
	what: &str,
) -> Result<(), ActionError> {
	if can_manage(identity, snapshot, campaign) {
		Ok(())
	} else {
		Err(ActionError::Unauthorized(format!(
			"only the entrepreneur or the owner can {} campaign {}",
			what, campaign.id
		)))
	}
}

fn parse_count(input: &str, what: &str) -> Result<U256, ActionError> {
	let input = input.trim();
	let valid_digits = !input.is_empty() && input.chars().all(|c| c.is_ascii_digit());
	let count = valid_digits
		.then(|| U256::from_dec_str(input).ok())
		.flatten()
		.ok_or_else(|| ActionError::InvalidInput(format!("{} '{}' is not a whole number", what, input)))?;
	if count.is_zero() {
		return Err(ActionError::InvalidInput(format!("{} must be greater than zero", what)));
	}
	Ok(count)
}

fn parse_address(input: &str) -> Result<Identity, ActionError> {
	if input.trim().is_empty() {
		return Err(ActionError::InvalidInput("address is empty".into()));
	}
	Ok(input.parse::<Identity>()?)
}

fn not_in_list(id: U256, list: &str) -> ActionError {
	ActionError::InvalidInput(format!("campaign {} is not {}", id, list))
}
