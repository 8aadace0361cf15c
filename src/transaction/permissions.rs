//! Which actions the current identity may take.
//!
//! These predicates only decide what the client offers and what it refuses locally. The
//! contract checks authorization again on every call.

use crate::sync::{Campaign, ContractSnapshot};
use crate::wallet::Identity;

use ethers::types::U256;
use serde::Serialize;

/// Owner may not open campaigns on their own contract.
pub fn can_create(identity: &Identity, snapshot: &ContractSnapshot) -> bool {
	!snapshot.is_owner(identity)
}

/// Campaign's entrepreneur or the contract owner.
pub fn can_manage(identity: &Identity, snapshot: &ContractSnapshot, campaign: &Campaign) -> bool {
	&campaign.entrepreneur == identity || snapshot.is_owner(identity)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignPermissions {
	pub id: U256,
	pub can_pledge: bool,
	pub can_cancel: bool,
	pub can_fulfill: bool,
	pub can_claim_refund: bool,
}

/// Permissions of one identity against one snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permissions {
	pub is_owner: bool,
	pub can_create: bool,
	/// Live campaigns first, then cancelled ones.
	pub campaigns: Vec<CampaignPermissions>,
}

impl Permissions {
	pub fn derive(identity: &Identity, snapshot: &ContractSnapshot) -> Self {
		let live = snapshot.live.iter().map(|campaign| {
			let manage = can_manage(identity, snapshot, campaign);
			CampaignPermissions {
				id: campaign.id,
				can_pledge: true,
				can_cancel: manage,
				can_fulfill: manage && campaign.is_fully_pledged(),
				can_claim_refund: false,
			}
		});
		let cancelled = snapshot.cancelled.iter().map(|campaign| CampaignPermissions {
			id: campaign.id,
			can_pledge: false,
			can_cancel: false,
			can_fulfill: false,
			can_claim_refund: true,
		});

		Self {
			is_owner: snapshot.is_owner(identity),
			can_create: can_create(identity, snapshot),
			campaigns: live.chain(cancelled).collect(),
		}
	}

	pub fn campaign(&self, id: U256) -> Option<&CampaignPermissions> {
		self.campaigns.iter().find(|c| c.id == id)
	}
}
