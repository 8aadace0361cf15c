//! Local mirror of contract state.
//!
//! A [`ContractSnapshot`] is assembled from one complete refresh and is never mutated after
//! that; the engine publishes a new one instead. Campaign placement in the live, fulfilled and
//! cancelled lists is taken verbatim from the contract.

use crate::contract::CampaignDetail;
use crate::utils::{UnitError, to_display_units};
use crate::wallet::Identity;

use chrono::{DateTime, Utc};
use ethers::types::U256;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Deref;

/// Which contract list a campaign was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CampaignStatus {
	Live,
	Fulfilled,
	Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
	pub id: U256,
	pub entrepreneur: Identity,
	pub title: String,
	/// Price of one pledge in display units.
	pub unit_cost: String,
	pub pledges_needed: U256,
	pub pledges_received: U256,
}

impl Campaign {
	pub fn from_detail(id: U256, detail: CampaignDetail) -> Result<Self, UnitError> {
		Ok(Self {
			id,
			entrepreneur: Identity::from_address(detail.entrepreneur),
			title: detail.title,
			unit_cost: to_display_units(detail.pledge_cost)?,
			pledges_needed: detail.pledges_needed,
			pledges_received: detail.pledges_count,
		})
	}

	pub fn is_fully_pledged(&self) -> bool {
		self.pledges_received >= self.pledges_needed
	}
}

/// Contract-derived read state from a single refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSnapshot {
	pub owner: Identity,
	/// Contract balance in display units.
	pub balance: String,
	/// Fees collected by the owner, in display units.
	pub collected_fees: String,
	pub live: Vec<Campaign>,
	pub fulfilled: Vec<Campaign>,
	pub cancelled: Vec<Campaign>,
}

impl ContractSnapshot {
	pub fn is_owner(&self, identity: &Identity) -> bool {
		&self.owner == identity
	}

	pub fn live_campaign(&self, id: U256) -> Option<&Campaign> {
		self.live.iter().find(|c| c.id == id)
	}

	pub fn cancelled_campaign(&self, id: U256) -> Option<&Campaign> {
		self.cancelled.iter().find(|c| c.id == id)
	}

	/// Look a campaign up in all three lists.
	pub fn find(&self, id: U256) -> Option<(CampaignStatus, &Campaign)> {
		self.lists()
			.into_iter()
			.find_map(|(status, list)| list.iter().find(|c| c.id == id).map(|c| (status, c)))
	}

	/// True if no campaign id appears in more than one list.
	pub fn is_partitioned(&self) -> bool {
		let mut seen = HashSet::new();
		self.lists()
			.into_iter()
			.flat_map(|(_, list)| list.iter())
			.all(|c| seen.insert(c.id))
	}

	pub fn campaign_count(&self) -> usize {
		self.live.len() + self.fulfilled.len() + self.cancelled.len()
	}

	fn lists(&self) -> [(CampaignStatus, &Vec<Campaign>); 3] {
		[
			(CampaignStatus::Live, &self.live),
			(CampaignStatus::Fulfilled, &self.fulfilled),
			(CampaignStatus::Cancelled, &self.cancelled),
		]
	}
}

/// A published snapshot together with the refresh that produced it
#[derive(Debug, Clone, Serialize)]
pub struct SyncedSnapshot {
	/// Generation of the refresh that assembled this snapshot.
	pub generation: u64,
	pub refreshed_at: DateTime<Utc>,
	pub contract: ContractSnapshot,
}

impl Deref for SyncedSnapshot {
	type Target = ContractSnapshot;

	fn deref(&self) -> &Self::Target {
		&self.contract
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethers::types::Address;

	fn campaign(id: u64, needed: u64, received: u64) -> Campaign {
		Campaign {
			id: U256::from(id),
			entrepreneur: Identity::from_address(Address::repeat_byte(0x0E)),
			title: format!("campaign {}", id),
			unit_cost: "0.5".to_string(),
			pledges_needed: U256::from(needed),
			pledges_received: U256::from(received),
		}
	}

	fn snapshot(live: Vec<Campaign>, fulfilled: Vec<Campaign>, cancelled: Vec<Campaign>) -> ContractSnapshot {
		ContractSnapshot {
			owner: Identity::from_address(Address::repeat_byte(0x01)),
			balance: "0".to_string(),
			collected_fees: "0".to_string(),
			live,
			fulfilled,
			cancelled,
		}
	}

	#[test]
	fn converts_wire_detail() {
		let detail = CampaignDetail {
			entrepreneur: Address::repeat_byte(0xAB),
			title: "Solar dehydrator".to_string(),
			pledge_cost: U256::from(500_000_000_000_000_000u64),
			pledges_needed: U256::from(10),
			pledges_count: U256::from(4),
		};
		let campaign = Campaign::from_detail(U256::from(3), detail).unwrap();

		assert_eq!(campaign.unit_cost, "0.5");
		assert_eq!(campaign.entrepreneur.as_str(), format!("0x{}", "ab".repeat(20)));
		assert!(!campaign.is_fully_pledged());
	}

	#[test]
	fn finds_campaigns_by_list() {
		let snapshot = snapshot(vec![campaign(1, 2, 2)], vec![campaign(2, 1, 1)], vec![campaign(3, 5, 0)]);

		assert!(snapshot.live_campaign(U256::from(1)).is_some());
		assert!(snapshot.live_campaign(U256::from(3)).is_none());
		assert!(snapshot.cancelled_campaign(U256::from(3)).is_some());
		assert_eq!(snapshot.find(U256::from(2)).map(|(s, _)| s), Some(CampaignStatus::Fulfilled));
		assert!(snapshot.find(U256::from(9)).is_none());
		assert_eq!(snapshot.campaign_count(), 3);
	}

	#[test]
	fn detects_overlapping_lists() {
		assert!(snapshot(vec![campaign(1, 1, 0)], vec![campaign(2, 1, 1)], vec![]).is_partitioned());
		assert!(!snapshot(vec![campaign(1, 1, 0)], vec![], vec![campaign(1, 1, 0)]).is_partitioned());
	}
}
