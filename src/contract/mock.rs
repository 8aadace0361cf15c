//! In-memory gateway for tests

use crate::contract::{
	CampaignDetail, ContractEvent, ContractEventHandler, ContractGateway, GatewayError,
	Subscription,
};

use ethers::types::{Address, TxHash, U256};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Default)]
pub struct MockState {
	pub owner: Address,
	pub balance: U256,
	pub fees: U256,
	pub live: Vec<U256>,
	pub fulfilled: Vec<U256>,
	pub cancelled: Vec<U256>,
	pub details: HashMap<U256, CampaignDetail>,
}

impl MockState {
	pub fn with_campaign(mut self, id: u64, detail: CampaignDetail) -> Self {
		self.details.insert(U256::from(id), detail);
		self
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
	pub method: &'static str,
	pub from: Address,
	pub value: U256,
}

#[derive(Default)]
pub struct MockGateway {
	pub state: Mutex<MockState>,
	pub reads: AtomicUsize,
	pub writes: Mutex<Vec<RecordedWrite>>,
	/// Read method that fails on its next call(s).
	pub failing_read: Mutex<Option<&'static str>>,
	/// Error returned by every write while set.
	pub write_error: Mutex<Option<GatewayError>>,
	/// Each `owner()` call pops one gate and waits on it before reading state.
	pub owner_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
	pub subscriptions: AtomicUsize,
	pub unsubscribes: Arc<AtomicUsize>,
	/// Makes every `subscribe_all` fail while set.
	pub fail_subscribe: AtomicBool,
	handler: Arc<Mutex<Option<Arc<dyn ContractEventHandler>>>>,
	/// End flag of the current subscription's stream.
	stream_ended: Mutex<Arc<AtomicBool>>,
}

pub fn detail(entrepreneur: Address, title: &str, cost: U256, needed: u64, count: u64) -> CampaignDetail {
	CampaignDetail {
		entrepreneur,
		title: title.to_string(),
		pledge_cost: cost,
		pledges_needed: U256::from(needed),
		pledges_count: U256::from(count),
	}
}

pub fn ids(values: &[u64]) -> Vec<U256> {
	values.iter().copied().map(U256::from).collect()
}

impl MockGateway {
	pub fn new(state: MockState) -> Self {
		Self {
			state: Mutex::new(state),
			..Default::default()
		}
	}

	pub fn update(&self, f: impl FnOnce(&mut MockState)) {
		f(&mut self.state.lock().unwrap());
	}

	/// Install a gate for the next `owner()` call and return its release handle.
	pub fn gate_owner_read(&self) -> oneshot::Sender<()> {
		let (release, gate) = oneshot::channel();
		self.owner_gates.lock().unwrap().push_back(gate);
		release
	}

	pub fn fail_read(&self, method: &'static str) {
		*self.failing_read.lock().unwrap() = Some(method);
	}

	pub fn heal(&self) {
		*self.failing_read.lock().unwrap() = None;
	}

	pub fn read_count(&self) -> usize {
		self.reads.load(Ordering::SeqCst)
	}

	pub fn write_count(&self) -> usize {
		self.writes.lock().unwrap().len()
	}

	pub fn is_subscribed(&self) -> bool {
		self.handler.lock().unwrap().is_some()
	}

	/// Simulate the event stream dropping: the handler is detached without an unsubscribe.
	pub fn end_stream(&self) {
		self.stream_ended.lock().unwrap().store(true, Ordering::SeqCst);
		*self.handler.lock().unwrap() = None;
	}

	/// Deliver an event to the subscribed handler, if any.
	pub async fn emit(&self) {
		let handler = self.handler.lock().unwrap().clone();
		if let Some(handler) = handler {
			handler.on_event(ContractEvent::default()).await;
		}
	}

	fn read<T>(
		&self,
		method: &'static str,
		f: impl FnOnce(&MockState) -> T,
	) -> Result<T, GatewayError> {
		self.reads.fetch_add(1, Ordering::SeqCst);
		if *self.failing_read.lock().unwrap() == Some(method) {
			return Err(GatewayError::ReadError {
				method,
				message: "connection reset".to_string(),
			});
		}
		Ok(f(&self.state.lock().unwrap()))
	}

	fn write(&self, method: &'static str, from: Address, value: U256) -> Result<TxHash, GatewayError> {
		if let Some(err) = self.write_error.lock().unwrap().clone() {
			return Err(err);
		}
		let mut writes = self.writes.lock().unwrap();
		writes.push(RecordedWrite {
			method,
			from,
			value,
		});
		Ok(TxHash::from_low_u64_be(writes.len() as u64))
	}
}

#[async_trait::async_trait]
impl ContractGateway for MockGateway {
	async fn owner(&self) -> Result<Address, GatewayError> {
		let gate = self.owner_gates.lock().unwrap().pop_front();
		if let Some(gate) = gate {
			let _ = gate.await;
		}
		self.read("owner", |s| s.owner)
	}

	async fn contract_balance(&self) -> Result<U256, GatewayError> {
		self.read("getContractBalance", |s| s.balance)
	}

	async fn total_fees(&self) -> Result<U256, GatewayError> {
		self.read("totalFees", |s| s.fees)
	}

	async fn active_campaign_ids(&self) -> Result<Vec<U256>, GatewayError> {
		self.read("getActiveCampaigns", |s| s.live.clone())
	}

	async fn fulfilled_campaign_ids(&self) -> Result<Vec<U256>, GatewayError> {
		self.read("getFulfilledCampaigns", |s| s.fulfilled.clone())
	}

	async fn cancelled_campaign_ids(&self) -> Result<Vec<U256>, GatewayError> {
		self.read("getCancelledCampaigns", |s| s.cancelled.clone())
	}

	async fn campaign_detail(&self, id: U256) -> Result<CampaignDetail, GatewayError> {
		self.read("getCampaign", |s| s.details.get(&id).cloned())?
			.ok_or(GatewayError::ReadError {
				method: "getCampaign",
				message: format!("unknown campaign {}", id),
			})
	}

	async fn create_campaign(
		&self,
		from: Address,
		_title: String,
		_pledge_cost: U256,
		_pledges_needed: U256,
		fee: U256,
	) -> Result<TxHash, GatewayError> {
		self.write("createCampaign", from, fee)
	}

	async fn pledge(
		&self,
		from: Address,
		_id: U256,
		_count: U256,
		value: U256,
	) -> Result<TxHash, GatewayError> {
		self.write("pledge", from, value)
	}

	async fn cancel_campaign(&self, from: Address, _id: U256) -> Result<TxHash, GatewayError> {
		self.write("cancelCampaign", from, U256::zero())
	}

	async fn fulfill_campaign(&self, from: Address, _id: U256) -> Result<TxHash, GatewayError> {
		self.write("fulfillCampaign", from, U256::zero())
	}

	async fn claim_refund(&self, from: Address, _id: U256) -> Result<TxHash, GatewayError> {
		self.write("claimRefund", from, U256::zero())
	}

	async fn withdraw_fees(&self, from: Address) -> Result<TxHash, GatewayError> {
		self.write("withdrawFees", from, U256::zero())
	}

	async fn change_owner(&self, from: Address, _new_owner: Address) -> Result<TxHash, GatewayError> {
		self.write("changeOwner", from, U256::zero())
	}

	async fn ban_entrepreneur(
		&self,
		from: Address,
		_entrepreneur: Address,
	) -> Result<TxHash, GatewayError> {
		self.write("banEntrepreneur", from, U256::zero())
	}

	async fn destroy_contract(&self, from: Address) -> Result<TxHash, GatewayError> {
		self.write("destroyContract", from, U256::zero())
	}

	async fn subscribe_all(
		&self,
		handler: Arc<dyn ContractEventHandler>,
	) -> Result<Subscription, GatewayError> {
		if self.fail_subscribe.load(Ordering::SeqCst) {
			return Err(GatewayError::SubscriptionError("connection closed".to_string()));
		}
		self.subscriptions.fetch_add(1, Ordering::SeqCst);
		*self.handler.lock().unwrap() = Some(handler);

		let ended = Arc::new(AtomicBool::new(false));
		*self.stream_ended.lock().unwrap() = ended.clone();

		let slot = self.handler.clone();
		let unsubscribes = self.unsubscribes.clone();
		Ok(Subscription::new(move || {
			unsubscribes.fetch_add(1, Ordering::SeqCst);
			if let Ok(mut slot) = slot.lock() {
				*slot = None;
			}
		})
		.with_end_check(move || ended.load(Ordering::SeqCst)))
	}
}
