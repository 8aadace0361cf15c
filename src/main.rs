use crowdfund_sync::contract::EthersGateway;
use crowdfund_sync::sync::{SyncEngine, SyncedSnapshot};
use crowdfund_sync::transaction::{ActionDispatcher, ActionError, Permissions};
use crowdfund_sync::wallet::{self, AccountProvider, Identity, RpcWalletEnvironment, WalletError};
use crowdfund_sync::ClientConfig;

use anyhow::Context;
use ethers::types::{TxHash, U256};
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env()
				.add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let config = ClientConfig::from_env().context("Failed to load configuration")?;
	info!("Starting crowdfunding client for contract {:?}", config.contract_address);

	let provider = match wallet::rpc::connect(&config.rpc_url).await {
		Ok(provider) => provider,
		Err(e) => {
			error!("Cannot continue without a wallet environment: {}", e);
			return Ok(());
		}
	};

	let accounts = AccountProvider::new(Arc::new(RpcWalletEnvironment::new(provider.clone())));
	let identity = match connect_account(&accounts).await {
		Ok(identity) => identity,
		Err(e) => {
			warn!("No account available: {}", e);
			return Ok(());
		}
	};

	let gateway = Arc::new(EthersGateway::new(provider, config.contract_address));
	let engine = SyncEngine::new(gateway.clone(), config.engine_config());
	let dispatcher = ActionDispatcher::new(
		gateway,
		accounts.subscribe(),
		engine.subscribe_snapshot(),
		config.action_config(),
	)
	.context("Invalid campaign fee")?;

	if let Err(e) = engine.start(identity.clone()).await {
		warn!("Initial sync failed, waiting for the next contract event: {}", e);
	}

	let mut snapshots = engine.subscribe_snapshot();
	if let Some(snapshot) = snapshots.borrow_and_update().clone() {
		present(&identity, &snapshot);
	}

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	info!("Type 'help' for commands");

	loop {
		tokio::select! {
			changed = snapshots.changed() => {
				if changed.is_err() {
					break;
				}
				let snapshot = snapshots.borrow_and_update().clone();
				if let Some(snapshot) = snapshot {
					present(&identity, &snapshot);
				}
			}
			line = lines.next_line() => {
				let Some(line) = line.context("Failed to read stdin")? else {
					break;
				};
				match line.parse::<Command>() {
					Ok(Command::Quit) => break,
					Ok(Command::Help) => info!("{}", Command::USAGE),
					Ok(Command::Refresh) => engine.trigger_refresh(),
					Ok(command) => report(command.run(&dispatcher).await),
					Err(e) => warn!("{}", e),
				}
			}
			_ = tokio::signal::ctrl_c() => {
				info!("Received Ctrl-C");
				break;
			}
		}
	}

	engine.stop().await;
	info!("Shut down");
	Ok(())
}

/// Use an already authorized account, otherwise ask the wallet for one.
async fn connect_account(accounts: &AccountProvider) -> Result<Identity, WalletError> {
	if let Some(identity) = accounts.resolve_current().await? {
		return Ok(identity);
	}
	info!("No authorized account, requesting wallet connection");
	accounts.request_connection().await
}

fn present(identity: &Identity, snapshot: &SyncedSnapshot) {
	let permissions = Permissions::derive(identity, snapshot);
	info!(
		"Snapshot #{} at {}: owner {}, balance {}, fees {}",
		snapshot.generation,
		snapshot.refreshed_at.format("%H:%M:%S"),
		snapshot.owner,
		snapshot.balance,
		snapshot.collected_fees
	);
	for campaign in &snapshot.live {
		let allowed = permissions.campaign(campaign.id);
		info!(
			"  live #{} '{}' by {}: {}/{} pledges at {} each{}",
			campaign.id,
			campaign.title,
			campaign.entrepreneur,
			campaign.pledges_received,
			campaign.pledges_needed,
			campaign.unit_cost,
			match allowed {
				Some(p) if p.can_fulfill => " [cancel, fulfill]",
				Some(p) if p.can_cancel => " [cancel]",
				_ => "",
			}
		);
	}
	info!(
		"  {} fulfilled, {} cancelled; you are {}",
		snapshot.fulfilled.len(),
		snapshot.cancelled.len(),
		if permissions.is_owner { "the owner" } else { "a participant" }
	);
	match serde_json::to_string(&snapshot.contract) {
		Ok(json) => debug!("Snapshot JSON: {}", json),
		Err(e) => debug!("Snapshot not serializable: {}", e),
	}
}

fn report(result: Result<TxHash, ActionError>) {
	match result {
		Ok(tx_hash) => info!("Transaction accepted: {:?}", tx_hash),
		Err(e) => warn!("Action refused: {}", e),
	}
}

/// One line of console input
#[derive(Debug, PartialEq, Eq)]
enum Command {
	Create { unit_cost: String, target: String, title: String },
	Pledge { id: U256, count: String },
	Cancel(U256),
	Fulfill(U256),
	Refund(U256),
	Withdraw,
	ChangeOwner(String),
	Ban(String),
	Destroy,
	Refresh,
	Help,
	Quit,
}

impl Command {
	const USAGE: &'static str = "commands: create <unit-cost> <target> <title...> | pledge <id> <count> | \
		cancel <id> | fulfill <id> | refund <id> | withdraw | change-owner <address> | \
		ban <address> | destroy | refresh | quit";

	async fn run(self, dispatcher: &ActionDispatcher) -> Result<TxHash, ActionError> {
		match self {
			Self::Create {
				unit_cost,
				target,
				title,
			} => dispatcher.create_campaign(&title, &unit_cost, &target).await,
			Self::Pledge { id, count } => dispatcher.pledge(id, &count).await,
			Self::Cancel(id) => dispatcher.cancel_campaign(id).await,
			Self::Fulfill(id) => dispatcher.fulfill_campaign(id).await,
			Self::Refund(id) => dispatcher.claim_refund(id).await,
			Self::Withdraw => dispatcher.withdraw_fees().await,
			Self::ChangeOwner(address) => dispatcher.change_owner(&address).await,
			Self::Ban(address) => dispatcher.ban_entrepreneur(&address).await,
			Self::Destroy => dispatcher.destroy_contract().await,
			Self::Refresh | Self::Help | Self::Quit => {
				Err(ActionError::InvalidInput("not a contract action".into()))
			}
		}
	}
}

impl FromStr for Command {
	type Err = String;

	fn from_str(line: &str) -> Result<Self, Self::Err> {
		let mut words = line.split_whitespace();
		let Some(verb) = words.next() else {
			return Ok(Self::Help);
		};
		let mut arg = |name: &str| {
			words
				.next()
				.map(str::to_string)
				.ok_or_else(|| format!("missing <{}> for '{}'", name, verb))
		};
		let id = |raw: String| {
			U256::from_dec_str(&raw).map_err(|_| format!("campaign id '{}' is not a number", raw))
		};

		let command = match verb {
			"create" => {
				let unit_cost = arg("unit-cost")?;
				let target = arg("target")?;
				let title = words.collect::<Vec<_>>().join(" ");
				Self::Create {
					unit_cost,
					target,
					title,
				}
			}
			"pledge" => Self::Pledge {
				id: id(arg("id")?)?,
				count: arg("count")?,
			},
			"cancel" => Self::Cancel(id(arg("id")?)?),
			"fulfill" => Self::Fulfill(id(arg("id")?)?),
			"refund" => Self::Refund(id(arg("id")?)?),
			"withdraw" => Self::Withdraw,
			"change-owner" => Self::ChangeOwner(arg("address")?),
			"ban" => Self::Ban(arg("address")?),
			"destroy" => Self::Destroy,
			"refresh" => Self::Refresh,
			"help" => Self::Help,
			"quit" | "exit" => Self::Quit,
			other => return Err(format!("unknown command '{}'; {}", other, Self::USAGE)),
		};
		Ok(command)
	}
}
