//!
//! JSON-RPC wallet environment.
//!
//! Talks to an EIP-1193 style endpoint (a browser-wallet bridge, a signer proxy, or a development
//! node with unlocked accounts) over the same WebSocket connection the contract gateway uses.

use crate::wallet::WalletError;
use crate::wallet::account::WalletEnvironment;

use ethers::providers::{Provider, ProviderError, RpcError, Ws};
use ethers::types::Address;
use std::sync::Arc;
use tracing::{debug, error, info};

/// EIP-1193 "user rejected the request"
pub const USER_REJECTED_CODE: i64 = 4001;
/// JSON-RPC "method not found"
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Open the connection to the wallet environment.
///
/// Failure here means there is no wallet environment at all.
pub async fn connect(url: &str) -> Result<Arc<Provider<Ws>>, WalletError> {
	debug!("Connecting to wallet environment at {}", url);
	let provider = Provider::<Ws>::connect(url).await.map_err(|e| {
		error!("Wallet environment unreachable at {}: {}", url, e);
		WalletError::NoWalletEnvironment(format!("{}: {}", url, e))
	})?;
	info!("Connected to wallet environment at {}", url);
	Ok(Arc::new(provider))
}

/// Wallet environment backed by a JSON-RPC provider
#[derive(Clone)]
pub struct RpcWalletEnvironment {
	provider: Arc<Provider<Ws>>,
}

impl RpcWalletEnvironment {
	pub fn new(provider: Arc<Provider<Ws>>) -> Self {
		Self { provider }
	}
}

#[async_trait::async_trait]
impl WalletEnvironment for RpcWalletEnvironment {
	async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
		self.provider
			.request::<_, Vec<Address>>("eth_accounts", ())
			.await
			.map_err(classify_wallet_error)
	}

	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
		match self
			.provider
			.request::<_, Vec<Address>>("eth_requestAccounts", ())
			.await
		{
			Ok(accounts) => Ok(accounts),
			Err(e) if rpc_code(&e) == Some(METHOD_NOT_FOUND_CODE) => {
				debug!("eth_requestAccounts unsupported, falling back to eth_accounts");
				self.accounts().await
			}
			Err(e) => Err(classify_wallet_error(e)),
		}
	}
}

fn rpc_code(err: &ProviderError) -> Option<i64> {
	RpcError::as_error_response(err).map(|response| response.code)
}

fn classify_wallet_error(err: ProviderError) -> WalletError {
	match RpcError::as_error_response(&err) {
		Some(response) if response.code == USER_REJECTED_CODE => {
			WalletError::AuthorizationDenied(response.message.clone())
		}
		_ => WalletError::RpcError(err.to_string()),
	}
}
