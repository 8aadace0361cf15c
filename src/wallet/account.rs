//! Active account discovery.
//!
//! `AccountProvider` owns the single writable copy of the signer identity. Every other
//! component observes it through a `watch::Receiver`.

use crate::wallet::{Identity, WalletError};

use ethers::types::Address;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Host wallet environment exposing the user's accounts
#[async_trait::async_trait]
pub trait WalletEnvironment: Send + Sync {
	/// Accounts already authorized for this client. Never prompts.
	async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

	/// Ask the user to authorize this client and return the authorized accounts.
	async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;
}

/// Resolves and publishes the currently authorized signer
pub struct AccountProvider {
	environment: Arc<dyn WalletEnvironment>,
	identity: watch::Sender<Option<Identity>>,
}

impl AccountProvider {
	pub fn new(environment: Arc<dyn WalletEnvironment>) -> Self {
		let (identity, _) = watch::channel(None);
		Self {
			environment,
			identity,
		}
	}

	/// Silent re-query of the wallet environment.
	///
	/// Returns `None` if no account is authorized yet. A previously resolved identity is kept
	/// in that case.
	pub async fn resolve_current(&self) -> Result<Option<Identity>, WalletError> {
		let accounts = self.environment.accounts().await?;
		match accounts.first() {
			Some(address) => {
				let identity = Identity::from_address(*address);
				debug!("Resolved active account {}", identity);
				self.publish(identity.clone());
				Ok(Some(identity))
			}
			None => {
				debug!("Wallet environment exposes no authorized account");
				Ok(None)
			}
		}
	}

	/// Actively request authorization and return the primary account.
	pub async fn request_connection(&self) -> Result<Identity, WalletError> {
		info!("Requesting account authorization from wallet environment");
		let accounts = self.environment.request_accounts().await?;

		let Some(address) = accounts.first() else {
			warn!("Wallet environment authorized no accounts");
			return Err(WalletError::AuthorizationDenied(
				"no account was authorized".to_string(),
			));
		};

		let identity = Identity::from_address(*address);
		info!("Connected account {}", identity);
		self.publish(identity.clone());
		Ok(identity)
	}

	pub fn current(&self) -> Option<Identity> {
		self.identity.borrow().clone()
	}

	/// Read-only view of the identity for other components.
	pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
		self.identity.subscribe()
	}

	fn publish(&self, identity: Identity) {
		self.identity.send_if_modified(|current| {
			if current.as_ref() == Some(&identity) {
				return false;
			}
			*current = Some(identity);
			true
		});
	}
}

#[cfg(test)]
pub(crate) mod mock {
	use super::*;
	use std::sync::Mutex;
	use std::sync::atomic::{AtomicUsize, Ordering};

	/// Scriptable wallet environment
	#[derive(Default)]
	pub struct MockWallet {
		pub authorized: Mutex<Vec<Address>>,
		pub on_request: Mutex<Vec<Address>>,
		pub deny: Mutex<bool>,
		pub requests: AtomicUsize,
	}

	#[async_trait::async_trait]
	impl WalletEnvironment for MockWallet {
		async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
			Ok(self.authorized.lock().unwrap().clone())
		}

		async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
			self.requests.fetch_add(1, Ordering::SeqCst);
			if *self.deny.lock().unwrap() {
				return Err(WalletError::AuthorizationDenied("User rejected the request.".into()));
			}
			let granted = self.on_request.lock().unwrap().clone();
			*self.authorized.lock().unwrap() = granted.clone();
			Ok(granted)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::mock::MockWallet;
	use super::*;
	use std::sync::atomic::Ordering;

	#[tokio::test]
	async fn resolve_current_without_accounts_yields_none() {
		let wallet = Arc::new(MockWallet::default());
		let provider = AccountProvider::new(wallet.clone());

		assert!(provider.resolve_current().await.unwrap().is_none());
		assert!(provider.current().is_none());
		assert_eq!(wallet.requests.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn resolve_current_publishes_first_account() {
		let wallet = Arc::new(MockWallet::default());
		*wallet.authorized.lock().unwrap() =
			vec![Address::repeat_byte(0xAA), Address::repeat_byte(0xBB)];
		let provider = AccountProvider::new(wallet);
		let mut identity = provider.subscribe();

		let resolved = provider.resolve_current().await.unwrap().unwrap();
		assert_eq!(resolved, Identity::from_address(Address::repeat_byte(0xAA)));
		assert!(identity.has_changed().unwrap());
		assert_eq!(identity.borrow_and_update().clone(), Some(resolved));
	}

	#[tokio::test]
	async fn identity_is_never_auto_cleared() {
		let wallet = Arc::new(MockWallet::default());
		*wallet.authorized.lock().unwrap() = vec![Address::repeat_byte(0x01)];
		let provider = AccountProvider::new(wallet.clone());
		provider.resolve_current().await.unwrap();

		wallet.authorized.lock().unwrap().clear();
		assert!(provider.resolve_current().await.unwrap().is_none());
		assert_eq!(
			provider.current(),
			Some(Identity::from_address(Address::repeat_byte(0x01)))
		);
	}

	#[tokio::test]
	async fn request_connection_returns_primary_account() {
		let wallet = Arc::new(MockWallet::default());
		*wallet.on_request.lock().unwrap() = vec![Address::repeat_byte(0x42)];
		let provider = AccountProvider::new(wallet);

		let identity = provider.request_connection().await.unwrap();
		assert_eq!(identity, Identity::from_address(Address::repeat_byte(0x42)));
		assert_eq!(provider.current(), Some(identity));
	}

	#[tokio::test]
	async fn request_connection_surfaces_denial() {
		let wallet = Arc::new(MockWallet::default());
		*wallet.deny.lock().unwrap() = true;
		let provider = AccountProvider::new(wallet);

		assert!(matches!(
			provider.request_connection().await,
			Err(WalletError::AuthorizationDenied(_))
		));
		assert!(provider.current().is_none());
	}

	#[tokio::test]
	async fn empty_authorization_is_a_denial() {
		let provider = AccountProvider::new(Arc::new(MockWallet::default()));
		assert!(matches!(
			provider.request_connection().await,
			Err(WalletError::AuthorizationDenied(_))
		));
	}
}
