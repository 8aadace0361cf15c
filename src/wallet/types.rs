use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical account address: lowercase, `0x`-prefixed, 40 hex digits.
///
/// Used for the active signer as well as for the owner and entrepreneur addresses read from
/// the contract, so authorization checks compare like with like.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity {
	address: Address,
	text: String,
}

impl Identity {
	pub fn from_address(address: Address) -> Self {
		Self {
			address,
			text: format!("0x{}", hex::encode(address.as_bytes())),
		}
	}

	pub fn as_str(&self) -> &str {
		&self.text
	}

	/// The wire form of this identity.
	pub fn address(&self) -> Address {
		self.address
	}
}

impl FromStr for Identity {
	type Err = WalletError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		let digits = trimmed
			.strip_prefix("0x")
			.or_else(|| trimmed.strip_prefix("0X"))
			.ok_or_else(|| WalletError::InvalidAddress(trimmed.to_string()))?;

		let mut bytes = [0u8; 20];
		hex::decode_to_slice(digits, &mut bytes)
			.map_err(|_| WalletError::InvalidAddress(trimmed.to_string()))?;

		Ok(Self::from_address(Address::from(bytes)))
	}
}

impl TryFrom<String> for Identity {
	type Error = WalletError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<Identity> for String {
	fn from(identity: Identity) -> Self {
		identity.text
	}
}

impl From<Address> for Identity {
	fn from(address: Address) -> Self {
		Self::from_address(address)
	}
}

impl fmt::Display for Identity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.text)
	}
}

/// Errors raised while talking to the wallet environment
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
	#[error("No wallet environment available: {0}")]
	NoWalletEnvironment(String),

	#[error("Authorization denied: {0}")]
	AuthorizationDenied(String),

	#[error("Invalid address: {0}")]
	InvalidAddress(String),

	#[error("Wallet RPC error: {0}")]
	RpcError(String),
}
