//! Wallet environment integration.
//!
//! Resolves the active signer and exposes it to the rest of the client as a read-only,
//! lowercase-normalized [`Identity`].

/// Account discovery and the shared identity cell
pub mod account;
/// JSON-RPC backed wallet environment
pub mod rpc;
pub mod types;

pub use account::{AccountProvider, WalletEnvironment};
pub use rpc::RpcWalletEnvironment;
pub use types::*;
