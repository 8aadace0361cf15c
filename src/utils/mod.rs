//!
//! Utility module for the crowdfunding client.
//!
//! Re-exports unit conversion helpers used by the sync engine and the action dispatcher.
/// Base unit <-> display unit conversion
pub mod units;

pub use units::{DISPLAY_DECIMALS, UnitError, multiply, to_base_units, to_display_units};
