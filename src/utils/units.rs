//! Conversion between the contract's integer base unit and the display unit.
//!
//! The contract accounts in base units (18 decimal places below the display unit). Values
//! cross into the presentation layer as canonical decimal strings: no exponent, no sign,
//! no trailing fractional zeros, and `"0"` for zero.

use ethers::types::U256;
use ethers::utils::{ParseUnits, format_units, parse_units};

/// Number of decimal places between the display unit and the base unit.
pub const DISPLAY_DECIMALS: u32 = 18;

/// Largest whole part (in digits) whose base-unit value still fits in a `U256`.
const MAX_WHOLE_DIGITS: usize = 77 - DISPLAY_DECIMALS as usize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitError {
	#[error("Empty amount")]
	Empty,

	#[error("Invalid amount '{0}': expected a non-negative decimal number")]
	Malformed(String),

	#[error("Amount '{0}' has more than 18 fractional digits")]
	TooPrecise(String),

	#[error("Amount overflows the base unit range: {0}")]
	Overflow(String),
}

/// Convert a display-unit decimal string into base units.
pub fn to_base_units(display: &str) -> Result<U256, UnitError> {
	let amount = display.trim();
	if amount.is_empty() {
		return Err(UnitError::Empty);
	}

	let (whole, fraction) = match amount.split_once('.') {
		Some((whole, fraction)) => (whole, fraction),
		None => (amount, ""),
	};
	let well_formed = !(whole.is_empty() && fraction.is_empty())
		&& whole.chars().all(|c| c.is_ascii_digit())
		&& fraction.chars().all(|c| c.is_ascii_digit());
	if !well_formed {
		return Err(UnitError::Malformed(amount.to_string()));
	}
	if fraction.len() > DISPLAY_DECIMALS as usize {
		return Err(UnitError::TooPrecise(amount.to_string()));
	}
	if whole.trim_start_matches('0').len() > MAX_WHOLE_DIGITS {
		return Err(UnitError::Overflow(amount.to_string()));
	}

	match parse_units(amount, DISPLAY_DECIMALS) {
		Ok(ParseUnits::U256(value)) => Ok(value),
		Ok(ParseUnits::I256(_)) => Err(UnitError::Malformed(amount.to_string())),
		Err(e) => Err(UnitError::Overflow(e.to_string())),
	}
}

/// Convert base units into a canonical display-unit decimal string.
pub fn to_display_units(base: U256) -> Result<String, UnitError> {
	let formatted =
		format_units(base, DISPLAY_DECIMALS).map_err(|e| UnitError::Overflow(e.to_string()))?;
	Ok(trim_fraction(&formatted))
}

/// Exact product of a base-unit price and an integer count.
pub fn multiply(base: U256, count: U256) -> Result<U256, UnitError> {
	base.checked_mul(count)
		.ok_or_else(|| UnitError::Overflow(format!("{} x {}", base, count)))
}

fn trim_fraction(formatted: &str) -> String {
	if !formatted.contains('.') {
		return formatted.to_string();
	}
	formatted
		.trim_end_matches('0')
		.trim_end_matches('.')
		.to_string()
}
