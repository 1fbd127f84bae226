//! Position sizing.
//!
//! `units = floor((equity * leverage / price) / lot_unit) * lot_unit`
//!
//! The leverage input arrives pre-clamped by the proposal gate. A zero
//! result is a valid outcome (account too small for one lot) and the
//! caller degrades the cycle to HOLD.

use rust_decimal::Decimal;

use fxcarry_core::{Price, Size};

/// Compute the order size for an entry.
#[must_use]
pub fn position_units(
    equity: Price,
    leverage: Decimal,
    price: Price,
    min_lot_unit: Decimal,
) -> Size {
    if !price.is_positive() || leverage <= Decimal::ZERO || !equity.is_positive() {
        return Size::ZERO;
    }

    let investable = equity.inner() * leverage;
    let raw_units = investable / price.inner();
    Size::new(raw_units).floor_to_lot(min_lot_unit)
}
