// src/utils/precision.rs
use rust_decimal::Decimal;

/// Fractional digits kept when writing ledger values or rendering reports.
pub const PERSISTED_SCALE: u32 = 8;

/// Rounds a quantity DOWN to the nearest multiple of `step`.
/// Example: amount=10.999, step=1.0 -> 10.0
pub fn normalize_quantity(amount: Decimal, step: Decimal) -> Decimal {
    if step.is_zero() {
        return amount;
    }
    (amount / step).floor() * step
}

/// Rounding for the persistence/display boundary only. Accumulation math
/// stays exact; stored display values and report lines are trimmed here.
pub fn round_persisted(value: Decimal) -> Decimal {
    value.round_dp(PERSISTED_SCALE)
}
