//! Exact integer scaling of per-tick constants.
//!
//! All per-tick deltas are scaled by `minutes / tick` and rounded half away
//! from zero. The arithmetic is done on `i64` rationals so `.5` boundaries
//! are exact and never depend on float representation.

use crate::error::SettlementError;

/// Divide `num` by a positive `den`, rounding half away from zero.
///
/// Returns `None` on overflow or a non-positive denominator.
pub fn round_div(num: i64, den: i64) -> Option<i64> {
    if den <= 0 {
        return None;
    }
    let magnitude = num
        .unsigned_abs()
        .checked_mul(2)?
        .checked_add(den.unsigned_abs())?
        .checked_div(den.unsigned_abs().checked_mul(2)?)?;
    let magnitude = i64::try_from(magnitude).ok()?;
    if num < 0 {
        magnitude.checked_neg()
    } else {
        Some(magnitude)
    }
}

/// Scale a per-tick value to `minutes`, rounding half away from zero.
pub fn scaled(per_tick: i32, minutes: i32, tick_minutes: i32) -> Result<i32, SettlementError> {
    let num = i64::from(per_tick)
        .checked_mul(i64::from(minutes))
        .ok_or_else(|| SettlementError::overflow("scaled numerator"))?;
    let value = round_div(num, i64::from(tick_minutes))
        .ok_or_else(|| SettlementError::overflow("scaled division"))?;
    i32::try_from(value).map_err(|_err| SettlementError::overflow("scaled result"))
}

/// HP drain potential of one negative vital over `minutes`.
///
/// `per_mille * |min(vital, 0)| * minutes / (1000 * tick)`, rounded half away
/// from zero. Non-negative vitals never drain.
pub fn drain_potential(
    vital: i32,
    per_mille: i32,
    minutes: i32,
    tick_minutes: i32,
) -> Result<i32, SettlementError> {
    if vital >= 0 {
        return Ok(0);
    }
    let deficit = i64::from(vital.unsigned_abs());
    let num = deficit
        .checked_mul(i64::from(per_mille))
        .and_then(|v| v.checked_mul(i64::from(minutes)))
        .ok_or_else(|| SettlementError::overflow("drain numerator"))?;
    let den = i64::from(tick_minutes)
        .checked_mul(1000)
        .ok_or_else(|| SettlementError::overflow("drain denominator"))?;
    let value =
        round_div(num, den).ok_or_else(|| SettlementError::overflow("drain division"))?;
    i32::try_from(value).map_err(|_err| SettlementError::overflow("drain result"))
}

/// Split a shared `cap` between two drains, the primary consuming it first.
pub fn apply_dual_cap(primary: i32, secondary: i32, cap: i32) -> (i32, i32) {
    if cap <= 0 {
        return (0, 0);
    }
    let primary_applied = primary.clamp(0, cap);
    let remaining = cap.saturating_sub(primary_applied);
    let secondary_applied = secondary.clamp(0, remaining);
    (primary_applied, secondary_applied)
}

/// Ceiling of `value * ratio`, used by instant sleep.
pub fn ceil_ratio(value: i32, num: i32, den: i32) -> Result<i32, SettlementError> {
    if den <= 0 {
        return Err(SettlementError::overflow("ratio denominator"));
    }
    let scaled = i64::from(value)
        .checked_mul(i64::from(num))
        .ok_or_else(|| SettlementError::overflow("ratio numerator"))?;
    let result = scaled.div_euclid(i64::from(den));
    let result = if scaled.rem_euclid(i64::from(den)) == 0 {
        result
    } else {
        result.saturating_add(1)
    };
    i32::try_from(result).map_err(|_err| SettlementError::overflow("ratio result"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exact_half_rounds_away_from_zero() {
        assert_eq!(round_div(15, 30), Some(1));
        assert_eq!(round_div(-15, 30), Some(-1));
        assert_eq!(round_div(14, 30), Some(0));
        assert_eq!(round_div(-14, 30), Some(0));
        assert_eq!(round_div(45, 30), Some(2));
    }

    #[test]
    fn zero_denominator_is_rejected() {
        assert_eq!(round_div(1, 0), None);
    }

    #[test]
    fn scaled_per_tick_values() {
        assert_eq!(scaled(-6, 30, 30).unwrap(), -6);
        assert_eq!(scaled(-1, 15, 30).unwrap(), -1);
        assert_eq!(scaled(-2, 10, 30).unwrap(), -1);
        assert_eq!(scaled(20, 10, 30).unwrap(), 7);
        assert_eq!(scaled(8, 120, 30).unwrap(), 32);
    }

    #[test]
    fn drain_potential_only_for_negative_vitals() {
        assert_eq!(drain_potential(10, 40, 30, 30).unwrap(), 0);
        // 40/1000 * 300 = 12
        assert_eq!(drain_potential(-300, 40, 30, 30).unwrap(), 12);
        // 30/1000 * 50 = 1.5 -> 2
        assert_eq!(drain_potential(-50, 30, 30, 30).unwrap(), 2);
    }

    #[test]
    fn dual_cap_consumes_primary_first() {
        assert_eq!(apply_dual_cap(12, 5, 8), (8, 0));
        assert_eq!(apply_dual_cap(3, 9, 8), (3, 5));
        assert_eq!(apply_dual_cap(3, 2, 8), (3, 2));
        assert_eq!(apply_dual_cap(3, 2, 0), (0, 0));
    }

    #[test]
    fn ceil_ratio_rounds_up() {
        assert_eq!(ceil_ratio(35, 3, 2).unwrap(), 53);
        assert_eq!(ceil_ratio(6, 3, 2).unwrap(), 9);
        assert_eq!(ceil_ratio(35, 1, 1).unwrap(), 35);
    }
}
