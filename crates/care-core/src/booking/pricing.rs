//! Pricing and revenue split. All amounts are integer cents.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a payment is divided between caregiver and platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub total_cents: i64,
    pub caregiver_amount_cents: i64,
    pub platform_fee_cents: i64,
}

/// Price of `hours` at `hourly_rate_cents`
pub fn quote(hourly_rate_cents: i64, hours: u8) -> Result<i64> {
    if hourly_rate_cents <= 0 {
        return Err(Error::Validation("hourly rate must be positive".to_string()));
    }
    hourly_rate_cents
        .checked_mul(i64::from(hours))
        .ok_or_else(|| Error::Validation("booking total overflows".to_string()))
}

/// Split `total_cents`, the platform keeping `fee_percent` rounded half up.
/// The caregiver gets the remainder, so the parts always sum to the total.
pub fn split(total_cents: i64, fee_percent: u8) -> Result<PaymentSplit> {
    if total_cents < 0 {
        return Err(Error::Validation("payment total cannot be negative".to_string()));
    }
    if fee_percent > 100 {
        return Err(Error::Validation(format!("fee percent {} exceeds 100", fee_percent)));
    }

    let scaled = i128::from(total_cents) * i128::from(fee_percent);
    let platform_fee_cents = ((scaled + 50) / 100) as i64;

    Ok(PaymentSplit {
        total_cents,
        caregiver_amount_cents: total_cents - platform_fee_cents,
        platform_fee_cents,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        assert_eq!(quote(5_000, 3).unwrap(), 15_000);
        assert!(quote(0, 3).is_err());
        assert!(quote(-100, 1).is_err());
    }

    #[test]
    fn test_default_split() {
        let s = split(10_000, 20).unwrap();
        assert_eq!(s.platform_fee_cents, 2_000);
        assert_eq!(s.caregiver_amount_cents, 8_000);
    }

    #[test]
    fn test_split_parts_sum_to_total() {
        for total in [0, 1, 3, 7, 99, 101, 333, 12_345, 99_999] {
            for pct in [0, 15, 20, 33, 100] {
                let s = split(total, pct).unwrap();
                assert_eq!(s.caregiver_amount_cents + s.platform_fee_cents, total);
                assert!(s.platform_fee_cents >= 0 && s.caregiver_amount_cents >= 0);
            }
        }
    }

    #[test]
    fn test_split_rounds_half_up() {
        // 20% of 13 cents = 2.6 -> 3
        assert_eq!(split(13, 20).unwrap().platform_fee_cents, 3);
        // 20% of 12 cents = 2.4 -> 2
        assert_eq!(split(12, 20).unwrap().platform_fee_cents, 2);
    }

    #[test]
    fn test_split_rejects_bad_input() {
        assert!(split(-1, 20).is_err());
        assert!(split(100, 101).is_err());
    }
}
