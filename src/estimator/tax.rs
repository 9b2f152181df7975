//! Fee arithmetic on raw token amounts.

use ethers::types::{U256, U512};
use crate::models::FAILURE_SENTINEL;

/// Share of the sender's balance moved by the simulated buy, in percent.
pub const PROBE_PERCENT: u64 = 1;

/// Amount used for the buy leg: `balance * PROBE_PERCENT / 100`, rounded down.
pub fn probe_amount(balance: U256) -> U256 {
    balance
        .checked_mul(U256::from(PROBE_PERCENT))
        .map(|scaled| scaled / U256::from(100u64))
        .unwrap_or_else(|| balance / U256::from(100u64) * U256::from(PROBE_PERCENT))
}

/// Percentage of `sent` that did not arrive, rounded half up.
///
/// Arrivals at or above `sent` give 0. Returns `None` when `sent` is zero.
pub fn loss_percent(sent: U256, received: U256) -> Option<u8> {
    if sent.is_zero() {
        return None;
    }
    if received >= sent {
        return Some(0);
    }

    let lost = sent - received;
    // round(lost * 100 / sent) == floor((lost * 200 + sent) / (sent * 2))
    let numerator = lost.full_mul(U256::from(200u64)) + U512::from(sent);
    let denominator = sent.full_mul(U256::from(2u64));
    let percent = (numerator / denominator).low_u64();

    Some(percent.min(FAILURE_SENTINEL as u64) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn test_probe_amount() {
        assert_eq!(probe_amount(u(10_000)), u(100));
        assert_eq!(probe_amount(u(199)), u(1));
        assert_eq!(probe_amount(u(99)), U256::zero());
        assert_eq!(probe_amount(U256::MAX), U256::MAX / u(100));
    }

    #[test]
    fn test_loss_percent() {
        assert_eq!(loss_percent(u(100), u(100)), Some(0));
        assert_eq!(loss_percent(u(100), u(95)), Some(5));
        assert_eq!(loss_percent(u(100), u(0)), Some(100));
        assert_eq!(loss_percent(u(3), u(2)), Some(33));
        assert_eq!(loss_percent(u(3), u(1)), Some(67));
    }

    #[test]
    fn test_loss_percent_rounds_half_up() {
        assert_eq!(loss_percent(u(200), u(199)), Some(1));
        assert_eq!(loss_percent(u(1_000), u(995)), Some(1));
        assert_eq!(loss_percent(u(1_000), u(996)), Some(0));
    }

    #[test]
    fn test_gain_is_clamped_to_zero() {
        assert_eq!(loss_percent(u(100), u(130)), Some(0));
    }

    #[test]
    fn test_zero_sent_is_undefined() {
        assert_eq!(loss_percent(U256::zero(), U256::zero()), None);
        assert_eq!(loss_percent(U256::zero(), u(5)), None);
    }

    #[test]
    fn test_huge_amounts_do_not_overflow() {
        let sent = U256::MAX;
        let received = U256::MAX / u(2);
        assert_eq!(loss_percent(sent, received), Some(50));
    }
}
