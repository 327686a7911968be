//! At-the-money binary option pricing
//!
//! An ATM binary pays `amount` on a win with probability one half, so its
//! fair premium is `amount / 2`. The trader pays the premium grossed up by
//! the settlement fee percentage:
//!
//! ```text
//! total_fee      = premium * 1e4 / (1e4 - sf)
//! settlement_fee = total_fee - premium
//! ```

use crate::{MarketError, MarketResult};
use binopt_types::{Amount, Timestamp};

/// 100% in settlement-fee and slippage units
pub const PERCENTAGE_PRECISION: u128 = 10_000;

/// Option size whose fee defines the unit fee
pub const UNIT_AMOUNT: Amount = 1_000_000;

/// Probability of one half in [`PERCENTAGE_PRECISION`] units
pub const HALF: u128 = PERCENTAGE_PRECISION / 2;

/// Fee components of an option
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    pub total_fee: Amount,
    pub settlement_fee: Amount,
    pub premium: Amount,
}

fn check_fee_percentage(settlement_fee_percentage: u128) -> MarketResult<()> {
    if settlement_fee_percentage >= PERCENTAGE_PRECISION {
        return Err(MarketError::InvalidSettlementFee(settlement_fee_percentage));
    }
    Ok(())
}

/// Fees for an option paying `amount`
pub fn fees(amount: Amount, settlement_fee_percentage: u128) -> MarketResult<FeeBreakdown> {
    check_fee_percentage(settlement_fee_percentage)?;
    let premium = amount / 2;
    let total_fee = premium
        .checked_mul(PERCENTAGE_PRECISION)
        .ok_or(MarketError::Overflow)?
        / (PERCENTAGE_PRECISION - settlement_fee_percentage);
    Ok(FeeBreakdown {
        total_fee,
        settlement_fee: total_fee - premium,
        premium,
    })
}

/// Total fee of a [`UNIT_AMOUNT`] option
pub fn unit_fee(settlement_fee_percentage: u128) -> MarketResult<Amount> {
    Ok(fees(UNIT_AMOUNT, settlement_fee_percentage)?.total_fee)
}

/// Option size a fee buys
pub fn amount_for_fee(fee: Amount, settlement_fee_percentage: u128) -> MarketResult<Amount> {
    let unit = unit_fee(settlement_fee_percentage)?;
    Ok(fee.checked_mul(UNIT_AMOUNT).ok_or(MarketError::Overflow)? / unit)
}

/// Fee split for an applied fee: `(amount, premium, settlement_fee)`
///
/// The settlement fee absorbs rounding so that `premium + settlement_fee`
/// always equals the applied fee.
pub fn split_fee(
    applied_fee: Amount,
    settlement_fee_percentage: u128,
) -> MarketResult<(Amount, Amount, Amount)> {
    let amount = amount_for_fee(applied_fee, settlement_fee_percentage)?;
    let premium = (amount / 2).min(applied_fee);
    Ok((amount, premium, applied_fee - premium))
}

/// Settlement fee percentage after discounts
pub fn settlement_fee_percentage(base: u128, referral_reduction: u128, boost_reduction: u128) -> u128 {
    base.saturating_sub(referral_reduction)
        .saturating_sub(boost_reduction)
}

/// Whether `price` lies within `slippage` (1e2 precision) of `strike`
///
/// Bounds that do not fit in a `u128` make the strike invalid.
pub fn is_strike_valid(slippage: u128, price: u128, strike: u128) -> bool {
    let upper = PERCENTAGE_PRECISION
        .checked_add(slippage)
        .and_then(|factor| strike.checked_mul(factor));
    let lower = strike.checked_mul(PERCENTAGE_PRECISION.saturating_sub(slippage));
    match (lower, upper) {
        (Some(lower), Some(upper)) => {
            lower / PERCENTAGE_PRECISION <= price && price <= upper / PERCENTAGE_PRECISION
        }
        _ => false,
    }
}

/// Whether a revealed direction wins at `price`
pub fn is_winning(is_above: bool, strike: u128, price: u128) -> bool {
    if is_above {
        price > strike
    } else {
        price < strike
    }
}

/// Probability the option ends in the money, in [`PERCENTAGE_PRECISION`] units
///
/// Decays linearly from one half at creation towards the current outcome
/// (1 winning, 0 losing, one half at the strike) as the option approaches
/// expiry.
pub fn early_close_probability(
    is_above: bool,
    strike: u128,
    price: u128,
    created_at: Timestamp,
    expiration: Timestamp,
    now: Timestamp,
) -> u128 {
    let period = u128::from(expiration.saturating_sub(created_at));
    let elapsed = u128::from(now.saturating_sub(created_at));
    let progress = if period == 0 {
        PERCENTAGE_PRECISION
    } else {
        (elapsed * PERCENTAGE_PRECISION / period).min(PERCENTAGE_PRECISION)
    };

    if price == strike {
        HALF
    } else if is_winning(is_above, strike, price) {
        HALF + HALF * progress / PERCENTAGE_PRECISION
    } else {
        HALF - HALF * progress / PERCENTAGE_PRECISION
    }
}

/// Early-close payout for an option of `amount` at `probability`
pub fn early_close_payout(amount: Amount, probability: u128) -> Amount {
    amount * probability.min(PERCENTAGE_PRECISION) / PERCENTAGE_PRECISION
}
