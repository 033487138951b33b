//! Fee model: flat-fee schedules, price-ratio fees and the exchange split.
//!
//! A flat schedule is a list of alternatives (one coin per denom); the payer
//! declares which one it pays. A ratio schedule charges, for a given price,
//! `floor(fee * price / ratio_price)` for **every** ratio whose price denom
//! matches, so one price can yield fees in several denoms.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Coin, Coins, ExchangeError, Result, constants};

// ---------------------------------------------------------------------------
// FeeRatio
// ---------------------------------------------------------------------------

/// A price-proportional fee: paying `price` costs `fee`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeRatio {
    pub price: Coin,
    pub fee: Coin,
}

impl FeeRatio {
    #[must_use]
    pub fn new(price: Coin, fee: Coin) -> Self {
        Self { price, fee }
    }

    /// Both amounts positive, both denoms valid, and a same-denom fee never
    /// exceeds its price.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ExchangeError::InvalidFeeRatio {
            ratio: self.to_string(),
            reason,
        };
        self.price.validate().map_err(|e| invalid(e.to_string()))?;
        self.fee.validate().map_err(|e| invalid(e.to_string()))?;
        if self.price.amount == 0 {
            return Err(invalid("price amount must be positive".into()));
        }
        if self.fee.amount == 0 {
            return Err(invalid("fee amount must be positive".into()));
        }
        if self.price.denom == self.fee.denom && self.fee.amount > self.price.amount {
            return Err(invalid("fee amount cannot exceed price amount".into()));
        }
        Ok(())
    }

    /// Fee owed on `price`, rounded down.
    ///
    /// # Errors
    /// `InvalidFeeRatio` if `price` is not in this ratio's price denom;
    /// `Overflow` if the intermediate product does not fit.
    pub fn apply(&self, price: &Coin) -> Result<Coin> {
        if price.denom != self.price.denom {
            return Err(ExchangeError::InvalidFeeRatio {
                ratio: self.to_string(),
                reason: format!("cannot apply to price {price}: denom mismatch"),
            });
        }
        if self.price.amount == 0 {
            return Err(ExchangeError::InvalidFeeRatio {
                ratio: self.to_string(),
                reason: "price amount must be positive".into(),
            });
        }
        let amount = self
            .fee
            .amount
            .checked_mul(price.amount)
            .ok_or(ExchangeError::Overflow)?
            / self.price.amount;
        Ok(Coin::new(amount, self.fee.denom.clone()))
    }
}

impl fmt::Display for FeeRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.price, self.fee)
    }
}

impl FromStr for FeeRatio {
    type Err = ExchangeError;

    /// Parse `"<price>:<fee>"`, e.g. `"100stake:1stake"`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: String| ExchangeError::InvalidFeeRatio {
            ratio: s.to_string(),
            reason,
        };
        let mut parts = s.split(':');
        let (Some(price), Some(fee), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected <price>:<fee>".into()));
        };
        let price: Coin = price.parse().map_err(|e: ExchangeError| invalid(e.to_string()))?;
        let fee: Coin = fee.parse().map_err(|e: ExchangeError| invalid(e.to_string()))?;
        let ratio = Self { price, fee };
        ratio.validate().map_err(|e| match e {
            ExchangeError::InvalidFeeRatio { reason, .. } => invalid(reason),
            other => other,
        })?;
        Ok(ratio)
    }
}

/// Parse a comma separated list of ratios.
pub fn parse_fee_ratios(s: &str) -> Result<Vec<FeeRatio>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',').map(str::parse).collect()
}

/// Validate every ratio and reject duplicate (price denom, fee denom) pairs.
pub fn validate_fee_ratios(ratios: &[FeeRatio]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for ratio in ratios {
        ratio.validate()?;
        if !seen.insert((ratio.price.denom.as_str(), ratio.fee.denom.as_str())) {
            return Err(ExchangeError::DuplicateFeeRatio {
                price_denom: ratio.price.denom.clone(),
                fee_denom: ratio.fee.denom.clone(),
            });
        }
    }
    Ok(())
}

/// Validate a flat-fee schedule: valid positive coins, one per denom.
pub fn validate_flat_fees(field: &str, options: &[Coin]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for coin in options {
        coin.validate_positive(field)?;
        if !seen.insert(coin.denom.as_str()) {
            return Err(ExchangeError::InvalidCoin {
                coin: coin.to_string(),
                reason: format!("duplicate denom in {field}"),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Fee computation
// ---------------------------------------------------------------------------

/// True if some ratio in the schedule prices in `denom`.
#[must_use]
pub fn has_ratio_for(ratios: &[FeeRatio], denom: &str) -> bool {
    ratios.iter().any(|r| r.price.denom == denom)
}

/// Sum of the ratio fees on `price` over every ratio matching its denom.
pub fn ratio_fees(ratios: &[FeeRatio], price: &Coin) -> Result<Coins> {
    let mut rv = Coins::empty();
    for ratio in ratios.iter().filter(|r| r.price.denom == price.denom) {
        rv.add_coin(&ratio.apply(price)?)?;
    }
    Ok(rv)
}

/// Check a declared flat fee against a schedule of alternatives.
///
/// An empty schedule requires nothing. Otherwise `declared` must name one of
/// the schedule's denoms with at least the listed amount.
pub fn check_flat_fee(what: &str, options: &[Coin], declared: Option<&Coin>) -> Result<()> {
    if options.is_empty() {
        return Ok(());
    }
    let list = || {
        options
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ")
    };
    let Some(declared) = declared else {
        return Err(ExchangeError::InsufficientFee {
            reason: format!("{what} fee required, options: {}", list()),
        });
    };
    match options.iter().find(|o| o.denom == declared.denom) {
        Some(option) if declared.amount >= option.amount => Ok(()),
        _ => Err(ExchangeError::InsufficientFee {
            reason: format!("{what} fee {declared} does not satisfy {}", list()),
        }),
    }
}

/// Check that a buyer's declared settlement fees cover one flat alternative
/// plus the ratio fees on the full `price`.
pub fn check_buyer_settlement_fees(
    flat: &[Coin],
    ratios: &[FeeRatio],
    price: &Coin,
    declared: &Coins,
) -> Result<()> {
    if !ratios.is_empty() && !has_ratio_for(ratios, &price.denom) {
        return Err(ExchangeError::InsufficientFee {
            reason: format!("no buyer settlement fee ratio for price denom {:?}", price.denom),
        });
    }
    let ratio = ratio_fees(ratios, price)?;
    if flat.is_empty() {
        if declared.is_all_gte(&ratio) {
            return Ok(());
        }
        return Err(ExchangeError::InsufficientFee {
            reason: format!("buyer settlement fees {declared} do not cover {ratio}"),
        });
    }
    for option in flat {
        let mut required = ratio.clone();
        required.add_coin(option)?;
        if declared.is_all_gte(&required) {
            return Ok(());
        }
    }
    Err(ExchangeError::InsufficientFee {
        reason: format!(
            "buyer settlement fees {declared} do not cover {ratio} plus one of {}",
            flat.iter().map(ToString::to_string).collect::<Vec<_>>().join(" or ")
        ),
    })
}

/// Split a fee coin into (exchange share, market share) by basis points.
/// The exchange share rounds up.
pub fn split_fee(fee: &Coin, split_bips: u16) -> Result<(Coin, Coin)> {
    let exchange = ceil_div(
        fee.amount
            .checked_mul(u128::from(split_bips))
            .ok_or(ExchangeError::Overflow)?,
        constants::BIPS_DENOMINATOR,
    );
    let exchange = exchange.min(fee.amount);
    Ok((
        Coin::new(exchange, fee.denom.clone()),
        Coin::new(fee.amount - exchange, fee.denom.clone()),
    ))
}

/// `ceil(amount * part / whole)`, for pro-rating fees of partial fills.
pub fn prorate_ceil(amount: u128, part: u128, whole: u128) -> Result<u128> {
    if whole == 0 {
        return Err(ExchangeError::Internal("pro-rate over zero".into()));
    }
    let product = amount.checked_mul(part).ok_or(ExchangeError::Overflow)?;
    Ok(ceil_div(product, whole))
}

/// `amount * part / whole` when it divides exactly, `None` otherwise.
pub fn prorate_exact(amount: u128, part: u128, whole: u128) -> Result<Option<u128>> {
    if whole == 0 {
        return Err(ExchangeError::Internal("pro-rate over zero".into()));
    }
    let product = amount.checked_mul(part).ok_or(ExchangeError::Overflow)?;
    Ok((product % whole == 0).then_some(product / whole))
}

fn ceil_div(n: u128, d: u128) -> u128 {
    n / d + u128::from(n % d != 0)
}
