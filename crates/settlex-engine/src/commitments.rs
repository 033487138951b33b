//! Commitment ledger: funds accounts place under a market's custody for
//! settlement outside the order book.
//!
//! Committed funds stay with the account under a ledger hold. A stored
//! commitment is never empty.

use std::collections::BTreeSet;

use settlex_types::{
    AccountAmount, Address, Coin, Coins, Commitment, Event, ExchangeError, Market, MarketId,
    NavUpdate, NetAssetPrice, Permission, ReleaseAmount, Result, constants, fee,
    sum_account_amounts,
};

use crate::collaborators::{AttributeSource, Ledger, NavSink};
use crate::keeper::{Keeper, Tx};
use crate::settlement::pair_amounts;
use crate::state::StoreExt;

/// One account's release in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitmentRelease {
    pub account: Address,
    pub amount: ReleaseAmount,
}

/// Funds moved between committed balances of one market.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitmentSettlement {
    pub market_id: MarketId,
    /// Committed funds taken from each account.
    pub inputs: Vec<AccountAmount>,
    /// Funds re-committed to each receiving account.
    pub outputs: Vec<AccountAmount>,
    /// Prices used to value inputs in the market's intermediary denom.
    pub navs: Vec<NetAssetPrice>,
}

fn check_legs(what: &str, legs: &[AccountAmount]) -> Result<()> {
    if legs.is_empty() {
        return Err(ExchangeError::InvalidCommitment {
            reason: format!("no {what} provided"),
        });
    }
    let mut seen = BTreeSet::new();
    for leg in legs {
        if leg.amount.is_empty() {
            return Err(ExchangeError::InvalidCommitment {
                reason: format!("{what} amount for {} cannot be zero", leg.account),
            });
        }
        if !seen.insert(&leg.account) {
            return Err(ExchangeError::InvalidCommitment {
                reason: format!("{} appears more than once in {what}", leg.account),
            });
        }
    }
    Ok(())
}

fn check_navs(navs: &[NetAssetPrice]) -> Result<()> {
    for nav in navs {
        if !nav.assets.is_positive() || !nav.price.is_positive() || nav.assets.denom == nav.price.denom {
            return Err(ExchangeError::InvalidCommitment {
                reason: format!("invalid net asset price {} for {}", nav.price, nav.assets),
            });
        }
    }
    Ok(())
}

/// Value of `amount` in `intermediary`, converting each other denom through
/// the first matching nav (rounding up).
fn value_in(amount: &Coins, intermediary: &str, navs: &[NetAssetPrice]) -> Result<u128> {
    let mut total = 0u128;
    for coin in amount {
        let value = if coin.denom == intermediary {
            coin.amount
        } else {
            let nav = navs
                .iter()
                .find(|n| n.assets.denom == coin.denom && n.price.denom == intermediary)
                .ok_or_else(|| ExchangeError::MissingNav {
                    denom: coin.denom.clone(),
                    price_denom: intermediary.to_owned(),
                })?;
            fee::prorate_ceil(nav.price.amount, coin.amount, nav.assets.amount)?
        };
        total = total.checked_add(value).ok_or(ExchangeError::Overflow)?;
    }
    Ok(total)
}

/// The exchange's cut of a commitment settlement, paid by the market.
fn settlement_fee(market: &Market, inputs: &Coins, navs: &[NetAssetPrice]) -> Result<Option<Coin>> {
    if market.commitment_settlement_bips == 0 || market.intermediary_denom.is_empty() {
        return Ok(None);
    }
    let value = value_in(inputs, &market.intermediary_denom, navs)?;
    let amount = fee::prorate_ceil(
        value,
        u128::from(market.commitment_settlement_bips),
        constants::BIPS_DENOMINATOR,
    )?;
    Ok(Some(Coin::new(amount, market.intermediary_denom.clone())).filter(Coin::is_positive))
}

impl<A: AttributeSource> Tx<'_, A> {
    fn decrease_commitment(&mut self, market_id: MarketId, account: &Address, amount: &Coins) -> Result<()> {
        let current = self.store.get_commitment(market_id, account)?;
        let left = current
            .checked_sub(amount)
            .ok_or_else(|| ExchangeError::InsufficientCommitment {
                account: account.clone(),
                market_id,
                requested: amount.to_string(),
                available: current.to_string(),
            })?;
        self.store.set_commitment(market_id, account, &left)?;
        self.plan.release(account, amount);
        self.emit(Event::CommitmentReleased {
            account: account.clone(),
            market_id,
            amount: amount.clone(),
        });
        Ok(())
    }

    fn increase_commitment(&mut self, market_id: MarketId, account: &Address, amount: &Coins) -> Result<()> {
        let total = self
            .store
            .get_commitment(market_id, account)?
            .checked_add(amount)?;
        self.store.set_commitment(market_id, account, &total)?;
        self.plan.hold(account, amount);
        self.emit(Event::FundsCommitted {
            account: account.clone(),
            market_id,
            amount: amount.clone(),
        });
        Ok(())
    }
}

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    /// Commit funds to a market. The funds are held for the account.
    pub fn add_commitment(
        &mut self,
        account: &Address,
        market_id: MarketId,
        amount: &Coins,
        creation_fee: Option<Coin>,
    ) -> Result<()> {
        self.run("add_commitment", |tx| {
            let market = tx.load_market(market_id)?;
            if !market.accepting_commitments {
                return Err(ExchangeError::MarketNotAcceptingCommitments(market_id));
            }
            tx.require_attributes(account, &market.req_attr_create_commitment)?;
            if amount.is_empty() {
                return Err(ExchangeError::InvalidCommitment {
                    reason: "commitment amount cannot be zero".into(),
                });
            }
            fee::check_flat_fee(
                "commitment creation",
                &market.fee_create_commitment_flat,
                creation_fee.as_ref(),
            )?;
            tx.increase_commitment(market_id, account, amount)?;
            let params = tx.params()?;
            tx.pay_market_fee_coin(account, &market, creation_fee.as_ref(), &params)
        })?;
        tracing::info!(market = %market_id, account = %account.short(), amount = %amount, "Funds committed");
        Ok(())
    }

    /// Release commitments back to their accounts. Requires the market's
    /// cancel permission.
    pub fn release_commitments(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        releases: &[CommitmentRelease],
    ) -> Result<()> {
        self.run("release_commitments", |tx| {
            tx.market_for(market_id, actor, Permission::Cancel)?;
            if releases.is_empty() {
                return Err(ExchangeError::InvalidCommitment {
                    reason: "no releases provided".into(),
                });
            }
            for release in releases {
                let amount = match &release.amount {
                    ReleaseAmount::All => {
                        let all = tx.store.get_commitment(market_id, &release.account)?;
                        if all.is_empty() {
                            return Err(ExchangeError::InsufficientCommitment {
                                account: release.account.clone(),
                                market_id,
                                requested: "all".into(),
                                available: all.to_string(),
                            });
                        }
                        all
                    }
                    ReleaseAmount::Exact(amount) if amount.is_empty() => {
                        return Err(ExchangeError::InvalidCommitment {
                            reason: format!("release amount for {} cannot be zero", release.account),
                        });
                    }
                    ReleaseAmount::Exact(amount) => amount.clone(),
                };
                tx.decrease_commitment(market_id, &release.account, &amount)?;
            }
            Ok(())
        })?;
        tracing::info!(market = %market_id, count = releases.len(), "Commitments released");
        Ok(())
    }

    /// Move committed funds between accounts of one market. Inputs and
    /// outputs must balance per denom. Requires the market's settle
    /// permission.
    pub fn settle_commitments(&mut self, actor: &Address, settlement: &CommitmentSettlement) -> Result<()> {
        let market_id = settlement.market_id;
        let exchange_fee = self.run("settle_commitments", |tx| {
            let market = tx.market_for(market_id, actor, Permission::Settle)?;
            check_legs("inputs", &settlement.inputs)?;
            check_legs("outputs", &settlement.outputs)?;
            check_navs(&settlement.navs)?;
            let inputs = sum_account_amounts(&settlement.inputs)?;
            let outputs = sum_account_amounts(&settlement.outputs)?;
            if inputs != outputs {
                return Err(ExchangeError::CommitmentSettlementUnbalanced {
                    inputs: inputs.to_string(),
                    outputs: outputs.to_string(),
                });
            }
            let exchange_fee = settlement_fee(&market, &inputs, &settlement.navs)?;

            for leg in &settlement.inputs {
                tx.decrease_commitment(market_id, &leg.account, &leg.amount)?;
            }
            for denom in inputs.denoms() {
                let given: Vec<u128> = settlement.inputs.iter().map(|l| l.amount.amount_of(denom)).collect();
                let taken: Vec<u128> = settlement.outputs.iter().map(|l| l.amount.amount_of(denom)).collect();
                for (i, o, amount) in pair_amounts(&given, &taken) {
                    tx.plan.transfer(
                        &settlement.inputs[i].account,
                        &settlement.outputs[o].account,
                        &Coins::from_coin(Coin::new(amount, denom)),
                    );
                }
            }
            for leg in &settlement.outputs {
                tx.increase_commitment(market_id, &leg.account, &leg.amount)?;
            }
            if let Some(coin) = &exchange_fee {
                tx.pay_exchange_fee(&market.address(), &Coins::from_coin(coin.clone()));
            }
            for nav in &settlement.navs {
                tx.navs.push(NavUpdate::from_market(market_id, nav));
            }
            Ok(exchange_fee)
        })?;
        tracing::info!(
            market = %market_id,
            inputs = settlement.inputs.len(),
            outputs = settlement.outputs.len(),
            fee = ?exchange_fee.map(|f| f.to_string()),
            "Commitments settled"
        );
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    /// Committed amount. A fully released commitment no longer exists.
    pub fn commitment(&self, account: &Address, market_id: MarketId) -> Result<Coins> {
        let amount = self.store().get_commitment(market_id, account)?;
        if amount.is_empty() {
            return Err(ExchangeError::UnknownCommitment {
                account: account.clone(),
                market_id,
            });
        }
        Ok(amount)
    }

    pub fn commitments_in_market(&self, market_id: MarketId) -> Result<Vec<Commitment>> {
        self.store().commitments_in_market(market_id)
    }

    pub fn commitments_of_account(&self, account: &Address) -> Result<Vec<Commitment>> {
        self.store().commitments_of_account(account)
    }

    pub fn all_commitments(&self) -> Result<Vec<Commitment>> {
        self.store().all_commitments()
    }
}
