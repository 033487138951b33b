//! Market registry: creation, configuration, permissions and withdrawals.

use settlex_types::{
    AccessGrant, Address, Coin, Coins, Event, ExchangeError, FeeRatio, Market, MarketDetails,
    MarketId, Params, Permission, Result, market::validate_required_attributes,
};

use crate::collaborators::{AttributeSource, Ledger, NavSink};
use crate::keeper::{Keeper, Tx};
use crate::state::StoreExt;

/// Replacement fee schedules. `None` leaves a schedule unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeeScheduleUpdate {
    pub create_ask_flat: Option<Vec<Coin>>,
    pub create_bid_flat: Option<Vec<Coin>>,
    pub seller_settlement_flat: Option<Vec<Coin>>,
    pub seller_settlement_ratios: Option<Vec<FeeRatio>>,
    pub buyer_settlement_flat: Option<Vec<Coin>>,
    pub buyer_settlement_ratios: Option<Vec<FeeRatio>>,
    pub create_commitment_flat: Option<Vec<Coin>>,
}

/// Access grant changes, applied in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionsUpdate {
    /// Addresses losing every permission.
    pub revoke_all: Vec<Address>,
    /// Specific permissions to remove. Each must currently be held.
    pub to_revoke: Vec<AccessGrant>,
    pub to_grant: Vec<AccessGrant>,
}

/// Required attribute list changes: removals apply before additions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredAttributesUpdate {
    pub create_ask_to_remove: Vec<String>,
    pub create_ask_to_add: Vec<String>,
    pub create_bid_to_remove: Vec<String>,
    pub create_bid_to_add: Vec<String>,
    pub create_commitment_to_remove: Vec<String>,
    pub create_commitment_to_add: Vec<String>,
}

fn update_attr_list(
    field: &str,
    list: &mut Vec<String>,
    remove: &[String],
    add: &[String],
) -> Result<()> {
    for attr in remove {
        let Some(pos) = list.iter().position(|a| a.eq_ignore_ascii_case(attr)) else {
            return Err(ExchangeError::InvalidMarket {
                market_id: MarketId::UNASSIGNED,
                reason: format!("cannot remove {field} required attribute {attr:?}: not present"),
            });
        };
        list.remove(pos);
    }
    for attr in add {
        if list.iter().any(|a| a.eq_ignore_ascii_case(attr)) {
            return Err(ExchangeError::InvalidMarket {
                market_id: MarketId::UNASSIGNED,
                reason: format!("cannot add {field} required attribute {attr:?}: already present"),
            });
        }
        list.push(attr.clone());
    }
    validate_required_attributes(field, list)
}

fn apply_permissions(market: &mut Market, update: &PermissionsUpdate) -> Result<()> {
    for address in &update.revoke_all {
        let before = market.access_grants.len();
        market.access_grants.retain(|g| &g.address != address);
        if market.access_grants.len() == before {
            return Err(ExchangeError::InvalidAccessGrant {
                reason: format!("{address} has no permissions to revoke in market {}", market.market_id),
            });
        }
    }
    for revoke in &update.to_revoke {
        let Some(grant) = market
            .access_grants
            .iter_mut()
            .find(|g| g.address == revoke.address)
        else {
            return Err(ExchangeError::InvalidAccessGrant {
                reason: format!("{} has no permissions in market {}", revoke.address, market.market_id),
            });
        };
        for perm in &revoke.permissions {
            let Some(pos) = grant.permissions.iter().position(|p| p == perm) else {
                return Err(ExchangeError::InvalidAccessGrant {
                    reason: format!("{} does not have {perm} in market {}", revoke.address, market.market_id),
                });
            };
            grant.permissions.remove(pos);
        }
    }
    market.access_grants.retain(|g| !g.permissions.is_empty());
    for add in &update.to_grant {
        match market
            .access_grants
            .iter_mut()
            .find(|g| g.address == add.address)
        {
            Some(grant) => {
                for perm in &add.permissions {
                    if grant.can(*perm) {
                        return Err(ExchangeError::InvalidAccessGrant {
                            reason: format!("{} already has {perm} in market {}", add.address, market.market_id),
                        });
                    }
                    grant.permissions.push(*perm);
                }
            }
            None => market.access_grants.push(add.clone()),
        }
    }
    Ok(())
}

impl<A: AttributeSource> Tx<'_, A> {
    /// Load a market and check `actor` may act on it with `permission`.
    pub(crate) fn market_for(
        &self,
        market_id: MarketId,
        actor: &Address,
        permission: Permission,
    ) -> Result<Market> {
        let market = self.load_market(market_id)?;
        self.require_permission(&market, actor, permission)?;
        Ok(market)
    }

    /// Validate and persist an updated market.
    pub(crate) fn save_market(&mut self, market: &Market) -> Result<()> {
        market.validate()?;
        market
            .details
            .validate_limits(&self.config.detail_limits)
            .map_err(|e| match e {
                ExchangeError::InvalidMarket { reason, .. } => ExchangeError::InvalidMarket {
                    market_id: market.market_id,
                    reason,
                },
                other => other,
            })?;
        self.store.set_market(market)
    }
}

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    /// Create a market. Market id 0 assigns the next free id.
    ///
    /// Only the authority may create a market with commitment settlement
    /// bips or an intermediary denom.
    pub fn create_market(&mut self, actor: &Address, market: Market) -> Result<MarketId> {
        let market_id = self.run("create_market", |tx| {
            let mut market = market;
            if market.commitment_settlement_bips != 0 || !market.intermediary_denom.is_empty() {
                tx.require_authority(actor, "set commitment settlement bips or intermediary denom")?;
            }
            if market.market_id.is_unassigned() {
                let mut next = tx
                    .store
                    .last_market_id()?
                    .checked_next()
                    .ok_or(ExchangeError::Overflow)?;
                while tx.store.has_market(next) {
                    next = next.checked_next().ok_or(ExchangeError::Overflow)?;
                }
                tx.store.set_last_market_id(next);
                market.market_id = next;
            } else if tx.store.has_market(market.market_id) {
                return Err(ExchangeError::MarketAlreadyExists(market.market_id));
            }
            tx.save_market(&market)?;
            tx.emit(Event::MarketCreated {
                market_id: market.market_id,
            });
            Ok(market.market_id)
        })?;
        tracing::info!(market = %market_id, creator = %actor.short(), "Market created");
        Ok(market_id)
    }

    pub fn update_market_details(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        details: MarketDetails,
    ) -> Result<()> {
        self.run("update_market_details", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Update)?;
            market.details = details;
            tx.save_market(&market)?;
            tx.emit(Event::MarketDetailsUpdated {
                market_id,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, "Market details updated");
        Ok(())
    }

    pub fn set_accepting_orders(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        enabled: bool,
    ) -> Result<()> {
        self.run("set_accepting_orders", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Update)?;
            market.accepting_orders = enabled;
            tx.save_market(&market)?;
            tx.emit(Event::MarketOrdersEnabled {
                market_id,
                enabled,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, enabled, "Market order acceptance changed");
        Ok(())
    }

    pub fn set_allow_user_settlement(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        enabled: bool,
    ) -> Result<()> {
        self.run("set_allow_user_settlement", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Update)?;
            market.allow_user_settlement = enabled;
            tx.save_market(&market)?;
            tx.emit(Event::MarketUserSettleEnabled {
                market_id,
                enabled,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, enabled, "Market user settlement changed");
        Ok(())
    }

    pub fn set_accepting_commitments(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        enabled: bool,
    ) -> Result<()> {
        self.run("set_accepting_commitments", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Update)?;
            market.accepting_commitments = enabled;
            tx.save_market(&market)?;
            tx.emit(Event::MarketCommitmentsEnabled {
                market_id,
                enabled,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, enabled, "Market commitment acceptance changed");
        Ok(())
    }

    pub fn update_market_fees(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        update: FeeScheduleUpdate,
    ) -> Result<()> {
        self.run("update_market_fees", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Update)?;
            let FeeScheduleUpdate {
                create_ask_flat,
                create_bid_flat,
                seller_settlement_flat,
                seller_settlement_ratios,
                buyer_settlement_flat,
                buyer_settlement_ratios,
                create_commitment_flat,
            } = update;
            if let Some(v) = create_ask_flat {
                market.fee_create_ask_flat = v;
            }
            if let Some(v) = create_bid_flat {
                market.fee_create_bid_flat = v;
            }
            if let Some(v) = seller_settlement_flat {
                market.fee_seller_settlement_flat = v;
            }
            if let Some(v) = seller_settlement_ratios {
                market.fee_seller_settlement_ratios = v;
            }
            if let Some(v) = buyer_settlement_flat {
                market.fee_buyer_settlement_flat = v;
            }
            if let Some(v) = buyer_settlement_ratios {
                market.fee_buyer_settlement_ratios = v;
            }
            if let Some(v) = create_commitment_flat {
                market.fee_create_commitment_flat = v;
            }
            tx.save_market(&market)?;
            tx.emit(Event::MarketFeesUpdated {
                market_id,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, "Market fees updated");
        Ok(())
    }

    /// Authority only.
    pub fn set_commitment_settlement(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        bips: u16,
        intermediary_denom: String,
    ) -> Result<()> {
        self.run("set_commitment_settlement", |tx| {
            tx.require_authority(actor, "set commitment settlement bips or intermediary denom")?;
            let mut market = tx.load_market(market_id)?;
            market.commitment_settlement_bips = bips;
            market.intermediary_denom.clone_from(&intermediary_denom);
            tx.save_market(&market)?;
            tx.emit(Event::MarketCommitmentSettlementUpdated {
                market_id,
                bips,
                intermediary_denom,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, bips, "Market commitment settlement updated");
        Ok(())
    }

    pub fn manage_permissions(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        update: &PermissionsUpdate,
    ) -> Result<()> {
        self.run("manage_permissions", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Permissions)?;
            apply_permissions(&mut market, update)?;
            tx.save_market(&market)?;
            tx.emit(Event::MarketPermissionsUpdated {
                market_id,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, "Market permissions updated");
        Ok(())
    }

    pub fn manage_required_attributes(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        update: &RequiredAttributesUpdate,
    ) -> Result<()> {
        self.run("manage_required_attributes", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Attributes)?;
            let rewrap = |e: ExchangeError| match e {
                ExchangeError::InvalidMarket { reason, .. } => {
                    ExchangeError::InvalidMarket { market_id, reason }
                }
                other => other,
            };
            update_attr_list(
                "create-ask",
                &mut market.req_attr_create_ask,
                &update.create_ask_to_remove,
                &update.create_ask_to_add,
            )
            .map_err(rewrap)?;
            update_attr_list(
                "create-bid",
                &mut market.req_attr_create_bid,
                &update.create_bid_to_remove,
                &update.create_bid_to_add,
            )
            .map_err(rewrap)?;
            update_attr_list(
                "create-commitment",
                &mut market.req_attr_create_commitment,
                &update.create_commitment_to_remove,
                &update.create_commitment_to_add,
            )
            .map_err(rewrap)?;
            tx.save_market(&market)?;
            tx.emit(Event::MarketReqAttrUpdated {
                market_id,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, "Market required attributes updated");
        Ok(())
    }

    /// Move funds out of the market account.
    pub fn withdraw_market_funds(
        &mut self,
        actor: &Address,
        market_id: MarketId,
        destination: &Address,
        amount: Coins,
    ) -> Result<()> {
        self.run("withdraw_market_funds", |tx| {
            let market = tx.market_for(market_id, actor, Permission::Withdraw)?;
            if amount.is_empty() {
                return Err(ExchangeError::InvalidMarket {
                    market_id,
                    reason: "withdrawal amount cannot be zero".into(),
                });
            }
            tx.plan.transfer(&market.address(), destination, &amount);
            tx.emit(Event::MarketWithdraw {
                market_id,
                amount: amount.clone(),
                destination: destination.clone(),
                withdrawn_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, to = %destination.short(), "Market funds withdrawn");
        Ok(())
    }

    /// Turn off order acceptance, user settlement and commitment acceptance.
    /// Markets are never deleted.
    pub fn disable_market(&mut self, actor: &Address, market_id: MarketId) -> Result<()> {
        self.run("disable_market", |tx| {
            let mut market = tx.market_for(market_id, actor, Permission::Update)?;
            market.accepting_orders = false;
            market.allow_user_settlement = false;
            market.accepting_commitments = false;
            tx.save_market(&market)?;
            tx.emit(Event::MarketDisabled {
                market_id,
                updated_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(market = %market_id, "Market disabled");
        Ok(())
    }

    /// Replace the exchange params. Authority only.
    pub fn update_params(&mut self, actor: &Address, params: Params) -> Result<()> {
        self.run("update_params", |tx| {
            tx.require_authority(actor, "update params")?;
            params.validate()?;
            tx.store.set_params(&params)?;
            tx.emit(Event::ParamsUpdated);
            Ok(())
        })?;
        tracing::info!("Params updated");
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    pub fn market(&self, market_id: MarketId) -> Result<Market> {
        self.store()
            .get_market(market_id)?
            .ok_or(ExchangeError::UnknownMarket(market_id))
    }

    pub fn markets(&self) -> Result<Vec<Market>> {
        self.store().all_markets()
    }

    pub fn params(&self) -> Result<Params> {
        self.store().params()
    }
}
