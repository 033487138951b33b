//! Payment ledger: two-party, fee-bearing exchanges keyed by
//! (source, external id).
//!
//! The source amount is held from creation until the payment is accepted,
//! rejected or cancelled. Payment fees go entirely to the exchange.

use settlex_types::{Address, Event, ExchangeError, Payment, Permission, Result};

use crate::collaborators::{AttributeSource, Ledger, NavSink};
use crate::keeper::{Keeper, Tx};
use crate::state::StoreExt;

impl<A: AttributeSource> Tx<'_, A> {
    fn load_payment(&self, source: &Address, external_id: &str) -> Result<Payment> {
        self.store
            .get_payment(source, external_id)?
            .ok_or_else(|| ExchangeError::UnknownPayment {
                source_account: source.clone(),
                external_id: external_id.to_owned(),
            })
    }

    /// The source itself, the authority, or a withdraw holder of the market
    /// whose account is the source.
    fn may_cancel_payment(&self, actor: &Address, payment: &Payment) -> Result<()> {
        if actor == &payment.source || self.is_authority(actor) {
            return Ok(());
        }
        if let Some(market) = self.store.market_with_address(&payment.source)? {
            if market.has_permission(actor, Permission::Withdraw) {
                return Ok(());
            }
        }
        Err(ExchangeError::Unauthorized {
            address: actor.clone(),
            reason: format!("cannot cancel payment {payment}"),
        })
    }
}

impl<L: Ledger, A: AttributeSource, N: NavSink> Keeper<L, A, N> {
    /// Create a payment from `payment.source`. Holds the source amount and
    /// charges the create-payment fee.
    pub fn create_payment(&mut self, payment: Payment) -> Result<()> {
        let summary = payment.to_string();
        self.run("create_payment", |tx| {
            payment.validate(tx.config.max_external_id_len)?;
            if tx
                .store
                .get_payment(&payment.source, &payment.external_id)?
                .is_some()
            {
                return Err(ExchangeError::DuplicatePayment {
                    source_account: payment.source.clone(),
                    external_id: payment.external_id.clone(),
                });
            }
            let params = tx.params()?;
            tx.store.set_payment(&payment)?;
            tx.plan.hold(&payment.source, &payment.source_amount);
            tx.pay_exchange_fee(&payment.source, &params.fee_create_payment_flat);
            tx.emit(Event::PaymentCreated {
                source: payment.source.clone(),
                external_id: payment.external_id.clone(),
                target: payment.target.clone(),
            });
            Ok(())
        })?;
        tracing::info!(payment = %summary, "Payment created");
        Ok(())
    }

    /// Accept a payment as its target. `expected` must match the stored terms.
    pub fn accept_payment(&mut self, target: &Address, expected: &Payment) -> Result<()> {
        self.run("accept_payment", |tx| {
            let payment = tx.load_payment(&expected.source, &expected.external_id)?;
            if &payment.target != target {
                return Err(ExchangeError::Unauthorized {
                    address: target.clone(),
                    reason: format!("is not the target of payment {payment}"),
                });
            }
            if let Some(reason) = payment.terms_difference(expected) {
                return Err(ExchangeError::PaymentTermsMismatch {
                    source_account: payment.source.clone(),
                    external_id: payment.external_id.clone(),
                    reason,
                });
            }
            let params = tx.params()?;
            tx.plan.release(&payment.source, &payment.source_amount);
            tx.plan
                .transfer(&payment.source, &payment.target, &payment.source_amount);
            tx.plan
                .transfer(&payment.target, &payment.source, &payment.target_amount);
            tx.pay_exchange_fee(&payment.target, &params.fee_accept_payment_flat);
            tx.store.delete_payment(&payment)?;
            tx.emit(Event::PaymentAccepted {
                source: payment.source.clone(),
                external_id: payment.external_id.clone(),
                target: payment.target.clone(),
            });
            Ok(())
        })?;
        tracing::info!(
            source = %expected.source.short(),
            external_id = %expected.external_id,
            target = %target.short(),
            "Payment accepted"
        );
        Ok(())
    }

    /// Reject a payment as its target, returning the held funds to the source.
    pub fn reject_payment(&mut self, target: &Address, source: &Address, external_id: &str) -> Result<()> {
        self.run("reject_payment", |tx| {
            let payment = tx.load_payment(source, external_id)?;
            if &payment.target != target {
                return Err(ExchangeError::Unauthorized {
                    address: target.clone(),
                    reason: format!("is not the target of payment {payment}"),
                });
            }
            tx.plan.release(&payment.source, &payment.source_amount);
            tx.store.delete_payment(&payment)?;
            tx.emit(Event::PaymentRejected {
                source: payment.source.clone(),
                external_id: payment.external_id.clone(),
                target: payment.target,
            });
            Ok(())
        })?;
        tracing::info!(source = %source.short(), external_id, "Payment rejected");
        Ok(())
    }

    /// Cancel a payment, returning the held funds to the source.
    pub fn cancel_payment(&mut self, actor: &Address, source: &Address, external_id: &str) -> Result<()> {
        self.run("cancel_payment", |tx| {
            let payment = tx.load_payment(source, external_id)?;
            tx.may_cancel_payment(actor, &payment)?;
            tx.plan.release(&payment.source, &payment.source_amount);
            tx.store.delete_payment(&payment)?;
            tx.emit(Event::PaymentCancelled {
                source: payment.source.clone(),
                external_id: payment.external_id,
                cancelled_by: actor.clone(),
            });
            Ok(())
        })?;
        tracing::info!(source = %source.short(), external_id, by = %actor.short(), "Payment cancelled");
        Ok(())
    }

    /// Point an unaccepted payment at a new target. Source only.
    pub fn update_payment_target(
        &mut self,
        source: &Address,
        external_id: &str,
        new_target: &Address,
    ) -> Result<()> {
        self.run("update_payment_target", |tx| {
            let payment = tx.load_payment(source, external_id)?;
            let updated = Payment {
                target: new_target.clone(),
                ..payment.clone()
            };
            updated.validate(tx.config.max_external_id_len)?;
            tx.store.delete_payment(&payment)?;
            tx.store.set_payment(&updated)?;
            tx.emit(Event::PaymentTargetUpdated {
                source: source.clone(),
                external_id: external_id.to_owned(),
                old_target: payment.target,
                new_target: new_target.clone(),
            });
            Ok(())
        })?;
        tracing::info!(
            source = %source.short(),
            external_id,
            target = %new_target.short(),
            "Payment target updated"
        );
        Ok(())
    }

    // -- queries ------------------------------------------------------------

    pub fn payment(&self, source: &Address, external_id: &str) -> Result<Payment> {
        self.store()
            .get_payment(source, external_id)?
            .ok_or_else(|| ExchangeError::UnknownPayment {
                source_account: source.clone(),
                external_id: external_id.to_owned(),
            })
    }

    pub fn payments_from_source(&self, source: &Address) -> Result<Vec<Payment>> {
        self.store().payments_from_source(source)
    }

    pub fn payments_with_target(&self, target: &Address) -> Result<Vec<Payment>> {
        self.store().payments_with_target(target)
    }

    pub fn all_payments(&self) -> Result<Vec<Payment>> {
        self.store().all_payments()
    }
}

#[cfg(test)]
mod tests {
    use settlex_types::{AccessGrant, Coins, KeeperConfig, Market, MarketDetails, MarketId, Params};

    use super::*;
    use crate::testing::{MemoryLedger, RecordingNavSink, StaticAttributes};

    type TestKeeper = Keeper<MemoryLedger, StaticAttributes, RecordingNavSink>;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    fn coins(s: &str) -> Coins {
        s.parse().unwrap()
    }

    const AUTHORITY: u8 = 0xAA;
    const SRC: u8 = 0x51;
    const TGT: u8 = 0x52;
    const OTHER: u8 = 0x53;

    fn keeper() -> TestKeeper {
        let mut k = Keeper::new(
            KeeperConfig::new(addr(AUTHORITY)),
            MemoryLedger::new(),
            StaticAttributes::new(),
            RecordingNavSink::default(),
        );
        k.ledger_mut().fund(&addr(SRC), &coins("100hash,10nhash"));
        k.ledger_mut().fund(&addr(TGT), &coins("100stake,10nhash"));
        k
    }

    fn payment(ext: &str) -> Payment {
        Payment {
            source: addr(SRC),
            source_amount: coins("5hash"),
            target: addr(TGT),
            target_amount: coins("3stake"),
            external_id: ext.into(),
        }
    }

    #[test]
    fn create_holds_and_rejects_duplicates() {
        let mut k = keeper();
        k.create_payment(payment("p1")).unwrap();
        assert_eq!(k.ledger().held(&addr(SRC)), coins("5hash"));
        let err = k.create_payment(payment("p1")).unwrap_err();
        assert!(matches!(err, ExchangeError::DuplicatePayment { .. }));
        assert_eq!(k.payments_with_target(&addr(TGT)).unwrap().len(), 1);
        assert_eq!(k.payments_from_source(&addr(SRC)).unwrap().len(), 1);
    }

    #[test]
    fn accept_swaps_and_charges_fees() {
        let mut k = keeper();
        k.update_params(
            &addr(AUTHORITY),
            Params {
                fee_create_payment_flat: coins("2nhash"),
                fee_accept_payment_flat: coins("4nhash"),
                ..Params::default()
            },
        )
        .unwrap();
        k.create_payment(payment("p1")).unwrap();

        let mut wrong = payment("p1");
        wrong.target_amount = coins("2stake");
        assert!(matches!(
            k.accept_payment(&addr(TGT), &wrong).unwrap_err(),
            ExchangeError::PaymentTermsMismatch { .. }
        ));
        assert!(matches!(
            k.accept_payment(&addr(OTHER), &payment("p1")).unwrap_err(),
            ExchangeError::Unauthorized { .. }
        ));

        k.accept_payment(&addr(TGT), &payment("p1")).unwrap();
        assert_eq!(k.ledger().spendable(&addr(SRC)), coins("95hash,8nhash,3stake"));
        assert_eq!(k.ledger().spendable(&addr(TGT)), coins("5hash,6nhash,97stake"));
        assert_eq!(k.ledger().spendable(&Address::fee_collector()), coins("6nhash"));
        assert!(k.all_payments().unwrap().is_empty());
        assert!(k.payments_with_target(&addr(TGT)).unwrap().is_empty());
    }

    #[test]
    fn reject_and_cancel_release_hold() {
        let mut k = keeper();
        k.create_payment(payment("p1")).unwrap();
        k.create_payment(payment("p2")).unwrap();
        assert!(k.reject_payment(&addr(OTHER), &addr(SRC), "p1").is_err());
        k.reject_payment(&addr(TGT), &addr(SRC), "p1").unwrap();
        assert!(matches!(
            k.cancel_payment(&addr(TGT), &addr(SRC), "p2").unwrap_err(),
            ExchangeError::Unauthorized { .. }
        ));
        k.cancel_payment(&addr(SRC), &addr(SRC), "p2").unwrap();
        assert!(k.ledger().held(&addr(SRC)).is_empty());
        assert!(matches!(
            k.payment(&addr(SRC), "p2").unwrap_err(),
            ExchangeError::UnknownPayment { .. }
        ));
    }

    #[test]
    fn market_withdrawer_cancels_market_payment() {
        let mut k = keeper();
        let admin = addr(0x01);
        let id = k
            .create_market(
                &admin,
                Market {
                    details: MarketDetails::named("Payer"),
                    access_grants: vec![AccessGrant::new(admin.clone(), [Permission::Withdraw])],
                    ..Market::default()
                },
            )
            .unwrap();
        assert_eq!(id, MarketId(1));
        let market_addr = Address::market(id);
        k.ledger_mut().fund(&market_addr, &coins("50hash"));
        k.create_payment(Payment {
            source: market_addr.clone(),
            ..payment("m1")
        })
        .unwrap();
        assert!(k.cancel_payment(&addr(OTHER), &market_addr, "m1").is_err());
        k.cancel_payment(&admin, &market_addr, "m1").unwrap();
        assert_eq!(k.ledger().spendable(&market_addr), coins("50hash"));
    }

    #[test]
    fn target_update_moves_index() {
        let mut k = keeper();
        k.create_payment(payment("p1")).unwrap();
        k.update_payment_target(&addr(SRC), "p1", &addr(OTHER)).unwrap();
        assert!(k.payments_with_target(&addr(TGT)).unwrap().is_empty());
        assert_eq!(k.payments_with_target(&addr(OTHER)).unwrap().len(), 1);
        assert!(matches!(
            k.update_payment_target(&addr(SRC), "p1", &addr(SRC)).unwrap_err(),
            ExchangeError::InvalidPayment { .. }
        ));
        assert!(matches!(
            k.update_payment_target(&addr(OTHER), "p1", &addr(TGT)).unwrap_err(),
            ExchangeError::UnknownPayment { .. }
        ));
    }
}
