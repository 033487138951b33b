//! Error types for the settlex exchange core.
//!
//! All errors use the `EX_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Fee model / coin errors
//! - 2xx: Market registry and authorization errors
//! - 3xx: Order errors
//! - 4xx: Settlement errors
//! - 5xx: Commitment errors
//! - 6xx: Payment errors
//! - 7xx: Store / genesis / params errors
//! - 8xx: External ledger errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{Address, MarketId, OrderId};

/// Failure reported by the external ledger collaborator.
///
/// These are surfaced verbatim through [`ExchangeError::Ledger`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The account's spendable balance does not cover the request.
    #[error("insufficient funds: {account} needs {needed}, has {available}")]
    InsufficientFunds {
        account: Address,
        needed: String,
        available: String,
    },

    /// The account's held balance does not cover the release.
    #[error("insufficient held funds: {account} needs {needed}, holds {held}")]
    InsufficientHeld {
        account: Address,
        needed: String,
        held: String,
    },

    /// Any other refusal from the ledger.
    #[error("ledger rejected the request: {reason}")]
    Rejected { reason: String },
}

/// Central error enum for all settlex operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    // =================================================================
    // Fee model / coin errors (1xx)
    // =================================================================
    /// A fee ratio string or value is malformed.
    #[error("EX_ERR_100: Invalid fee ratio {ratio:?}: {reason}")]
    InvalidFeeRatio { ratio: String, reason: String },

    /// Two ratios in one schedule share a (price denom, fee denom) pair.
    #[error("EX_ERR_101: Duplicate fee ratio for price denom {price_denom:?} and fee denom {fee_denom:?}")]
    DuplicateFeeRatio {
        price_denom: String,
        fee_denom: String,
    },

    /// A declared fee does not satisfy the market's fee schedule.
    #[error("EX_ERR_102: Insufficient fee: {reason}")]
    InsufficientFee { reason: String },

    /// A denom is malformed.
    #[error("EX_ERR_103: Invalid denom {denom:?}: {reason}")]
    InvalidDenom { denom: String, reason: String },

    /// A coin is malformed or has a forbidden amount.
    #[error("EX_ERR_104: Invalid coin {coin:?}: {reason}")]
    InvalidCoin { coin: String, reason: String },

    // =================================================================
    // Market registry / authorization errors (2xx)
    // =================================================================
    /// No market exists with this id.
    #[error("EX_ERR_200: Unknown market: {0}")]
    UnknownMarket(MarketId),

    /// A market with this id was already created.
    #[error("EX_ERR_201: Market already exists: {0}")]
    MarketAlreadyExists(MarketId),

    /// The market definition violates an invariant.
    #[error("EX_ERR_202: Invalid market {market_id}: {reason}")]
    InvalidMarket { market_id: MarketId, reason: String },

    /// The acting address lacks the required permission.
    #[error("EX_ERR_203: Unauthorized: account {address} {reason}")]
    Unauthorized { address: Address, reason: String },

    /// An access grant is malformed.
    #[error("EX_ERR_204: Invalid access grant: {reason}")]
    InvalidAccessGrant { reason: String },

    /// The account lacks attributes required by the market.
    #[error("EX_ERR_205: Account {address} is missing required attributes: {required}")]
    MissingRequiredAttribute { address: Address, required: String },

    /// The market has order acceptance turned off.
    #[error("EX_ERR_206: Market {0} is not accepting orders")]
    MarketNotAcceptingOrders(MarketId),

    /// The market has commitment acceptance turned off.
    #[error("EX_ERR_207: Market {0} is not accepting commitments")]
    MarketNotAcceptingCommitments(MarketId),

    /// An address is malformed.
    #[error("EX_ERR_208: Invalid address: {reason}")]
    InvalidAddress { reason: String },

    // =================================================================
    // Order errors (3xx)
    // =================================================================
    /// The requested order does not exist.
    #[error("EX_ERR_300: Unknown order: {0}")]
    UnknownOrder(OrderId),

    /// The order failed validation.
    #[error("EX_ERR_301: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An ask was supplied where a bid was expected, or vice versa.
    #[error("EX_ERR_302: Order {order_id} is not {expected} order")]
    OrderSideMismatch {
        order_id: OrderId,
        expected: &'static str,
    },

    // =================================================================
    // Settlement errors (4xx)
    // =================================================================
    /// User settlement is off and the caller lacks the settle permission.
    #[error("EX_ERR_400: Market {0} does not allow user settlement")]
    MarketSettlementDisabled(MarketId),

    /// The order belongs to a different market than the settlement.
    #[error("EX_ERR_401: Order {order_id} is in market {actual}, not market {expected}")]
    MarketMismatch {
        order_id: OrderId,
        expected: MarketId,
        actual: MarketId,
    },

    /// Total ask assets differ from total bid assets.
    #[error("EX_ERR_402: Assets mismatch: asks total {ask_assets:?}, bids total {bid_assets:?}")]
    AssetsMismatch {
        ask_assets: String,
        bid_assets: String,
    },

    /// A non-partial order would be only partially filled.
    #[error("EX_ERR_403: Order {order_id} does not allow partial fills")]
    PartialFillNotAllowed { order_id: OrderId },

    /// A requested fill amount is zero or exceeds the order's assets.
    #[error("EX_ERR_404: Invalid fill for order {order_id}: {reason}")]
    InvalidFill { order_id: OrderId, reason: String },

    /// A partial fill would require rounding the order's price.
    #[error("EX_ERR_405: Order {order_id} cannot be partially filled evenly: {reason}")]
    UnevenPartialFill { order_id: OrderId, reason: String },

    /// Bids do not pay enough to cover the asks.
    #[error("EX_ERR_406: Price mismatch: asks require {ask_price:?}, bids offer {bid_price:?}")]
    PriceMismatch { ask_price: String, bid_price: String },

    /// The settlement request itself is malformed.
    #[error("EX_ERR_407: Invalid settlement: {reason}")]
    InvalidSettlement { reason: String },

    // =================================================================
    // Commitment errors (5xx)
    // =================================================================
    /// A release exceeds the committed amount.
    #[error(
        "EX_ERR_500: Insufficient commitment of {account} in market {market_id}: requested {requested:?}, committed {available:?}"
    )]
    InsufficientCommitment {
        account: Address,
        market_id: MarketId,
        requested: String,
        available: String,
    },

    /// Commitment settlement inputs and outputs do not net to zero.
    #[error("EX_ERR_501: Commitment settlement unbalanced: inputs {inputs:?}, outputs {outputs:?}")]
    CommitmentSettlementUnbalanced { inputs: String, outputs: String },

    /// No net asset price was supplied to value a denom.
    #[error("EX_ERR_502: No net asset price for {denom:?} in {price_denom:?}")]
    MissingNav { denom: String, price_denom: String },

    /// A commitment request is malformed.
    #[error("EX_ERR_503: Invalid commitment: {reason}")]
    InvalidCommitment { reason: String },

    /// Nothing is committed by this account in this market.
    #[error("EX_ERR_504: No commitment of {account} in market {market_id}")]
    UnknownCommitment { account: Address, market_id: MarketId },

    // =================================================================
    // Payment errors (6xx)
    // =================================================================
    /// A live payment already exists for this (source, external id).
    #[error("EX_ERR_600: Payment already exists for source {source_account} with external id {external_id:?}")]
    DuplicatePayment {
        source_account: Address,
        external_id: String,
    },

    /// No payment exists for this (source, external id).
    #[error("EX_ERR_601: No payment for source {source_account} with external id {external_id:?}")]
    UnknownPayment {
        source_account: Address,
        external_id: String,
    },

    /// The payment's terms differ from what the acceptor expected.
    #[error("EX_ERR_602: Payment terms mismatch for source {source_account} external id {external_id:?}: {reason}")]
    PaymentTermsMismatch {
        source_account: Address,
        external_id: String,
        reason: String,
    },

    /// The payment request is malformed.
    #[error("EX_ERR_603: Invalid payment: {reason}")]
    InvalidPayment { reason: String },

    // =================================================================
    // Store / genesis / params errors (7xx)
    // =================================================================
    /// A store key could not be decoded.
    #[error("EX_ERR_700: Invalid store key: {reason}")]
    InvalidKey { reason: String },

    /// A store value could not be encoded or decoded.
    #[error("EX_ERR_701: Serialization error: {0}")]
    Serialization(String),

    /// A genesis state failed validation.
    #[error("EX_ERR_702: Invalid genesis state: {reason}")]
    InvalidGenesis { reason: String },

    /// Exchange params failed validation.
    #[error("EX_ERR_703: Invalid params: {reason}")]
    InvalidParams { reason: String },

    // =================================================================
    // External ledger errors (8xx)
    // =================================================================
    /// Passed through unmodified from the ledger collaborator.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Arithmetic overflow.
    #[error("EX_ERR_900: Arithmetic overflow")]
    Overflow,

    /// Unrecoverable internal error.
    #[error("EX_ERR_901: Internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, ExchangeError>;

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = ExchangeError::UnknownOrder(OrderId(42));
        let msg = format!("{err}");
        assert!(msg.starts_with("EX_ERR_300"), "Got: {msg}");
        assert!(msg.contains("42"));
    }

    #[test]
    fn market_mismatch_names_both_markets() {
        let err = ExchangeError::MarketMismatch {
            order_id: OrderId(7),
            expected: MarketId(1),
            actual: MarketId(2),
        };
        let msg = format!("{err}");
        assert!(msg.contains("EX_ERR_401"));
        assert!(msg.contains("market 2"));
        assert!(msg.contains("market 1"));
    }

    #[test]
    fn ledger_errors_pass_through_verbatim() {
        let inner = LedgerError::Rejected {
            reason: "frozen account".into(),
        };
        let err: ExchangeError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
        assert!(matches!(err, ExchangeError::Ledger(e) if e == inner));
    }

    #[test]
    fn all_errors_have_ex_err_prefix() {
        let errors: Vec<ExchangeError> = vec![
            ExchangeError::Overflow,
            ExchangeError::MarketSettlementDisabled(MarketId(3)),
            ExchangeError::PartialFillNotAllowed { order_id: OrderId(1) },
            ExchangeError::Internal("test".into()),
            ExchangeError::CommitmentSettlementUnbalanced {
                inputs: "1acorn".into(),
                outputs: String::new(),
            },
            ExchangeError::UnknownCommitment {
                account: Address::fee_collector(),
                market_id: MarketId(2),
            },
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(msg.starts_with("EX_ERR_"), "Error missing EX_ERR_ prefix: {msg}");
        }
    }
}
