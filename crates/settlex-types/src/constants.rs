//! System-wide constants for the settlex exchange core.

/// Denominator for basis-point values (splits and commitment settlement rates).
pub const BIPS_DENOMINATOR: u128 = 10_000;

/// Largest basis-point value accepted anywhere (100%).
pub const MAX_BIPS: u16 = 10_000;

/// Default exchange share of every market fee, in basis points (5%).
pub const DEFAULT_SPLIT_BIPS: u16 = 500;

/// Maximum length of an order or payment external id.
pub const DEFAULT_MAX_EXTERNAL_ID_LEN: usize = 100;

/// Maximum length of a market name.
pub const MAX_NAME_LEN: usize = 30;

/// Maximum length of a market description.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Maximum length of a market website url.
pub const MAX_WEBSITE_URL_LEN: usize = 200;

/// Maximum length of a market icon uri.
pub const MAX_ICON_URI_LEN: usize = 2000;

/// Maximum number of orders referenced by one settlement request.
pub const DEFAULT_MAX_BATCH_ORDERS: usize = 200;

/// Maximum length of an account address in bytes (fits the one-byte length prefix in store keys).
pub const MAX_ADDRESS_LEN: usize = 255;

/// Minimum and maximum denom lengths.
pub const MIN_DENOM_LEN: usize = 2;
pub const MAX_DENOM_LEN: usize = 128;

/// Domain separator for derived market custody addresses.
pub const MARKET_ADDRESS_DOMAIN: &[u8] = b"settlex:market:";

/// Domain separator for the fee collector address.
pub const FEE_COLLECTOR_DOMAIN: &[u8] = b"settlex:fee_collector";

/// Length of derived module/market addresses.
pub const DERIVED_ADDRESS_LEN: usize = 20;

/// Prefix of the `source` field on net-asset-price notifications.
pub const NAV_SOURCE_PREFIX: &str = "market";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "settlex";
