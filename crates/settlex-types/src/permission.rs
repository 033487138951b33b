//! Per-market authorization: [`Permission`] and [`AccessGrant`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Address, ExchangeError, Result};

/// An administrative capability within one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Settle orders and commitments.
    Settle,
    /// Cancel orders and release commitments on behalf of their owners.
    Cancel,
    /// Withdraw funds from the market account.
    Withdraw,
    /// Update market details, toggles and fees.
    Update,
    /// Manage access grants.
    Permissions,
    /// Manage required attribute lists.
    Attributes,
}

impl Permission {
    /// Every permission, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Settle,
        Self::Cancel,
        Self::Withdraw,
        Self::Update,
        Self::Permissions,
        Self::Attributes,
    ];
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settle => write!(f, "settle"),
            Self::Cancel => write!(f, "cancel"),
            Self::Withdraw => write!(f, "withdraw"),
            Self::Update => write!(f, "update"),
            Self::Permissions => write!(f, "permissions"),
            Self::Attributes => write!(f, "attributes"),
        }
    }
}

/// The permissions one address holds in one market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessGrant {
    pub address: Address,
    pub permissions: Vec<Permission>,
}

impl AccessGrant {
    #[must_use]
    pub fn new(address: Address, permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            address,
            permissions: permissions.into_iter().collect(),
        }
    }

    /// A grant holding every permission.
    #[must_use]
    pub fn everything(address: Address) -> Self {
        Self::new(address, Permission::ALL)
    }

    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// At least one permission, none repeated.
    pub fn validate(&self) -> Result<()> {
        if self.permissions.is_empty() {
            return Err(ExchangeError::InvalidAccessGrant {
                reason: format!("no permissions provided for {}", self.address),
            });
        }
        let mut seen = BTreeSet::new();
        for perm in &self.permissions {
            if !seen.insert(*perm) {
                return Err(ExchangeError::InvalidAccessGrant {
                    reason: format!("{} appears multiple times for {}", perm, self.address),
                });
            }
        }
        Ok(())
    }
}

/// Validate a list of grants: each grant valid, each address at most once.
pub fn validate_access_grants(grants: &[AccessGrant]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for grant in grants {
        grant.validate()?;
        if !seen.insert(&grant.address) {
            return Err(ExchangeError::InvalidAccessGrant {
                reason: format!("{} appears in multiple access grant entries", grant.address),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::new(vec![b; 20]).unwrap()
    }

    #[test]
    fn everything_grants_all() {
        let g = AccessGrant::everything(addr(1));
        for p in Permission::ALL {
            assert!(g.can(p));
        }
        g.validate().unwrap();
    }

    #[test]
    fn duplicate_permission_rejected() {
        let g = AccessGrant::new(addr(1), [Permission::Settle, Permission::Settle]);
        assert!(matches!(
            g.validate().unwrap_err(),
            ExchangeError::InvalidAccessGrant { .. }
        ));
    }

    #[test]
    fn empty_grant_rejected() {
        let g = AccessGrant::new(addr(1), []);
        assert!(g.validate().is_err());
    }

    #[test]
    fn one_grant_per_address() {
        let grants = vec![
            AccessGrant::new(addr(1), [Permission::Settle]),
            AccessGrant::new(addr(1), [Permission::Cancel]),
        ];
        assert!(validate_access_grants(&grants).is_err());
        validate_access_grants(&grants[..1]).unwrap();
    }

    #[test]
    fn permission_serde_snake_case() {
        let json = serde_json::to_string(&Permission::Permissions).unwrap();
        assert_eq!(json, "\"permissions\"");
    }
}
