//! Account snapshots.
//!
//! A read-only picture of an account as the ledger last reported it. The
//! Horizon backend builds these from `/accounts/{id}`; the simulated
//! ledger hands out copies of its own state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::amount::to_amount_string;
use crate::asset::Asset;
use crate::transaction::AccountFlags;

/// One balance line. Native balances have no limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub asset: Asset,
    /// Stroops.
    pub amount: i64,
    pub limit: Option<i64>,
    /// Whether the issuer has authorized this trust line.
    pub authorized: bool,
}

/// An additional signer on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSigner {
    pub key: String,
    pub weight: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
    pub master_weight: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: 0,
            medium: 0,
            high: 0,
            master_weight: 1,
        }
    }
}

/// Account state at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub address: String,
    pub sequence: i64,
    pub balances: Vec<Balance>,
    pub signers: Vec<AccountSigner>,
    pub thresholds: Thresholds,
    pub flags: AccountFlags,
    pub home_domain: String,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl AccountSnapshot {
    /// An empty account with a native balance of zero.
    pub fn new(address: &str, sequence: i64) -> Self {
        Self {
            address: address.to_string(),
            sequence,
            balances: vec![Balance {
                asset: Asset::native(),
                amount: 0,
                limit: None,
                authorized: true,
            }],
            signers: Vec::new(),
            thresholds: Thresholds::default(),
            flags: AccountFlags::NONE,
            home_domain: String::new(),
            data: BTreeMap::new(),
        }
    }

    /// Native balance in stroops.
    pub fn native_balance(&self) -> i64 {
        self.balance(&Asset::native()).unwrap_or(0)
    }

    /// Balance for `asset` in stroops, or `None` without a trust line.
    pub fn balance(&self, asset: &Asset) -> Option<i64> {
        self.balance_line(asset).map(|b| b.amount)
    }

    /// Balance for `asset` as a decimal string.
    pub fn balance_string(&self, asset: &Asset) -> Option<String> {
        self.balance(asset).map(to_amount_string)
    }

    pub fn balance_line(&self, asset: &Asset) -> Option<&Balance> {
        self.balances.iter().find(|b| b.asset.same_as(asset))
    }

    pub fn master_weight(&self) -> u32 {
        self.thresholds.master_weight
    }

    /// Weight of `key` on this account, counting the master key.
    pub fn signer_weight(&self, key: &str) -> Option<u32> {
        if key == self.address {
            return Some(self.thresholds.master_weight);
        }
        self.signers.iter().find(|s| s.key == key).map(|s| s.weight)
    }

    pub fn data_value(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetType;
    use crate::crypto::KeyPair;

    #[test]
    fn balances_lookup_by_ledger_identity() {
        let issuer = KeyPair::random();
        let mut account = AccountSnapshot::new(&KeyPair::random().address(), 5);
        account.balances[0].amount = 25_000_000;
        account.balances.push(Balance {
            asset: Asset::new("USD", &issuer.address(), AssetType::Credit4),
            amount: 10_000_000,
            limit: Some(1_000_000_000),
            authorized: true,
        });

        assert_eq!(account.native_balance(), 25_000_000);
        let by_seed = Asset::new("USD", &issuer.seed(), AssetType::Credit4);
        assert_eq!(account.balance_string(&by_seed).as_deref(), Some("1.0000000"));
        assert_eq!(
            account.balance(&Asset::new("EUR", &issuer.address(), AssetType::Credit4)),
            None
        );
    }

    #[test]
    fn signer_weight_counts_master() {
        let kp = KeyPair::random();
        let other = KeyPair::random();
        let mut account = AccountSnapshot::new(&kp.address(), 1);
        account.signers.push(AccountSigner {
            key: other.address(),
            weight: 3,
        });

        assert_eq!(account.signer_weight(&kp.address()), Some(1));
        assert_eq!(account.signer_weight(&other.address()), Some(3));
        assert_eq!(account.signer_weight("GNOBODY"), None);
    }

    #[test]
    fn data_value_reads_entries() {
        let mut account = AccountSnapshot::new("GABC", 0);
        account.data.insert("k".into(), b"v".to_vec());
        assert_eq!(account.data_value("k"), Some(&b"v"[..]));
        assert_eq!(account.data_value("missing"), None);
    }
}
