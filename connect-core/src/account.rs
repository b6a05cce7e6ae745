use serde::{Deserialize, Serialize};

/// The account the wallet currently exposes.
///
/// The default value means "no wallet connected". Records are only ever
/// replaced as a whole so readers never see a balance from one account next
/// to the chain id of another.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub account: String,
    /// Balance in ether.
    pub balance: f64,
    pub chain_id: u64,
}

impl AccountRecord {
    pub fn new(account: impl Into<String>, balance: f64, chain_id: u64) -> Self {
        Self {
            account: account.into(),
            balance,
            chain_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
