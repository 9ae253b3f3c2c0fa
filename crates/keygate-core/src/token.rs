//! Issued-token registry records

use crate::Permission;
use serde::{Deserialize, Serialize};

/// A bearer token issued for an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRecord {
    /// Encoded token, the primary key
    pub token: String,
    /// Owning account
    pub name: String,
    /// Rank granted by the token
    pub permission: Permission,
    /// Caller metadata embedded in the token
    pub extra: String,
    /// Issue time (Unix seconds)
    pub create_time: u64,
    /// Revocation marker
    pub deleted: bool,
}
