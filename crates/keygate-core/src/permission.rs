//! Permission ranks
//!
//! Ranks are totally ordered `read < write < sign < admin`, and holding a
//! rank implies holding every lower one. Tokens carry a single rank; the
//! verifier expands it into the full sequence before it reaches a request
//! context.

use crate::{KeygateError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A permission rank
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read-only access
    Read,
    /// Read and write access
    Write,
    /// Signing access
    Sign,
    /// Full administrative access
    Admin,
}

impl Permission {
    /// All ranks, highest first
    pub const DESCENDING: [Permission; 4] = [
        Permission::Admin,
        Permission::Sign,
        Permission::Write,
        Permission::Read,
    ];

    /// Every permission implied by this rank, in descending order starting
    /// with the rank itself.
    pub fn expand(self) -> Vec<Permission> {
        Self::DESCENDING
            .iter()
            .copied()
            .filter(|p| *p <= self)
            .collect()
    }

    /// Whether holding `self` grants `other`
    pub fn implies(self, other: Permission) -> bool {
        self >= other
    }

    /// Lowercase text form
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Sign => "sign",
            Permission::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = KeygateError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "sign" => Ok(Permission::Sign),
            "admin" => Ok(Permission::Admin),
            other => Err(KeygateError::invalid_argument(format!(
                "unknown permission: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_expand_admin() {
        assert_eq!(
            Permission::Admin.expand(),
            vec![
                Permission::Admin,
                Permission::Sign,
                Permission::Write,
                Permission::Read
            ]
        );
    }

    #[test]
    fn test_expand_read() {
        assert_eq!(Permission::Read.expand(), vec![Permission::Read]);
    }

    #[test]
    fn test_text_form() {
        assert_eq!("sign".parse::<Permission>().unwrap(), Permission::Sign);
        assert!("root".parse::<Permission>().is_err());
        assert_eq!(
            serde_json::to_string(&Permission::Write).unwrap(),
            "\"write\""
        );
    }

    proptest! {
        #[test]
        fn expand_is_strictly_descending_from_rank(
            rank in prop::sample::select(Permission::DESCENDING.to_vec())
        ) {
            let expanded = rank.expand();
            prop_assert!(!expanded.is_empty());
            prop_assert_eq!(expanded[0], rank);
            for pair in expanded.windows(2) {
                prop_assert!(pair[0] > pair[1]);
            }
            prop_assert_eq!(*expanded.last().unwrap(), Permission::Read);
            for p in Permission::DESCENDING {
                prop_assert_eq!(expanded.contains(&p), rank.implies(p));
            }
        }
    }
}
