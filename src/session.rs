//! Account identity supplied by the auth collaborator.
//!
//! The core never manages credentials; it only needs to know which
//! account a call is made on behalf of.

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the account of the authenticated caller.
pub trait SessionProvider: Send + Sync {
    /// Fails when no user is signed in.
    fn account_id(&self) -> Result<AccountId>;
}

/// A fixed, already-authenticated session.
pub struct StaticSession {
    account: AccountId,
}

impl StaticSession {
    pub fn new(account: AccountId) -> Self {
        Self { account }
    }
}

impl SessionProvider for StaticSession {
    fn account_id(&self) -> Result<AccountId> {
        Ok(self.account.clone())
    }
}
