//! Per-account save quota.
//!
//! The counter is authoritative server-side and shared across devices, so
//! the check-and-increment must happen in a single remote round trip; a
//! client-side read-then-write would let two concurrent imports both
//! observe `count < limit` and both proceed.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::model::Plan;
use crate::session::AccountId;

/// Outcome of one atomic check-and-increment. `allowed=false` means the
/// counter was left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub count: u32,
    pub plan: Plan,
}

/// Display-only view of the quota state. Never use this to gate a write:
/// it is not atomic with respect to concurrent increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSnapshot {
    pub count: u32,
    pub plan: Plan,
    /// `None` for unlimited (pro) plans.
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl QuotaSnapshot {
    pub fn is_at_limit(&self) -> bool {
        matches!(self.remaining, Some(0))
    }

    /// Usage as a percentage of the limit, 0 for unlimited plans.
    pub fn usage_percent(&self) -> u8 {
        match self.limit {
            Some(limit) if limit > 0 => {
                (((self.count as f64 / limit as f64) * 100.0).min(100.0)) as u8
            }
            _ => 0,
        }
    }
}

/// The authoritative save counter.
///
/// An `Err` from either method means the ledger state could not be
/// determined; callers gating a save must treat that as **not allowed**
/// (fail closed), never as an implicit grant.
pub trait QuotaLedger: Send + Sync {
    /// Atomically check the limit and increment the counter for one save.
    fn check_and_increment(&self, account: &AccountId) -> Result<QuotaDecision>;

    /// Read the current state for display.
    fn snapshot(&self, account: &AccountId) -> Result<QuotaSnapshot>;
}

// ============================================================================
// Remote RPC implementation
// ============================================================================

#[derive(Debug, Serialize)]
struct IncrementParams<'a> {
    p_user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct IncrementResponse {
    allowed: bool,
    count: u32,
    #[serde(default)]
    plan: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionRow {
    #[serde(default)]
    saves_this_month: u32,
    #[serde(default)]
    plan: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewSubscriptionRow<'a> {
    user_id: &'a str,
}

/// Ledger backed by the hosted API: the check-and-increment is a single
/// `increment_save_count` RPC (a conditional update server-side), the
/// snapshot reads the subscriptions row.
pub struct RpcQuotaLedger {
    api: ApiConfig,
    free_tier_limit: u32,
}

impl RpcQuotaLedger {
    pub fn new(api: ApiConfig, free_tier_limit: u32) -> Self {
        Self {
            api,
            free_tier_limit,
        }
    }

    fn agent(&self) -> ureq::Agent {
        ureq::AgentBuilder::new().timeout(self.api.timeout()).build()
    }

    fn snapshot_from_row(&self, row: &SubscriptionRow) -> QuotaSnapshot {
        let plan = Plan::from_wire(row.plan.as_deref().unwrap_or("free"));
        let count = row.saves_this_month;
        let limit = match plan {
            Plan::Free => Some(self.free_tier_limit),
            Plan::Pro => None,
        };
        QuotaSnapshot {
            count,
            plan,
            limit,
            remaining: limit.map(|l| l.saturating_sub(count)),
        }
    }
}

impl QuotaLedger for RpcQuotaLedger {
    fn check_and_increment(&self, account: &AccountId) -> Result<QuotaDecision> {
        let url = format!("{}/rest/v1/rpc/increment_save_count", self.api.base_url);

        let response = self
            .agent()
            .post(&url)
            .set("apikey", &self.api.anon_key)
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
            .set("Content-Type", "application/json")
            .send_json(&IncrementParams {
                p_user_id: account.as_str(),
            })
            .map_err(|e| anyhow!("quota RPC failed: {}", e))?;

        let decision: IncrementResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse quota RPC response: {}", e))?;

        Ok(QuotaDecision {
            allowed: decision.allowed,
            count: decision.count,
            plan: Plan::from_wire(decision.plan.as_deref().unwrap_or("free")),
        })
    }

    fn snapshot(&self, account: &AccountId) -> Result<QuotaSnapshot> {
        let url = format!("{}/rest/v1/subscriptions", self.api.base_url);

        let rows: Vec<SubscriptionRow> = self
            .agent()
            .get(&url)
            .set("apikey", &self.api.anon_key)
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
            .query("select", "*")
            .query("user_id", &format!("eq.{}", account))
            .call()
            .map_err(|e| anyhow!("subscription fetch failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse subscription response: {}", e))?;

        if let Some(row) = rows.first() {
            return Ok(self.snapshot_from_row(row));
        }

        // First read for this account: create the default row, like the
        // signup path would.
        tracing::debug!(account = %account, "no subscription row, creating default");
        let created: Vec<SubscriptionRow> = self
            .agent()
            .post(&url)
            .set("apikey", &self.api.anon_key)
            .set("Authorization", &format!("Bearer {}", self.api.anon_key))
            .set("Content-Type", "application/json")
            .set("Prefer", "return=representation")
            .send_json(&NewSubscriptionRow {
                user_id: account.as_str(),
            })
            .map_err(|e| anyhow!("subscription create failed: {}", e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse subscription create response: {}", e))?;

        let row = created
            .first()
            .ok_or_else(|| anyhow!("subscription create returned no row"))?;
        Ok(self.snapshot_from_row(row))
    }
}
