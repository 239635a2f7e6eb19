use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mobility::trips::TripId;
use crate::mobility::UserId;

/// Identifier wrapper for ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earn,
    Spend,
}

impl TransactionKind {
    pub const fn label(self) -> &'static str {
        match self {
            TransactionKind::Earn => "earn",
            TransactionKind::Spend => "spend",
        }
    }
}

/// Reward event a credit is keyed on; one credit per (trip, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
    Departure,
    Completion,
}

impl RewardKind {
    pub const fn label(self) -> &'static str {
        match self {
            RewardKind::Departure => "departure",
            RewardKind::Completion => "completion",
        }
    }
}

/// Uniqueness key that makes retried credits safe: replaying an already
/// recorded key returns the stored entry instead of paying twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn for_trip(trip_id: &TripId, kind: RewardKind) -> Self {
        Self(format!("{}:{}", trip_id.0, kind.label()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One user's point wallet. The balance is derived: it always equals the sum
/// of the account's entry amounts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletAccount {
    pub user_id: UserId,
    pub balance: i64,
    pub currency_code: String,
}

/// Immutable, append-only ledger row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    pub id: TransactionId,
    pub account_id: UserId,
    pub kind: TransactionKind,
    /// Signed: positive for `earn`, negative for `spend`.
    pub amount: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub trip_id: Option<TripId>,
    pub idempotency_key: IdempotencyKey,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("earn amount must be positive, got {0}")]
    NonPositiveEarn(i64),
    #[error("spend amount must be negative, got {0}")]
    NonNegativeSpend(i64),
    #[error("insufficient balance: have {balance}, requested {amount}")]
    InsufficientBalance { balance: i64, amount: i64 },
    #[error("ledger consistency violated: {0}")]
    Consistency(String),
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// One page of an account's entries, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionPage {
    pub entries: Vec<LedgerEntry>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

/// Aggregate wallet view for the summary endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletSummary {
    pub balance: i64,
    pub currency_code: String,
    pub total_earned: i64,
    pub total_spent: i64,
    pub transaction_count: usize,
    pub recent_transactions: Vec<LedgerEntry>,
}

/// Append-only transaction log with derived balances.
///
/// `credit` is atomic and idempotent: the key lookup, the append, and the
/// balance adjustment happen in one unit, and the key uniqueness is enforced
/// by the ledger itself rather than by callers holding locks.
pub trait WalletLedger: Send + Sync {
    fn credit(
        &self,
        account: &UserId,
        kind: TransactionKind,
        amount: i64,
        description: &str,
        trip_id: Option<&TripId>,
        key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError>;

    fn balance(&self, account: &UserId) -> Result<i64, LedgerError>;

    fn account(&self, account: &UserId) -> Result<WalletAccount, LedgerError>;

    /// Page through an account's entries ordered by `created_at` descending.
    /// `page` is 1-based; `page_size` is clamped to 1..=100.
    fn transactions(
        &self,
        account: &UserId,
        page: usize,
        page_size: usize,
    ) -> Result<TransactionPage, LedgerError>;

    fn summary(&self, account: &UserId) -> Result<WalletSummary, LedgerError>;
}

pub const MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_PAGE_SIZE: usize = 20;
