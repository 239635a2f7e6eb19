//! Reward computation and the wallet ledger.

mod calculator;
mod ledger;

pub use calculator::{
    AppliedBonus, BonusKind, CompletionReward, DepartureReward, RewardCalculator, RewardConfig,
    RewardConfigError,
};
pub use ledger::{
    IdempotencyKey, LedgerEntry, LedgerError, RewardKind, TransactionId, TransactionKind,
    TransactionPage, WalletAccount, WalletLedger, WalletSummary, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
