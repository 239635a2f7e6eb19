//! In-memory storage adapters backing the default deployment and the test
//! suites. Each adapter keeps its whole state behind a single mutex, so the
//! check-and-write operations the contracts require are genuinely atomic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::recommendations::{
    Recommendation, RecommendationId, RecommendationRepository, RepositoryError,
};
use super::rewards::{
    IdempotencyKey, LedgerEntry, LedgerError, TransactionId, TransactionKind, TransactionPage,
    WalletAccount, WalletLedger, WalletSummary, MAX_PAGE_SIZE,
};
use super::trips::{Trip, TripId, TripRepository, TripStatus};
use super::UserId;

#[derive(Default)]
pub struct InMemoryRecommendationRepository {
    records: Mutex<HashMap<RecommendationId, Recommendation>>,
}

impl RecommendationRepository for InMemoryRecommendationRepository {
    fn insert(&self, recommendation: Recommendation) -> Result<Recommendation, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&recommendation.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(recommendation.id.clone(), recommendation.clone());
        Ok(recommendation)
    }

    fn fetch(&self, id: &RecommendationId) -> Result<Option<Recommendation>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Default)]
struct TripState {
    trips: HashMap<TripId, Trip>,
    by_recommendation: HashMap<RecommendationId, TripId>,
}

#[derive(Default)]
pub struct InMemoryTripRepository {
    state: Mutex<TripState>,
}

impl TripRepository for InMemoryTripRepository {
    fn claim(&self, trip: Trip) -> Result<Trip, RepositoryError> {
        let mut guard = self.state.lock().expect("trip mutex poisoned");
        if guard.by_recommendation.contains_key(&trip.recommendation_id) {
            return Err(RepositoryError::Conflict);
        }
        guard
            .by_recommendation
            .insert(trip.recommendation_id.clone(), trip.id.clone());
        guard.trips.insert(trip.id.clone(), trip.clone());
        Ok(trip)
    }

    fn release(&self, trip_id: &TripId) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("trip mutex poisoned");
        let trip = guard.trips.remove(trip_id).ok_or(RepositoryError::NotFound)?;
        guard.by_recommendation.remove(&trip.recommendation_id);
        Ok(())
    }

    fn fetch(&self, id: &TripId) -> Result<Option<Trip>, RepositoryError> {
        let guard = self.state.lock().expect("trip mutex poisoned");
        Ok(guard.trips.get(id).cloned())
    }

    fn finish(
        &self,
        trip_id: &TripId,
        arrived_at: DateTime<Utc>,
        actual_duration_min: u32,
    ) -> Result<Trip, RepositoryError> {
        let mut guard = self.state.lock().expect("trip mutex poisoned");
        let trip = guard.trips.get_mut(trip_id).ok_or(RepositoryError::NotFound)?;
        if trip.status != TripStatus::Ongoing {
            return Err(RepositoryError::Conflict);
        }
        trip.status = TripStatus::Arrived;
        trip.arrived_at = Some(arrived_at);
        trip.actual_duration_min = Some(actual_duration_min);
        Ok(trip.clone())
    }

    fn reopen(&self, trip_id: &TripId) -> Result<(), RepositoryError> {
        let mut guard = self.state.lock().expect("trip mutex poisoned");
        let trip = guard.trips.get_mut(trip_id).ok_or(RepositoryError::NotFound)?;
        if trip.status == TripStatus::Arrived {
            trip.status = TripStatus::Ongoing;
            trip.arrived_at = None;
            trip.actual_duration_min = None;
        }
        Ok(())
    }

    fn history(&self, user_id: &UserId) -> Result<Vec<Trip>, RepositoryError> {
        let guard = self.state.lock().expect("trip mutex poisoned");
        let mut trips: Vec<Trip> = guard
            .trips
            .values()
            .filter(|trip| trip.user_id == *user_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.0.cmp(&a.id.0)));
        Ok(trips)
    }
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<UserId, i64>,
    entries: Vec<LedgerEntry>,
    by_key: HashMap<IdempotencyKey, usize>,
}

/// Reference ledger: one mutex guards the key index, the log, and the
/// balances, so a credit either fully lands or not at all.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    sequence: AtomicU64,
    currency_code: String,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new("PNT")
    }
}

impl InMemoryLedger {
    pub fn new(currency_code: &str) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            sequence: AtomicU64::new(1),
            currency_code: currency_code.to_string(),
        }
    }

    fn next_transaction_id(&self) -> TransactionId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        TransactionId(format!("txn-{id:06}"))
    }

    fn account_entries<'a>(state: &'a LedgerState, account: &UserId) -> Vec<&'a LedgerEntry> {
        // Entries are appended in commit order; newest last.
        state
            .entries
            .iter()
            .filter(|entry| entry.account_id == *account)
            .collect()
    }
}

impl WalletLedger for InMemoryLedger {
    fn credit(
        &self,
        account: &UserId,
        kind: TransactionKind,
        amount: i64,
        description: &str,
        trip_id: Option<&TripId>,
        key: IdempotencyKey,
        now: DateTime<Utc>,
    ) -> Result<LedgerEntry, LedgerError> {
        let mut state = self.state.lock().expect("ledger mutex poisoned");

        if let Some(&index) = state.by_key.get(&key) {
            let existing = &state.entries[index];
            if existing.amount != amount || existing.kind != kind {
                return Err(LedgerError::Consistency(format!(
                    "idempotency key {} replayed with different payload",
                    key.as_str()
                )));
            }
            // Idempotent replay: hand back the recorded entry, touch nothing.
            return Ok(existing.clone());
        }

        match kind {
            TransactionKind::Earn if amount <= 0 => {
                return Err(LedgerError::NonPositiveEarn(amount))
            }
            TransactionKind::Spend if amount >= 0 => {
                return Err(LedgerError::NonNegativeSpend(amount))
            }
            _ => {}
        }

        let balance = state.balances.get(account).copied().unwrap_or(0);
        if balance + amount < 0 {
            return Err(LedgerError::InsufficientBalance { balance, amount });
        }

        let entry = LedgerEntry {
            id: self.next_transaction_id(),
            account_id: account.clone(),
            kind,
            amount,
            description: description.to_string(),
            created_at: now,
            trip_id: trip_id.cloned(),
            idempotency_key: key.clone(),
        };

        let index = state.entries.len();
        state.entries.push(entry.clone());
        state.by_key.insert(key, index);
        *state.balances.entry(account.clone()).or_insert(0) += amount;

        Ok(entry)
    }

    fn balance(&self, account: &UserId) -> Result<i64, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(state.balances.get(account).copied().unwrap_or(0))
    }

    fn account(&self, account: &UserId) -> Result<WalletAccount, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        Ok(WalletAccount {
            user_id: account.clone(),
            balance: state.balances.get(account).copied().unwrap_or(0),
            currency_code: self.currency_code.clone(),
        })
    }

    fn transactions(
        &self,
        account: &UserId,
        page: usize,
        page_size: usize,
    ) -> Result<TransactionPage, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let entries = Self::account_entries(&state, account);
        let total = entries.len();
        let selected = entries
            .into_iter()
            .rev()
            .skip((page - 1) * page_size)
            .take(page_size)
            .cloned()
            .collect();

        Ok(TransactionPage {
            entries: selected,
            page,
            page_size,
            total,
        })
    }

    fn summary(&self, account: &UserId) -> Result<WalletSummary, LedgerError> {
        let state = self.state.lock().expect("ledger mutex poisoned");
        let entries = Self::account_entries(&state, account);

        let total_earned = entries
            .iter()
            .filter(|entry| entry.kind == TransactionKind::Earn)
            .map(|entry| entry.amount)
            .sum();
        let total_spent = entries
            .iter()
            .filter(|entry| entry.kind == TransactionKind::Spend)
            .map(|entry| entry.amount.abs())
            .sum();

        Ok(WalletSummary {
            balance: state.balances.get(account).copied().unwrap_or(0),
            currency_code: self.currency_code.clone(),
            total_earned,
            total_spent,
            transaction_count: entries.len(),
            recent_transactions: entries.into_iter().rev().take(5).cloned().collect(),
        })
    }
}
