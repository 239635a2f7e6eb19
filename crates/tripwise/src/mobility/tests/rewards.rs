use std::sync::Arc;
use std::thread;

use chrono::{Duration, TimeZone, Utc};

use super::common::*;
use crate::mobility::congestion::CongestionLevel;
use crate::mobility::memory::InMemoryLedger;
use crate::mobility::rewards::{
    BonusKind, IdempotencyKey, LedgerError, RewardCalculator, RewardConfig, RewardKind,
    TransactionKind, WalletLedger,
};
use crate::mobility::trips::TripId;

fn calculator() -> RewardCalculator {
    RewardCalculator::new(RewardConfig::default(), classifier()).expect("config valid")
}

fn trip_id(raw: &str) -> TripId {
    TripId(raw.to_string())
}

#[test]
fn departure_at_night_in_window_with_clear_roads_stacks_all_bonuses() {
    // 02:00 falls in the early-hours bucket (+0.40); the window covers the
    // departure (+0.30); very good congestion adds +0.50.
    let departure = Utc.with_ymd_and_hms(2026, 3, 4, 2, 0, 0).single().expect("valid");
    let recommendation = recommendation("rec-a", "user-1", departure);

    let reward = calculator().departure_reward(&recommendation, departure, CongestionLevel::VeryGood);

    assert!((reward.multiplier - 2.2).abs() < 1e-9);
    assert_eq!(reward.amount, 220);
    assert_eq!(reward.base_reward, 100);
    assert_eq!(reward.bonuses.len(), 3);
}

#[test]
fn departure_multiplier_is_clamped_at_the_ceiling() {
    let config = RewardConfig {
        follow_window_bonus: 0.7,
        low_congestion_bonus: 0.8,
        ..RewardConfig::default()
    };
    let calculator = RewardCalculator::new(config, classifier()).expect("config valid");

    let departure = Utc.with_ymd_and_hms(2026, 3, 4, 2, 0, 0).single().expect("valid");
    let recommendation = recommendation("rec-b", "user-1", departure);
    let reward = calculator.departure_reward(&recommendation, departure, CongestionLevel::VeryGood);

    // 1 + 0.4 + 0.7 + 0.8 = 2.9, clamped.
    assert!((reward.multiplier - 2.4).abs() < 1e-9);
    assert_eq!(reward.amount, 240);
}

#[test]
fn departure_outside_window_in_heavy_traffic_earns_only_the_bucket_bonus() {
    let window_start = Utc.with_ymd_and_hms(2026, 3, 4, 6, 0, 0).single().expect("valid");
    let recommendation = recommendation("rec-c", "user-1", window_start);
    // Midday departure, an hour past the window, congested.
    let departure = Utc.with_ymd_and_hms(2026, 3, 4, 13, 0, 0).single().expect("valid");

    let reward = calculator().departure_reward(&recommendation, departure, CongestionLevel::Heavy);

    assert!((reward.multiplier - 1.1).abs() < 1e-9);
    assert_eq!(reward.amount, 110);
    assert_eq!(reward.bonuses.len(), 1);
    assert_eq!(reward.bonuses[0].kind, BonusKind::TimeBucket);
}

#[test]
fn bucket_bonus_keys_off_the_actual_departure_bucket() {
    // Recommended window sits in the early hours, but the user leaves at
    // 09:30 (late morning, +0.20).
    let window_start = Utc.with_ymd_and_hms(2026, 3, 4, 2, 0, 0).single().expect("valid");
    let recommendation = recommendation("rec-d", "user-1", window_start);
    let departure = Utc.with_ymd_and_hms(2026, 3, 4, 9, 30, 0).single().expect("valid");

    let reward = calculator().departure_reward(&recommendation, departure, CongestionLevel::Moderate);

    assert!((reward.multiplier - 1.2).abs() < 1e-9);
    assert_eq!(reward.amount, 120);
}

#[test]
fn completion_bonus_tiers_follow_the_accuracy_margins() {
    let calculator = calculator();

    let tight = calculator.completion_reward(45, 42);
    assert_eq!(tight.accuracy_bonus, 30);
    assert_eq!(tight.amount, 80);

    let loose = calculator.completion_reward(45, 52);
    assert_eq!(loose.accuracy_bonus, 15);
    assert_eq!(loose.amount, 65);

    let missed = calculator.completion_reward(45, 58);
    assert_eq!(missed.accuracy_bonus, 0);
    assert_eq!(missed.amount, 50);
}

#[test]
fn replayed_idempotency_key_credits_once() {
    let ledger = InMemoryLedger::default();
    let account = user("user-1");
    let key = IdempotencyKey::for_trip(&trip_id("trip-1"), RewardKind::Departure);

    let first = ledger
        .credit(
            &account,
            TransactionKind::Earn,
            220,
            "Departure reward",
            Some(&trip_id("trip-1")),
            key.clone(),
            fixed_now(),
        )
        .expect("first credit lands");
    let second = ledger
        .credit(
            &account,
            TransactionKind::Earn,
            220,
            "Departure reward",
            Some(&trip_id("trip-1")),
            key,
            fixed_now() + Duration::seconds(5),
        )
        .expect("replay returns the stored entry");

    assert_eq!(first, second);
    assert_eq!(ledger.balance(&account).expect("balance"), 220);
    assert_eq!(
        ledger
            .transactions(&account, 1, 20)
            .expect("transactions")
            .total,
        1
    );
}

#[test]
fn key_replay_with_a_different_payload_is_a_consistency_error() {
    let ledger = InMemoryLedger::default();
    let account = user("user-1");
    let key = IdempotencyKey::for_trip(&trip_id("trip-1"), RewardKind::Departure);

    ledger
        .credit(
            &account,
            TransactionKind::Earn,
            220,
            "Departure reward",
            Some(&trip_id("trip-1")),
            key.clone(),
            fixed_now(),
        )
        .expect("first credit lands");

    let err = ledger
        .credit(
            &account,
            TransactionKind::Earn,
            999,
            "Departure reward",
            Some(&trip_id("trip-1")),
            key,
            fixed_now(),
        )
        .expect_err("conflicting replay rejected");

    assert!(matches!(err, LedgerError::Consistency(_)));
    assert_eq!(ledger.balance(&account).expect("balance"), 220);
}

#[test]
fn earn_amounts_must_be_positive() {
    let ledger = InMemoryLedger::default();
    let err = ledger
        .credit(
            &user("user-1"),
            TransactionKind::Earn,
            0,
            "nothing",
            None,
            IdempotencyKey::for_trip(&trip_id("trip-2"), RewardKind::Departure),
            fixed_now(),
        )
        .expect_err("zero earn rejected");
    assert!(matches!(err, LedgerError::NonPositiveEarn(0)));
}

#[test]
fn spend_never_drives_the_balance_negative() {
    let ledger = InMemoryLedger::default();
    let account = user("user-1");

    ledger
        .credit(
            &account,
            TransactionKind::Earn,
            100,
            "Departure reward",
            None,
            IdempotencyKey::for_trip(&trip_id("trip-3"), RewardKind::Departure),
            fixed_now(),
        )
        .expect("earn lands");

    let err = ledger
        .credit(
            &account,
            TransactionKind::Spend,
            -150,
            "Merchant redemption",
            None,
            IdempotencyKey::for_trip(&trip_id("trip-3"), RewardKind::Completion),
            fixed_now(),
        )
        .expect_err("overdraft rejected");

    assert!(matches!(
        err,
        LedgerError::InsufficientBalance {
            balance: 100,
            amount: -150
        }
    ));
    assert_eq!(ledger.balance(&account).expect("balance"), 100);
    assert_eq!(ledger.transactions(&account, 1, 20).expect("page").total, 1);
}

#[test]
fn spend_within_balance_reduces_it() {
    let ledger = InMemoryLedger::default();
    let account = user("user-1");

    ledger
        .credit(
            &account,
            TransactionKind::Earn,
            100,
            "Departure reward",
            None,
            IdempotencyKey::for_trip(&trip_id("trip-4"), RewardKind::Departure),
            fixed_now(),
        )
        .expect("earn lands");
    ledger
        .credit(
            &account,
            TransactionKind::Spend,
            -40,
            "Merchant redemption",
            None,
            IdempotencyKey::for_trip(&trip_id("trip-4"), RewardKind::Completion),
            fixed_now(),
        )
        .expect("spend lands");

    assert_eq!(ledger.balance(&account).expect("balance"), 60);
    let summary = ledger.summary(&account).expect("summary");
    assert_eq!(summary.total_earned, 100);
    assert_eq!(summary.total_spent, 40);
}

#[test]
fn concurrent_credits_keep_balance_equal_to_the_entry_sum() {
    let ledger = Arc::new(InMemoryLedger::default());
    let account = user("user-1");

    let handles: Vec<_> = (0..8)
        .map(|worker: u64| {
            let ledger = Arc::clone(&ledger);
            let account = account.clone();
            thread::spawn(move || {
                for step in 0..10 {
                    let trip = TripId(format!("trip-{worker}-{step}"));
                    ledger
                        .credit(
                            &account,
                            TransactionKind::Earn,
                            10,
                            "Departure reward",
                            Some(&trip),
                            IdempotencyKey::for_trip(&trip, RewardKind::Departure),
                            fixed_now(),
                        )
                        .expect("credit lands");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker finishes");
    }

    let page = ledger.transactions(&account, 1, 100).expect("page");
    assert_eq!(page.total, 80);
    let sum: i64 = page.entries.iter().map(|entry| entry.amount).sum();
    assert_eq!(sum, 800);
    assert_eq!(ledger.balance(&account).expect("balance"), 800);
}

#[test]
fn transaction_pages_run_newest_first() {
    let ledger = InMemoryLedger::default();
    let account = user("user-1");

    for (index, minutes) in [0_i64, 1, 2].into_iter().enumerate() {
        let trip = TripId(format!("trip-{index}"));
        ledger
            .credit(
                &account,
                TransactionKind::Earn,
                100 + index as i64,
                "Departure reward",
                Some(&trip),
                IdempotencyKey::for_trip(&trip, RewardKind::Departure),
                fixed_now() + Duration::minutes(minutes),
            )
            .expect("credit lands");
    }

    let first_page = ledger.transactions(&account, 1, 2).expect("page");
    assert_eq!(first_page.total, 3);
    assert_eq!(
        first_page
            .entries
            .iter()
            .map(|entry| entry.amount)
            .collect::<Vec<_>>(),
        vec![102, 101]
    );

    let second_page = ledger.transactions(&account, 2, 2).expect("page");
    assert_eq!(
        second_page
            .entries
            .iter()
            .map(|entry| entry.amount)
            .collect::<Vec<_>>(),
        vec![100]
    );
}

#[test]
fn summary_reports_totals_and_recents() {
    let ledger = InMemoryLedger::new("PNT");
    let account = user("user-1");

    for index in 0..6_i64 {
        let trip = TripId(format!("trip-{index}"));
        ledger
            .credit(
                &account,
                TransactionKind::Earn,
                10 + index,
                "Departure reward",
                Some(&trip),
                IdempotencyKey::for_trip(&trip, RewardKind::Departure),
                fixed_now() + Duration::minutes(index),
            )
            .expect("credit lands");
    }

    let summary = ledger.summary(&account).expect("summary");
    assert_eq!(summary.balance, 75);
    assert_eq!(summary.currency_code, "PNT");
    assert_eq!(summary.total_earned, 75);
    assert_eq!(summary.total_spent, 0);
    assert_eq!(summary.transaction_count, 6);
    assert_eq!(summary.recent_transactions.len(), 5);
    assert_eq!(summary.recent_transactions[0].amount, 15);
}
