use crate::infra::build_services;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use clap::Args;
use tripwise::error::AppError;
use tripwise::mobility::trips::TripServiceError;
use tripwise::mobility::UserId;
use tripwise::mobility::WalletLedger;

#[derive(Args, Debug)]
pub(crate) struct OptimalArgs {
    /// Hours ahead to scan
    #[arg(long, default_value_t = 2)]
    pub(crate) window_hours: i64,
    /// Congestion location key (e.g. gangnam)
    #[arg(long, default_value = "default")]
    pub(crate) location: String,
    /// Search start in `YYYY-MM-DD HH:MM` (defaults to now)
    #[arg(long, value_parser = parse_lookup_time)]
    pub(crate) at: Option<DateTime<Utc>>,
}

fn parse_lookup_time(raw: &str) -> Result<DateTime<Utc>, String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|err| format!("expected YYYY-MM-DD HH:MM ({err})"))
}

pub(crate) fn run_optimal_lookup(args: OptimalArgs) -> Result<(), AppError> {
    let services = build_services("PNT")?;
    let start = args.at.unwrap_or_else(Utc::now);
    let selection = services
        .engine
        .optimal_window(&args.location, start, args.window_hours)?;

    println!("optimal departure for '{}':", args.location);
    println!(
        "  best         {}  score {:.2} ({})",
        selection.best.slot.start.format("%H:%M"),
        selection.best.score,
        selection.best.level.label()
    );
    for alternative in &selection.alternatives {
        println!(
            "  alternative  {}  score {:.2} ({})",
            alternative.slot.start.format("%H:%M"),
            alternative.score,
            alternative.level.label()
        );
    }
    println!(
        "  {} slots analyzed, precision {:?}",
        selection.slots_analyzed, selection.precision
    );
    Ok(())
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Identity used for the demo journey
    #[arg(long, default_value = "demo-rider")]
    pub(crate) user: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let services = build_services("PNT")?;
    let rider = UserId(args.user);
    let now = Utc::now();

    let recommendation =
        services
            .engine
            .recommend(&rider, "Seoul Station", "Gangnam Station", Some("gangnam"), now)?;
    println!("recommendation {}:", recommendation.id.0);
    println!(
        "  window {} - {} ({})",
        recommendation.window_start.format("%H:%M"),
        recommendation.window_end.format("%H:%M"),
        recommendation.recommended_bucket.code()
    );
    println!("  {}", recommendation.rationale);

    let started = services
        .trips
        .start(&recommendation.id, &rider, recommendation.window_start)?;
    println!(
        "trip {} started: departure reward {} ({:.2}x base {})",
        started.trip.id.0,
        started.departure_reward.amount,
        started.departure_reward.multiplier,
        started.departure_reward.base_reward
    );

    let arrived_at =
        started.trip.started_at + Duration::minutes(i64::from(started.trip.predicted_duration_min));
    let completed = services.trips.arrive(&started.trip.id, &rider, arrived_at)?;
    println!(
        "trip arrived after {} min: completion reward {} (accuracy bonus {})",
        completed.trip.actual_duration_min.unwrap_or_default(),
        completed.completion_reward.amount,
        completed.completion_reward.accuracy_bonus
    );

    let summary = services
        .ledger
        .summary(&rider)
        .map_err(TripServiceError::from)?;
    println!("wallet balance: {} {}", summary.balance, summary.currency_code);
    Ok(())
}
