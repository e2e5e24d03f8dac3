use discogs2music::{SyncError, SyncOutcome};

/// Print the run summary.
pub fn print_summary(outcome: &SyncOutcome) {
    println!();
    println!("📊 Summary");
    println!(
        "Ratings last updated: {}{}",
        outcome.snapshot.last_updated.format("%Y-%m-%d %H:%M:%S UTC"),
        if outcome.fetched { "" } else { " (cached)" }
    );
    println!("{}", outcome.report.summary());
}

/// Print a fatal error: one line, plus the detail when debugging.
pub fn print_error(error: &SyncError, debug: bool) {
    match error {
        SyncError::Cancelled => eprintln!("🛑 Interrupted, nothing was saved"),
        SyncError::Auth(_) => eprintln!("❌ Authentication failed: check your Discogs API key"),
        other => eprintln!("❌ Stopped on a {} error", other.category()),
    }
    if debug {
        eprintln!("   {error}");
    }
}
