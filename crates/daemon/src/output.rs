// Terminal rendering for CLI results

use colored::{ColoredString, Colorize};
use refund_sync_core::application::SchedulerStats;
use refund_sync_core::domain::{IssueSeverity, Prediction, RefundState, RefundStatus};
use refund_sync_core::port::AnalyticsSnapshot;

fn state_label(state: RefundState) -> ColoredString {
    let label = state.to_string();
    match state {
        RefundState::Available => label.green().bold(),
        RefundState::Processing => label.cyan().bold(),
        RefundState::Delayed => label.yellow().bold(),
        RefundState::Error => label.red().bold(),
    }
}

pub fn print_status(status: &RefundStatus) {
    let freshness = if status.is_stale {
        " (cached, refreshing)".dimmed().to_string()
    } else {
        String::new()
    };
    println!(
        "{} {}  {}{}",
        "Refund".bold(),
        status.id,
        state_label(status.state),
        freshness
    );
    if let Some(amount) = &status.amount {
        println!("  Amount:       {}", amount);
    }
    println!("  Filed:        {}", status.filing_date);
    println!("  Last updated: {}", status.last_updated.to_rfc3339());

    for issue in &status.issues {
        let code = match issue.severity {
            IssueSeverity::Info => issue.code.blue(),
            IssueSeverity::Warning => issue.code.yellow(),
            IssueSeverity::Error => issue.code.red(),
        };
        println!("  [{}] {}", code, issue.description);
        if let Some(resolution) = &issue.resolution {
            println!("        {}", resolution.dimmed());
        }
    }

    if let Some(prediction) = &status.prediction {
        print_prediction(prediction);
    }
}

pub fn print_prediction(prediction: &Prediction) {
    let kind = if prediction.is_fallback() {
        "estimate (fallback)".yellow()
    } else {
        "estimate".green()
    };
    println!(
        "  {} {} days, around {} (confidence {:.0}%)",
        kind,
        prediction.estimated_days,
        prediction.estimated_date,
        prediction.confidence * 100.0
    );
    for factor in &prediction.factors {
        println!(
            "    - {:?}/{:?}: {}",
            factor.delay_type, factor.impact, factor.description
        );
    }
}

pub fn print_stats(stats: &SchedulerStats) {
    println!(
        "{} active={} scheduled={} replaced={} runs={} failures={}",
        "Scheduler".bold(),
        stats.active_jobs,
        stats.schedule_requests,
        stats.replaced_jobs,
        stats.job_runs,
        stats.job_failures
    );
}

pub fn print_analytics(snapshot: &AnalyticsSnapshot) {
    println!(
        "{} calls={} errors={} slow={} refreshes={} refresh_errors={}",
        "API".bold(),
        snapshot.api_calls,
        snapshot.api_errors,
        snapshot.slow_calls,
        snapshot.refresh_successes,
        snapshot.refresh_errors
    );
}

pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn failure(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}
