use chrono::NaiveDate;
use clap::Subcommand;
use serde::Serialize;
use uuid::Uuid;

use super::context;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Streak and currency summary
    Show,
}

#[derive(Serialize)]
struct Summary {
    user_id: Uuid,
    total_steps: u64,
    stepstones: u64,
    current_streak_days: u32,
    longest_streak_days: u32,
    last_qualifying_day: Option<NaiveDate>,
    total_completed_sessions: u64,
    total_focus_secs: u64,
    energy_bar_armed: bool,
    compass_armed: bool,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context()?;

    match action {
        StatsAction::Show => {
            let account = ctx.engine.account(ctx.user)?;
            let stats = ctx.engine.stats(ctx.user)?;
            let summary = Summary {
                user_id: ctx.user,
                total_steps: account.total_steps,
                stepstones: account.stepstones,
                current_streak_days: stats.current_streak_days,
                longest_streak_days: stats.longest_streak_days,
                last_qualifying_day: stats.last_session_completion_date,
                total_completed_sessions: stats.total_completed_sessions,
                total_focus_secs: stats.total_focus_secs,
                energy_bar_armed: account.is_energy_bar_active_for_next_session,
                compass_armed: account.is_compass_active,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
