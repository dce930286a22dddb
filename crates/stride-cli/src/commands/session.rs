use clap::Subcommand;
use stride_core::{AwardResult, FocusSession, SessionStatus};
use uuid::Uuid;

use super::{context, Context};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a session from a session type or a custom duration
    Start {
        /// Session type id from the catalog
        #[arg(long, conflicts_with = "duration")]
        session_type: Option<Uuid>,
        /// Custom work duration in seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Linked to-do id
        #[arg(long)]
        todo: Option<Uuid>,
        /// Tag id (repeatable)
        #[arg(long = "tag")]
        tags: Vec<Uuid>,
    },
    /// Advance the ongoing session to its next phase
    Next,
    /// Finish the ongoing session now
    Finish {
        /// Self-reported focus level (1-5)
        #[arg(long)]
        focus_level: Option<u8>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel the ongoing session
    Cancel,
    /// Print the ongoing session as JSON
    Status,
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context()?;

    match action {
        SessionAction::Start {
            session_type,
            duration,
            todo,
            tags,
        } => {
            let (session, award) =
                ctx.engine
                    .create_session(ctx.user, session_type, duration, todo, &tags)?;
            print_session(&session, award)?;
        }
        SessionAction::Next => {
            let current = ongoing(&ctx)?;
            let (session, award) = ctx.engine.transition_state(current.id, ctx.user)?;
            print_session(&session, award)?;
        }
        SessionAction::Finish { focus_level, notes } => {
            let current = ongoing(&ctx)?;
            let (session, award) = ctx.engine.update_status(
                current.id,
                ctx.user,
                SessionStatus::Completed,
                focus_level,
                notes,
            )?;
            print_session(&session, award)?;
        }
        SessionAction::Cancel => {
            let current = ongoing(&ctx)?;
            let (session, award) =
                ctx.engine
                    .update_status(current.id, ctx.user, SessionStatus::Cancelled, None, None)?;
            print_session(&session, award)?;
        }
        SessionAction::Status => match ctx.engine.get_ongoing_session(ctx.user)? {
            Some(session) => println!("{}", serde_json::to_string_pretty(&session)?),
            None => println!("no ongoing session"),
        },
    }
    Ok(())
}

fn ongoing(ctx: &Context) -> Result<FocusSession, Box<dyn std::error::Error>> {
    ctx.engine
        .get_ongoing_session(ctx.user)?
        .ok_or_else(|| "no ongoing session".into())
}

fn print_session(
    session: &FocusSession,
    award: Option<AwardResult>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(session)?);
    if let Some(award) = award {
        println!("{}", award.message);
    }
    Ok(())
}
