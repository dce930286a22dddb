use clap::Subcommand;
use serde::Serialize;
use stride_core::usage::{rank_for_display, EntityKind};
use uuid::Uuid;

use super::{context, Context};

#[derive(Subcommand)]
pub enum CatalogAction {
    /// List session types, most-used first
    Types,
    /// Register a custom session type
    AddType {
        /// Work phase length in seconds
        #[arg(long)]
        work: u64,
        /// Break phase length in seconds
        #[arg(long)]
        break_secs: Option<u64>,
        /// Number of work/break cycles before the session completes
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// List tags, most-used first
    Tags,
    /// Register a custom tag
    AddTag { name: String },
}

#[derive(Serialize)]
struct TypeRow {
    id: Uuid,
    work_duration_secs: u64,
    break_duration_secs: Option<u64>,
    number_of_cycles: Option<u32>,
    is_system: bool,
}

#[derive(Serialize)]
struct TagRow {
    id: Uuid,
    name: String,
    is_system: bool,
}

pub fn run(action: CatalogAction) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = context()?;

    match action {
        CatalogAction::Types => {
            let order = usage_order(&ctx, EntityKind::SessionType)?;
            let mut rows: Vec<TypeRow> = ctx
                .store
                .list_session_types(ctx.user)?
                .into_iter()
                .map(|(id, spec)| TypeRow {
                    id,
                    work_duration_secs: spec.work_duration_secs,
                    break_duration_secs: spec.break_duration_secs,
                    number_of_cycles: spec.number_of_cycles,
                    is_system: spec.is_system,
                })
                .collect();
            rows.sort_by_key(|row| rank(&order, row.id));
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        CatalogAction::AddType {
            work,
            break_secs,
            cycles,
        } => {
            let id = ctx
                .store
                .add_session_type(Some(ctx.user), work, break_secs, cycles)?;
            println!("{id}");
        }
        CatalogAction::Tags => {
            let order = usage_order(&ctx, EntityKind::Tag)?;
            let mut rows: Vec<TagRow> = ctx
                .store
                .list_tags(ctx.user)?
                .into_iter()
                .map(|(id, name, is_system)| TagRow { id, name, is_system })
                .collect();
            rows.sort_by_key(|row| rank(&order, row.id));
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        CatalogAction::AddTag { name } => {
            let id = ctx.store.add_tag(Some(ctx.user), &name)?;
            println!("{id}");
        }
    }
    Ok(())
}

/// Entity ids in display order, best-ranked first.
fn usage_order(
    ctx: &Context,
    kind: EntityKind,
) -> Result<Vec<Uuid>, Box<dyn std::error::Error>> {
    let mut records = ctx.store.list_usage(ctx.user, kind)?;
    rank_for_display(&mut records);
    Ok(records.into_iter().map(|r| r.entity_id).collect())
}

/// Never-used entities sort after everything with a usage record.
fn rank(order: &[Uuid], id: Uuid) -> usize {
    order.iter().position(|&o| o == id).unwrap_or(order.len())
}
