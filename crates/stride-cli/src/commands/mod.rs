pub mod boost;
pub mod catalog;
pub mod session;
pub mod stats;

use std::sync::Arc;

use stride_core::{Config, ScoringEngine, SessionEngine, SqliteStore, StreakTracker};
use uuid::Uuid;

const LOCAL_USER_KEY: &str = "local_user_id";

/// Everything a command needs: the local store, an engine configured
/// from the on-disk config, and the single local user's id.
pub(crate) struct Context {
    pub store: Arc<SqliteStore>,
    pub engine: SessionEngine,
    pub user: Uuid,
}

pub(crate) fn context() -> Result<Context, Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open()?);
    let user = local_user(&store)?;
    let config = Config::load_or_default();
    let engine = SessionEngine::new(store.clone(), store.clone(), store.clone(), store.clone())
        .with_scoring(ScoringEngine::with_table(config.scoring))
        .with_streaks(StreakTracker::with_threshold(config.streak_qualifying_secs));
    Ok(Context { store, engine, user })
}

/// The local user's id, minted and persisted on first run.
fn local_user(store: &SqliteStore) -> Result<Uuid, Box<dyn std::error::Error>> {
    if let Some(id) = store.kv_get(LOCAL_USER_KEY)? {
        return Ok(Uuid::parse_str(&id)?);
    }
    let id = Uuid::new_v4();
    store.kv_set(LOCAL_USER_KEY, &id.to_string())?;
    Ok(id)
}
