mod envelope;
mod registry;
mod ws;

pub use envelope::{Action, Envelope};
pub use registry::{ConnectionTx, RoomRegistry};
pub use ws::handle_inbound;

use axum::{Router, routing::get};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppResult, AppState, db, db::Activity};

/// Most recent records carried by the initial snapshot. Deeper history goes
/// through the list endpoint instead.
pub const SNAPSHOT_LIMIT: u32 = 100;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::family_ws))
}

/// Builds the full-replace snapshot pushed to a freshly opened connection,
/// newest first.
pub async fn snapshot(db_pool: &SqlitePool, family_id: Uuid) -> anyhow::Result<Envelope> {
    let activities = db::list_activities(db_pool, family_id, SNAPSHOT_LIMIT).await?;
    Ok(Envelope::sync(activities))
}

/// Fans a committed write out to every live connection of the owning family.
/// Callers persist first; a family with no live viewers is a silent no-op.
pub fn publish(registry: &RoomRegistry, action: Action, activity: &Activity) -> AppResult<()> {
    let frame = Envelope::activity(action, activity.clone(), None).encode()?;
    registry.broadcast(activity.family_id, &frame, None);
    Ok(())
}
