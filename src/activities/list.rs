use axum::{
    Json, debug_handler,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{AppResult, db, db::Activity};

const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub(crate) struct ListQuery {
    pub(crate) today: Option<bool>,
}

#[debug_handler]
pub(crate) async fn list_activities(
    Path(family_id): Path<Uuid>,
    Query(ListQuery { today }): Query<ListQuery>,
    State(db_pool): State<SqlitePool>,
) -> AppResult<Json<Vec<Activity>>> {
    let activities = if today.unwrap_or(false) {
        db::list_today_activities(&db_pool, family_id).await?
    } else {
        db::list_activities(&db_pool, family_id, DEFAULT_LIMIT).await?
    };

    Ok(Json(activities))
}
