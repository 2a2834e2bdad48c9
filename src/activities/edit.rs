use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    AppError, AppResult, db,
    db::Activity,
    sync::{self, Action, RoomRegistry},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UpdateActivityBody {
    pub(crate) data: Option<serde_json::Value>,
    pub(crate) ended_at: Option<i64>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn update_activity(
    Path(id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
    Json(UpdateActivityBody { data, ended_at }): Json<UpdateActivityBody>,
) -> AppResult<Json<Activity>> {
    db::update_activity(&db_pool, id, data.as_ref(), ended_at).await?;

    let Some(activity) = db::get_activity(&db_pool, id).await? else {
        return Err(AppError::not_found("Activity"));
    };

    sync::publish(&registry, Action::Update, &activity)?;

    Ok(Json(activity))
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn delete_activity(
    Path(id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
) -> AppResult<Json<serde_json::Value>> {
    let Some(activity) = db::get_activity(&db_pool, id).await? else {
        return Err(AppError::not_found("Activity"));
    };

    db::delete_activity(&db_pool, id).await?;
    sync::publish(&registry, Action::Delete, &activity)?;

    Ok(Json(serde_json::json!({ "success": true })))
}
