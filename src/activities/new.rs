use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    AppResult, db,
    db::{Activity, ActivityKind},
    sync::{self, Action, RoomRegistry},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewActivityBody {
    #[serde(rename = "type")]
    pub(crate) kind: ActivityKind,
    pub(crate) data: serde_json::Value,
    pub(crate) started_at: Option<i64>,
    pub(crate) ended_at: Option<i64>,
    pub(crate) created_by: Option<Uuid>,
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn new_activity(
    Path(family_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(registry): State<Arc<RoomRegistry>>,
    Json(body): Json<NewActivityBody>,
) -> AppResult<(StatusCode, Json<Activity>)> {
    let started_at = body.started_at.unwrap_or_else(db::now_ms);

    let activity = db::create_activity(
        &db_pool,
        family_id,
        body.kind,
        body.data,
        started_at,
        body.ended_at,
        body.created_by,
    )
    .await?;

    sync::publish(&registry, Action::Create, &activity)?;

    Ok((StatusCode::CREATED, Json(activity)))
}
