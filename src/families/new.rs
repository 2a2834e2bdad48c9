use axum::{Json, debug_handler, extract::State, http::StatusCode};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{AppResult, db, db::Family};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewFamilyBody {
    pub(crate) baby_name: Option<String>,
}

#[debug_handler]
pub(crate) async fn new_family(
    State(db_pool): State<SqlitePool>,
    Json(NewFamilyBody { baby_name }): Json<NewFamilyBody>,
) -> AppResult<(StatusCode, Json<Family>)> {
    let family = db::create_family(&db_pool, baby_name.as_deref().unwrap_or("Baby")).await?;

    Ok((StatusCode::CREATED, Json(family)))
}
