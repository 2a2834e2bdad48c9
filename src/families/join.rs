use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::{AppError, AppResult, db, db::Family};

#[derive(Debug, Deserialize)]
pub(crate) struct JoinFamilyBody {
    pub(crate) code: String,
}

#[debug_handler]
pub(crate) async fn join_family(
    State(db_pool): State<SqlitePool>,
    Json(JoinFamilyBody { code }): Json<JoinFamilyBody>,
) -> AppResult<Json<Family>> {
    db::family_by_code(&db_pool, &code)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Family"))
}
