mod edit;
mod list;
mod new;

use axum::{Router, routing::get, routing::put};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/families/{family_id}/activities",
            get(list::list_activities).post(new::new_activity),
        )
        .route(
            "/api/activities/{id}",
            put(edit::update_activity).delete(edit::delete_activity),
        )
}
