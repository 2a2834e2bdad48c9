mod join;
mod new;

use axum::{Router, routing::post};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/family", post(new::new_family))
        .route("/api/family/join", post(join::join_family))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, extract::State, http::StatusCode};

    use crate::db::tests::test_pool;

    #[tokio::test]
    async fn create_then_join_returns_the_same_family() {
        let pool = test_pool().await;

        let (status, Json(family)) = new::new_family(
            State(pool.clone()),
            Json(new::NewFamilyBody {
                baby_name: Some("Nursery".to_owned()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(family.baby_name, "Nursery");

        let Json(joined) = join::join_family(
            State(pool),
            Json(join::JoinFamilyBody {
                code: family.code.clone(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(joined.id, family.id);
    }

    #[tokio::test]
    async fn default_baby_name_is_baby() {
        let pool = test_pool().await;

        let (_, Json(family)) =
            new::new_family(State(pool), Json(new::NewFamilyBody { baby_name: None }))
                .await
                .unwrap();
        assert_eq!(family.baby_name, "Baby");
    }

    #[tokio::test]
    async fn joining_an_unknown_code_is_404() {
        let pool = test_pool().await;

        let err = join::join_family(
            State(pool),
            Json(join::JoinFamilyBody {
                code: "NOPE".to_owned(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
