pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::agent::handlers as agent;
use crate::applications::handlers as applications;
use crate::auth::handlers as auth;
use crate::resumes::handlers as resumes;
use crate::state::AppState;
use crate::vector::handlers as vector;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .nest("/api", api_router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        // Accounts
        .route("/auth/register", post(auth::handle_register))
        .route("/auth/login", post(auth::handle_login))
        .route(
            "/auth/me",
            get(auth::handle_get_me)
                .put(auth::handle_update_me)
                .delete(auth::handle_delete_me),
        )
        .route("/auth/users", get(auth::handle_list_users))
        // Question answering
        .route(
            "/agents/answer_question",
            post(agent::handle_answer_question),
        )
        // Resumes (structured)
        .route(
            "/resumes",
            post(resumes::handle_create_resume).get(resumes::handle_list_resumes),
        )
        .route(
            "/resumes/:id",
            get(resumes::handle_get_resume)
                .put(resumes::handle_update_resume)
                .delete(resumes::handle_delete_resume),
        )
        // Resumes (documents)
        .route(
            "/resumes/upload",
            post(vector::handle_upload_resume)
                .layer(DefaultBodyLimit::max(vector::MAX_UPLOAD_BYTES)),
        )
        .route("/resumes/search", get(vector::handle_search_resume))
        // Applications
        .route(
            "/applications/extract",
            post(applications::handle_extract_application),
        )
        .route("/applications", get(applications::handle_list_applications))
        .route(
            "/applications/:id",
            get(applications::handle_get_application)
                .patch(applications::handle_update_application)
                .delete(applications::handle_delete_application),
        )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn test_health_needs_no_state() {
        let app: Router = Router::new().route("/health", get(health::health_handler));
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
