use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    handlers::{
        events::{events_sse, typing_indicator},
        groups::{add_user_to_group, create_group, get_group},
        health::livez,
        messages::{list_messages, send_message},
        queries::query_pattern,
        users::{create_user_account, get_user, groups_created_by_user, groups_user_belongs_to},
    },
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState, request_timeout: Duration) -> Router {
    // CORS configuration for API endpoints
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    // API routes with CORS
    let api_routes = Router::new()
        // User routes
        .route("/users", post(create_user_account))
        .route("/users/{user_id}", get(get_user))
        .route("/users/{user_id}/groups", get(groups_user_belongs_to))
        .route("/users/{user_id}/groups/created", get(groups_created_by_user))
        // Group routes
        .route("/groups", post(create_group))
        .route("/groups/{group_id}", get(get_group))
        .route("/groups/{group_id}/members", post(add_user_to_group))
        .route(
            "/groups/{group_id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/groups/{group_id}/typing", post(typing_indicator))
        .route("/groups/{group_id}/events", get(events_sse))
        // Raw access patterns
        .route("/query/{pattern}/{id}", get(query_pattern))
        .layer(cors);

    // Main application router
    Router::new()
        .route("/livez", get(livez))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        create_app(AppState::default(), Duration::from_secs(10))
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn create_group(app: &Router, creator_id: &str, name: &str) -> String {
        let response = app
            .clone()
            .oneshot(post_json(
                "/api/groups",
                serde_json::json!({ "creatorId": creator_id, "name": name }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_livez() {
        let response = app().oneshot(get_request("/livez")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/users",
                serde_json::json!({
                    "id": "U1",
                    "username": "ana",
                    "email": "ana@example.com"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app.clone().oneshot(get_request("/api/users/U1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let user = body_json(response).await;
        assert_eq!(user["username"], "ana");
        assert_eq!(user["email"], "ana@example.com");

        // Same id again
        let response = app
            .oneshot(post_json(
                "/api/users",
                serde_json::json!({
                    "id": "U1",
                    "username": "other",
                    "email": "other@example.com"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["kind"], "ConflictError");
    }

    #[tokio::test]
    async fn test_invalid_user_is_bad_request() {
        let response = app()
            .oneshot(post_json(
                "/api/users",
                serde_json::json!({
                    "id": "U1",
                    "username": "ana",
                    "email": "not-an-email"
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["kind"], "ValidationError");
    }

    #[tokio::test]
    async fn test_get_nonexistent_group() {
        let response = app()
            .oneshot(get_request("/api/groups/missing"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "Group not found: missing");
    }

    #[tokio::test]
    async fn test_group_chat_flow() {
        let app = app();
        let group_id = create_group(&app, "U1", "Team").await;

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/groups/{group_id}/members"),
                serde_json::json!({ "userId": "U2" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/groups/{group_id}/messages"),
                serde_json::json!({ "senderId": "U2", "text": "hi" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(get_request(&format!("/api/groups/{group_id}/messages")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
        assert_eq!(page["items"][0]["senderId"], "U2");
        assert_eq!(page["items"][0]["text"], "hi");
        assert!(page["cursor"].is_null());

        let response = app
            .clone()
            .oneshot(get_request("/api/users/U2/groups"))
            .await
            .unwrap();
        let page = body_json(response).await;
        assert_eq!(page["items"][0]["groupId"], group_id.as_str());
        assert_eq!(page["items"][0]["role"], "member");
        assert_eq!(page["items"][0]["group"]["name"], "Team");

        let response = app
            .oneshot(post_json(
                &format!("/api/groups/{group_id}/members"),
                serde_json::json!({ "userId": "U2" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_groups_created_by_user_pages() {
        let app = app();
        for name in ["One", "Two", "Three"] {
            create_group(&app, "U1", name).await;
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        let response = app
            .clone()
            .oneshot(get_request("/api/users/U1/groups/created?limit=2"))
            .await
            .unwrap();
        let first = body_json(response).await;
        assert_eq!(first["items"].as_array().unwrap().len(), 2);
        assert_eq!(first["items"][0]["name"], "One");
        let cursor = first["cursor"].as_str().unwrap().to_string();

        let response = app
            .oneshot(get_request(&format!(
                "/api/users/U1/groups/created?limit=2&cursor={cursor}"
            )))
            .await
            .unwrap();
        let second = body_json(response).await;
        assert_eq!(second["items"].as_array().unwrap().len(), 1);
        assert_eq!(second["items"][0]["name"], "Three");
        assert!(second["cursor"].is_null());
    }

    #[tokio::test]
    async fn test_bad_cursor_is_bad_request() {
        let response = app()
            .oneshot(get_request("/api/users/U1/groups/created?cursor=garbage"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_typing_indicator() {
        let app = app();
        let group_id = create_group(&app, "U1", "Team").await;

        let response = app
            .oneshot(post_json(
                &format!("/api/groups/{group_id}/typing"),
                serde_json::json!({ "userId": "U1" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let event = body_json(response).await;
        assert_eq!(event["type"], "typing");
        assert_eq!(event["typing"], true);
    }

    #[tokio::test]
    async fn test_events_for_missing_group() {
        let response = app()
            .oneshot(get_request("/api/groups/missing/events"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_query_pattern() {
        let app = app();
        let group_id = create_group(&app, "U1", "Team").await;

        let response = app
            .clone()
            .oneshot(get_request("/api/query/groupsCreatedByUser/U1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["items"][0]["id"]["S"], group_id.as_str());

        let response = app
            .oneshot(get_request("/api/query/allGroups/U1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
