pub mod inbound;
pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub use inbound::inbound_message_handler;
pub use middleware::require_admin;
pub use state::AppState;

/// Builds the application router: the public webhook and health check, plus the
/// admin query surface behind the bearer token.
pub fn router(app_state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/webhook/messages", post(inbound_message_handler))
        .route("/health", get(rest::health_handler));

    let admin_routes = Router::new()
        .route("/api/users", get(rest::list_users_handler))
        .route("/api/users/state/{state}", get(rest::list_users_by_state_handler))
        .route("/api/users/{chat_id}", delete(rest::delete_user_handler))
        .route("/api/registrations/completed", get(rest::list_completed_handler))
        .route("/api/stats", get(rest::stats_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_admin,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::LogDispatcher;
    use crate::config::Config;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use lead_bot_core::{
        DialogueEngine, MemorySessionStore, RegistrationError, RegistrationGrant,
        RegistrationService, SessionStore,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    struct AlwaysGrants;

    #[async_trait]
    impl RegistrationService for AlwaysGrants {
        async fn register(&self, _full_name: &str, _email: &str) -> Result<RegistrationGrant, RegistrationError> {
            Ok(RegistrationGrant {
                login_url: Some("https://login.example/once".to_string()),
                confirmation_text: "Account created".to_string(),
            })
        }
    }

    fn test_config() -> Config {
        Config::from_lookup(|key| match key {
            "ADMIN_TOKEN" => Some(TOKEN.to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn test_app() -> (Router, Arc<dyn SessionStore>) {
        let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
        let engine = DialogueEngine::new(store.clone(), Arc::new(AlwaysGrants), Arc::new(LogDispatcher));
        let state = Arc::new(AppState::new(Arc::new(engine), Arc::new(test_config())));
        (router(state), store)
    }

    fn inbound(from: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/webhook/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "from": from, "body": body }).to_string()))
            .unwrap()
    }

    fn admin(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn webhook_walks_the_dialogue_to_completion() {
        let (app, store) = test_app();
        let from = "391234@c.us";

        let steps = [
            ("ciao", "awaiting_confirmation"),
            ("sì", "awaiting_name"),
            ("Maria Rossi", "awaiting_email"),
            ("maria@example.com", "completed"),
        ];
        for (body, expected) in steps {
            let response = app.clone().oneshot(inbound(from, body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let json = json_body(response).await;
            assert_eq!(json["state"], expected, "after {body:?}");
        }

        let session = store.get(from).await.unwrap().unwrap();
        assert!(session.registration_complete);
        assert_eq!(session.email.as_deref(), Some("maria@example.com"));
    }

    #[tokio::test]
    async fn webhook_returns_the_login_link_reply() {
        let (app, _) = test_app();
        let from = "395555@c.us";
        for body in ["ciao", "si", "Luca Bianchi"] {
            app.clone().oneshot(inbound(from, body)).await.unwrap();
        }

        let response = app.oneshot(inbound(from, "luca@example.com")).await.unwrap();
        let json = json_body(response).await;
        let replies = json["replies"].as_array().unwrap();
        assert!(replies
            .iter()
            .any(|r| r["kind"] == "login_link" && r["url"] == "https://login.example/once"));
    }

    #[tokio::test]
    async fn webhook_reads_camel_case_display_name() {
        let (app, store) = test_app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhook/messages")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "from": "391234@c.us", "body": "ciao", "displayName": "Maria" }).to_string(),
            ))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let session = store.get("391234@c.us").await.unwrap().unwrap();
        assert_eq!(session.display_name.as_deref(), Some("Maria"));
    }

    #[tokio::test]
    async fn webhook_ignores_status_broadcast() {
        let (app, store) = test_app();
        let response = app.oneshot(inbound("status@broadcast", "hi")).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn admin_routes_require_the_bearer_token() {
        let (app, _) = test_app();

        let anonymous = Request::builder().uri("/api/users").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let wrong = Request::builder()
            .uri("/api/stats")
            .header(header::AUTHORIZATION, "Bearer nope")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let padded = Request::builder()
            .uri("/api/stats")
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN} "))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(padded).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app.oneshot(admin(Method::GET, "/api/users")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn list_users_strips_the_channel_suffix() {
        let (app, store) = test_app();
        store.create("391234@c.us", Some("Maria")).await.unwrap();

        let response = app.oneshot(admin(Method::GET, "/api/users")).await.unwrap();
        let json = json_body(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["totalUsers"], 1);
        assert_eq!(json["users"][0]["chatId"], "391234");
        assert_eq!(json["users"][0]["displayName"], "Maria");
        assert_eq!(json["users"][0]["state"], "welcome");
    }

    #[tokio::test]
    async fn list_by_state_rejects_unknown_states() {
        let (app, store) = test_app();
        store.create("391234@c.us", None).await.unwrap();

        let response = app
            .clone()
            .oneshot(admin(Method::GET, "/api/users/state/dancing"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);

        let response = app
            .oneshot(admin(Method::GET, "/api/users/state/welcome"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["totalUsers"], 1);
    }

    #[tokio::test]
    async fn stats_and_completed_reflect_finished_registrations() {
        let (app, _) = test_app();
        for body in ["ciao", "sì", "Maria Rossi", "maria@example.com"] {
            app.clone().oneshot(inbound("391234@c.us", body)).await.unwrap();
        }
        app.clone().oneshot(inbound("397777@c.us", "ciao")).await.unwrap();

        let response = app.clone().oneshot(admin(Method::GET, "/api/stats")).await.unwrap();
        let stats = &json_body(response).await["stats"];
        assert_eq!(stats["totalUsers"], 2);
        assert_eq!(stats["completedRegistrations"], 1);
        assert_eq!(stats["pendingRegistrations"], 1);

        let response = app
            .oneshot(admin(Method::GET, "/api/registrations/completed"))
            .await
            .unwrap();
        let json = json_body(response).await;
        assert_eq!(json["totalRegistrations"], 1);
        assert_eq!(json["registrations"][0]["email"], "maria@example.com");
    }

    #[tokio::test]
    async fn delete_accepts_identifiers_without_suffix() {
        let (app, store) = test_app();
        store.create("391234@c.us", None).await.unwrap();

        let response = app
            .clone()
            .oneshot(admin(Method::DELETE, "/api/users/391234"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(store.get("391234@c.us").await.unwrap().is_none());

        let response = app
            .oneshot(admin(Method::DELETE, "/api/users/391234"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn health_reports_the_storage_backend() {
        let (app, _) = test_app();
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["storage"], "memory");
    }
}
