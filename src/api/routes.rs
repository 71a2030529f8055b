//! Router assembly
//!
//! Public routes (profile lookup, group search/details, register/login) sit
//! outside the auth layer; everything under `/api/v1` runs through the
//! bearer-token middleware. Local uploads are served as static files.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::api::middleware::auth_middleware;
use crate::api::ApiState;
use crate::config::CorsConfig;

pub fn build_router(state: ApiState) -> Router {
    let authed = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/users/me", get(handlers::users::get_me).put(handlers::users::update_me))
        .route("/users/search", get(handlers::users::search))
        .route("/friends", get(handlers::friends::list_friends))
        .route("/conversations", get(handlers::conversations::list))
        .route(
            "/conversations/private",
            post(handlers::conversations::create_or_get_private),
        )
        .route(
            "/conversations/{conversationId}/messages",
            get(handlers::conversations::messages),
        )
        .route("/groups", post(handlers::groups::create))
        .route("/groups/mine", get(handlers::groups::my_groups))
        .route("/groups/{groupId}/join", post(handlers::groups::join))
        .route("/groups/{groupId}/leave", post(handlers::groups::leave))
        .route("/groups/{groupId}/members", get(handlers::groups::members))
        .route(
            "/groups/{groupId}/members/{userId}/role",
            put(handlers::groups::update_member_role),
        )
        .route(
            "/groups/{groupId}/fix-participants",
            post(handlers::groups::fix_participants),
        )
        .route(
            "/upload",
            post(handlers::upload::upload).layer(DefaultBodyLimit::max(
                state.config.storage.max_file_size_bytes() as usize + 1024 * 1024,
            )),
        )
        .route("/friend-requests", post(handlers::friends::send))
        .route("/friend-requests/pending", get(handlers::friends::list_pending))
        .route(
            "/friend-requests/{requestId}/accept",
            post(handlers::friends::accept),
        )
        .route(
            "/friend-requests/{requestId}/reject",
            post(handlers::friends::reject),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut router = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/users/{userId}", get(handlers::users::get_profile))
        .route("/groups/search", get(handlers::groups::search))
        .route("/groups/{groupId}", get(handlers::groups::get_details))
        .nest("/api/v1", authed);

    // Serve local uploads so the URLs handed out by the blob store resolve.
    if state.config.storage.storage_type == "local" {
        router = router.nest_service(
            "/uploads",
            ServeDir::new(state.config.storage.local_path.clone()),
        );
    }

    router
        .layer(cors_layer(&state.config.api_server.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = cfg
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    let methods: Vec<Method> = cfg
        .allowed_methods
        .iter()
        .filter_map(|method| method.parse().ok())
        .collect();
    let allowed_headers: Vec<HeaderName> = cfg
        .allowed_headers
        .iter()
        .filter_map(|header| header.parse().ok())
        .collect();
    let exposed_headers: Vec<HeaderName> = cfg
        .exposed_headers
        .iter()
        .filter_map(|header| header.parse().ok())
        .collect();

    let mut layer = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(allowed_headers)
        .expose_headers(exposed_headers)
        .max_age(Duration::from_secs(cfg.max_age));
    if cfg.allow_credentials {
        layer = layer.allow_credentials(true);
    }
    layer
}
