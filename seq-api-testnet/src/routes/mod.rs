//! Router of the mock server.
//!
//! `GET /api` is public and hands out a session cookie. Everything else needs
//! either the configured API key or that cookie.
use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use seq_api::API_KEY_HEADER;
use tower_cookies::{CookieManagerLayer, Cookies};
use tower_http::trace::TraceLayer;

use crate::http_error::{HttpError, HttpResult};
use crate::state::{AppState, SESSION_COOKIE};

pub(crate) mod data;
mod events;
mod root;
mod stream;

pub(crate) use root::PRODUCT;

pub(crate) fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/api/events/resources", get(events::resources))
        .route("/api/events", get(events::list))
        .route("/api/events/stream", get(stream::upgrade))
        .route(
            "/api/events/{id}",
            get(events::item).delete(events::remove),
        )
        .route("/api/data/resources", get(data::resources))
        .route("/api/data", get(data::query))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .route("/api", get(root::root))
        .layer(middleware::from_fn_with_state(state.clone(), count_hits))
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn count_hits(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.record_hit(request.uri().path());
    next.run(request).await
}

async fn require_auth(
    State(state): State<AppState>,
    cookies: Cookies,
    request: Request,
    next: Next,
) -> HttpResult<Response> {
    if is_authorized(&state, &cookies, &request) {
        Ok(next.run(request).await)
    } else {
        Err(HttpError::unauthorized())
    }
}

fn is_authorized(state: &AppState, cookies: &Cookies, request: &Request) -> bool {
    let Some(expected) = state.config.api_key.as_deref() else {
        return true;
    };
    let key_matches = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|key| key == expected);
    let session_matches = cookies
        .get(SESSION_COOKIE)
        .is_some_and(|cookie| cookie.value() == &*state.session);
    key_matches || session_matches
}
