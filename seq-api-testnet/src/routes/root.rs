use axum::{extract::State, Json};
use seq_api::{group_link_name, LinkTable, RootEntity};
use tower_cookies::{Cookie, Cookies};

use crate::http_error::{HttpError, HttpResult};
use crate::state::{AppState, SESSION_COOKIE};

pub const PRODUCT: &str = "Seq (mock)";

pub async fn root(State(state): State<AppState>, cookies: Cookies) -> HttpResult<Json<RootEntity>> {
    let request = state.next_root_request();
    if request <= state.config.startup_failures {
        tracing::debug!(request, "Reporting startup in progress");
        return Err(HttpError::starting_up());
    }

    let mut cookie = Cookie::new(SESSION_COOKIE, state.session.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.add(cookie);

    let links = LinkTable::new()
        .with(group_link_name("Events"), "api/events/resources")
        .with(group_link_name("Data"), "api/data/resources");

    Ok(Json(RootEntity {
        product: Some(PRODUCT.to_string()),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
        instance_name: state.config.instance_name.clone(),
        links,
    }))
}
