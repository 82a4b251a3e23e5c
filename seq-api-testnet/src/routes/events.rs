use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use seq_api::{EventEntity, LinkTable, ResourceGroup};

use crate::http_error::{HttpError, HttpResult};
use crate::state::AppState;

const DEFAULT_COUNT: usize = 30;

pub async fn resources() -> Json<ResourceGroup> {
    Json(ResourceGroup {
        links: LinkTable::new()
            .with(
                "Items",
                "api/events{?count,filter,fromDateUtc,toDateUtc,afterId,render}",
            )
            .with("Item", "api/events/{id}{?render}")
            .with("Stream", "api/events/stream{?filter,render}"),
    })
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> HttpResult<Json<Vec<EventEntity>>> {
    let count = match params.get("count") {
        Some(count) => count
            .parse::<usize>()
            .map_err(|_invalid| HttpError::bad_request("`count` must be a positive integer"))?,
        None => DEFAULT_COUNT,
    };
    let filter = LevelFilter::parse(params.get("filter").map(String::as_str))?;
    let render = wants_rendering(&params);

    let store = state.store();
    let mut newest: Vec<&EventEntity> = store.newest().collect();
    if let Some(after) = params.get("afterId") {
        let start = newest
            .iter()
            .position(|event| event.id.as_deref() == Some(after.as_str()))
            .map_or(newest.len(), |index| index + 1);
        newest.drain(..start);
    }
    let events = newest
        .into_iter()
        .filter(|event| filter.matches(event))
        .take(count)
        .map(|event| present(event, render))
        .collect();

    Ok(Json(events))
}

pub async fn item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> HttpResult<Json<EventEntity>> {
    let store = state.store();
    let event = store.get(&id).ok_or_else(|| HttpError::not_found("Event"))?;
    Ok(Json(present(event, wants_rendering(&params))))
}

pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> HttpResult<StatusCode> {
    if state.store().remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HttpError::not_found("Event"))
    }
}

pub(crate) fn wants_rendering(params: &HashMap<String, String>) -> bool {
    params.get("render").is_some_and(|value| value == "true")
}

/// The event as the API returns it: the rendered message only on request.
pub(crate) fn present(event: &EventEntity, render: bool) -> EventEntity {
    let mut event = event.clone();
    if !render {
        event.rendered_message = None;
    }
    event
}

/// The one filter shape the mock understands: `@Level = '<level>'`.
#[derive(Debug, Clone, Default)]
pub(crate) struct LevelFilter(Option<String>);

impl LevelFilter {
    pub fn parse(filter: Option<&str>) -> HttpResult<Self> {
        let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) else {
            return Ok(Self(None));
        };
        filter
            .strip_prefix("@Level")
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::trim)
            .and_then(|rest| rest.strip_prefix('\''))
            .and_then(|rest| rest.strip_suffix('\''))
            .map(|level| Self(Some(level.to_string())))
            .ok_or_else(|| HttpError::bad_request(format!("Syntax error in filter `{filter}`")))
    }

    pub fn matches(&self, event: &EventEntity) -> bool {
        match &self.0 {
            None => true,
            Some(level) => event
                .level
                .as_deref()
                .is_some_and(|l| l.eq_ignore_ascii_case(level)),
        }
    }
}
