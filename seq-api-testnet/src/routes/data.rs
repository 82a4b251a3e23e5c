use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use seq_api::{LinkTable, QueryResult, ResourceGroup};
use serde_json::Value;

use crate::http_error::{HttpError, HttpResult};
use crate::state::AppState;

/// The only query the mock evaluates.
pub const COUNT_QUERY: &str = "select count(*) from stream";

pub async fn resources() -> Json<ResourceGroup> {
    Json(ResourceGroup {
        links: LinkTable::new().with(
            "Query",
            "api/data{?q,rangeStartUtc,rangeEndUtc,signal,timeoutMS,format}",
        ),
    })
}

pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> HttpResult<Response> {
    let q = required(&params, "q")?;
    required(&params, "rangeStartUtc")?;

    if !is_count_query(q) {
        return Ok(Json(QueryResult::Error {
            error: "Unsupported query".to_string(),
            reasons: vec![format!("Only `{COUNT_QUERY}` can be evaluated here")],
            suggestion: Some(COUNT_QUERY.to_string()),
        })
        .into_response());
    }

    let count = state.store().len();
    if params.get("format").is_some_and(|f| f == "text/csv") {
        let csv = format!("\"count\"\r\n{count}\r\n");
        return Ok(([(header::CONTENT_TYPE, "text/csv")], csv).into_response());
    }

    Ok(Json(QueryResult::Table {
        columns: vec!["count".to_string()],
        rows: vec![vec![Value::from(count)]],
    })
    .into_response())
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> HttpResult<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| HttpError::bad_request(format!("The `{name}` parameter is required")))
}

fn is_count_query(q: &str) -> bool {
    q.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .eq_ignore_ascii_case(COUNT_QUERY)
}
