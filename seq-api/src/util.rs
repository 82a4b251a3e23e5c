use reqwest::{Response, StatusCode};

use crate::errors::{Error, RequestError, Result};
use crate::model::ErrorPayload;
use crate::seq_log;

/// Convert non-2xx responses into a structured error carrying the server message.
///
/// Successful responses are returned as-is. Otherwise the body is consumed and
/// parsed as an [`ErrorPayload`]; when that fails (empty or non-JSON body) the
/// canonical reason phrase stands in for the message.
pub(crate) async fn check_http_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.bytes().await.unwrap_or_default();
    let message = error_message(status, &body);

    Err(Error::from(RequestError::Server { status, message }))
}

pub(crate) fn error_message(status: StatusCode, body: &[u8]) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .map_or_else(|| status.as_u16().to_string(), str::to_string)
    };

    match serde_json::from_slice::<ErrorPayload>(body) {
        Ok(ErrorPayload { error: Some(message) }) if !message.trim().is_empty() => message,
        Ok(_) => fallback(),
        Err(e) => {
            seq_log!(debug, "Ignoring unparseable error body for {}: {}", status, e);
            fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_wins_when_present() {
        let msg = error_message(StatusCode::BAD_REQUEST, br#"{"Error":"Bad filter"}"#);
        assert_eq!(msg, "Bad filter");
    }

    #[test]
    fn unparseable_bodies_fall_back_to_reason_phrase() {
        assert_eq!(
            error_message(StatusCode::SERVICE_UNAVAILABLE, b"<html>down</html>"),
            "Service Unavailable"
        );
        assert_eq!(error_message(StatusCode::NOT_FOUND, b""), "Not Found");
        assert_eq!(error_message(StatusCode::NOT_FOUND, b"{}"), "Not Found");
    }

    #[test]
    fn unknown_statuses_fall_back_to_the_number() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(error_message(status, b""), "599");
    }
}
