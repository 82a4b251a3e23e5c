use std::collections::HashMap;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;

use super::events::{present, wants_rendering, LevelFilter};
use crate::http_error::HttpResult;
use crate::state::{AppState, StreamCommand};

pub async fn upgrade(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> HttpResult<Response> {
    let filter = LevelFilter::parse(params.get("filter").map(String::as_str))?;
    let render = wants_rendering(&params);
    Ok(ws.on_upgrade(move |socket| serve_socket(socket, state, filter, render)))
}

async fn serve_socket(mut socket: WebSocket, state: AppState, filter: LevelFilter, render: bool) {
    // Subscribe before announcing the client, so nothing published after
    // `wait_for_stream_clients` returns can be missed.
    let mut commands = state.stream.subscribe();
    state.clients.send_modify(|count| *count += 1);
    tracing::debug!("Stream socket connected");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let outgoing = match command {
                    Ok(StreamCommand::Event(event)) if filter.matches(&event) => {
                        match serde_json::to_string(&present(&event, render)) {
                            Ok(json) => Message::Text(json.into()),
                            Err(error) => {
                                tracing::error!(?error, "Failed to serialize event");
                                continue;
                            }
                        }
                    }
                    Ok(StreamCommand::Event(_)) => continue,
                    Ok(StreamCommand::Raw(text)) => Message::Text(text.into()),
                    Ok(StreamCommand::Close { code, reason }) => {
                        let frame = CloseFrame { code, reason: reason.into() };
                        if let Err(error) = socket.send(Message::Close(Some(frame))).await {
                            tracing::debug!(?error, "Close frame not delivered");
                        }
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Stream socket lagged behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if socket.send(outgoing).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => state.record_client_message(text.to_string()),
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.clients.send_modify(|count| *count = count.saturating_sub(1));
    tracing::debug!("Stream socket closed");
}
