//! In-process WebSocket peer for stream tests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_tungstenite::WebSocketStream;

use crate::LinkTable;

/// Links pointing at the path every [`serve_once`] peer accepts.
pub(crate) fn stream_links() -> LinkTable {
    LinkTable::new().with("Stream", "api/events/stream")
}

/// A peer that accepts one WebSocket and runs a script against it.
pub(crate) struct TestPeer {
    addr: SocketAddr,
    headers: Arc<Mutex<HeaderMap>>,
    task: JoinHandle<()>,
}

impl TestPeer {
    pub(crate) fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Headers of the accepted handshake request.
    pub(crate) fn handshake_headers(&self) -> HeaderMap {
        self.headers.lock().unwrap().clone()
    }

    /// Wait for the script to return.
    pub(crate) async fn finished(self) {
        tokio::time::timeout(Duration::from_secs(5), self.task)
            .await
            .expect("peer script timed out")
            .expect("peer script panicked");
    }
}

pub(crate) async fn serve_once<F, Fut>(script: F) -> TestPeer
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let headers = Arc::new(Mutex::new(HeaderMap::new()));

    let captured = Arc::clone(&headers);
    let task = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_hdr_async(tcp, |request: &Request, response: Response| {
            *captured.lock().unwrap() = request.headers().clone();
            Ok(response)
        })
        .await
        .unwrap();
        script(ws).await;
    });

    TestPeer {
        addr,
        headers,
        task,
    }
}
