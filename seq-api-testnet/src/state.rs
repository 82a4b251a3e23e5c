use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use seq_api::EventEntity;
use tokio::sync::{broadcast, watch};

/// Name of the session cookie handed out by the root endpoint.
pub const SESSION_COOKIE: &str = "Seq-Session";

const STREAM_BUFFER: usize = 256;

#[derive(Debug, Clone, Default)]
pub(crate) struct Config {
    pub api_key: Option<String>,
    pub startup_failures: u32,
    pub instance_name: Option<String>,
}

/// Instructions fanned out to every connected stream socket.
#[derive(Debug, Clone)]
pub(crate) enum StreamCommand {
    /// A stored event; each socket applies its own filter.
    Event(Box<EventEntity>),
    /// Text sent verbatim, whatever it contains.
    Raw(String),
    /// Close every socket with this code and reason.
    Close { code: u16, reason: String },
}

#[derive(Debug, Default)]
pub(crate) struct EventStore {
    next_id: u64,
    /// Oldest first.
    events: Vec<EventEntity>,
}

impl EventStore {
    pub fn insert(&mut self, mut event: EventEntity) -> EventEntity {
        self.next_id += 1;
        let id = format!("event-{}", self.next_id);
        event
            .links
            .insert("Self", format!("api/events/{id}"));
        event.links.insert("Group", "api/events/resources");
        event.id = Some(id);
        self.events.push(event.clone());
        event
    }

    pub fn get(&self, id: &str) -> Option<&EventEntity> {
        self.events.iter().find(|e| e.id.as_deref() == Some(id))
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id.as_deref() != Some(id));
        before != self.events.len()
    }

    /// Newest first.
    pub fn newest(&self) -> impl Iterator<Item = &EventEntity> {
        self.events.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<str>,
    pub store: Arc<Mutex<EventStore>>,
    pub hits: Arc<Mutex<HashMap<String, usize>>>,
    pub root_requests: Arc<AtomicU32>,
    pub stream: broadcast::Sender<StreamCommand>,
    pub clients: Arc<watch::Sender<usize>>,
    pub received: Arc<Mutex<Vec<String>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let (stream, _) = broadcast::channel(STREAM_BUFFER);
        let (clients, _) = watch::channel(0);
        Self {
            config: Arc::new(config),
            session: Arc::from(format!("session-{}", std::process::id())),
            store: Arc::default(),
            hits: Arc::default(),
            root_requests: Arc::default(),
            stream,
            clients: Arc::new(clients),
            received: Arc::default(),
        }
    }

    pub fn store(&self) -> MutexGuard<'_, EventStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_hit(&self, path: &str) {
        let mut hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *hits.entry(path.to_string()).or_default() += 1;
    }

    pub fn hits(&self, path: &str) -> usize {
        let hits = self.hits.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        hits.get(path).copied().unwrap_or_default()
    }

    /// Returns the 1-based number of this root request.
    pub fn next_root_request(&self) -> u32 {
        self.root_requests.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn record_client_message(&self, text: String) {
        self.received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(text);
    }

    pub fn client_messages(&self) -> Vec<String> {
        self.received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn publish(&self, command: StreamCommand) {
        if self.stream.send(command).is_err() {
            tracing::debug!("No stream sockets connected, dropping stream command");
        }
    }
}
