//! Multi-subscriber broadcast over one WebSocket.
//!
//! ## Lifecycle
//! `Created` (socket open, nothing read) → `Running` (first subscriber
//! spawned the receive loop) → `Ended` (peer closed, or the loop stopped).
//! `Disposed` is reachable from any state and is terminal.
//!
//! ## Delivery
//! Values go to a snapshot of the subscriber list taken per value. The list
//! is copy-on-write ([`ArcSwap`]) and only mutated under the lifecycle lock,
//! which is never held while observers run. Observer failures, returned or
//! panicked, are collected per value into one [`StreamError::Delivery`]
//! that is logged and retained for [`ObservableStream::take_delivery_errors`].
//! The receive loop keeps running regardless.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_util::sync::CancellationToken;

use super::socket::{Inbound, Socket};
use super::MessageDecoder;
use crate::errors::{BoxError, Error, Result, StreamError};
use crate::seq_log;

/// Retained aggregate failures; older ones are dropped first.
const MAX_RETAINED_FAILURES: usize = 128;

/// Receives the values of an [`ObservableStream`].
///
/// Closures `Fn(&T) -> Result<(), BoxError>` are observers too; they ignore
/// termination.
pub trait Observer<T>: Send + Sync {
    /// Called once per value, in arrival order.
    fn on_next(&self, value: &T) -> std::result::Result<(), BoxError>;

    /// Called at most once, when the peer closed abnormally or the socket failed.
    fn on_error(&self, _error: &Error) {}

    /// Called at most once, when the stream ended normally or was disposed.
    fn on_completed(&self) {}
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync,
{
    fn on_next(&self, value: &T) -> std::result::Result<(), BoxError> {
        self(value)
    }
}

/// Where an [`ObservableStream`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Connected; no subscriber yet, so nothing has been read.
    Created,
    /// The receive loop is delivering values.
    Running,
    /// The peer closed the stream or the loop stopped.
    Ended,
    /// [`ObservableStream::dispose`] was called.
    Disposed,
}

struct Entry<T> {
    id: u64,
    observer: Arc<dyn Observer<T>>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            observer: Arc::clone(&self.observer),
        }
    }
}

struct Lifecycle {
    state: StreamState,
    reader: Option<SplitStream<Socket>>,
    task: Option<JoinHandle<()>>,
}

struct Shared<T> {
    subscribers: ArcSwap<Vec<Entry<T>>>,
    lifecycle: Mutex<Lifecycle>,
    next_id: AtomicU64,
    failures: Mutex<VecDeque<StreamError>>,
}

impl<T> Shared<T> {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, value: &T) {
        let snapshot = self.subscribers.load_full();
        let mut failures = Vec::new();

        for entry in snapshot.iter() {
            match catch_unwind(AssertUnwindSafe(|| entry.observer.on_next(value))) {
                Ok(Ok(())) => {}
                Ok(Err(error)) => failures.push(error),
                Err(payload) => failures.push(panic_error(&*payload)),
            }
        }

        if !failures.is_empty() {
            self.record(StreamError::Delivery { failures });
        }
    }

    fn record(&self, failure: StreamError) {
        seq_log!(warn, "Stream delivery failed: {}", failure);
        let mut retained = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if retained.len() == MAX_RETAINED_FAILURES {
            retained.pop_front();
        }
        retained.push_back(failure);
    }

    /// Move to `Ended` (or `Disposed`) and notify the subscribers of the
    /// moment. Only the first transition out of a live state notifies.
    fn finish(&self, outcome: Option<StreamError>, dispose: bool) {
        let snapshot = {
            let mut lifecycle = self.lifecycle();
            let live = matches!(
                lifecycle.state,
                StreamState::Created | StreamState::Running
            );
            if dispose {
                lifecycle.state = StreamState::Disposed;
                lifecycle.reader = None;
            } else if live {
                lifecycle.state = StreamState::Ended;
            }
            live.then(|| self.subscribers.swap(Arc::new(Vec::new())))
        };

        let Some(snapshot) = snapshot else {
            return;
        };

        match outcome {
            None => {
                for entry in snapshot.iter() {
                    notify(|| entry.observer.on_completed());
                }
            }
            Some(failure) => {
                seq_log!(warn, "Stream ended abnormally: {}", failure);
                let error = Error::from(failure);
                for entry in snapshot.iter() {
                    notify(|| entry.observer.on_error(&error));
                }
            }
        }
    }
}

trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

impl<T: Send + 'static> Unsubscribe for Shared<T> {
    fn unsubscribe(&self, id: u64) {
        let lifecycle = self.lifecycle();
        if !matches!(
            lifecycle.state,
            StreamState::Created | StreamState::Running
        ) {
            return;
        }
        let current = self.subscribers.load_full();
        if current.iter().any(|entry| entry.id == id) {
            let remaining: Vec<Entry<T>> = current
                .iter()
                .filter(|entry| entry.id != id)
                .cloned()
                .collect();
            self.subscribers.store(Arc::new(remaining));
        }
    }
}

/// Terminal callbacks must not take the caller down with them.
fn notify<F: FnOnce()>(callback: F) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(callback)) {
        seq_log!(warn, "Observer panicked on termination: {}", panic_error(&*payload));
    }
}

fn panic_error(payload: &(dyn Any + Send)) -> BoxError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("observer panicked: {message}").into()
}

async fn receive_loop<T>(
    mut reader: SplitStream<Socket>,
    shared: Arc<Shared<T>>,
    decode: MessageDecoder<T>,
    cancel: CancellationToken,
) {
    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break None,
            next = reader.next() => next,
        };

        match next {
            None => break None,
            Some(Err(e)) => break Some(StreamError::Socket(e)),
            Some(Ok(message)) => match Inbound::from(message) {
                Inbound::Skip => {}
                Inbound::End => break None,
                Inbound::Fail(failure) => break Some(failure),
                Inbound::Payload(bytes) => match decode(&bytes) {
                    Ok(value) => shared.deliver(&value),
                    Err(e) => shared.record(StreamError::Decode(e)),
                },
            },
        }
    };

    shared.finish(outcome, false);
}

/// A WebSocket stream fanned out to any number of [`Observer`]s.
///
/// Nothing is read until the first [`Self::subscribe`]; messages that arrive
/// earlier wait in the socket. Each subscriber receives every later value in
/// arrival order, followed by exactly one terminal notification, unless it
/// unsubscribed first.
///
/// ```no_run
/// # async fn run(client: seq_api::SeqApiClient, events: seq_api::ResourceGroup) -> seq_api::Result<()> {
/// let stream = client
///     .observe::<seq_api::EventEntity, _>(&events, "Stream", None, None)
///     .await?;
/// let _subscription = stream.subscribe_fn(|event| {
///     println!("{:?}", event.rendered_message);
///     Ok(())
/// })?;
/// // ...
/// stream.dispose().await;
/// # Ok(()) }
/// ```
pub struct ObservableStream<T> {
    shared: Arc<Shared<T>>,
    decode: MessageDecoder<T>,
    writer: tokio::sync::Mutex<Option<SplitSink<Socket, Message>>>,
    cancel: CancellationToken,
    runtime: Handle,
    close_timeout: Duration,
    disposed: AtomicBool,
}

impl<T: Send + 'static> ObservableStream<T> {
    /// Must be called from within a tokio runtime; the receive loop is
    /// spawned onto it later.
    pub(crate) fn new(socket: Socket, decode: MessageDecoder<T>, close_timeout: Duration) -> Self {
        let (writer, reader) = socket.split();
        Self {
            shared: Arc::new(Shared {
                subscribers: ArcSwap::from_pointee(Vec::new()),
                lifecycle: Mutex::new(Lifecycle {
                    state: StreamState::Created,
                    reader: Some(reader),
                    task: None,
                }),
                next_id: AtomicU64::new(0),
                failures: Mutex::new(VecDeque::new()),
            }),
            decode,
            writer: tokio::sync::Mutex::new(Some(writer)),
            cancel: CancellationToken::new(),
            runtime: Handle::current(),
            close_timeout,
            disposed: AtomicBool::new(false),
        }
    }

    /// Register `observer`. The first subscription starts reading.
    ///
    /// After the stream ended, `observer` is completed immediately without
    /// touching the network. After [`Self::dispose`], fails with
    /// [`StreamError::Disposed`].
    pub fn subscribe<O>(&self, observer: O) -> Result<Subscription>
    where
        O: Observer<T> + 'static,
    {
        let observer: Arc<dyn Observer<T>> = Arc::new(observer);
        let mut lifecycle = self.shared.lifecycle();

        match lifecycle.state {
            StreamState::Disposed => return Err(StreamError::Disposed.into()),
            StreamState::Ended => {
                drop(lifecycle);
                notify(|| observer.on_completed());
                return Ok(Subscription::inert());
            }
            StreamState::Created | StreamState::Running => {}
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let mut subscribers: Vec<Entry<T>> = (**self.shared.subscribers.load()).clone();
        subscribers.push(Entry { id, observer });
        self.shared.subscribers.store(Arc::new(subscribers));

        if lifecycle.state == StreamState::Created {
            if let Some(reader) = lifecycle.reader.take() {
                lifecycle.task = Some(self.runtime.spawn(receive_loop(
                    reader,
                    Arc::clone(&self.shared),
                    Arc::clone(&self.decode),
                    self.cancel.clone(),
                )));
            }
            lifecycle.state = StreamState::Running;
        }
        drop(lifecycle);

        let stream: Weak<dyn Unsubscribe> = Arc::<Shared<T>>::downgrade(&self.shared);
        Ok(Subscription {
            stream: Some(stream),
            id,
        })
    }

    /// [`Self::subscribe`] for a plain callback.
    pub fn subscribe_fn<F>(&self, on_next: F) -> Result<Subscription>
    where
        F: Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.subscribe(on_next)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.shared.lifecycle().state
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.load().len()
    }

    /// Drain the aggregate delivery failures recorded so far, oldest first.
    pub fn take_delivery_errors(&self) -> Vec<StreamError> {
        let mut retained = self
            .shared
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        retained.drain(..).collect()
    }

    /// Close the stream. Idempotent.
    ///
    /// Sends a close frame (best effort, bounded by the client's socket close
    /// timeout), stops and joins the receive loop, completes every remaining
    /// subscriber exactly once, then releases the socket.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        {
            let mut writer = self.writer.lock().await;
            if let Some(sink) = writer.as_mut() {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: Utf8Bytes::from_static(""),
                };
                match tokio::time::timeout(self.close_timeout, sink.send(Message::Close(Some(frame))))
                    .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        seq_log!(debug, "Close frame not sent: {}", e);
                    }
                    Err(_elapsed) => {
                        seq_log!(debug, "Close frame not sent within {:?}", self.close_timeout);
                    }
                }
            }
        }

        self.cancel.cancel();
        let task = self.shared.lifecycle().task.take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                seq_log!(debug, "Receive loop did not finish cleanly: {}", e);
            }
        }

        self.shared.finish(None, true);
        self.writer.lock().await.take();
    }
}

impl<T> Drop for ObservableStream<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl<T> fmt::Debug for ObservableStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableStream")
            .field("state", &self.shared.lifecycle().state)
            .field("subscribers", &self.shared.subscribers.load().len())
            .finish_non_exhaustive()
    }
}

/// Handle for one subscription; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    stream: Option<Weak<dyn Unsubscribe>>,
    id: u64,
}

impl Subscription {
    fn inert() -> Self {
        Self {
            stream: None,
            id: 0,
        }
    }

    /// Stop receiving values. No terminal notification follows.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take().and_then(|weak| weak.upgrade()) {
            stream.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use serde::Deserialize;
    use tokio::sync::{oneshot, Notify};
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};

    use super::*;
    use crate::stream::testing::{serve_once, stream_links};
    use crate::SeqApiClient;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Tick {
        n: u32,
    }

    #[derive(Default)]
    struct Recorder {
        values: Mutex<Vec<u32>>,
        errors: Mutex<Vec<String>>,
        completed: AtomicUsize,
        terminated: Notify,
    }

    impl Recorder {
        fn values(&self) -> Vec<u32> {
            self.values.lock().unwrap().clone()
        }

        fn errors(&self) -> Vec<String> {
            self.errors.lock().unwrap().clone()
        }

        fn completed(&self) -> usize {
            self.completed.load(Ordering::SeqCst)
        }

        async fn wait_terminated(&self) {
            tokio::time::timeout(Duration::from_secs(5), self.terminated.notified())
                .await
                .expect("no terminal notification");
        }
    }

    struct Probe(Arc<Recorder>);

    impl Observer<Tick> for Probe {
        fn on_next(&self, value: &Tick) -> std::result::Result<(), BoxError> {
            self.0.values.lock().unwrap().push(value.n);
            Ok(())
        }

        fn on_error(&self, error: &Error) {
            self.0.errors.lock().unwrap().push(error.to_string());
            self.0.terminated.notify_one();
        }

        fn on_completed(&self) {
            self.0.completed.fetch_add(1, Ordering::SeqCst);
            self.0.terminated.notify_one();
        }
    }

    fn tick(n: u32) -> Message {
        Message::text(format!(r#"{{"n":{n}}}"#))
    }

    async fn eventually<F: Fn() -> bool>(condition: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition never held");
    }

    async fn observe(base_url: String) -> ObservableStream<Tick> {
        SeqApiClient::builder(base_url)
            .socket_close_timeout(Duration::from_millis(500))
            .build()
            .unwrap()
            .observe::<Tick, _>(&stream_links(), "Stream", None, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn failing_observers_do_not_stop_delivery() {
        let (go, start) = oneshot::channel::<()>();
        let peer = serve_once(|mut ws| async move {
            start.await.unwrap();
            for n in 0..3 {
                ws.send(tick(n)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let stream = observe(peer.base_url()).await;
        let first = Arc::new(Recorder::default());
        let last = Arc::new(Recorder::default());

        let _a = stream.subscribe(Probe(Arc::clone(&first))).unwrap();
        let _b = stream
            .subscribe_fn(|tick: &Tick| Err(format!("rejected {}", tick.n).into()))
            .unwrap();
        let _c = stream
            .subscribe_fn(|tick: &Tick| -> std::result::Result<(), BoxError> {
                panic!("observer blew up on {}", tick.n)
            })
            .unwrap();
        let _d = stream.subscribe(Probe(Arc::clone(&last))).unwrap();
        assert_eq!(stream.state(), StreamState::Running);
        go.send(()).unwrap();

        first.wait_terminated().await;
        last.wait_terminated().await;

        assert_eq!(first.values(), vec![0, 1, 2]);
        assert_eq!(last.values(), vec![0, 1, 2]);
        assert_eq!(first.completed(), 1);
        assert_eq!(last.completed(), 1);

        let failures = stream.take_delivery_errors();
        assert_eq!(failures.len(), 3);
        for (n, failure) in failures.iter().enumerate() {
            match failure {
                StreamError::Delivery { failures } => {
                    assert_eq!(failures.len(), 2);
                    assert_eq!(failures[0].to_string(), format!("rejected {n}"));
                    assert!(failures[1].to_string().contains("blew up"));
                }
                other => panic!("unexpected failure: {other}"),
            }
        }
        assert!(stream.take_delivery_errors().is_empty());
    }

    #[tokio::test]
    async fn messages_before_the_first_subscriber_are_not_lost() {
        let peer = serve_once(|mut ws| async move {
            ws.send(tick(7)).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let stream = observe(peer.base_url()).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(stream.state(), StreamState::Created);

        let recorder = Arc::new(Recorder::default());
        let _sub = stream.subscribe(Probe(Arc::clone(&recorder))).unwrap();
        recorder.wait_terminated().await;
        assert_eq!(recorder.values(), vec![7]);
    }

    #[tokio::test]
    async fn late_subscribers_complete_immediately() {
        let peer = serve_once(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let stream = observe(peer.base_url()).await;
        let early = Arc::new(Recorder::default());
        let _early = stream.subscribe(Probe(Arc::clone(&early))).unwrap();
        early.wait_terminated().await;
        eventually(|| stream.state() == StreamState::Ended).await;
        peer.finished().await;

        let late = Arc::new(Recorder::default());
        let _late = stream.subscribe(Probe(Arc::clone(&late))).unwrap();
        assert_eq!(late.completed(), 1);
        assert!(late.values().is_empty());
        assert_eq!(early.completed(), 1);
    }

    #[tokio::test]
    async fn abnormal_close_is_an_error_for_every_subscriber() {
        let (go, start) = oneshot::channel::<()>();
        let peer = serve_once(|mut ws| async move {
            start.await.unwrap();
            ws.close(Some(CloseFrame {
                code: CloseCode::Error,
                reason: Utf8Bytes::from_static("Signal was deleted"),
            }))
            .await
            .unwrap();
        })
        .await;

        let stream = observe(peer.base_url()).await;
        let recorders: Vec<Arc<Recorder>> = (0..3).map(|_| Arc::new(Recorder::default())).collect();
        let _subs: Vec<Subscription> = recorders
            .iter()
            .map(|r| stream.subscribe(Probe(Arc::clone(r))).unwrap())
            .collect();
        go.send(()).unwrap();

        for recorder in &recorders {
            recorder.wait_terminated().await;
            let errors = recorder.errors();
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("1011"), "Got: {}", errors[0]);
            assert!(errors[0].contains("Signal was deleted"), "Got: {}", errors[0]);
            assert_eq!(recorder.completed(), 0);
        }
    }

    #[tokio::test]
    async fn dispose_is_idempotent_and_completes_once() {
        let peer = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let stream = observe(peer.base_url()).await;
        let recorder = Arc::new(Recorder::default());
        let _sub = stream.subscribe(Probe(Arc::clone(&recorder))).unwrap();

        stream.dispose().await;
        stream.dispose().await;

        assert_eq!(recorder.completed(), 1);
        assert!(recorder.errors().is_empty());
        assert_eq!(stream.state(), StreamState::Disposed);
        assert!(matches!(
            stream.subscribe(Probe(Arc::new(Recorder::default()))),
            Err(Error::Stream(StreamError::Disposed))
        ));
        peer.finished().await;
    }

    #[tokio::test]
    async fn dispose_without_subscribers_still_closes() {
        let peer = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let stream = observe(peer.base_url()).await;
        stream.dispose().await;
        assert_eq!(stream.state(), StreamState::Disposed);
        peer.finished().await;
    }

    #[tokio::test]
    async fn dropped_subscriptions_stop_receiving() {
        let (first_sent, wait_first) = oneshot::channel::<()>();
        let (resume, resumed) = oneshot::channel::<()>();
        let peer = serve_once(|mut ws| async move {
            ws.send(tick(0)).await.unwrap();
            first_sent.send(()).unwrap();
            resumed.await.unwrap();
            ws.send(tick(1)).await.unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let stream = observe(peer.base_url()).await;
        let kept = Arc::new(Recorder::default());
        let dropped = Arc::new(Recorder::default());
        let _kept = stream.subscribe(Probe(Arc::clone(&kept))).unwrap();
        let handle = stream.subscribe(Probe(Arc::clone(&dropped))).unwrap();

        wait_first.await.unwrap();
        eventually(|| dropped.values().len() == 1).await;
        handle.unsubscribe();
        assert_eq!(stream.subscriber_count(), 1);
        resume.send(()).unwrap();

        kept.wait_terminated().await;
        assert_eq!(kept.values(), vec![0, 1]);
        assert_eq!(dropped.values(), vec![0]);
        assert_eq!(dropped.completed(), 0);
    }

    fn assert_consecutive(values: &[u32]) {
        for pair in values.windows(2) {
            assert_eq!(pair[1], pair[0] + 1, "gap in {values:?}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn subscribers_joining_and_leaving_mid_stream_see_contiguous_runs() {
        const TOTAL: u32 = 60;
        let peer = serve_once(|mut ws| async move {
            for n in 0..TOTAL {
                ws.send(tick(n)).await.unwrap();
                tokio::time::sleep(Duration::from_millis(3)).await;
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let stream = Arc::new(observe(peer.base_url()).await);
        let first = Arc::new(Recorder::default());
        let _first = stream.subscribe(Probe(Arc::clone(&first))).unwrap();

        // Joiners subscribe from their own tasks while values are flowing
        // and stay until the end.
        let joiners: Vec<_> = (0..8u64)
            .map(|i| {
                let stream = Arc::clone(&stream);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(5 + 12 * i)).await;
                    let recorder = Arc::new(Recorder::default());
                    let subscription = stream.subscribe(Probe(Arc::clone(&recorder))).unwrap();
                    recorder.wait_terminated().await;
                    drop(subscription);
                    recorder
                })
            })
            .collect();

        // Leavers subscribe, take a few values and unsubscribe, all while
        // the joiners are doing the same.
        let leavers: Vec<_> = (0..4u64)
            .map(|i| {
                let stream = Arc::clone(&stream);
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10 * i)).await;
                    let recorder = Arc::new(Recorder::default());
                    let subscription = stream.subscribe(Probe(Arc::clone(&recorder))).unwrap();
                    eventually(|| recorder.values().len() >= 3).await;
                    subscription.unsubscribe();
                    recorder
                })
            })
            .collect();

        first.wait_terminated().await;
        assert_eq!(first.values(), (0..TOTAL).collect::<Vec<_>>());
        assert_eq!(first.completed(), 1);

        for joiner in joiners {
            let recorder = joiner.await.unwrap();
            let values = recorder.values();
            assert_consecutive(&values);
            if let Some(last) = values.last() {
                assert_eq!(*last, TOTAL - 1, "joiner missed the tail: {values:?}");
            }
            assert_eq!(recorder.completed(), 1);
            assert!(recorder.errors().is_empty());
        }

        for leaver in leavers {
            let recorder = leaver.await.unwrap();
            let values = recorder.values();
            assert!(values.len() >= 3);
            assert_consecutive(&values);
            assert_eq!(recorder.completed(), 0);
        }

        assert!(stream.take_delivery_errors().is_empty());
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn dropping_the_stream_completes_subscribers() {
        let peer = serve_once(|mut ws| async move {
            while let Some(Ok(_)) = ws.next().await {}
        })
        .await;

        let stream = observe(peer.base_url()).await;
        let recorder = Arc::new(Recorder::default());
        let _sub = stream.subscribe(Probe(Arc::clone(&recorder))).unwrap();
        drop(stream);

        recorder.wait_terminated().await;
        assert_eq!(recorder.completed(), 1);
    }
}
