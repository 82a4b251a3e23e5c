use std::time::Duration;

use futures_util::StreamExt;
use seq_api_testnet::seq_api::{
    errors::StreamError, BoxError, Error, EventEntity, EventQuery, Observer, SeqConnection,
    StatusCode, StreamState,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::timeout;

use super::start_server;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq)]
enum Note {
    Next(String),
    Error(Option<u16>),
    Completed,
}

struct Recorder(UnboundedSender<Note>);

impl Recorder {
    fn new() -> (Self, UnboundedReceiver<Note>) {
        let (tx, rx) = unbounded_channel();
        (Self(tx), rx)
    }
}

impl Observer<EventEntity> for Recorder {
    fn on_next(&self, event: &EventEntity) -> Result<(), BoxError> {
        let message = event.rendered_message.clone().unwrap_or_default();
        self.0.send(Note::Next(message)).map_err(BoxError::from)
    }

    fn on_error(&self, error: &Error) {
        let code = match error {
            Error::Stream(StreamError::Closed { code, .. }) => Some(*code),
            _ => None,
        };
        let _ = self.0.send(Note::Error(code));
    }

    fn on_completed(&self) {
        let _ = self.0.send(Note::Completed);
    }
}

async fn next_note(notes: &mut UnboundedReceiver<Note>) -> Note {
    timeout(WAIT, notes.recv()).await.unwrap().unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn link_stream_delivers_filtered_events_in_order() {
    let server = start_server().await;
    let events = server.connection().unwrap().events();

    let query = EventQuery::new().filter("@Level = 'Error'").render(true);
    let mut stream = events.stream(&query).await.unwrap();
    server.wait_for_stream_clients(1, WAIT).await.unwrap();

    server.log("Information", "ignored");
    server.log("Error", "first");
    server.log("Error", "second");

    let first = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();
    let second = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();
    assert_eq!(first.rendered_message.as_deref(), Some("first"));
    assert_eq!(second.rendered_message.as_deref(), Some("second"));

    server.close_streams(1000, "");
    assert!(timeout(WAIT, stream.next()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn link_stream_reports_abnormal_close_then_ends() {
    let server = start_server().await;
    let mut stream = server
        .connection()
        .unwrap()
        .events()
        .stream(&EventQuery::new())
        .await
        .unwrap();
    server.wait_for_stream_clients(1, WAIT).await.unwrap();

    server.send_raw("not json");
    server.close_streams(1011, "Query failed");

    let undecodable = timeout(WAIT, stream.next()).await.unwrap().unwrap();
    assert!(matches!(
        undecodable,
        Err(Error::Stream(StreamError::Decode(_)))
    ));

    let closed = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap_err();
    match closed {
        Error::Stream(StreamError::Closed { code, description }) => {
            assert_eq!(code, 1011);
            assert_eq!(description, "Query failed");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(timeout(WAIT, stream.next()).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn initial_message_reaches_the_server() {
    let server = start_server().await;
    let connection = server.connection().unwrap();
    let group = connection.load_resource_group("Events").await.unwrap();

    let stream = connection
        .client()
        .connect_text(&*group, "Stream", None, Some(r#"{"subscribe":"errors"}"#))
        .await
        .unwrap();
    server.wait_for_stream_clients(1, WAIT).await.unwrap();

    timeout(WAIT, async {
        while server.client_messages().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(server.client_messages(), vec![r#"{"subscribe":"errors"}"#]);

    drop(stream);
}

#[tokio::test(flavor = "multi_thread")]
async fn observers_all_see_each_event_then_the_close() {
    let server = start_server().await;
    let feed = server
        .connection()
        .unwrap()
        .events()
        .observe(&EventQuery::new().render(true))
        .await
        .unwrap();
    server.wait_for_stream_clients(1, WAIT).await.unwrap();
    assert_eq!(feed.state(), StreamState::Created);

    // Sent before anyone subscribed; still delivered once reading starts.
    server.log("Information", "early");

    let mut receivers = Vec::new();
    let mut subscriptions = Vec::new();
    for _ in 0..3 {
        let (recorder, notes) = Recorder::new();
        subscriptions.push(feed.subscribe(recorder).unwrap());
        receivers.push(notes);
    }
    assert_eq!(feed.subscriber_count(), 3);

    server.log("Information", "late");
    server.close_streams(1011, "Query failed");

    for notes in &mut receivers {
        assert_eq!(next_note(notes).await, Note::Next("early".into()));
        assert_eq!(next_note(notes).await, Note::Next("late".into()));
        assert_eq!(next_note(notes).await, Note::Error(Some(1011)));
    }

    // Terminal notifications happen once: dispose adds nothing.
    feed.dispose().await;
    assert_eq!(feed.state(), StreamState::Disposed);
    for notes in &mut receivers {
        assert!(notes.try_recv().is_err());
    }
    assert!(feed.take_delivery_errors().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn a_failing_observer_does_not_starve_the_others() {
    let server = start_server().await;
    let feed = server
        .connection()
        .unwrap()
        .events()
        .observe(&EventQuery::new().render(true))
        .await
        .unwrap();
    server.wait_for_stream_clients(1, WAIT).await.unwrap();

    let _failing = feed
        .subscribe_fn(|_: &EventEntity| Err(BoxError::from("observer is full")))
        .unwrap();
    let (recorder, mut notes) = Recorder::new();
    let _recording = feed.subscribe(recorder).unwrap();

    server.log("Information", "one");
    server.log("Information", "two");

    assert_eq!(next_note(&mut notes).await, Note::Next("one".into()));
    assert_eq!(next_note(&mut notes).await, Note::Next("two".into()));

    // The aggregate for a value is recorded after every observer saw it.
    let mut failures = Vec::new();
    timeout(WAIT, async {
        while failures.len() < 2 {
            failures.extend(feed.take_delivery_errors());
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(failures.len(), 2);
    assert!(failures[0].to_string().contains("observer is full"));

    feed.dispose().await;
    assert_eq!(next_note(&mut notes).await, Note::Completed);
    server.wait_for_no_stream_clients(WAIT).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn session_cookie_authorizes_the_socket_handshake() {
    let server = start_server().await;

    // No API key: the cookie from the root resource carries the session.
    let with_session = SeqConnection::builder(server.base_url().as_str())
        .build()
        .unwrap();
    let stream = with_session.events().stream(&EventQuery::new()).await;
    assert!(stream.is_ok(), "Got: {:?}", stream.err());

    let anonymous = SeqConnection::builder(server.base_url().as_str())
        .use_cookies(false)
        .build()
        .unwrap();
    // Group metadata needs authorization too, so borrow it from the session.
    let group = with_session.load_resource_group("Events").await.unwrap();
    let err = anonymous
        .client()
        .connect_text(&*group, "Stream", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(StatusCode::UNAUTHORIZED));
}
