//! Transports carrying protocol envelopes between a panel and a [`Session`].
//!
//! - stdio: one JSON envelope per line (stdin in, stdout out)
//! - WebSocket: one JSON envelope per text frame, one session per connection
//!
//! Each request runs in its own task. Responses go through a single writer
//! task, so they are emitted whole and in completion order. Malformed input is
//! logged and dropped; it never ends the session.

use std::net::SocketAddr;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, instrument, warn};

use content_viewer_shared::{ContentViewerError, Result};

use crate::protocol::Message;
use crate::session::Session;

/// Bound on responses waiting for the writer.
const OUTBOX_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Request dispatch (shared by both transports)
// ---------------------------------------------------------------------------

fn decode_request(text: &str) -> Option<Message> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match Message::decode(text) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!(error = %e, "dropping malformed message");
            None
        }
    }
}

/// Decode `text` and, if it is a message, answer it on its own task.
///
/// Requests that already finished are collected first, so a long session
/// only holds the tasks still running.
fn dispatch(session: &Session, outbox: &mpsc::Sender<Message>, in_flight: &mut JoinSet<()>, text: &str) {
    reap(in_flight);

    let Some(message) = decode_request(text) else {
        return;
    };
    debug!(event = message.event(), "request received");

    let session = session.clone();
    let outbox = outbox.clone();
    in_flight.spawn(async move {
        if let Some(reply) = session.handle(message).await {
            // The writer is gone only when the peer is; nothing to report to.
            let _ = outbox.send(reply).await;
        }
    });
}

fn reap(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.try_join_next() {
        log_join(joined);
    }
}

fn log_join(joined: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        warn!(error = %e, "request task failed");
    }
}

/// Wait for every in-flight request so each one still gets its response.
async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
    }
}

// ---------------------------------------------------------------------------
// stdio
// ---------------------------------------------------------------------------

/// Serve the protocol on stdin/stdout until stdin closes.
pub async fn serve_stdio(session: Session) -> Result<()> {
    info!("serving on stdio");
    serve_lines(session, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve newline-delimited envelopes read from `reader`, writing responses to `writer`.
///
/// Returns once `reader` hits EOF and every pending response has been written.
#[instrument(skip_all)]
pub async fn serve_lines<R, W>(session: Session, reader: R, writer: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, mut rx) = mpsc::channel::<Message>(OUTBOX_CAPACITY);

    let writer_task = tokio::spawn(async move {
        let mut writer = writer;
        while let Some(message) = rx.recv().await {
            let mut line = message.encode()?;
            line.push('\n');
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(|e| ContentViewerError::Protocol(format!("write failed: {e}")))?;
            writer
                .flush()
                .await
                .map_err(|e| ContentViewerError::Protocol(format!("flush failed: {e}")))?;
        }
        Ok::<(), ContentViewerError>(())
    });

    let mut in_flight = JoinSet::new();
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => dispatch(&session, &outbox, &mut in_flight, &line),
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "input read failed, closing");
                break;
            }
        }
    }

    drain(&mut in_flight).await;
    drop(outbox);

    writer_task
        .await
        .map_err(|e| ContentViewerError::Protocol(format!("writer task failed: {e}")))?
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// Bind `addr` and serve every WebSocket connection on it.
pub async fn serve_websocket(session: Session, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ContentViewerError::Protocol(format!("failed to bind {addr}: {e}")))?;
    info!(%addr, "websocket server listening");
    serve_listener(session, listener).await
}

/// Accept connections from an already-bound listener. Runs until accept fails.
pub async fn serve_listener(session: Session, listener: TcpListener) -> Result<()> {
    loop {
        let (stream, peer) = listener
            .accept()
            .await
            .map_err(|e| ContentViewerError::Protocol(format!("accept failed: {e}")))?;
        info!(%peer, "panel connected");

        let session = session.clone();
        tokio::spawn(async move {
            match handle_connection(session, stream).await {
                Ok(()) => info!(%peer, "panel disconnected"),
                Err(e) => warn!(%peer, error = %e, "connection closed with error"),
            }
        });
    }
}

async fn handle_connection(session: Session, stream: TcpStream) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream)
        .await
        .map_err(|e| ContentViewerError::Protocol(format!("websocket handshake failed: {e}")))?;
    let (mut ws_write, mut ws_read) = ws.split();

    let (outbox, mut rx) = mpsc::channel::<Message>(OUTBOX_CAPACITY);
    let writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = message.encode()?;
            ws_write
                .send(WsMessage::Text(text.into()))
                .await
                .map_err(|e| ContentViewerError::Protocol(format!("websocket send failed: {e}")))?;
        }
        let _ = ws_write.close().await;
        Ok::<(), ContentViewerError>(())
    });

    let mut in_flight = JoinSet::new();
    while let Some(frame) = ws_read.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => dispatch(&session, &outbox, &mut in_flight, text.as_str()),
            Ok(WsMessage::Binary(data)) => match std::str::from_utf8(&data) {
                Ok(text) => dispatch(&session, &outbox, &mut in_flight, text),
                Err(_) => warn!("dropping non-UTF-8 binary frame"),
            },
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {} // ping/pong
            Err(e) => {
                warn!(error = %e, "websocket read error");
                break;
            }
        }
    }

    drain(&mut in_flight).await;
    drop(outbox);

    writer_task
        .await
        .map_err(|e| ContentViewerError::Protocol(format!("writer task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::test_support::StubHost;
    use tokio::io::AsyncReadExt;

    fn raw_entries(ids: &[&str]) -> Vec<content_viewer_shared::RawEntry> {
        ids.iter()
            .map(|id| serde_json::from_value(serde_json::json!({"id": id, "data": {}})).unwrap())
            .collect()
    }

    async fn run_lines(session: Session, input: &str) -> Vec<Message> {
        let (server_out, mut client_in) = tokio::io::duplex(1 << 16);
        serve_lines(session, input.as_bytes(), server_out).await.unwrap();

        let mut output = String::new();
        client_in.read_to_string(&mut output).await.unwrap();
        output.lines().map(|line| Message::decode(line).unwrap()).collect()
    }

    #[tokio::test]
    async fn responses_follow_completion_order() {
        let host = StubHost::default()
            .with_collection("slow", 200, raw_entries(&["s"]))
            .with_collection("fast", 0, raw_entries(&["f"]));
        let session = Session::from_host(Arc::new(host));

        let input = [
            Message::get_collection_entries("slow").encode().unwrap(),
            Message::get_collection_entries("fast").encode().unwrap(),
        ]
        .join("\n");

        let replies = run_lines(session, &input).await;
        let order: Vec<_> = replies
            .iter()
            .map(|m| match m {
                Message::CollectionEntries(data) => data.collection.as_str(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(order, vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_without_ending_the_session() {
        let session = Session::from_host(Arc::new(StubHost::default()));
        let input = format!(
            "garbage\n\n{{\"event\":\"content-viewer:nope\",\"payload\":{{}}}}\n{}\n",
            Message::get_collections().encode().unwrap()
        );

        let replies = run_lines(session, &input).await;
        assert_eq!(replies.len(), 1);
        match &replies[0] {
            Message::CollectionsData(data) => assert!(data.error.is_some()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn response_kinds_get_no_reply() {
        let session = Session::from_host(Arc::new(StubHost::default()));
        let input = Message::CollectionsData(Default::default()).encode().unwrap();
        assert!(run_lines(session, &input).await.is_empty());
    }

    #[tokio::test]
    async fn every_request_gets_exactly_one_response() {
        let host = StubHost::default().with_collection("blog", 10, raw_entries(&["a", "b"]));
        let session = Session::from_host(Arc::new(host));

        let request = Message::get_collection_entries("blog").encode().unwrap();
        let input = vec![request; 5].join("\n");
        assert_eq!(run_lines(session, &input).await.len(), 5);
    }

    #[tokio::test]
    async fn answered_requests_are_reaped() {
        let host = StubHost::default().with_collection("blog", 0, raw_entries(&["a"]));
        let session = Session::from_host(Arc::new(host));
        let (outbox, mut rx) = mpsc::channel(OUTBOX_CAPACITY);
        let mut in_flight = JoinSet::new();

        let request = Message::get_collection_entries("blog").encode().unwrap();
        for _ in 0..100 {
            dispatch(&session, &outbox, &mut in_flight, &request);
            assert!(rx.recv().await.is_some());
        }

        // A task may still be between its send and its exit.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        dispatch(&session, &outbox, &mut in_flight, "");
        assert_eq!(in_flight.len(), 0);
    }

    #[tokio::test]
    async fn websocket_round_trip() {
        let host = StubHost::default().with_collection("blog", 0, raw_entries(&["a"]));
        let session = Session::from_host(Arc::new(host));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_listener(session, listener));

        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("connect");

        ws.send(WsMessage::Text("not json".into())).await.unwrap();
        let request = Message::get_collection_entries("blog").encode().unwrap();
        ws.send(WsMessage::Text(request.into())).await.unwrap();

        let reply = loop {
            match ws.next().await.expect("frame").expect("ok frame") {
                WsMessage::Text(text) => break Message::decode(text.as_str()).unwrap(),
                _ => continue,
            }
        };
        match reply {
            Message::CollectionEntries(data) => {
                assert_eq!(data.collection, "blog");
                assert_eq!(data.entries.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }

        ws.close(None).await.unwrap();
    }
}
