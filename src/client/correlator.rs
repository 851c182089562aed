//! Request/response correlation over a line-delimited JSON stream.
//!
//! Every call gets a fresh integer id and a one-shot slot in the pending table.
//! A background task reads the peer's output and hands each response to the
//! slot with the same id. Responses can therefore arrive in any order, and
//! one that nobody is waiting for (unknown id, or its caller already timed out)
//! is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ClientError;
use crate::transport::{FramedReader, FramedWriter, Message};

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Default)]
struct PendingTable {
    waiters: HashMap<u64, oneshot::Sender<Message>>,
    closed: bool,
}

#[derive(Clone, Default)]
struct SharedPending(Arc<Mutex<PendingTable>>);

impl SharedPending {
    fn lock(&self) -> MutexGuard<'_, PendingTable> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Subscription for one in-flight call. Dropping it removes the pending entry,
/// whether the call resolved, timed out or was cancelled.
struct PendingGuard {
    id: u64,
    pending: SharedPending,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().waiters.remove(&self.id);
    }
}

pub struct Correlator {
    writer: AsyncMutex<FramedWriter<BoxedWriter>>,
    pending: SharedPending,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
}

impl Correlator {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending = SharedPending::default();
        let reader_task = tokio::spawn(route_responses(reader, pending.clone()));
        let writer: BoxedWriter = Box::new(writer);

        Self {
            writer: AsyncMutex::new(FramedWriter::new(writer)),
            pending,
            next_id: AtomicU64::new(1),
            reader_task,
        }
    }

    /// Sends `method` and waits up to `timeout` for the response with the same id.
    pub async fn call(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Message, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (guard, receiver) = self.register(id, method)?;

        debug!(id, method = %method, "sending request");
        self.send(&Message::request(id, method, params)).await?;

        let outcome = tokio::time::timeout(timeout, receiver).await;
        drop(guard);

        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed {
                method: method.to_string(),
            }),
            Err(_) => {
                warn!(id, method = %method, timeout_ms = timeout.as_millis() as u64, "request timed out");
                Err(ClientError::Timeout {
                    method: method.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Sends a notification; nothing is awaited.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), ClientError> {
        self.send(&Message::notification(method, params)).await
    }

    /// Closes the outbound stream so the peer sees end of input.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().waiters.len()
    }

    fn register(
        &self,
        id: u64,
        method: &str,
    ) -> Result<(PendingGuard, oneshot::Receiver<Message>), ClientError> {
        let (sender, receiver) = oneshot::channel();
        let mut table = self.pending.lock();
        if table.closed {
            return Err(ClientError::ConnectionClosed {
                method: method.to_string(),
            });
        }
        table.waiters.insert(id, sender);

        let guard = PendingGuard {
            id,
            pending: self.pending.clone(),
        };
        Ok((guard, receiver))
    }

    async fn send(&self, message: &Message) -> Result<(), ClientError> {
        self.writer.lock().await.send(message).await?;
        Ok(())
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

async fn route_responses<R>(reader: R, pending: SharedPending)
where
    R: AsyncRead + Unpin,
{
    let mut reader: FramedReader<R, Message> = FramedReader::new(reader);

    loop {
        match reader.next().await {
            Ok(Some(message)) => deliver(&pending, message),
            Ok(None) => {
                debug!("peer output closed");
                break;
            }
            Err(err) => {
                warn!(error = %err, "failed reading peer output");
                break;
            }
        }
    }

    // Dropping the senders wakes every waiter with a closed-channel error.
    let mut table = pending.lock();
    table.closed = true;
    table.waiters.clear();
}

fn deliver(pending: &SharedPending, message: Message) {
    if !message.is_response() {
        debug!(method = ?message.method, "ignoring message that is not a response");
        return;
    }
    let Some(id) = message.numeric_id() else {
        debug!(id = ?message.id, "ignoring response with non-integer id");
        return;
    };

    let waiter = pending.lock().waiters.remove(&id);
    match waiter {
        Some(sender) => {
            if sender.send(message).is_err() {
                debug!(id, "caller gave up before the response arrived");
            }
        }
        None => debug!(id, "discarding response with no pending request"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{FramedReader, FramedWriter};
    use serde_json::json;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf};

    struct Peer {
        reader: FramedReader<ReadHalf<DuplexStream>, Message>,
        writer: FramedWriter<WriteHalf<DuplexStream>>,
    }

    impl Peer {
        async fn recv(&mut self) -> Message {
            self.reader
                .next()
                .await
                .expect("peer read")
                .expect("peer input open")
        }

        async fn reply(&mut self, id: u64, result: Value) {
            self.writer
                .send(&Message::success(json!(id), result))
                .await
                .expect("peer write");
        }
    }

    fn pair() -> (Arc<Correlator>, Peer) {
        let (client_end, peer_end) = tokio::io::duplex(64 * 1024);
        let (client_read, client_write) = tokio::io::split(client_end);
        let (peer_read, peer_write) = tokio::io::split(peer_end);

        let correlator = Arc::new(Correlator::new(client_read, client_write));
        let peer = Peer {
            reader: FramedReader::new(peer_read),
            writer: FramedWriter::new(peer_write),
        };
        (correlator, peer)
    }

    const LONG: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn resolves_with_matching_response_and_clears_entry() {
        let (correlator, mut peer) = pair();

        let call = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.call("tools/list", json!({}), LONG).await })
        };

        let request = peer.recv().await;
        assert_eq!(request.method.as_deref(), Some("tools/list"));
        assert_eq!(request.numeric_id(), Some(1));
        assert_eq!(correlator.pending_count(), 1);

        peer.reply(1, json!({"tools": []})).await;

        let response = call.await.expect("join").expect("call");
        assert_eq!(response.numeric_id(), Some(1));
        assert_eq!(response.result, Some(json!({"tools": []})));
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn out_of_order_responses_reach_their_callers() {
        let (correlator, mut peer) = pair();

        let first = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.call("first", json!({}), LONG).await })
        };
        let first_id = peer.recv().await.numeric_id().expect("id");

        let second = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.call("second", json!({}), LONG).await })
        };
        let second_id = peer.recv().await.numeric_id().expect("id");
        assert!(second_id > first_id);

        peer.reply(second_id, json!("two")).await;
        peer.reply(first_id, json!("one")).await;

        let first = first.await.expect("join").expect("first call");
        let second = second.await.expect("join").expect("second call");
        assert_eq!(first.result, Some(json!("one")));
        assert_eq!(second.result, Some(json!("two")));
    }

    #[tokio::test]
    async fn ids_increase_from_one() {
        let (correlator, mut peer) = pair();

        for expected in 1..=3u64 {
            let call = {
                let correlator = Arc::clone(&correlator);
                tokio::spawn(async move { correlator.call("ping", json!({}), LONG).await })
            };
            let request = peer.recv().await;
            assert_eq!(request.numeric_id(), Some(expected));
            peer.reply(expected, json!({})).await;
            call.await.expect("join").expect("call");
        }
    }

    #[tokio::test]
    async fn timeout_removes_entry_and_late_response_is_ignored() {
        let (correlator, mut peer) = pair();

        let error = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move {
                correlator
                    .call("tools/call", json!({}), Duration::from_millis(50))
                    .await
            })
        };
        let stale_id = peer.recv().await.numeric_id().expect("id");

        let error = error.await.expect("join").expect_err("must time out");
        assert!(matches!(
            &error,
            ClientError::Timeout { method, timeout_ms: 50 } if method == "tools/call"
        ));
        assert_eq!(correlator.pending_count(), 0);

        // The late answer must not leak into the next call.
        peer.reply(stale_id, json!("late")).await;

        let next = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.call("ping", json!({}), LONG).await })
        };
        let next_id = peer.recv().await.numeric_id().expect("id");
        assert_ne!(next_id, stale_id);
        peer.reply(next_id, json!("fresh")).await;

        let response = next.await.expect("join").expect("call");
        assert_eq!(response.result, Some(json!("fresh")));
    }

    #[tokio::test]
    async fn unmatched_and_non_response_messages_are_ignored() {
        let (correlator, mut peer) = pair();

        let call = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.call("ping", json!({}), LONG).await })
        };
        let id = peer.recv().await.numeric_id().expect("id");

        peer.reply(id + 100, json!("stranger")).await;
        peer.writer
            .send(&Message::notification("notifications/message", Some(json!({}))))
            .await
            .expect("peer write");
        peer.writer
            .send(&Message::request(id, "sampling/createMessage", json!({})))
            .await
            .expect("peer write");
        peer.reply(id, json!("mine")).await;

        let response = call.await.expect("join").expect("call");
        assert_eq!(response.result, Some(json!("mine")));
    }

    #[tokio::test]
    async fn closed_peer_fails_pending_and_future_calls() {
        let (correlator, mut peer) = pair();

        let call = {
            let correlator = Arc::clone(&correlator);
            tokio::spawn(async move { correlator.call("slow", json!({}), LONG).await })
        };
        peer.recv().await;
        drop(peer);

        let error = call.await.expect("join").expect_err("closed");
        assert!(matches!(error, ClientError::ConnectionClosed { .. }));
        assert_eq!(correlator.pending_count(), 0);

        let error = correlator
            .call("after", json!({}), LONG)
            .await
            .expect_err("closed");
        assert!(matches!(error, ClientError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn notify_sends_message_without_id() {
        let (correlator, mut peer) = pair();

        correlator
            .notify("notifications/initialized", None)
            .await
            .expect("notify");

        let message = peer.recv().await;
        assert!(message.is_notification());
        assert_eq!(correlator.pending_count(), 0);
    }
}
