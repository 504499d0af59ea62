//! TCP client for the manager's submission and broadcast channels

use super::protocol::{JobReply, JobRequest};
use super::transport::{ManagerTransport, TransportError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::Instant;

/// Client owning the two channels to the manager: a newline-delimited JSON
/// request/reply stream for submissions and a line-oriented subscribe stream
/// for completion broadcasts.
///
/// Both streams are released when the client is dropped, so every exit path
/// (normal completion, error, cancellation) tears the channels down; an
/// explicit [`close`](ManagerTransport::close) only makes the release happen
/// earlier.
///
/// Broadcast filtering happens client-side: `subscribe` records a topic
/// prefix and `poll_broadcast` discards lines matching no subscription.
pub struct ManagerClient {
    api: Option<(BufReader<OwnedReadHalf>, OwnedWriteHalf)>,
    broadcast: Option<BufReader<TcpStream>>,
    // Partial broadcast line carried across poll deadlines. `read_line` is
    // not cancellation-safe: when the timeout cancels it, bytes already
    // consumed from the stream live only in this buffer, so it must survive
    // until the line completes on a later poll.
    pending_line: String,
    subscriptions: HashSet<String>,
}

impl ManagerClient {
    /// Connect both channels to the given endpoints
    pub async fn connect(api_addr: &str, broadcast_addr: &str) -> Result<Self, TransportError> {
        let api = TcpStream::connect(api_addr)
            .await
            .map_err(|e| TransportError::connect(api_addr, e))?;

        let broadcast = TcpStream::connect(broadcast_addr)
            .await
            .map_err(|e| TransportError::connect(broadcast_addr, e))?;

        tracing::info!(api = api_addr, broadcast = broadcast_addr, "connected to manager");

        let (read_half, write_half) = api.into_split();

        Ok(Self {
            api: Some((BufReader::new(read_half), write_half)),
            broadcast: Some(BufReader::new(broadcast)),
            pending_line: String::new(),
            subscriptions: HashSet::new(),
        })
    }
}

#[async_trait]
impl ManagerTransport for ManagerClient {
    async fn request(&mut self, request: &JobRequest) -> Result<JobReply, TransportError> {
        let (reader, writer) = self.api.as_mut().ok_or(TransportError::Closed)?;

        let mut payload =
            serde_json::to_string(request).map_err(|e| TransportError::malformed(e.to_string()))?;
        payload.push('\n');

        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
        tracing::debug!(worker = %request.worker, document = %request.document, "sent job request");

        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(TransportError::Closed);
        }

        let line = line.trim();
        let reply: JobReply =
            serde_json::from_str(line).map_err(|_| TransportError::malformed(line))?;
        tracing::debug!(job_id = %reply.job_id, "received reply from manager");

        Ok(reply)
    }

    fn subscribe(&mut self, topic: &str) {
        tracing::debug!(topic, "subscribed on manager broadcast");
        self.subscriptions.insert(topic.to_string());
    }

    fn unsubscribe(&mut self, topic: &str) {
        tracing::debug!(topic, "unsubscribed from manager broadcast");
        self.subscriptions.remove(topic);
    }

    async fn poll_broadcast(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<String>, TransportError> {
        let deadline = Instant::now() + timeout;

        loop {
            let reader = self.broadcast.as_mut().ok_or(TransportError::Closed)?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }

            match tokio::time::timeout(remaining, reader.read_line(&mut self.pending_line)).await {
                // Deadline hit: any bytes already consumed stay buffered in
                // `pending_line` for the next poll
                Err(_) => return Ok(None),
                Ok(Ok(0)) => return Err(TransportError::Closed),
                Ok(Ok(_)) => {
                    let message = self.pending_line.trim_end_matches(['\r', '\n']).to_string();
                    self.pending_line.clear();
                    if self.subscriptions.iter().any(|t| message.starts_with(t.as_str())) {
                        return Ok(Some(message));
                    }
                    tracing::trace!(message = %message, "broadcast matched no subscription, discarding");
                }
                Ok(Err(e)) => return Err(e.into()),
            }
        }
    }

    fn close(&mut self) {
        if self.api.is_some() || self.broadcast.is_some() {
            tracing::debug!("closing manager channels");
        }
        self.api = None;
        self.broadcast = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// In-process manager fixture: an api endpoint that assigns sequential
    /// job ids and a broadcast endpoint that relays lines from a channel.
    async fn spawn_manager() -> (String, String, mpsc::UnboundedSender<String>) {
        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let broadcast_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap().to_string();
        let broadcast_addr = broadcast_listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let (stream, _) = api_listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut counter = 0u32;
            let mut line = String::new();
            loop {
                line.clear();
                if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                    break;
                }
                // Every request must be valid JSON carrying the add-job shape
                let request: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
                assert_eq!(request["command"], "add job");
                counter += 1;
                let reply = format!("{{\"job id\": \"j{}\"}}\n", counter);
                reader.get_mut().write_all(reply.as_bytes()).await.unwrap();
            }
        });

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        tokio::spawn(async move {
            let (mut stream, _) = broadcast_listener.accept().await.unwrap();
            while let Some(message) = rx.recv().await {
                let line = format!("{}\n", message);
                if stream.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
            }
            // Hold the stream open until the sender side is dropped
        });

        (api_addr, broadcast_addr, tx)
    }

    #[tokio::test]
    async fn test_connect_failure() {
        // Port 1 is never listening in the test environment
        let result = ManagerClient::connect("127.0.0.1:1", "127.0.0.1:1").await;
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_request_reply_round_trip() {
        let (api, broadcast, _tx) = spawn_manager().await;
        let mut client = ManagerClient::connect(&api, &broadcast).await.unwrap();

        let reply = client
            .request(&JobRequest::add_job("extractor", "doc1"))
            .await
            .unwrap();
        assert_eq!(reply.job_id, "j1");

        // Strict lockstep: the next request gets the next id
        let reply = client
            .request(&JobRequest::add_job("tokenizer", "doc1"))
            .await
            .unwrap();
        assert_eq!(reply.job_id, "j2");
    }

    #[tokio::test]
    async fn test_poll_broadcast_filters_by_subscription() {
        let (api, broadcast, tx) = spawn_manager().await;
        let mut client = ManagerClient::connect(&api, &broadcast).await.unwrap();

        client.subscribe("job finished: j1");
        tx.send("heartbeat".into()).unwrap();
        tx.send("job finished: j9".into()).unwrap();
        tx.send("job finished: j1".into()).unwrap();

        let message = client
            .poll_broadcast(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(message.as_deref(), Some("job finished: j1"));
    }

    #[tokio::test]
    async fn test_poll_broadcast_times_out() {
        let (api, broadcast, _tx) = spawn_manager().await;
        let mut client = ManagerClient::connect(&api, &broadcast).await.unwrap();

        client.subscribe("job finished: ");
        let message = client
            .poll_broadcast(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(message, None);
    }

    #[tokio::test]
    async fn test_partial_broadcast_line_survives_poll_deadline() {
        // A broadcast line written in two pieces around a poll deadline must
        // still be delivered: losing it would leave its job outstanding
        // forever.
        let api_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let broadcast_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = api_listener.local_addr().unwrap().to_string();
        let broadcast_addr = broadcast_listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let _stream = api_listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        tokio::spawn(async move {
            let (mut stream, _) = broadcast_listener.accept().await.unwrap();
            stream.write_all(b"job finish").await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            stream.write_all(b"ed: j1\n").await.unwrap();
            std::future::pending::<()>().await;
        });

        let mut client = ManagerClient::connect(&api_addr, &broadcast_addr).await.unwrap();
        client.subscribe("job finished: j1");

        // The first poll expires with the line still incomplete
        let first = client.poll_broadcast(Duration::from_millis(100)).await.unwrap();
        assert_eq!(first, None);

        let mut message = None;
        for _ in 0..10 {
            message = client.poll_broadcast(Duration::from_millis(100)).await.unwrap();
            if message.is_some() {
                break;
            }
        }
        assert_eq!(message.as_deref(), Some("job finished: j1"));
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let (api, broadcast, tx) = spawn_manager().await;
        let mut client = ManagerClient::connect(&api, &broadcast).await.unwrap();

        client.subscribe("job finished: j1");
        client.unsubscribe("job finished: j1");
        tx.send("job finished: j1".into()).unwrap();

        let message = client
            .poll_broadcast(Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(message, None);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (api, broadcast, _tx) = spawn_manager().await;
        let mut client = ManagerClient::connect(&api, &broadcast).await.unwrap();

        client.close();
        client.close();

        let result = client.request(&JobRequest::add_job("extractor", "doc1")).await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }
}
