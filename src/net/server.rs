//! TCP accept loop and per-connection receive loops

use crate::config::HubConfig;
use crate::error::{HubError, Result};
use crate::hub::{BroadcastHub, MessageRouter};
use crate::net::{Outbound, TcpConnection};
use crate::types::ClientId;
use bytes::BytesMut;
use futures::{Stream, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, LengthDelimitedCodec};

/// Keeps a connection registered until released or dropped.
///
/// Dropping without [`Registration::release`] (task aborted, panic) still
/// unregisters, from a spawned task.
struct Registration {
    hub: Arc<BroadcastHub>,
    id: ClientId,
    released: bool,
}

impl Registration {
    fn new(hub: Arc<BroadcastHub>, id: ClientId) -> Self {
        Self {
            hub,
            id,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        self.hub.unregister(self.id).await;
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let hub = self.hub.clone();
        let id = self.id;
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                hub.unregister(id).await;
            });
        }
    }
}

/// Run one connection until its input ends, it fails, or the hub closes it.
///
/// The connection is registered on entry and unregistered on every exit path.
pub async fn serve_connection<S>(router: Arc<MessageRouter>, conn: Arc<dyn Outbound>, mut frames: S)
where
    S: Stream<Item = std::io::Result<BytesMut>> + Unpin,
{
    let hub = router.hub().clone();
    let id = hub.register(conn.clone()).await;
    let registration = Registration::new(hub, id);
    let closed = conn.closed().clone();

    tracing::info!(client = %id, "Connected");

    loop {
        let frame = tokio::select! {
            _ = closed.cancelled() => {
                tracing::debug!("{} closed by the hub", id);
                break;
            }
            frame = frames.next() => frame,
        };

        match frame {
            Some(Ok(data)) => {
                tracing::debug!("Received {} bytes from {}", data.len(), id);
                if let Err(e) = router.handle_frame(id, conn.as_ref(), &data).await {
                    tracing::debug!("Read loop ended for {}: {}", id, e);
                    break;
                }
            }
            Some(Err(e)) => {
                tracing::debug!("Read loop ended for {}: {}", id, e);
                break;
            }
            None => break,
        }
    }

    registration.release().await;
    tracing::info!(client = %id, "Disconnected");
}

/// Listening hub
pub struct HubServer {
    listener: TcpListener,
    router: Arc<MessageRouter>,
    max_frame_bytes: usize,
}

impl HubServer {
    /// Bind the listener described by `config`
    pub async fn bind(config: &HubConfig, router: Arc<MessageRouter>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|e| HubError::Connection(format!("bind {}: {}", config.listen_addr, e)))?;

        Ok(Self {
            listener,
            router,
            max_frame_bytes: config.max_frame_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Accept connections until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("Listening on {}", addr);
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutting down listener");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => tracing::error!("Accept error: {}", e),
                }
            }
        }
    }

    /// Accept connections forever
    pub async fn run(self) {
        self.run_until(futures::future::pending()).await
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        tracing::info!("New connection from {}", addr);

        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(self.max_frame_bytes)
            .new_codec();
        let (reader, writer) = stream.into_split();
        let frames = FramedRead::new(reader, codec);
        let conn: Arc<dyn Outbound> = Arc::new(TcpConnection::new(addr, writer));
        let router = self.router.clone();

        tokio::spawn(serve_connection(router, conn, frames));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory::AdvisoryClient;
    use crate::net::ChannelConnection;
    use crate::store::MemoryStore;
    use crate::types::Role;
    use bytes::Bytes;
    use futures::SinkExt;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio_util::codec::Framed;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    type Client = Framed<TcpStream, LengthDelimitedCodec>;

    fn router(advisory_url: &str) -> Arc<MessageRouter> {
        let hub = Arc::new(BroadcastHub::new(
            Arc::new(MemoryStore::new()),
            Duration::from_secs(1),
        ));
        let advisory = AdvisoryClient::new(advisory_url, Duration::from_secs(2)).unwrap();
        Arc::new(MessageRouter::new(hub, advisory))
    }

    async fn start(router: Arc<MessageRouter>, max_frame_bytes: usize) -> SocketAddr {
        let config = HubConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            max_frame_bytes,
            ..HubConfig::default()
        };
        let server = HubServer::bind(&config, router).await.unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        addr
    }

    async fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).await.unwrap();
        Framed::new(stream, LengthDelimitedCodec::new())
    }

    async fn send(client: &mut Client, frame: Value) {
        let data = serde_json::to_vec(&frame).unwrap();
        client.send(Bytes::from(data)).await.unwrap();
    }

    async fn recv(client: &mut Client) -> Value {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    async fn wait_for_connections(router: &MessageRouter, expected: usize) {
        for _ in 0..100 {
            if router.hub().connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} connections", expected);
    }

    #[tokio::test]
    async fn test_negotiation_over_tcp() {
        let advisory = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(serde_json::json!({"seller_price": 120.0, "buyer_price": 100.0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "seller_price": 120.0,
                "buyer_price": 100.0,
                "fair_price": 110.0,
                "suggestion": "meet in the middle"
            })))
            .expect(1)
            .mount(&advisory)
            .await;

        let router = router(&advisory.uri());
        let addr = start(router.clone(), 64 * 1024).await;

        let mut buyer = connect(addr).await;
        let mut seller = connect(addr).await;
        let mut bystander = connect(addr).await;
        wait_for_connections(&router, 3).await;

        send(&mut buyer, serde_json::json!({"type": "role", "role": "buyer"})).await;
        assert_eq!(recv(&mut buyer).await["status"], "ok");
        send(&mut seller, serde_json::json!({"type": "role", "role": "seller"})).await;
        assert_eq!(recv(&mut seller).await["status"], "ok");

        send(&mut buyer, serde_json::json!({"type": "price_update", "content": "100"})).await;
        for client in [&mut buyer, &mut seller, &mut bystander] {
            let frame = recv(client).await;
            assert_eq!(frame["type"], "price_sell");
            assert_eq!(frame["senderRole"], "buyer");
        }

        send(&mut seller, serde_json::json!({"type": "price_update", "content": "120"})).await;
        for client in [&mut buyer, &mut seller, &mut bystander] {
            assert_eq!(recv(client).await["type"], "price_sell");
            let advice = recv(client).await;
            assert_eq!(advice["type"], "ai_response");
            assert_eq!(advice["fair_price"], 110.0);
            assert_eq!(advice["suggestion"], "meet in the middle");
        }

        assert!(router.hub().state().await.try_resolve().is_none());
    }

    #[tokio::test]
    async fn test_unidentified_chat_gets_error() {
        let router = router("http://127.0.0.1:9");
        let addr = start(router.clone(), 64 * 1024).await;

        let mut anon = connect(addr).await;
        send(&mut anon, serde_json::json!({"type": "message", "content": "hi"})).await;

        let frame = recv(&mut anon).await;
        assert_eq!(frame["type"], "error");
    }

    #[tokio::test]
    async fn test_disconnect_cleans_up_role_and_price() {
        let router = router("http://127.0.0.1:9");
        let addr = start(router.clone(), 64 * 1024).await;

        let mut seller = connect(addr).await;
        send(&mut seller, serde_json::json!({"type": "role", "role": "seller"})).await;
        recv(&mut seller).await;
        send(&mut seller, serde_json::json!({"type": "price_update", "content": "120"})).await;
        recv(&mut seller).await;

        drop(seller);
        wait_for_connections(&router, 0).await;

        let state = router.hub().state().await;
        assert!(state.registry().lookup_by_role(Role::Seller).is_none());
        assert!(state.round().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_frame_drops_connection() {
        let router = router("http://127.0.0.1:9");
        let addr = start(router.clone(), 32).await;

        let mut client = connect(addr).await;
        wait_for_connections(&router, 1).await;

        let content = "x".repeat(100);
        send(&mut client, serde_json::json!({"type": "message", "content": content})).await;

        wait_for_connections(&router, 0).await;
    }

    #[tokio::test]
    async fn test_hub_close_ends_receive_loop() {
        let router = router("http://127.0.0.1:9");
        let (conn, _rx) = ChannelConnection::new();
        let conn: Arc<dyn Outbound> = Arc::new(conn);
        let (_frames_tx, frames_rx) = mpsc::unbounded_channel::<std::io::Result<BytesMut>>();
        let frames = tokio_stream_from(frames_rx);

        let task = tokio::spawn(serve_connection(router.clone(), conn.clone(), frames));
        wait_for_connections(&router, 1).await;

        conn.close();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(router.hub().connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_aborted_task_still_unregisters() {
        let router = router("http://127.0.0.1:9");
        let (conn, _rx) = ChannelConnection::new();
        let (_frames_tx, frames_rx) = mpsc::unbounded_channel::<std::io::Result<BytesMut>>();

        let task = tokio::spawn(serve_connection(
            router.clone(),
            Arc::new(conn),
            tokio_stream_from(frames_rx),
        ));
        wait_for_connections(&router, 1).await;

        task.abort();
        wait_for_connections(&router, 0).await;
    }

    fn tokio_stream_from<T: Send + 'static>(
        mut rx: mpsc::UnboundedReceiver<T>,
    ) -> impl Stream<Item = T> + Unpin {
        Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }
}
