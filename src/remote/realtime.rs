//! Realtime broadcast channel over the Phoenix websocket protocol.
//!
//! One socket per subscription: join `realtime:<topic>`, forward every
//! broadcast on it, heartbeat on the `phoenix` topic. The subscription ends
//! when the socket closes, errors, or the channel is closed by the server.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ConsoleConfig;
use crate::error::ConsoleError;
use crate::refresh::{ChannelEvent, NotificationChannel, Subscription};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const JOIN_REF: &str = "1";

/// A Phoenix channel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhoenixMessage {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

/// What an inbound frame means for the subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(ChannelEvent),
    /// The server closed or errored our channel.
    ChannelClosed,
    Ignore,
}

pub struct RealtimeChannel {
    socket_url: Url,
    topic: String,
    access_token: String,
    heartbeat: Duration,
    join_timeout: Duration,
}

impl RealtimeChannel {
    pub fn new(
        base: &Url,
        anon_key: &str,
        topic: &str,
        heartbeat: Duration,
        join_timeout: Duration,
    ) -> Result<Self, ConsoleError> {
        Ok(Self {
            socket_url: socket_url(base, anon_key)?,
            topic: format!("realtime:{}", topic),
            access_token: anon_key.to_string(),
            heartbeat,
            join_timeout,
        })
    }

    pub fn from_config(config: &ConsoleConfig, anon_key: &str) -> Result<Self, ConsoleError> {
        Self::new(
            &config.base_url()?,
            anon_key,
            &config.realtime.topic,
            Duration::from_secs(config.realtime.heartbeat_secs.max(1)),
            Duration::from_secs(config.realtime.join_timeout_secs.max(1)),
        )
    }

    pub fn join_message(&self) -> PhoenixMessage {
        PhoenixMessage {
            topic: self.topic.clone(),
            event: "phx_join".to_string(),
            payload: json!({
                "config": {
                    "broadcast": { "ack": false, "self": false },
                    "presence": { "key": "" },
                    "postgres_changes": []
                },
                "access_token": self.access_token,
            }),
            reference: Some(JOIN_REF.to_string()),
        }
    }

    /// Open the socket, send the join and wait for its reply.
    async fn handshake(&self) -> Result<Socket, ConsoleError> {
        let (mut socket, _) = connect_async(self.socket_url.as_str())
            .await
            .map_err(|e| ConsoleError::Connection(format!("Failed to open realtime socket: {}", e)))?;

        socket
            .send(encode(&self.join_message())?)
            .await
            .map_err(|e| ConsoleError::Connection(format!("Failed to send join: {}", e)))?;

        await_join_reply(&mut socket, &self.topic).await?;
        Ok(socket)
    }
}

/// `wss://<host>/realtime/v1/websocket?apikey=<key>&vsn=1.0.0` for an `https` base.
pub fn socket_url(base: &Url, anon_key: &str) -> Result<Url, ConsoleError> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ConsoleError::Config(format!(
                "Unsupported URL scheme for realtime: {}",
                other
            )))
        }
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|_| ConsoleError::Config(format!("Cannot use {} for realtime", base)))?;
    let path = format!("{}/realtime/v1/websocket", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut()
        .clear()
        .append_pair("apikey", anon_key)
        .append_pair("vsn", "1.0.0");
    Ok(url)
}

/// Classify a frame received on `topic`.
pub fn classify(message: &PhoenixMessage, topic: &str) -> Inbound {
    if message.topic != topic {
        return Inbound::Ignore;
    }
    match message.event.as_str() {
        "broadcast" => Inbound::Event(ChannelEvent {
            event: message
                .payload
                .get("event")
                .and_then(|e| e.as_str())
                .unwrap_or("broadcast")
                .to_string(),
            payload: message
                .payload
                .get("payload")
                .cloned()
                .unwrap_or(serde_json::Value::Null),
        }),
        "phx_close" | "phx_error" => Inbound::ChannelClosed,
        _ => Inbound::Ignore,
    }
}

fn encode(message: &PhoenixMessage) -> Result<Message, ConsoleError> {
    serde_json::to_string(message)
        .map(Message::Text)
        .map_err(|e| ConsoleError::Connection(format!("Failed to encode frame: {}", e)))
}

async fn await_join_reply(socket: &mut Socket, topic: &str) -> Result<(), ConsoleError> {
    while let Some(frame) = socket.next().await {
        let frame = frame.map_err(|e| ConsoleError::Connection(format!("Socket error during join: {}", e)))?;
        match frame {
            Message::Text(text) => {
                let Ok(reply) = serde_json::from_str::<PhoenixMessage>(&text) else {
                    continue;
                };
                if reply.topic != topic
                    || reply.event != "phx_reply"
                    || reply.reference.as_deref() != Some(JOIN_REF)
                {
                    continue;
                }
                let status = reply.payload.get("status").and_then(|s| s.as_str());
                if status == Some("ok") {
                    return Ok(());
                }
                return Err(ConsoleError::Connection(format!(
                    "Join of {} refused: {}",
                    topic,
                    reply.payload.get("response").cloned().unwrap_or_default()
                )));
            }
            Message::Close(_) => {
                return Err(ConsoleError::Connection("Socket closed during join".to_string()));
            }
            _ => {}
        }
    }
    Err(ConsoleError::Connection("Socket ended before join reply".to_string()))
}

async fn pump(socket: Socket, topic: String, heartbeat: Duration, events: mpsc::UnboundedSender<ChannelEvent>) {
    let (mut sink, mut stream) = socket.split();
    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let beat = PhoenixMessage {
                    topic: "phoenix".to_string(),
                    event: "heartbeat".to_string(),
                    payload: json!({}),
                    reference: Some(next_ref.to_string()),
                };
                next_ref += 1;
                let sent = match encode(&beat) {
                    Ok(frame) => sink.send(frame).await.is_ok(),
                    Err(_) => false,
                };
                if !sent {
                    warn!("Heartbeat failed on {}", topic);
                    break;
                }
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let message = match serde_json::from_str::<PhoenixMessage>(&text) {
                        Ok(m) => m,
                        Err(e) => {
                            debug!("Ignoring unparseable frame: {}", e);
                            continue;
                        }
                    };
                    match classify(&message, &topic) {
                        Inbound::Event(event) => {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        Inbound::ChannelClosed => {
                            warn!("Server closed channel {} ({})", topic, message.event);
                            break;
                        }
                        Inbound::Ignore => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Realtime socket closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Realtime socket error: {}", e);
                    break;
                }
            },
        }
    }
}

#[async_trait]
impl NotificationChannel for RealtimeChannel {
    /// The socket upgrade, the join and its reply all share `join_timeout`.
    async fn connect(&self) -> Result<Subscription, ConsoleError> {
        info!("Connecting to realtime channel {}", self.topic);
        let socket = tokio::time::timeout(self.join_timeout, self.handshake())
            .await
            .map_err(|_| {
                ConsoleError::Connection(format!("Timed out connecting to {}", self.topic))
            })??;
        info!("Joined {}", self.topic);

        let (tx, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(pump(socket, self.topic.clone(), self.heartbeat, tx));
        Ok(Subscription::with_pump(rx, pump))
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;

    use tokio::net::TcpListener;

    use super::*;

    fn frame(topic: &str, event: &str, payload: serde_json::Value) -> PhoenixMessage {
        PhoenixMessage {
            topic: topic.to_string(),
            event: event.to_string(),
            payload,
            reference: None,
        }
    }

    #[test]
    fn test_socket_url_from_https_base() {
        let base = Url::parse("https://demo.supabase.co").unwrap();
        let url = socket_url(&base, "anon").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn test_socket_url_keeps_base_path_and_plain_http() {
        let base = Url::parse("http://localhost:54321/").unwrap();
        let url = socket_url(&base, "k").unwrap();
        assert_eq!(url.as_str(), "ws://localhost:54321/realtime/v1/websocket?apikey=k&vsn=1.0.0");
    }

    #[test]
    fn test_socket_url_rejects_other_schemes() {
        let base = Url::parse("ftp://example.com").unwrap();
        assert!(socket_url(&base, "k").is_err());
    }

    #[test]
    fn test_join_message_shape() {
        let base = Url::parse("https://demo.supabase.co").unwrap();
        let channel = RealtimeChannel::new(
            &base,
            "anon",
            "login_updates",
            Duration::from_secs(30),
            Duration::from_secs(10),
        )
        .unwrap();
        let join = serde_json::to_value(channel.join_message()).unwrap();
        assert_eq!(join["topic"], "realtime:login_updates");
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["ref"], "1");
        assert_eq!(join["payload"]["config"]["broadcast"]["self"], false);
        assert_eq!(join["payload"]["access_token"], "anon");
    }

    #[test]
    fn test_classify_broadcast() {
        let msg = frame(
            "realtime:login_updates",
            "broadcast",
            json!({ "type": "broadcast", "event": "login", "payload": { "user": "lobby" } }),
        );
        match classify(&msg, "realtime:login_updates") {
            Inbound::Event(event) => {
                assert_eq!(event.event, "login");
                assert_eq!(event.payload["user"], "lobby");
            }
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_broadcast_without_event_name() {
        let msg = frame("realtime:login_updates", "broadcast", json!({}));
        assert_eq!(
            classify(&msg, "realtime:login_updates"),
            Inbound::Event(ChannelEvent {
                event: "broadcast".to_string(),
                payload: serde_json::Value::Null,
            })
        );
    }

    #[test]
    fn test_classify_other_frames() {
        let topic = "realtime:login_updates";
        assert_eq!(classify(&frame("phoenix", "phx_reply", json!({})), topic), Inbound::Ignore);
        assert_eq!(classify(&frame(topic, "presence_state", json!({})), topic), Inbound::Ignore);
        assert_eq!(classify(&frame(topic, "phx_error", json!({})), topic), Inbound::ChannelClosed);
        assert_eq!(classify(&frame(topic, "phx_close", json!({})), topic), Inbound::ChannelClosed);
    }

    #[test]
    fn test_parse_reply_frame() {
        let raw = r#"{"topic":"realtime:login_updates","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#;
        let msg: PhoenixMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.reference.as_deref(), Some("1"));
        assert_eq!(msg.payload["status"], "ok");
    }

    type ServerSocket = WebSocketStream<TcpStream>;

    const TOPIC: &str = "realtime:login_updates";

    /// Accept one websocket client and hand it to `script`. Returns the base URL.
    async fn serve<F, Fut>(script: F) -> Url
    where
        F: FnOnce(ServerSocket) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let socket = tokio_tungstenite::accept_async(stream).await.unwrap();
            script(socket).await;
        });
        Url::parse(&format!("http://{}", addr)).unwrap()
    }

    async fn next_frame(socket: &mut ServerSocket) -> PhoenixMessage {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("client went away: {:?}", other),
            }
        }
    }

    async fn reply(socket: &mut ServerSocket, status: &str) {
        let frame = json!({
            "topic": TOPIC,
            "event": "phx_reply",
            "payload": { "status": status, "response": { "reason": "unauthorized" } },
            "ref": JOIN_REF,
        });
        socket.send(Message::Text(frame.to_string())).await.unwrap();
    }

    fn channel(base: &Url, heartbeat: Duration, join_timeout: Duration) -> RealtimeChannel {
        RealtimeChannel::new(base, "anon", "login_updates", heartbeat, join_timeout).unwrap()
    }

    #[tokio::test]
    async fn test_join_then_forward_broadcast_until_close() {
        let base = serve(|mut socket| async move {
            let join = next_frame(&mut socket).await;
            assert_eq!(join.event, "phx_join");
            assert_eq!(join.topic, TOPIC);
            reply(&mut socket, "ok").await;

            let broadcast = json!({
                "topic": TOPIC,
                "event": "broadcast",
                "payload": { "type": "broadcast", "event": "login", "payload": { "user": "lobby" } },
                "ref": null,
            });
            socket.send(Message::Text(broadcast.to_string())).await.unwrap();
            socket.close(None).await.unwrap();
        })
        .await;

        let mut subscription = channel(&base, Duration::from_secs(30), Duration::from_secs(5))
            .connect()
            .await
            .unwrap();

        let event = subscription.next_event().await.unwrap();
        assert_eq!(event.event, "login");
        assert_eq!(event.payload["user"], "lobby");

        // A close frame ends the stream.
        let ended = tokio::time::timeout(Duration::from_secs(5), subscription.next_event()).await;
        assert_eq!(ended.unwrap(), None);
    }

    #[tokio::test]
    async fn test_refused_join_is_a_connection_error() {
        let base = serve(|mut socket| async move {
            next_frame(&mut socket).await;
            reply(&mut socket, "error").await;
            // Hold the socket open until the client gives up.
            let _ = socket.next().await;
        })
        .await;

        let err = channel(&base, Duration::from_secs(30), Duration::from_secs(5))
            .connect()
            .await
            .unwrap_err();
        match err {
            ConsoleError::Connection(message) => {
                assert!(message.contains("refused"), "unexpected message: {}", message);
                assert!(message.contains("unauthorized"));
            }
            other => panic!("expected connection error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_heartbeat_sent_on_phoenix_topic() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let base = serve(move |mut socket| async move {
            next_frame(&mut socket).await;
            reply(&mut socket, "ok").await;
            let beat = next_frame(&mut socket).await;
            let _ = seen_tx.send(beat);
            let _ = socket.close(None).await;
        })
        .await;

        let _subscription = channel(&base, Duration::from_millis(100), Duration::from_secs(5))
            .connect()
            .await
            .unwrap();

        let beat = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(beat.topic, "phoenix");
        assert_eq!(beat.event, "heartbeat");
        assert_eq!(beat.reference.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_stalled_upgrade_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept the TCP connection but never answer the upgrade request.
        let holder = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(stream);
        });

        let base = Url::parse(&format!("http://{}", addr)).unwrap();
        let started = std::time::Instant::now();
        let err = channel(&base, Duration::from_secs(30), Duration::from_millis(300))
            .connect()
            .await
            .unwrap_err();

        assert!(matches!(err, ConsoleError::Connection(ref m) if m.contains("Timed out")));
        assert!(started.elapsed() < Duration::from_secs(5));
        holder.abort();
    }
}
