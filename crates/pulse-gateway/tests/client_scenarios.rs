//! End-to-end engine scenarios against a scripted transport.

use async_trait::async_trait;
use pulse_gateway::protocol::{GatewayMessage, OpCode, CLOSE_INTERNAL_RETRY};
use pulse_gateway::transport::{
    Connector, Transport, TransportError, TransportEvent,
};
use pulse_gateway::voice::{MediaSession, MediaSessionFactory};
use pulse_gateway::{
    Compression, Encoding, GatewayClient, GatewayError, GatewayEvent, GatewayOptions,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// === Scripted transport ===

#[derive(Default)]
struct MockState {
    connects: AtomicUsize,
    link: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    sent: Mutex<Vec<GatewayMessage>>,
    closes: Mutex<Vec<(u16, String)>>,
}

/// Test-side handle to the scripted gateway.
#[derive(Clone)]
struct MockGateway {
    state: Arc<MockState>,
}

impl MockGateway {
    fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
        }
    }

    fn connector(&self) -> Box<dyn Connector> {
        Box::new(MockConnector {
            state: Arc::clone(&self.state),
        })
    }

    fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    fn sent(&self) -> Vec<GatewayMessage> {
        self.state.sent.lock().unwrap().clone()
    }

    fn sent_ops(&self) -> Vec<OpCode> {
        self.sent().iter().map(|m| m.op).collect()
    }

    fn count_op(&self, op: OpCode) -> usize {
        self.sent_ops().iter().filter(|o| **o == op).count()
    }

    fn closes(&self) -> Vec<(u16, String)> {
        self.state.closes.lock().unwrap().clone()
    }

    async fn server_send(&self, message: GatewayMessage) {
        let link = self.state.link.lock().unwrap().clone();
        let tx = link.expect("no live connection");
        let bytes = serde_json::to_vec(&message).unwrap();
        tx.send(TransportEvent::Message(bytes)).await.unwrap();
    }

    async fn server_close(&self, code: u16, reason: &str) {
        let link = self.state.link.lock().unwrap().clone();
        let tx = link.expect("no live connection");
        tx.send(TransportEvent::Closed {
            code: Some(code),
            reason: reason.to_string(),
        })
        .await
        .unwrap();
    }

    async fn wait_until(&self, what: &str, cond: impl Fn(&MockGateway) -> bool) {
        for _ in 0..4_000 {
            if cond(self) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("timed out waiting for: {what}");
    }
}

struct MockConnector {
    state: Arc<MockState>,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _url: &str,
    ) -> Result<(Box<dyn Transport>, mpsc::Receiver<TransportEvent>), TransportError> {
        let (tx, rx) = mpsc::channel(64);
        tx.send(TransportEvent::Open).await.ok();

        *self.state.link.lock().unwrap() = Some(tx);
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        let transport = MockTransport {
            state: Arc::clone(&self.state),
        };
        Ok((Box::new(transport), rx))
    }
}

struct MockTransport {
    state: Arc<MockState>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, data: Vec<u8>, _binary: bool) -> Result<(), TransportError> {
        let message: GatewayMessage =
            serde_json::from_slice(&data).map_err(|e| TransportError::Send(e.to_string()))?;
        self.state.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self, code: u16, reason: &str) {
        self.state
            .closes
            .lock()
            .unwrap()
            .push((code, reason.to_string()));
    }
}

// === Mock media engine ===

#[derive(Default)]
struct MockMediaSession {
    server_id: String,
    session_id: Mutex<Option<String>>,
    channel_id: Mutex<Option<String>>,
    endpoint: Mutex<Option<String>>,
    token: Mutex<Option<String>>,
    killed: Mutex<Option<String>>,
}

impl MediaSession for MockMediaSession {
    fn server_id(&self) -> &str {
        &self.server_id
    }
    fn session_id(&self) -> Option<String> {
        self.session_id.lock().unwrap().clone()
    }
    fn channel_id(&self) -> Option<String> {
        self.channel_id.lock().unwrap().clone()
    }
    fn set_channel_id(&self, channel_id: Option<String>) {
        *self.channel_id.lock().unwrap() = channel_id;
    }
    fn set_endpoint(&self, endpoint: String) {
        *self.endpoint.lock().unwrap() = Some(endpoint);
    }
    fn set_token(&self, token: String) {
        *self.token.lock().unwrap() = Some(token);
    }
    fn kill(&self, reason: Option<&str>) {
        *self.killed.lock().unwrap() = Some(reason.unwrap_or("").to_string());
    }
}

#[derive(Default)]
struct MockMediaFactory {
    created: Mutex<Vec<Arc<MockMediaSession>>>,
}

impl MockMediaFactory {
    fn last(&self) -> Arc<MockMediaSession> {
        self.created.lock().unwrap().last().unwrap().clone()
    }
}

impl MediaSessionFactory for MockMediaFactory {
    fn create(&self, server_id: &str, _channel_id: &str) -> Arc<dyn MediaSession> {
        let session = Arc::new(MockMediaSession {
            server_id: server_id.to_string(),
            ..MockMediaSession::default()
        });
        self.created.lock().unwrap().push(session.clone());
        session
    }
}

// === Frame builders ===

fn hello(interval_ms: u64) -> GatewayMessage {
    GatewayMessage::new(
        OpCode::Hello,
        Some(json!({ "heartbeat_interval": interval_ms })),
    )
}

fn heartbeat_ack() -> GatewayMessage {
    GatewayMessage::new(OpCode::HeartbeatAck, None)
}

fn dispatch(name: &str, sequence: u64, payload: serde_json::Value) -> GatewayMessage {
    GatewayMessage {
        op: OpCode::Dispatch,
        d: Some(payload),
        s: Some(sequence),
        t: Some(name.to_string()),
    }
}

fn ready(sequence: u64) -> GatewayMessage {
    dispatch(
        "READY",
        sequence,
        json!({ "session_id": "S1", "user": { "id": "U1" }, "_trace": ["gw-test"] }),
    )
}

fn test_options() -> GatewayOptions {
    GatewayOptions::new("test-token")
        .with_encoding(Encoding::Json)
        .with_compression(Compression::None)
}

async fn connected_client(
    gateway: &MockGateway,
    options: GatewayOptions,
) -> (GatewayClient, mpsc::Receiver<GatewayEvent>) {
    let (client, events) = GatewayClient::with_connector(options, gateway.connector()).unwrap();
    client.connect(Some("wss://gateway.test")).await.unwrap();
    (client, events)
}

// === Scenarios ===

#[tokio::test(start_paused = true)]
async fn happy_path_identify_and_ready() {
    let gateway = MockGateway::new();
    let (client, mut events) = connected_client(&gateway, test_options()).await;

    // The handshake goes out directly on open.
    gateway
        .wait_until("identify", |g| g.count_op(OpCode::Identify) == 1)
        .await;
    let identify = gateway.sent().into_iter().next().unwrap();
    let d = identify.d.unwrap();
    assert_eq!(d["token"], "test-token");
    assert_eq!(d["large_threshold"], 250);
    assert_eq!(d["guild_subscriptions"], true);

    gateway.server_send(hello(45_000)).await;

    // HELLO fires one immediate heartbeat.
    gateway
        .wait_until("first heartbeat", |g| g.count_op(OpCode::Heartbeat) == 1)
        .await;
    gateway.server_send(heartbeat_ack()).await;

    gateway.server_send(ready(1)).await;

    // Wait for the session fields to land.
    for _ in 0..100 {
        if client.session_id().await.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(client.session_id().await.as_deref(), Some("S1"));
    assert_eq!(client.user_id().await.as_deref(), Some("U1"));
    assert_eq!(client.sequence().await, 1);

    // READY surfaced as a typed notification.
    let mut saw_ready = false;
    while let Ok(event) = events.try_recv() {
        if let GatewayEvent::Ready { session_id, user_id } = event {
            assert_eq!(session_id, "S1");
            assert_eq!(user_id, "U1");
            saw_ready = true;
        }
    }
    assert!(saw_ready);

    // READY unlocks the bucket: a paced command now reaches the wire.
    client
        .update_presence(&pulse_gateway::PresencePatch::status(
            pulse_gateway::PresenceStatus::Idle,
        ))
        .await;
    gateway
        .wait_until("paced presence update", |g| {
            g.count_op(OpCode::PresenceUpdate) == 1
        })
        .await;

    // The heartbeat timer keeps the 45s period.
    gateway
        .wait_until("second heartbeat", |g| g.count_op(OpCode::Heartbeat) == 2)
        .await;
    let beats = gateway.count_op(OpCode::Heartbeat);
    assert!(beats >= 2);

    assert_eq!(gateway.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn sequence_gap_triggers_resume() {
    let gateway = MockGateway::new();
    let (client, _events) = connected_client(&gateway, test_options()).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(1)).await;
    gateway
        .wait_until("ready processed", |g| g.count_op(OpCode::Identify) == 1)
        .await;

    // Sequence jumps 1 -> 5: events were lost.
    gateway
        .server_send(dispatch("MESSAGE_CREATE", 5, json!({})))
        .await;

    gateway
        .wait_until("resume sent", |g| g.count_op(OpCode::Resume) == 1)
        .await;

    let resume = gateway
        .sent()
        .into_iter()
        .find(|m| m.op == OpCode::Resume)
        .unwrap();
    let d = resume.d.unwrap();
    assert_eq!(d["session_id"], "S1");
    assert_eq!(d["seq"], 1);

    assert!(client.is_resuming());
    assert_eq!(client.sequence().await, 1, "gap must not advance the counter");

    // RESUMED clears the flag.
    gateway
        .server_send(GatewayMessage {
            op: OpCode::Dispatch,
            d: None,
            s: None,
            t: Some("RESUMED".to_string()),
        })
        .await;
    gateway.wait_until("resumed", |_| !client.is_resuming()).await;
}

#[tokio::test(start_paused = true)]
async fn missed_heartbeat_ack_recycles_connection() {
    let gateway = MockGateway::new();
    let (_client, _events) = connected_client(&gateway, test_options()).await;

    gateway.server_send(hello(45_000)).await;
    gateway
        .wait_until("first heartbeat", |g| g.count_op(OpCode::Heartbeat) == 1)
        .await;

    // Never ack. The next tick must tear the connection down and re-open.
    gateway.wait_until("reconnect", |g| g.connects() == 2).await;

    let closes = gateway.closes();
    let (code, reason) = closes.first().expect("engine closed the transport");
    assert_eq!(*code, CLOSE_INTERNAL_RETRY);
    assert!(reason.contains("heartbeat"), "close reason was: {reason}");
}

#[tokio::test(start_paused = true)]
async fn invalid_session_resumable_resumes_with_state() {
    let gateway = MockGateway::new();
    let (client, _events) = connected_client(&gateway, test_options()).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(3)).await;
    gateway
        .wait_until("session ready", |g| g.count_op(OpCode::Identify) == 1)
        .await;

    gateway
        .server_send(GatewayMessage::new(OpCode::InvalidSession, Some(json!(true))))
        .await;

    // Within the 1-6s jitter a RESUME goes out, state intact.
    gateway
        .wait_until("resume after invalid session", |g| {
            g.count_op(OpCode::Resume) == 1
        })
        .await;

    let resume = gateway
        .sent()
        .into_iter()
        .find(|m| m.op == OpCode::Resume)
        .unwrap();
    let d = resume.d.unwrap();
    assert_eq!(d["session_id"], "S1");
    assert_eq!(d["seq"], 3);
    assert_eq!(client.sequence().await, 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_session_fresh_reidentifies() {
    let gateway = MockGateway::new();
    let (client, _events) = connected_client(&gateway, test_options()).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(3)).await;
    gateway
        .wait_until("session ready", |g| g.count_op(OpCode::Identify) == 1)
        .await;

    gateway
        .server_send(GatewayMessage::new(OpCode::InvalidSession, Some(json!(false))))
        .await;

    // Within the jitter the session is wiped and a fresh IDENTIFY goes out
    // on the same connection.
    gateway
        .wait_until("second identify", |g| g.count_op(OpCode::Identify) == 2)
        .await;

    assert_eq!(client.session_id().await, None);
    assert_eq!(client.sequence().await, 0);
    assert_eq!(gateway.count_op(OpCode::Resume), 0);
    assert_eq!(gateway.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn server_reconnect_request_resumes_on_new_transport() {
    let gateway = MockGateway::new();
    let (_client, _events) = connected_client(&gateway, test_options()).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(2)).await;
    gateway
        .wait_until("session ready", |g| g.count_op(OpCode::Identify) == 1)
        .await;

    gateway
        .server_send(GatewayMessage::new(OpCode::Reconnect, None))
        .await;

    gateway.wait_until("reconnected", |g| g.connects() == 2).await;

    // Session survived the internal retry; the new transport resumes.
    gateway
        .wait_until("resume on reopen", |g| g.count_op(OpCode::Resume) == 1)
        .await;
    assert_eq!(gateway.count_op(OpCode::Identify), 1);
}

#[tokio::test(start_paused = true)]
async fn close_wipes_session_on_normal_codes_only() {
    let gateway = MockGateway::new();
    let options = test_options().with_reconnect(Duration::from_millis(100), 5);
    let (client, _events) = connected_client(&gateway, options).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(2)).await;
    gateway
        .wait_until("session ready", |g| g.count_op(OpCode::Identify) == 1)
        .await;

    // An abnormal server close preserves the session: reconnect resumes.
    gateway.server_close(4009, "session timeout").await;
    gateway.wait_until("second connect", |g| g.connects() == 2).await;
    gateway
        .wait_until("resume", |g| g.count_op(OpCode::Resume) == 1)
        .await;

    gateway.server_send(hello(45_000)).await;
    gateway
        .server_send(GatewayMessage {
            op: OpCode::Dispatch,
            d: None,
            s: None,
            t: Some("RESUMED".to_string()),
        })
        .await;
    gateway.wait_until("resumed", |_| !client.is_resuming()).await;

    // A normal close wipes it: the next open identifies again.
    gateway.server_close(1000, "bye").await;
    gateway.wait_until("third connect", |g| g.connects() == 3).await;
    gateway
        .wait_until("re-identify", |g| g.count_op(OpCode::Identify) == 2)
        .await;
    assert_eq!(client.session_id().await, None);
}

#[tokio::test(start_paused = true)]
async fn reconnect_budget_exhaustion_kills() {
    let gateway = MockGateway::new();
    let options = test_options().with_reconnect(Duration::from_millis(50), 0);
    let (client, mut events) = connected_client(&gateway, options).await;

    gateway.server_send(hello(45_000)).await;

    // Two abnormal closes: the first consumes the whole budget, the second
    // exceeds it.
    gateway.server_close(4000, "oops").await;
    gateway.wait_until("retry", |g| g.connects() == 2).await;
    gateway.server_close(4000, "oops again").await;

    gateway.wait_until("killed", |_| client.is_killed()).await;

    let mut killed_count = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, GatewayEvent::Killed) {
            killed_count += 1;
        }
    }
    assert_eq!(killed_count, 1);
    assert_eq!(gateway.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn voice_connect_times_out_and_kills_media_session() {
    let gateway = MockGateway::new();
    let factory = Arc::new(MockMediaFactory::default());
    let options = test_options().with_media_factory(factory.clone());
    let (client, _events) = connected_client(&gateway, options).await;

    let result = client
        .voice_connect_with_timeout(Some("G"), Some("C"), Duration::from_millis(100))
        .await;

    assert!(matches!(result, Err(GatewayError::VoiceTimeout)));

    let session = factory.last();
    let killed = session.killed.lock().unwrap().clone();
    assert!(killed.expect("session must be killed").contains("timed out"));
    assert_eq!(client.media_session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn voice_connect_resolves_on_matching_state() {
    let gateway = MockGateway::new();
    let factory = Arc::new(MockMediaFactory::default());
    let options = test_options().with_media_factory(factory.clone());
    let (client, _events) = connected_client(&gateway, options).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(1)).await;
    gateway
        .wait_until("session ready", |g| g.count_op(OpCode::Identify) == 1)
        .await;

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.voice_connect(Some("G"), Some("C")).await })
    };

    // The engine announces the join through the bucket.
    gateway
        .wait_until("voice state update", |g| {
            g.count_op(OpCode::VoiceStateUpdate) == 1
        })
        .await;

    // Server confirms our state; then pushes the media endpoint.
    gateway
        .server_send(dispatch(
            "VOICE_STATE_UPDATE",
            2,
            json!({ "guild_id": "G", "channel_id": "C", "user_id": "U1", "session_id": "VS1" }),
        ))
        .await;
    gateway
        .server_send(dispatch(
            "VOICE_SERVER_UPDATE",
            3,
            json!({ "guild_id": "G", "endpoint": "media.example.com", "token": "media-token" }),
        ))
        .await;

    let session = connecting.await.unwrap().unwrap().expect("a live session");
    assert_eq!(session.server_id(), "G");
    assert_eq!(session.channel_id().as_deref(), Some("C"));

    let created = factory.last();
    gateway
        .wait_until("endpoint pushed", |_| {
            created.endpoint.lock().unwrap().is_some()
        })
        .await;
    assert_eq!(
        created.endpoint.lock().unwrap().as_deref(),
        Some("media.example.com")
    );
    assert_eq!(created.token.lock().unwrap().as_deref(), Some("media-token"));
}

#[tokio::test(start_paused = true)]
async fn guild_delete_kills_media_session() {
    let gateway = MockGateway::new();
    let factory = Arc::new(MockMediaFactory::default());
    let options = test_options().with_media_factory(factory.clone());
    let (client, _events) = connected_client(&gateway, options).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(1)).await;

    let connecting = {
        let client = client.clone();
        tokio::spawn(async move { client.voice_connect(Some("G"), Some("C")).await })
    };

    gateway
        .wait_until("voice state update", |g| {
            g.count_op(OpCode::VoiceStateUpdate) == 1
        })
        .await;
    gateway
        .server_send(dispatch(
            "VOICE_STATE_UPDATE",
            2,
            json!({ "guild_id": "G", "channel_id": "C", "user_id": "U1" }),
        ))
        .await;
    connecting.await.unwrap().unwrap();

    gateway
        .server_send(dispatch("GUILD_DELETE", 3, json!({ "id": "G" })))
        .await;

    gateway
        .wait_until("media session killed", |_| client.media_session_count() == 0)
        .await;
    let killed = factory.last().killed.lock().unwrap().clone();
    assert_eq!(killed.as_deref(), Some("left the guild"));
}

#[tokio::test(start_paused = true)]
async fn disabled_events_are_suppressed() {
    let gateway = MockGateway::new();
    let options = test_options().with_disabled_event("TYPING_START");
    let (_client, mut events) = connected_client(&gateway, options).await;

    gateway.server_send(hello(45_000)).await;
    gateway.server_send(ready(1)).await;
    gateway
        .server_send(dispatch("TYPING_START", 2, json!({ "channel_id": "C" })))
        .await;
    gateway
        .server_send(dispatch("MESSAGE_CREATE", 3, json!({ "content": "hi" })))
        .await;

    let mut names = Vec::new();
    gateway
        .wait_until("message dispatched", |g| g.count_op(OpCode::Identify) == 1)
        .await;
    for _ in 0..200 {
        match events.try_recv() {
            Ok(GatewayEvent::Dispatch { name, .. }) => names.push(name),
            Ok(_) => {}
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
        if names.contains(&"MESSAGE_CREATE".to_string()) {
            break;
        }
    }

    assert!(names.contains(&"MESSAGE_CREATE".to_string()));
    assert!(!names.contains(&"TYPING_START".to_string()));
}
