//! Gateway client
//!
//! The engine proper: owns the transport, the session, the heartbeat
//! controller, the rate bucket and the media registry, and drives the
//! connect/disconnect/reconnect lifecycle. All protocol callbacks arrive
//! through a single transport event channel, so state mutations are
//! naturally serialized; background tasks (heartbeat, pacing, delayed
//! reconnect) go through the same locked state.

use super::heartbeat::{run_beat, HeartbeatState};
use super::session::{SequenceOutcome, SessionState};
use super::state::ConnectionState;
use crate::codec::{Codec, StreamDecompressor};
use crate::error::GatewayError;
use crate::events::{GatewayEvent, EVENT_CHANNEL_SIZE};
use crate::handlers::MessageDispatcher;
use crate::options::GatewayOptions;
use crate::presence::{Presence, PresencePatch};
use crate::protocol::{
    identify_properties, wipes_session, CloseCode, GatewayMessage, IdentifyPayload,
    LobbyConnectPayload, OpCode, ReadyPayload, RequestGuildMembersPayload, ResumePayload,
    StreamKeyPayload, VoiceStatePayload, CLOSE_INTERNAL_RETRY, CLOSE_NORMAL, GATEWAY_VERSION,
};
use crate::ratelimit::RateBucket;
use crate::transport::{Connector, Transport, TransportEvent, WebSocketConnector};
use crate::voice::{MediaSession, VoiceRegistry};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use url::Url;

/// An encoded frame waiting in the rate bucket
pub(crate) struct OutboundFrame {
    pub op: OpCode,
    pub bytes: Vec<u8>,
}

/// Shared engine state
pub(crate) struct GatewayInner {
    pub(crate) options: GatewayOptions,
    pub(crate) codec: Codec,
    pub(crate) bucket: RateBucket<OutboundFrame>,
    pub(crate) session: RwLock<SessionState>,
    pub(crate) heartbeat: Mutex<HeartbeatState>,
    pub(crate) state: RwLock<ConnectionState>,
    pub(crate) resuming: AtomicBool,
    pub(crate) reconnects: AtomicU32,
    pub(crate) voice: VoiceRegistry,

    connector: Box<dyn Connector>,
    decompressor: Mutex<Option<StreamDecompressor>>,
    transport: Mutex<Option<Box<dyn Transport>>>,
    url: RwLock<Option<String>>,
    killed: AtomicBool,
    /// Connection epoch; bumping it orphans the previous transport reader
    epoch: AtomicU64,
    connect_gate: Mutex<()>,
    reconnect_task: StdMutex<Option<JoinHandle<()>>>,
    worker_task: StdMutex<Option<JoinHandle<()>>>,
    events_tx: mpsc::Sender<GatewayEvent>,
}

impl GatewayInner {
    // === Lifecycle ===

    // `connect` and `schedule_reconnect` call each other across a
    // `tokio::spawn` boundary; returning a boxed future here (instead of
    // relying on the inferred `impl Future` of an `async fn`) breaks the
    // otherwise-cyclic opaque-type dependency between the two so the
    // compiler can prove the spawned futures are `Send`.
    pub(crate) fn connect<'a>(
        self: &'a Arc<Self>,
        url: Option<&'a str>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), GatewayError>> + Send + 'a>>
    {
        Box::pin(async move {
            if self.is_killed() {
                tracing::debug!("Connect ignored: engine is dead");
                return Ok(());
            }

            let _gate = self.connect_gate.lock().await;
            self.ensure_worker();

            if self.transport.lock().await.is_some() {
                self.disconnect(CLOSE_NORMAL, "reconnecting").await;
            }

            let target = self.compose_url(url).await?;
            *self.state.write().await = ConnectionState::Connecting;

            // Each connection is a fresh compressed stream.
            if self.options.compress.is_enabled() {
                *self.decompressor.lock().await = Some(StreamDecompressor::new());
            }

            tracing::info!(url = %target, "Connecting to gateway");

            match self.connector.connect(&target).await {
                Ok((transport, events)) => {
                    *self.transport.lock().await = Some(transport);
                    let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                    self.spawn_reader(epoch, events);
                    Ok(())
                }
                Err(e) => {
                    self.warn(format!("gateway connect failed: {e}")).await;
                    if self.options.auto_reconnect && !self.is_killed() {
                        self.schedule_reconnect().await;
                    }
                    Ok(())
                }
            }
        })
    }

    /// Build the connection URL from the explicit argument or the stored one
    async fn compose_url(&self, explicit: Option<&str>) -> Result<String, GatewayError> {
        let mut stored = self.url.write().await;
        let base = match explicit {
            Some(given) => {
                *stored = Some(given.to_string());
                given.to_string()
            }
            None => stored.clone().ok_or(GatewayError::MissingUrl)?,
        };

        let mut url = Url::parse(&base).map_err(|e| GatewayError::InvalidUrl(e.to_string()))?;
        if url.path().is_empty() {
            url.set_path("/");
        }

        {
            let mut query = url.query_pairs_mut();
            query.clear();
            query.append_pair("encoding", self.codec.encoding().wire_name());
            query.append_pair("v", &GATEWAY_VERSION.to_string());
            if let Some(compress) = self.options.compress.wire_name() {
                query.append_pair("compress", compress);
            }
        }

        Ok(url.to_string())
    }

    pub(crate) async fn disconnect(&self, code: u16, reason: &str) {
        self.cleanup(code).await;

        if let Some(transport) = self.transport.lock().await.take() {
            tracing::info!(code = code, reason = %reason, "Disconnecting from gateway");
            transport.close(code, reason).await;
        }

        self.resuming.store(false, Ordering::SeqCst);
    }

    /// Quiesce everything tied to the current connection
    async fn cleanup(&self, code: u16) {
        // Orphan the current transport reader; the next connect spawns a
        // fresh one.
        self.epoch.fetch_add(1, Ordering::SeqCst);

        let dropped = self.bucket.clear();
        if dropped > 0 {
            tracing::debug!(dropped = dropped, "Dropped queued outbound frames");
        }
        self.bucket.lock();

        if let Some(decompressor) = self.decompressor.lock().await.as_mut() {
            decompressor.reset();
        }

        if wipes_session(code) {
            self.session.write().await.wipe();
            tracing::debug!("Session wiped; next open will identify");
        }

        self.heartbeat.lock().await.stop();
    }

    /// Tear down and immediately re-open, preserving session state
    pub(crate) async fn recycle(self: &Arc<Self>, reason: &str) {
        tracing::warn!(reason = %reason, "Recycling gateway connection");
        self.disconnect(CLOSE_INTERNAL_RETRY, reason).await;

        if let Err(e) = self.connect(None).await {
            self.warn(format!("reconnect after '{reason}' failed: {e}")).await;
        }
    }

    pub(crate) async fn kill(self: &Arc<Self>) {
        if self.killed.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::info!("Killing gateway engine");
        self.disconnect(CLOSE_NORMAL, "client shutdown").await;

        if let Some(task) = self.reconnect_task.lock().expect("reconnect slot poisoned").take() {
            task.abort();
        }
        if let Some(task) = self.worker_task.lock().expect("worker slot poisoned").take() {
            task.abort();
        }

        self.voice.kill_all(Some("gateway killed"));
        *self.state.write().await = ConnectionState::Dead;
        self.emit(GatewayEvent::Killed).await;
    }

    // === Transport callbacks ===

    fn spawn_reader(self: &Arc<Self>, epoch: u64, mut events: mpsc::Receiver<TransportEvent>) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if client.epoch.load(Ordering::SeqCst) != epoch {
                    break; // superseded connection
                }
                let closing = matches!(event, TransportEvent::Closed { .. });
                client.on_event(event).await;
                if closing {
                    break;
                }
            }
        });
    }

    async fn on_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::Open => self.on_open().await,
            TransportEvent::Message(data) => self.on_message(data).await,
            TransportEvent::Error(error) => self.warn(format!("transport error: {error}")).await,
            TransportEvent::Closed { code, reason } => self.on_close(code, reason).await,
        }
    }

    async fn on_open(self: &Arc<Self>) {
        tracing::info!("Transport open");

        // The bucket is still locked from cleanup; the handshake goes out
        // directly.
        if self.session.read().await.can_resume() {
            self.begin_resume().await;
        } else {
            self.send_identify().await;
        }
    }

    async fn on_message(self: &Arc<Self>, data: Vec<u8>) {
        let inflated = {
            let mut guard = self.decompressor.lock().await;
            match guard.as_mut() {
                None => Ok(Some(data)),
                Some(decompressor) => decompressor.feed(&data),
            }
        };

        let bytes = match inflated {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return, // partial compressed frame
            Err(e) => {
                self.warn(format!("invalid compressed data: {e}")).await;
                self.recycle("invalid data on the compressed stream").await;
                return;
            }
        };

        match self.codec.decode(&bytes) {
            Ok(message) => MessageDispatcher::dispatch(self, message).await,
            Err(e) => self.warn(format!("failed to decode inbound frame: {e}")).await,
        }
    }

    async fn on_close(self: &Arc<Self>, code: Option<u16>, reason: String) {
        tracing::info!(code = ?code, reason = %reason, "Gateway connection closed");
        self.emit(GatewayEvent::Close {
            code,
            reason: reason.clone(),
        })
        .await;

        // A close without a code preserves the session for resume.
        self.cleanup(code.unwrap_or(CLOSE_INTERNAL_RETRY)).await;

        // A server close code that invalidates the session forces the next
        // open to identify.
        if let Some(code) = code.and_then(CloseCode::from_u16) {
            if !code.should_resume() {
                self.session.write().await.wipe();
            }
        }

        self.transport.lock().await.take();
        self.resuming.store(false, Ordering::SeqCst);

        if self.options.auto_reconnect && !self.is_killed() {
            self.schedule_reconnect().await;
        }
    }

    async fn schedule_reconnect(self: &Arc<Self>) {
        let attempts = self.reconnects.load(Ordering::SeqCst);
        if attempts > self.options.reconnect_max {
            tracing::warn!(attempts = attempts, "Reconnect budget exhausted");
            self.kill().await;
            return;
        }

        *self.state.write().await = ConnectionState::Reconnecting;
        let delay = self.options.reconnect_delay;
        tracing::info!(
            attempt = attempts + 1,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        let client = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if client.is_killed() {
                return;
            }
            if let Err(e) = client.connect(None).await {
                client.warn(format!("reconnect failed: {e}")).await;
            }
        });

        if let Some(old) = self
            .reconnect_task
            .lock()
            .expect("reconnect slot poisoned")
            .replace(task)
        {
            old.abort();
        }

        self.reconnects.fetch_add(1, Ordering::SeqCst);
    }

    // === Heartbeat ===

    /// Arm the heartbeat controller from HELLO
    pub(crate) async fn start_heartbeat(self: &Arc<Self>, interval_ms: u64) {
        *self.state.write().await = ConnectionState::Open;

        // Hold the lock across the spawn: the task's immediate first tick
        // blocks on it until the controller is armed.
        let mut heartbeat = self.heartbeat.lock().await;
        let task = tokio::spawn(run_beat(Arc::clone(self), interval_ms));
        heartbeat.arm(interval_ms, task);
    }

    /// One beat: send, unless the previous beat was never acknowledged
    pub(crate) async fn heartbeat_tick(self: &Arc<Self>) {
        let acked = self.heartbeat.lock().await.acked;
        if !acked {
            // The beat task cannot tear itself down; recycle from a
            // detached task.
            let client = Arc::clone(self);
            tokio::spawn(async move {
                client.recycle("heartbeat ack never arrived").await;
            });
            return;
        }

        self.send_heartbeat().await;
    }

    pub(crate) async fn send_heartbeat(&self) {
        let sequence = self.session.read().await.last_sequence();
        self.heartbeat.lock().await.mark_sent();
        tracing::trace!(sequence = ?sequence, "Sending heartbeat");
        self.send(GatewayMessage::heartbeat(sequence), true).await;
    }

    // === Session handshake ===

    pub(crate) async fn send_identify(&self) {
        let presence = self
            .options
            .presence
            .as_ref()
            .map(|configured| Presence::layered(&[configured]));

        let payload = IdentifyPayload {
            token: self.options.token.clone(),
            properties: identify_properties().clone(),
            // Transport-stream compression is negotiated in the URL.
            compress: false,
            large_threshold: self.options.large_threshold,
            shard: self.options.identify_shard(),
            guild_subscriptions: self.options.guild_subscriptions,
            presence,
        };

        tracing::info!("Identifying");
        self.send(GatewayMessage::identify(&payload), true).await;
    }

    pub(crate) async fn begin_resume(&self) {
        let (session_id, seq) = {
            let session = self.session.read().await;
            (session.session_id.clone(), session.sequence)
        };

        let Some(session_id) = session_id else {
            // Nothing to resume.
            self.send_identify().await;
            return;
        };

        self.resuming.store(true, Ordering::SeqCst);
        tracing::info!(session_id = %session_id, seq = seq, "Resuming session");

        let payload = ResumePayload {
            token: self.options.token.clone(),
            session_id,
            seq,
        };
        self.send(GatewayMessage::resume(&payload), true).await;
    }

    /// Apply a READY dispatch
    pub(crate) async fn session_ready(&self, ready: &ReadyPayload) {
        self.session.write().await.apply_ready(ready);
        self.resuming.store(false, Ordering::SeqCst);
        self.reconnects.store(0, Ordering::SeqCst);
        self.bucket.unlock();
        *self.state.write().await = ConnectionState::Identified;

        tracing::info!(
            session_id = %ready.session_id,
            user_id = %ready.user.id,
            "Session ready"
        );
    }

    /// Apply a RESUMED dispatch
    pub(crate) async fn session_resumed(&self) {
        self.resuming.store(false, Ordering::SeqCst);
        self.reconnects.store(0, Ordering::SeqCst);
        self.bucket.unlock();
        *self.state.write().await = ConnectionState::Resumed;

        tracing::info!("Session resumed");
    }

    /// Wipe the session; used when the server declares it unrecoverable
    pub(crate) async fn reset_session(&self) {
        self.session.write().await.wipe();
        self.resuming.store(false, Ordering::SeqCst);
    }

    /// Track an inbound sequence number; a gap triggers a resume
    pub(crate) async fn observe_sequence(self: &Arc<Self>, s_new: u64) {
        let outcome = self
            .session
            .write()
            .await
            .observe_sequence(s_new, self.is_resuming());

        if outcome == SequenceOutcome::Gap {
            self.warn(format!(
                "sequence jumped to {s_new}; resuming to recover lost events"
            ))
            .await;
            self.begin_resume().await;
        }
    }

    // === Send pipeline ===

    /// Encode and ship a frame
    ///
    /// Direct sends bypass the rate bucket (heartbeat, identify, resume);
    /// everything else is paced. Encode failures drop the frame with a
    /// warning.
    pub(crate) async fn send(&self, message: GatewayMessage, direct: bool) {
        let op = message.op;
        let bytes = match self.codec.encode(&message) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.warn(format!("failed to encode {op}: {e}")).await;
                return;
            }
        };

        let frame = OutboundFrame { op, bytes };
        if direct {
            self.send_frame_now(frame).await;
        } else {
            self.bucket.submit(frame);
        }
    }

    async fn send_frame_now(&self, frame: OutboundFrame) {
        let op = frame.op;
        let transport = self.transport.lock().await;
        match transport.as_ref() {
            Some(t) => {
                if let Err(e) = t.send(frame.bytes, self.codec.is_binary()).await {
                    drop(transport);
                    self.warn(format!("failed to send {op}: {e}")).await;
                }
            }
            None => {
                drop(transport);
                self.warn(format!("dropped {op}: not connected")).await;
            }
        }
    }

    /// The single consumer of the rate bucket
    async fn run_bucket_worker(self: Arc<Self>) {
        loop {
            let frame = self.bucket.next_ready().await;
            let op = frame.op;

            let transport = self.transport.lock().await;
            match transport.as_ref() {
                None => {
                    drop(transport);
                    // Unusable transport: put it back and go quiet until
                    // the session is live again.
                    self.bucket.requeue_front(frame);
                }
                Some(t) => {
                    if let Err(e) = t.send(frame.bytes, self.codec.is_binary()).await {
                        drop(transport);
                        self.warn(format!("failed to send {op}: {e}")).await;
                    }
                }
            }
        }
    }

    fn ensure_worker(self: &Arc<Self>) {
        let mut slot = self.worker_task.lock().expect("worker slot poisoned");
        if slot.is_none() {
            let client = Arc::clone(self);
            *slot = Some(tokio::spawn(client.run_bucket_worker()));
        }
    }

    // === Voice ===

    pub(crate) async fn voice_connect(
        self: &Arc<Self>,
        guild_id: Option<&str>,
        channel_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<Arc<dyn MediaSession>>, GatewayError> {
        let server_id = guild_id.or(channel_id).ok_or(GatewayError::MissingVoiceTarget)?;
        let existing = self.voice.get(server_id);

        match (existing, channel_id) {
            // Nothing to leave, nowhere to go: announce the null state.
            (None, None) => {
                self.send_voice_state(guild_id, None).await;
                Ok(None)
            }

            // Leaving: the session's end is terminal.
            (Some(_), None) => {
                self.voice.kill(server_id, Some("voice disconnect requested"));
                Ok(None)
            }

            // Already there.
            (Some(session), Some(channel)) if session.channel_id().as_deref() == Some(channel) => {
                Ok(Some(session))
            }

            // Joining or moving: announce and wait for the matching state.
            (existing, Some(channel)) => {
                if existing.is_none() {
                    let factory = self
                        .options
                        .media
                        .as_ref()
                        .ok_or(GatewayError::MediaUnavailable)?;
                    let session = factory.create(server_id, channel);
                    self.voice.insert(server_id, session);
                }

                let Some(waiter) = self.voice.register_waiter(server_id) else {
                    return Err(GatewayError::VoiceAborted(
                        "media session vanished".to_string(),
                    ));
                };

                self.send_voice_state(guild_id, Some(channel)).await;

                match tokio::time::timeout(timeout, waiter).await {
                    Ok(Ok(session)) => Ok(Some(session)),
                    Ok(Err(_)) => Err(GatewayError::VoiceAborted(
                        "media session ended before voice connected".to_string(),
                    )),
                    Err(_) => {
                        self.voice.kill(server_id, Some("voice connect timed out"));
                        Err(GatewayError::VoiceTimeout)
                    }
                }
            }
        }
    }

    async fn send_voice_state(&self, guild_id: Option<&str>, channel_id: Option<&str>) {
        let payload = VoiceStatePayload {
            guild_id: guild_id.map(str::to_string),
            channel_id: channel_id.map(str::to_string),
            ..VoiceStatePayload::default()
        };
        self.send(GatewayMessage::voice_state_update(&payload), false).await;
    }

    // === Notifications ===

    pub(crate) async fn emit(&self, event: GatewayEvent) {
        if self.events_tx.send(event).await.is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }

    pub(crate) async fn warn(&self, message: String) {
        tracing::warn!(message = %message, "Gateway warning");
        self.emit(GatewayEvent::Warn { message }).await;
    }

    /// Forward a dispatch event to the application, honoring suppression
    pub(crate) async fn forward_dispatch(&self, name: String, message: GatewayMessage) {
        if self.options.disabled_events.contains(&name) {
            tracing::trace!(event = %name, "Dispatch suppressed");
            return;
        }

        self.emit(GatewayEvent::Dispatch {
            name,
            sequence: message.s,
            payload: message.d.unwrap_or(Value::Null),
        })
        .await;
    }

    // === Flags ===

    pub(crate) fn is_killed(&self) -> bool {
        self.killed.load(Ordering::SeqCst)
    }

    pub(crate) fn is_resuming(&self) -> bool {
        self.resuming.load(Ordering::SeqCst)
    }
}

/// Handle to a gateway protocol engine
///
/// Cloneable; all clones drive the same engine. Notifications arrive on the
/// channel returned from the constructor.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<GatewayInner>,
}

impl GatewayClient {
    /// Create an engine speaking WebSocket
    ///
    /// # Errors
    /// Fails on invalid options (bad shard tuple, unavailable encoding).
    pub fn new(
        options: GatewayOptions,
    ) -> Result<(Self, mpsc::Receiver<GatewayEvent>), GatewayError> {
        Self::with_connector(options, Box::new(WebSocketConnector::new()))
    }

    /// Create an engine on a custom transport connector
    ///
    /// # Errors
    /// Fails on invalid options (bad shard tuple, unavailable encoding).
    pub fn with_connector(
        options: GatewayOptions,
        connector: Box<dyn Connector>,
    ) -> Result<(Self, mpsc::Receiver<GatewayEvent>), GatewayError> {
        options.validate()?;
        let codec = Codec::new(options.encoding)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_SIZE);

        let bucket = RateBucket::with_defaults();
        // Nothing is paced out until the session is live.
        bucket.lock();

        let inner = Arc::new(GatewayInner {
            options,
            codec,
            bucket,
            session: RwLock::new(SessionState::new()),
            heartbeat: Mutex::new(HeartbeatState::new()),
            state: RwLock::new(ConnectionState::Initializing),
            resuming: AtomicBool::new(false),
            reconnects: AtomicU32::new(0),
            voice: VoiceRegistry::new(),
            connector,
            decompressor: Mutex::new(None),
            transport: Mutex::new(None),
            url: RwLock::new(None),
            killed: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            connect_gate: Mutex::new(()),
            reconnect_task: StdMutex::new(None),
            worker_task: StdMutex::new(None),
            events_tx,
        });

        Ok((Self { inner }, events_rx))
    }

    // === Lifecycle ===

    /// Open the gateway connection
    ///
    /// The URL is required on the first call and remembered afterwards.
    ///
    /// # Errors
    /// Fails when no URL is available or it cannot be parsed. Transport
    /// failures do not raise; they feed the reconnect budget.
    pub async fn connect(&self, url: Option<&str>) -> Result<(), GatewayError> {
        self.inner.connect(url).await
    }

    /// Close the connection normally, wiping session state
    pub async fn disconnect(&self) {
        self.inner.disconnect(CLOSE_NORMAL, "disconnect requested").await;
    }

    /// Terminate the engine; idempotent and non-reversible
    ///
    /// Kills every registered media session and emits one `Killed`
    /// notification.
    pub async fn kill(&self) {
        self.inner.kill().await;
    }

    // === Introspection ===

    /// Current lifecycle state
    pub async fn state(&self) -> ConnectionState {
        *self.inner.state.read().await
    }

    /// Whether the engine is terminal
    #[must_use]
    pub fn is_killed(&self) -> bool {
        self.inner.is_killed()
    }

    /// Whether a RESUME is in flight
    #[must_use]
    pub fn is_resuming(&self) -> bool {
        self.inner.is_resuming()
    }

    /// Server-assigned session id, once READY
    pub async fn session_id(&self) -> Option<String> {
        self.inner.session.read().await.session_id.clone()
    }

    /// Authenticated user id, once READY
    pub async fn user_id(&self) -> Option<String> {
        self.inner.session.read().await.user_id.clone()
    }

    /// Last seen inbound sequence number
    pub async fn sequence(&self) -> u64 {
        self.inner.session.read().await.sequence
    }

    /// Number of live media sessions
    #[must_use]
    pub fn media_session_count(&self) -> usize {
        self.inner.voice.len()
    }

    // === Paced commands ===

    /// Update this client's presence
    pub async fn update_presence(&self, patch: &PresencePatch) {
        let mut layers: Vec<&PresencePatch> = Vec::with_capacity(2);
        if let Some(configured) = self.inner.options.presence.as_ref() {
            layers.push(configured);
        }
        layers.push(patch);

        let presence = Presence::layered(&layers);
        self.inner
            .send(GatewayMessage::presence_update(&presence), false)
            .await;
    }

    /// Request a guild's member list
    pub async fn request_guild_members(&self, payload: &RequestGuildMembersPayload) {
        self.inner
            .send(GatewayMessage::request_guild_members(payload), false)
            .await;
    }

    /// Replace guild event subscriptions
    pub async fn guild_subscriptions(&self, subscriptions: Value) {
        self.inner
            .send(GatewayMessage::new(OpCode::GuildSubscriptions, Some(subscriptions)), false)
            .await;
    }

    /// Send a raw voice state update
    pub async fn voice_state_update(&self, payload: &VoiceStatePayload) {
        self.inner
            .send(GatewayMessage::voice_state_update(payload), false)
            .await;
    }

    /// Join a private call
    pub async fn call_connect(&self, channel_id: &str) {
        let payload = serde_json::json!({ "channel_id": channel_id });
        self.inner
            .send(GatewayMessage::new(OpCode::CallConnect, Some(payload)), false)
            .await;
    }

    /// Join a lobby
    pub async fn lobby_connect(&self, payload: &LobbyConnectPayload) {
        self.inner
            .send(
                GatewayMessage::new(OpCode::LobbyConnect, serde_json::to_value(payload).ok()),
                false,
            )
            .await;
    }

    /// Leave a lobby
    pub async fn lobby_disconnect(&self, lobby_id: &str) {
        let payload = serde_json::json!({ "lobby_id": lobby_id });
        self.inner
            .send(GatewayMessage::new(OpCode::LobbyDisconnect, Some(payload)), false)
            .await;
    }

    /// Update voice states inside a lobby; the payload is forwarded verbatim
    pub async fn lobby_voice_states_update(&self, states: Value) {
        self.inner
            .send(GatewayMessage::new(OpCode::LobbyVoiceStatesUpdate, Some(states)), false)
            .await;
    }

    /// Start an outgoing stream; the payload is forwarded verbatim
    pub async fn stream_create(&self, payload: Value) {
        self.inner
            .send(GatewayMessage::new(OpCode::StreamCreate, Some(payload)), false)
            .await;
    }

    /// Stop a stream
    pub async fn stream_delete(&self, stream_key: &str) {
        self.send_stream_op(OpCode::StreamDelete, stream_key, None).await;
    }

    /// Watch a stream
    pub async fn stream_watch(&self, stream_key: &str) {
        self.send_stream_op(OpCode::StreamWatch, stream_key, None).await;
    }

    /// Keep a watched stream alive
    pub async fn stream_ping(&self, stream_key: &str) {
        self.send_stream_op(OpCode::StreamPing, stream_key, None).await;
    }

    /// Pause or unpause a stream
    pub async fn stream_set_paused(&self, stream_key: &str, paused: bool) {
        self.send_stream_op(OpCode::StreamSetPaused, stream_key, Some(paused)).await;
    }

    /// Ping the voice server
    pub async fn voice_server_ping(&self) {
        self.inner
            .send(GatewayMessage::new(OpCode::VoiceServerPing, None), false)
            .await;
    }

    async fn send_stream_op(&self, op: OpCode, stream_key: &str, paused: Option<bool>) {
        let payload = StreamKeyPayload {
            stream_key: stream_key.to_string(),
            paused,
        };
        self.inner
            .send(GatewayMessage::new(op, serde_json::to_value(&payload).ok()), false)
            .await;
    }

    // === Voice connect ===

    /// Join, move within, or leave a voice server
    ///
    /// Keyed by guild id when present, else channel id. Joining waits for
    /// the gateway to confirm the voice state, up to the configured
    /// deadline.
    ///
    /// # Errors
    /// Fails synchronously with no state change when neither id is given or
    /// no media factory is configured; fails with `VoiceTimeout` when the
    /// deadline elapses (the media session is killed first).
    pub async fn voice_connect(
        &self,
        guild_id: Option<&str>,
        channel_id: Option<&str>,
    ) -> Result<Option<Arc<dyn MediaSession>>, GatewayError> {
        let timeout = self.inner.options.voice_timeout;
        self.inner.voice_connect(guild_id, channel_id, timeout).await
    }

    /// [`voice_connect`](Self::voice_connect) with an explicit deadline
    pub async fn voice_connect_with_timeout(
        &self,
        guild_id: Option<&str>,
        channel_id: Option<&str>,
        timeout: Duration,
    ) -> Result<Option<Arc<dyn MediaSession>>, GatewayError> {
        self.inner.voice_connect(guild_id, channel_id, timeout).await
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("killed", &self.inner.is_killed())
            .field("resuming", &self.inner.is_resuming())
            .field("media_sessions", &self.inner.voice.len())
            .finish()
    }
}
