// realtime/connection.rs
//! The single live event-stream connection of a console session.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, Interval},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        handshake::client::Request,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
    MaybeTlsStream, WebSocketStream,
};
use url::Url;

use super::{commands::OutboundCommand, emitter::Emitter, events::InboundEvent};
use crate::{
    config::{ConnectionConfig, Transport},
    error::ConsoleError,
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Reconnecting,
    /// Retry budget spent; nothing happens until a new manager is opened.
    Exhausted,
    Closed,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub connected: bool,
    pub has_token: bool,
    pub last_error: Option<String>,
    pub failed_attempts: u32,
}

#[derive(Debug, PartialEq)]
enum SessionEnd {
    Shutdown,
    ClosedByServer(String),
    Transport(String),
}

impl SessionEnd {
    fn reason(&self) -> String {
        match self {
            SessionEnd::Shutdown => "closed by console".to_string(),
            SessionEnd::ClosedByServer(reason) => reason.clone(),
            SessionEnd::Transport(reason) => reason.clone(),
        }
    }
}

/// Owns the connection task. Closing (or dropping) the manager always tears
/// the socket down and clears the connected flag.
#[derive(Debug)]
pub struct ConnectionManager {
    status: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    outbound: mpsc::UnboundedSender<OutboundCommand>,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Starts connecting in the background. Lifecycle and server events are
    /// delivered, in arrival order, on the returned receiver.
    pub fn open(
        config: ConnectionConfig,
        token: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let initial = ConnectionStatus {
            has_token: token.is_some(),
            ..ConnectionStatus::default()
        };
        let (status_tx, status_rx) = watch::channel(initial);
        let status = Arc::new(status_tx);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        if config.transports.contains(&Transport::Polling) {
            tracing::debug!("Polling fallback is not available, using websocket only");
        }
        if token.is_none() {
            tracing::warn!("No stored admin token, connecting without credentials");
        }
        tracing::debug!(
            url = %config.url,
            force_new = config.force_new,
            attempts = config.reconnection_attempts,
            "Opening support socket"
        );

        let worker = Worker {
            config,
            token,
            status: status.clone(),
            events: events_tx,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
        };
        let task = tokio::spawn(worker.run());

        let manager = Self {
            status,
            status_rx,
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task: Some(task),
        };
        (manager, events_rx)
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status_rx.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status_rx.borrow().connected
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    pub fn emitter(&self) -> Emitter {
        Emitter::new(self.outbound.clone(), self.status_rx.clone())
    }

    /// Sends a close frame and waits for the connection task to finish.
    pub async fn close(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("Support socket task ended abnormally: {}", e);
            }
        }
        mark_closed(&self.status);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = self.shutdown.send(true);
            task.abort();
            mark_closed(&self.status);
        }
    }
}

fn mark_closed(status: &watch::Sender<ConnectionStatus>) {
    status.send_modify(|s| {
        s.connected = false;
        if s.state != ConnectionState::Exhausted {
            s.state = ConnectionState::Closed;
        }
    });
}

struct Worker {
    config: ConnectionConfig,
    token: Option<String>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    events: mpsc::UnboundedSender<InboundEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundCommand>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        let mut failures: u32 = 0;
        let mut sessions: u32 = 0;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let request = match handshake_request(&self.config, self.token.as_deref()) {
                Ok(request) => request,
                Err(e) => {
                    tracing::error!("Cannot build support socket request: {}", e);
                    self.status.send_modify(|s| {
                        s.state = ConnectionState::Exhausted;
                        s.last_error = Some(e.to_string());
                    });
                    self.publish(InboundEvent::ConnectError { error: e.to_string() });
                    break;
                }
            };

            let state = if failures == 0 && sessions == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };
            self.status.send_modify(|s| s.state = state);

            let attempt = tokio::select! {
                _ = self.shutdown.changed() => break,
                result = tokio::time::timeout(self.config.connect_timeout, connect_async(request)) => result,
            };

            let error = match attempt {
                Ok(Ok((socket, _))) => {
                    failures = 0;
                    sessions += 1;
                    self.drain_stale_commands();
                    self.status.send_modify(|s| {
                        s.state = ConnectionState::Connected;
                        s.connected = true;
                        s.failed_attempts = 0;
                        s.last_error = None;
                    });
                    tracing::info!("Support socket connected");
                    self.publish(InboundEvent::Connect);

                    let end = self.run_session(socket).await;

                    let retrying = end != SessionEnd::Shutdown && self.config.reconnection;
                    self.status.send_modify(|s| {
                        s.connected = false;
                        if retrying {
                            s.state = ConnectionState::Reconnecting;
                        }
                    });
                    tracing::info!("Support socket disconnected: {}", end.reason());
                    self.publish(InboundEvent::Disconnect { reason: end.reason() });

                    if end == SessionEnd::Shutdown {
                        break;
                    }
                    if !self.config.reconnection {
                        self.status.send_modify(|s| s.state = ConnectionState::Exhausted);
                        break;
                    }
                    if !self.pause(jittered(self.config.base_delay(1), self.config.randomization_factor)).await {
                        break;
                    }
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!("connection timed out after {:?}", self.config.connect_timeout),
            };

            failures += 1;
            tracing::warn!("Support socket connect attempt {} failed: {}", failures, error);
            self.status.send_modify(|s| {
                s.connected = false;
                s.failed_attempts = failures;
                s.last_error = Some(error.clone());
            });
            self.publish(InboundEvent::ConnectError { error });

            if !self.config.reconnection || failures >= self.config.reconnection_attempts {
                tracing::error!(
                    "Support socket gave up after {} failed attempts, reload to retry",
                    failures
                );
                self.status.send_modify(|s| s.state = ConnectionState::Exhausted);
                break;
            }

            let delay = jittered(self.config.base_delay(failures), self.config.randomization_factor);
            tracing::debug!("Retrying support socket in {:?}", delay);
            if !self.pause(delay).await {
                break;
            }
        }

        self.status.send_modify(|s| {
            s.connected = false;
            if s.state != ConnectionState::Exhausted {
                s.state = ConnectionState::Closed;
            }
        });
    }

    async fn run_session(&mut self, socket: Socket) -> SessionEnd {
        let (mut sink, mut source) = socket.split();
        let mut heartbeat = self
            .config
            .ping_interval
            .map(|every| tokio::time::interval_at(Instant::now() + every, every));

        let shutdown = &mut self.shutdown;
        let outbound = &mut self.outbound;
        let events = &self.events;
        let status = &self.status;

        loop {
            let command = tokio::select! {
                _ = shutdown.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    let _ = sink.close().await;
                    return SessionEnd::Shutdown;
                }
                Some(command) = outbound.recv() => command,
                _ = tick(&mut heartbeat) => OutboundCommand::Ping,
                frame = source.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => deliver(events, &text),
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| f.reason.to_string())
                                .filter(|r| !r.is_empty())
                                .unwrap_or_else(|| "server closed the connection".to_string());
                            return SessionEnd::ClosedByServer(reason);
                        }
                        // ping/pong frames are answered by tungstenite
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            record_stream_error(status, events, e.to_string());
                            return SessionEnd::Transport(e.to_string());
                        }
                        None => return SessionEnd::ClosedByServer("stream ended".to_string()),
                    }
                    continue;
                }
            };

            let frame = match serde_json::to_string(&command) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::error!("Cannot encode '{}': {}", command.name(), e);
                    continue;
                }
            };
            if let Err(e) = sink.send(Message::Text(frame)).await {
                record_stream_error(status, events, e.to_string());
                return SessionEnd::Transport(e.to_string());
            }
            tracing::trace!("Sent '{}'", command.name());
        }
    }

    // Commands emitted during the last session that never made it out.
    fn drain_stale_commands(&mut self) {
        while let Ok(command) = self.outbound.try_recv() {
            tracing::debug!("Dropping stale '{}' from previous session", command.name());
        }
    }

    /// Sleeps unless shutdown is requested first; returns false on shutdown.
    async fn pause(&mut self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.shutdown.changed() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn publish(&self, event: InboundEvent) {
        publish(&self.events, event);
    }
}

fn publish(events: &mpsc::UnboundedSender<InboundEvent>, event: InboundEvent) {
    if events.send(event).is_err() {
        tracing::trace!("No subscriber for support socket events");
    }
}

fn deliver(events: &mpsc::UnboundedSender<InboundEvent>, text: &str) {
    match InboundEvent::from_text(text) {
        Ok(Some(event)) => publish(events, event),
        Ok(None) => tracing::debug!("Ignoring unsubscribed frame"),
        Err(e) => tracing::warn!("Dropping inbound frame: {}", e),
    }
}

fn record_stream_error(
    status: &watch::Sender<ConnectionStatus>,
    events: &mpsc::UnboundedSender<InboundEvent>,
    error: String,
) {
    tracing::warn!("Support socket stream error: {}", error);
    status.send_modify(|s| s.last_error = Some(error.clone()));
    publish(events, InboundEvent::Error { error });
}

async fn tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn handshake_request(config: &ConnectionConfig, token: Option<&str>) -> Result<Request, ConsoleError> {
    let mut url = Url::parse(&config.url)
        .map_err(|e| ConsoleError::Config(format!("invalid SOCKET_URL '{}': {}", config.url, e)))?;
    if let Some(token) = token {
        url.query_pairs_mut().append_pair("token", token);
    }

    let mut request = url.as_str().into_client_request()?;
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ConsoleError::Config("stored token is not a valid header value".to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

fn jittered(base: Duration, factor: f64) -> Duration {
    if factor <= 0.0 {
        return base;
    }
    let base_secs = base.as_secs_f64();
    let spread = base_secs * factor;
    let offset = rand::rng().random_range(-spread..=spread);
    Duration::from_secs_f64((base_secs + offset).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::tungstenite::handshake::server::{
        ErrorResponse, Request as ServerRequest, Response as ServerResponse,
    };

    fn fast_config(url: String) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(url);
        config.connect_timeout = Duration::from_secs(2);
        config.reconnection_delay = Duration::from_millis(10);
        config.reconnection_delay_max = Duration::from_millis(40);
        config.randomization_factor = 0.0;
        config.ping_interval = None;
        config
    }

    async fn closed_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_jitter_stays_within_factor() {
        let base = Duration::from_millis(1_000);
        assert_eq!(jittered(base, 0.0), base);
        for _ in 0..50 {
            let delay = jittered(base, 0.5);
            assert!(delay >= Duration::from_millis(500) && delay <= Duration::from_millis(1_500));
        }
    }

    #[test]
    fn test_handshake_carries_token() {
        let config = ConnectionConfig::new("ws://localhost:5000/socket");
        let request = handshake_request(&config, Some("abc123")).unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer abc123");
        assert_eq!(request.uri().query(), Some("token=abc123"));

        let anonymous = handshake_request(&config, None).unwrap();
        assert!(anonymous.headers().get(AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_reconnect_cap_leaves_manager_disconnected() {
        let port = closed_port().await;
        let (manager, mut events) = ConnectionManager::open(fast_config(format!("ws://127.0.0.1:{}", port)), None);
        let mut status = manager.subscribe_status();

        tokio::time::timeout(
            Duration::from_secs(10),
            status.wait_for(|s| s.state == ConnectionState::Exhausted),
        )
        .await
        .expect("manager never gave up")
        .unwrap();

        let snapshot = manager.status();
        assert!(!snapshot.connected);
        assert_eq!(snapshot.failed_attempts, 5);
        assert!(snapshot.last_error.is_some());

        let mut connect_errors = 0;
        while let Ok(event) = events.try_recv() {
            assert!(matches!(event, InboundEvent::ConnectError { .. }));
            connect_errors += 1;
        }
        assert_eq!(connect_errors, 5);

        // no further attempts once exhausted
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());
        assert!(!manager.emitter().ping());

        manager.close().await;
    }

    #[tokio::test]
    async fn test_session_delivers_events_and_sends_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (header_tx, header_rx) = oneshot::channel::<Option<String>>();
        let (joined_tx, joined_rx) = oneshot::channel::<String>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |req: &ServerRequest, resp: ServerResponse| {
                let auth = req
                    .headers()
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let _ = header_tx.send(auth);
                Ok::<ServerResponse, ErrorResponse>(resp)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback).await.unwrap();

            let frame = serde_json::json!({
                "event": "new_ticket_created",
                "data": { "ticket": {
                    "id": "T1", "title": "Broken zip", "description": "Jacket zip broke",
                    "status": "new", "priority": "medium", "created_at": "2026-10-05T12:00:00Z"
                } }
            });
            ws.send(Message::Text(frame.to_string())).await.unwrap();
            ws.send(Message::Text(r#"{"event":"new_query_created","data":{}}"#.to_string()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"{"event":"pong"}"#.to_string())).await.unwrap();

            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Text(text) = msg {
                    let _ = joined_tx.send(text);
                    break;
                }
            }
            // wait for the console to close the socket
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        });

        let (manager, mut events) =
            ConnectionManager::open(fast_config(format!("ws://127.0.0.1:{}", port)), Some("tok".to_string()));

        assert_eq!(header_rx.await.unwrap().as_deref(), Some("Bearer tok"));
        assert_eq!(events.recv().await, Some(InboundEvent::Connect));
        assert!(manager.is_connected());

        match events.recv().await {
            Some(InboundEvent::NewTicketCreated(ticket)) => assert_eq!(ticket.id, "T1"),
            other => panic!("unexpected event {:?}", other),
        }
        // the malformed query frame is dropped, the pong still arrives
        assert_eq!(events.recv().await, Some(InboundEvent::Pong));

        assert!(manager.emitter().join_room("admin_support"));
        let sent: serde_json::Value = serde_json::from_str(&joined_rx.await.unwrap()).unwrap();
        assert_eq!(sent, serde_json::json!({ "event": "join_room", "data": { "room_id": "admin_support" } }));

        let status = manager.subscribe_status();
        manager.close().await;
        assert_eq!(
            events.recv().await,
            Some(InboundEvent::Disconnect { reason: "closed by console".to_string() })
        );
        assert_eq!(status.borrow().state, ConnectionState::Closed);
        assert!(!status.borrow().connected);

        server.await.unwrap();
    }

    async fn next_lifecycle(events: &mut mpsc::UnboundedReceiver<InboundEvent>) -> Option<InboundEvent> {
        loop {
            match events.recv().await {
                Some(event) if !event.kind().is_lifecycle() => continue,
                other => return other,
            }
        }
    }

    #[tokio::test]
    async fn test_reconnects_after_failed_attempt_and_dropped_session() {
        let port = closed_port().await;
        let mut config = fast_config(format!("ws://127.0.0.1:{}", port));
        config.reconnection_delay = Duration::from_millis(200);
        config.reconnection_delay_max = Duration::from_millis(400);
        let (manager, mut events) = ConnectionManager::open(config, None);

        assert!(matches!(events.recv().await, Some(InboundEvent::ConnectError { .. })));
        assert_eq!(manager.status().failed_attempts, 1);
        assert!(manager.status().last_error.is_some());

        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        let server = tokio::spawn(async move {
            // first session is closed by the server straight away
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}

            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        });

        assert_eq!(next_lifecycle(&mut events).await, Some(InboundEvent::Connect));
        let status = manager.status();
        assert!(status.connected);
        assert_eq!(status.failed_attempts, 0);
        assert_eq!(status.last_error, None);

        assert!(matches!(next_lifecycle(&mut events).await, Some(InboundEvent::Disconnect { .. })));
        let status = manager.status();
        assert!(!status.connected);
        assert_eq!(status.state, ConnectionState::Reconnecting);
        assert!(!manager.emitter().ping());

        assert_eq!(next_lifecycle(&mut events).await, Some(InboundEvent::Connect));
        let status = manager.status();
        assert!(status.connected);
        assert_eq!(status.state, ConnectionState::Connected);
        assert_eq!(status.failed_attempts, 0);
        assert_eq!(status.last_error, None);

        manager.close().await;
        assert_eq!(
            next_lifecycle(&mut events).await,
            Some(InboundEvent::Disconnect { reason: "closed by console".to_string() })
        );
        server.await.unwrap();
    }
}
