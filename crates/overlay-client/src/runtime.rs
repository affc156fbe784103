//! Cooperative overlay runtime.
//!
//! One task owns the store, session config, connection manager and socket,
//! and multiplexes with `tokio::select!`:
//!
//! - socket frames → [`CommandInterpreter`] → [`MessageStore`]
//! - the pending dial (one at a time)
//! - the reconnect deadline
//! - clear and decay sweep ticks, each only while its interval is enabled
//! - settings fetch results, delivered from a spawned task over a channel
//!
//! Every branch runs to completion before the next is polled, so store
//! mutations never interleave. After each visible change the rendered
//! [`OverlayView`] is published on a `watch` channel.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use overlay_core::{Clock, OverlayConfig, OverlayError, SystemClock, WindowSettings};
use overlay_store::{DisplayMessage, EmoteSanitizer, MessageStore, Sanitizer};

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::endpoints::Endpoints;
use crate::errors::ClientError;
use crate::interpreter::{CommandInterpreter, Dispatch};
use crate::settings::fetch_window_settings;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type DialFuture = BoxFuture<'static, Result<WsStream, tungstenite::Error>>;
type SettingsResult = (u64, Result<WindowSettings, OverlayError>);

/// Snapshot handed to renderers.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct OverlayView {
    /// Connection state.
    pub state: ConnectionState,
    /// Reconnect attempts since the last open.
    pub attempts: u32,
    /// Messages in display order.
    pub messages: Vec<DisplayMessage>,
    /// Style overrides from the window settings, keyed `style_<name>`.
    pub styles: BTreeMap<String, Value>,
}

/// The overlay client.
pub struct Overlay {
    config: ClientConfig,
    endpoints: Endpoints,
    http: reqwest::Client,
    clock: Arc<dyn Clock>,
    connection: ConnectionManager,
    interpreter: CommandInterpreter,
    store: MessageStore,
    session: OverlayConfig,
    settings_loaded: bool,
    settings_in_flight: bool,
    settings_generation: u64,
    sanitizer: Box<dyn Sanitizer + Send + Sync>,
    view: watch::Sender<OverlayView>,
}

impl Overlay {
    /// Build an overlay for `config.page_url`. Nothing connects until
    /// [`run`](Self::run).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let endpoints = Endpoints::from_page_url(&config.page_url)?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let session = OverlayConfig::with_capacity(config.default_capacity);
        let (view, _) = watch::channel(OverlayView::default());

        Ok(Self {
            endpoints,
            http,
            interpreter: CommandInterpreter::new(clock.clone()),
            clock,
            connection: ConnectionManager::new(config.reconnect_delay),
            store: MessageStore::new(&session),
            session,
            settings_loaded: false,
            settings_in_flight: false,
            settings_generation: 0,
            sanitizer: Box::new(EmoteSanitizer::new()),
            view,
            config,
        })
    }

    /// Replace the clock used for arrival stamps and sweeps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.interpreter = CommandInterpreter::new(clock.clone());
        self.clock = clock;
        self
    }

    /// Replace the display sanitizer.
    #[must_use]
    pub fn with_sanitizer(mut self, sanitizer: impl Sanitizer + Send + Sync + 'static) -> Self {
        self.sanitizer = Box::new(sanitizer);
        self
    }

    /// Resolved endpoints.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Receive every published view.
    pub fn subscribe(&self) -> watch::Receiver<OverlayView> {
        self.view.subscribe()
    }

    /// Run until the process ends.
    pub async fn run(self) {
        self.run_until(std::future::pending()).await;
    }

    /// Run until `shutdown` resolves, then close the socket.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let (settings_tx, mut settings_rx) = mpsc::unbounded_channel::<SettingsResult>();
        // interval() panics on a zero period
        let tick = self.config.sweep_tick.max(Duration::from_millis(1));
        let mut clear_tick = tokio::time::interval(tick);
        clear_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut decay_tick = tokio::time::interval(tick);
        decay_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut socket: Option<WsStream> = None;
        let id = self.connection.connect(self.endpoints.ws_url.clone());
        info!(connection_id = %id, url = %self.endpoints.ws_url, "connecting");
        let mut dialing: Option<DialFuture> = Some(self.dial());
        self.publish();

        loop {
            let reconnect_at = self.connection.reconnect_deadline();

            tokio::select! {
                () = &mut shutdown => break,

                result = poll_opt(&mut dialing) => {
                    dialing = None;
                    match result {
                        Ok(ws) => {
                            socket = Some(ws);
                            self.connection.on_open();
                            self.request_settings(&settings_tx);
                        }
                        Err(err) => {
                            let err = OverlayError::Transport(err.to_string());
                            warn!(error = %err, kind = err.error_kind(), "connect failed");
                            let _ = self.connection.on_close(Instant::now());
                        }
                    }
                    self.publish();
                }

                frame = next_frame(&mut socket) => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if self.handle_text(text.as_str()) {
                            socket = None;
                            dialing = Some(self.dial());
                        }
                    }
                    Some(Ok(WsMessage::Close(frame))) => {
                        debug!(?frame, "close frame received");
                        socket = None;
                        self.socket_closed();
                    }
                    Some(Ok(other)) => debug!(kind = ws_kind(&other), "non-text frame ignored"),
                    Some(Err(err)) => {
                        let err = OverlayError::Transport(err.to_string());
                        warn!(error = %err, kind = err.error_kind(), "socket error");
                        socket = None;
                        self.socket_closed();
                    }
                    None => {
                        socket = None;
                        self.socket_closed();
                    }
                },

                () = sleep_until_opt(reconnect_at) => {
                    if self.connection.poll_reconnect(Instant::now()).is_some() {
                        dialing = Some(self.dial());
                        self.publish();
                    }
                }

                _ = clear_tick.tick(), if self.session.clear_enabled() => {
                    if self.store.clear(self.clock.now()) > 0 {
                        self.publish();
                    }
                }

                _ = decay_tick.tick(), if self.session.decay_enabled() => {
                    if self.store.decay(self.clock.now()) > 0 {
                        self.publish();
                    }
                }

                Some((generation, result)) = settings_rx.recv() => {
                    if self.apply_settings(generation, result) {
                        self.publish();
                    }
                }
            }
        }

        self.connection.disconnect();
        if let Some(mut ws) = socket {
            if let Err(err) = ws.close(None).await {
                debug!(error = %err, "close on shutdown failed");
            }
        }
        info!("overlay stopped");
        self.publish();
    }

    /// Dispatch one text frame. Returns `true` when the caller must drop the
    /// socket and dial again (reload).
    fn handle_text(&mut self, text: &str) -> bool {
        match self.interpreter.dispatch_raw(&mut self.store, text) {
            Dispatch::Reload => {
                self.reload();
                self.publish();
                true
            }
            outcome => {
                if outcome.changed_store() {
                    self.publish();
                }
                false
            }
        }
    }

    /// Discard all session state and start a fresh connection.
    ///
    /// In-flight settings results are invalidated; settings are fetched again
    /// once the new connection opens.
    fn reload(&mut self) {
        info!(dropped = self.store.len(), "reload requested");
        self.store.reset();
        self.session = OverlayConfig::with_capacity(self.config.default_capacity);
        let _ = self.store.configure(&self.session);
        self.settings_loaded = false;
        self.settings_in_flight = false;
        self.settings_generation += 1;
        let id = self.connection.connect(self.endpoints.ws_url.clone());
        info!(connection_id = %id, "reconnecting after reload");
    }

    fn socket_closed(&mut self) {
        let _ = self.connection.on_close(Instant::now());
        self.publish();
    }

    fn dial(&self) -> DialFuture {
        let url = self.connection.url().to_owned();
        async move {
            tokio_tungstenite::connect_async(url)
                .await
                .map(|(ws, _response)| ws)
        }
        .boxed()
    }

    /// Spawn a settings fetch unless one is loaded or already running.
    fn request_settings(&mut self, tx: &mpsc::UnboundedSender<SettingsResult>) {
        if self.settings_loaded || self.settings_in_flight {
            return;
        }
        self.settings_in_flight = true;
        let client = self.http.clone();
        let url = self.endpoints.settings_url.clone();
        let generation = self.settings_generation;
        let tx = tx.clone();
        let _ = tokio::spawn(async move {
            let result = fetch_window_settings(&client, &url).await;
            let _ = tx.send((generation, result));
        });
    }

    /// Apply a settings result. Returns whether the session changed.
    fn apply_settings(
        &mut self,
        generation: u64,
        result: Result<WindowSettings, OverlayError>,
    ) -> bool {
        if generation != self.settings_generation {
            debug!(generation, "stale settings result discarded");
            return false;
        }
        self.settings_in_flight = false;
        // failures were logged by the fetch; retried on the next open
        let Ok(settings) = result else {
            return false;
        };
        self.session = OverlayConfig::from_settings(settings);
        let evicted = self.store.configure(&self.session);
        self.settings_loaded = true;
        info!(
            capacity = self.session.capacity,
            clear_ms = self.session.clear_interval.map(|d| d.as_millis() as u64),
            decay_ms = self.session.decay_interval.map(|d| d.as_millis() as u64),
            evicted,
            "window settings applied"
        );
        true
    }

    fn publish(&mut self) {
        let view = OverlayView {
            state: self.connection.state(),
            attempts: self.connection.attempts(),
            messages: self.store.render(self.sanitizer.as_ref()),
            styles: self.session.style_overrides.clone(),
        };
        let _ = self.view.send_replace(view);
    }
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("endpoints", &self.endpoints)
            .field("connection", &self.connection)
            .field("messages", &self.store.len())
            .field("settings_loaded", &self.settings_loaded)
            .finish_non_exhaustive()
    }
}

async fn poll_opt<T>(fut: &mut Option<BoxFuture<'static, T>>) -> T {
    match fut {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(
    socket: &mut Option<WsStream>,
) -> Option<Result<WsMessage, tungstenite::Error>> {
    match socket {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn ws_kind(message: &WsMessage) -> &'static str {
    match message {
        WsMessage::Text(_) => "text",
        WsMessage::Binary(_) => "binary",
        WsMessage::Ping(_) => "ping",
        WsMessage::Pong(_) => "pong",
        WsMessage::Close(_) => "close",
        WsMessage::Frame(_) => "frame",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overlay_core::{ManualClock, MessageId};
    use serde_json::json;

    fn overlay() -> (Overlay, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_millis(0));
        let config = ClientConfig {
            default_capacity: 5,
            ..ClientConfig::default()
        };
        let overlay = Overlay::new(config).unwrap().with_clock(clock.clone());
        (overlay, clock)
    }

    fn chat(id: u64, user: &str) -> String {
        json!({"type": "message", "payload": {"id": id, "user": user, "text": "hi"}}).to_string()
    }

    fn settings(body: Value) -> WindowSettings {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn new_derives_endpoints() {
        let overlay = Overlay::new(ClientConfig {
            page_url: "http://chat.local:9000/overlay/index.html".into(),
            ..ClientConfig::default()
        })
        .unwrap();
        assert_eq!(overlay.endpoints().ws_url, "ws://chat.local:9000/overlay/ws");
    }

    #[test]
    fn new_rejects_bad_page_url() {
        let err = Overlay::new(ClientConfig {
            page_url: "nope".into(),
            ..ClientConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::Endpoint(_)));
    }

    #[test]
    fn text_frames_publish_view() {
        let (mut overlay, _) = overlay();
        let rx = overlay.subscribe();

        assert!(!overlay.handle_text(&chat(1, "alice")));
        let view = rx.borrow().clone();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].user, "alice");
        assert_eq!(view.messages[0].style, "style_message");
    }

    #[test]
    fn settings_apply_capacity_and_styles() {
        let (mut overlay, _) = overlay();
        for id in 1..=5 {
            let _ = overlay.handle_text(&chat(id, "u"));
        }

        let changed = overlay.apply_settings(
            0,
            Ok(settings(json!({"message_limit": 2, "decay_timer": 1, "style": {"message": {"a": 1}}}))),
        );
        assert!(changed);
        assert!(overlay.settings_loaded);
        assert_eq!(overlay.store.len(), 2);
        assert!(overlay.session.decay_enabled());
        assert!(!overlay.session.clear_enabled());
        assert!(overlay.session.style_overrides.contains_key("style_message"));
    }

    #[test]
    fn failed_settings_leave_sweeps_disabled() {
        let (mut overlay, _) = overlay();
        overlay.settings_in_flight = true;

        let changed = overlay.apply_settings(0, Err(OverlayError::ConfigFetch("503".into())));
        assert!(!changed);
        assert!(!overlay.settings_loaded);
        assert!(!overlay.settings_in_flight);
        assert!(!overlay.session.clear_enabled());
    }

    #[test]
    fn stale_settings_are_discarded() {
        let (mut overlay, _) = overlay();
        overlay.settings_generation = 3;
        assert!(!overlay.apply_settings(2, Ok(settings(json!({"message_limit": 1})))));
        assert_eq!(overlay.session.capacity, 5);
    }

    #[test]
    fn reload_discards_state() {
        let (mut overlay, _) = overlay();
        let _ = overlay.handle_text(&chat(1, "alice"));
        let _ = overlay.apply_settings(0, Ok(settings(json!({"clear_timer": 2}))));

        let redial =
            overlay.handle_text(&json!({"type": "command", "payload": {"command": "reload"}}).to_string());

        assert!(redial);
        assert!(overlay.store.is_empty());
        assert!(!overlay.settings_loaded);
        assert!(!overlay.session.clear_enabled());
        assert_eq!(overlay.settings_generation, 1);
        assert_eq!(overlay.connection.state(), ConnectionState::Connecting);
        assert!(overlay.subscribe().borrow().messages.is_empty());
    }

    #[test]
    fn sweeps_use_injected_clock() {
        let (mut overlay, clock) = overlay();
        let _ = overlay.apply_settings(0, Ok(settings(json!({"decay_timer": 1, "clear_timer": 2}))));
        let _ = overlay.handle_text(&chat(1, "a"));

        clock.set_millis(1_100);
        assert_eq!(overlay.store.decay(overlay.clock.now()), 1);
        clock.set_millis(2_100);
        assert_eq!(overlay.store.clear(overlay.clock.now()), 1);
    }

    #[test]
    fn custom_sanitizer_hides_messages() {
        let (overlay, _) = overlay();
        let mut overlay = overlay.with_sanitizer(|m: &overlay_core::Message| {
            if m.user == "spam" { String::new() } else { m.text.clone() }
        });
        let _ = overlay.handle_text(&chat(1, "spam"));
        let _ = overlay.handle_text(&chat(2, "bob"));

        let view = overlay.subscribe().borrow().clone();
        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].id, Some(MessageId::from(2)));
        assert_eq!(overlay.store.len(), 1);
    }

    #[test]
    fn view_serializes_state_and_messages() {
        let (mut overlay, _) = overlay();
        let _ = overlay.handle_text(&chat(9, "bob"));
        let json = serde_json::to_value(&*overlay.subscribe().borrow()).unwrap();
        assert_eq!(json["state"], "disconnected");
        assert_eq!(json["messages"][0]["id"], "9");
        assert_eq!(json["messages"][0]["user"], "bob");
    }
}
