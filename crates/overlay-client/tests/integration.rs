//! End-to-end tests against a real axum WebSocket + settings server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::{Value, json};
use tokio::sync::{broadcast, oneshot, watch};
use tokio::time::timeout;

use overlay_client::{ClientConfig, ConnectionState, Overlay, OverlayView};

const TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Debug)]
enum Outbound {
    Frame(String),
    Drop,
}

#[derive(Clone)]
struct ServerState {
    frames: broadcast::Sender<Outbound>,
    connections: Arc<AtomicUsize>,
    settings_hits: Arc<AtomicUsize>,
    settings: Arc<Mutex<(StatusCode, Value)>>,
}

struct TestServer {
    addr: SocketAddr,
    state: ServerState,
}

impl TestServer {
    async fn start(settings: Value) -> Self {
        let (frames, _) = broadcast::channel(64);
        let state = ServerState {
            frames,
            connections: Arc::new(AtomicUsize::new(0)),
            settings_hits: Arc::new(AtomicUsize::new(0)),
            settings: Arc::new(Mutex::new((StatusCode::OK, settings))),
        };
        let router = Router::new()
            .route("/ws", get(ws_handler))
            .route("/api/get_window_settings", get(settings_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        Self { addr, state }
    }

    fn page_url(&self) -> String {
        format!("http://{}/index.html", self.addr)
    }

    fn send(&self, frame: Value) {
        let _ = self.state.frames.send(Outbound::Frame(frame.to_string()));
    }

    fn drop_clients(&self) {
        let _ = self.state.frames.send(Outbound::Drop);
    }

    fn set_settings(&self, status: StatusCode, body: Value) {
        *self.state.settings.lock().unwrap() = (status, body);
    }

    fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    fn settings_hits(&self) -> usize {
        self.state.settings_hits.load(Ordering::SeqCst)
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    let _ = state.connections.fetch_add(1, Ordering::SeqCst);
    // subscribe before the handshake completes so no frame is missed
    let rx = state.frames.subscribe();
    ws.on_upgrade(move |socket| serve_socket(socket, rx))
}

async fn serve_socket(mut socket: WebSocket, mut rx: broadcast::Receiver<Outbound>) {
    while let Ok(outbound) = rx.recv().await {
        match outbound {
            Outbound::Frame(text) => {
                if socket.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            Outbound::Drop => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        }
    }
}

async fn settings_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let _ = state.settings_hits.fetch_add(1, Ordering::SeqCst);
    let (status, body) = state.settings.lock().unwrap().clone();
    (status, axum::Json(body))
}

struct Running {
    view: watch::Receiver<OverlayView>,
    stop: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl Running {
    async fn wait_for(&mut self, mut pred: impl FnMut(&OverlayView) -> bool) -> OverlayView {
        timeout(TIMEOUT, self.view.wait_for(|view| pred(view)))
            .await
            .expect("timed out waiting for view")
            .expect("overlay stopped")
            .clone()
    }

    async fn wait_open(&mut self) -> OverlayView {
        self.wait_for(|v| v.state == ConnectionState::Open).await
    }

    async fn stop(mut self) -> OverlayView {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        timeout(TIMEOUT, self.task).await.unwrap().unwrap();
        self.view.borrow().clone()
    }
}

fn client_config(page_url: String) -> ClientConfig {
    ClientConfig {
        page_url,
        reconnect_delay: Duration::from_millis(50),
        sweep_tick: Duration::from_millis(20),
        ..ClientConfig::default()
    }
}

fn launch(config: ClientConfig) -> Running {
    let overlay = Overlay::new(config).unwrap();
    let view = overlay.subscribe();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(overlay.run_until(async move {
        let _ = stopped.await;
    }));
    Running {
        view,
        stop: Some(stop),
        task,
    }
}

fn chat(id: u64, user: &str, text: &str) -> Value {
    json!({"type": "message", "payload": {"id": id, "user": user, "text": text}})
}

fn command(payload: Value) -> Value {
    json!({"type": "command", "payload": payload})
}

fn ids(view: &OverlayView) -> Vec<String> {
    view.messages
        .iter()
        .filter_map(|m| m.id.as_ref().map(|id| id.as_str().to_owned()))
        .collect()
}

#[tokio::test]
async fn chat_frames_reach_the_view_in_order() {
    let server = TestServer::start(json!({})).await;
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_open().await;

    server.send(chat(1, "alice", "hello"));
    server.send(json!({
        "type": "highlight",
        "payload": {
            "id": "2",
            "user": "bob",
            "text": "nice :kappa:",
            "emotes": [{"id": ":kappa:", "url": "http://cdn/kappa.png"}],
            "pm": true,
            "badge": "mod"
        }
    }));

    let view = running.wait_for(|v| v.messages.len() == 2).await;
    assert_eq!(ids(&view), ["1", "2"]);
    assert_eq!(view.messages[0].style, "style_message");
    assert_eq!(view.messages[1].style, "style_highlight");
    assert!(view.messages[1].pm);
    assert_eq!(
        view.messages[1].text,
        r#"nice <img class="smile" src="http://cdn/kappa.png"  alt=""/>"#
    );
    assert_eq!(view.messages[1].extra["badge"], "mod");

    let _ = running.stop().await;
}

#[tokio::test]
async fn commands_mutate_the_store() {
    let server = TestServer::start(json!({})).await;
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_open().await;

    server.send(chat(1, "Alice", "a"));
    server.send(chat(2, "bob", "b"));
    server.send(chat(3, "carol", "c"));
    let _ = running.wait_for(|v| v.messages.len() == 3).await;

    server.send(command(json!({"command": "remove_by_users", "users": ["ALICE"]})));
    server.send(command(json!({"command": "bogus"})));
    server.send(command(json!({"command": "replace_by_ids", "messages": [3], "text": "<removed>"})));

    let view = running
        .wait_for(|v| v.messages.len() == 2 && v.messages[1].text == "<removed>")
        .await;
    assert_eq!(ids(&view), ["2", "3"]);

    let _ = running.stop().await;
}

#[tokio::test]
async fn settings_apply_capacity_and_clear_sweep() {
    let server = TestServer::start(json!({
        "clear_timer": 0.3,
        "message_limit": 2,
        "style": {"message": {"color": "red"}}
    }))
    .await;
    let mut running = launch(client_config(server.page_url()));
    let view = running.wait_for(|v| !v.styles.is_empty()).await;
    assert_eq!(view.styles["style_message"]["color"], "red");

    for id in 1..=3 {
        server.send(chat(id, "u", "x"));
    }
    let view = running
        .wait_for(|v| ids(v) == ["2", "3"])
        .await;
    assert_eq!(view.messages.len(), 2);

    let view = running.wait_for(|v| v.messages.is_empty()).await;
    assert_eq!(view.state, ConnectionState::Open);
    assert_eq!(server.settings_hits(), 1);

    let _ = running.stop().await;
}

#[tokio::test]
async fn decay_sweep_marks_messages_old() {
    let server = TestServer::start(json!({"decay_timer": 0.2, "style": {"x": {}}})).await;
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_for(|v| !v.styles.is_empty()).await;

    server.send(chat(1, "u", "x"));
    let view = running.wait_for(|v| v.messages.len() == 1).await;
    assert!(!view.messages[0].old);

    let view = running
        .wait_for(|v| v.messages.first().is_some_and(|m| m.old))
        .await;
    assert_eq!(view.messages.len(), 1);

    let _ = running.stop().await;
}

#[tokio::test]
async fn reconnects_after_server_drop_and_keeps_messages() {
    let server = TestServer::start(json!({})).await;
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_open().await;

    server.send(chat(1, "alice", "before"));
    let _ = running.wait_for(|v| v.messages.len() == 1).await;

    server.drop_clients();
    let _ = running
        .wait_for(|v| v.state == ConnectionState::Reconnecting)
        .await;
    let view = running.wait_open().await;

    assert_eq!(server.connections(), 2);
    assert_eq!(view.attempts, 0);
    assert_eq!(ids(&view), ["1"]);

    server.send(chat(2, "bob", "after"));
    let view = running.wait_for(|v| v.messages.len() == 2).await;
    assert_eq!(ids(&view), ["1", "2"]);

    let _ = running.stop().await;
}

#[tokio::test]
async fn reload_discards_messages_and_refetches_settings() {
    let server = TestServer::start(json!({"style": {"message": {}}})).await;
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_for(|v| !v.styles.is_empty()).await;

    server.send(chat(1, "alice", "hi"));
    let _ = running.wait_for(|v| v.messages.len() == 1).await;

    server.send(command(json!({"command": "reload"})));
    let _ = running
        .wait_for(|v| v.messages.is_empty() && v.styles.is_empty())
        .await;
    let _ = running.wait_for(|v| !v.styles.is_empty()).await;

    assert_eq!(server.connections(), 2);
    assert_eq!(server.settings_hits(), 2);

    let _ = running.stop().await;
}

#[tokio::test]
async fn failed_settings_fetch_is_retried_on_next_open() {
    let server = TestServer::start(json!({})).await;
    server.set_settings(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": "boom"}));
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_open().await;

    timeout(TIMEOUT, async {
        while server.settings_hits() < 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    // let the failed result land before the socket drops
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(running.view.borrow().styles.is_empty());

    server.set_settings(StatusCode::OK, json!({"style": {"message": {"color": "blue"}}}));
    server.drop_clients();

    let view = running.wait_for(|v| !v.styles.is_empty()).await;
    assert_eq!(view.styles["style_message"]["color"], "blue");
    assert_eq!(server.settings_hits(), 2);

    let _ = running.stop().await;
}

#[tokio::test]
async fn unreachable_server_keeps_retrying() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let mut running = launch(client_config(format!("http://{addr}/")));

    let view = running.wait_for(|v| v.attempts >= 3).await;
    assert_ne!(view.state, ConnectionState::Open);

    let view = running.stop().await;
    assert_eq!(view.state, ConnectionState::Disconnected);
}

#[tokio::test]
async fn shutdown_closes_the_connection() {
    let server = TestServer::start(json!({})).await;
    let mut running = launch(client_config(server.page_url()));
    let _ = running.wait_open().await;

    let view = running.stop().await;
    assert_eq!(view.state, ConnectionState::Disconnected);
    assert_eq!(server.connections(), 1);
}
