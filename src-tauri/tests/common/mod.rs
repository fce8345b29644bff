#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};
use url::Url;

use examlm_lib::services::session_service::SessionEvent;

pub const WAIT: Duration = Duration::from_secs(5);

enum Outgoing {
    Text(String),
    Close,
}

/// Scripted stand-in for the assistant service: accepts one stream, reports
/// every text frame it receives, and sends whatever the test tells it to.
pub struct TestServer {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<String>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (outgoing, mut outgoing_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            loop {
                tokio::select! {
                    frame = ws.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let _ = received_tx.send(text);
                        }
                        Some(Ok(WsMessage::Close(_))) | None | Some(Err(_)) => break,
                        Some(Ok(_)) => {}
                    },
                    out = outgoing_rx.recv() => match out {
                        Some(Outgoing::Text(text)) => {
                            if ws.send(WsMessage::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(Outgoing::Close) | None => {
                            let _ = ws.close(None).await;
                            break;
                        }
                    },
                }
            }
        });

        Self { addr, received, outgoing }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("ws://{}/{}", self.addr, path)).unwrap()
    }

    pub async fn next_text(&mut self) -> String {
        tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("server waited too long for a frame")
            .expect("client stream ended")
    }

    pub async fn next_json(&mut self) -> Value {
        serde_json::from_str(&self.next_text().await).unwrap()
    }

    pub fn send(&self, text: &str) {
        self.outgoing.send(Outgoing::Text(text.to_string())).unwrap();
    }

    pub fn close(&self) {
        let _ = self.outgoing.send(Outgoing::Close);
    }
}

/// Receive events until one matches.
pub async fn wait_for(
    events: &mut mpsc::UnboundedReceiver<SessionEvent>,
    pred: impl Fn(&SessionEvent) -> bool,
) -> SessionEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event stream ended");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event never arrived")
}
