use crate::error::AppResult;
use crate::models::ConnectionStatus;
use crate::services::protocol::Outbound;
use crate::services::router::ResponseRouter;

use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use url::Url;

/// One open stream to the assistant service, bound to a single class.
///
/// Inbound text frames go to the [`ResponseRouter`]; outbound frames are
/// queued to a writer task. There is no reconnection: once the stream is
/// closed or errored the owner has to open a new one.
pub struct Connection {
    class_id: String,
    outbound_tx: mpsc::UnboundedSender<WsMessage>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    router: ResponseRouter,
    reader: JoinHandle<()>,
    closed: AtomicBool,
}

impl Connection {
    /// Connect to `endpoint` and bind the stream to `class_id`.
    pub async fn open(endpoint: &Url, class_id: &str, router: ResponseRouter) -> AppResult<Self> {
        let (status_tx, _) = watch::channel(ConnectionStatus::Connecting);
        let status_tx = Arc::new(status_tx);

        info!("[connection] connecting to {} for class {}", endpoint, class_id);
        let (ws_stream, _) = connect_async(endpoint.as_str()).await.map_err(|e| {
            error!("[connection] failed to open {}: {}", endpoint, e);
            e
        })?;
        let (mut ws_tx, mut ws_rx) = ws_stream.split();

        let bind = Outbound::Bind { class_id: class_id.to_string() };
        ws_tx.send(WsMessage::Text(bind.encode())).await?;
        status_tx.send_replace(ConnectionStatus::Open);
        info!("[connection] stream open for class {}", class_id);

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<WsMessage>();

        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                let closing = matches!(msg, WsMessage::Close(_));
                if let Err(e) = ws_tx.send(msg).await {
                    warn!("[connection] write failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader = {
            let router = router.clone();
            let status_tx = Arc::clone(&status_tx);
            let pong_tx = outbound_tx.clone();
            let class_id = class_id.to_string();
            tokio::spawn(async move {
                let end = loop {
                    match ws_rx.next().await {
                        Some(Ok(WsMessage::Text(text))) => {
                            router.dispatch(&text);
                        }
                        Some(Ok(WsMessage::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => {
                                router.dispatch(&text);
                            }
                            Err(_) => debug!("[connection] ignoring non-UTF-8 binary frame"),
                        },
                        Some(Ok(WsMessage::Ping(data))) => {
                            let _ = pong_tx.send(WsMessage::Pong(data));
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break ConnectionStatus::Closed,
                        Some(Err(e)) => {
                            warn!("[connection] stream error for class {}: {}", class_id, e);
                            break ConnectionStatus::Errored;
                        }
                        Some(Ok(_)) => continue,
                    }
                };

                router.cancel_pending();
                status_tx.send_if_modified(|status| {
                    if status.is_open() {
                        *status = end;
                        true
                    } else {
                        false
                    }
                });
                info!("[connection] stream for class {} ended ({:?})", class_id, end);
            })
        };

        Ok(Self {
            class_id: class_id.to_string(),
            outbound_tx,
            status_tx,
            router,
            reader,
            closed: AtomicBool::new(false),
        })
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status_tx.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.status().is_open()
    }

    /// Observe status transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Queue a frame. Returns `false`, after logging, when the stream is not
    /// open; callers check connectivity before offering send actions.
    pub fn send(&self, msg: &Outbound) -> bool {
        if !self.is_open() {
            warn!(
                "[connection] stream for class {} is {:?}; message not sent",
                self.class_id,
                self.status()
            );
            return false;
        }
        self.outbound_tx.send(WsMessage::Text(msg.encode())).is_ok()
    }

    /// Close the stream. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.outbound_tx.send(WsMessage::Close(None));
        self.reader.abort();
        self.router.cancel_pending();
        self.status_tx.send_replace(ConnectionStatus::Closed);
        info!("[connection] closed stream for class {}", self.class_id);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}
