//! Routes inbound frames on a shared stream between the always-on chat
//! consumer and at most one pending request.
//!
//! The service has no correlation ids, so a pending request simply claims
//! the next frame that arrives. The claim must be registered before the
//! request is sent, otherwise a fast reply reaches the chat consumer.

use crate::error::{AppError, AppResult};
use crate::services::protocol::Inbound;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Which logical consumer a frame was handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consumer {
    Default,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterState {
    Idle,
    Awaiting,
}

struct PendingSlot {
    ticket: u64,
    tx: oneshot::Sender<Inbound>,
    deadline: Instant,
    timer: JoinHandle<()>,
}

impl PendingSlot {
    fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// The caller stopped waiting; nobody would observe a rejection.
    fn abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    fn live(&self) -> bool {
        !self.expired() && !self.abandoned()
    }
}

#[derive(Default)]
struct RouterInner {
    pending: Option<PendingSlot>,
    next_ticket: u64,
}

#[derive(Clone)]
pub struct ResponseRouter {
    inner: Arc<Mutex<RouterInner>>,
    default_tx: mpsc::UnboundedSender<Inbound>,
}

/// Handle to the one frame claimed by [`ResponseRouter::expect_one`].
pub struct PendingResponse {
    ticket: u64,
    rx: oneshot::Receiver<Inbound>,
}

impl PendingResponse {
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Resolves to the claimed frame, or `None` if the safety timeout fired
    /// (or the stream went away) first.
    pub async fn wait(self) -> Option<Inbound> {
        self.rx.await.ok()
    }
}

impl ResponseRouter {
    /// Create a router and the receiving end of its default consumer.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (default_tx, default_rx) = mpsc::unbounded_channel();
        let router = Self {
            inner: Arc::new(Mutex::new(RouterInner::default())),
            default_tx,
        };
        (router, default_rx)
    }

    /// `Awaiting` only while a caller is still waiting on a live slot.
    pub fn state(&self) -> RouterState {
        let inner = self.inner.lock();
        match &inner.pending {
            Some(slot) if slot.live() => RouterState::Awaiting,
            _ => RouterState::Idle,
        }
    }

    /// Claim the next inbound frame for the caller.
    ///
    /// While a live request is waiting, a second call is rejected with
    /// [`AppError::RequestInFlight`]. A slot whose deadline has passed, or
    /// whose caller dropped its [`PendingResponse`], is reclaimed.
    pub fn expect_one(&self, timeout: Duration) -> AppResult<PendingResponse> {
        let mut inner = self.inner.lock();

        if inner.pending.as_ref().is_some_and(PendingSlot::live) {
            return Err(AppError::RequestInFlight);
        }
        if let Some(stale) = inner.pending.take() {
            stale.timer.abort();
            debug!("[router] reclaimed stale pending slot #{}", stale.ticket);
        }

        inner.next_ticket += 1;
        let ticket = inner.next_ticket;
        let (tx, rx) = oneshot::channel();

        let shared = Arc::clone(&self.inner);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let mut inner = shared.lock();
            if inner.pending.as_ref().map(|s| s.ticket) == Some(ticket) {
                inner.pending = None;
                warn!("[router] request #{} got no response within {:?}", ticket, timeout);
            }
        });

        inner.pending = Some(PendingSlot {
            ticket,
            tx,
            deadline: Instant::now() + timeout,
            timer,
        });

        Ok(PendingResponse { ticket, rx })
    }

    /// Decode a frame and hand it to exactly one consumer.
    pub fn dispatch(&self, frame: &str) -> Consumer {
        let inbound = Inbound::decode(frame);
        debug!("[router] inbound {} frame ({} bytes)", inbound.kind(), frame.len());

        let slot = self.inner.lock().pending.take();
        match slot {
            Some(slot) if !slot.expired() => {
                slot.timer.abort();
                if slot.tx.send(inbound).is_err() {
                    warn!(
                        "[router] request #{} was abandoned; dropping its response",
                        slot.ticket
                    );
                }
                Consumer::Pending
            }
            stale => {
                if let Some(stale) = stale {
                    stale.timer.abort();
                }
                if self.default_tx.send(inbound).is_err() {
                    debug!("[router] default consumer gone; frame dropped");
                }
                Consumer::Default
            }
        }
    }

    /// Release a waiting request without a response, e.g. when the stream
    /// closed underneath it.
    pub fn cancel_pending(&self) {
        if let Some(slot) = self.inner.lock().pending.take() {
            slot.timer.abort();
            debug!("[router] cancelled pending request #{}", slot.ticket);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test(start_paused = true)]
    async fn idle_frames_reach_default_consumer() {
        let (router, mut chat) = ResponseRouter::new();
        assert_eq!(router.state(), RouterState::Idle);

        assert_eq!(router.dispatch("hello"), Consumer::Default);
        assert_eq!(chat.recv().await, Some(Inbound::Raw("hello".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn expect_one_claims_exactly_one_frame() {
        let (router, mut chat) = ResponseRouter::new();

        let pending = router.expect_one(TIMEOUT).unwrap();
        assert_eq!(router.state(), RouterState::Awaiting);

        assert_eq!(router.dispatch(r#"{"type":"faq","content":"Q&A"}"#), Consumer::Pending);
        assert_eq!(router.state(), RouterState::Idle);
        assert_eq!(router.dispatch("next"), Consumer::Default);

        assert_eq!(
            pending.wait().await,
            Some(Inbound::Document { doc_type: DocumentType::Faq, content: "Q&A".into() })
        );
        assert_eq!(chat.recv().await, Some(Inbound::Raw("next".into())));
        assert!(chat.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_requests_each_get_their_own_frame() {
        let (router, mut chat) = ResponseRouter::new();

        for n in 0..3 {
            let pending = router.expect_one(TIMEOUT).unwrap();
            router.dispatch(&format!("doc {n}"));
            assert_eq!(pending.wait().await, Some(Inbound::Raw(format!("doc {n}"))));
        }
        assert!(chat.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reverts_to_idle() {
        let (router, mut chat) = ResponseRouter::new();

        let pending = router.expect_one(TIMEOUT).unwrap();
        tokio::time::sleep(TIMEOUT + Duration::from_secs(1)).await;

        assert_eq!(router.state(), RouterState::Idle);
        assert_eq!(pending.wait().await, None);

        assert_eq!(router.dispatch("late reply"), Consumer::Default);
        assert_eq!(chat.recv().await, Some(Inbound::Raw("late reply".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn second_request_is_rejected_while_awaiting() {
        let (router, _chat) = ResponseRouter::new();

        let first = router.expect_one(TIMEOUT).unwrap();
        assert!(matches!(router.expect_one(TIMEOUT), Err(AppError::RequestInFlight)));

        router.dispatch("for the first");
        assert_eq!(first.wait().await, Some(Inbound::Raw("for the first".into())));
        assert!(router.expect_one(TIMEOUT).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_request_drops_its_frame() {
        let (router, mut chat) = ResponseRouter::new();

        drop(router.expect_one(TIMEOUT).unwrap());
        assert_eq!(router.state(), RouterState::Idle);
        assert_eq!(router.dispatch("orphan"), Consumer::Pending);
        assert!(chat.try_recv().is_err());
        assert_eq!(router.state(), RouterState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_slot_is_reclaimed_by_next_request() {
        let (router, _chat) = ResponseRouter::new();

        drop(router.expect_one(TIMEOUT).unwrap());
        let next = router.expect_one(TIMEOUT).unwrap();
        router.dispatch("mine");
        assert_eq!(next.wait().await, Some(Inbound::Raw("mine".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_releases_waiter() {
        let (router, _chat) = ResponseRouter::new();

        let pending = router.expect_one(TIMEOUT).unwrap();
        router.cancel_pending();
        assert_eq!(router.state(), RouterState::Idle);
        assert_eq!(pending.wait().await, None);
    }
}
