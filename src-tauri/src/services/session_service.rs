//! Per-class chat session: one stream, its router, and the transient chat
//! and document state the UI renders.

use crate::error::{AppError, AppResult};
use crate::models::{
    ConnectionStatus, DocumentStatus, DocumentType, GeneratedDocument, Message, Role,
};
use crate::services::config_service::Config;
use crate::services::connection::Connection;
use crate::services::protocol::{Inbound, Outbound};
use crate::services::router::ResponseRouter;

use chrono::Utc;
use log::{info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// State pushes for the UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    ConnectionChanged { class_id: String, status: ConnectionStatus },
    MessageAdded { class_id: String, message: Message },
    SuggestionsChanged { class_id: String, questions: Vec<String> },
    LoadingChanged { class_id: String, loading: bool },
    ChatError { class_id: String, error: String },
    DocumentUpdated { class_id: String, document: GeneratedDocument },
    GeneratingChanged { class_id: String, generating: bool },
}

pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: SessionEvent);
}

impl EventSink for mpsc::UnboundedSender<SessionEvent> {
    fn emit(&self, event: SessionEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub class_id: String,
    pub status: ConnectionStatus,
    pub messages: Vec<Message>,
    pub suggestions: Vec<String>,
    pub documents: Vec<GeneratedDocument>,
    pub loading: bool,
    pub generating: bool,
}

#[derive(Default)]
struct SessionState {
    messages: Vec<Message>,
    suggestions: Vec<String>,
    documents: Vec<GeneratedDocument>,
    /// A chat reply is outstanding.
    loading: bool,
    /// A document request is outstanding.
    generating: bool,
    last_message_id: u64,
}

impl SessionState {
    /// Millisecond creation time, bumped so ids stay strictly increasing.
    fn push_message(&mut self, role: Role, content: String) -> Message {
        let now = Utc::now();
        let id = (now.timestamp_millis().max(0) as u64).max(self.last_message_id + 1);
        self.last_message_id = id;

        let message = Message { id, content, role, timestamp: now };
        self.messages.push(message.clone());
        message
    }

    fn upsert_document(&mut self, document: &GeneratedDocument) {
        match self.documents.iter_mut().find(|d| d.id == document.id) {
            Some(existing) => *existing = document.clone(),
            None => self.documents.push(document.clone()),
        }
    }
}

/// Default consumer: everything the router does not hand to a pending
/// document request ends up here.
fn handle_default(
    state: &Mutex<SessionState>,
    sink: &dyn EventSink,
    class_id: &str,
    inbound: Inbound,
) {
    let class_id = class_id.to_string();
    let mut events = Vec::new();
    {
        let mut state = state.lock();
        match inbound {
            Inbound::ChatReply { response, questions } => {
                let message = state.push_message(Role::Assistant, response);
                state.suggestions = questions.clone();
                events.push(SessionEvent::MessageAdded { class_id: class_id.clone(), message });
                events.push(SessionEvent::SuggestionsChanged { class_id: class_id.clone(), questions });
            }
            Inbound::Raw(text) => {
                let message = state.push_message(Role::Assistant, text);
                state.suggestions.clear();
                events.push(SessionEvent::MessageAdded { class_id: class_id.clone(), message });
                events.push(SessionEvent::SuggestionsChanged {
                    class_id: class_id.clone(),
                    questions: Vec::new(),
                });
            }
            Inbound::Error { error } => {
                warn!("[session] service error for class {}: {}", class_id, error);
                events.push(SessionEvent::ChatError { class_id: class_id.clone(), error });
            }
            Inbound::Document { doc_type, content } => {
                info!("[session] unsolicited {} document for class {}", doc_type, class_id);
                let mut document = GeneratedDocument::pending(doc_type);
                document.content = content;
                document.status = DocumentStatus::Ready;
                state.upsert_document(&document);
                events.push(SessionEvent::DocumentUpdated { class_id: class_id.clone(), document });
            }
        }
        // any frame ends the outstanding chat turn; chat has no timeout of its own
        if state.loading {
            state.loading = false;
            events.push(SessionEvent::LoadingChanged { class_id, loading: false });
        }
    }
    for event in events {
        sink.emit(event);
    }
}

pub struct ClassSession {
    class_id: String,
    connection: Connection,
    router: ResponseRouter,
    state: Arc<Mutex<SessionState>>,
    sink: Arc<dyn EventSink>,
    document_timeout: Duration,
    tasks: Vec<JoinHandle<()>>,
    closed: Arc<AtomicBool>,
}

impl ClassSession {
    pub async fn open(config: &Config, class_id: &str, sink: Arc<dyn EventSink>) -> AppResult<Self> {
        let endpoint = config.query_endpoint()?;
        Self::open_at(&endpoint, class_id, config.document_timeout(), sink).await
    }

    pub async fn open_at(
        endpoint: &Url,
        class_id: &str,
        document_timeout: Duration,
        sink: Arc<dyn EventSink>,
    ) -> AppResult<Self> {
        let (router, mut default_rx) = ResponseRouter::new();

        sink.emit(SessionEvent::ConnectionChanged {
            class_id: class_id.to_string(),
            status: ConnectionStatus::Connecting,
        });
        let connection = match Connection::open(endpoint, class_id, router.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                sink.emit(SessionEvent::ConnectionChanged {
                    class_id: class_id.to_string(),
                    status: ConnectionStatus::Errored,
                });
                return Err(e);
            }
        };
        sink.emit(SessionEvent::ConnectionChanged {
            class_id: class_id.to_string(),
            status: ConnectionStatus::Open,
        });

        let state = Arc::new(Mutex::new(SessionState::default()));
        let closed = Arc::new(AtomicBool::new(false));

        let consumer = {
            let state = Arc::clone(&state);
            let sink = Arc::clone(&sink);
            let class_id = class_id.to_string();
            tokio::spawn(async move {
                while let Some(inbound) = default_rx.recv().await {
                    handle_default(&state, sink.as_ref(), &class_id, inbound);
                }
            })
        };

        let watcher = {
            let mut status_rx = connection.subscribe();
            let state = Arc::clone(&state);
            let sink = Arc::clone(&sink);
            let closed = Arc::clone(&closed);
            let class_id = class_id.to_string();
            tokio::spawn(async move {
                while status_rx.changed().await.is_ok() {
                    // close() reports its own transition
                    if closed.load(Ordering::SeqCst) {
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    if !status.is_open() {
                        let was_loading = std::mem::take(&mut state.lock().loading);
                        if was_loading {
                            sink.emit(SessionEvent::LoadingChanged {
                                class_id: class_id.clone(),
                                loading: false,
                            });
                        }
                    }
                    sink.emit(SessionEvent::ConnectionChanged { class_id: class_id.clone(), status });
                }
            })
        };

        Ok(Self {
            class_id: class_id.to_string(),
            connection,
            router,
            state,
            sink,
            document_timeout,
            tasks: vec![consumer, watcher],
            closed,
        })
    }

    pub fn class_id(&self) -> &str {
        &self.class_id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn router(&self) -> &ResponseRouter {
        &self.router
    }

    /// Append a user turn and send it. The reply arrives through the
    /// default consumer.
    pub fn send_chat(&self, text: &str) -> AppResult<Message> {
        if text.trim().is_empty() {
            return Err(AppError::Invalid("message is empty".into()));
        }
        if !self.connection.is_open() {
            return Err(AppError::Disconnected);
        }

        let message = {
            let mut state = self.state.lock();
            if state.loading || state.generating {
                return Err(AppError::Busy);
            }
            state.loading = true;
            state.push_message(Role::User, text.to_string())
        };

        if !self.connection.send(&Outbound::Chat { message: text.to_string() }) {
            self.state.lock().loading = false;
            return Err(AppError::Disconnected);
        }

        self.sink.emit(SessionEvent::MessageAdded {
            class_id: self.class_id.clone(),
            message: message.clone(),
        });
        self.sink.emit(SessionEvent::LoadingChanged { class_id: self.class_id.clone(), loading: true });
        Ok(message)
    }

    /// Request a document and wait for the one frame that answers it.
    ///
    /// Gives back the document in its final state: `Ready` with content,
    /// `Failed` on a service error, or `TimedOut` (empty) when nothing
    /// arrived within the safety window.
    pub async fn generate_document(
        &self,
        doc_type: DocumentType,
        format: &str,
    ) -> AppResult<GeneratedDocument> {
        if !self.connection.is_open() {
            return Err(AppError::Disconnected);
        }

        let mut document = GeneratedDocument::pending(doc_type);
        // busy checks, claim and flag form one critical section
        let pending = {
            let mut state = self.state.lock();
            if state.generating {
                return Err(AppError::RequestInFlight);
            }
            if state.loading {
                return Err(AppError::Busy);
            }
            // claim the reply before the request can produce one
            let pending = self.router.expect_one(self.document_timeout)?;
            state.generating = true;
            state.upsert_document(&document);
            pending
        };
        self.emit_document(&document);
        self.sink.emit(SessionEvent::GeneratingChanged { class_id: self.class_id.clone(), generating: true });

        let request = Outbound::GenerateDocument {
            document_type: doc_type,
            format: format.to_string(),
            class_id: self.class_id.clone(),
        };
        if !self.connection.send(&request) {
            self.router.cancel_pending();
        }

        match pending.wait().await {
            Some(Inbound::Document { doc_type: got, content }) => {
                if got != doc_type {
                    warn!("[session] asked for {} but received {}", doc_type, got);
                }
                document.content = content;
                document.status = DocumentStatus::Ready;
            }
            Some(Inbound::Raw(text)) => {
                document.content = text;
                document.status = DocumentStatus::Ready;
            }
            Some(Inbound::ChatReply { response, .. }) => {
                document.content = response;
                document.status = DocumentStatus::Ready;
            }
            Some(Inbound::Error { error }) => {
                warn!("[session] {} generation failed: {}", doc_type, error);
                document.status = DocumentStatus::Failed;
            }
            None => {
                info!("[session] {} generation for class {} timed out", doc_type, self.class_id);
                document.status = if self.connection.is_open() {
                    DocumentStatus::TimedOut
                } else {
                    DocumentStatus::Failed
                };
            }
        }

        {
            let mut state = self.state.lock();
            state.upsert_document(&document);
            state.generating = false;
        }
        self.emit_document(&document);
        self.sink.emit(SessionEvent::GeneratingChanged { class_id: self.class_id.clone(), generating: false });
        Ok(document)
    }

    fn emit_document(&self, document: &GeneratedDocument) {
        self.sink.emit(SessionEvent::DocumentUpdated {
            class_id: self.class_id.clone(),
            document: document.clone(),
        });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock();
        SessionSnapshot {
            class_id: self.class_id.clone(),
            status: self.connection.status(),
            messages: state.messages.clone(),
            suggestions: state.suggestions.clone(),
            documents: state.documents.clone(),
            loading: state.loading,
            generating: state.generating,
        }
    }

    /// End the session. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        for task in &self.tasks {
            task.abort();
        }
        self.connection.close();

        let was_loading = std::mem::take(&mut self.state.lock().loading);
        if was_loading {
            self.sink.emit(SessionEvent::LoadingChanged { class_id: self.class_id.clone(), loading: false });
        }
        self.sink.emit(SessionEvent::ConnectionChanged {
            class_id: self.class_id.clone(),
            status: ConnectionStatus::Closed,
        });
    }
}

impl Drop for ClassSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Live sessions by class id; at most one per class.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<ClassSession>>>,
}

impl SessionRegistry {
    /// Open a session for `class_id`, closing any session it replaces.
    pub async fn open(
        &self,
        config: &Config,
        class_id: &str,
        sink: Arc<dyn EventSink>,
    ) -> AppResult<Arc<ClassSession>> {
        self.close(class_id);
        let session = Arc::new(ClassSession::open(config, class_id, sink).await?);
        if let Some(previous) = self
            .sessions
            .lock()
            .insert(class_id.to_string(), Arc::clone(&session))
        {
            previous.close();
        }
        Ok(session)
    }

    pub fn get(&self, class_id: &str) -> AppResult<Arc<ClassSession>> {
        self.sessions
            .lock()
            .get(class_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Session", class_id))
    }

    /// Close and forget the session for `class_id`. Returns whether one existed.
    pub fn close(&self, class_id: &str) -> bool {
        let removed = self.sessions.lock().remove(class_id);
        match removed {
            Some(session) => {
                session.close();
                true
            }
            None => false,
        }
    }

    pub fn close_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<dyn EventSink>, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn message_ids_strictly_increase() {
        let mut state = SessionState::default();
        let ids: Vec<u64> = (0..50)
            .map(|n| state.push_message(Role::User, n.to_string()).id)
            .collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn chat_reply_sets_message_and_suggestions() {
        let state = Mutex::new(SessionState { loading: true, ..Default::default() });
        let (sink, mut rx) = recorder();

        handle_default(
            &state,
            sink.as_ref(),
            "c1",
            Inbound::ChatReply {
                response: "hi there".into(),
                questions: vec!["What topic?".into()],
            },
        );

        let state = state.lock();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, Role::Assistant);
        assert_eq!(state.messages[0].content, "hi there");
        assert_eq!(state.suggestions, vec!["What topic?".to_string()]);
        assert!(!state.loading);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[2], SessionEvent::LoadingChanged { loading: false, .. }));
    }

    #[test]
    fn raw_text_clears_suggestions() {
        let state = Mutex::new(SessionState {
            suggestions: vec!["old".into()],
            ..Default::default()
        });
        let (sink, _rx) = recorder();

        handle_default(&state, sink.as_ref(), "c1", Inbound::Raw("plain".into()));

        let state = state.lock();
        assert_eq!(state.messages[0].content, "plain");
        assert!(state.suggestions.is_empty());
    }

    #[test]
    fn service_error_is_not_a_chat_message() {
        let state = Mutex::new(SessionState { loading: true, ..Default::default() });
        let (sink, mut rx) = recorder();

        handle_default(&state, sink.as_ref(), "c1", Inbound::Error { error: "boom".into() });

        assert!(state.lock().messages.is_empty());
        assert!(!state.lock().loading);
        let events = drain(&mut rx);
        assert!(matches!(&events[0], SessionEvent::ChatError { error, .. } if error == "boom"));
    }

    #[test]
    fn unsolicited_document_is_kept_and_ends_chat_turn() {
        let state = Mutex::new(SessionState { loading: true, ..Default::default() });
        let (sink, _rx) = recorder();

        handle_default(
            &state,
            sink.as_ref(),
            "c1",
            Inbound::Document { doc_type: DocumentType::Exam, content: "Q1".into() },
        );

        let state = state.lock();
        assert_eq!(state.documents.len(), 1);
        assert_eq!(state.documents[0].status, DocumentStatus::Ready);
        assert!(!state.loading);
        assert!(state.messages.is_empty());
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let event = SessionEvent::GeneratingChanged { class_id: "c1".into(), generating: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "generating_changed");
        assert_eq!(json["classId"], "c1");
        assert_eq!(json["generating"], true);
    }
}
