use crate::models::{DocumentType, GeneratedDocument, Message};
use crate::services::config_service;
use crate::services::session_service::{EventSink, SessionEvent, SessionSnapshot};
use super::AppState;
use std::sync::Arc;
use tauri::{AppHandle, Emitter, State};

impl EventSink for AppHandle {
    fn emit(&self, event: SessionEvent) {
        if let Err(e) = Emitter::emit(self, "class-session", &event) {
            log::warn!("[session] failed to emit event: {}", e);
        }
    }
}

/// Open the stream for a class page. Reopening replaces the old session.
#[tauri::command]
pub async fn open_class_session(
    app: AppHandle,
    state: State<'_, AppState>,
    class_id: String,
) -> Result<SessionSnapshot, String> {
    state.storage.get_class(&class_id)?;
    let config = config_service::effective_config()?;
    let session = state.sessions.open(&config, &class_id, Arc::new(app)).await?;
    Ok(session.snapshot())
}

#[tauri::command]
pub fn close_class_session(state: State<'_, AppState>, class_id: String) -> bool {
    state.sessions.close(&class_id)
}

#[tauri::command]
pub fn send_chat_message(
    state: State<'_, AppState>,
    class_id: String,
    message: String,
) -> Result<Message, String> {
    let session = state.sessions.get(&class_id)?;
    Ok(session.send_chat(&message)?)
}

#[tauri::command]
pub async fn generate_document(
    state: State<'_, AppState>,
    class_id: String,
    document_type: DocumentType,
    format: Option<String>,
) -> Result<GeneratedDocument, String> {
    let session = state.sessions.get(&class_id)?;
    let format = format.unwrap_or_default();
    Ok(session.generate_document(document_type, &format).await?)
}

#[tauri::command]
pub fn get_session_snapshot(state: State<'_, AppState>, class_id: String) -> Result<SessionSnapshot, String> {
    Ok(state.sessions.get(&class_id)?.snapshot())
}
