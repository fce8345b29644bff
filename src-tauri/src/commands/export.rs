use crate::models::GeneratedDocument;
use crate::services::export_service;
use super::AppState;
use std::path::Path;
use tauri::State;

fn find_document(state: &AppState, class_id: &str, document_id: &str) -> Result<GeneratedDocument, String> {
    let session = state.sessions.get(class_id)?;
    session
        .snapshot()
        .documents
        .into_iter()
        .find(|d| d.id == document_id)
        .ok_or_else(|| format!("Document not found: {}", document_id))
}

#[tauri::command]
pub fn export_document(
    state: State<'_, AppState>,
    class_id: String,
    document_id: String,
    output_path: String,
) -> Result<(), String> {
    let document = find_document(&state, &class_id, &document_id)?;
    Ok(export_service::export_document(&document, Path::new(&output_path))?)
}

#[tauri::command]
pub fn render_document_html(
    state: State<'_, AppState>,
    class_id: String,
    document_id: String,
) -> Result<String, String> {
    let document = find_document(&state, &class_id, &document_id)?;
    Ok(export_service::render_html(&document))
}
