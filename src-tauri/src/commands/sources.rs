use crate::models::{Source, SourceEntry};
use crate::services::{config_service, ingest_service};
use super::AppState;
use std::path::Path;
use tauri::State;

#[tauri::command]
pub fn list_sources(state: State<'_, AppState>, class_id: String) -> Result<Vec<SourceEntry>, String> {
    Ok(state.storage.list_sources(&class_id)?)
}

async fn index(state: &AppState, class_id: &str, source: &Source) -> Result<(), String> {
    let config = config_service::effective_config()?;
    let location = state.storage.source_location(source);
    ingest_service::index_source_logged(&config, class_id, &location).await;
    Ok(())
}

#[tauri::command]
pub async fn add_source(
    state: State<'_, AppState>,
    class_id: String,
    title: String,
    file_name: String,
    bytes: Vec<u8>,
) -> Result<Source, String> {
    let source = state.storage.add_source(&class_id, &title, &file_name, &bytes)?;
    index(&state, &class_id, &source).await?;
    Ok(source)
}

/// Upload a file picked through the native dialog.
#[tauri::command]
pub async fn add_source_from_path(
    state: State<'_, AppState>,
    class_id: String,
    title: String,
    path: String,
) -> Result<Source, String> {
    let file_name = Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| format!("Invalid file path: {}", path))?
        .to_string();
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| format!("Failed to read {}: {}", path, e))?;

    let source = state.storage.add_source(&class_id, &title, &file_name, &bytes)?;
    index(&state, &class_id, &source).await?;
    Ok(source)
}

#[tauri::command]
pub async fn add_url_source(
    state: State<'_, AppState>,
    class_id: String,
    title: String,
    url: String,
) -> Result<Source, String> {
    let source = state.storage.add_url_source(&class_id, &title, &url)?;
    index(&state, &class_id, &source).await?;
    Ok(source)
}

#[tauri::command]
pub fn delete_source(state: State<'_, AppState>, class_id: String, source_id: String) -> Result<(), String> {
    Ok(state.storage.delete_source(&class_id, &source_id)?)
}
