use crate::models::Class;
use crate::services::{config_service, ingest_service};
use super::AppState;
use tauri::State;

#[tauri::command]
pub fn list_classes(state: State<'_, AppState>) -> Result<Vec<Class>, String> {
    Ok(state.storage.list_classes()?)
}

#[tauri::command]
pub fn get_class(state: State<'_, AppState>, id: String) -> Result<Class, String> {
    Ok(state.storage.get_class(&id)?)
}

#[tauri::command]
pub async fn create_class(state: State<'_, AppState>, title: String) -> Result<Class, String> {
    let class = state.storage.add_class(&title)?;

    let config = config_service::effective_config()?;
    ingest_service::notify_class_created_logged(&config, &class.id).await;

    Ok(class)
}
