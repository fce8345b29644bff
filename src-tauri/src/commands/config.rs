use crate::services::config_service;

#[tauri::command]
pub fn get_config() -> Result<config_service::Config, String> {
    Ok(config_service::effective_config()?)
}

#[tauri::command]
pub fn set_server_url(url: String) -> Result<config_service::Config, String> {
    Ok(config_service::set_server_url(&url)?)
}

#[tauri::command]
pub fn set_document_timeout(secs: u64) -> Result<config_service::Config, String> {
    Ok(config_service::set_document_timeout(secs)?)
}
