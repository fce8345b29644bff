pub mod error;
pub mod models;
pub mod services;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use commands::*;
    use services::config_service;
    use services::file_service::Storage;
    use tauri::Manager;

    let level = config_service::load_config()
        .ok()
        .and_then(|c| c.log_level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info);

    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::new()
            .level(level)
            .target(tauri_plugin_log::Target::new(
                tauri_plugin_log::TargetKind::LogDir { file_name: Some("examlm".into()) },
            ))
            .max_file_size(5_000_000)
            .build())
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let storage = Storage::open_default()?;
            log::info!("[storage] data directory {}", storage.root().display());
            app.manage(AppState::new(storage));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Config commands
            get_config,
            set_server_url,
            set_document_timeout,
            // Class commands
            list_classes,
            get_class,
            create_class,
            // Source commands
            list_sources,
            add_source,
            add_source_from_path,
            add_url_source,
            delete_source,
            // Session commands
            open_class_session,
            close_class_session,
            send_chat_message,
            generate_document,
            get_session_snapshot,
            // Export commands
            export_document,
            render_document_html,
        ])
        .build(tauri::generate_context!())
        .expect("error while running tauri application")
        .run(|app, event| {
            if let tauri::RunEvent::Exit = event {
                app.state::<AppState>().sessions.close_all();
            }
        });
}
