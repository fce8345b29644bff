//! Short-lived streams that tell the assistant service about new classes and
//! sources so it can prepare and index them.

use crate::error::{AppError, AppResult};
use crate::services::config_service::Config;
use crate::services::protocol::Outbound;

use futures::{SinkExt, StreamExt};
use log::{info, warn};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

/// Let the service create the working folder for a new class.
pub async fn notify_class_created(config: &Config, class_id: &str) -> AppResult<()> {
    let endpoint = config.create_class_endpoint(class_id)?;
    let (mut ws, _) = connect_async(endpoint.as_str()).await?;
    let _ = ws.close(None).await;
    info!("[ingest] announced class {}", class_id);
    Ok(())
}

/// Ask the service to index a stored source. Resolves to the service's
/// acknowledgement text.
pub async fn index_source(config: &Config, class_id: &str, file_path: &str) -> AppResult<String> {
    let endpoint = config.add_source_endpoint()?;
    let (ws, _) = connect_async(endpoint.as_str()).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    ws_tx
        .send(WsMessage::Text(Outbound::Bind { class_id: class_id.to_string() }.encode()))
        .await?;
    ws_tx
        .send(WsMessage::Text(Outbound::IndexSource { file_path: file_path.to_string() }.encode()))
        .await?;

    let ack = tokio::time::timeout(config.ingest_timeout(), async {
        loop {
            match ws_rx.next().await {
                Some(Ok(WsMessage::Text(text))) => return Ok(text),
                Some(Ok(WsMessage::Close(_))) | None => return Err(AppError::Disconnected),
                Some(Err(e)) => return Err(AppError::from(e)),
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .map_err(|_| {
        AppError::Other(format!(
            "no acknowledgement for {} within {:?}",
            file_path,
            config.ingest_timeout()
        ))
    })??;

    let _ = ws_tx.send(WsMessage::Close(None)).await;
    info!("[ingest] {} indexed for class {}: {}", file_path, class_id, ack);
    Ok(ack)
}

/// [`index_source`], logging instead of failing: the stored source stands
/// whether or not the service took it.
pub async fn index_source_logged(config: &Config, class_id: &str, file_path: &str) -> Option<String> {
    match index_source(config, class_id, file_path).await {
        Ok(ack) => Some(ack),
        Err(e) => {
            warn!("[ingest] could not index {} for class {}: {}", file_path, class_id, e);
            None
        }
    }
}

pub async fn notify_class_created_logged(config: &Config, class_id: &str) {
    if let Err(e) = notify_class_created(config, class_id).await {
        warn!("[ingest] could not announce class {}: {}", class_id, e);
    }
}
