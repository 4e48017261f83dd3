use super::rest::{ApiResult, AppState};
use crate::security::Actor;
use crate::services::PanicNotice;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use log::{debug, info, warn};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Debug, Deserialize)]
pub struct WsAuth {
    pub token: String,
}

/// Live panic feed for elevated roles. Browsers cannot set headers on a
/// WebSocket handshake, so the token travels in the query string.
pub async fn panic_feed(
    ws: WebSocketUpgrade,
    Query(auth): Query<WsAuth>,
    State(state): State<AppState>,
) -> ApiResult<Response> {
    let actor = state.security.authenticate(&auth.token)?;
    actor.ensure_elevated()?;

    // Subscribe before loading the backlog so nothing falls in between
    let receiver = state.services.panic.subscribe();
    let backlog: Vec<PanicNotice> = state
        .services
        .panic
        .open(&actor)
        .await?
        .into_iter()
        .map(PanicNotice::new)
        .collect();

    Ok(ws.on_upgrade(move |socket| stream_notices(socket, actor, backlog, receiver)))
}

async fn stream_notices(
    mut socket: WebSocket,
    actor: Actor,
    backlog: Vec<PanicNotice>,
    mut receiver: broadcast::Receiver<PanicNotice>,
) {
    info!("Panic feed opened for {} ({})", actor.name, actor.role.as_str());

    for notice in &backlog {
        if !send_notice(&mut socket, notice).await {
            return;
        }
    }

    loop {
        tokio::select! {
            notice = receiver.recv() => match notice {
                Ok(notice) => {
                    if notice.visible_to(&actor) && !send_notice(&mut socket, &notice).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Panic feed for {} skipped {} notices", actor.name, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    info!("Panic feed closed for {}", actor.name);
}

async fn send_notice(socket: &mut WebSocket, notice: &PanicNotice) -> bool {
    let text = match serde_json::to_string(notice) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize panic notice: {}", e);
            return true;
        }
    };

    if let Err(e) = socket.send(Message::Text(text)).await {
        debug!("Panic feed send failed: {}", e);
        return false;
    }
    true
}
