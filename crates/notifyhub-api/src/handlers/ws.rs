//! WebSocket upgrade handler.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use notifyhub_core::types::UserId;
use notifyhub_entity::Namespace;
use notifyhub_realtime::transport::SessionHandle;

use crate::dto::request::WsQuery;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /ws?user_id=&namespace=
///
/// Attaches a live session, then upgrades.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let namespace = match query.namespace.as_deref() {
        Some(ns) => ns.parse::<Namespace>()?,
        None => Namespace::General,
    };
    let user_id = UserId::new(query.user_id);
    // Attach before upgrading so unknown users and forbidden namespaces
    // get a proper HTTP error.
    let (session, outbound_rx) = state.engine.connect(&user_id, namespace).await?;

    Ok(ws.on_upgrade(move |socket| handle_ws_connection(state, session, outbound_rx, socket)))
}

/// Pumps outbound notifications to the socket until either side closes.
async fn handle_ws_connection(
    state: AppState,
    session: Arc<SessionHandle>,
    mut outbound_rx: mpsc::Receiver<String>,
    socket: WebSocket,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let session_id = session.id;

    info!(
        session_id = %session_id,
        user_id = %session.user_id,
        namespace = %session.namespace,
        "WebSocket session established"
    );

    let outbound_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) => {
                debug!(session_id = %session_id, len = text.len(), "Ignoring inbound text frame");
            }
            Ok(_) => {}
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    outbound_task.abort();
    session.mark_dead();
    state.engine.disconnect(&session_id);

    info!(
        session_id = %session_id,
        user_id = %session.user_id,
        "WebSocket session closed"
    );
}
