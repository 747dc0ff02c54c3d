//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{Actor, MatchSnapshot, PlayerView, SessionError, SessionHandle};
use crate::http::middleware::verify_jwt;
use crate::http::routes::AppError;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Replies addressed to this connection only
const DIRECT_CAPACITY: usize = 16;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// JWT token for authentication
    pub token: String,
    /// Match to attach to
    pub match_id: Uuid,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    // Verify JWT token before upgrading
    let claims = match verify_jwt(&query.token, &state.config.jwt_secret) {
        Ok(claims) => claims,
        Err(e) => {
            warn!(error = %e, "WebSocket auth failed");
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let session = match state.sessions.get_or_resume(query.match_id).await {
        Ok(session) => session,
        Err(e) => return AppError::from(e).into_response(),
    };

    info!(player_id = %claims.sub, match_id = %query.match_id, "WebSocket upgrade for authenticated user");
    ws.on_upgrade(move |socket| handle_socket(socket, claims.sub, session))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, player_id: String, session: SessionHandle) {
    let match_id = session.id;
    info!(player_id = %player_id, match_id = %match_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before reading the current state so no update falls between
    let snapshot_rx = session.subscribe();

    let welcome = ServerMsg::Welcome {
        player_id: player_id.clone(),
        match_id,
        server_time: unix_millis(),
    };
    let initial = view_msg(&session.snapshot(), &player_id);

    for msg in [welcome, initial] {
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            error!(player_id = %player_id, error = %e, "Failed to send greeting");
            return;
        }
    }

    run_connection(player_id.clone(), session, ws_sink, ws_stream, snapshot_rx).await;

    info!(player_id = %player_id, match_id = %match_id, "WebSocket connection closed");
}

/// Run the connection with read/write split
async fn run_connection(
    player_id: String,
    session: SessionHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut snapshot_rx: broadcast::Receiver<MatchSnapshot>,
) {
    let rate_limiter = PlayerRateLimiter::new();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(DIRECT_CAPACITY);

    // Spawn writer task: match updates and direct replies -> WebSocket
    let writer_player_id = player_id.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                update = snapshot_rx.recv() => match update {
                    Ok(snapshot) => view_msg(&snapshot, &writer_player_id),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            player_id = %writer_player_id,
                            lagged_count = n,
                            "Client lagged, skipping {} updates", n
                        );
                        // Continue - the next update carries full state
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %writer_player_id, "Update channel closed");
                        break;
                    }
                },
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        let _ = direct_tx
                            .send(ServerMsg::Error {
                                code: "bad_message".to_string(),
                                message: e.to_string(),
                            })
                            .await;
                        continue;
                    }
                };

                if let Some(reply) = dispatch(&session, &player_id, client_msg).await {
                    if direct_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}

/// Forward one client message; returns a reply meant for this connection only.
/// Successful commands answer through the shared update stream instead.
async fn dispatch(session: &SessionHandle, player_id: &str, msg: ClientMsg) -> Option<ServerMsg> {
    if let ClientMsg::Ping { t } = msg {
        return Some(ServerMsg::Pong {
            t,
            server_time: unix_millis(),
        });
    }

    let command = msg.into_command()?;
    let name = command.name();
    match session.submit(Actor::player(player_id), command).await {
        Ok(_) => None,
        Err(SessionError::Rejected(reason)) => Some(ServerMsg::Rejected {
            command: name.to_string(),
            code: reason.code().to_string(),
            message: reason.to_string(),
        }),
        Err(e) => {
            error!(player_id = %player_id, match_id = %session.id, error = %e, "Command failed");
            Some(ServerMsg::Error {
                code: "unavailable".to_string(),
                message: e.to_string(),
            })
        }
    }
}

fn view_msg(snapshot: &MatchSnapshot, player_id: &str) -> ServerMsg {
    ServerMsg::View(Box::new(PlayerView::for_player(snapshot, player_id)))
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::engine::tests::{GUEST, HOST};
    use crate::game::{SessionRegistry, SessionSettings, TimeControl};
    use crate::store::MatchStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn dispatch_replies_only_on_rejection() {
        let registry = Arc::new(SessionRegistry::new(
            MatchStore::memory(),
            SessionSettings::default(),
        ));
        let session = registry.create(HOST, "Mesa", TimeControl::Blitz).await.unwrap();

        let pong = dispatch(&session, GUEST, ClientMsg::Ping { t: 9 }).await;
        assert!(matches!(pong, Some(ServerMsg::Pong { t: 9, .. })));

        assert!(dispatch(&session, GUEST, ClientMsg::Join).await.is_none());

        let rejected = dispatch(&session, GUEST, ClientMsg::Join).await;
        match rejected {
            Some(ServerMsg::Rejected { command, code, .. }) => {
                assert_eq!(command, "join");
                assert_eq!(code, "invalid_command");
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }
}
