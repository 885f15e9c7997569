use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use room_core::{Collaborators, GuestIdentity, RoomPolicy, RoomSessionController};
use room_types::{ClientMessage, ServerMessage};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

/// Serves one websocket: a fresh guest identity and its own room session.
pub async fn handle_connection(
    websocket: WebSocket,
    connection_manager: Arc<ConnectionManager>,
    collaborators: Collaborators,
    policy: RoomPolicy,
) {
    let connection_id = ConnectionId::new();
    let identity = GuestIdentity::generate();
    info!(
        "New WebSocket connection {} for {}",
        connection_id,
        identity.as_str()
    );

    let (mut ws_sender, mut ws_receiver) = websocket.split();
    let mut rate_limiter = RateLimiter::new();

    let message_receiver = connection_manager
        .create_connection(connection_id, identity.participant())
        .await;

    let controller = RoomSessionController::for_guest(&identity, collaborators, policy);
    let message_handler =
        MessageHandler::new(connection_id, connection_manager.clone(), controller);

    if let Err(e) = message_handler
        .send_message(ServerMessage::Welcome {
            participant: identity.participant(),
        })
        .await
    {
        warn!("Failed to greet {}: {}", connection_id, e);
    }

    let incoming_handler = async {
        while let Some(result) = ws_receiver.next().await {
            match result {
                Ok(msg) if msg.is_close() => break,
                Ok(msg) => {
                    if let Err(e) =
                        handle_message(msg, &mut rate_limiter, &message_handler, connection_id)
                            .await
                    {
                        error!("Error handling message for {}: {}", connection_id, e);
                        break;
                    }
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            }
        }
    };

    let outgoing_handler = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {:?}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("Failed to send message to {}: {:?}", connection_id, e);
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming_handler => {},
        _ = outgoing_handler => {},
        _ = message_handler.forward_session_events() => {},
    }

    info!("Connection {} disconnected", connection_id);
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id).await;
}

async fn handle_message(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !rate_limiter.check_rate_limit() {
        warn!("Rate limit exceeded for connection {}", connection_id);
        return Err("Rate limit exceeded".into());
    }

    // Only handle text messages
    if !msg.is_text() {
        return Ok(());
    }

    let text = msg.to_str().map_err(|_| "Invalid text message")?;

    let client_message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Invalid message from {}: {}", connection_id, e);
            message_handler
                .send_message(ServerMessage::Error {
                    message: format!("Invalid JSON message: {}", e),
                })
                .await?;
            return Ok(());
        }
    };

    message_handler
        .handle_message(client_message)
        .await
        .map_err(|e| format!("Message handling error: {}", e))?;

    Ok(())
}
