use chrono::Local;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::websocket::connection::{ConnectionId, ConnectionManager};
use room_core::{RoomSessionController, format_word_date};
use room_types::{ClientMessage, RoomError, ServerMessage, SessionNotice};

/// Drives one connection's Room Session Controller from client messages.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    connection_manager: Arc<ConnectionManager>,
    controller: RoomSessionController,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        connection_manager: Arc<ConnectionManager>,
        controller: RoomSessionController,
    ) -> Self {
        Self {
            connection_id,
            connection_manager,
            controller,
        }
    }

    pub async fn handle_message(&self, message: ClientMessage) -> Result<(), String> {
        self.connection_manager
            .update_activity(self.connection_id)
            .await;

        match message {
            ClientMessage::CreateRoom {
                nickname,
                word_date,
            } => self.handle_create_room(nickname, word_date).await,
            ClientMessage::JoinRoom {
                room_code,
                nickname,
            } => self.handle_join_room(room_code, nickname).await,
            ClientMessage::MakeGuess { word } => self.handle_make_guess(word).await,
            ClientMessage::LeaveRoom => self.handle_leave_room().await,
            ClientMessage::ResetSession => self.handle_reset_session().await,
            ClientMessage::Heartbeat => self.send_message(ServerMessage::HeartbeatAck).await,
        }
    }

    /// Socket closed: leave the room so the store and presence forget us.
    pub async fn handle_disconnect(&self) {
        info!("Handling disconnect for connection {}", self.connection_id);

        if let Err(e) = self.controller.leave_room().await {
            warn!(
                "Failed to leave room on disconnect for {}: {}",
                self.connection_id, e
            );
        }
        self.controller.cleanup().await;
    }

    /// Pushes every session state change and notice to the client. Returns
    /// once the connection can no longer be written to.
    pub async fn forward_session_events(&self) {
        let mut states = self.controller.subscribe();
        let mut notices = self.controller.notices();

        loop {
            let message = tokio::select! {
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = states.borrow_and_update().clone();
                    ServerMessage::SessionUpdate { state }
                }
                received = notices.recv() => match received {
                    Ok(notice) => {
                        if matches!(notice, SessionNotice::RoomClosed { .. }) {
                            self.connection_manager.set_room(self.connection_id, None).await;
                        }
                        ServerMessage::Notice { notice }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Connection {} skipped {} notices", self.connection_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            if self.send_message(message).await.is_err() {
                break;
            }
        }
    }

    async fn handle_create_room(
        &self,
        nickname: String,
        word_date: Option<String>,
    ) -> Result<(), String> {
        let word_date =
            word_date.unwrap_or_else(|| format_word_date(Local::now().date_naive()));
        info!(
            "Connection {} creating room for {}",
            self.connection_id, word_date
        );

        match self.controller.create_room(&nickname, &word_date).await {
            Ok(room_code) => {
                self.connection_manager
                    .set_room(self.connection_id, Some(room_code.clone()))
                    .await;
                self.send_message(ServerMessage::RoomCreated { room_code })
                    .await
            }
            Err(e) => self.send_error(e).await,
        }
    }

    async fn handle_join_room(&self, room_code: String, nickname: String) -> Result<(), String> {
        info!("Connection {} joining room {}", self.connection_id, room_code);

        match self.controller.join_room(&room_code, &nickname).await {
            Ok(()) => {
                let room_code = self
                    .controller
                    .state()
                    .room
                    .map(|room| room.code)
                    .unwrap_or(room_code);
                self.connection_manager
                    .set_room(self.connection_id, Some(room_code.clone()))
                    .await;
                self.send_message(ServerMessage::RoomJoined { room_code })
                    .await
            }
            Err(e) => self.send_error(e).await,
        }
    }

    async fn handle_make_guess(&self, word: String) -> Result<(), String> {
        match self.controller.make_guess(&word).await {
            Ok(()) => Ok(()),
            Err(e) => self.send_error(e).await,
        }
    }

    async fn handle_leave_room(&self) -> Result<(), String> {
        let result = self.controller.leave_room().await;
        self.connection_manager
            .set_room(self.connection_id, None)
            .await;

        if let Err(e) = result {
            self.send_error(e).await?;
        }
        self.send_message(ServerMessage::LeftRoom).await
    }

    async fn handle_reset_session(&self) -> Result<(), String> {
        self.controller.reset_session().await;
        self.connection_manager
            .set_room(self.connection_id, None)
            .await;
        Ok(())
    }

    async fn send_error(&self, error: RoomError) -> Result<(), String> {
        if error.is_silent() {
            debug!(
                "Dropping stale result for connection {}: {:?}",
                self.connection_id, error
            );
            return Ok(());
        }

        self.send_message(ServerMessage::Error {
            message: error.to_string(),
        })
        .await
    }

    pub async fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.connection_manager
            .send_to_connection(self.connection_id, message)
            .await
    }
}
