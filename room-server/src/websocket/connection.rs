use room_types::{ParticipantId, ServerMessage};
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub participant: ParticipantId,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub room_code: Option<String>,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        participant: ParticipantId,
    ) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            participant,
            connected_at: now,
            last_activity: now,
            room_code: None,
            sender,
        };

        (connection, receiver)
    }

    pub fn update_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }
}

/// Outgoing channels of every open websocket, keyed by connection.
#[derive(Default)]
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
        participant: ParticipantId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id, participant);
        self.connections.write().await.insert(id, conn);
        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        self.connections.write().await.remove(&id);
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.read().await.get(&id).cloned()
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.update_activity();
        }
    }

    pub async fn set_room(&self, id: ConnectionId, room_code: Option<String>) {
        if let Some(connection) = self.connections.write().await.get_mut(&id) {
            connection.room_code = room_code;
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        match connections.get(&id) {
            Some(connection) => connection.send_message(message),
            None => Err("Connection not found".to_string()),
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Connections currently sitting in the given room.
    pub async fn connections_in_room(&self, room_code: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|c| c.room_code.as_deref() == Some(room_code))
            .count()
    }
}
