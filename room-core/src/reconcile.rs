use chrono::{DateTime, Utc};
use room_types::{CloseReason, ParticipantId, Room, RoomError};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{info, warn};

use crate::{PresenceChannel, RoomStore};

/// What one reconciliation pass changed in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub rooms_checked: usize,
    pub players_deactivated: usize,
    pub rooms_closed: usize,
}

impl ReconcileReport {
    fn absorb(&mut self, other: ReconcileReport) {
        self.rooms_checked += other.rooms_checked;
        self.players_deactivated += other.players_deactivated;
        self.rooms_closed += other.rooms_closed;
    }
}

/// Bring one room's durable player flags in line with presence.
///
/// Presence decides who is here. An active player missing from presence for
/// longer than `grace` (measured from `joined_at`) is marked inactive, and a
/// room left with no active players and nobody present is closed.
pub async fn reconcile_room(
    store: &dyn RoomStore,
    presence: &dyn PresenceChannel,
    room: &Room,
    grace: Duration,
    now: DateTime<Utc>,
) -> Result<ReconcileReport, RoomError> {
    let members = presence.members(room.id).await?;
    let present: HashSet<&ParticipantId> = members.iter().map(|m| &m.participant).collect();
    let grace = chrono::Duration::from_std(grace).unwrap_or_else(|_| chrono::Duration::zero());

    let mut report = ReconcileReport {
        rooms_checked: 1,
        ..ReconcileReport::default()
    };
    let mut still_active = 0;

    for player in store.list_players(room.id).await? {
        if !player.is_active {
            continue;
        }
        if present.contains(&player.participant) {
            still_active += 1;
            continue;
        }

        let within_grace = DateTime::parse_from_rfc3339(&player.joined_at)
            .map(|joined| now.signed_duration_since(joined.with_timezone(&Utc)) < grace)
            .unwrap_or(false);
        if within_grace {
            still_active += 1;
            continue;
        }

        info!(
            "Player {} ({}) absent from room {}, marking inactive",
            player.nickname, player.participant, room.code
        );
        store.set_player_active(player.id, false).await?;
        report.players_deactivated += 1;
    }

    if still_active == 0 && members.is_empty() {
        info!("Room {} has nobody left, closing it", room.code);
        store.close_room(room.id, CloseReason::Abandoned).await?;
        report.rooms_closed += 1;
    }

    Ok(report)
}

/// Reconcile every active room. A failure in one room is logged and does
/// not stop the pass.
pub async fn reconcile_active_rooms(
    store: &dyn RoomStore,
    presence: &dyn PresenceChannel,
    grace: Duration,
) -> Result<ReconcileReport, RoomError> {
    let now = Utc::now();
    let mut report = ReconcileReport::default();

    for room in store.active_rooms().await? {
        match reconcile_room(store, presence, &room, grace, now).await {
            Ok(room_report) => report.absorb(room_report),
            Err(e) => warn!("Failed to reconcile room {}: {}", room.code, e),
        }
    }

    Ok(report)
}
