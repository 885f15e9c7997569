use std::sync::Arc;
use warp::Filter;

use crate::websocket::ConnectionManager;
use room_core::{Collaborators, RoomPolicy};
use room_persistence::RoomRepository;

pub mod config;
pub mod similarity;
pub mod websocket;

pub fn create_routes(
    connection_manager: Arc<ConnectionManager>,
    collaborators: Collaborators,
    policy: RoomPolicy,
    room_repository: Arc<RoomRepository>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let connection_manager_filter = warp::any().map({
        let connection_manager = connection_manager.clone();
        move || connection_manager.clone()
    });

    let session_filter = warp::any().map(move || (collaborators.clone(), policy.clone()));

    let room_repository_filter = warp::any().map({
        let room_repository = room_repository.clone();
        move || room_repository.clone()
    });

    // WebSocket endpoint
    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(connection_manager_filter)
        .and(session_filter)
        .map(
            |ws: warp::ws::Ws,
             conn_mgr: Arc<ConnectionManager>,
             (collaborators, policy): (Collaborators, RoomPolicy)| {
                ws.on_upgrade(move |socket| {
                    websocket::handle_connection(socket, conn_mgr, collaborators, policy)
                })
            },
        );

    // Health check endpoint
    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    // Room lobby info, no session required
    let room_summary = warp::path!("rooms" / String)
        .and(warp::get())
        .and(room_repository_filter)
        .and_then(handle_room_summary_request);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET"]);

    websocket
        .or(health)
        .or(room_summary)
        .with(cors)
        .with(warp::log("room_server"))
}

async fn handle_room_summary_request(
    code: String,
    room_repository: Arc<RoomRepository>,
) -> Result<impl warp::Reply, warp::Rejection> {
    match room_repository.room_summary(&code).await {
        Ok(Some(summary)) => Ok(warp::reply::with_status(
            warp::reply::json(&summary),
            warp::http::StatusCode::OK,
        )),
        Ok(None) => Ok(warp::reply::with_status(
            warp::reply::json(&serde_json::json!({
                "error": "Room not found"
            })),
            warp::http::StatusCode::NOT_FOUND,
        )),
        Err(err) => {
            tracing::error!("Failed to fetch room {}: {}", code, err);
            Ok(warp::reply::with_status(
                warp::reply::json(&serde_json::json!({
                    "error": "Failed to fetch room"
                })),
                warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            ))
        }
    }
}
