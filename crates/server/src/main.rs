use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use shared::{
    domain::{MapId, SongId},
    error::{ApiError, ErrorCode},
    protocol::{
        MapPatch, MapSummary, NewMap, NewSong, SongSummary, StageMessage, TransformUpdate,
        ZOOM_FLOOR,
    },
};
use stage_core::SyncChannel;
use storage::{Storage, StoredMap, StoredSong};
use tokio::sync::broadcast;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

mod config;

use config::{load_settings, prepare_database_url};

/// Inline base64 map images travel in JSON bodies; give them headroom.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    storage: Storage,
    /// Relay bus between presenter and audience connections. The server
    /// reuses the engine's sync channel: same fan-out, same latest-snapshot
    /// cache that resynchronizes a late-attaching audience.
    channel: Arc<SyncChannel>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct CreatedMapResponse {
    map_id: MapId,
}

#[derive(Debug, Serialize)]
struct CreatedSongResponse {
    song_id: SongId,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WsRole {
    Presenter,
    Audience,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState {
        storage,
        channel: Arc::new(SyncChannel::new()),
    };
    let app = build_router(state);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "scenecast relay listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/maps", get(http_list_maps).post(http_create_map))
        .route(
            "/maps/:map_id",
            get(http_get_map)
                .put(http_update_map)
                .delete(http_delete_map),
        )
        .route("/maps/:map_id/transform", put(http_update_map_transform))
        .route("/songs", get(http_list_songs).post(http_create_song))
        .route("/songs/:song_id", delete(http_delete_song))
        .route("/ws", get(ws_handler))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}

async fn healthz(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ApiError>)> {
    state.storage.health_check().await.map_err(internal)?;
    Ok(Json(HealthResponse { status: "ok" }))
}

async fn http_list_maps(
    State(state): State<AppState>,
) -> Result<Json<Vec<MapSummary>>, (StatusCode, Json<ApiError>)> {
    let maps = state.storage.list_maps().await.map_err(internal)?;
    Ok(Json(maps.into_iter().map(map_summary).collect()))
}

async fn http_create_map(
    State(state): State<AppState>,
    Json(map): Json<NewMap>,
) -> Result<Json<CreatedMapResponse>, (StatusCode, Json<ApiError>)> {
    if map.name.trim().is_empty() {
        return Err(validation("map name must not be empty"));
    }
    let map_id = state.storage.create_map(&map).await.map_err(internal)?;
    info!(map_id = map_id.0, name = %map.name, "map created");
    Ok(Json(CreatedMapResponse { map_id }))
}

async fn http_get_map(
    State(state): State<AppState>,
    Path(map_id): Path<i64>,
) -> Result<Json<MapSummary>, (StatusCode, Json<ApiError>)> {
    let map = state
        .storage
        .get_map(MapId(map_id))
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no map with id {map_id}")))?;
    Ok(Json(map_summary(map)))
}

async fn http_update_map(
    State(state): State<AppState>,
    Path(map_id): Path<i64>,
    Json(patch): Json<MapPatch>,
) -> Result<Json<MapSummary>, (StatusCode, Json<ApiError>)> {
    if let Some(name) = &patch.name {
        if name.trim().is_empty() {
            return Err(validation("map name must not be empty"));
        }
    }
    let updated = state
        .storage
        .update_map(MapId(map_id), &patch)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(not_found(format!("no map with id {map_id}")));
    }
    let map = state
        .storage
        .get_map(MapId(map_id))
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no map with id {map_id}")))?;
    Ok(Json(map_summary(map)))
}

/// Writes settled presenter geometry onto the catalog record. Live sync
/// does not go through here; that is the websocket relay's job.
async fn http_update_map_transform(
    State(state): State<AppState>,
    Path(map_id): Path<i64>,
    Json(update): Json<TransformUpdate>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let zoom = update.zoom.max(ZOOM_FLOOR);
    let updated = state
        .storage
        .update_map_transform(MapId(map_id), zoom, update.rotation, update.pan_x, update.pan_y)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(not_found(format!("no map with id {map_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn http_delete_map(
    State(state): State<AppState>,
    Path(map_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let deleted = state
        .storage
        .delete_map(MapId(map_id))
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found(format!("no map with id {map_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn http_list_songs(
    State(state): State<AppState>,
) -> Result<Json<Vec<SongSummary>>, (StatusCode, Json<ApiError>)> {
    let songs = state.storage.list_songs().await.map_err(internal)?;
    Ok(Json(songs.into_iter().map(song_summary).collect()))
}

async fn http_create_song(
    State(state): State<AppState>,
    Json(song): Json<NewSong>,
) -> Result<Json<CreatedSongResponse>, (StatusCode, Json<ApiError>)> {
    if song.name.trim().is_empty() {
        return Err(validation("song name must not be empty"));
    }
    if song.file_path.trim().is_empty() {
        return Err(validation("song file path must not be empty"));
    }
    let song_id = state.storage.create_song(&song).await.map_err(internal)?;
    Ok(Json(CreatedSongResponse { song_id }))
}

async fn http_delete_song(
    State(state): State<AppState>,
    Path(song_id): Path<i64>,
) -> Result<StatusCode, (StatusCode, Json<ApiError>)> {
    let deleted = state
        .storage
        .delete_song(SongId(song_id))
        .await
        .map_err(internal)?;
    if !deleted {
        return Err(not_found(format!("no song with id {song_id}")));
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn ws_handler(
    ws: Option<WebSocketUpgrade>,
    State(state): State<AppState>,
    Query(q): Query<WsQuery>,
) -> Response {
    let role = match q.role.as_str() {
        "presenter" => WsRole::Presenter,
        "audience" => WsRole::Audience,
        other => {
            return validation(format!("unknown relay role '{other}'")).into_response();
        }
    };
    let Some(ws) = ws else {
        return validation("websocket upgrade required").into_response();
    };
    ws.on_upgrade(move |socket| ws_connection(state, socket, role, Uuid::new_v4()))
        .into_response()
}

async fn ws_connection(
    state: AppState,
    socket: axum::extract::ws::WebSocket,
    role: WsRole,
    conn_id: Uuid,
) {
    use axum::extract::ws::Message;
    use futures::{SinkExt, StreamExt};

    let (mut sender, mut receiver) = socket.split();
    info!(%conn_id, ?role, "relay connection opened");

    let send_task = match role {
        // Presenter connections receive the audience's viewport reports.
        WsRole::Presenter => {
            let mut viewports = state.channel.subscribe_viewports();
            tokio::spawn(async move {
                loop {
                    match viewports.recv().await {
                        Ok(report) => {
                            let Ok(text) =
                                serde_json::to_string(&StageMessage::Viewport { report })
                            else {
                                continue;
                            };
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        }
        // Audience connections get the cached current snapshot first, so a
        // surface (re)attaching mid-session is in sync before the next live
        // publish arrives.
        WsRole::Audience => {
            let (latest, mut snapshots) = state.channel.attach_audience();
            tokio::spawn(async move {
                if let Some(snapshot) = latest {
                    let Ok(text) = serde_json::to_string(&StageMessage::Snapshot { snapshot })
                    else {
                        return;
                    };
                    if sender.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                loop {
                    match snapshots.recv().await {
                        Ok(snapshot) => {
                            let Ok(text) =
                                serde_json::to_string(&StageMessage::Snapshot { snapshot })
                            else {
                                continue;
                            };
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            })
        }
    };

    while let Some(Ok(message)) = receiver.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        match serde_json::from_str::<StageMessage>(&text) {
            Ok(StageMessage::Snapshot { snapshot }) if role == WsRole::Presenter => {
                state.channel.publish(snapshot);
            }
            Ok(StageMessage::Viewport { report }) if role == WsRole::Audience => {
                state.channel.report_viewport(report);
            }
            Ok(_) => {
                warn!(%conn_id, ?role, "dropping relay message not allowed for role");
            }
            Err(error) => {
                warn!(%conn_id, %error, "dropping unparseable relay message");
            }
        }
    }

    send_task.abort();
    info!(%conn_id, ?role, "relay connection closed");
}

fn map_summary(map: StoredMap) -> MapSummary {
    MapSummary {
        map_id: map.map_id,
        name: map.name,
        group_name: map.group_name,
        source: map.source,
        zoom: map.zoom,
        rotation: map.rotation,
        pan_x: map.pan_x,
        pan_y: map.pan_y,
        song_id: map.song_id,
    }
}

fn song_summary(song: StoredSong) -> SongSummary {
    SongSummary {
        song_id: song.song_id,
        name: song.name,
        group_name: song.group_name,
        file_path: song.file_path,
    }
}

fn not_found(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiError::new(ErrorCode::NotFound, message)),
    )
}

fn validation(message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError::new(ErrorCode::Validation, message)),
    )
}

fn internal(error: anyhow::Error) -> (StatusCode, Json<ApiError>) {
    error!(%error, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, "internal error")),
    )
}
