//! HTTP API for the board node.

use crate::node::LensState;
use crate::ws::ws_wishes_handler;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use wishtree_protocols::{Error, RowView, SyncState};
use wishtree_store::{Claim, SlotCoord, SlotKey};

pub type AppState = Arc<RwLock<LensState>>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    // CORS layer for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health (at root and under /api/v1 for compatibility)
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        // Board layout with occupancy
        .route("/api/v1/tree", get(get_tree))
        // Wishes
        .route("/api/v1/wishes", get(list_wishes).post(create_wish))
        .route("/api/v1/wishes/:key", get(get_wish))
        // Synchronizer status
        .route("/api/v1/sync", get(get_sync))
        // WebSocket for live board updates
        .route("/api/v1/ws/wishes", get(ws_wishes_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// --- Health endpoints ---

async fn health() -> &'static str {
    "OK"
}

// --- Board endpoints ---

/// Whole board, row by row.
#[derive(Debug, Serialize)]
struct TreeView {
    board_size: u32,
    slot_count: u64,
    occupied: usize,
    rows: Vec<RowView>,
}

async fn get_tree(State(state): State<AppState>) -> Json<TreeView> {
    let state = state.read().await;
    let board = state.session.board();
    let rows = state.session.rows().await;
    let occupied = rows
        .iter()
        .flat_map(|row| &row.slots)
        .filter(|slot| slot.claim.is_some())
        .count();

    Json(TreeView {
        board_size: board.size(),
        slot_count: board.slot_count(),
        occupied,
        rows,
    })
}

// --- Wish endpoints ---

async fn list_wishes(State(state): State<AppState>) -> Json<Vec<Claim>> {
    let state = state.read().await;
    let mut wishes: Vec<Claim> = state.session.snapshot().await.into_values().collect();
    wishes.sort_by_key(|claim| claim.slot);
    Json(wishes)
}

async fn get_wish(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Claim>, StatusCode> {
    let key: SlotKey = key.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let state = state.read().await;
    state
        .session
        .view(key)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Debug, Deserialize)]
struct CreateWishRequest {
    row: u32,
    col: i32,
    message: String,
    #[serde(default)]
    author: String,
}

async fn create_wish(
    State(state): State<AppState>,
    Json(req): Json<CreateWishRequest>,
) -> Result<(StatusCode, Json<Claim>), StatusCode> {
    let slot = SlotCoord::new(req.row, req.col);
    let state = state.read().await;

    match state
        .session
        .submit_and_wait(slot, &req.message, &req.author)
        .await
    {
        Ok(claim) => Ok((StatusCode::CREATED, Json(claim))),
        Err(e) => {
            let status = status_for(&e);
            if status.is_server_error() {
                warn!("Wish at {} failed: {}", slot, e);
            } else {
                debug!("Wish at {} refused: {}", slot, e);
            }
            Err(status)
        }
    }
}

fn status_for(err: &Error) -> StatusCode {
    match err {
        e if e.is_slot_taken() => StatusCode::CONFLICT,
        Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// --- Sync endpoints ---

#[derive(Debug, Serialize)]
struct SyncStatus {
    state: SyncState,
    occupied: usize,
    feeds: usize,
}

async fn get_sync(State(state): State<AppState>) -> Json<SyncStatus> {
    let state = state.read().await;
    Json(SyncStatus {
        state: state.session.sync_state(),
        occupied: state.session.snapshot().await.len(),
        feeds: state.claims.subscriber_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::LensConfig;
    use std::time::Duration;
    use wishtree_protocols::{ClaimsService, ServiceError, ValidationError};
    use wishtree_store::ClaimRecord;
    use wishtree_topology::TopologyError;

    fn app_state() -> AppState {
        Arc::new(RwLock::new(LensState::start(LensConfig::default()).unwrap()))
    }

    fn request(row: u32, col: i32, message: &str, author: &str) -> Json<CreateWishRequest> {
        Json(CreateWishRequest {
            row,
            col,
            message: message.into(),
            author: author.into(),
        })
    }

    #[tokio::test]
    async fn create_then_read_wish() {
        let state = app_state();
        let (status, Json(claim)) = create_wish(State(state.clone()), request(3, 0, "peace", "Ann"))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert!(claim.is_confirmed());

        let Json(found) = get_wish(State(state.clone()), Path("3-0".to_string()))
            .await
            .unwrap();
        assert_eq!(found, claim);

        let Json(all) = list_wishes(State(state)).await;
        assert_eq!(all, vec![claim]);
    }

    #[tokio::test]
    async fn create_wish_maps_refusals() {
        let state = app_state();
        create_wish(State(state.clone()), request(3, 0, "peace", "Ann"))
            .await
            .unwrap();

        assert_eq!(
            create_wish(State(state.clone()), request(3, 0, "joy", "Bo")).await.unwrap_err(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            create_wish(State(state.clone()), request(3, 1, "  ", "Bo")).await.unwrap_err(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            create_wish(State(state), request(3, 9, "far", "Bo")).await.unwrap_err(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[tokio::test]
    async fn missing_or_bad_key() {
        let state = app_state();
        assert_eq!(
            get_wish(State(state.clone()), Path("4-1".into())).await.unwrap_err(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_wish(State(state), Path("four".into())).await.unwrap_err(),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn tree_reports_occupancy() {
        let state = app_state();
        state
            .read()
            .await
            .claims
            .create(ClaimRecord {
                id: None,
                message: "from elsewhere".into(),
                author: "Dee".into(),
                color: "rose".into(),
                grid_row: 2,
                grid_col: -1,
            })
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let Json(tree) = get_tree(State(state.clone())).await;
                if tree.occupied == 1 {
                    assert_eq!(tree.board_size, 40);
                    assert_eq!(tree.rows.len(), 39);
                    assert!(tree.rows[1].slots[0].claim.is_some());
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let mut watch = state.read().await.session.watch_sync();
        watch.wait_for(|s| *s == SyncState::Live).await.unwrap();

        let Json(sync) = get_sync(State(state)).await;
        assert_eq!(sync.state, SyncState::Live);
        assert_eq!(sync.occupied, 1);
        assert_eq!(sync.feeds, 1);
    }

    #[test]
    fn error_statuses() {
        assert_eq!(
            status_for(&Error::Persistence(ServiceError::Conflict(SlotCoord::APEX))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&Error::Validation(ValidationError::OffBoard(
                TopologyError::RowOutOfBounds { row: 0, board_size: 40 }
            ))),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&Error::Timeout(Duration::from_secs(1))),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&Error::Persistence(ServiceError::Disconnected)),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
