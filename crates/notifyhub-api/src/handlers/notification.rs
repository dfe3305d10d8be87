//! Notification handlers.

use axum::Json;
use axum::extract::{Path, Query, State};

use notifyhub_core::error::AppError;
use notifyhub_core::types::{NotificationId, UserId};
use notifyhub_realtime::stats::NotificationStats;

use crate::dto::request::HistoryQuery;
use crate::dto::response::{ApiResponse, HistoryResponse, MessageResponse, ReplayResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/notifications/stats
pub async fn stats(State(state): State<AppState>) -> Json<ApiResponse<NotificationStats>> {
    Json(ApiResponse::ok(state.engine.manager().stats()))
}

/// GET /api/notifications/{user_id}/history?limit=
pub async fn history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Json<ApiResponse<HistoryResponse>> {
    let user = UserId::new(user_id);
    let limit = query.resolve(state.config.notifications.max_history_per_user);
    let manager = state.engine.manager();
    let notifications = manager.get_history(&user, limit).await;
    let unread = manager.unread_count(&user).await;

    Json(ApiResponse::ok(HistoryResponse {
        user_id: user.into_inner(),
        unread,
        notifications,
    }))
}

/// POST /api/notifications/{user_id}/{notification_id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path((user_id, notification_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user = UserId::new(user_id);
    let id = NotificationId::new(notification_id);
    if !state.engine.manager().mark_read(&id, &user).await {
        return Err(AppError::not_found(format!("Notification '{id}' not found for user '{user}'")).into());
    }
    Ok(Json(ApiResponse::ok(MessageResponse {
        message: "Marked as read".to_string(),
    })))
}

/// POST /api/notifications/{user_id}/replay
pub async fn replay(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<ApiResponse<ReplayResponse>> {
    let user = UserId::new(user_id);
    let manager = state.engine.manager();
    let replayed = manager.replay(&user).await;

    Json(ApiResponse::ok(ReplayResponse {
        replayed,
        remaining: manager.queue_depth(&user),
    }))
}
