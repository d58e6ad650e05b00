//! Internal notify webhook.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use storagex_models::NotificationEvent;

use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    pub status: &'static str,
    /// Live sessions that accepted the event
    pub delivered: usize,
}

/// `POST /internal/notify`
///
/// Fans the event out to the user's live sessions. Trusted callers only;
/// the route must not be exposed publicly.
pub async fn notify(
    State(state): State<AppState>,
    Json(event): Json<NotificationEvent>,
) -> Json<NotifyResponse> {
    let delivered = state.registry.publish(&event.user_id, &event).await;
    metrics::record_notification(&event.status, delivered);
    debug!(
        user_id = %event.user_id,
        video_id = %event.video_id,
        status = %event.status,
        delivered,
        "Notification published"
    );

    Json(NotifyResponse {
        status: "ok",
        delivered,
    })
}
