use tracing::{info, warn};
use uuid::Uuid;

use chairspace_moderation::{BanReason, Verdict};

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;

/// Run an image past the classifier. Nothing is written if this fails.
pub(crate) async fn inspect(state: &AppState, image_url: &str) -> Result<Verdict, ApiError> {
    let detections = state
        .classifier
        .classify(image_url)
        .await
        .map_err(ApiError::Classifier)?;

    let verdict = Verdict::from_detections(&detections);
    info!(
        image_url,
        table = verdict.contains_table,
        chair = verdict.contains_chair,
        "Image inspected"
    );
    Ok(verdict)
}

/// Delete the account and hand back the error the request should end with.
pub(crate) async fn ban(state: &AppState, user_id: Uuid, reason: BanReason) -> ApiError {
    let uid = user_id.to_string();
    match db_call(state, move |db| db.delete_user(&uid)).await {
        Ok(_) => {
            warn!(%user_id, %reason, "Account deleted by moderation");
            ApiError::Banned(reason)
        }
        Err(e) => e,
    }
}
