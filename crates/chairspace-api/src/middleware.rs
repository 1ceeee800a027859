use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use chairspace_types::api::Claims;

use crate::auth::AppState;
use crate::db_call;
use crate::error::ApiError;

/// Extract and validate the bearer token, then make sure its subject still
/// has an account. Moderation deletes accounts while their tokens are live.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized)?;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| ApiError::Unauthorized)?
        .claims
    };

    let user_id = claims.sub.to_string();
    let exists = db_call(&state, move |db| Ok(db.get_user_by_id(&user_id)?.is_some())).await?;
    if !exists {
        return Err(ApiError::Unauthorized);
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
