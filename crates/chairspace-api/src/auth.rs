use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use chairspace_db::{AccountTaken, Database};
use chairspace_db::queries::NewUser;
use chairspace_moderation::ImageClassifier;
use chairspace_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::db_call;
use crate::error::ApiError;

/// Tokens are good for this many days.
const TOKEN_LIFETIME_DAYS: i64 = 30;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub classifier: ImageClassifier,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let handle = req.handle.trim().to_string();

    let (email_taken, handle_taken) = {
        let (email, handle) = (email.clone(), handle.clone());
        db_call(&state, move |db| {
            Ok((
                db.get_user_by_email(&email)?.is_some(),
                db.get_user_by_handle(&handle)?.is_some(),
            ))
        })
        .await?
    };

    if email_taken {
        return Err(ApiError::Conflict(AccountTaken::Email.to_string()));
    }
    if handle_taken {
        return Err(ApiError::Conflict(AccountTaken::Handle.to_string()));
    }
    validate_registration(&email, &handle, &req)?;
    // A concurrent signup can still win the insert; the store reports that as
    // `AccountTaken`, which maps to the same 409.

    let password_hash = hash_password(&req.password)?;
    let user_id = Uuid::new_v4();

    {
        let (id, handle, email) = (user_id.to_string(), handle.clone(), email.clone());
        let name = req.name.trim().to_string();
        db_call(&state, move |db| {
            db.create_user(&NewUser {
                id: &id,
                handle: &handle,
                name: &name,
                email: &email,
                password_hash: &password_hash,
                created_at: Utc::now(),
            })
        })
        .await?;
    }

    info!(%user_id, %handle, "Account created");

    let token = create_token(&state.jwt_secret, user_id, &handle)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = req.email.trim().to_string();
    let user = db_call(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::Unauthorized)?;

    // Verify password
    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt password hash for {}: {}", user.id, e)))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::Unauthorized)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.handle)?;

    Ok(Json(LoginResponse {
        user_id,
        handle: user.handle,
        token,
    }))
}

fn validate_registration(email: &str, handle: &str, req: &RegisterRequest) -> Result<(), ApiError> {
    let problem = if email.chars().count() < 4 {
        "Email must be at least 4 characters"
    } else if handle.is_empty() {
        "Handle is required"
    } else if req.name.trim().chars().count() < 5 {
        "Name must be at least 5 characters"
    } else if req.password != req.confirm_password {
        "Passwords do not match"
    } else if req.password.chars().count() < 7 {
        "Password must be at least 7 characters"
    } else {
        return Ok(());
    };
    Err(ApiError::BadRequest(problem.into()))
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
}

pub fn create_token(secret: &str, user_id: Uuid, handle: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        handle: handle.to_string(),
        exp: (Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, name: &str, password: &str, confirm: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            name: name.into(),
            handle: "sitter".into(),
            password: password.into(),
            confirm_password: confirm.into(),
        }
    }

    fn rejection(req: &RegisterRequest) -> Option<String> {
        match validate_registration(req.email.trim(), req.handle.trim(), req) {
            Ok(()) => None,
            Err(ApiError::BadRequest(msg)) => Some(msg),
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accepts_valid_registration() {
        assert_eq!(rejection(&request("a@b.c", "Chair Person", "hunter22", "hunter22")), None);
    }

    #[test]
    fn rejects_each_invalid_field() {
        assert!(rejection(&request("a@b", "Chair Person", "hunter22", "hunter22")).is_some());
        assert!(rejection(&request("a@b.c", "Cha", "hunter22", "hunter22")).is_some());
        assert_eq!(
            rejection(&request("a@b.c", "Chair Person", "hunter22", "hunter23")).as_deref(),
            Some("Passwords do not match")
        );
        assert!(rejection(&request("a@b.c", "Chair Person", "short", "short")).is_some());
    }

    #[test]
    fn hashes_verify() {
        let hash = hash_password("hunter22").unwrap();
        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"hunter22", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"hunter23", &parsed).is_err());
    }
}
