use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use jsonwebtoken::{encode, EncodingKey, Header};
use shared::password::{hash_password, validate_password, verify_password};
use shared::{ChangePassword, LoginRequest, LoginResponse};
use std::sync::Arc;

use crate::db::schema::{tbl_users, tbl_users_rules};
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};
use crate::AppState;

use super::{AuthUser, Claims, CLEAR_TOKEN_COOKIE};

const BAD_CREDENTIALS: &str = "Invalid email or password";

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Response> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.is_empty() {
        return Err(AppError::validation("Email and password are required"));
    }

    let mut conn = state.pool.get().await?;

    let found: Option<(User, Role)> = tbl_users::table
        .inner_join(tbl_users_rules::table)
        .filter(tbl_users::email.eq(&email))
        .select((User::as_select(), Role::as_select()))
        .first(&mut conn)
        .await
        .optional()?;

    // Same response for an unknown email and a wrong password.
    let (user, role) = match found {
        Some((user, role)) if verify_password(&payload.password, &user.password) => (user, role),
        _ => {
            tracing::info!(email = %email, "failed login attempt");
            return Err(AppError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
    };

    if !user.is_active() {
        tracing::info!(user_id = user.id, "login refused for inactive user");
        return Err(AppError::Forbidden("Account is inactive".to_string()));
    }

    let token = create_jwt(&state.config.jwt_secret, state.config.jwt_ttl_hours, &user)?;
    let max_age = state.config.jwt_ttl_hours * 3600;
    tracing::info!(user_id = user.id, "user logged in");

    let body = LoginResponse {
        token: token.clone(),
        user: AuthUser::from_rows(user, role).to_response(),
    };
    let cookie = format!(
        "token={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age
    );

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

pub async fn logout() -> Response {
    (
        StatusCode::OK,
        [(header::SET_COOKIE, CLEAR_TOKEN_COOKIE)],
        Json(shared::LogoutResponse {
            status: "logged out".to_string(),
        }),
    )
        .into_response()
}

pub async fn me(auth_user: AuthUser) -> Json<shared::CurrentUserResponse> {
    Json(auth_user.to_response())
}

pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<ChangePassword>,
) -> AppResult<StatusCode> {
    validate_password(&payload.new_password).map_err(AppError::Validation)?;

    let mut conn = state.pool.get().await?;

    let stored: String = tbl_users::table
        .filter(tbl_users::id.eq(auth.user_id))
        .select(tbl_users::password)
        .first(&mut conn)
        .await?;

    if !verify_password(&payload.current_password, &stored) {
        return Err(AppError::validation("Current password is incorrect"));
    }

    let hashed = hash_password(&payload.new_password)
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))?;

    diesel::update(tbl_users::table.filter(tbl_users::id.eq(auth.user_id)))
        .set((
            tbl_users::password.eq(hashed),
            tbl_users::updated_at.eq(Utc::now().naive_utc()),
        ))
        .execute(&mut conn)
        .await?;

    tracing::info!(user_id = auth.user_id, "password changed");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn create_jwt(secret: &str, ttl_hours: i64, user: &User) -> AppResult<String> {
    let now = Utc::now();
    let exp = Duration::try_hours(ttl_hours)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| AppError::internal(format!("JWT TTL out of range: {ttl_hours}h")))?;

    let claims = Claims {
        sub: user.email.clone(),
        name: user.name.clone(),
        user_id: user.id,
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("Failed to create JWT: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use jsonwebtoken::{decode, DecodingKey, Validation};

    fn user() -> User {
        let ts = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        User {
            id: 12,
            name: "Siti Rahma".into(),
            email: "siti@example.com".into(),
            password: String::new(),
            company: "Retail Ops".into(),
            status: "active".into(),
            rules_id: 2,
            image_profile: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn jwt_carries_user_identity_and_ttl() {
        let token = create_jwt("secret", 8, &user()).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(data.claims.user_id, 12);
        assert_eq!(data.claims.sub, "siti@example.com");
        assert_eq!(data.claims.exp - data.claims.iat, 8 * 3600);
    }

    #[test]
    fn expired_jwt_is_rejected() {
        let token = create_jwt("secret", -2, &user()).unwrap();
        let result = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_ttl_is_an_error_not_a_panic() {
        assert!(create_jwt("secret", i64::MAX, &user()).is_err());
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let response = logout().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::SET_COOKIE).unwrap(),
            CLEAR_TOKEN_COOKIE
        );
    }
}
