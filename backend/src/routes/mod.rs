pub mod auth;
pub mod dashboard;
pub mod export;
pub mod health;
pub mod roles;
pub mod stations;
pub mod telegram;
pub mod tickets;
pub mod uploads;
pub mod users;

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use diesel::prelude::*;
use diesel_async::{AsyncMysqlConnection, RunQueryDsl};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::permissions::TicketScope;
use shared::{ApiError, Permission, PermissionSet};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::db::schema::{tbl_users, tbl_users_rules};
use crate::error::{AppError, AppResult};
use crate::models::{Role, User};
use crate::AppState;

pub(crate) const CLEAR_TOKEN_COOKIE: &str = "token=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // email
    pub name: String,
    pub user_id: i32,
    pub exp: usize,
    pub iat: usize,
}

/// An authenticated, active user together with the permission flags of their role.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: String,
    pub name: String,
    pub company: String,
    pub role_id: i32,
    pub role_name: String,
    pub image_profile: Option<String>,
    pub permissions: PermissionSet,
}

impl AuthUser {
    fn from_rows(user: User, role: Role) -> Self {
        AuthUser {
            user_id: user.id,
            email: user.email,
            name: user.name,
            company: user.company,
            role_id: role.id,
            role_name: role.rules_name.clone(),
            image_profile: user.image_profile,
            permissions: role.permissions(),
        }
    }

    pub fn require(&self, permission: Permission) -> AppResult<()> {
        if self.permissions.allows(permission) {
            Ok(())
        } else {
            tracing::debug!(
                user_id = self.user_id,
                permission = permission.as_str(),
                "permission denied"
            );
            Err(AppError::Forbidden(format!(
                "Missing permission: {}",
                permission.as_str()
            )))
        }
    }

    pub fn ticket_scope(&self) -> AppResult<TicketScope> {
        self.permissions
            .ticket_scope()
            .ok_or_else(|| AppError::Forbidden("Missing permission: tickets_list".to_string()))
    }

    pub fn to_response(&self) -> shared::CurrentUserResponse {
        shared::CurrentUserResponse {
            user_id: self.user_id,
            email: self.email.clone(),
            name: self.name.clone(),
            company: self.company.clone(),
            rules_id: self.role_id,
            rules_name: self.role_name.clone(),
            image_profile: self.image_profile.clone(),
            permissions: self.permissions,
        }
    }
}

/// Loads a user and their role in one query.
pub(crate) async fn load_user_with_role(
    conn: &mut AsyncMysqlConnection,
    user_id: i32,
) -> AppResult<Option<(User, Role)>> {
    let row = tbl_users::table
        .inner_join(tbl_users_rules::table)
        .filter(tbl_users::id.eq(user_id))
        .select((User::as_select(), Role::as_select()))
        .first::<(User, Role)>(conn)
        .await
        .optional()?;
    Ok(row)
}

/// Token from the `token` cookie, falling back to `Authorization: Bearer`.
pub(crate) fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    cookie_header
        .split(';')
        .find_map(|cookie| cookie.trim().strip_prefix("token="))
        .filter(|t| !t.is_empty())
        .or_else(|| {
            headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user_id = match extract_token(&parts.headers) {
            Some(token) => {
                let token_data = decode::<Claims>(
                    token,
                    &DecodingKey::from_secret(state.config.jwt_secret.as_bytes()),
                    &Validation::default(),
                )
                .map_err(|_| {
                    (
                        StatusCode::UNAUTHORIZED,
                        [(header::SET_COOKIE, CLEAR_TOKEN_COOKIE)],
                        Json(ApiError::unauthorized("Invalid or expired token")),
                    )
                        .into_response()
                })?;
                token_data.claims.user_id
            }
            // Dev mode bypass
            None if state.config.dev_mode => state.config.dev_user_id.unwrap_or(1),
            None => {
                return Err(
                    AppError::Unauthorized("Missing authentication token".to_string())
                        .into_response(),
                )
            }
        };

        let mut conn = state
            .pool
            .get()
            .await
            .map_err(|e| AppError::from(e).into_response())?;

        let (user, role) = load_user_with_role(&mut conn, user_id)
            .await
            .map_err(IntoResponse::into_response)?
            .ok_or_else(|| {
                AppError::Unauthorized("User no longer exists".to_string()).into_response()
            })?;

        if !user.is_active() {
            return Err(AppError::Forbidden("Account is inactive".to_string()).into_response());
        }

        Ok(AuthUser::from_rows(user, role))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.max_upload_bytes + 64 * 1024;

    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password", put(auth::change_password))
        // Ticket routes
        .route("/api/data/add_ticket", post(tickets::create))
        .route("/api/data/tickets", get(tickets::list))
        .route(
            "/api/data/tickets/:id",
            get(tickets::get).put(tickets::update).delete(tickets::delete),
        )
        .route("/api/data/tickets/:id/images", post(tickets::attach_image))
        .route("/api/data/export-ticket", get(export::export_tickets))
        .route("/api/data/dashboard", get(dashboard::summary))
        // Upload routes
        .route("/api/data/upload", post(uploads::upload))
        .route("/api/data/images/*path", get(uploads::serve))
        // Station routes
        .route("/api/data/stations", get(stations::list))
        .route("/api/data/add_station", post(stations::create))
        .route(
            "/api/data/stations/:id",
            get(stations::get)
                .put(stations::update)
                .delete(stations::delete),
        )
        // User routes
        .route("/api/data/users", get(users::list))
        .route("/api/data/add_user", post(users::create))
        .route(
            "/api/data/users/:id",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route(
            "/api/data/users/:id/groups",
            get(telegram::user_groups).put(telegram::set_user_groups),
        )
        // Role routes
        .route("/api/data/roles", get(roles::list))
        .route("/api/data/add_rules", post(roles::create))
        .route(
            "/api/data/roles/:id",
            get(roles::get).put(roles::update).delete(roles::delete),
        )
        // Telegram group routes
        .route(
            "/api/data/telegram-groups",
            get(telegram::list).post(telegram::create),
        )
        .route("/api/data/telegram-groups/:id", axum::routing::delete(telegram::delete))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Character count of the trimmed value must fall within `min..=max`.
pub(crate) fn validate_len(field: &str, value: &str, min: usize, max: usize) -> AppResult<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(AppError::validation(format!(
            "{field} must be {min}-{max} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use tower::ServiceExt;

    #[test]
    fn token_from_cookie_wins_over_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=abc.def.ghi"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        assert_eq!(extract_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn token_from_bearer_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_token(&headers), Some("xyz"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic xyz"));
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn empty_cookie_token_falls_back_to_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token="));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer fallback"));
        assert_eq!(extract_token(&headers), Some("fallback"));
    }

    #[test]
    fn require_reports_missing_flag() {
        let user = AuthUser {
            user_id: 7,
            email: "tech@example.com".into(),
            name: "Tech".into(),
            company: "Ops".into(),
            role_id: 3,
            role_name: "Technician".into(),
            image_profile: None,
            permissions: PermissionSet {
                tickets_list_assign: true,
                ..PermissionSet::default()
            },
        };
        assert!(user.require(Permission::TicketsListAssign).is_ok());
        let err = user.require(Permission::TicketsDelete).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(ref m) if m.contains("tickets_delete")));
        assert_eq!(user.ticket_scope().unwrap(), TicketScope::AssignedOnly);
    }

    #[test]
    fn length_validation() {
        assert!(validate_len("Name", "  ", 1, 10).is_err());
        assert!(validate_len("Name", "Pump 4", 1, 10).is_ok());
        assert!(validate_len("Name", "way too long here", 1, 10).is_err());
    }

    async fn send(request: Request<Body>) -> (StatusCode, HeaderMap, ApiError) {
        let response = router(crate::test_state()).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn missing_token_is_rejected() {
        let request = Request::builder()
            .uri("/api/data/tickets")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "UNAUTHORIZED");
        assert_eq!(body.error, "Missing authentication token");
    }

    #[tokio::test]
    async fn invalid_token_clears_cookie() {
        let request = Request::builder()
            .uri("/api/data/roles")
            .header(header::AUTHORIZATION, "Bearer not-a-jwt")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.error, "Invalid or expired token");
        assert_eq!(
            headers.get(header::SET_COOKIE).unwrap(),
            CLEAR_TOKEN_COOKIE
        );
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let claims = Claims {
            sub: "admin@example.com".into(),
            name: "Admin".into(),
            user_id: 1,
            iat: 0,
            exp: usize::MAX / 2,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(b"someone-else"),
        )
        .unwrap();
        let request = Request::builder()
            .uri("/api/data/stations")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
