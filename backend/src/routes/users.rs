use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncMysqlConnection, RunQueryDsl};
use serde::Deserialize;
use shared::password::{hash_password, validate_password};
use shared::{CreateUser, Permission, UserStatus};
use std::sync::Arc;

use crate::db::schema::{tbl_ticket, tbl_user_groups, tbl_users, tbl_users_rules};
use crate::error::{AppError, AppResult};
use crate::models::{NewUser, UpdateUser, User};
use crate::{uploads, AppState};

use super::{validate_len, AuthUser};

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersParams {
    pub status: Option<String>,
    pub rules_id: Option<i32>,
}

fn normalize_email(email: &str) -> AppResult<String> {
    let email = email.trim().to_lowercase();
    validate_len("Email", &email, 3, 255)?;
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Ok(email)
        }
        _ => Err(AppError::validation("Email address is not valid")),
    }
}

async fn ensure_role(conn: &mut AsyncMysqlConnection, rules_id: i32) -> AppResult<()> {
    let count: i64 = tbl_users_rules::table
        .filter(tbl_users_rules::id.eq(rules_id))
        .count()
        .get_result(conn)
        .await?;
    if count == 0 {
        return Err(AppError::validation(format!("Role {} does not exist", rules_id)));
    }
    Ok(())
}

async fn load_shared(conn: &mut AsyncMysqlConnection, user_id: i32) -> AppResult<shared::User> {
    let (user, rules_name): (User, String) = tbl_users::table
        .inner_join(tbl_users_rules::table)
        .filter(tbl_users::id.eq(user_id))
        .select((User::as_select(), tbl_users_rules::rules_name))
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", user_id)))?;
    Ok(user.to_shared(Some(rules_name)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListUsersParams>,
    auth: AuthUser,
) -> AppResult<Json<Vec<shared::User>>> {
    auth.require(Permission::UsersList)?;
    let mut conn = state.pool.get().await?;

    let mut query = tbl_users::table
        .inner_join(tbl_users_rules::table)
        .order(tbl_users::name.asc())
        .into_boxed();

    if let Some(status) = params.status.as_deref().filter(|s| !s.trim().is_empty()) {
        let status = UserStatus::parse(status)
            .ok_or_else(|| AppError::validation("status must be active or inactive"))?;
        query = query.filter(tbl_users::status.eq(status.as_str()));
    }
    if let Some(rules_id) = params.rules_id {
        query = query.filter(tbl_users::rules_id.eq(rules_id));
    }

    let rows: Vec<(User, String)> = query
        .select((User::as_select(), tbl_users_rules::rules_name))
        .load(&mut conn)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|(user, rules_name)| user.to_shared(Some(rules_name)))
            .collect(),
    ))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<Json<shared::User>> {
    if user_id != auth.user_id {
        auth.require(Permission::UsersList)?;
    }
    let mut conn = state.pool.get().await?;
    Ok(Json(load_shared(&mut conn, user_id).await?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<shared::User>)> {
    auth.require(Permission::UsersAdd)?;

    validate_len("Name", &payload.name, 1, 100)?;
    validate_len("Company", &payload.company, 1, 255)?;
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password).map_err(AppError::Validation)?;

    let mut conn = state.pool.get().await?;
    ensure_role(&mut conn, payload.rules_id).await?;

    let taken: i64 = tbl_users::table
        .filter(tbl_users::email.eq(&email))
        .count()
        .get_result(&mut conn)
        .await?;
    if taken > 0 {
        return Err(AppError::conflict(format!("Email {} is already in use", email)));
    }

    let password = hash_password(&payload.password)
        .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))?;
    let now = Utc::now().naive_utc();

    let new_user = NewUser {
        name: payload.name.trim().to_string(),
        email: email.clone(),
        password,
        company: payload.company.trim().to_string(),
        status: payload.status.as_str().to_string(),
        rules_id: payload.rules_id,
        image_profile: payload
            .image_profile
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        created_at: now,
        updated_at: now,
    };

    diesel::insert_into(tbl_users::table)
        .values(&new_user)
        .execute(&mut conn)
        .await?;

    let user_id: i32 = tbl_users::table
        .filter(tbl_users::email.eq(&email))
        .select(tbl_users::id)
        .first(&mut conn)
        .await?;

    tracing::info!(user_id, created_by = auth.user_id, "user created");
    let user = load_shared(&mut conn, user_id).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    auth: AuthUser,
    Json(payload): Json<shared::UpdateUser>,
) -> AppResult<Json<shared::User>> {
    auth.require(Permission::UsersEdit)?;

    if user_id == auth.user_id && payload.status == Some(UserStatus::Inactive) {
        return Err(AppError::validation("You cannot deactivate your own account"));
    }
    if let Some(ref name) = payload.name {
        validate_len("Name", name, 1, 100)?;
    }
    if let Some(ref company) = payload.company {
        validate_len("Company", company, 1, 255)?;
    }
    let email = payload.email.as_deref().map(normalize_email).transpose()?;
    let password = match payload.password {
        Some(ref pw) => {
            validate_password(pw).map_err(AppError::Validation)?;
            Some(
                hash_password(pw)
                    .map_err(|e| AppError::internal(format!("Failed to hash password: {e}")))?,
            )
        }
        None => None,
    };

    let changes = UpdateUser {
        name: payload.name.map(|s| s.trim().to_string()),
        email,
        password,
        company: payload.company.map(|s| s.trim().to_string()),
        status: payload.status.map(|s| s.as_str().to_string()),
        rules_id: payload.rules_id,
        image_profile: payload
            .image_profile
            .map(|p| p.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())),
        updated_at: Utc::now().naive_utc(),
    };

    let mut conn = state.pool.get().await?;
    if let Some(rules_id) = changes.rules_id {
        ensure_role(&mut conn, rules_id).await?;
    }

    let updated = diesel::update(tbl_users::table.filter(tbl_users::id.eq(user_id)))
        .set(&changes)
        .execute(&mut conn)
        .await?;
    if updated == 0 {
        return Err(AppError::not_found(format!("User {} not found", user_id)));
    }

    tracing::info!(user_id, updated_by = auth.user_id, "user updated");
    Ok(Json(load_shared(&mut conn, user_id).await?))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<StatusCode> {
    auth.require(Permission::UsersDelete)?;
    if user_id == auth.user_id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    let mut conn = state.pool.get().await?;

    let image_profile: Option<String> = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let user: User = tbl_users::table
                    .filter(tbl_users::id.eq(user_id))
                    .select(User::as_select())
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| AppError::not_found(format!("User {} not found", user_id)))?;

                let created: i64 = tbl_ticket::table
                    .filter(tbl_ticket::user_create_ticket.eq(user_id))
                    .count()
                    .get_result(conn)
                    .await?;
                if created > 0 {
                    return Err(AppError::conflict(format!(
                        "User {} has created {} ticket(s); deactivate instead",
                        user_id, created
                    )));
                }

                diesel::delete(tbl_user_groups::table.filter(tbl_user_groups::user_id.eq(user_id)))
                    .execute(conn)
                    .await?;
                diesel::delete(tbl_users::table.filter(tbl_users::id.eq(user_id)))
                    .execute(conn)
                    .await?;

                Ok(user.image_profile)
            }
            .scope_boxed()
        })
        .await?;

    if let Some(path) = image_profile.filter(|p| p.starts_with(uploads::PUBLIC_PREFIX)) {
        uploads::remove(&state.config.upload_dir, &path).await;
    }

    tracing::info!(user_id, deleted_by = auth.user_id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_lowercased_and_checked() {
        assert_eq!(
            normalize_email("  Siti.Rahma@Example.COM ").unwrap(),
            "siti.rahma@example.com"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("a@b@c").is_err());
        assert!(normalize_email("").is_err());
    }
}
