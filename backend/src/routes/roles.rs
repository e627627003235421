use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use diesel_async::{AsyncMysqlConnection, RunQueryDsl};
use shared::{Permission, RoleInput};
use std::sync::Arc;

use crate::db::schema::{tbl_users, tbl_users_rules};
use crate::error::{AppError, AppResult};
use crate::models::{Role, RoleRow};
use crate::AppState;

use super::{validate_len, AuthUser};

async fn load_role(conn: &mut AsyncMysqlConnection, role_id: i32) -> AppResult<Role> {
    tbl_users_rules::table
        .filter(tbl_users_rules::id.eq(role_id))
        .select(Role::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Role {} not found", role_id)))
}

async fn name_taken(
    conn: &mut AsyncMysqlConnection,
    name: &str,
    except: Option<i32>,
) -> AppResult<bool> {
    let mut query = tbl_users_rules::table
        .filter(tbl_users_rules::rules_name.eq(name.to_string()))
        .into_boxed();
    if let Some(id) = except {
        query = query.filter(tbl_users_rules::id.ne(id));
    }
    let count: i64 = query.count().get_result(conn).await?;
    Ok(count > 0)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Vec<shared::Role>>> {
    auth.require(Permission::RulesList)?;
    let mut conn = state.pool.get().await?;

    let roles: Vec<Role> = tbl_users_rules::table
        .order(tbl_users_rules::rules_name.asc())
        .select(Role::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(roles.iter().map(Role::to_shared).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<Json<shared::Role>> {
    auth.require(Permission::RulesList)?;
    let mut conn = state.pool.get().await?;
    Ok(Json(load_role(&mut conn, role_id).await?.to_shared()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<RoleInput>,
) -> AppResult<(StatusCode, Json<shared::Role>)> {
    auth.require(Permission::RulesAdd)?;
    validate_len("Role name", &payload.rules_name, 1, 100)?;

    let row = RoleRow::from(&payload);
    let mut conn = state.pool.get().await?;

    if name_taken(&mut conn, &row.rules_name, None).await? {
        return Err(AppError::conflict(format!(
            "Role '{}' already exists",
            row.rules_name
        )));
    }

    diesel::insert_into(tbl_users_rules::table)
        .values(&row)
        .execute(&mut conn)
        .await?;

    let role: Role = tbl_users_rules::table
        .filter(tbl_users_rules::rules_name.eq(&row.rules_name))
        .select(Role::as_select())
        .first(&mut conn)
        .await?;

    tracing::info!(role_id = role.id, name = %role.rules_name, "role created");
    Ok((StatusCode::CREATED, Json(role.to_shared())))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<i32>,
    auth: AuthUser,
    Json(payload): Json<RoleInput>,
) -> AppResult<Json<shared::Role>> {
    auth.require(Permission::RulesEdit)?;
    validate_len("Role name", &payload.rules_name, 1, 100)?;

    let row = RoleRow::from(&payload);
    let mut conn = state.pool.get().await?;

    load_role(&mut conn, role_id).await?;
    if name_taken(&mut conn, &row.rules_name, Some(role_id)).await? {
        return Err(AppError::conflict(format!(
            "Role '{}' already exists",
            row.rules_name
        )));
    }

    diesel::update(tbl_users_rules::table.filter(tbl_users_rules::id.eq(role_id)))
        .set(&row)
        .execute(&mut conn)
        .await?;

    if role_id == auth.role_id {
        tracing::warn!(role_id, user_id = auth.user_id, "user edited their own role");
    }
    tracing::info!(role_id, updated_by = auth.user_id, "role updated");

    Ok(Json(load_role(&mut conn, role_id).await?.to_shared()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<StatusCode> {
    auth.require(Permission::RulesDelete)?;
    let mut conn = state.pool.get().await?;

    let in_use: i64 = tbl_users::table
        .filter(tbl_users::rules_id.eq(role_id))
        .count()
        .get_result(&mut conn)
        .await?;
    if in_use > 0 {
        return Err(AppError::conflict(format!(
            "Role {} is assigned to {} user(s)",
            role_id, in_use
        )));
    }

    let deleted = diesel::delete(tbl_users_rules::table.filter(tbl_users_rules::id.eq(role_id)))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::not_found(format!("Role {} not found", role_id)));
    }

    tracing::info!(role_id, deleted_by = auth.user_id, "role deleted");
    Ok(StatusCode::NO_CONTENT)
}
