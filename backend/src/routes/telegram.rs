//! Telegram chat groups and which users receive notifications through them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use shared::{CreateTelegramGroup, Permission, UserGroups};
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::db::schema::{tbl_telegramgroups, tbl_user_groups, tbl_users};
use crate::error::{AppError, AppResult};
use crate::models::{NewTelegramGroup, NewUserGroup, TelegramGroup};
use crate::AppState;

use super::{validate_len, AuthUser};

/// Telegram chat ids are integers, negative for groups and channels.
fn valid_chat_id(chat_id: &str) -> bool {
    let digits = chat_id.strip_prefix('-').unwrap_or(chat_id);
    !digits.is_empty() && digits.len() <= 20 && digits.bytes().all(|b| b.is_ascii_digit())
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> AppResult<Json<Vec<shared::TelegramGroup>>> {
    auth.require(Permission::UsersList)?;
    let mut conn = state.pool.get().await?;

    let groups: Vec<TelegramGroup> = tbl_telegramgroups::table
        .order(tbl_telegramgroups::group_name.asc())
        .select(TelegramGroup::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(groups.iter().map(TelegramGroup::to_shared).collect()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateTelegramGroup>,
) -> AppResult<(StatusCode, Json<shared::TelegramGroup>)> {
    auth.require(Permission::UsersEdit)?;
    validate_len("Group name", &payload.group_name, 1, 100)?;
    let chat_id = payload.chat_id.trim().to_string();
    if !valid_chat_id(&chat_id) {
        return Err(AppError::validation("chat_id must be a numeric Telegram chat id"));
    }

    let mut conn = state.pool.get().await?;

    diesel::insert_into(tbl_telegramgroups::table)
        .values(&NewTelegramGroup {
            group_name: payload.group_name.trim().to_string(),
            chat_id: chat_id.clone(),
        })
        .execute(&mut conn)
        .await?;

    let group: TelegramGroup = tbl_telegramgroups::table
        .filter(tbl_telegramgroups::chat_id.eq(&chat_id))
        .select(TelegramGroup::as_select())
        .first(&mut conn)
        .await?;

    tracing::info!(group_id = group.id, chat_id = %group.chat_id, "telegram group created");
    Ok((StatusCode::CREATED, Json(group.to_shared())))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<StatusCode> {
    auth.require(Permission::UsersEdit)?;
    let mut conn = state.pool.get().await?;

    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            diesel::delete(tbl_user_groups::table.filter(tbl_user_groups::group_id.eq(group_id)))
                .execute(conn)
                .await?;
            let deleted = diesel::delete(
                tbl_telegramgroups::table.filter(tbl_telegramgroups::id.eq(group_id)),
            )
            .execute(conn)
            .await?;
            if deleted == 0 {
                return Err(AppError::not_found(format!(
                    "Telegram group {} not found",
                    group_id
                )));
            }
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(group_id, deleted_by = auth.user_id, "telegram group deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn user_groups(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    auth: AuthUser,
) -> AppResult<Json<Vec<shared::TelegramGroup>>> {
    auth.require(Permission::UsersList)?;
    let mut conn = state.pool.get().await?;

    let groups: Vec<TelegramGroup> = tbl_user_groups::table
        .inner_join(tbl_telegramgroups::table)
        .filter(tbl_user_groups::user_id.eq(user_id))
        .order(tbl_telegramgroups::group_name.asc())
        .select(TelegramGroup::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(groups.iter().map(TelegramGroup::to_shared).collect()))
}

/// Replaces the user's whole membership set.
pub async fn set_user_groups(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i32>,
    auth: AuthUser,
    Json(payload): Json<UserGroups>,
) -> AppResult<Json<Vec<shared::TelegramGroup>>> {
    auth.require(Permission::UsersEdit)?;
    let group_ids: Vec<i32> = payload
        .group_ids
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut conn = state.pool.get().await?;

    let ids = group_ids.clone();
    conn.transaction::<_, AppError, _>(|conn| {
        async move {
            let user_exists: i64 = tbl_users::table
                .filter(tbl_users::id.eq(user_id))
                .count()
                .get_result(conn)
                .await?;
            if user_exists == 0 {
                return Err(AppError::not_found(format!("User {} not found", user_id)));
            }

            let known: i64 = tbl_telegramgroups::table
                .filter(tbl_telegramgroups::id.eq_any(&ids))
                .count()
                .get_result(conn)
                .await?;
            if known as usize != ids.len() {
                return Err(AppError::validation("One or more telegram groups do not exist"));
            }

            diesel::delete(tbl_user_groups::table.filter(tbl_user_groups::user_id.eq(user_id)))
                .execute(conn)
                .await?;

            if !ids.is_empty() {
                let rows: Vec<NewUserGroup> = ids
                    .iter()
                    .map(|&group_id| NewUserGroup { user_id, group_id })
                    .collect();
                diesel::insert_into(tbl_user_groups::table)
                    .values(&rows)
                    .execute(conn)
                    .await?;
            }
            Ok(())
        }
        .scope_boxed()
    })
    .await?;

    tracing::info!(user_id, groups = ?group_ids, updated_by = auth.user_id, "user groups replaced");

    let groups: Vec<TelegramGroup> = tbl_user_groups::table
        .inner_join(tbl_telegramgroups::table)
        .filter(tbl_user_groups::user_id.eq(user_id))
        .order(tbl_telegramgroups::group_name.asc())
        .select(TelegramGroup::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(groups.iter().map(TelegramGroup::to_shared).collect()))
}
