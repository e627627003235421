use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::{CreateStation, Permission, StationType};
use std::sync::Arc;

use crate::db::schema::{tbl_station, tbl_ticket};
use crate::error::{AppError, AppResult};
use crate::models::{NewStation, Station, UpdateStation};
use crate::AppState;

use super::tickets::escape_like;
use super::{validate_len, AuthUser};

#[derive(Debug, Default, Deserialize)]
pub struct ListStationsParams {
    pub station_type: Option<String>,
    pub province: Option<String>,
    pub q: Option<String>,
}

fn search_pattern(q: &str) -> String {
    format!("%{}%", escape_like(q))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListStationsParams>,
    auth: AuthUser,
) -> AppResult<Json<Vec<shared::Station>>> {
    auth.require(Permission::StationsList)?;
    let mut conn = state.pool.get().await?;

    let mut query = tbl_station::table
        .order(tbl_station::station_id.asc())
        .into_boxed();

    if let Some(ty) = params.station_type.as_deref().filter(|s| !s.trim().is_empty()) {
        let ty = StationType::parse(ty)
            .ok_or_else(|| AppError::validation("station_type must be COCO or DODO"))?;
        query = query.filter(tbl_station::station_type.eq(ty.as_str()));
    }
    if let Some(province) = params.province.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        query = query.filter(tbl_station::province.eq(province.to_string()));
    }
    if let Some(q) = params.q.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = search_pattern(q);
        query = query.filter(
            tbl_station::station_id
                .like(pattern.clone())
                .or(tbl_station::station_name.like(pattern)),
        );
    }

    let stations: Vec<Station> = query
        .select(Station::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(stations.iter().map(Station::to_shared).collect()))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
    auth: AuthUser,
) -> AppResult<Json<shared::Station>> {
    auth.require(Permission::StationsList)?;
    let mut conn = state.pool.get().await?;

    let station: Station = tbl_station::table
        .find(&station_id)
        .select(Station::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Station {} not found", station_id)))?;

    Ok(Json(station.to_shared()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateStation>,
) -> AppResult<(StatusCode, Json<shared::Station>)> {
    auth.require(Permission::StationsAdd)?;

    let station_id = payload.station_id.trim().to_string();
    validate_len("Station ID", &station_id, 1, 20)?;
    validate_len("Station name", &payload.station_name, 1, 255)?;
    validate_len("Province", &payload.province, 1, 100)?;

    let mut conn = state.pool.get().await?;

    let existing: i64 = tbl_station::table
        .filter(tbl_station::station_id.eq(&station_id))
        .count()
        .get_result(&mut conn)
        .await?;
    if existing > 0 {
        return Err(AppError::conflict(format!(
            "Station {} already exists",
            station_id
        )));
    }

    let new_station = NewStation {
        station_id: station_id.clone(),
        station_name: payload.station_name.trim().to_string(),
        station_type: payload.station_type.as_str().to_string(),
        province: payload.province.trim().to_string(),
    };

    diesel::insert_into(tbl_station::table)
        .values(&new_station)
        .execute(&mut conn)
        .await?;

    let station: Station = tbl_station::table
        .find(&station_id)
        .select(Station::as_select())
        .first(&mut conn)
        .await?;

    tracing::info!(station_id = %station_id, created_by = auth.user_id, "station created");
    Ok((StatusCode::CREATED, Json(station.to_shared())))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
    auth: AuthUser,
    Json(payload): Json<shared::UpdateStation>,
) -> AppResult<Json<shared::Station>> {
    auth.require(Permission::StationsEdit)?;

    if let Some(ref name) = payload.station_name {
        validate_len("Station name", name, 1, 255)?;
    }
    if let Some(ref province) = payload.province {
        validate_len("Province", province, 1, 100)?;
    }

    let changes = UpdateStation {
        station_name: payload.station_name.map(|s| s.trim().to_string()),
        station_type: payload.station_type.map(|t| t.as_str().to_string()),
        province: payload.province.map(|s| s.trim().to_string()),
    };
    if changes.station_name.is_none() && changes.station_type.is_none() && changes.province.is_none() {
        return Err(AppError::validation("No fields to update"));
    }

    let mut conn = state.pool.get().await?;

    let updated = diesel::update(tbl_station::table.find(&station_id))
        .set(&changes)
        .execute(&mut conn)
        .await?;

    let station: Station = tbl_station::table
        .find(&station_id)
        .select(Station::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| AppError::not_found(format!("Station {} not found", station_id)))?;

    tracing::info!(station_id = %station_id, rows = updated, "station updated");
    Ok(Json(station.to_shared()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(station_id): Path<String>,
    auth: AuthUser,
) -> AppResult<StatusCode> {
    auth.require(Permission::StationsDelete)?;
    let mut conn = state.pool.get().await?;

    let referenced: i64 = tbl_ticket::table
        .filter(tbl_ticket::station_id.eq(&station_id))
        .count()
        .get_result(&mut conn)
        .await?;
    if referenced > 0 {
        return Err(AppError::conflict(format!(
            "Station {} is referenced by {} ticket(s)",
            station_id, referenced
        )));
    }

    let deleted = diesel::delete(tbl_station::table.find(&station_id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(AppError::not_found(format!("Station {} not found", station_id)));
    }

    tracing::info!(station_id = %station_id, deleted_by = auth.user_id, "station deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_escapes_wildcards_and_backslash() {
        assert_eq!(search_pattern("SPBU"), "%SPBU%");
        assert_eq!(search_pattern("a\\"), "%a\\\\%");
        assert_eq!(search_pattern("34_1%"), "%34\\_1\\%%");
    }
}
