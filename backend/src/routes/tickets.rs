use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Days, NaiveDate, NaiveTime, Utc};
use diesel::mysql::Mysql;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncMysqlConnection, RunQueryDsl};
use serde::Deserialize;
use shared::issues::validate_issue;
use shared::permissions::TicketScope;
use shared::ticket_id::{format_ticket_id, month_prefix, parse_ticket_id};
use shared::{CreateTicket, Permission, TicketPage, TicketStatus};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::schema::{tbl_station, tbl_ticket, tbl_ticket_images, tbl_ticket_sequence, tbl_users};
use crate::error::{AppError, AppResult};
use crate::models::{
    NewTicket, NewTicketImage, NewTicketSequence, Station, Ticket, TicketImage, UpdateTicket,
};
use crate::{uploads, AppState};

use super::{validate_len, AuthUser};

const DEFAULT_PER_PAGE: i64 = 50;
const MAX_PER_PAGE: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct TicketQuery {
    pub status: Option<String>,
    pub station_id: Option<String>,
    pub users_id: Option<i32>,
    pub issue_on: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Validated listing filter. Also used by the dashboard and exports.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub station_id: Option<String>,
    pub users_id: Option<i32>,
    pub issue_on: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub search: Option<String>,
    /// Set when the caller may only see tickets assigned to them.
    pub assigned_to: Option<i32>,
}

impl TicketFilter {
    pub fn from_query(query: &TicketQuery, scope: TicketScope, user_id: i32) -> AppResult<Self> {
        let status = match query.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(s) => Some(TicketStatus::parse(s).ok_or_else(|| {
                AppError::validation(format!(
                    "Invalid status. Must be one of: {}",
                    TicketStatus::all()
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?),
        };

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::validation("'from' must not be after 'to'"));
            }
        }

        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            status,
            station_id: non_empty(&query.station_id),
            users_id: query.users_id,
            issue_on: non_empty(&query.issue_on),
            from: query.from,
            to: query.to,
            search: non_empty(&query.q),
            assigned_to: match scope {
                TicketScope::All => None,
                TicketScope::AssignedOnly => Some(user_id),
            },
        })
    }

    pub fn apply<'a>(
        &self,
        mut query: tbl_ticket::BoxedQuery<'a, Mysql>,
    ) -> tbl_ticket::BoxedQuery<'a, Mysql> {
        if let Some(status) = self.status {
            query = query.filter(tbl_ticket::status.eq(status.as_str()));
        }
        if let Some(ref station_id) = self.station_id {
            query = query.filter(tbl_ticket::station_id.eq(station_id.clone()));
        }
        if let Some(users_id) = self.users_id {
            query = query.filter(tbl_ticket::users_id.eq(users_id));
        }
        if let Some(assignee) = self.assigned_to {
            query = query.filter(tbl_ticket::users_id.eq(assignee));
        }
        if let Some(ref issue_on) = self.issue_on {
            query = query.filter(tbl_ticket::issue_on.eq(issue_on.clone()));
        }
        if let Some(from) = self.from {
            query = query.filter(tbl_ticket::created_at.ge(from.and_time(NaiveTime::MIN)));
        }
        if let Some(to) = self.to {
            // Inclusive of the whole `to` day.
            if let Some(next_day) = to.checked_add_days(Days::new(1)) {
                query = query.filter(tbl_ticket::created_at.lt(next_day.and_time(NaiveTime::MIN)));
            }
        }
        if let Some(ref search) = self.search {
            let pattern = format!("%{}%", escape_like(search));
            query = query.filter(
                tbl_ticket::ticket_id
                    .like(pattern.clone())
                    .or(tbl_ticket::description.like(pattern)),
            );
        }
        query
    }
}

pub(super) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Returns `(page, per_page, offset)` with page 1-based and per_page clamped.
fn page_bounds(page: Option<i64>, per_page: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
    (page, per_page, (page - 1).saturating_mul(per_page))
}

fn can_see(auth: &AuthUser, ticket: &Ticket) -> bool {
    auth.permissions.tickets_list
        || (auth.permissions.tickets_list_assign && ticket.users_id == Some(auth.user_id))
}

/// Assignees holding only `tickets_list_assign` may work their own tickets.
fn works_ticket(auth: &AuthUser, ticket: &Ticket) -> bool {
    auth.permissions.tickets_list_assign && ticket.users_id == Some(auth.user_id)
}

fn not_found(ticket_id: &str) -> AppError {
    AppError::not_found(format!("Ticket {} not found", ticket_id))
}

fn to_shared_ticket(
    ticket: Ticket,
    names: &HashMap<i32, String>,
    stations: &HashMap<String, Station>,
    images: Vec<shared::TicketImage>,
) -> shared::Ticket {
    let status = ticket.status();
    let station = stations.get(&ticket.station_id);
    shared::Ticket {
        station_name: station.map(|s| s.station_name.clone()),
        station_type: station.and_then(|s| s.station_type()),
        assignee_name: ticket.users_id.and_then(|id| names.get(&id).cloned()),
        creator_name: names
            .get(&ticket.user_create_ticket)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string()),
        ticket_id: ticket.ticket_id,
        station_id: ticket.station_id,
        issue_on: ticket.issue_on,
        issue_type: ticket.issue_type,
        description: ticket.description,
        status,
        users_id: ticket.users_id,
        user_create_ticket: ticket.user_create_ticket,
        comment: ticket.comment,
        created_at: ticket.created_at,
        updated_at: ticket.updated_at,
        in_progress_at: ticket.in_progress_at,
        on_hold_at: ticket.on_hold_at,
        pending_vendor_at: ticket.pending_vendor_at,
        closed_at: ticket.closed_at,
        images,
    }
}

/// Resolves user names, stations and (optionally) images for a batch of tickets.
pub(crate) async fn hydrate(
    conn: &mut AsyncMysqlConnection,
    tickets: Vec<Ticket>,
    with_images: bool,
) -> AppResult<Vec<shared::Ticket>> {
    if tickets.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids: Vec<i32> = tickets
        .iter()
        .flat_map(|t| [Some(t.user_create_ticket), t.users_id])
        .flatten()
        .collect();
    let names: HashMap<i32, String> = tbl_users::table
        .filter(tbl_users::id.eq_any(&user_ids))
        .select((tbl_users::id, tbl_users::name))
        .load::<(i32, String)>(conn)
        .await?
        .into_iter()
        .collect();

    let station_ids: Vec<String> = tickets.iter().map(|t| t.station_id.clone()).collect();
    let stations: HashMap<String, Station> = tbl_station::table
        .filter(tbl_station::station_id.eq_any(&station_ids))
        .select(Station::as_select())
        .load::<Station>(conn)
        .await?
        .into_iter()
        .map(|s| (s.station_id.clone(), s))
        .collect();

    let mut images: HashMap<String, Vec<shared::TicketImage>> = HashMap::new();
    if with_images {
        let ticket_ids: Vec<String> = tickets.iter().map(|t| t.ticket_id.clone()).collect();
        let rows: Vec<TicketImage> = tbl_ticket_images::table
            .filter(tbl_ticket_images::ticket_id.eq_any(&ticket_ids))
            .order(tbl_ticket_images::id.asc())
            .select(TicketImage::as_select())
            .load(conn)
            .await?;
        for image in rows {
            images
                .entry(image.ticket_id.clone())
                .or_default()
                .push(image.to_shared());
        }
    }

    Ok(tickets
        .into_iter()
        .map(|t| {
            let imgs = images.remove(&t.ticket_id).unwrap_or_default();
            to_shared_ticket(t, &names, &stations, imgs)
        })
        .collect())
}

async fn load_ticket(conn: &mut AsyncMysqlConnection, ticket_id: &str) -> AppResult<Ticket> {
    tbl_ticket::table
        .find(ticket_id)
        .select(Ticket::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| not_found(ticket_id))
}

async fn ensure_station(conn: &mut AsyncMysqlConnection, station_id: &str) -> AppResult<()> {
    let count: i64 = tbl_station::table
        .filter(tbl_station::station_id.eq(station_id))
        .count()
        .get_result(conn)
        .await?;
    if count == 0 {
        return Err(AppError::validation(format!(
            "Station {} does not exist",
            station_id
        )));
    }
    Ok(())
}

async fn ensure_user(conn: &mut AsyncMysqlConnection, user_id: i32) -> AppResult<()> {
    let count: i64 = tbl_users::table
        .filter(tbl_users::id.eq(user_id))
        .count()
        .get_result(conn)
        .await?;
    if count == 0 {
        return Err(AppError::validation(format!(
            "Assignee {} does not exist",
            user_id
        )));
    }
    Ok(())
}

/// Allocates the next id for the month of `date`. Must run inside the insert
/// transaction: the sequence row stays locked until commit.
async fn next_ticket_id(conn: &mut AsyncMysqlConnection, date: NaiveDate) -> AppResult<String> {
    let prefix = month_prefix(date);

    // Seed a new month's counter from any ids already present.
    let existing_max: Option<String> = tbl_ticket::table
        .filter(tbl_ticket::ticket_id.like(format!("{}%", prefix)))
        .select(diesel::dsl::max(tbl_ticket::ticket_id))
        .first(conn)
        .await?;
    let seed = existing_max
        .and_then(|id| parse_ticket_id(&id).ok())
        .map(|(_, seq)| seq as i32)
        .unwrap_or(0);

    diesel::insert_or_ignore_into(tbl_ticket_sequence::table)
        .values(&NewTicketSequence {
            prefix: prefix.clone(),
            last_value: seed,
        })
        .execute(conn)
        .await?;

    let last: i32 = tbl_ticket_sequence::table
        .find(prefix.as_str())
        .select(tbl_ticket_sequence::last_value)
        .for_update()
        .first(conn)
        .await?;

    let next = last + 1;
    let ticket_id = format_ticket_id(&prefix, next.max(0) as u32)
        .map_err(|e| AppError::conflict(e.to_string()))?;

    diesel::update(tbl_ticket_sequence::table.find(prefix.as_str()))
        .set(tbl_ticket_sequence::last_value.eq(next))
        .execute(conn)
        .await?;

    Ok(ticket_id)
}

fn clean_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(payload): Json<CreateTicket>,
) -> AppResult<(StatusCode, Json<shared::Ticket>)> {
    auth.require(Permission::TicketsAdd)?;

    let station_id = payload.station_id.trim().to_string();
    validate_len("Station", &station_id, 1, 20)?;
    let (issue_on, issue_type) = validate_issue(&payload.issue_on, &payload.issue_type)
        .map_err(|e| AppError::Validation(e.to_string()))?;
    validate_len("Description", &payload.description, 1, 5000)?;

    let image_path = match payload.image_path.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(path) => {
            let file = uploads::resolve(&state.config.upload_dir, path)
                .ok_or_else(|| AppError::validation("Invalid image path"))?;
            if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
                return Err(AppError::validation(format!("Image {} not found", path)));
            }
            Some(path.to_string())
        }
    };

    let mut conn = state.pool.get().await?;

    ensure_station(&mut conn, &station_id).await?;
    if let Some(assignee) = payload.users_id {
        ensure_user(&mut conn, assignee).await?;
    }

    let now = Utc::now().naive_utc();
    let new_ticket = NewTicket {
        ticket_id: String::new(),
        station_id,
        issue_on: issue_on.to_string(),
        issue_type: issue_type.to_string(),
        description: payload.description.trim().to_string(),
        status: TicketStatus::Open.as_str().to_string(),
        users_id: payload.users_id,
        user_create_ticket: auth.user_id,
        comment: clean_comment(payload.comment),
        created_at: now,
        updated_at: now,
    };

    let ticket: Ticket = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let ticket_id = next_ticket_id(conn, now.date()).await?;
                let new_ticket = NewTicket {
                    ticket_id: ticket_id.clone(),
                    ..new_ticket
                };
                diesel::insert_into(tbl_ticket::table)
                    .values(&new_ticket)
                    .execute(conn)
                    .await?;

                if let Some(image_path) = image_path {
                    diesel::insert_into(tbl_ticket_images::table)
                        .values(&NewTicketImage {
                            ticket_id: ticket_id.clone(),
                            image_path,
                        })
                        .execute(conn)
                        .await?;
                }

                load_ticket(conn, &ticket_id).await
            }
            .scope_boxed()
        })
        .await?;

    tracing::info!(
        ticket_id = %ticket.ticket_id,
        station_id = %ticket.station_id,
        created_by = auth.user_id,
        "ticket created"
    );

    let mut hydrated = hydrate(&mut conn, vec![ticket], true).await?;
    let ticket = hydrated
        .pop()
        .ok_or_else(|| AppError::internal("Created ticket vanished"))?;

    if let Some(assignee) = ticket.users_id {
        state
            .notifier
            .ticket_assigned(state.pool.clone(), assignee, &ticket);
    }

    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicketQuery>,
    auth: AuthUser,
) -> AppResult<Json<TicketPage>> {
    let scope = auth.ticket_scope()?;
    let filter = TicketFilter::from_query(&query, scope, auth.user_id)?;
    let (page, per_page, offset) = page_bounds(query.page, query.per_page);

    let mut conn = state.pool.get().await?;

    let total: i64 = filter
        .apply(tbl_ticket::table.into_boxed())
        .count()
        .get_result(&mut conn)
        .await?;

    let rows: Vec<Ticket> = filter
        .apply(tbl_ticket::table.into_boxed())
        .order((tbl_ticket::created_at.desc(), tbl_ticket::ticket_id.desc()))
        .limit(per_page)
        .offset(offset)
        .select(Ticket::as_select())
        .load(&mut conn)
        .await?;

    let items = hydrate(&mut conn, rows, false).await?;

    Ok(Json(TicketPage {
        items,
        total,
        page,
        per_page,
    }))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    auth: AuthUser,
) -> AppResult<Json<shared::Ticket>> {
    auth.ticket_scope()?;
    let mut conn = state.pool.get().await?;

    let ticket = load_ticket(&mut conn, &ticket_id).await?;
    if !can_see(&auth, &ticket) {
        return Err(not_found(&ticket_id));
    }

    hydrate(&mut conn, vec![ticket], true)
        .await?
        .pop()
        .map(Json)
        .ok_or_else(|| not_found(&ticket_id))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    auth: AuthUser,
    Json(payload): Json<shared::UpdateTicket>,
) -> AppResult<Json<shared::Ticket>> {
    let mut conn = state.pool.get().await?;
    let current = load_ticket(&mut conn, &ticket_id).await?;

    if !auth.permissions.tickets_edit {
        if !can_see(&auth, &current) {
            return Err(not_found(&ticket_id));
        }
        if !(works_ticket(&auth, &current) && payload.is_status_only()) {
            return Err(AppError::Forbidden(
                "Missing permission: tickets_edit".to_string(),
            ));
        }
    }

    let now = Utc::now().naive_utc();
    let mut change = UpdateTicket {
        updated_at: Some(now),
        ..UpdateTicket::default()
    };

    if let Some(ref station_id) = payload.station_id {
        let station_id = station_id.trim();
        ensure_station(&mut conn, station_id).await?;
        change.station_id = Some(station_id.to_string());
    }

    if payload.issue_on.is_some() || payload.issue_type.is_some() {
        let on = payload.issue_on.as_deref().unwrap_or(&current.issue_on);
        let ty = payload.issue_type.as_deref().unwrap_or(&current.issue_type);
        let (on, ty) = validate_issue(on, ty).map_err(|e| AppError::Validation(e.to_string()))?;
        change.issue_on = Some(on.to_string());
        change.issue_type = Some(ty.to_string());
    }

    if let Some(ref description) = payload.description {
        validate_len("Description", description, 1, 5000)?;
        change.description = Some(description.trim().to_string());
    }

    if let Some(status) = payload.status {
        if status != current.status() {
            change.transition_to(status, now);
        }
    }

    let mut reassigned_to = None;
    if let Some(users_id) = payload.users_id {
        if let Some(uid) = users_id {
            ensure_user(&mut conn, uid).await?;
            if current.users_id != Some(uid) {
                reassigned_to = Some(uid);
            }
        }
        change.users_id = Some(users_id);
    }

    if let Some(comment) = payload.comment {
        change.comment = Some(clean_comment(comment));
    }

    diesel::update(tbl_ticket::table.find(&ticket_id))
        .set(&change)
        .execute(&mut conn)
        .await?;

    tracing::info!(
        ticket_id = %ticket_id,
        updated_by = auth.user_id,
        status = change.status.as_deref().unwrap_or("unchanged"),
        "ticket updated"
    );

    let updated = load_ticket(&mut conn, &ticket_id).await?;
    let ticket = hydrate(&mut conn, vec![updated], true)
        .await?
        .pop()
        .ok_or_else(|| not_found(&ticket_id))?;

    if let Some(assignee) = reassigned_to {
        state
            .notifier
            .ticket_assigned(state.pool.clone(), assignee, &ticket);
    }

    Ok(Json(ticket))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    auth: AuthUser,
) -> AppResult<StatusCode> {
    auth.require(Permission::TicketsDelete)?;
    let mut conn = state.pool.get().await?;

    let id = ticket_id.clone();
    let image_paths: Vec<String> = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                load_ticket(conn, &id).await?;

                let paths: Vec<String> = tbl_ticket_images::table
                    .filter(tbl_ticket_images::ticket_id.eq(&id))
                    .select(tbl_ticket_images::image_path)
                    .load(conn)
                    .await?;

                diesel::delete(tbl_ticket_images::table.filter(tbl_ticket_images::ticket_id.eq(&id)))
                    .execute(conn)
                    .await?;
                diesel::delete(tbl_ticket::table.find(&id))
                    .execute(conn)
                    .await?;

                Ok(paths)
            }
            .scope_boxed()
        })
        .await?;

    // Files go only after the rows are gone for good.
    for path in &image_paths {
        uploads::remove(&state.config.upload_dir, path).await;
    }

    tracing::info!(
        ticket_id = %ticket_id,
        images = image_paths.len(),
        deleted_by = auth.user_id,
        "ticket deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

pub async fn attach_image(
    State(state): State<Arc<AppState>>,
    Path(ticket_id): Path<String>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<shared::TicketImage>)> {
    let mut conn = state.pool.get().await?;
    let ticket = load_ticket(&mut conn, &ticket_id).await?;

    if !auth.permissions.tickets_edit && !works_ticket(&auth, &ticket) {
        return Err(if can_see(&auth, &ticket) {
            AppError::Forbidden("Missing permission: tickets_edit".to_string())
        } else {
            not_found(&ticket_id)
        });
    }

    let image_path = super::uploads::store_image_field(&state, &mut multipart).await?;

    let recorded = conn
        .transaction::<_, AppError, _>(|conn| {
            let ticket_id = ticket_id.clone();
            let image_path = image_path.clone();
            async move {
                diesel::insert_into(tbl_ticket_images::table)
                    .values(&NewTicketImage {
                        ticket_id: ticket_id.clone(),
                        image_path: image_path.clone(),
                    })
                    .execute(conn)
                    .await?;

                let image: TicketImage = tbl_ticket_images::table
                    .filter(tbl_ticket_images::image_path.eq(&image_path))
                    .select(TicketImage::as_select())
                    .first(conn)
                    .await?;

                diesel::update(tbl_ticket::table.find(&ticket_id))
                    .set(tbl_ticket::updated_at.eq(Utc::now().naive_utc()))
                    .execute(conn)
                    .await?;
                Ok(image)
            }
            .scope_boxed()
        })
        .await;
    let image = uploads::discard_on_error(&state.config.upload_dir, &image_path, recorded).await?;

    tracing::info!(ticket_id = %ticket_id, path = %image_path, "image attached");
    Ok((StatusCode::CREATED, Json(image.to_shared())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::PermissionSet;

    fn ts() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 2)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    fn ticket(assignee: Option<i32>) -> Ticket {
        Ticket {
            ticket_id: "POS2610000001".into(),
            station_id: "ST-001".into(),
            issue_on: "POS".into(),
            issue_type: "Login Problem".into(),
            description: "Cashier cannot log in".into(),
            status: "in progress".into(),
            users_id: assignee,
            user_create_ticket: 1,
            comment: None,
            created_at: ts(),
            updated_at: ts(),
            in_progress_at: Some(ts()),
            on_hold_at: None,
            pending_vendor_at: None,
            closed_at: None,
        }
    }

    fn auth(user_id: i32, permissions: PermissionSet) -> AuthUser {
        AuthUser {
            user_id,
            email: "u@example.com".into(),
            name: "U".into(),
            company: "C".into(),
            role_id: 1,
            role_name: "R".into(),
            image_profile: None,
            permissions,
        }
    }

    fn assigned_only() -> PermissionSet {
        PermissionSet {
            tickets_list_assign: true,
            ..PermissionSet::default()
        }
    }

    #[test]
    fn visibility_follows_scope() {
        let admin = auth(1, PermissionSet::all());
        let tech = auth(5, assigned_only());
        assert!(can_see(&admin, &ticket(None)));
        assert!(can_see(&tech, &ticket(Some(5))));
        assert!(!can_see(&tech, &ticket(Some(6))));
        assert!(!can_see(&tech, &ticket(None)));
        assert!(works_ticket(&tech, &ticket(Some(5))));
        assert!(!works_ticket(&auth(5, PermissionSet::default()), &ticket(Some(5))));
    }

    #[test]
    fn filter_scopes_assigned_only_callers() {
        let query = TicketQuery::default();
        let all = TicketFilter::from_query(&query, TicketScope::All, 5).unwrap();
        assert_eq!(all.assigned_to, None);
        let mine = TicketFilter::from_query(&query, TicketScope::AssignedOnly, 5).unwrap();
        assert_eq!(mine.assigned_to, Some(5));
    }

    #[test]
    fn filter_validates_status_and_dates() {
        let query = TicketQuery {
            status: Some("Pending Vendor".into()),
            q: Some("  ".into()),
            ..TicketQuery::default()
        };
        let filter = TicketFilter::from_query(&query, TicketScope::All, 1).unwrap();
        assert_eq!(filter.status, Some(TicketStatus::PendingVendor));
        assert_eq!(filter.search, None);

        let bad_status = TicketQuery {
            status: Some("done".into()),
            ..TicketQuery::default()
        };
        assert!(matches!(
            TicketFilter::from_query(&bad_status, TicketScope::All, 1),
            Err(AppError::Validation(_))
        ));

        let reversed = TicketQuery {
            from: NaiveDate::from_ymd_opt(2026, 10, 5),
            to: NaiveDate::from_ymd_opt(2026, 10, 1),
            ..TicketQuery::default()
        };
        assert!(TicketFilter::from_query(&reversed, TicketScope::All, 1).is_err());
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("POS2610"), "POS2610");
    }

    #[test]
    fn paging_is_clamped() {
        assert_eq!(page_bounds(None, None), (1, 50, 0));
        assert_eq!(page_bounds(Some(3), Some(20)), (3, 20, 40));
        assert_eq!(page_bounds(Some(0), Some(1000)), (1, 200, 0));
        assert_eq!(page_bounds(Some(-4), Some(0)), (1, 1, 0));
        assert_eq!(page_bounds(Some(i64::MAX), Some(50)), (i64::MAX, 50, i64::MAX));
    }

    #[test]
    fn shared_ticket_resolves_names_and_station() {
        let names = HashMap::from([(1, "Admin".to_string()), (5, "Budi".to_string())]);
        let stations = HashMap::from([(
            "ST-001".to_string(),
            Station {
                station_id: "ST-001".into(),
                station_name: "Jl. Sudirman".into(),
                station_type: "COCO".into(),
                province: "DKI Jakarta".into(),
                created_at: ts(),
            },
        )]);

        let out = to_shared_ticket(ticket(Some(5)), &names, &stations, Vec::new());
        assert_eq!(out.creator_name, "Admin");
        assert_eq!(out.assignee_name.as_deref(), Some("Budi"));
        assert_eq!(out.station_name.as_deref(), Some("Jl. Sudirman"));
        assert_eq!(out.station_type, Some(shared::StationType::Coco));
        assert_eq!(out.status, TicketStatus::InProgress);

        let orphan = to_shared_ticket(ticket(Some(9)), &HashMap::new(), &HashMap::new(), Vec::new());
        assert_eq!(orphan.creator_name, "Unknown");
        assert_eq!(orphan.assignee_name, None);
        assert_eq!(orphan.station_name, None);
    }

    #[test]
    fn blank_comments_are_dropped() {
        assert_eq!(clean_comment(Some("   ".into())), None);
        assert_eq!(clean_comment(Some(" waiting on vendor ".into())).as_deref(), Some("waiting on vendor"));
        assert_eq!(clean_comment(None), None);
    }
}
