use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::Response,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::ExportFormat;
use std::sync::Arc;

use crate::db::schema::tbl_ticket;
use crate::error::{AppError, AppResult};
use crate::export;
use crate::models::Ticket;
use crate::AppState;

use super::tickets::{hydrate, TicketFilter, TicketQuery};
use super::AuthUser;

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
}

fn attachment_name(format: ExportFormat, date: chrono::NaiveDate) -> String {
    format!("tickets-{}.{}", date.format("%Y%m%d"), format.extension())
}

pub async fn export_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ExportParams>,
    Query(query): Query<TicketQuery>,
    auth: AuthUser,
) -> AppResult<Response> {
    let scope = auth.ticket_scope()?;
    let format = match params.format.as_deref() {
        None => ExportFormat::Xlsx,
        Some(f) => ExportFormat::parse(f)
            .ok_or_else(|| AppError::validation("format must be one of: xlsx, pdf, csv"))?,
    };
    let filter = TicketFilter::from_query(&query, scope, auth.user_id)?;

    let mut conn = state.pool.get().await?;
    let rows: Vec<Ticket> = filter
        .apply(tbl_ticket::table.into_boxed())
        .order((tbl_ticket::created_at.desc(), tbl_ticket::ticket_id.desc()))
        .limit(state.config.export_row_limit)
        .select(Ticket::as_select())
        .load(&mut conn)
        .await?;
    let tickets = hydrate(&mut conn, rows, false).await?;
    drop(conn);

    let today = Utc::now().date_naive();
    let config = state.config.clone();
    let count = tickets.len();

    // Rendering is CPU-bound and genpdf reads font files synchronously.
    let bytes = tokio::task::spawn_blocking(move || match format {
        ExportFormat::Csv => export::to_csv(&tickets),
        ExportFormat::Xlsx => export::to_xlsx(&tickets),
        ExportFormat::Pdf => export::to_pdf(
            &tickets,
            &config.pdf_font_dir,
            &config.pdf_font_name,
            &format!("Ticket report {}", today.format("%Y-%m-%d")),
        ),
    })
    .await
    .map_err(|e| AppError::internal(format!("Export task failed: {e}")))?
    .map_err(|e| AppError::internal(format!("Failed to render export: {e}")))?;

    tracing::info!(
        format = format.extension(),
        rows = count,
        user_id = auth.user_id,
        "tickets exported"
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment_name(format, today)),
        )
        .body(Body::from(bytes))
        .map_err(|e| AppError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn attachment_names_carry_date_and_extension() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        assert_eq!(attachment_name(ExportFormat::Xlsx, date), "tickets-20261016.xlsx");
        assert_eq!(attachment_name(ExportFormat::Pdf, date), "tickets-20261016.pdf");
        assert_eq!(attachment_name(ExportFormat::Csv, date), "tickets-20261016.csv");
    }
}
