use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use shared::{CountEntry, DashboardSummary, TicketStatus};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::db::schema::{tbl_station, tbl_ticket};
use crate::error::AppResult;
use crate::AppState;

use super::tickets::{TicketFilter, TicketQuery};
use super::AuthUser;

const TOP_STATIONS: usize = 10;
const MONTHS: u32 = 12;

/// The columns the dashboard needs from each ticket.
#[derive(Debug, Clone)]
struct TicketFacts {
    status: String,
    issue_on: String,
    station_id: String,
    created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
struct StationInfo {
    name: String,
    station_type: String,
}

/// First day of each of the last `count` months ending with `today`'s month,
/// oldest first.
fn month_starts(today: NaiveDate, count: u32) -> Vec<NaiveDate> {
    let current = today.year() * 12 + today.month0() as i32;
    (0..count as i32)
        .rev()
        .filter_map(|back| {
            let m = current - back;
            NaiveDate::from_ymd_opt(m.div_euclid(12), m.rem_euclid(12) as u32 + 1, 1)
        })
        .collect()
}

fn entries(counts: Vec<(String, i64)>) -> Vec<CountEntry> {
    counts
        .into_iter()
        .map(|(label, count)| CountEntry { label, count })
        .collect()
}

/// Counts `labels` in `order`, zero-filling known labels and appending any
/// unexpected ones afterwards.
fn count_in_order<'a, 'b>(
    order: impl IntoIterator<Item = &'b str>,
    labels: impl Iterator<Item = &'a str>,
) -> Vec<CountEntry> {
    let mut counts: HashMap<&'a str, i64> = HashMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }

    let mut out: Vec<(String, i64)> = Vec::new();
    for label in order {
        out.push((label.to_string(), counts.remove(label).unwrap_or(0)));
    }
    let mut rest: Vec<(&str, i64)> = counts.into_iter().collect();
    rest.sort();
    out.extend(rest.into_iter().map(|(l, c)| (l.to_string(), c)));
    entries(out)
}

fn summarize(
    facts: &[TicketFacts],
    stations: &HashMap<String, StationInfo>,
    today: NaiveDate,
) -> DashboardSummary {
    let total = facts.len() as i64;

    let statuses: Vec<&str> = facts
        .iter()
        .map(|f| {
            TicketStatus::parse(&f.status)
                .map(|s| s.as_str())
                .unwrap_or(f.status.as_str())
        })
        .collect();
    let closed = statuses
        .iter()
        .filter(|s| **s == TicketStatus::Close.as_str())
        .count() as i64;

    let by_status = count_in_order(
        TicketStatus::all().iter().map(|s| s.as_str()),
        statuses.iter().copied(),
    );

    let by_issue_on = count_in_order(
        shared::issues::categories(),
        facts.iter().map(|f| f.issue_on.as_str()),
    );

    let by_station_type = count_in_order(
        shared::StationType::all().iter().map(|t| t.as_str()),
        facts.iter().map(|f| {
            stations
                .get(&f.station_id)
                .map(|s| s.station_type.as_str())
                .unwrap_or("UNKNOWN")
        }),
    );

    let mut per_station: HashMap<&str, i64> = HashMap::new();
    for f in facts {
        *per_station.entry(f.station_id.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, i64)> = per_station.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let top_stations = ranked
        .into_iter()
        .take(TOP_STATIONS)
        .map(|(id, count)| CountEntry {
            label: match stations.get(id) {
                Some(info) => format!("{} - {}", id, info.name),
                None => id.to_string(),
            },
            count,
        })
        .collect();

    let months = month_starts(today, MONTHS);
    let mut per_month: HashMap<(i32, u32), i64> = HashMap::new();
    for f in facts {
        let d = f.created_at.date();
        *per_month.entry((d.year(), d.month())).or_default() += 1;
    }
    let monthly = months
        .iter()
        .map(|m| CountEntry {
            label: m.format("%Y-%m").to_string(),
            count: per_month.get(&(m.year(), m.month())).copied().unwrap_or(0),
        })
        .collect();

    DashboardSummary {
        total,
        unresolved: total - closed,
        by_status,
        by_issue_on,
        by_station_type,
        top_stations,
        monthly,
    }
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TicketQuery>,
    auth: AuthUser,
) -> AppResult<Json<DashboardSummary>> {
    let scope = auth.ticket_scope()?;
    let filter = TicketFilter::from_query(&query, scope, auth.user_id)?;

    let mut conn = state.pool.get().await?;

    let facts: Vec<TicketFacts> = filter
        .apply(tbl_ticket::table.into_boxed())
        .select((
            tbl_ticket::status,
            tbl_ticket::issue_on,
            tbl_ticket::station_id,
            tbl_ticket::created_at,
        ))
        .load::<(String, String, String, NaiveDateTime)>(&mut conn)
        .await?
        .into_iter()
        .map(|(status, issue_on, station_id, created_at)| TicketFacts {
            status,
            issue_on,
            station_id,
            created_at,
        })
        .collect();

    let station_ids: Vec<String> = facts
        .iter()
        .map(|f| f.station_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let stations: HashMap<String, StationInfo> = if station_ids.is_empty() {
        HashMap::new()
    } else {
        tbl_station::table
            .filter(tbl_station::station_id.eq_any(&station_ids))
            .select((
                tbl_station::station_id,
                tbl_station::station_name,
                tbl_station::station_type,
            ))
            .load::<(String, String, String)>(&mut conn)
            .await?
            .into_iter()
            .map(|(id, name, station_type)| (id, StationInfo { name, station_type }))
            .collect()
    };

    tracing::debug!(tickets = facts.len(), user_id = auth.user_id, "dashboard summary");
    Ok(Json(summarize(&facts, &stations, Utc::now().date_naive())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn fact(status: &str, issue_on: &str, station: &str, created: NaiveDate) -> TicketFacts {
        TicketFacts {
            status: status.into(),
            issue_on: issue_on.into(),
            station_id: station.into(),
            created_at: created.and_hms_opt(9, 0, 0).unwrap(),
        }
    }

    fn count(entries: &[CountEntry], label: &str) -> i64 {
        entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.count)
            .unwrap_or(-1)
    }

    #[test]
    fn months_span_year_boundary_oldest_first() {
        let months = month_starts(date(2026, 2, 14), 12);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0], date(2025, 3, 1));
        assert_eq!(months[10], date(2026, 1, 1));
        assert_eq!(months[11], date(2026, 2, 1));
    }

    #[test]
    fn empty_dashboard_is_zero_filled() {
        let summary = summarize(&[], &HashMap::new(), date(2026, 10, 16));
        assert_eq!(summary.total, 0);
        assert_eq!(summary.unresolved, 0);
        assert_eq!(summary.by_status.len(), TicketStatus::all().len());
        assert!(summary.by_status.iter().all(|e| e.count == 0));
        assert_eq!(count(&summary.by_issue_on, "POS"), 0);
        assert!(summary.top_stations.is_empty());
        assert_eq!(summary.monthly.len(), 12);
        assert_eq!(summary.monthly[11].label, "2026-10");
    }

    #[test]
    fn counts_by_every_dimension() {
        let stations = HashMap::from([
            (
                "A".to_string(),
                StationInfo {
                    name: "Alpha".into(),
                    station_type: "COCO".into(),
                },
            ),
            (
                "B".to_string(),
                StationInfo {
                    name: "Bravo".into(),
                    station_type: "DODO".into(),
                },
            ),
        ]);
        let facts = vec![
            fact("open", "POS", "A", date(2026, 10, 1)),
            fact("close", "POS", "A", date(2026, 9, 3)),
            fact("in progress", "Network", "B", date(2026, 10, 2)),
            fact("close", "EDC", "A", date(2025, 1, 5)),
            fact("open", "Dispenser", "Z", date(2026, 10, 9)),
        ];

        let s = summarize(&facts, &stations, date(2026, 10, 16));
        assert_eq!(s.total, 5);
        assert_eq!(s.unresolved, 3);
        assert_eq!(count(&s.by_status, "open"), 2);
        assert_eq!(count(&s.by_status, "close"), 2);
        assert_eq!(count(&s.by_status, "on hold"), 0);
        assert_eq!(count(&s.by_issue_on, "POS"), 2);
        assert_eq!(count(&s.by_issue_on, "CCTV"), 0);
        assert_eq!(count(&s.by_station_type, "COCO"), 3);
        assert_eq!(count(&s.by_station_type, "DODO"), 1);
        assert_eq!(count(&s.by_station_type, "UNKNOWN"), 1);

        assert_eq!(s.top_stations[0].label, "A - Alpha");
        assert_eq!(s.top_stations[0].count, 3);
        assert_eq!(s.top_stations[1].label, "B - Bravo");
        assert_eq!(s.top_stations[2].label, "Z");

        // The January 2025 ticket falls outside the window.
        assert_eq!(count(&s.monthly, "2026-10"), 3);
        assert_eq!(count(&s.monthly, "2026-09"), 1);
        assert_eq!(s.monthly.iter().map(|e| e.count).sum::<i64>(), 4);
    }
}
