//! Column layout shared by the server's exports and the admin CLI.

use chrono::NaiveDateTime;

use crate::Ticket;

pub const COLUMNS: [&str; 12] = [
    "Ticket ID",
    "Station",
    "Station Name",
    "Issue On",
    "Issue Type",
    "Description",
    "Status",
    "Assignee",
    "Created By",
    "Created At",
    "Closed At",
    "Comment",
];

pub fn timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

/// One report row in `COLUMNS` order.
pub fn row(ticket: &Ticket) -> [String; 12] {
    [
        ticket.ticket_id.clone(),
        ticket.station_id.clone(),
        ticket.station_name.clone().unwrap_or_default(),
        ticket.issue_on.clone(),
        ticket.issue_type.clone(),
        ticket.description.clone(),
        ticket.status.as_str().to_string(),
        ticket.assignee_name.clone().unwrap_or_default(),
        ticket.creator_name.clone(),
        timestamp(Some(ticket.created_at)),
        timestamp(ticket.closed_at),
        ticket.comment.clone().unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TicketStatus;
    use chrono::NaiveDate;

    fn ticket(closed: bool) -> Ticket {
        let ts = NaiveDate::from_ymd_opt(2026, 9, 30)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        Ticket {
            ticket_id: "POS2609000001".into(),
            station_id: "34.101.02".into(),
            station_name: Some("SPBU Menteng".into()),
            station_type: None,
            issue_on: "Dispenser".into(),
            issue_type: "Meter Error".into(),
            description: "Pump 3 totalizer".into(),
            status: if closed { TicketStatus::Close } else { TicketStatus::OnHold },
            users_id: None,
            assignee_name: None,
            user_create_ticket: 1,
            creator_name: "Admin".into(),
            comment: closed.then(|| "Recalibrated".to_string()),
            created_at: ts,
            updated_at: ts,
            in_progress_at: None,
            on_hold_at: None,
            pending_vendor_at: None,
            closed_at: closed.then_some(ts),
            images: Vec::new(),
        }
    }

    #[test]
    fn row_follows_column_order() {
        let r = row(&ticket(true));
        assert_eq!(r.len(), COLUMNS.len());
        assert_eq!(r[0], "POS2609000001");
        assert_eq!(r[2], "SPBU Menteng");
        assert_eq!(r[6], "close");
        assert_eq!(r[7], "");
        assert_eq!(r[9], "2026-09-30 14:05");
        assert_eq!(r[10], "2026-09-30 14:05");
        assert_eq!(r[11], "Recalibrated");
    }

    #[test]
    fn open_tickets_leave_closing_columns_blank() {
        let r = row(&ticket(false));
        assert_eq!(r[6], "on hold");
        assert_eq!(r[10], "");
        assert_eq!(r[11], "");
    }
}
