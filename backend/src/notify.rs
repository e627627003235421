//! Telegram notifications sent when a ticket lands on someone's desk.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::db::schema::{tbl_telegramgroups, tbl_user_groups};
use crate::DbPool;

const API_BASE: &str = "https://api.telegram.org";

// sendMessage rejects longer texts.
const MESSAGE_LIMIT: usize = 4096;
const COMMENT_BUDGET: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Telegram API error: {0}")]
    Api(String),
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Clone)]
pub struct Notifier {
    bot_token: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(bot_token: Option<String>) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bot_token.is_some()
    }

    /// Fire-and-forget: looks up the assignee's chat groups and posts the
    /// ticket summary to each of them on a background task.
    pub fn ticket_assigned(&self, pool: DbPool, assignee_id: i32, ticket: &shared::Ticket) {
        if !self.is_enabled() {
            return;
        }
        let notifier = self.clone();
        let ticket_id = ticket.ticket_id.clone();
        let text = assignment_message(ticket);

        tokio::spawn(async move {
            let chat_ids = match assignee_chat_ids(&pool, assignee_id).await {
                Ok(ids) => ids,
                Err(e) => {
                    tracing::warn!(ticket_id = %ticket_id, assignee_id, "failed to load chat groups: {e}");
                    return;
                }
            };
            if chat_ids.is_empty() {
                tracing::debug!(ticket_id = %ticket_id, assignee_id, "assignee has no chat groups");
                return;
            }
            for chat_id in chat_ids {
                match notifier.send_message(&chat_id, &text).await {
                    Ok(()) => tracing::info!(ticket_id = %ticket_id, chat_id = %chat_id, "notification sent"),
                    Err(e) => tracing::warn!(ticket_id = %ticket_id, chat_id = %chat_id, "notification failed: {e}"),
                }
            }
        });
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let Some(token) = self.bot_token.as_deref() else {
            return Err(NotifyError::Api("bot token not configured".to_string()));
        };
        let url = format!("{}/bot{}/sendMessage", API_BASE, token);

        let response: TelegramResponse = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id,
                text,
                parse_mode: "HTML",
            })
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(NotifyError::Api(
                response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}

async fn assignee_chat_ids(pool: &DbPool, user_id: i32) -> anyhow::Result<Vec<String>> {
    let mut conn = pool.get().await?;
    let ids = tbl_user_groups::table
        .inner_join(tbl_telegramgroups::table)
        .filter(tbl_user_groups::user_id.eq(user_id))
        .select(tbl_telegramgroups::chat_id)
        .load::<String>(&mut conn)
        .await?;
    Ok(ids)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escapes `s` and cuts it so the result is at most `budget` characters,
/// ending in an ellipsis when anything was dropped.
fn escape_within(s: &str, budget: usize) -> String {
    let full = escape_html(s);
    if full.chars().count() <= budget {
        return full;
    }
    if budget == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    let mut buf = [0u8; 4];
    for c in s.chars() {
        let piece = escape_html(c.encode_utf8(&mut buf));
        let len = piece.chars().count();
        if used + len + 1 > budget {
            break;
        }
        out.push_str(&piece);
        used += len;
    }
    out.push('…');
    out
}

pub fn assignment_message(ticket: &shared::Ticket) -> String {
    let station = match ticket.station_name {
        Some(ref name) => format!("{} ({})", ticket.station_id, name),
        None => ticket.station_id.clone(),
    };
    let header = format!(
        "<b>Ticket {}</b> assigned to you\nStation: {}\nIssue: {} / {}\nStatus: {}\nOpened by: {}\n\n",
        escape_html(&ticket.ticket_id),
        escape_html(&station),
        escape_html(&ticket.issue_on),
        escape_html(&ticket.issue_type),
        ticket.status.as_str(),
        escape_html(&ticket.creator_name),
    );
    let comment = match ticket.comment {
        Some(ref comment) => format!("\n\nComment: {}", escape_within(comment, COMMENT_BUDGET)),
        None => String::new(),
    };

    let used = header.chars().count() + comment.chars().count();
    let description = escape_within(&ticket.description, MESSAGE_LIMIT.saturating_sub(used));
    format!("{header}{description}{comment}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use shared::TicketStatus;

    fn ticket() -> shared::Ticket {
        let ts = NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(7, 15, 0)
            .unwrap();
        shared::Ticket {
            ticket_id: "POS2610000042".into(),
            station_id: "34.123.01".into(),
            station_name: Some("SPBU Cikini".into()),
            station_type: None,
            issue_on: "EDC".into(),
            issue_type: "Settlement Failure".into(),
            description: "Batch <3> rejected & stuck".into(),
            status: TicketStatus::Open,
            users_id: Some(5),
            assignee_name: Some("Budi".into()),
            user_create_ticket: 1,
            creator_name: "Admin".into(),
            comment: None,
            created_at: ts,
            updated_at: ts,
            in_progress_at: None,
            on_hold_at: None,
            pending_vendor_at: None,
            closed_at: None,
            images: Vec::new(),
        }
    }

    #[test]
    fn message_summarizes_ticket_and_escapes_html() {
        let text = assignment_message(&ticket());
        assert!(text.starts_with("<b>Ticket POS2610000042</b>"));
        assert!(text.contains("Station: 34.123.01 (SPBU Cikini)"));
        assert!(text.contains("Issue: EDC / Settlement Failure"));
        assert!(text.contains("Batch &lt;3&gt; rejected &amp; stuck"));
        assert!(!text.contains("Comment:"));
    }

    #[test]
    fn message_includes_comment_when_present() {
        let mut t = ticket();
        t.comment = Some("Vendor visit booked".into());
        assert!(assignment_message(&t).ends_with("Comment: Vendor visit booked"));
    }

    #[test]
    fn long_description_and_comment_fit_one_message() {
        let mut t = ticket();
        t.description = "x".repeat(5000);
        t.comment = Some("<&>".repeat(2000));
        let text = assignment_message(&t);
        assert!(text.chars().count() <= MESSAGE_LIMIT);
        assert!(text.starts_with("<b>Ticket POS2610000042</b>"));
        assert!(text.contains("x…"));
        assert!(text.contains("Comment: &lt;&amp;&gt;"));
        assert!(text.ends_with('…'));
    }

    #[test]
    fn truncation_never_splits_an_entity() {
        assert_eq!(escape_within("a&b", 10), "a&amp;b");
        assert_eq!(escape_within("a&b", 5), "a…");
        assert_eq!(escape_within("abcdef", 4), "abc…");
        assert_eq!(escape_within("abc", 0), "");
    }

    #[tokio::test]
    async fn disabled_notifier_refuses_to_send() {
        let notifier = Notifier::new(None);
        assert!(!notifier.is_enabled());
        let err = notifier.send_message("42", "hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Api(_)));
    }
}
