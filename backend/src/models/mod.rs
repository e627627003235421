use chrono::NaiveDateTime;
use diesel::prelude::*;
use shared::{PermissionSet, RoleInput, StationType, TicketStatus, UserStatus};

use crate::db::schema::*;

// ============================================================================
// Role
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_users_rules)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct Role {
    pub id: i32,
    pub rules_name: String,
    pub users_add: bool,
    pub users_edit: bool,
    pub users_delete: bool,
    pub users_list: bool,
    pub tickets_add: bool,
    pub tickets_edit: bool,
    pub tickets_delete: bool,
    pub tickets_list: bool,
    pub tickets_list_assign: bool,
    pub stations_add: bool,
    pub stations_edit: bool,
    pub stations_delete: bool,
    pub stations_list: bool,
    pub rules_add: bool,
    pub rules_edit: bool,
    pub rules_delete: bool,
    pub rules_list: bool,
    pub created_at: NaiveDateTime,
}

impl Role {
    pub fn permissions(&self) -> PermissionSet {
        PermissionSet {
            users_add: self.users_add,
            users_edit: self.users_edit,
            users_delete: self.users_delete,
            users_list: self.users_list,
            tickets_add: self.tickets_add,
            tickets_edit: self.tickets_edit,
            tickets_delete: self.tickets_delete,
            tickets_list: self.tickets_list,
            tickets_list_assign: self.tickets_list_assign,
            stations_add: self.stations_add,
            stations_edit: self.stations_edit,
            stations_delete: self.stations_delete,
            stations_list: self.stations_list,
            rules_add: self.rules_add,
            rules_edit: self.rules_edit,
            rules_delete: self.rules_delete,
            rules_list: self.rules_list,
        }
    }

    pub fn to_shared(&self) -> shared::Role {
        shared::Role {
            id: self.id,
            rules_name: self.rules_name.clone(),
            permissions: self.permissions(),
            created_at: self.created_at,
        }
    }
}

/// Used for both inserts and full-replace updates.
#[derive(Debug, Insertable, AsChangeset)]
#[diesel(table_name = tbl_users_rules)]
pub struct RoleRow {
    pub rules_name: String,
    pub users_add: bool,
    pub users_edit: bool,
    pub users_delete: bool,
    pub users_list: bool,
    pub tickets_add: bool,
    pub tickets_edit: bool,
    pub tickets_delete: bool,
    pub tickets_list: bool,
    pub tickets_list_assign: bool,
    pub stations_add: bool,
    pub stations_edit: bool,
    pub stations_delete: bool,
    pub stations_list: bool,
    pub rules_add: bool,
    pub rules_edit: bool,
    pub rules_delete: bool,
    pub rules_list: bool,
}

impl From<&RoleInput> for RoleRow {
    fn from(input: &RoleInput) -> Self {
        let p = input.permissions;
        Self {
            rules_name: input.rules_name.trim().to_string(),
            users_add: p.users_add,
            users_edit: p.users_edit,
            users_delete: p.users_delete,
            users_list: p.users_list,
            tickets_add: p.tickets_add,
            tickets_edit: p.tickets_edit,
            tickets_delete: p.tickets_delete,
            tickets_list: p.tickets_list,
            tickets_list_assign: p.tickets_list_assign,
            stations_add: p.stations_add,
            stations_edit: p.stations_edit,
            stations_delete: p.stations_delete,
            stations_list: p.stations_list,
            rules_add: p.rules_add,
            rules_edit: p.rules_edit,
            rules_delete: p.rules_delete,
            rules_list: p.rules_list,
        }
    }
}

// ============================================================================
// User
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_users)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password: String,
    pub company: String,
    pub status: String,
    pub rules_id: i32,
    pub image_profile: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    pub fn is_active(&self) -> bool {
        UserStatus::parse(&self.status) == Some(UserStatus::Active)
    }

    pub fn to_shared(&self, rules_name: Option<String>) -> shared::User {
        shared::User {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            company: self.company.clone(),
            status: UserStatus::parse(&self.status).unwrap_or(UserStatus::Inactive),
            rules_id: self.rules_id,
            rules_name,
            image_profile: self.image_profile.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub company: String,
    pub status: String,
    pub rules_id: i32,
    pub image_profile: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = tbl_users)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub company: Option<String>,
    pub status: Option<String>,
    pub rules_id: Option<i32>,
    pub image_profile: Option<Option<String>>,
    pub updated_at: NaiveDateTime,
}

// ============================================================================
// Station
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_station)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct Station {
    pub station_id: String,
    pub station_name: String,
    pub station_type: String,
    pub province: String,
    pub created_at: NaiveDateTime,
}

impl Station {
    pub fn station_type(&self) -> Option<StationType> {
        StationType::parse(&self.station_type)
    }

    pub fn to_shared(&self) -> shared::Station {
        shared::Station {
            station_id: self.station_id.clone(),
            station_name: self.station_name.clone(),
            station_type: self.station_type().unwrap_or(StationType::Coco),
            province: self.province.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_station)]
pub struct NewStation {
    pub station_id: String,
    pub station_name: String,
    pub station_type: String,
    pub province: String,
}

#[derive(Debug, AsChangeset)]
#[diesel(table_name = tbl_station)]
pub struct UpdateStation {
    pub station_name: Option<String>,
    pub station_type: Option<String>,
    pub province: Option<String>,
}

// ============================================================================
// Ticket
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_ticket)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct Ticket {
    pub ticket_id: String,
    pub station_id: String,
    pub issue_on: String,
    pub issue_type: String,
    pub description: String,
    pub status: String,
    pub users_id: Option<i32>,
    pub user_create_ticket: i32,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub in_progress_at: Option<NaiveDateTime>,
    pub on_hold_at: Option<NaiveDateTime>,
    pub pending_vendor_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
}

impl Ticket {
    pub fn status(&self) -> TicketStatus {
        TicketStatus::parse(&self.status).unwrap_or(TicketStatus::Open)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_ticket)]
pub struct NewTicket {
    pub ticket_id: String,
    pub station_id: String,
    pub issue_on: String,
    pub issue_type: String,
    pub description: String,
    pub status: String,
    pub users_id: Option<i32>,
    pub user_create_ticket: i32,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tbl_ticket)]
pub struct UpdateTicket {
    pub station_id: Option<String>,
    pub issue_on: Option<String>,
    pub issue_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub users_id: Option<Option<i32>>,
    pub comment: Option<Option<String>>,
    pub updated_at: Option<NaiveDateTime>,
    pub in_progress_at: Option<NaiveDateTime>,
    pub on_hold_at: Option<NaiveDateTime>,
    pub pending_vendor_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
}

impl UpdateTicket {
    /// Sets the status and stamps the column recording when it was entered.
    pub fn transition_to(&mut self, status: TicketStatus, at: NaiveDateTime) {
        self.status = Some(status.as_str().to_string());
        match status {
            TicketStatus::Open => {}
            TicketStatus::InProgress => self.in_progress_at = Some(at),
            TicketStatus::OnHold => self.on_hold_at = Some(at),
            TicketStatus::PendingVendor => self.pending_vendor_at = Some(at),
            TicketStatus::Close => self.closed_at = Some(at),
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_ticket_images)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct TicketImage {
    pub id: i32,
    pub ticket_id: String,
    pub image_path: String,
    pub created_at: NaiveDateTime,
}

impl TicketImage {
    pub fn to_shared(&self) -> shared::TicketImage {
        shared::TicketImage {
            id: self.id,
            image_path: self.image_path.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_ticket_images)]
pub struct NewTicketImage {
    pub ticket_id: String,
    pub image_path: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_ticket_sequence)]
pub struct NewTicketSequence {
    pub prefix: String,
    pub last_value: i32,
}

// ============================================================================
// Telegram groups
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tbl_telegramgroups)]
#[diesel(check_for_backend(diesel::mysql::Mysql))]
pub struct TelegramGroup {
    pub id: i32,
    pub group_name: String,
    pub chat_id: String,
    pub created_at: NaiveDateTime,
}

impl TelegramGroup {
    pub fn to_shared(&self) -> shared::TelegramGroup {
        shared::TelegramGroup {
            id: self.id,
            group_name: self.group_name.clone(),
            chat_id: self.chat_id.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_telegramgroups)]
pub struct NewTelegramGroup {
    pub group_name: String,
    pub chat_id: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = tbl_user_groups)]
pub struct NewUserGroup {
    pub user_id: i32,
    pub group_id: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn transition_stamps_matching_column() {
        let mut change = UpdateTicket::default();
        change.transition_to(TicketStatus::PendingVendor, at(9));
        assert_eq!(change.status.as_deref(), Some("pending vendor"));
        assert_eq!(change.pending_vendor_at, Some(at(9)));
        assert_eq!(change.closed_at, None);

        change.transition_to(TicketStatus::Close, at(11));
        assert_eq!(change.status.as_deref(), Some("close"));
        assert_eq!(change.closed_at, Some(at(11)));
    }

    #[test]
    fn reopening_leaves_timestamps_alone() {
        let mut change = UpdateTicket::default();
        change.transition_to(TicketStatus::Open, at(8));
        assert_eq!(change.status.as_deref(), Some("open"));
        assert!(change.in_progress_at.is_none() && change.closed_at.is_none());
    }

    #[test]
    fn role_row_trims_name_and_copies_flags() {
        let input = RoleInput {
            rules_name: "  Technician ".to_string(),
            permissions: PermissionSet {
                tickets_list_assign: true,
                tickets_edit: true,
                ..PermissionSet::default()
            },
        };
        let row = RoleRow::from(&input);
        assert_eq!(row.rules_name, "Technician");
        assert!(row.tickets_list_assign && row.tickets_edit);
        assert!(!row.users_add && !row.rules_delete);
    }
}
