use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

use crate::PermissionSet;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TicketStatus {
    #[serde(rename = "open")]
    Open,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "on hold")]
    OnHold,
    #[serde(rename = "pending vendor")]
    PendingVendor,
    #[serde(rename = "close")]
    Close,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in progress",
            TicketStatus::OnHold => "on hold",
            TicketStatus::PendingVendor => "pending vendor",
            TicketStatus::Close => "close",
        }
    }

    pub fn all() -> &'static [TicketStatus] {
        &[
            TicketStatus::Open,
            TicketStatus::InProgress,
            TicketStatus::OnHold,
            TicketStatus::PendingVendor,
            TicketStatus::Close,
        ]
    }

    /// Case-insensitive lookup; `closed` is accepted for `close`.
    pub fn parse(s: &str) -> Option<TicketStatus> {
        let s = s.trim().to_lowercase();
        if s == "closed" {
            return Some(TicketStatus::Close);
        }
        Self::all().iter().copied().find(|st| st.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StationType {
    #[serde(rename = "COCO")]
    Coco,
    #[serde(rename = "DODO")]
    Dodo,
}

impl StationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StationType::Coco => "COCO",
            StationType::Dodo => "DODO",
        }
    }

    pub fn all() -> &'static [StationType] {
        &[StationType::Coco, StationType::Dodo]
    }

    pub fn parse(s: &str) -> Option<StationType> {
        let s = s.trim().to_uppercase();
        Self::all().iter().copied().find(|t| t.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<UserStatus> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Xlsx,
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<ExportFormat> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" => Some(ExportFormat::Xlsx),
            "pdf" => Some(ExportFormat::Pdf),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

/// Distinguishes an absent field from an explicit `null` in PATCH-style bodies.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Domain Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub station_id: String,
    pub station_name: String,
    pub station_type: StationType,
    pub province: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub company: String,
    pub status: UserStatus,
    pub rules_id: i32,
    pub rules_name: Option<String>,
    pub image_profile: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: i32,
    pub rules_name: String,
    #[serde(flatten)]
    pub permissions: PermissionSet,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketImage {
    pub id: i32,
    pub image_path: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub station_id: String,
    pub station_name: Option<String>,
    pub station_type: Option<StationType>,
    pub issue_on: String,
    pub issue_type: String,
    pub description: String,
    pub status: TicketStatus,
    pub users_id: Option<i32>,
    pub assignee_name: Option<String>,
    pub user_create_ticket: i32,
    pub creator_name: String,
    pub comment: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub in_progress_at: Option<NaiveDateTime>,
    pub on_hold_at: Option<NaiveDateTime>,
    pub pending_vendor_at: Option<NaiveDateTime>,
    pub closed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub images: Vec<TicketImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelegramGroup {
    pub id: i32,
    pub group_name: String,
    pub chat_id: String,
    pub created_at: NaiveDateTime,
}

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangePassword {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTicket {
    pub station_id: String,
    pub issue_on: String,
    pub issue_type: String,
    pub description: String,
    pub users_id: Option<i32>,
    pub comment: Option<String>,
    pub image_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateTicket {
    pub station_id: Option<String>,
    pub issue_on: Option<String>,
    pub issue_type: Option<String>,
    pub description: Option<String>,
    pub status: Option<TicketStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub users_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub comment: Option<Option<String>>,
}

impl UpdateTicket {
    /// True when only `status` and/or `comment` are being changed.
    pub fn is_status_only(&self) -> bool {
        self.station_id.is_none()
            && self.issue_on.is_none()
            && self.issue_type.is_none()
            && self.description.is_none()
            && self.users_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStation {
    pub station_id: String,
    pub station_name: String,
    pub station_type: StationType,
    pub province: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateStation {
    pub station_name: Option<String>,
    pub station_type: Option<StationType>,
    pub province: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub company: String,
    pub rules_id: i32,
    #[serde(default = "default_user_status")]
    pub status: UserStatus,
    pub image_profile: Option<String>,
}

fn default_user_status() -> UserStatus {
    UserStatus::Active
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub company: Option<String>,
    pub rules_id: Option<i32>,
    pub status: Option<UserStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_profile: Option<Option<String>>,
}

/// Body of both `add_rules` and role updates; a PUT replaces every flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleInput {
    pub rules_name: String,
    #[serde(flatten)]
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTelegramGroup {
    pub group_name: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserGroups {
    pub group_ids: Vec<i32>,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUserResponse {
    pub user_id: i32,
    pub email: String,
    pub name: String,
    pub company: String,
    pub rules_id: i32,
    pub rules_name: String,
    pub image_profile: Option<String>,
    pub permissions: PermissionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: CurrentUserResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPage {
    pub items: Vec<Ticket>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEntry {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: i64,
    pub unresolved: i64,
    pub by_status: Vec<CountEntry>,
    pub by_issue_on: Vec<CountEntry>,
    pub by_station_type: Vec<CountEntry>,
    pub top_stations: Vec<CountEntry>,
    pub monthly: Vec<CountEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_status_uses_spaced_lowercase_on_the_wire() {
        let json = serde_json::to_string(&TicketStatus::PendingVendor).unwrap();
        assert_eq!(json, "\"pending vendor\"");
        let parsed: TicketStatus = serde_json::from_str("\"on hold\"").unwrap();
        assert_eq!(parsed, TicketStatus::OnHold);
    }

    #[test]
    fn ticket_status_parse_is_lenient() {
        assert_eq!(TicketStatus::parse(" In Progress "), Some(TicketStatus::InProgress));
        assert_eq!(TicketStatus::parse("closed"), Some(TicketStatus::Close));
        assert_eq!(TicketStatus::parse("resolved"), None);
    }

    #[test]
    fn station_type_parse() {
        assert_eq!(StationType::parse("coco"), Some(StationType::Coco));
        assert_eq!(StationType::parse("DODO"), Some(StationType::Dodo));
        assert_eq!(StationType::parse("CODO"), None);
    }

    #[test]
    fn update_ticket_distinguishes_null_from_missing() {
        let clear: UpdateTicket = serde_json::from_str(r#"{"users_id": null}"#).unwrap();
        assert_eq!(clear.users_id, Some(None));

        let untouched: UpdateTicket = serde_json::from_str(r#"{"status": "close"}"#).unwrap();
        assert_eq!(untouched.users_id, None);
        assert_eq!(untouched.status, Some(TicketStatus::Close));
        assert!(untouched.is_status_only());
        assert!(!clear.is_status_only());
    }

    #[test]
    fn api_error_body_carries_plain_message() {
        let body = serde_json::to_value(ApiError::conflict("Email already in use")).unwrap();
        assert_eq!(body["error"], "Email already in use");
        assert_eq!(body["code"], "CONFLICT");
    }

    #[test]
    fn create_user_defaults_to_active() {
        let body = r#"{"name":"A","email":"a@b.c","password":"secret123","company":"X","rules_id":2}"#;
        let user: CreateUser = serde_json::from_str(body).unwrap();
        assert_eq!(user.status, UserStatus::Active);
    }

    #[test]
    fn export_format_metadata() {
        assert_eq!(ExportFormat::parse("XLSX"), Some(ExportFormat::Xlsx));
        assert_eq!(ExportFormat::Pdf.extension(), "pdf");
        assert!(ExportFormat::Csv.content_type().starts_with("text/csv"));
        assert_eq!(ExportFormat::parse("docx"), None);
    }
}
