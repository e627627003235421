use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Months, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use diesel::mysql::MysqlConnection;
use diesel::prelude::*;
use shared::password::{hash_password, validate_password};
use shared::{Permission, PermissionSet, StationType, TicketStatus};

mod schema {
    diesel::table! {
        tbl_users_rules (id) {
            id -> Integer,
            #[max_length = 100]
            rules_name -> Varchar,
            users_add -> Bool,
            users_edit -> Bool,
            users_delete -> Bool,
            users_list -> Bool,
            tickets_add -> Bool,
            tickets_edit -> Bool,
            tickets_delete -> Bool,
            tickets_list -> Bool,
            tickets_list_assign -> Bool,
            stations_add -> Bool,
            stations_edit -> Bool,
            stations_delete -> Bool,
            stations_list -> Bool,
            rules_add -> Bool,
            rules_edit -> Bool,
            rules_delete -> Bool,
            rules_list -> Bool,
            created_at -> Datetime,
        }
    }

    diesel::table! {
        tbl_users (id) {
            id -> Integer,
            #[max_length = 255]
            name -> Varchar,
            #[max_length = 255]
            email -> Varchar,
            #[max_length = 255]
            password -> Varchar,
            #[max_length = 255]
            company -> Varchar,
            #[max_length = 10]
            status -> Varchar,
            rules_id -> Integer,
            #[max_length = 255]
            image_profile -> Nullable<Varchar>,
            created_at -> Datetime,
            updated_at -> Datetime,
        }
    }

    diesel::table! {
        tbl_station (station_id) {
            #[max_length = 20]
            station_id -> Varchar,
            #[max_length = 255]
            station_name -> Varchar,
            #[max_length = 10]
            station_type -> Varchar,
            #[max_length = 100]
            province -> Varchar,
            created_at -> Datetime,
        }
    }

    diesel::table! {
        tbl_ticket (ticket_id) {
            #[max_length = 20]
            ticket_id -> Varchar,
            #[max_length = 20]
            station_id -> Varchar,
            #[max_length = 100]
            issue_on -> Varchar,
            #[max_length = 100]
            issue_type -> Varchar,
            description -> Text,
            #[max_length = 20]
            status -> Varchar,
            users_id -> Nullable<Integer>,
            user_create_ticket -> Integer,
            comment -> Nullable<Text>,
            created_at -> Datetime,
            updated_at -> Datetime,
            in_progress_at -> Nullable<Datetime>,
            on_hold_at -> Nullable<Datetime>,
            pending_vendor_at -> Nullable<Datetime>,
            closed_at -> Nullable<Datetime>,
        }
    }

    diesel::joinable!(tbl_users -> tbl_users_rules (rules_id));

    diesel::allow_tables_to_appear_in_same_query!(tbl_station, tbl_ticket, tbl_users, tbl_users_rules,);
}

use schema::*;

// ============================================================================
// CLI
// ============================================================================

#[derive(Parser)]
#[command(name = "helpdesk-cli")]
#[command(about = "Admin CLI for the station helpdesk")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a role
    CreateRole {
        #[arg(long)]
        name: String,
        /// Grant every permission
        #[arg(long, default_value_t = false)]
        all: bool,
        /// Grant one permission by name (e.g. tickets_list_assign); repeatable
        #[arg(long = "allow")]
        allow: Vec<String>,
    },
    /// Create a user
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        company: String,
        /// Role name
        #[arg(long)]
        role: String,
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
    /// List all users
    ListUsers {
        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Create a station
    CreateStation {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// COCO or DODO
        #[arg(long = "type")]
        station_type: String,
        #[arg(long)]
        province: String,
    },
    /// Import stations from a CSV file with columns
    /// station_id, station_name, station_type, province
    ImportStations {
        #[arg(long)]
        file: PathBuf,
        /// Parse and validate without writing to the database
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Export tickets to a CSV file
    ExportTickets {
        #[arg(long)]
        file: PathBuf,
        /// Only tickets created in this month (YYYY-MM)
        #[arg(long)]
        month: Option<String>,
    },
}

// ============================================================================
// Models
// ============================================================================

#[derive(Insertable)]
#[diesel(table_name = tbl_users_rules)]
struct NewRole {
    rules_name: String,
    users_add: bool,
    users_edit: bool,
    users_delete: bool,
    users_list: bool,
    tickets_add: bool,
    tickets_edit: bool,
    tickets_delete: bool,
    tickets_list: bool,
    tickets_list_assign: bool,
    stations_add: bool,
    stations_edit: bool,
    stations_delete: bool,
    stations_list: bool,
    rules_add: bool,
    rules_edit: bool,
    rules_delete: bool,
    rules_list: bool,
}

impl NewRole {
    fn new(name: String, p: PermissionSet) -> Self {
        Self {
            rules_name: name,
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

#[derive(Insertable)]
#[diesel(table_name = tbl_users)]
struct NewUser {
    name: String,
    email: String,
    password: String,
    company: String,
    status: String,
    rules_id: i32,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = tbl_station)]
struct NewStation {
    station_id: String,
    station_name: String,
    station_type: String,
    province: String,
}

#[derive(Queryable)]
struct TicketRow {
    ticket_id: String,
    station_id: String,
    issue_on: String,
    issue_type: String,
    description: String,
    status: String,
    users_id: Option<i32>,
    user_create_ticket: i32,
    comment: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
    in_progress_at: Option<NaiveDateTime>,
    on_hold_at: Option<NaiveDateTime>,
    pending_vendor_at: Option<NaiveDateTime>,
    closed_at: Option<NaiveDateTime>,
}

// ============================================================================
// CSV row
// ============================================================================

#[derive(Debug, serde::Deserialize)]
struct StationCsvRow {
    #[serde(alias = "Station ID", alias = "STATION_ID")]
    station_id: String,
    #[serde(alias = "Station Name", alias = "STATION_NAME")]
    station_name: String,
    #[serde(alias = "Station Type", alias = "STATION_TYPE")]
    station_type: String,
    #[serde(alias = "Province", alias = "PROVINCE")]
    province: String,
}

// ============================================================================
// Validation
// ============================================================================

fn role_permissions(all: bool, allow: &[String]) -> anyhow::Result<PermissionSet> {
    if all {
        return Ok(PermissionSet::all());
    }
    let mut set = PermissionSet::default();
    for name in allow {
        let permission = Permission::parse(name).with_context(|| {
            format!(
                "Unknown permission '{}'. Known: {}",
                name,
                Permission::ALL
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })?;
        set.grant(permission);
    }
    Ok(set)
}

fn check_len(field: &str, value: &str, max: usize) -> anyhow::Result<()> {
    let len = value.trim().chars().count();
    if len == 0 || len > max {
        anyhow::bail!("{} must be 1-{} characters", field, max);
    }
    Ok(())
}

fn station_from_parts(
    id: &str,
    name: &str,
    station_type: &str,
    province: &str,
) -> anyhow::Result<NewStation> {
    check_len("station_id", id, 20)?;
    check_len("station_name", name, 255)?;
    check_len("province", province, 100)?;
    let ty = StationType::parse(station_type)
        .with_context(|| format!("Unknown station type '{}' (expected COCO or DODO)", station_type))?;
    Ok(NewStation {
        station_id: id.trim().to_string(),
        station_name: name.trim().to_string(),
        station_type: ty.as_str().to_string(),
        province: province.trim().to_string(),
    })
}

/// Parses every row and reports all problems at once.
fn parse_station_csv(contents: &str) -> anyhow::Result<Vec<NewStation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(contents.as_bytes());

    let mut stations = Vec::new();
    let mut seen = HashSet::new();
    let mut errors: Vec<String> = Vec::new();

    for (i, result) in rdr.deserialize::<StationCsvRow>().enumerate() {
        // Header is line 1.
        let line = i + 2;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                errors.push(format!("Line {}: {}", line, e));
                continue;
            }
        };
        if row.station_id.is_empty() && row.station_name.is_empty() {
            continue;
        }
        match station_from_parts(&row.station_id, &row.station_name, &row.station_type, &row.province) {
            Ok(station) => {
                if !seen.insert(station.station_id.clone()) {
                    errors.push(format!("Line {}: duplicate station_id '{}'", line, station.station_id));
                } else {
                    stations.push(station);
                }
            }
            Err(e) => errors.push(format!("Line {}: {}", line, e)),
        }
    }

    if !errors.is_empty() {
        println!("Validation errors:");
        for e in &errors {
            println!("  ERROR: {}", e);
        }
        anyhow::bail!("{} validation error(s) found", errors.len());
    }
    Ok(stations)
}

/// `YYYY-MM` to the half-open range of that month.
fn month_range(month: &str) -> anyhow::Result<(NaiveDateTime, NaiveDateTime)> {
    let start = NaiveDate::parse_from_str(&format!("{}-01", month.trim()), "%Y-%m-%d")
        .with_context(|| format!("Invalid month '{}', expected YYYY-MM", month))?;
    let end = start
        .checked_add_months(Months::new(1))
        .context("Month out of range")?;
    Ok((start.and_time(chrono::NaiveTime::MIN), end.and_time(chrono::NaiveTime::MIN)))
}

// ============================================================================
// Commands
// ============================================================================

fn establish_connection() -> anyhow::Result<MysqlConnection> {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    MysqlConnection::establish(&database_url)
        .with_context(|| format!("Error connecting to {}", database_url))
}

fn import_stations(file: PathBuf, dry_run: bool) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(&file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let stations = parse_station_csv(&contents)?;

    if stations.is_empty() {
        println!("No stations found in CSV.");
        return Ok(());
    }
    println!("Parsed {} stations.", stations.len());

    if dry_run {
        println!("\n[DRY RUN] Would import:");
        for s in &stations {
            println!("  {} - {} ({}, {})", s.station_id, s.station_name, s.station_type, s.province);
        }
        return Ok(());
    }

    let mut conn = establish_connection()?;

    conn.transaction::<_, anyhow::Error, _>(|conn| {
        let mut imported = 0;
        let mut skipped = 0;

        for station in &stations {
            let exists: bool = diesel::select(diesel::dsl::exists(
                tbl_station::table.filter(tbl_station::station_id.eq(&station.station_id)),
            ))
            .get_result(conn)?;

            if exists {
                println!("  SKIP {} (already exists)", station.station_id);
                skipped += 1;
                continue;
            }

            diesel::insert_into(tbl_station::table)
                .values(station)
                .execute(conn)?;
            println!("  IMPORTED {} - {}", station.station_id, station.station_name);
            imported += 1;
        }

        println!("\nImport complete: {} imported, {} skipped", imported, skipped);
        Ok(())
    })
}

fn export_tickets(file: PathBuf, month: Option<String>) -> anyhow::Result<()> {
    let range = month.as_deref().map(month_range).transpose()?;
    let mut conn = establish_connection()?;

    let mut query = tbl_ticket::table.into_boxed();
    if let Some((start, end)) = range {
        query = query
            .filter(tbl_ticket::created_at.ge(start))
            .filter(tbl_ticket::created_at.lt(end));
    }
    let rows: Vec<TicketRow> = query
        .order(tbl_ticket::created_at.asc())
        .load(&mut conn)?;

    let names: HashMap<i32, String> = tbl_users::table
        .select((tbl_users::id, tbl_users::name))
        .load::<(i32, String)>(&mut conn)?
        .into_iter()
        .collect();
    let stations: HashMap<String, (String, String)> = tbl_station::table
        .select((tbl_station::station_id, tbl_station::station_name, tbl_station::station_type))
        .load::<(String, String, String)>(&mut conn)?
        .into_iter()
        .map(|(id, name, ty)| (id, (name, ty)))
        .collect();

    let mut writer = csv::Writer::from_path(&file)
        .with_context(|| format!("Failed to create {}", file.display()))?;
    writer.write_record(shared::report::COLUMNS)?;

    let count = rows.len();
    for r in rows {
        let station = stations.get(&r.station_id);
        let ticket = shared::Ticket {
            station_name: station.map(|(name, _)| name.clone()),
            station_type: station.and_then(|(_, ty)| StationType::parse(ty)),
            assignee_name: r.users_id.and_then(|id| names.get(&id).cloned()),
            creator_name: names
                .get(&r.user_create_ticket)
                .cloned()
                .unwrap_or_else(|| "Unknown".to_string()),
            status: TicketStatus::parse(&r.status).unwrap_or(TicketStatus::Open),
            ticket_id: r.ticket_id,
            station_id: r.station_id,
            issue_on: r.issue_on,
            issue_type: r.issue_type,
            description: r.description,
            users_id: r.users_id,
            user_create_ticket: r.user_create_ticket,
            comment: r.comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
            in_progress_at: r.in_progress_at,
            on_hold_at: r.on_hold_at,
            pending_vendor_at: r.pending_vendor_at,
            closed_at: r.closed_at,
            images: Vec::new(),
        };
        writer.write_record(shared::report::row(&ticket))?;
    }
    writer.flush()?;

    println!("Exported {} ticket(s) to {}", count, file.display());
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateRole { name, all, allow } => {
            check_len("Role name", &name, 100)?;
            let permissions = role_permissions(all, &allow)?;
            let mut conn = establish_connection()?;
            diesel::insert_into(tbl_users_rules::table)
                .values(&NewRole::new(name.trim().to_string(), permissions))
                .execute(&mut conn)?;
            println!("Created role: {}", name.trim());
        }
        Commands::CreateUser {
            name,
            email,
            password,
            company,
            role,
            inactive,
        } => {
            check_len("Name", &name, 100)?;
            check_len("Company", &company, 255)?;
            let email = email.trim().to_lowercase();
            if !email.contains('@') {
                anyhow::bail!("Email address is not valid");
            }
            validate_password(&password).map_err(anyhow::Error::msg)?;

            let mut conn = establish_connection()?;
            let rules_id: i32 = tbl_users_rules::table
                .filter(tbl_users_rules::rules_name.eq(role.trim()))
                .select(tbl_users_rules::id)
                .first(&mut conn)
                .optional()?
                .with_context(|| format!("Role '{}' not found. Create it first.", role))?;

            let hashed = hash_password(&password)
                .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;
            let now = Utc::now().naive_utc();
            let new_user = NewUser {
                name: name.trim().to_string(),
                email: email.clone(),
                password: hashed,
                company: company.trim().to_string(),
                status: if inactive { "inactive" } else { "active" }.to_string(),
                rules_id,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(tbl_users::table)
                .values(&new_user)
                .execute(&mut conn)?;
            println!("Created user: {} <{}> with role '{}'", name.trim(), email, role.trim());
        }
        Commands::ListUsers { json } => {
            let mut conn = establish_connection()?;
            let results: Vec<(i32, String, String, String, String)> = tbl_users::table
                .inner_join(tbl_users_rules::table)
                .order(tbl_users::name.asc())
                .select((
                    tbl_users::id,
                    tbl_users::name,
                    tbl_users::email,
                    tbl_users::status,
                    tbl_users_rules::rules_name,
                ))
                .load(&mut conn)?;

            if json {
                let users: Vec<serde_json::Value> = results
                    .into_iter()
                    .map(|(id, name, email, status, role)| {
                        serde_json::json!({
                            "id": id,
                            "name": name,
                            "email": email,
                            "status": status,
                            "role": role,
                        })
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }

            println!(
                "{:<5} {:<28} {:<32} {:<9} {:<20}",
                "ID", "Name", "Email", "Status", "Role"
            );
            println!("{}", "-".repeat(96));
            for (id, name, email, status, role) in results {
                println!(
                    "{:<5} {:<28} {:<32} {:<9} {:<20}",
                    id, name, email, status, role
                );
            }
        }
        Commands::CreateStation {
            id,
            name,
            station_type,
            province,
        } => {
            let station = station_from_parts(&id, &name, &station_type, &province)?;
            let mut conn = establish_connection()?;
            diesel::insert_into(tbl_station::table)
                .values(&station)
                .execute(&mut conn)?;
            println!("Created station: {} ({})", station.station_name, station.station_id);
        }
        Commands::ImportStations { file, dry_run } => {
            import_stations(file, dry_run)?;
        }
        Commands::ExportTickets { file, month } => {
            export_tickets(file, month)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_flags_from_names() {
        let set = role_permissions(false, &["tickets_list_assign".into(), "TICKETS_EDIT".into()]).unwrap();
        assert!(set.tickets_list_assign && set.tickets_edit);
        assert!(!set.tickets_list);
        assert_eq!(role_permissions(true, &[]).unwrap(), PermissionSet::all());
        assert!(role_permissions(false, &["tickets_view".into()]).is_err());
    }

    #[test]
    fn station_csv_is_validated_as_a_whole() {
        let csv = "station_id,station_name,station_type,province\n\
                   34.101.02, SPBU Menteng ,coco,DKI Jakarta\n\
                   34.402.11,SPBU Dago,DODO,Jawa Barat\n";
        let stations = parse_station_csv(csv).unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].station_name, "SPBU Menteng");
        assert_eq!(stations[0].station_type, "COCO");

        let bad = "station_id,station_name,station_type,province\n\
                   34.101.02,SPBU Menteng,COCO,DKI Jakarta\n\
                   34.101.02,Duplicate,COCO,DKI Jakarta\n\
                   34.999.99,Bad Type,FRANCHISE,Bali\n";
        let err = parse_station_csv(bad).unwrap_err();
        assert!(err.to_string().starts_with("2 validation error"));
    }

    #[test]
    fn months_become_half_open_ranges() {
        let (start, end) = month_range("2026-12").unwrap();
        assert_eq!(start.to_string(), "2026-12-01 00:00:00");
        assert_eq!(end.to_string(), "2027-01-01 00:00:00");
        assert!(month_range("2026-13").is_err());
        assert!(month_range("December").is_err());
    }
}
