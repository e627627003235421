use serde::{Deserialize, Serialize};

/// One boolean flag of a role, by resource category and action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    UsersAdd,
    UsersEdit,
    UsersDelete,
    UsersList,
    TicketsAdd,
    TicketsEdit,
    TicketsDelete,
    TicketsList,
    TicketsListAssign,
    StationsAdd,
    StationsEdit,
    StationsDelete,
    StationsList,
    RulesAdd,
    RulesEdit,
    RulesDelete,
    RulesList,
}

impl Permission {
    pub const ALL: [Permission; 17] = [
        Permission::UsersAdd,
        Permission::UsersEdit,
        Permission::UsersDelete,
        Permission::UsersList,
        Permission::TicketsAdd,
        Permission::TicketsEdit,
        Permission::TicketsDelete,
        Permission::TicketsList,
        Permission::TicketsListAssign,
        Permission::StationsAdd,
        Permission::StationsEdit,
        Permission::StationsDelete,
        Permission::StationsList,
        Permission::RulesAdd,
        Permission::RulesEdit,
        Permission::RulesDelete,
        Permission::RulesList,
    ];

    pub fn parse(s: &str) -> Option<Permission> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::UsersAdd => "users_add",
            Permission::UsersEdit => "users_edit",
            Permission::UsersDelete => "users_delete",
            Permission::UsersList => "users_list",
            Permission::TicketsAdd => "tickets_add",
            Permission::TicketsEdit => "tickets_edit",
            Permission::TicketsDelete => "tickets_delete",
            Permission::TicketsList => "tickets_list",
            Permission::TicketsListAssign => "tickets_list_assign",
            Permission::StationsAdd => "stations_add",
            Permission::StationsEdit => "stations_edit",
            Permission::StationsDelete => "stations_delete",
            Permission::StationsList => "stations_list",
            Permission::RulesAdd => "rules_add",
            Permission::RulesEdit => "rules_edit",
            Permission::RulesDelete => "rules_delete",
            Permission::RulesList => "rules_list",
        }
    }
}

/// The permission matrix stored on each role row. Missing flags deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSet {
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

impl PermissionSet {
    pub fn all() -> Self {
        Self {
            users_add: true,
            users_edit: true,
            users_delete: true,
            users_list: true,
            tickets_add: true,
            tickets_edit: true,
            tickets_delete: true,
            tickets_list: true,
            tickets_list_assign: true,
            stations_add: true,
            stations_edit: true,
            stations_delete: true,
            stations_list: true,
            rules_add: true,
            rules_edit: true,
            rules_delete: true,
            rules_list: true,
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::UsersAdd => self.users_add,
            Permission::UsersEdit => self.users_edit,
            Permission::UsersDelete => self.users_delete,
            Permission::UsersList => self.users_list,
            Permission::TicketsAdd => self.tickets_add,
            Permission::TicketsEdit => self.tickets_edit,
            Permission::TicketsDelete => self.tickets_delete,
            Permission::TicketsList => self.tickets_list,
            Permission::TicketsListAssign => self.tickets_list_assign,
            Permission::StationsAdd => self.stations_add,
            Permission::StationsEdit => self.stations_edit,
            Permission::StationsDelete => self.stations_delete,
            Permission::StationsList => self.stations_list,
            Permission::RulesAdd => self.rules_add,
            Permission::RulesEdit => self.rules_edit,
            Permission::RulesDelete => self.rules_delete,
            Permission::RulesList => self.rules_list,
        }
    }

    pub fn grant(&mut self, permission: Permission) {
        let flag = match permission {
            Permission::UsersAdd => &mut self.users_add,
            Permission::UsersEdit => &mut self.users_edit,
            Permission::UsersDelete => &mut self.users_delete,
            Permission::UsersList => &mut self.users_list,
            Permission::TicketsAdd => &mut self.tickets_add,
            Permission::TicketsEdit => &mut self.tickets_edit,
            Permission::TicketsDelete => &mut self.tickets_delete,
            Permission::TicketsList => &mut self.tickets_list,
            Permission::TicketsListAssign => &mut self.tickets_list_assign,
            Permission::StationsAdd => &mut self.stations_add,
            Permission::StationsEdit => &mut self.stations_edit,
            Permission::StationsDelete => &mut self.stations_delete,
            Permission::StationsList => &mut self.stations_list,
            Permission::RulesAdd => &mut self.rules_add,
            Permission::RulesEdit => &mut self.rules_edit,
            Permission::RulesDelete => &mut self.rules_delete,
            Permission::RulesList => &mut self.rules_list,
        };
        *flag = true;
    }

    /// Whether the holder may see tickets at all, and if so whether only their own.
    pub fn ticket_scope(&self) -> Option<TicketScope> {
        if self.tickets_list {
            Some(TicketScope::All)
        } else if self.tickets_list_assign {
            Some(TicketScope::AssignedOnly)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketScope {
    All,
    AssignedOnly,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_flags_default_to_false() {
        let set: PermissionSet =
            serde_json::from_str(r#"{"tickets_add": true, "tickets_list_assign": true}"#).unwrap();
        assert!(set.allows(Permission::TicketsAdd));
        assert!(set.allows(Permission::TicketsListAssign));
        assert!(!set.allows(Permission::TicketsDelete));
        assert!(!set.allows(Permission::RulesList));
    }

    #[test]
    fn ticket_scope_prefers_full_listing() {
        let mut set = PermissionSet::default();
        assert_eq!(set.ticket_scope(), None);

        set.tickets_list_assign = true;
        assert_eq!(set.ticket_scope(), Some(TicketScope::AssignedOnly));

        set.tickets_list = true;
        assert_eq!(set.ticket_scope(), Some(TicketScope::All));
    }

    #[test]
    fn all_grants_everything() {
        let set = PermissionSet::all();
        for p in Permission::ALL {
            assert!(set.allows(p), "{} should be granted", p.as_str());
        }
    }

    #[test]
    fn names_parse_back_and_grant_one_flag() {
        assert_eq!(Permission::parse(" Tickets_List_Assign"), Some(Permission::TicketsListAssign));
        assert_eq!(Permission::parse("tickets_view"), None);

        let mut set = PermissionSet::default();
        set.grant(Permission::StationsEdit);
        for p in Permission::ALL {
            assert_eq!(set.allows(p), p == Permission::StationsEdit);
        }
    }
}
