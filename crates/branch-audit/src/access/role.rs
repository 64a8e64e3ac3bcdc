use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Auditor,
    BranchManager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Auditor,
            Self::BranchManager,
            Self::Admin,
            Self::SuperAdmin,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Auditor => "Auditor",
            Self::BranchManager => "Branch Manager",
            Self::Admin => "Admin",
            Self::SuperAdmin => "Super Admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "auditor" => Some(Self::Auditor),
            "branch_manager" | "manager" => Some(Self::BranchManager),
            "admin" => Some(Self::Admin),
            "super_admin" | "superadmin" => Some(Self::SuperAdmin),
            _ => None,
        }
    }

    /// Fill in responses and move an audit through its auditor-side states.
    pub const fn can_conduct_audits(self) -> bool {
        match self {
            Self::Auditor | Self::Admin | Self::SuperAdmin => true,
            Self::BranchManager => false,
        }
    }

    /// Approve or reject submitted audits.
    pub const fn can_review(self) -> bool {
        match self {
            Self::BranchManager | Self::Admin | Self::SuperAdmin => true,
            Self::Auditor => false,
        }
    }

    pub const fn can_schedule_audits(self) -> bool {
        match self {
            Self::BranchManager | Self::Admin | Self::SuperAdmin => true,
            Self::Auditor => false,
        }
    }

    pub const fn can_manage_templates(self) -> bool {
        match self {
            Self::Admin | Self::SuperAdmin => true,
            Self::Auditor | Self::BranchManager => false,
        }
    }

    /// Unscoped by branch: sees and acts on every branch's audits.
    pub const fn spans_all_branches(self) -> bool {
        match self {
            Self::Admin | Self::SuperAdmin => true,
            Self::Auditor | Self::BranchManager => false,
        }
    }

    pub const fn can_view_incidents(self) -> bool {
        match self {
            Self::Admin | Self::SuperAdmin => true,
            Self::Auditor | Self::BranchManager => false,
        }
    }

    pub const fn navigation(self) -> &'static [NavItem] {
        match self {
            Self::Auditor => &[NavItem::Dashboard, NavItem::MyAudits, NavItem::Analytics],
            Self::BranchManager => &[
                NavItem::Dashboard,
                NavItem::ApprovalQueue,
                NavItem::BranchAudits,
                NavItem::Analytics,
            ],
            Self::Admin => &[
                NavItem::Dashboard,
                NavItem::ApprovalQueue,
                NavItem::BranchAudits,
                NavItem::Analytics,
                NavItem::Surveys,
                NavItem::Branches,
                NavItem::Users,
                NavItem::Incidents,
            ],
            Self::SuperAdmin => &[
                NavItem::Dashboard,
                NavItem::ApprovalQueue,
                NavItem::BranchAudits,
                NavItem::Analytics,
                NavItem::Surveys,
                NavItem::Branches,
                NavItem::Users,
                NavItem::Organizations,
                NavItem::Incidents,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavItem {
    Dashboard,
    MyAudits,
    ApprovalQueue,
    BranchAudits,
    Analytics,
    Surveys,
    Branches,
    Users,
    Organizations,
    Incidents,
}

impl NavItem {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::MyAudits => "My Audits",
            Self::ApprovalQueue => "Approval Queue",
            Self::BranchAudits => "Branch Audits",
            Self::Analytics => "Analytics",
            Self::Surveys => "Survey Templates",
            Self::Branches => "Branches & Zones",
            Self::Users => "Users",
            Self::Organizations => "Organizations",
            Self::Incidents => "Error Log",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_spellings() {
        assert_eq!(Role::parse("Branch-Manager"), Some(Role::BranchManager));
        assert_eq!(Role::parse(" superadmin "), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("owner"), None);
    }

    #[test]
    fn only_super_admin_sees_organizations() {
        for role in Role::ordered() {
            let sees = role.navigation().contains(&NavItem::Organizations);
            assert_eq!(sees, role == Role::SuperAdmin, "{role:?}");
        }
    }

    #[test]
    fn managers_review_but_do_not_conduct() {
        assert!(Role::BranchManager.can_review());
        assert!(!Role::BranchManager.can_conduct_audits());
        assert!(!Role::Auditor.can_review());
    }
}
