//! Quality roster and role directory
//!
//! The escalation engine never queries user storage directly; it asks an
//! injected [`RoleDirectory`] which usernames hold a given role. The
//! default implementation is a YAML roster file at `.shopqc/roster.yaml`.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// User roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Operator,
    QualityManager,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Operator => write!(f, "operator"),
            Role::QualityManager => write!(f, "quality_manager"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "operator" => Ok(Role::Operator),
            "quality_manager" => Ok(Role::QualityManager),
            "admin" => Ok(Role::Admin),
            _ => Err(format!(
                "Unknown role: {}. Use operator, quality_manager, or admin",
                s
            )),
        }
    }
}

/// Capability interface: who holds a role right now
pub trait RoleDirectory {
    /// Active usernames holding the given role
    fn users_with_role(&self, role: Role) -> Vec<String>;
}

/// The recipients of quality-escalation notifications: quality managers
/// plus admins, deduplicated, order preserved.
pub fn quality_notification_users(directory: &dyn RoleDirectory) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut users = Vec::new();
    for user in directory
        .users_with_role(Role::QualityManager)
        .into_iter()
        .chain(directory.users_with_role(Role::Admin))
    {
        if seen.insert(user.clone()) {
            users.push(user);
        }
    }
    users
}

/// A roster member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterMember {
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl RosterMember {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// YAML-backed roster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QualityRoster {
    #[serde(default)]
    pub members: Vec<RosterMember>,
}

impl QualityRoster {
    /// Load from a roster file; a missing file is an empty roster
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|contents| serde_yml::from_str(&contents).ok())
            .unwrap_or_default()
    }

    /// Save to a roster file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let contents = serde_yml::to_string(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, contents)
    }

    /// Add a member
    pub fn add_member(&mut self, member: RosterMember) {
        self.members.push(member);
    }

    /// Find an active member by username (case-insensitive)
    pub fn find_member(&self, username: &str) -> Option<&RosterMember> {
        self.members
            .iter()
            .find(|m| m.active && m.username.eq_ignore_ascii_case(username))
    }

    /// Default roster.yaml template content
    pub fn default_template() -> &'static str {
        r#"# shopqc roster
# Members and their roles. quality_manager and admin members receive
# escalation notifications (rejected material, supplier errors, ...).

members:
  # - name: "Jane Smith"
  #   username: "jsmith"
  #   email: "jane@example.com"
  #   roles: [quality_manager]
  #   active: true
  []
"#
    }
}

impl RoleDirectory for QualityRoster {
    fn users_with_role(&self, role: Role) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.active && m.has_role(role))
            .map(|m| m.username.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn roster() -> QualityRoster {
        let mut roster = QualityRoster::default();
        roster.add_member(RosterMember {
            name: "Jane Smith".to_string(),
            username: "jsmith".to_string(),
            email: None,
            roles: vec![Role::QualityManager],
            active: true,
        });
        roster.add_member(RosterMember {
            name: "Admin".to_string(),
            username: "admin".to_string(),
            email: None,
            roles: vec![Role::Admin, Role::QualityManager],
            active: true,
        });
        roster.add_member(RosterMember {
            name: "Old QM".to_string(),
            username: "oldqm".to_string(),
            email: None,
            roles: vec![Role::QualityManager],
            active: false,
        });
        roster.add_member(RosterMember {
            name: "Op".to_string(),
            username: "op1".to_string(),
            email: None,
            roles: vec![Role::Operator],
            active: true,
        });
        roster
    }

    #[test]
    fn test_users_with_role_skips_inactive() {
        let roster = roster();
        let qms = roster.users_with_role(Role::QualityManager);
        assert_eq!(qms, vec!["jsmith".to_string(), "admin".to_string()]);
    }

    #[test]
    fn test_quality_notification_users_dedups() {
        let roster = roster();
        // admin holds both roles but appears once
        let users = quality_notification_users(&roster);
        assert_eq!(users, vec!["jsmith".to_string(), "admin".to_string()]);
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("roster.yaml");
        roster().save(&path).unwrap();

        let loaded = QualityRoster::load(&path);
        assert_eq!(loaded.members.len(), 4);
        assert!(loaded.find_member("JSMITH").is_some());
        assert!(loaded.find_member("oldqm").is_none()); // inactive
    }

    #[test]
    fn test_missing_file_is_empty_roster() {
        let roster = QualityRoster::load(Path::new("/nonexistent/roster.yaml"));
        assert!(roster.members.is_empty());
    }
}
