//! User model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A team member and potential reviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user ID.
    #[serde(rename = "user_id")]
    pub id: String,

    /// Display name.
    pub username: String,

    /// Only active users are reviewer candidates.
    pub is_active: bool,

    /// The one team this user belongs to.
    pub team_name: String,
}

/// Member record supplied when creating a team.
///
/// Carries no team name; the team being created is stamped on insert.
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeamMember {
    pub user_id: String,
    pub username: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewTeamMember {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, is_active: bool) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            is_active,
        }
    }

    /// Stamp the member with its team.
    pub fn into_user(self, team_name: &str) -> User {
        User {
            id: self.user_id,
            username: self.username,
            is_active: self.is_active,
            team_name: team_name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_wire_shape() {
        let user = User {
            id: "u1".into(),
            username: "Alice".into(),
            is_active: true,
            team_name: "backend".into(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["team_name"], "backend");
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_member_defaults_to_active() {
        let member: NewTeamMember =
            serde_json::from_str(r#"{"user_id": "u2", "username": "Bob"}"#).unwrap();
        assert!(member.is_active);

        let user = member.into_user("payments");
        assert_eq!(user.team_name, "payments");
        assert_eq!(user.id, "u2");
    }
}
