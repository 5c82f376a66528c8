//! Team model.

use crate::models::User;
use serde::Serialize;

/// A team and its current member list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Team {
    /// Unique team name; teams have no surrogate id.
    #[serde(rename = "team_name")]
    pub name: String,

    pub members: Vec<User>,
}

impl Team {
    /// IDs of members whose activity flag is set.
    pub fn active_member_ids(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|m| m.is_active)
            .map(|m| m.id.as_str())
            .collect()
    }
}
