//! User model for storage and access checks.

use serde::{Deserialize, Serialize};

/// Marketplace user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User ID (also used as document ID)
    pub id: u64,
    pub email: Option<String>,
    pub display_name: String,
    /// Permission rules in "App:Action" form, e.g. "Apps:Review" or "*:*"
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserProfile {
    /// Check a permission rule, honouring "*" wildcards on either side.
    pub fn action_allowed(&self, app: &str, action: &str) -> bool {
        self.groups.iter().any(|rule| {
            rule.split(',').any(|part| {
                let Some((rule_app, rule_action)) = part.trim().split_once(':') else {
                    return false;
                };
                (rule_app == "*" || rule_app == app) && (rule_action == "*" || rule_action == action)
            })
        })
    }
}
