// Users and the notification categories they can subscribe to

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub login: String,
    pub mail: Option<String>,
    pub mail_enabled: bool,
    pub admin: bool,
}

impl User {
    /// Address to send to, if the user has mail enabled and a non-blank address.
    pub fn contact_address(&self) -> Option<&str> {
        if !self.mail_enabled {
            return None;
        }
        self.mail
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    PuppetSummary,
    PuppetErrorState,
}

impl NotificationCategory {
    /// Value stored in `user_mail_notifications.category`.
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationCategory::PuppetSummary => "puppet_summary",
            NotificationCategory::PuppetErrorState => "puppet_error_state",
        }
    }
}
