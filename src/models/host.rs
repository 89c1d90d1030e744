// Managed hosts, their owners and the host sets a user is authorized to see

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Owning entity of a host; recipients are resolved against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Owner {
    User(i64),
    Usergroup(i64),
}

impl Owner {
    /// Parse from the `hosts.owner_type` / `hosts.owner_id` column pair.
    pub fn from_columns(owner_type: Option<&str>, owner_id: Option<i64>) -> Option<Self> {
        match (owner_type?, owner_id?) {
            ("User", id) => Some(Owner::User(id)),
            ("Usergroup", id) => Some(Owner::Usergroup(id)),
            (other, id) => {
                warn!(
                    owner_type = %other,
                    owner_id = id,
                    "unknown host owner type; treating host as unowned"
                );
                None
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Owner::User(_) => "User",
            Owner::Usergroup(_) => "Usergroup",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Owner::User(id) | Owner::Usergroup(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Host {
    pub id: i64,
    pub name: String,
    pub owner: Option<Owner>,
    /// Alerts enabled for this host.
    pub enabled: bool,
    pub last_report: Option<DateTime<Utc>>,
}

impl Host {
    /// Human-readable label used in subjects.
    pub fn label(&self) -> &str {
        &self.name
    }
}

/// Capability a host scope is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewHosts,
}

/// Hosts visible to one user, plus the two subsets shown in a summary mail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedHosts {
    pub all: Vec<Host>,
    pub out_of_sync: Vec<Host>,
    pub alerts_disabled: Vec<Host>,
}
