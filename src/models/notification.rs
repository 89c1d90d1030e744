// Composed notification: recipients, subject and the view-model handed to templates

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Host, MetricsTotals, Report, ReportSummaryRecord};

/// Addressees of one message. A group always holds at least one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "addresses", rename_all = "snake_case")]
pub enum Recipients {
    Single(String),
    Group(Vec<String>),
}

impl Recipients {
    /// Grouped delivery to every address (sorted, de-duplicated). None when no address is left.
    pub fn group<I>(addresses: I) -> Option<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut list: Vec<String> = addresses
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        list.sort();
        list.dedup();
        if list.is_empty() {
            None
        } else {
            Some(Recipients::Group(list))
        }
    }

    pub fn addresses(&self) -> &[String] {
        match self {
            Recipients::Single(a) => std::slice::from_ref(a),
            Recipients::Group(list) => list,
        }
    }

    pub fn len(&self) -> usize {
        self.addresses().len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses().is_empty()
    }
}

/// Body of the periodic summary mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBody {
    /// Base URL for links back to the web UI.
    pub url: String,
    /// Start of the summarized window.
    pub since: DateTime<Utc>,
    /// Per-host records, sorted by host name.
    pub hosts: Vec<ReportSummaryRecord>,
    pub out_of_sync: Vec<Host>,
    pub disabled: Vec<Host>,
    pub totals: MetricsTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorStateBody {
    pub report: Report,
    pub host: Host,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum MailBody {
    Summary(SummaryBody),
    ErrorState(ErrorStateBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub to: Recipients,
    pub from: Option<String>,
    pub subject: String,
    pub date: Option<DateTime<Utc>>,
    pub body: MailBody,
}
