// Reports, per-host report summaries and the entries a summarizer returns

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five Puppet run metrics, in subject-line order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    Failed,
    Restarted,
    Skipped,
    Applied,
    FailedRestarts,
}

impl MetricName {
    pub const ALL: [MetricName; 5] = [
        MetricName::Failed,
        MetricName::Restarted,
        MetricName::Skipped,
        MetricName::Applied,
        MetricName::FailedRestarts,
    ];

    /// Key used in metric maps and as the `reports` column name.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::Failed => "failed",
            MetricName::Restarted => "restarted",
            MetricName::Skipped => "skipped",
            MetricName::Applied => "applied",
            MetricName::FailedRestarts => "failed_restarts",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics of one host over a time window. Ordered by host name, which is the order hosts
/// are listed in a summary mail.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummaryRecord {
    pub host: String,
    pub host_id: i64,
    pub metrics: BTreeMap<String, u64>,
}

impl ReportSummaryRecord {
    pub fn metric(&self, name: MetricName) -> Option<u64> {
        self.metrics.get(name.as_str()).copied()
    }
}

/// One item of a summarizer result. Only `Record`s carry metrics; groups and markers are
/// structure around them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SummaryEntry {
    Record(ReportSummaryRecord),
    Group(Vec<SummaryEntry>),
    Marker(String),
}

impl SummaryEntry {
    pub fn as_record(&self) -> Option<&ReportSummaryRecord> {
        match self {
            SummaryEntry::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// A single configuration-management run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: i64,
    pub host_id: i64,
    pub reported_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, u64>,
}

/// Metric sums over a set of summary records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsTotals {
    pub failed: u64,
    pub restarted: u64,
    pub skipped: u64,
    pub applied: u64,
    pub failed_restarts: u64,
}

impl MetricsTotals {
    pub fn get(&self, name: MetricName) -> u64 {
        match name {
            MetricName::Failed => self.failed,
            MetricName::Restarted => self.restarted,
            MetricName::Skipped => self.skipped,
            MetricName::Applied => self.applied,
            MetricName::FailedRestarts => self.failed_restarts,
        }
    }

    /// Adds `value` to one metric. Returns false, leaving the metric unchanged, on overflow.
    pub fn add(&mut self, name: MetricName, value: u64) -> bool {
        let slot = match name {
            MetricName::Failed => &mut self.failed,
            MetricName::Restarted => &mut self.restarted,
            MetricName::Skipped => &mut self.skipped,
            MetricName::Applied => &mut self.applied,
            MetricName::FailedRestarts => &mut self.failed_restarts,
        };
        match slot.checked_add(value) {
            Some(sum) => {
                *slot = sum;
                true
            }
            None => false,
        }
    }

    /// Sum of all five metrics, saturating at u64::MAX.
    pub fn total(&self) -> u64 {
        MetricName::ALL
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(self.get(*m)))
    }
}
