// Folds summarizer output into metric totals.
// Order of entries never matters; a record lacking any metric, or a sum past u64::MAX, is rejected.

use crate::error::DispatchError;
use crate::models::{MetricName, MetricsTotals, ReportSummaryRecord, SummaryEntry};

/// Records at the top level and directly inside a group. Markers and deeper groups are dropped.
pub fn flatten_records(entries: &[SummaryEntry]) -> Vec<&ReportSummaryRecord> {
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            SummaryEntry::Record(r) => out.push(r),
            SummaryEntry::Group(children) => {
                out.extend(children.iter().filter_map(SummaryEntry::as_record))
            }
            SummaryEntry::Marker(_) => {}
        }
    }
    out
}

/// Sums every metric across all records in `entries`.
pub fn accumulate(entries: &[SummaryEntry]) -> Result<MetricsTotals, DispatchError> {
    let mut totals = MetricsTotals::default();
    for record in flatten_records(entries) {
        for name in MetricName::ALL {
            let value = record
                .metric(name)
                .ok_or_else(|| DispatchError::MalformedRecord {
                    host: record.host.clone(),
                    metric: name.as_str().to_string(),
                })?;
            if !totals.add(name, value) {
                return Err(DispatchError::MetricOverflow {
                    host: record.host.clone(),
                    metric: name.as_str().to_string(),
                });
            }
        }
    }
    Ok(totals)
}
