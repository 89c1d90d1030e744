// Subject lines and the summary mail view-model

use chrono::{DateTime, Duration, Utc};

use crate::metrics::flatten_records;
use crate::models::{AuthorizedHosts, MetricsTotals, ReportSummaryRecord, SummaryBody, SummaryEntry};

/// Summary subject. Labels and order (F R S A FR T) are read by mail filters; keep them stable.
pub fn format_summary(totals: &MetricsTotals, total: u64) -> String {
    format!(
        "Puppet Summary Report - F:{} R:{} S:{} A:{} FR:{} T:{}",
        totals.failed,
        totals.restarted,
        totals.skipped,
        totals.applied,
        totals.failed_restarts,
        total
    )
}

pub fn format_error_subject(host_label: &str) -> String {
    format!("Puppet error on {}", host_label)
}

/// Window start used when none is requested: one day before `now`.
pub fn default_since(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(1)
}

/// Builds the summary body. The out-of-sync and disabled subsets are carried as given.
pub fn build_summary_body(
    entries: &[SummaryEntry],
    since: DateTime<Utc>,
    hosts: AuthorizedHosts,
    url: String,
    totals: MetricsTotals,
) -> SummaryBody {
    let mut records: Vec<ReportSummaryRecord> =
        flatten_records(entries).into_iter().cloned().collect();
    records.sort();
    SummaryBody {
        url,
        since,
        hosts: records,
        out_of_sync: hosts.out_of_sync,
        disabled: hosts.alerts_disabled,
        totals,
    }
}
