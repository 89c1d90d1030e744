// Domain models

mod host;
mod notification;
mod report;
mod user;

pub use host::{AuthorizedHosts, Host, Owner, Permission};
pub use notification::{ErrorStateBody, MailBody, NotificationRequest, Recipients, SummaryBody};
pub use report::{MetricName, MetricsTotals, Report, ReportSummaryRecord, SummaryEntry};
pub use user::{NotificationCategory, User};
