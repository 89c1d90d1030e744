// Collaborators the dispatcher depends on. SqliteStore implements all of them; tests use fakes.
// Async methods return `impl Future + Send` so a generic dispatcher can run inside spawned tasks.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};

use crate::models::{
    AuthorizedHosts, Host, NotificationCategory, NotificationRequest, Owner, Permission, Report,
    SummaryEntry, User,
};

/// Setting holding the web UI base URL.
pub const BASE_URL_SETTING: &str = "foreman_url";
/// Setting holding the reply-from address.
pub const REPLY_ADDRESS_SETTING: &str = "email_reply_address";

/// Lookups of users, reports, hosts and notification recipients.
pub trait Directory: Send + Sync {
    fn find_user(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<User>>> + Send;

    fn find_report(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<Report>>> + Send;

    fn find_host(&self, id: i64) -> impl Future<Output = anyhow::Result<Option<Host>>> + Send;

    /// Addresses of `owner` (or its members) subscribed to `category`.
    fn recipients_for(
        &self,
        owner: &Owner,
        category: NotificationCategory,
    ) -> impl Future<Output = anyhow::Result<Vec<String>>> + Send;

    /// Contactable users subscribed to `category`.
    fn subscribers(
        &self,
        category: NotificationCategory,
    ) -> impl Future<Output = anyhow::Result<Vec<User>>> + Send;
}

pub trait HostScope: Send + Sync {
    fn authorized_hosts(
        &self,
        user: &User,
        permission: Permission,
    ) -> impl Future<Output = anyhow::Result<AuthorizedHosts>> + Send;
}

pub trait ReportSummarizer: Send + Sync {
    /// Per-host report summaries since `since`. May interleave non-record entries.
    fn summarize(
        &self,
        since: DateTime<Utc>,
        hosts: &[Host],
    ) -> impl Future<Output = anyhow::Result<Vec<SummaryEntry>>> + Send;
}

/// Read-only settings lookup.
pub trait Settings: Send + Sync {
    fn setting(&self, key: &str) -> Option<String>;
}

impl Settings for HashMap<String, String> {
    fn setting(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

pub trait MailTransport: Send + Sync {
    fn send_mail(
        &self,
        request: &NotificationRequest,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}
