// Shared test helpers: in-memory collaborators and a recording transport

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use hostmailer::dispatcher::Dispatcher;
use hostmailer::models::*;
use hostmailer::ports::*;

pub fn record(host: &str, host_id: i64, values: [u64; 5]) -> ReportSummaryRecord {
    let metrics = MetricName::ALL
        .iter()
        .zip(values)
        .map(|(m, v)| (m.as_str().to_string(), v))
        .collect();
    ReportSummaryRecord {
        host: host.into(),
        host_id,
        metrics,
    }
}

pub fn host(id: i64, name: &str, owner: Option<Owner>) -> Host {
    Host {
        id,
        name: name.into(),
        owner,
        enabled: true,
        last_report: None,
    }
}

pub fn user(id: i64, login: &str, mail: Option<&str>) -> User {
    User {
        id,
        login: login.into(),
        mail: mail.map(String::from),
        mail_enabled: true,
        admin: false,
    }
}

pub fn report(id: i64, host_id: i64, reported_at: DateTime<Utc>, values: [u64; 5]) -> Report {
    let metrics: BTreeMap<String, u64> = MetricName::ALL
        .iter()
        .zip(values)
        .map(|(m, v)| (m.as_str().to_string(), v))
        .collect();
    Report {
        id,
        host_id,
        reported_at,
        metrics,
    }
}

pub fn settings(base_url: Option<&str>, reply: Option<&str>) -> HashMap<String, String> {
    let mut s = HashMap::new();
    if let Some(url) = base_url {
        s.insert(BASE_URL_SETTING.to_string(), url.to_string());
    }
    if let Some(reply) = reply {
        s.insert(REPLY_ADDRESS_SETTING.to_string(), reply.to_string());
    }
    s
}

/// In-memory users, hosts, reports and recipients.
#[derive(Default)]
pub struct FakeData {
    pub users: HashMap<i64, User>,
    pub hosts: HashMap<i64, Host>,
    pub reports: HashMap<i64, Report>,
    pub recipients: HashMap<Owner, Vec<String>>,
    pub subscribers: Vec<User>,
    pub authorized: AuthorizedHosts,
    pub entries: Vec<SummaryEntry>,
    /// Hosts passed to the last summarize call.
    pub summarized_hosts: Mutex<Vec<Host>>,
}

impl Directory for FakeData {
    async fn find_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }

    async fn find_report(&self, id: i64) -> anyhow::Result<Option<Report>> {
        Ok(self.reports.get(&id).cloned())
    }

    async fn find_host(&self, id: i64) -> anyhow::Result<Option<Host>> {
        Ok(self.hosts.get(&id).cloned())
    }

    async fn recipients_for(
        &self,
        owner: &Owner,
        category: NotificationCategory,
    ) -> anyhow::Result<Vec<String>> {
        if category != NotificationCategory::PuppetErrorState {
            return Ok(Vec::new());
        }
        Ok(self.recipients.get(owner).cloned().unwrap_or_default())
    }

    async fn subscribers(&self, _category: NotificationCategory) -> anyhow::Result<Vec<User>> {
        Ok(self.subscribers.clone())
    }
}

impl HostScope for FakeData {
    async fn authorized_hosts(
        &self,
        _user: &User,
        _permission: Permission,
    ) -> anyhow::Result<AuthorizedHosts> {
        Ok(self.authorized.clone())
    }
}

impl ReportSummarizer for FakeData {
    async fn summarize(
        &self,
        _since: DateTime<Utc>,
        hosts: &[Host],
    ) -> anyhow::Result<Vec<SummaryEntry>> {
        *self.summarized_hosts.lock().unwrap() = hosts.to_vec();
        Ok(self.entries.clone())
    }
}

/// Transport that records every request; optionally fails every send.
#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<NotificationRequest>>,
    pub fail: bool,
}

impl RecordingTransport {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<NotificationRequest> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailTransport for RecordingTransport {
    async fn send_mail(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        if self.fail {
            anyhow::bail!("smtp relay refused connection");
        }
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}

pub type FakeDispatcher = Dispatcher<FakeData, RecordingTransport, HashMap<String, String>>;

pub fn dispatcher(data: FakeData, settings: HashMap<String, String>) -> FakeDispatcher {
    Dispatcher::new(data, RecordingTransport::default(), settings)
}
