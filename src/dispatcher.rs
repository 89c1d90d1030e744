// Summary and error-state notifications: validate -> compose -> send.
// Either composition succeeds and exactly one send is attempted, or nothing is sent.

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::error::DispatchError;
use crate::metrics::accumulate;
use crate::models::{
    ErrorStateBody, MailBody, NotificationCategory, NotificationRequest, Permission, Recipients,
};
use crate::ports::{
    BASE_URL_SETTING, Directory, HostScope, MailTransport, REPLY_ADDRESS_SETTING,
    ReportSummarizer, Settings,
};
use crate::summary::{build_summary_body, default_since, format_error_subject, format_summary};

const NO_VALID_USER: &str = "Must specify a valid user with email enabled";
const NO_RECIPIENTS: &str = "unable to find recipients";

/// Composes notifications from `data` and hands them to `transport`.
pub struct Dispatcher<D, T, C> {
    data: D,
    transport: T,
    settings: C,
}

impl<D, T, C> Dispatcher<D, T, C>
where
    D: Directory + HostScope + ReportSummarizer,
    T: MailTransport,
    C: Settings,
{
    pub fn new(data: D, transport: T, settings: C) -> Self {
        Self {
            data,
            transport,
            settings,
        }
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends the summary of every host `user_id` may view, over the window starting at
    /// `since` (one day ago when None). Returns the request handed to the transport.
    #[instrument(skip(self), fields(operation = "send_summary"))]
    pub async fn send_summary(
        &self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> Result<NotificationRequest, DispatchError> {
        let user = self
            .data
            .find_user(user_id)
            .await
            .map_err(DispatchError::collaborator("find_user"))?;
        let Some((user, address)) = user.and_then(|u| {
            let address = u.contact_address()?.to_string();
            Some((u, address))
        }) else {
            return Err(DispatchError::RecipientNotFound(NO_VALID_USER.into()));
        };
        let url = self.required_setting(BASE_URL_SETTING)?;

        let since = since.unwrap_or_else(|| default_since(Utc::now()));
        let hosts = self
            .data
            .authorized_hosts(&user, Permission::ViewHosts)
            .await
            .map_err(DispatchError::collaborator("authorized_hosts"))?;
        let entries = self
            .data
            .summarize(since, &hosts.all)
            .await
            .map_err(DispatchError::collaborator("summarize"))?;
        let totals = accumulate(&entries)?;
        let subject = format_summary(&totals, totals.total());
        debug!(
            hosts = hosts.all.len(),
            entries = entries.len(),
            total = totals.total(),
            "summary composed"
        );
        let body = build_summary_body(&entries, since, hosts, url, totals);

        self.deliver(NotificationRequest {
            to: Recipients::Single(address),
            from: self.optional_setting(REPLY_ADDRESS_SETTING),
            subject,
            date: Some(Utc::now()),
            body: MailBody::Summary(body),
        })
        .await
    }

    /// Alerts the owners of the host behind `report_id`, as one grouped message.
    #[instrument(skip(self), fields(operation = "send_error_state"))]
    pub async fn send_error_state(
        &self,
        report_id: i64,
    ) -> Result<NotificationRequest, DispatchError> {
        let report = self
            .data
            .find_report(report_id)
            .await
            .map_err(DispatchError::collaborator("find_report"))?
            .ok_or(DispatchError::NotFound {
                kind: "report",
                id: report_id,
            })?;
        let host = self
            .data
            .find_host(report.host_id)
            .await
            .map_err(DispatchError::collaborator("find_host"))?
            .ok_or(DispatchError::NotFound {
                kind: "host",
                id: report.host_id,
            })?;

        let owners = match &host.owner {
            Some(owner) => self
                .data
                .recipients_for(owner, NotificationCategory::PuppetErrorState)
                .await
                .map_err(DispatchError::collaborator("recipients_for"))?,
            None => Vec::new(),
        };
        let to = Recipients::group(owners)
            .ok_or_else(|| DispatchError::RecipientNotFound(NO_RECIPIENTS.into()))?;

        let subject = format_error_subject(host.label());
        self.deliver(NotificationRequest {
            to,
            from: self.optional_setting(REPLY_ADDRESS_SETTING),
            subject,
            date: Some(Utc::now()),
            body: MailBody::ErrorState(ErrorStateBody { report, host }),
        })
        .await
    }

    async fn deliver(
        &self,
        request: NotificationRequest,
    ) -> Result<NotificationRequest, DispatchError> {
        self.transport
            .send_mail(&request)
            .await
            .map_err(DispatchError::Delivery)?;
        info!(
            recipients = request.to.len(),
            subject = %request.subject,
            "notification sent"
        );
        Ok(request)
    }

    fn optional_setting(&self, key: &str) -> Option<String> {
        self.settings
            .setting(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required_setting(&self, key: &str) -> Result<String, DispatchError> {
        self.optional_setting(key)
            .ok_or_else(|| DispatchError::ConfigurationMissing { key: key.into() })
    }
}
