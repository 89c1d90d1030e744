// Background worker: send the summary mail to every subscribed user.
// Rounds run on a cron schedule (local time) or every interval_secs when no schedule is set.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::dispatcher::Dispatcher;
use crate::models::NotificationCategory;
use crate::ports::{Directory, HostScope, MailTransport, ReportSummarizer, Settings};

/// Config for the summary worker.
#[derive(Debug, Clone)]
pub struct SummaryWorkerConfig {
    /// Optional cron expression (e.g. "0 0 7 * * *" = 07:00 daily). Uses local time.
    pub schedule: Option<String>,
    /// Run a round every N seconds when schedule is not set.
    pub interval_secs: u64,
    /// Each summary covers the last since_hours hours.
    pub since_hours: u32,
}

/// Outcome of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryRound {
    pub sent: u32,
    pub failed: u32,
}

/// Spawns the summary worker. Returns a join handle.
pub fn spawn<D, T, C>(
    dispatcher: Arc<Dispatcher<D, T, C>>,
    config: SummaryWorkerConfig,
) -> tokio::task::JoinHandle<()>
where
    D: Directory + HostScope + ReportSummarizer + 'static,
    T: MailTransport + 'static,
    C: Settings + 'static,
{
    tokio::spawn(async move {
        run(dispatcher, config).await;
    })
}

#[instrument(skip(dispatcher), fields(interval_secs = config.interval_secs))]
async fn run<D, T, C>(dispatcher: Arc<Dispatcher<D, T, C>>, config: SummaryWorkerConfig)
where
    D: Directory + HostScope + ReportSummarizer,
    T: MailTransport,
    C: Settings,
{
    let (tick_tx, mut tick_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(round_scheduler(config.clone(), tick_tx));

    while tick_rx.recv().await.is_some() {
        match run_one_round(&dispatcher, config.since_hours).await {
            Ok(round) => info!(sent = round.sent, failed = round.failed, "summary round complete"),
            Err(e) => warn!(error = %e, "summary round failed"),
        }
    }
}

/// Sends a message on `tx` at each round time (cron or fixed interval). Uses local time for cron.
async fn round_scheduler(config: SummaryWorkerConfig, tx: tokio::sync::mpsc::Sender<()>) {
    if let Some(ref cron_str) = config.schedule {
        let Ok(schedule) = cron::Schedule::from_str(cron_str) else {
            warn!(cron = %cron_str, "invalid summary schedule; summaries will not be sent");
            return;
        };
        loop {
            let now = chrono::Local::now();
            let next = schedule.after(&now).next();
            if let Some(next) = next {
                let delay = (next - now).to_std().unwrap_or(Duration::from_secs(1));
                tokio::time::sleep(delay).await;
                if tx.send(()).await.is_err() {
                    break;
                }
            } else {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    } else {
        let interval = Duration::from_secs(config.interval_secs);
        loop {
            tokio::time::sleep(interval).await;
            if tx.send(()).await.is_err() {
                break;
            }
        }
    }
}

/// Sends one summary per puppet_summary subscriber. A failure for one user is logged and
/// counted; the round carries on. Only the subscriber lookup itself fails the round.
pub async fn run_one_round<D, T, C>(
    dispatcher: &Dispatcher<D, T, C>,
    since_hours: u32,
) -> anyhow::Result<SummaryRound>
where
    D: Directory + HostScope + ReportSummarizer,
    T: MailTransport,
    C: Settings,
{
    let users = dispatcher
        .data()
        .subscribers(NotificationCategory::PuppetSummary)
        .await?;
    let since = Utc::now() - chrono::Duration::hours(since_hours as i64);

    let mut round = SummaryRound::default();
    for user in users {
        match dispatcher.send_summary(user.id, Some(since)).await {
            Ok(_) => round.sent += 1,
            Err(e) => {
                warn!(user_id = user.id, login = %user.login, error = %e, "summary mail failed");
                round.failed += 1;
            }
        }
    }
    Ok(round)
}
