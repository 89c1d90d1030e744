// SQLite-backed users, hosts, reports and notification subscriptions.
// Implements every data collaborator of the dispatcher; the outbox transport lives in `outbox`.

mod outbox;

pub use outbox::OutboxMessage;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use tracing::{debug, instrument};

use crate::models::{
    AuthorizedHosts, Host, MetricName, NotificationCategory, Owner, Permission, Report,
    ReportSummaryRecord, SummaryEntry, User,
};
use crate::ports::{Directory, HostScope, ReportSummarizer};

const HOST_COLUMNS: &str = "id, name, owner_type, owner_id, enabled, last_report";
const USER_COLUMNS: &str = "u.id, u.login, u.mail, u.mail_enabled, u.admin";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    out_of_sync_after: Duration,
}

impl SqliteStore {
    pub async fn connect(
        path: &str,
        max_pool_size: u32,
        out_of_sync_minutes: u32,
    ) -> anyhow::Result<Self> {
        if let Some(parent) = Path::new(path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5))
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_pool_size)
            .connect_with(opts)
            .await?;
        Ok(Self {
            pool,
            out_of_sync_after: Duration::minutes(out_of_sync_minutes as i64),
        })
    }

    pub async fn init(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                login TEXT NOT NULL UNIQUE,
                mail TEXT,
                mail_enabled INTEGER NOT NULL DEFAULT 1,
                admin INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE TABLE IF NOT EXISTS usergroups (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS usergroup_members (usergroup_id INTEGER NOT NULL, user_id INTEGER NOT NULL, PRIMARY KEY (usergroup_id, user_id))",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_mail_notifications (user_id INTEGER NOT NULL, category TEXT NOT NULL, PRIMARY KEY (user_id, category))",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS hosts (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                owner_type TEXT,
                owner_id INTEGER,
                enabled INTEGER NOT NULL DEFAULT 1,
                last_report INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS reports (
                id INTEGER PRIMARY KEY,
                host_id INTEGER NOT NULL,
                reported_at INTEGER NOT NULL,
                failed INTEGER NOT NULL DEFAULT 0,
                restarted INTEGER NOT NULL DEFAULT 0,
                skipped INTEGER NOT NULL DEFAULT 0,
                applied INTEGER NOT NULL DEFAULT 0,
                failed_restarts INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reports_host_reported_at ON reports(host_id, reported_at)",
        )
        .execute(&self.pool)
        .await?;

        outbox::init_outbox_table(&self.pool).await?;

        Ok(())
    }

    pub async fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO users (id, login, mail, mail_enabled, admin) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.login)
        .bind(user.mail.as_deref())
        .bind(user.mail_enabled)
        .bind(user.admin)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_usergroup(&self, id: i64, name: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT INTO usergroups (id, name) VALUES ($1, $2)")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_usergroup_member(&self, usergroup_id: i64, user_id: i64) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO usergroup_members (usergroup_id, user_id) VALUES ($1, $2)",
        )
        .bind(usergroup_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn subscribe(
        &self,
        user_id: i64,
        category: NotificationCategory,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_mail_notifications (user_id, category) VALUES ($1, $2)",
        )
        .bind(user_id)
        .bind(category.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_host(&self, host: &Host) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO hosts (id, name, owner_type, owner_id, enabled, last_report) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(host.id)
        .bind(&host.name)
        .bind(host.owner.map(|o| o.type_name()))
        .bind(host.owner.map(|o| o.id()))
        .bind(host.enabled)
        .bind(host.last_report.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stores a report and moves the host's last_report forward. Absent metrics are stored as 0.
    #[instrument(skip(self, report), fields(repo = "store", operation = "insert_report", report_id = report.id))]
    pub async fn insert_report(&self, report: &Report) -> anyhow::Result<()> {
        let mut values = [0i64; 5];
        for (slot, name) in values.iter_mut().zip(MetricName::ALL) {
            let value = report.metrics.get(name.as_str()).copied().unwrap_or(0);
            *slot = i64::try_from(value).map_err(|_| {
                anyhow::anyhow!("report {} metric {} out of range: {}", report.id, name, value)
            })?;
        }
        let [failed, restarted, skipped, applied, failed_restarts] = values;
        let reported_at = report.reported_at.timestamp_millis();
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO reports (id, host_id, reported_at, failed, restarted, skipped, applied, failed_restarts) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(report.id)
        .bind(report.host_id)
        .bind(reported_at)
        .bind(failed)
        .bind(restarted)
        .bind(skipped)
        .bind(applied)
        .bind(failed_restarts)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE hosts SET last_report = MAX(COALESCE(last_report, 0), $1) WHERE id = $2",
        )
        .bind(reported_at)
        .bind(report.host_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    fn parse_host_row(row: &SqliteRow) -> anyhow::Result<Host> {
        let owner_type: Option<String> = row.try_get("owner_type")?;
        let owner_id: Option<i64> = row.try_get("owner_id")?;
        let last_report: Option<i64> = row.try_get("last_report")?;
        Ok(Host {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            owner: Owner::from_columns(owner_type.as_deref(), owner_id),
            enabled: row.try_get("enabled")?,
            last_report: last_report.and_then(DateTime::from_timestamp_millis),
        })
    }

    fn parse_user_row(row: &SqliteRow) -> anyhow::Result<User> {
        Ok(User {
            id: row.try_get("id")?,
            login: row.try_get("login")?,
            mail: row.try_get("mail")?,
            mail_enabled: row.try_get("mail_enabled")?,
            admin: row.try_get("admin")?,
        })
    }

    fn parse_report_row(row: &SqliteRow) -> anyhow::Result<Report> {
        let reported_at: i64 = row.try_get("reported_at")?;
        Ok(Report {
            id: row.try_get("id")?,
            host_id: row.try_get("host_id")?,
            reported_at: DateTime::from_timestamp_millis(reported_at)
                .ok_or_else(|| anyhow::anyhow!("report reported_at out of range: {}", reported_at))?,
            metrics: Self::parse_metrics(row)?,
        })
    }

    /// Reads the five metric columns (per-report values or SUMs) into a metric map.
    fn parse_metrics(row: &SqliteRow) -> anyhow::Result<BTreeMap<String, u64>> {
        let mut metrics = BTreeMap::new();
        for name in MetricName::ALL {
            let value: i64 = row.try_get(name.as_str())?;
            let value = u64::try_from(value)
                .map_err(|_| anyhow::anyhow!("negative {} metric in database: {}", name, value))?;
            metrics.insert(name.as_str().to_string(), value);
        }
        Ok(metrics)
    }

    fn is_out_of_sync(&self, host: &Host, now: DateTime<Utc>) -> bool {
        host.enabled
            && host
                .last_report
                .is_some_and(|t| t < now - self.out_of_sync_after)
    }
}

impl Directory for SqliteStore {
    #[instrument(skip(self), fields(repo = "store", operation = "find_user"))]
    async fn find_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(&format!("SELECT {} FROM users u WHERE u.id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_user_row).transpose()
    }

    #[instrument(skip(self), fields(repo = "store", operation = "find_report"))]
    async fn find_report(&self, id: i64) -> anyhow::Result<Option<Report>> {
        let row = sqlx::query(
            "SELECT id, host_id, reported_at, failed, restarted, skipped, applied, failed_restarts FROM reports WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(Self::parse_report_row).transpose()
    }

    #[instrument(skip(self), fields(repo = "store", operation = "find_host"))]
    async fn find_host(&self, id: i64) -> anyhow::Result<Option<Host>> {
        let row = sqlx::query(&format!("SELECT {} FROM hosts WHERE id = $1", HOST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::parse_host_row).transpose()
    }

    #[instrument(skip(self), fields(repo = "store", operation = "recipients_for"))]
    async fn recipients_for(
        &self,
        owner: &Owner,
        category: NotificationCategory,
    ) -> anyhow::Result<Vec<String>> {
        let sql = match owner {
            Owner::User(_) => {
                "SELECT u.mail FROM users u
                 JOIN user_mail_notifications n ON n.user_id = u.id
                 WHERE u.id = $1 AND n.category = $2 AND u.mail_enabled = 1"
            }
            Owner::Usergroup(_) => {
                "SELECT u.mail FROM users u
                 JOIN usergroup_members m ON m.user_id = u.id
                 JOIN user_mail_notifications n ON n.user_id = u.id
                 WHERE m.usergroup_id = $1 AND n.category = $2 AND u.mail_enabled = 1"
            }
        };
        let rows = sqlx::query(sql)
            .bind(owner.id())
            .bind(category.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mail: Option<String> = row.try_get("mail")?;
            if let Some(mail) = mail.map(|m| m.trim().to_string()).filter(|m| !m.is_empty()) {
                out.push(mail);
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    #[instrument(skip(self), fields(repo = "store", operation = "subscribers"))]
    async fn subscribers(&self, category: NotificationCategory) -> anyhow::Result<Vec<User>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM users u
             JOIN user_mail_notifications n ON n.user_id = u.id
             WHERE n.category = $1 ORDER BY u.id ASC",
            USER_COLUMNS
        ))
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let user = Self::parse_user_row(&row)?;
            if user.contact_address().is_some() {
                out.push(user);
            }
        }
        Ok(out)
    }
}

impl HostScope for SqliteStore {
    /// Admins see every host; other users see hosts they own directly or through a usergroup.
    #[instrument(skip(self, user), fields(repo = "store", operation = "authorized_hosts", user_id = user.id))]
    async fn authorized_hosts(
        &self,
        user: &User,
        permission: Permission,
    ) -> anyhow::Result<AuthorizedHosts> {
        let rows = if user.admin {
            sqlx::query(&format!("SELECT {} FROM hosts ORDER BY name ASC", HOST_COLUMNS))
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query(&format!(
                "SELECT {} FROM hosts
                 WHERE (owner_type = 'User' AND owner_id = $1)
                    OR (owner_type = 'Usergroup' AND owner_id IN
                        (SELECT usergroup_id FROM usergroup_members WHERE user_id = $2))
                 ORDER BY name ASC",
                HOST_COLUMNS
            ))
            .bind(user.id)
            .bind(user.id)
            .fetch_all(&self.pool)
            .await?
        };

        let mut all = Vec::with_capacity(rows.len());
        for row in rows {
            all.push(Self::parse_host_row(&row)?);
        }
        let now = Utc::now();
        let out_of_sync = all
            .iter()
            .filter(|h| self.is_out_of_sync(h, now))
            .cloned()
            .collect();
        let alerts_disabled = all.iter().filter(|h| !h.enabled).cloned().collect();
        debug!(?permission, hosts = all.len(), "authorized hosts resolved");
        Ok(AuthorizedHosts {
            all,
            out_of_sync,
            alerts_disabled,
        })
    }
}

impl ReportSummarizer for SqliteStore {
    /// One `[Marker(host name), Record]` group per host with any non-zero metric since `since`.
    #[instrument(skip(self, hosts), fields(repo = "store", operation = "summarize", hosts_count = hosts.len()))]
    async fn summarize(
        &self,
        since: DateTime<Utc>,
        hosts: &[Host],
    ) -> anyhow::Result<Vec<SummaryEntry>> {
        let rows = sqlx::query(
            "SELECT host_id,
                    COALESCE(SUM(failed), 0) AS failed,
                    COALESCE(SUM(restarted), 0) AS restarted,
                    COALESCE(SUM(skipped), 0) AS skipped,
                    COALESCE(SUM(applied), 0) AS applied,
                    COALESCE(SUM(failed_restarts), 0) AS failed_restarts
             FROM reports WHERE reported_at >= $1 GROUP BY host_id",
        )
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await?;

        let mut by_host: HashMap<i64, BTreeMap<String, u64>> = HashMap::with_capacity(rows.len());
        for row in rows {
            let host_id: i64 = row.try_get("host_id")?;
            by_host.insert(host_id, Self::parse_metrics(&row)?);
        }

        let mut out = Vec::new();
        for host in hosts {
            let Some(metrics) = by_host.remove(&host.id) else {
                continue;
            };
            if metrics.values().all(|v| *v == 0) {
                continue;
            }
            out.push(SummaryEntry::Group(vec![
                SummaryEntry::Marker(host.name.clone()),
                SummaryEntry::Record(ReportSummaryRecord {
                    host: host.name.clone(),
                    host_id: host.id,
                    metrics,
                }),
            ]));
        }
        Ok(out)
    }
}
