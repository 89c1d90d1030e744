// Outbox spool: composed messages are queued here for an external MTA to pick up.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::SqlitePool;
use tracing::instrument;

use super::SqliteStore;
use crate::models::NotificationRequest;
use crate::ports::MailTransport;

/// A queued message as stored in mail_outbox.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxMessage {
    pub id: i64,
    pub queued_at: DateTime<Utc>,
    pub request: NotificationRequest,
}

pub(super) async fn init_outbox_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mail_outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            queued_at INTEGER NOT NULL,
            recipients TEXT NOT NULL,
            subject TEXT NOT NULL,
            message TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

impl SqliteStore {
    /// Most recently queued messages first.
    pub async fn outbox(&self, limit: u32) -> anyhow::Result<Vec<OutboxMessage>> {
        let rows = sqlx::query(
            "SELECT id, queued_at, message FROM mail_outbox ORDER BY id DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let queued_at: i64 = row.try_get("queued_at")?;
            let message: String = row.try_get("message")?;
            out.push(OutboxMessage {
                id: row.try_get("id")?,
                queued_at: DateTime::from_timestamp_millis(queued_at).ok_or_else(|| {
                    anyhow::anyhow!("outbox queued_at out of range: {}", queued_at)
                })?,
                request: serde_json::from_str(&message)?,
            });
        }
        Ok(out)
    }
}

impl MailTransport for SqliteStore {
    #[instrument(skip(self, request), fields(repo = "store", operation = "send_mail", recipients_count = request.to.len()))]
    async fn send_mail(&self, request: &NotificationRequest) -> anyhow::Result<()> {
        let recipients = request.to.addresses().join(", ");
        let message = serde_json::to_string(request)?;
        sqlx::query(
            "INSERT INTO mail_outbox (queued_at, recipients, subject, message) VALUES ($1, $2, $3, $4)",
        )
        .bind(Utc::now().timestamp_millis())
        .bind(&recipients)
        .bind(&request.subject)
        .bind(&message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
