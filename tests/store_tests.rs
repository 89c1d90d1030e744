// SqliteStore tests: connect, init, host scope, summarize, recipients, outbox

mod common;

use chrono::{Duration, Utc};
use common::{host, report, user};
use hostmailer::metrics::accumulate;
use hostmailer::models::*;
use hostmailer::ports::{Directory, HostScope, MailTransport, ReportSummarizer};
use hostmailer::store::SqliteStore;
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> SqliteStore {
    let path = dir.path().join("hostmailer.db");
    let store = SqliteStore::connect(path.to_str().unwrap(), 2, 30)
        .await
        .unwrap();
    store.init().await.unwrap();
    store
}

/// alice owns web01 directly; ops (alice + bob) owns db01; nobody owns orphan01.
async fn seeded_store(dir: &TempDir) -> SqliteStore {
    let store = open_store(dir).await;
    store
        .insert_user(&user(1, "alice", Some("alice@example.com")))
        .await
        .unwrap();
    store
        .insert_user(&user(2, "bob", Some("bob@example.com")))
        .await
        .unwrap();
    let mut admin = user(3, "admin", Some("root@example.com"));
    admin.admin = true;
    store.insert_user(&admin).await.unwrap();
    let mut muted = user(4, "carol", Some("carol@example.com"));
    muted.mail_enabled = false;
    store.insert_user(&muted).await.unwrap();

    store.insert_usergroup(7, "ops").await.unwrap();
    for member in [1, 2, 4] {
        store.add_usergroup_member(7, member).await.unwrap();
    }

    store
        .insert_host(&host(10, "web01", Some(Owner::User(1))))
        .await
        .unwrap();
    store
        .insert_host(&host(11, "db01", Some(Owner::Usergroup(7))))
        .await
        .unwrap();
    let mut orphan = host(12, "orphan01", None);
    orphan.enabled = false;
    store.insert_host(&orphan).await.unwrap();
    store
}

#[tokio::test]
async fn store_connect_and_init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    store.init().await.unwrap();
    assert!(store.find_user(1).await.unwrap().is_none());
}

#[tokio::test]
async fn store_connect_creates_parent_directory() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested/deeper/hostmailer.db");
    let store = SqliteStore::connect(path.to_str().unwrap(), 1, 30)
        .await
        .unwrap();
    store.init().await.unwrap();
    assert!(path.exists());
}

#[tokio::test]
async fn store_find_user_host_and_report() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let reported_at = Utc::now() - Duration::minutes(5);
    store
        .insert_report(&report(100, 10, reported_at, [1, 2, 3, 4, 5]))
        .await
        .unwrap();

    let alice = store.find_user(1).await.unwrap().unwrap();
    assert_eq!(alice.login, "alice");
    assert_eq!(alice.contact_address(), Some("alice@example.com"));

    let r = store.find_report(100).await.unwrap().unwrap();
    assert_eq!(r.host_id, 10);
    assert_eq!(r.metrics.get("failed_restarts"), Some(&5));
    assert_eq!(
        r.reported_at.timestamp_millis(),
        reported_at.timestamp_millis()
    );

    let web = store.find_host(10).await.unwrap().unwrap();
    assert_eq!(web.owner, Some(Owner::User(1)));
    assert_eq!(
        web.last_report.map(|t| t.timestamp_millis()),
        Some(reported_at.timestamp_millis())
    );
    assert!(store.find_report(101).await.unwrap().is_none());
}

#[tokio::test]
async fn store_authorized_hosts_by_ownership() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;

    let alice = store.find_user(1).await.unwrap().unwrap();
    let scope = store
        .authorized_hosts(&alice, Permission::ViewHosts)
        .await
        .unwrap();
    let names: Vec<&str> = scope.all.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["db01", "web01"]);

    let bob = store.find_user(2).await.unwrap().unwrap();
    let scope = store
        .authorized_hosts(&bob, Permission::ViewHosts)
        .await
        .unwrap();
    let names: Vec<&str> = scope.all.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, vec!["db01"]);

    let admin = store.find_user(3).await.unwrap().unwrap();
    let scope = store
        .authorized_hosts(&admin, Permission::ViewHosts)
        .await
        .unwrap();
    assert_eq!(scope.all.len(), 3);
    let disabled: Vec<&str> = scope
        .alerts_disabled
        .iter()
        .map(|h| h.name.as_str())
        .collect();
    assert_eq!(disabled, vec!["orphan01"]);
}

#[tokio::test]
async fn store_out_of_sync_needs_an_old_report_and_alerts_enabled() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let now = Utc::now();
    store
        .insert_report(&report(1, 10, now - Duration::hours(2), [0, 0, 0, 1, 0]))
        .await
        .unwrap();
    store
        .insert_report(&report(2, 11, now - Duration::minutes(1), [0, 0, 0, 1, 0]))
        .await
        .unwrap();
    store
        .insert_report(&report(3, 12, now - Duration::hours(5), [0, 0, 0, 1, 0]))
        .await
        .unwrap();

    let admin = store.find_user(3).await.unwrap().unwrap();
    let scope = store
        .authorized_hosts(&admin, Permission::ViewHosts)
        .await
        .unwrap();
    let stale: Vec<&str> = scope.out_of_sync.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(stale, vec!["web01"]);
}

#[tokio::test]
async fn store_summarize_sums_window_and_skips_quiet_hosts() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let now = Utc::now();
    let since = now - Duration::days(1);
    store
        .insert_report(&report(1, 10, now - Duration::hours(1), [1, 0, 2, 3, 0]))
        .await
        .unwrap();
    store
        .insert_report(&report(2, 10, now - Duration::hours(3), [1, 1, 0, 0, 1]))
        .await
        .unwrap();
    // outside the window
    store
        .insert_report(&report(3, 10, now - Duration::days(3), [50, 50, 50, 50, 50]))
        .await
        .unwrap();
    // in the window but all zero
    store
        .insert_report(&report(4, 11, now - Duration::hours(2), [0, 0, 0, 0, 0]))
        .await
        .unwrap();

    let hosts = vec![
        host(10, "web01", Some(Owner::User(1))),
        host(11, "db01", Some(Owner::Usergroup(7))),
        host(12, "orphan01", None),
    ];
    let entries = store.summarize(since, &hosts).await.unwrap();
    assert_eq!(entries.len(), 1);
    let SummaryEntry::Group(ref children) = entries[0] else {
        panic!("expected a host group");
    };
    assert_eq!(children[0], SummaryEntry::Marker("web01".into()));

    let totals = accumulate(&entries).unwrap();
    assert_eq!(
        totals,
        MetricsTotals {
            failed: 2,
            restarted: 1,
            skipped: 2,
            applied: 3,
            failed_restarts: 1,
        }
    );

    // hosts outside the requested set are never summarized
    let only_db = store.summarize(since, &hosts[1..]).await.unwrap();
    assert!(only_db.is_empty());
}

#[tokio::test]
async fn store_recipients_for_user_and_usergroup() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    for id in [1, 2, 4] {
        store
            .subscribe(id, NotificationCategory::PuppetErrorState)
            .await
            .unwrap();
    }

    let group = store
        .recipients_for(&Owner::Usergroup(7), NotificationCategory::PuppetErrorState)
        .await
        .unwrap();
    assert_eq!(group, vec!["alice@example.com", "bob@example.com"]);

    let single = store
        .recipients_for(&Owner::User(1), NotificationCategory::PuppetErrorState)
        .await
        .unwrap();
    assert_eq!(single, vec!["alice@example.com"]);

    let unsubscribed = store
        .recipients_for(&Owner::User(1), NotificationCategory::PuppetSummary)
        .await
        .unwrap();
    assert!(unsubscribed.is_empty());

    let muted = store
        .recipients_for(&Owner::User(4), NotificationCategory::PuppetErrorState)
        .await
        .unwrap();
    assert!(muted.is_empty());
}

#[tokio::test]
async fn store_subscribers_skips_uncontactable_users() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    store.insert_user(&user(5, "nomail", None)).await.unwrap();
    for id in [2, 1, 4, 5] {
        store
            .subscribe(id, NotificationCategory::PuppetSummary)
            .await
            .unwrap();
    }
    let ids: Vec<i64> = store
        .subscribers(NotificationCategory::PuppetSummary)
        .await
        .unwrap()
        .iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn store_send_mail_queues_in_outbox() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;
    let h = host(10, "web01", None);
    let request = NotificationRequest {
        to: Recipients::group(vec!["b@example.com".into(), "a@example.com".into()]).unwrap(),
        from: Some("foreman@example.com".into()),
        subject: "Puppet error on web01".into(),
        date: Some(Utc::now()),
        body: MailBody::ErrorState(ErrorStateBody {
            report: report(1, 10, Utc::now(), [1, 0, 0, 0, 0]),
            host: h,
        }),
    };
    store.send_mail(&request).await.unwrap();
    let mut second = request.clone();
    second.subject = "second".into();
    store.send_mail(&second).await.unwrap();

    let queued = store.outbox(10).await.unwrap();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].request.subject, "second");
    assert_eq!(queued[1].request, request);
    assert_eq!(store.outbox(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn store_insert_report_rejects_metric_beyond_i64() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let err = store
        .insert_report(&report(100, 10, Utc::now(), [u64::MAX, 0, 0, 0, 0]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("out of range"));
    assert!(store.find_report(100).await.unwrap().is_none());
    assert!(store.find_host(10).await.unwrap().unwrap().last_report.is_none());
}

#[tokio::test]
async fn store_negative_metric_column_is_an_error_not_zero() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    store
        .insert_report(&report(100, 10, Utc::now(), [3, 0, 0, 0, 0]))
        .await
        .unwrap();

    let path = dir.path().join("hostmailer.db");
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", path.to_str().unwrap()))
        .await
        .unwrap();
    sqlx::query("UPDATE reports SET failed = -5 WHERE id = 100")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let err = store.find_report(100).await.unwrap_err();
    assert!(err.to_string().contains("negative failed metric"));
}

#[tokio::test]
async fn store_unknown_owner_type_reads_as_unowned() {
    let dir = TempDir::new().unwrap();
    let store = seeded_store(&dir).await;
    let path = dir.path().join("hostmailer.db");
    let pool = sqlx::SqlitePool::connect(&format!("sqlite:{}", path.to_str().unwrap()))
        .await
        .unwrap();
    sqlx::query("UPDATE hosts SET owner_type = 'Team' WHERE id = 10")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let web = store.find_host(10).await.unwrap().unwrap();
    assert_eq!(web.owner, None);
}
