//! Dashboard controller tests: admin gating before any fetch, degraded data on fetch
//! failure, and metrics dropped when the admin session ends.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::Notify;

use contactdesk::dashboard::{Dashboard, DashboardView, DataSource};
use contactdesk::error::FetchError;
use contactdesk::identity::{AccountStore, LocalIdentityProvider, Role, RoleDirectory, SessionAuthority, SessionManager};
use contactdesk::metrics::{AggregationOptions, ContactRecord, NO_DATA_LABEL};
use contactdesk::store::{parse_rows, MemoryRecordStore, RecordStore};

#[derive(Default)]
struct FlakyStore {
    inner: MemoryRecordStore,
    failing: AtomicBool,
    fetches: AtomicUsize,
    // (entered, release): fetch signals `entered` then waits for `release`
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn fetch_contact_records(&self) -> Result<Vec<ContactRecord>, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(FetchError::Unavailable("connection reset".into()));
        }
        self.inner.fetch_contact_records().await
    }
}

fn sample_records() -> Vec<ContactRecord> {
    let rows = json!([
        {"id": 1, "created_at": "2024-05-13T09:00:00Z", "nombre_cliente": "Ana", "motivo_contacto": "factura", "tipo_requerimiento": "facturación", "nivel_satisfaccion": 9},
        {"id": 2, "created_at": "2024-05-13T11:30:00Z", "nombre_cliente": "Luis", "motivo_contacto": "caída", "tipo_requerimiento": "soporte", "nivel_satisfaccion": 4},
        {"id": 3, "created_at": "2024-05-12T16:00:00Z", "nombre_cliente": "Eva", "motivo_contacto": "factura", "tipo_requerimiento": "facturación", "nivel_satisfaccion": null},
        {"id": 4, "created_at": "2024-05-01T08:00:00Z", "nombre_cliente": "Iker", "motivo_contacto": "alta", "tipo_requerimiento": "ventas", "nivel_satisfaccion": 10}
    ]);
    parse_rows(&rows).unwrap().records
}

fn today() -> NaiveDate { NaiveDate::from_ymd_opt(2024, 5, 13).unwrap() }

struct Fixture {
    authority: SessionAuthority,
    store: Arc<FlakyStore>,
    dashboard: Dashboard,
}

async fn fixture(store: FlakyStore) -> Fixture {
    let accounts = Arc::new(AccountStore::new(false));
    let roles = Arc::new(RoleDirectory::new());
    let admin = accounts.register("admin@example.com", "admin-secret").unwrap();
    roles.grant(&admin.id, Role::Admin);
    accounts.register("agent@example.com", "agent-secret").unwrap();

    let provider = Arc::new(LocalIdentityProvider::new(accounts, Arc::new(SessionManager::default())));
    let authority = SessionAuthority::new(provider, roles);
    authority.resolve().await;
    let store = Arc::new(store);
    let dashboard = Dashboard::new(authority.clone(), store.clone(), AggregationOptions::default());
    Fixture { authority, store, dashboard }
}

fn ready(view: DashboardView) -> Box<contactdesk::dashboard::DashboardReport> {
    match view {
        DashboardView::Ready(report) => report,
        other => panic!("expected ready view, got {:?}", other),
    }
}

#[tokio::test]
async fn anonymous_is_redirected_without_fetching() {
    let f = fixture(FlakyStore::default()).await;
    let view = f.dashboard.load_at(today()).await;
    assert!(matches!(view, DashboardView::RedirectToSignIn { location: "/auth" }));
    assert_eq!(f.store.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn non_admin_sees_access_denied_without_fetching() {
    let f = fixture(FlakyStore::default()).await;
    f.authority.sign_in("agent@example.com", "agent-secret").await.unwrap();
    match f.dashboard.load_at(today()).await {
        DashboardView::AccessDenied { email, offer_sign_out } => {
            assert_eq!(email.as_deref(), Some("agent@example.com"));
            assert!(offer_sign_out);
        }
        other => panic!("unexpected view {:?}", other),
    }
    assert_eq!(f.store.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn admin_gets_fresh_metrics() {
    let store = FlakyStore { inner: MemoryRecordStore::new(sample_records()), ..Default::default() };
    let f = fixture(store).await;
    f.authority.sign_in("admin@example.com", "admin-secret").await.unwrap();

    let report = ready(f.dashboard.load_at(today()).await);
    assert_eq!(report.data, DataSource::Fresh);
    assert_eq!(report.metrics.total_count, 4);
    assert_eq!(report.metrics.today_count, 2);
    assert_eq!(report.metrics.most_frequent_reason, "facturación");
    assert_eq!(report.metrics.unrated_count, 1);
    assert_eq!(report.formatted.top_requirement_types[0].percent, 50);
    let daily: Vec<u64> = report.metrics.daily_series.iter().map(|d| d.count).collect();
    assert_eq!(daily, vec![0, 0, 0, 0, 0, 1, 2]);
    assert!(f.dashboard.has_snapshot());
}

#[tokio::test]
async fn fetch_failures_degrade_to_unavailable_then_stale() {
    let store = FlakyStore { inner: MemoryRecordStore::new(sample_records()), ..Default::default() };
    store.failing.store(true, Ordering::SeqCst);
    let f = fixture(store).await;
    f.authority.sign_in("admin@example.com", "admin-secret").await.unwrap();

    let report = ready(f.dashboard.load_at(today()).await);
    assert!(matches!(report.data, DataSource::Unavailable { .. }));
    assert_eq!(report.metrics.total_count, 0);
    assert_eq!(report.metrics.most_frequent_reason, NO_DATA_LABEL);
    assert_eq!(report.metrics.daily_series.len(), 7);

    f.store.failing.store(false, Ordering::SeqCst);
    let fresh = ready(f.dashboard.load_at(today()).await);
    assert_eq!(fresh.data, DataSource::Fresh);

    f.store.failing.store(true, Ordering::SeqCst);
    let stale = ready(f.dashboard.load_at(today()).await);
    match &stale.data {
        DataSource::Stale { error } => assert!(error.contains("connection reset")),
        other => panic!("expected stale data, got {:?}", other),
    }
    assert_eq!(stale.metrics, fresh.metrics);
}

#[tokio::test]
async fn sign_out_drops_cached_metrics() {
    let store = FlakyStore { inner: MemoryRecordStore::new(sample_records()), ..Default::default() };
    let f = fixture(store).await;
    f.authority.sign_in("admin@example.com", "admin-secret").await.unwrap();
    ready(f.dashboard.load_at(today()).await);
    assert!(f.dashboard.has_snapshot());

    // a recheck passes through Resolving and keeps the snapshot
    f.authority.recheck().await;
    assert!(f.dashboard.has_snapshot());

    f.authority.sign_out().await.unwrap();
    assert!(!f.dashboard.has_snapshot());
    assert!(matches!(f.dashboard.load_at(today()).await, DashboardView::RedirectToSignIn { .. }));
}

#[tokio::test]
async fn session_ending_mid_fetch_discards_the_result() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let store = FlakyStore {
        inner: MemoryRecordStore::new(sample_records()),
        gate: Some((entered.clone(), release.clone())),
        ..Default::default()
    };
    let f = Arc::new(fixture(store).await);
    f.authority.sign_in("admin@example.com", "admin-secret").await.unwrap();

    let task = {
        let f = f.clone();
        tokio::spawn(async move { f.dashboard.load_at(today()).await })
    };
    entered.notified().await;
    f.authority.sign_out().await.unwrap();
    release.notify_one();

    let view = task.await.unwrap();
    assert!(matches!(view, DashboardView::RedirectToSignIn { .. }));
    assert!(!f.dashboard.has_snapshot());
}

#[tokio::test]
async fn expired_provider_session_is_redirected_without_fetching() {
    let accounts = Arc::new(AccountStore::new(false));
    let roles = Arc::new(RoleDirectory::new());
    let admin = accounts.register("admin@example.com", "admin-secret").unwrap();
    roles.grant(&admin.id, Role::Admin);
    let sessions = Arc::new(SessionManager::with_ttl(std::time::Duration::from_millis(1)));
    let authority = SessionAuthority::new(Arc::new(LocalIdentityProvider::new(accounts, sessions)), roles);
    authority.resolve().await;
    let store = Arc::new(FlakyStore { inner: MemoryRecordStore::new(sample_records()), ..Default::default() });
    let dashboard = Dashboard::new(authority.clone(), store.clone(), AggregationOptions::default());

    authority.sign_in("admin@example.com", "admin-secret").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    assert!(matches!(dashboard.load_at(today()).await, DashboardView::RedirectToSignIn { .. }));
    assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
}
