//! Dashboard controller: gates on the session authority, fetches a records snapshot only for
//! admins, and aggregates it. A failed fetch keeps the previous metrics on screen (flagged
//! stale) or falls back to the zeroed view on first load.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::identity::guard::{dashboard_gate, DashboardGate};
use crate::identity::{AuthState, SessionAuthority, Subscription};
use crate::metrics::{compute_metrics_with, format_metrics, AggregationOptions, DerivedMetrics, FormattedMetrics};
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource {
    Fresh,
    /// Fetch failed; metrics are from the last successful fetch.
    Stale { error: String },
    /// Fetch failed and nothing was fetched before; metrics are the empty aggregate.
    Unavailable { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardReport {
    pub metrics: DerivedMetrics,
    pub formatted: FormattedMetrics,
    pub data: DataSource,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum DashboardView {
    Loading,
    RedirectToSignIn { location: &'static str },
    AccessDenied { email: Option<String>, offer_sign_out: bool },
    Ready(Box<DashboardReport>),
}

impl DashboardView {
    fn from_gate(gate: DashboardGate) -> Option<Self> {
        match gate {
            DashboardGate::Loading => Some(DashboardView::Loading),
            DashboardGate::RedirectToSignIn { location } => Some(DashboardView::RedirectToSignIn { location }),
            DashboardGate::AccessDenied { email, offer_sign_out } => Some(DashboardView::AccessDenied { email, offer_sign_out }),
            DashboardGate::Render => None,
        }
    }
}

pub struct Dashboard {
    authority: SessionAuthority,
    store: Arc<dyn RecordStore>,
    options: AggregationOptions,
    last: Arc<Mutex<Option<DerivedMetrics>>>,
    _session_watch: Subscription,
}

impl Dashboard {
    pub fn new(authority: SessionAuthority, store: Arc<dyn RecordStore>, options: AggregationOptions) -> Self {
        let last: Arc<Mutex<Option<DerivedMetrics>>> = Arc::new(Mutex::new(None));
        // metrics never outlive the admin session that fetched them
        let watch_last = last.clone();
        let session_watch = authority.subscribe(move |snap| {
            if snap.state.is_settled() && snap.state != AuthState::AuthenticatedAdmin {
                watch_last.lock().take();
            }
        });
        Self { authority, store, options, last, _session_watch: session_watch }
    }

    pub fn options(&self) -> &AggregationOptions { &self.options }

    pub fn has_snapshot(&self) -> bool { self.last.lock().is_some() }

    /// Load the dashboard for today under the configured day boundary.
    pub async fn load(&self) -> DashboardView {
        self.load_at(self.options.day_boundary.today()).await
    }

    /// Re-resolves the session first, so an expired provider session is gated like a sign-out.
    pub async fn load_at(&self, reference_date: NaiveDate) -> DashboardView {
        let snapshot = self.authority.recheck().await;
        if let Some(view) = DashboardView::from_gate(dashboard_gate(&snapshot)) {
            return view;
        }

        let fetched = self.store.fetch_contact_records().await;

        // the session may have changed while the fetch was in flight
        if let Some(view) = DashboardView::from_gate(dashboard_gate(&self.authority.current())) {
            debug!(target: "dashboard", "session changed during fetch; discarding snapshot");
            return view;
        }

        let (metrics, data) = match fetched {
            Ok(records) => {
                let metrics = compute_metrics_with(&records, reference_date, &self.options);
                *self.last.lock() = Some(metrics.clone());
                (metrics, DataSource::Fresh)
            }
            Err(e) => {
                warn!(target: "dashboard", error = %e, "fetching contact records failed");
                let previous = self.last.lock().clone();
                match previous {
                    Some(metrics) => (metrics, DataSource::Stale { error: e.to_string() }),
                    None => (DerivedMetrics::empty(reference_date, &self.options), DataSource::Unavailable { error: e.to_string() }),
                }
            }
        };
        let formatted = format_metrics(&metrics, self.options.locale);
        DashboardView::Ready(Box::new(DashboardReport { metrics, formatted, data }))
    }
}
