//!
//! contactdesk HTTP console
//! ------------------------
//! Axum routes over the session authority and the dashboard controller.
//!
//! Responsibilities:
//! - One console (session authority + dashboard) per browser session cookie.
//! - Sign-in, sign-up and sign-out against the local identity provider.
//! - Session state with the landing-page decision for the routing layer.
//! - The admin-gated dashboard: formatted metrics over the current records snapshot.
//! - Seeding the configured admin account at startup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{extract::State, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::ConsoleConfig;
use crate::dashboard::{Dashboard, DashboardView};
use crate::error::{AppError, AuthError};
use crate::identity::guard::{landing_gate, sign_in_gate, Notice};
use crate::identity::{
    AuthSnapshot, AuthState, AccountStore, LocalIdentityProvider, Role, RoleDirectory, SessionAuthority, SessionManager,
};
use crate::metrics::AggregationOptions;
use crate::store::{JsonFileRecordStore, MemoryRecordStore, RecordStore};

pub const SESSION_COOKIE: &str = "contactdesk_session";
/// Upper bound on how often dead consoles and expired sessions are swept.
pub const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Per-cookie console: the session authority and the dashboard bound to it.
pub struct Console {
    pub authority: SessionAuthority,
    pub dashboard: Dashboard,
}

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConsoleConfig>,
    pub accounts: Arc<AccountStore>,
    pub sessions: Arc<SessionManager>,
    pub roles: Arc<RoleDirectory>,
    pub store: Arc<dyn RecordStore>,
    /// Session cookie -> console
    pub consoles: Arc<RwLock<HashMap<String, Arc<Console>>>>,
}

impl AppState {
    pub fn new(config: ConsoleConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            accounts: Arc::new(AccountStore::new(config.require_confirmation)),
            sessions: Arc::new(SessionManager::with_ttl(config.session_ttl)),
            roles: Arc::new(RoleDirectory::new()),
            store,
            consoles: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    /// Create the configured admin account (confirmed, with the admin role) if missing.
    pub fn ensure_default_admin(&self) -> anyhow::Result<()> {
        let admin = self
            .accounts
            .ensure_account(&self.config.admin_email, &self.config.admin_password)
            .with_context(|| format!("While seeding admin account {}", self.config.admin_email))?;
        self.roles.grant(&admin.id, Role::User);
        self.roles.grant(&admin.id, Role::Admin);
        if self.config.admin_password == crate::config::DEFAULT_ADMIN_PASSWORD {
            warn!(target: "startup", email = %admin.email, "admin account uses the default password");
        }
        Ok(())
    }

    fn aggregation_options(&self) -> AggregationOptions {
        AggregationOptions { day_boundary: self.config.day_boundary, locale: self.config.locale }
    }

    /// A fresh console with its own provider client, resolved to its initial state.
    pub async fn open_console(&self) -> Arc<Console> {
        let provider = Arc::new(LocalIdentityProvider::new(self.accounts.clone(), self.sessions.clone()));
        let authority = SessionAuthority::new(provider, self.roles.clone());
        authority.resolve().await;
        let dashboard = Dashboard::new(authority.clone(), self.store.clone(), self.aggregation_options());
        Arc::new(Console { authority, dashboard })
    }

    async fn console_for(&self, headers: &HeaderMap) -> Option<(String, Arc<Console>)> {
        let sid = parse_cookie(headers, SESSION_COOKIE)?;
        let map = self.consoles.read().await;
        map.get(&sid).cloned().map(|c| (sid, c))
    }

    /// Forget a console and stop its authority.
    pub async fn evict(&self, sid: &str) -> bool {
        let removed = self.consoles.write().await.remove(sid);
        match removed {
            Some(console) => {
                console.authority.teardown();
                true
            }
            None => false,
        }
    }

    /// Drop expired provider sessions, then evict every console that no longer resolves to a
    /// signed-in user. Returns the number of consoles evicted.
    pub async fn sweep(&self) -> usize {
        let purged = self.sessions.purge_expired();
        let consoles: Vec<(String, Arc<Console>)> =
            self.consoles.read().await.iter().map(|(sid, c)| (sid.clone(), c.clone())).collect();
        let mut evicted = 0;
        for (sid, console) in consoles {
            if !console.authority.recheck().await.state.is_authenticated() && self.evict(&sid).await {
                evicted += 1;
            }
        }
        if purged > 0 || evicted > 0 {
            debug!(target: "session", purged, evicted, "swept expired sessions");
        }
        evicted
    }

    fn sweep_interval(&self) -> Duration {
        self.config.session_ttl.clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL)
    }
}

fn spawn_sweeper(state: AppState) -> tokio::task::JoinHandle<()> {
    let period = state.sweep_interval();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tick.tick().await;
            state.sweep().await;
        }
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "contactdesk ok" }))
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/auth/signout", post(sign_out))
        .route("/api/auth/state", get(auth_state))
        .route("/api/dashboard", get(dashboard))
        .with_state(state)
}

fn record_store_for(config: &ConsoleConfig) -> Arc<dyn RecordStore> {
    match &config.records_path {
        Some(path) => {
            if !path.exists() {
                warn!(target: "startup", path = %path.display(), "records file does not exist yet; dashboard will report fetch failures");
            }
            Arc::new(JsonFileRecordStore::new(path))
        }
        None => {
            warn!(target: "startup", "no CONTACTDESK_RECORDS configured; serving an empty record store");
            Arc::new(MemoryRecordStore::default())
        }
    }
}

/// Start the console HTTP server with the given configuration.
pub async fn run_with_config(config: ConsoleConfig) -> anyhow::Result<()> {
    info!(
        target: "startup",
        "contactdesk starting: http_port={}, records={:?}, locale={}, day_boundary={}, session_ttl_secs={}, require_confirmation={}",
        config.http_port,
        config.records_path,
        config.locale.tag(),
        config.day_boundary,
        config.session_ttl.as_secs(),
        config.require_confirmation
    );
    let store = record_store_for(&config);
    let port = config.http_port;
    let state = AppState::new(config, store);
    state.ensure_default_admin()?;
    let _sweeper = spawn_sweeper(state.clone());

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("While binding {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point using configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ConsoleConfig::from_env()).await
}

#[derive(Debug, Deserialize)]
pub struct CredentialsPayload {
    pub email: String,
    pub password: String,
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some((k, v)) = p.split_once('=') {
            if k == name { return Some(v.to_string()); }
        }
    }
    None
}

fn set_session_cookie(sid: &str) -> Option<HeaderValue> {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).ok()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("contactdesk_session=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/")
}

fn status_of(err: &AppError) -> StatusCode {
    StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn sign_in_failure(err: AuthError, session: AuthSnapshot) -> (StatusCode, HeaderMap, Json<Value>) {
    let app: AppError = err.into();
    let body = json!({
        "status": "error",
        "error": app,
        "session": session,
        "notice": Notice::sign_in_failed(app.message()),
    });
    (status_of(&app), HeaderMap::new(), Json(body))
}

async fn sign_in(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<CredentialsPayload>) -> impl IntoResponse {
    let existing = state.console_for(&headers).await;
    let is_new = existing.is_none();
    let (sid, console) = match existing {
        Some((sid, console)) => {
            // an expired session behind the cookie must not block signing in again
            if console.authority.state().is_authenticated() {
                console.authority.recheck().await;
            }
            (sid, console)
        }
        None => match crate::identity::gen_id() {
            Ok(sid) => (sid, state.open_console().await),
            Err(e) => {
                error!(target: "session", error = %e, "cannot mint a session id");
                return sign_in_failure(e, AuthSnapshot::anonymous());
            }
        },
    };

    match console.authority.sign_in(&payload.email, &payload.password).await {
        Ok(snapshot) => {
            let mut h = HeaderMap::new();
            if is_new {
                state.consoles.write().await.insert(sid.clone(), console.clone());
                if let Some(v) = set_session_cookie(&sid) { h.insert("Set-Cookie", v); }
            }
            let body = json!({
                "status": "ok",
                "session": snapshot,
                "landing": landing_gate(&snapshot),
                "notice": Notice::signed_in(),
            });
            (StatusCode::OK, h, Json(body))
        }
        Err(e) => {
            // a fresh console is discarded; an existing one stays for the corrected attempt
            if is_new { console.authority.teardown(); }
            sign_in_failure(e, console.authority.current())
        }
    }
}

async fn sign_up(State(state): State<AppState>, headers: HeaderMap, Json(payload): Json<CredentialsPayload>) -> impl IntoResponse {
    let (console, transient) = match state.console_for(&headers).await {
        Some((_, console)) => (console, false),
        None => (state.open_console().await, true),
    };
    let result = console.authority.sign_up(&payload.email, &payload.password).await;
    if transient { console.authority.teardown(); }
    match result {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok", "notice": Notice::signed_up()}))),
        Err(e) => {
            let app: AppError = e.into();
            let notice = Notice::sign_up_failed(app.message());
            (status_of(&app), Json(json!({"status": "error", "error": app, "notice": notice})))
        }
    }
}

async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    let Some((sid, console)) = state.console_for(&headers).await else {
        return (StatusCode::OK, h, Json(json!({"status": "ok"})));
    };
    if let Err(e) = console.authority.sign_out().await {
        let app: AppError = e.into();
        return (status_of(&app), HeaderMap::new(), Json(json!({"status": "error", "error": app})));
    }
    state.evict(&sid).await;
    (StatusCode::OK, h, Json(json!({"status": "ok"})))
}

async fn auth_state(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let mut h = HeaderMap::new();
    let snapshot = match state.console_for(&headers).await {
        // re-resolve on every load so an expired provider session is noticed
        Some((sid, console)) => {
            let snapshot = console.authority.recheck().await;
            if snapshot.state == AuthState::Anonymous {
                state.evict(&sid).await;
                h.insert("Set-Cookie", clear_session_cookie());
            }
            snapshot
        }
        None => AuthSnapshot::anonymous(),
    };
    let body = json!({
        "status": "ok",
        "session": snapshot,
        "level": snapshot.authorization_level(),
        "landing": landing_gate(&snapshot),
        "sign_in": sign_in_gate(&snapshot),
    });
    (StatusCode::OK, h, Json(body))
}

async fn dashboard(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let mut h = HeaderMap::new();
    let view = match state.console_for(&headers).await {
        Some((sid, console)) => {
            let view = console.dashboard.load().await;
            if matches!(view, DashboardView::RedirectToSignIn { .. }) {
                state.evict(&sid).await;
                h.insert("Set-Cookie", clear_session_cookie());
            }
            view
        }
        None => DashboardView::RedirectToSignIn { location: crate::identity::guard::SIGN_IN_PATH },
    };
    let status = match &view {
        DashboardView::Loading => StatusCode::ACCEPTED,
        DashboardView::RedirectToSignIn { .. } => StatusCode::UNAUTHORIZED,
        DashboardView::AccessDenied { .. } => StatusCode::FORBIDDEN,
        DashboardView::Ready(_) => StatusCode::OK,
    };
    match serde_json::to_value(&view) {
        Ok(body) => (status, h, Json(body)),
        Err(e) => {
            error!("dashboard serialization failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Json(json!({"status": "error", "error": e.to_string()})))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use axum::response::Response;
    use crate::metrics::DayBoundary;

    fn state_with_ttl(session_ttl: Duration) -> AppState {
        let cfg = ConsoleConfig {
            admin_email: "admin@example.com".into(),
            admin_password: "admin-secret".into(),
            session_ttl,
            ..Default::default()
        };
        let state = AppState::new(cfg, Arc::new(MemoryRecordStore::default()));
        state.ensure_default_admin().unwrap();
        state
    }

    fn test_state() -> AppState { state_with_ttl(Duration::from_secs(3600)) }

    fn clears_cookie(resp: &Response) -> bool {
        resp.headers()
            .get("Set-Cookie")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("contactdesk_session=deleted"))
            .unwrap_or(false)
    }

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn cookie_headers(resp: &Response) -> HeaderMap {
        let set = resp.headers().get("Set-Cookie").unwrap().to_str().unwrap();
        let pair = set.split(';').next().unwrap().to_string();
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_str(&pair).unwrap());
        h
    }

    fn creds(email: &str, password: &str) -> Json<CredentialsPayload> {
        Json(CredentialsPayload { email: email.into(), password: password.into() })
    }

    #[test]
    fn parses_cookie_pairs() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("a=1; contactdesk_session=abc=; b=2"));
        assert_eq!(parse_cookie(&h, SESSION_COOKIE), Some("abc=".into()));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[tokio::test]
    async fn admin_sign_in_then_dashboard() {
        let state = test_state();
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = cookie_headers(&resp);
        let body = body_json(resp).await;
        assert_eq!(body["session"]["state"], "authenticated_admin");
        assert_eq!(body["landing"]["gate"], "redirect_to_dashboard");

        let resp = dashboard(State(state.clone()), headers.clone()).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["view"], "ready");
        assert_eq!(body["metrics"]["total_count"], 0);
        assert_eq!(body["formatted"]["most_frequent_reason"], "Sin datos");
        // a live session survives the sweep
        assert_eq!(state.sweep().await, 0);
        assert_eq!(state.consoles.read().await.len(), 1);

        let resp = sign_out(State(state.clone()), headers.clone()).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = dashboard(State(state), headers).await.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn wrong_password_sets_no_cookie() {
        let state = test_state();
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "nope")).await.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get("Set-Cookie").is_none());
        let body = body_json(resp).await;
        assert_eq!(body["session"]["state"], "anonymous");
        assert_eq!(body["notice"]["title"], "Error de autenticación");
        assert!(state.consoles.read().await.is_empty());
    }

    #[tokio::test]
    async fn non_admin_gets_access_denied() {
        let state = test_state();
        let resp = sign_up(State(state.clone()), HeaderMap::new(), creds("agent@example.com", "agent-secret")).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("agent@example.com", "agent-secret")).await.into_response();
        let headers = cookie_headers(&resp);
        let resp = dashboard(State(state.clone()), headers.clone()).await.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["view"], "access_denied");
        assert_eq!(body["offer_sign_out"], true);

        let resp = auth_state(State(state), headers).await.into_response();
        let body = body_json(resp).await;
        assert_eq!(body["level"], "authenticated");
        assert_eq!(body["landing"]["gate"], "not_admin");
    }

    #[tokio::test]
    async fn anonymous_state_without_cookie() {
        let state = test_state();
        let resp = auth_state(State(state), HeaderMap::new()).await.into_response();
        let body = body_json(resp).await;
        assert_eq!(body["session"]["state"], "anonymous");
        assert_eq!(body["sign_in"]["gate"], "show_form");
    }

    #[tokio::test]
    async fn expired_session_loses_the_dashboard() {
        let state = state_with_ttl(Duration::from_millis(1));
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let headers = cookie_headers(&resp);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let resp = dashboard(State(state.clone()), headers).await.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(clears_cookie(&resp));
        let body = body_json(resp).await;
        assert_eq!(body["view"], "redirect_to_sign_in");
        assert!(state.consoles.read().await.is_empty());
    }

    #[tokio::test]
    async fn expired_session_reads_as_anonymous_state() {
        let state = state_with_ttl(Duration::from_millis(1));
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
        let headers = cookie_headers(&resp);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let resp = auth_state(State(state.clone()), headers).await.into_response();
        assert!(clears_cookie(&resp));
        let body = body_json(resp).await;
        assert_eq!(body["session"]["state"], "anonymous");
        assert_eq!(body["sign_in"]["gate"], "show_form");
        assert!(state.consoles.read().await.is_empty());
    }

    #[tokio::test]
    async fn sweep_evicts_consoles_of_expired_sessions() {
        let state = state_with_ttl(Duration::from_millis(1));
        for _ in 0..5 {
            let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
            assert_eq!(resp.status(), StatusCode::OK);
        }
        assert_eq!(state.consoles.read().await.len(), 5);
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(state.sweep().await, 5);
        assert!(state.consoles.read().await.is_empty());
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn existing_cookie_can_sign_in_again_after_a_failed_attempt() {
        let state = state_with_ttl(Duration::from_millis(1));
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
        let headers = cookie_headers(&resp);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // the cookie's session has expired: the console rechecks to anonymous, then rejects the password
        let resp = sign_in(State(state.clone()), headers.clone(), creds("admin@example.com", "wrong")).await.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().get("Set-Cookie").is_none());
        let body = body_json(resp).await;
        assert_eq!(body["session"]["state"], "anonymous");
        assert_eq!(state.consoles.read().await.len(), 1);

        let resp = sign_in(State(state.clone()), headers, creds("admin@example.com", "admin-secret")).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get("Set-Cookie").is_none());
        let body = body_json(resp).await;
        assert_eq!(body["session"]["state"], "authenticated_admin");
        assert_eq!(state.consoles.read().await.len(), 1);
    }

    #[tokio::test]
    async fn signed_in_cookie_cannot_sign_in_twice() {
        let state = test_state();
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
        let headers = cookie_headers(&resp);
        let resp = sign_in(State(state), headers, creds("admin@example.com", "admin-secret")).await.into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = body_json(resp).await;
        assert_eq!(body["error"]["code"], "already_authenticated");
        assert_eq!(body["session"]["state"], "authenticated_admin");
    }

    #[tokio::test]
    async fn unparseable_day_boundary_keeps_the_previous_one() {
        let mut cfg = ConsoleConfig {
            admin_email: "admin@example.com".into(),
            admin_password: "admin-secret".into(),
            ..Default::default()
        };
        cfg.set_day_boundary("+a€");
        assert_eq!(cfg.day_boundary, DayBoundary::Utc);
        cfg.set_day_boundary("+05:30");
        for garbage in ["+€", "+ab:cd", "--1", "+"] {
            cfg.set_day_boundary(garbage);
        }
        assert_eq!(cfg.day_boundary.to_string(), "+05:30");

        let state = AppState::new(cfg, Arc::new(MemoryRecordStore::default()));
        state.ensure_default_admin().unwrap();
        let resp = sign_in(State(state.clone()), HeaderMap::new(), creds("admin@example.com", "admin-secret")).await.into_response();
        let resp = dashboard(State(state), cookie_headers(&resp)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
