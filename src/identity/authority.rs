//! Session authority: the one owner of "who is using the console and at what privilege".
//!
//! State lives in a single cell written only by the authority. Transitions are serialized by
//! an async transition lock and stamped with an epoch; a write whose epoch is no longer
//! current, or that arrives after `teardown`, is discarded without notifying anyone.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::authorizer::AdminDirectory;
use super::principal::{AuthSnapshot, AuthState, Identity};
use super::provider::IdentityProvider;
use crate::error::AuthError;

/// Which half of resolution is in flight while the public state reads `Resolving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveStage {
    Identity,
    Authorization,
}

type Observer = Arc<dyn Fn(&AuthSnapshot) + Send + Sync>;

struct StateCell {
    snapshot: AuthSnapshot,
    stage: Option<ResolveStage>,
}

struct Inner {
    provider: Arc<dyn IdentityProvider>,
    admins: Arc<dyn AdminDirectory>,
    cell: RwLock<StateCell>,
    epoch: AtomicU64,
    closed: AtomicBool,
    observers: Mutex<Vec<(u64, Observer)>>,
    next_observer: AtomicU64,
    transition: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct SessionAuthority {
    inner: Arc<Inner>,
}

/// Handle returned by `subscribe`; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.observers.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

// Settles to anonymous if a resolution is abandoned before it finished.
struct SettleOnDrop<'a> {
    authority: &'a SessionAuthority,
    epoch: u64,
    armed: bool,
}

impl SettleOnDrop<'_> {
    fn disarm(mut self) { self.armed = false; }
}

impl Drop for SettleOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed && self.authority.commit(self.epoch, AuthSnapshot::anonymous(), None) {
            warn!(target: "session", epoch = self.epoch, "resolution abandoned; settled anonymous");
        }
    }
}

impl SessionAuthority {
    /// A fresh authority starts in `Resolving`; call `resolve` to settle it.
    pub fn new(provider: Arc<dyn IdentityProvider>, admins: Arc<dyn AdminDirectory>) -> Self {
        let inner = Inner {
            provider,
            admins,
            cell: RwLock::new(StateCell { snapshot: AuthSnapshot::resolving(None), stage: Some(ResolveStage::Identity) }),
            epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            observers: Mutex::new(Vec::new()),
            next_observer: AtomicU64::new(1),
            transition: tokio::sync::Mutex::new(()),
        };
        Self { inner: Arc::new(inner) }
    }

    pub fn current(&self) -> AuthSnapshot { self.inner.cell.read().snapshot.clone() }

    pub fn state(&self) -> AuthState { self.inner.cell.read().snapshot.state }

    pub fn is_resolving(&self) -> bool { self.state() == AuthState::Resolving }

    pub fn resolve_stage(&self) -> Option<ResolveStage> { self.inner.cell.read().stage }

    pub fn is_torn_down(&self) -> bool { self.inner.closed.load(Ordering::SeqCst) }

    /// Register an observer called synchronously on every transition.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AuthSnapshot) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        if !self.is_torn_down() {
            self.inner.observers.lock().push((id, Arc::new(observer)));
        }
        Subscription { id, inner: Arc::downgrade(&self.inner) }
    }

    /// Consumer teardown: drop all observers and ignore every later state write.
    pub fn teardown(&self) {
        {
            let _cell = self.inner.cell.write();
            self.inner.closed.store(true, Ordering::SeqCst);
            self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.observers.lock().clear();
        debug!(target: "session", "authority torn down");
    }

    fn begin(&self) -> u64 { self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1 }

    fn commit(&self, epoch: u64, snapshot: AuthSnapshot, stage: Option<ResolveStage>) -> bool {
        {
            let mut cell = self.inner.cell.write();
            if self.inner.closed.load(Ordering::SeqCst) || self.inner.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            cell.snapshot = snapshot.clone();
            cell.stage = stage;
        }
        self.notify(&snapshot);
        true
    }

    fn notify(&self, snapshot: &AuthSnapshot) {
        let observers: Vec<Observer> = self.inner.observers.lock().iter().map(|(_, o)| o.clone()).collect();
        for o in observers {
            o(snapshot);
        }
    }

    fn ensure_open(&self) -> Result<(), AuthError> {
        if self.is_torn_down() { Err(AuthError::Closed) } else { Ok(()) }
    }

    /// Settle the initial `Resolving` state. Already-settled authorities return their state.
    pub async fn resolve(&self) -> AuthSnapshot {
        let _t = self.inner.transition.lock().await;
        if self.state().is_settled() || self.is_torn_down() {
            return self.current();
        }
        self.run_resolution().await
    }

    /// Explicit re-check against the provider, e.g. to notice an expired session.
    pub async fn recheck(&self) -> AuthSnapshot {
        let _t = self.inner.transition.lock().await;
        if self.is_torn_down() {
            return self.current();
        }
        self.run_resolution().await
    }

    // Caller holds the transition lock.
    async fn run_resolution(&self) -> AuthSnapshot {
        let epoch = self.begin();
        self.commit(epoch, AuthSnapshot::resolving(None), Some(ResolveStage::Identity));
        let guard = SettleOnDrop { authority: self, epoch, armed: true };

        let identity = match self.inner.provider.resolve_session().await {
            Ok(Some(identity)) => identity,
            Ok(None) => {
                debug!(target: "session", "no provider session");
                return self.settle(guard, AuthSnapshot::anonymous());
            }
            Err(e) => {
                warn!(target: "session", error = %e, "session resolution failed; treating as anonymous");
                return self.settle(guard, AuthSnapshot::anonymous());
            }
        };
        let snapshot = self.authorize(epoch, identity).await;
        self.settle(guard, snapshot)
    }

    fn settle(&self, guard: SettleOnDrop<'_>, snapshot: AuthSnapshot) -> AuthSnapshot {
        let epoch = guard.epoch;
        guard.disarm();
        self.commit(epoch, snapshot.clone(), None);
        snapshot
    }

    // Second stage: the admin bit comes from a separate lookup keyed by identity id.
    // A failed lookup settles non-admin.
    async fn authorize(&self, epoch: u64, identity: Identity) -> AuthSnapshot {
        self.commit(epoch, AuthSnapshot::resolving(Some(identity.clone())), Some(ResolveStage::Authorization));
        let is_admin = match self.inner.admins.is_admin(&identity.id).await {
            Ok(b) => b,
            Err(e) => {
                warn!(target: "session", user = %identity.email, error = %e, "admin lookup failed; continuing as non-admin");
                false
            }
        };
        AuthSnapshot::authenticated(identity, is_admin)
    }

    /// Sign in from the anonymous state. Failure leaves the state anonymous.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSnapshot, AuthError> {
        let _t = self.inner.transition.lock().await;
        self.ensure_open()?;
        match self.state() {
            AuthState::Resolving => return Err(AuthError::NotSettled),
            AuthState::AuthenticatedNonAdmin | AuthState::AuthenticatedAdmin => return Err(AuthError::AlreadyAuthenticated),
            AuthState::Anonymous => {}
        }

        let identity = match self.inner.provider.sign_in(email, password).await {
            Ok(identity) => identity,
            Err(e) => {
                info!(target: "session", email = %email, code = e.code_str(), "sign-in rejected");
                return Err(e);
            }
        };
        let epoch = self.begin();
        let guard = SettleOnDrop { authority: self, epoch, armed: true };
        let snapshot = self.authorize(epoch, identity).await;
        let snapshot = self.settle(guard, snapshot);
        info!(target: "session", email = %email, state = ?snapshot.state, "signed in");
        Ok(snapshot)
    }

    /// Register an account upstream. Never changes the session state.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let _t = self.inner.transition.lock().await;
        self.ensure_open()?;
        if self.is_resolving() {
            return Err(AuthError::NotSettled);
        }
        self.inner.provider.sign_up(email, password).await?;
        info!(target: "session", email = %email, "signed up");
        Ok(())
    }

    /// Sign out to the anonymous state; a no-op when already anonymous.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let _t = self.inner.transition.lock().await;
        self.ensure_open()?;
        match self.state() {
            AuthState::Resolving => Err(AuthError::NotSettled),
            AuthState::Anonymous => Ok(()),
            AuthState::AuthenticatedNonAdmin | AuthState::AuthenticatedAdmin => {
                let email = self.current().email().map(str::to_string);
                self.inner.provider.sign_out().await;
                let epoch = self.begin();
                self.commit(epoch, AuthSnapshot::anonymous(), None);
                info!(target: "session", email = ?email, "signed out");
                Ok(())
            }
        }
    }
}
