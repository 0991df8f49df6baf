use std::collections::HashMap;
use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};
use tracing::{debug, info};

use super::principal::Identity;
use super::session::{SessionManager, SessionToken};
use crate::error::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Boundary to the identity provider. The session authority is its only caller.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity of the session this client currently holds, if it is still valid.
    async fn resolve_session(&self) -> Result<Option<Identity>, AuthError>;
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError>;
    /// Registers an account. Access may still require out-of-band confirmation.
    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError>;
    async fn sign_out(&self);
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    email: String,
    password_hash: String,
    confirmed: bool,
}

/// Registered accounts with Argon2 password hashes, keyed by lower-cased email.
pub struct AccountStore {
    accounts: RwLock<HashMap<String, Account>>,
    require_confirmation: bool,
}

fn hash_password(password: &str) -> Result<String, AuthError> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?
        .to_string();
    Ok(phc)
}

fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

fn validate_sign_up(email: &str, password: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        None => false,
    };
    if !well_formed {
        return Err(AuthError::InvalidInput(format!("Unable to validate email address: invalid format ({})", email)));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(format!("Password should be at least {} characters", MIN_PASSWORD_LEN)));
    }
    Ok(())
}

impl AccountStore {
    pub fn new(require_confirmation: bool) -> Self {
        Self { accounts: RwLock::new(HashMap::new()), require_confirmation }
    }

    /// Create an account and return its identity.
    pub fn register(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        validate_sign_up(email, password)?;
        let key = normalize_email(email);
        if self.accounts.read().contains_key(&key) {
            return Err(AuthError::AlreadyRegistered);
        }
        let account = Account {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password_hash: hash_password(password)?,
            confirmed: !self.require_confirmation,
        };
        let identity = Identity { id: account.id.clone(), email: account.email.clone() };
        let mut map = self.accounts.write();
        // re-check under the write lock; another registration may have raced us
        if map.contains_key(&key) {
            return Err(AuthError::AlreadyRegistered);
        }
        map.insert(key, account);
        info!(target: "identity", email = %identity.email, confirmed = !self.require_confirmation, "account registered");
        Ok(identity)
    }

    /// Create an already-confirmed account unless one exists for this email.
    pub fn ensure_account(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        if let Some(existing) = self.find(email) {
            return Ok(existing);
        }
        let identity = self.register(email, password)?;
        self.confirm(email);
        Ok(identity)
    }

    pub fn confirm(&self, email: &str) -> bool {
        match self.accounts.write().get_mut(&normalize_email(email)) {
            Some(acc) => { acc.confirmed = true; true }
            None => false,
        }
    }

    pub fn find(&self, email: &str) -> Option<Identity> {
        self.accounts
            .read()
            .get(&normalize_email(email))
            .map(|a| Identity { id: a.id.clone(), email: a.email.clone() })
    }

    pub fn authenticate(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let acc = self.accounts.read().get(&normalize_email(email)).cloned();
        let Some(acc) = acc else { return Err(AuthError::InvalidCredentials); };
        if !verify_password(&acc.password_hash, password) {
            return Err(AuthError::InvalidCredentials);
        }
        if !acc.confirmed {
            return Err(AuthError::Unconfirmed);
        }
        Ok(Identity { id: acc.id, email: acc.email })
    }
}

/// In-process identity provider client. Each client holds at most one session token,
/// the way a browser holds one persisted provider session.
pub struct LocalIdentityProvider {
    accounts: Arc<AccountStore>,
    sessions: Arc<SessionManager>,
    current: RwLock<Option<SessionToken>>,
}

impl LocalIdentityProvider {
    pub fn new(accounts: Arc<AccountStore>, sessions: Arc<SessionManager>) -> Self {
        Self { accounts, sessions, current: RwLock::new(None) }
    }

    pub fn session_token(&self) -> Option<SessionToken> { self.current.read().clone() }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn resolve_session(&self) -> Result<Option<Identity>, AuthError> {
        let Some(token) = self.session_token() else { return Ok(None); };
        match self.sessions.validate(&token) {
            Some(identity) => Ok(Some(identity)),
            None => {
                debug!(target: "identity", "stored session no longer valid");
                *self.current.write() = None;
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let identity = self.accounts.authenticate(email, password)?;
        let session = self.sessions.issue(identity.clone())?;
        let previous = self.current.write().replace(session.token);
        if let Some(old) = previous {
            self.sessions.logout(&old);
        }
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.accounts.register(email, password).map(|_| ())
    }

    async fn sign_out(&self) {
        if let Some(token) = self.current.write().take() {
            self.sessions.logout(&token);
        }
    }
}
