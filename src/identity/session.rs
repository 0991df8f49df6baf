use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use super::principal::Identity;
use crate::error::AuthError;
use crate::tprintln;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub identity: Identity,
    pub expires_at: Instant,
}

pub(crate) fn gen_id() -> Result<String, AuthError> {
    // 256-bit random token base64url without padding
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).map_err(|e| AuthError::ProviderUnavailable(format!("random source failed: {}", e)))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Short, non-secret prefix of a token for trace output.
pub(crate) fn redact(token: &str) -> String {
    let head: String = token.chars().take(6).collect();
    format!("{}…", head)
}

/// Issues and validates provider session tokens. Shared by every provider client.
pub struct SessionManager {
    pub ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    user_index: RwLock<HashMap<String, HashSet<SessionToken>>>,
}

impl Default for SessionManager {
    fn default() -> Self { Self::with_ttl(Duration::from_secs(60 * 60)) }
}

impl SessionManager {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()), user_index: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, identity: Identity) -> Result<Session, AuthError> {
        let sess = Session {
            token: gen_id()?,
            identity: identity.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.sessions.write().insert(sess.token.clone(), sess.clone());
        self.user_index
            .write()
            .entry(identity.id.clone())
            .or_default()
            .insert(sess.token.clone());
        tprintln!("session.issue user_id={} token={} ttl_secs={}", identity.id, redact(&sess.token), self.ttl.as_secs());
        Ok(sess)
    }

    /// Identity behind a live token. Expired tokens are dropped on sight.
    pub fn validate(&self, token: &str) -> Option<Identity> {
        let now = Instant::now();
        let expired = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => return Some(s.identity.clone()),
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.logout(token);
        }
        None
    }

    pub fn logout(&self, token: &str) -> bool {
        let Some(sess) = self.sessions.write().remove(token) else { return false; };
        if let Some(set) = self.user_index.write().get_mut(&sess.identity.id) {
            set.remove(token);
        }
        true
    }

    /// Drop every expired session; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(SessionToken, String)> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.expires_at <= now)
            .map(|s| (s.token.clone(), s.identity.id.clone()))
            .collect();
        if expired.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write();
        let mut index = self.user_index.write();
        for (token, user_id) in &expired {
            sessions.remove(token);
            if let Some(set) = index.get_mut(user_id) {
                set.remove(token);
                if set.is_empty() {
                    index.remove(user_id);
                }
            }
        }
        tprintln!("session.purge count={}", expired.len());
        expired.len()
    }

    pub fn len(&self) -> usize { self.sessions.read().len() }

    pub fn is_empty(&self) -> bool { self.sessions.read().is_empty() }
}
