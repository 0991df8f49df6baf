use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::tprintln;

/// Authorization lookup, keyed by identity id and queried separately from identity resolution.
/// An identity with no role record is simply not an admin.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn is_admin(&self, identity_id: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

/// Role memberships by identity id.
#[derive(Default)]
pub struct RoleDirectory {
    memberships: RwLock<HashMap<String, HashSet<Role>>>,
}

impl RoleDirectory {
    pub fn new() -> Self { Self::default() }

    pub fn grant(&self, identity_id: &str, role: Role) {
        self.memberships.write().entry(identity_id.to_string()).or_default().insert(role);
        tprintln!("roles.grant id={} role={:?}", identity_id, role);
    }
}

#[async_trait]
impl AdminDirectory for RoleDirectory {
    async fn is_admin(&self, identity_id: &str) -> Result<bool, AuthError> {
        Ok(self.memberships.read().get(identity_id).map(|s| s.contains(&Role::Admin)).unwrap_or(false))
    }
}
