use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationLevel {
    Anonymous,
    Authenticated,
    Admin,
}

/// Account identity as resolved from the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    Resolving,
    Anonymous,
    AuthenticatedNonAdmin,
    AuthenticatedAdmin,
}

impl AuthState {
    pub fn is_settled(&self) -> bool { !matches!(self, AuthState::Resolving) }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::AuthenticatedNonAdmin | AuthState::AuthenticatedAdmin)
    }

    pub fn authorization_level(&self) -> AuthorizationLevel {
        match self {
            AuthState::AuthenticatedAdmin => AuthorizationLevel::Admin,
            AuthState::AuthenticatedNonAdmin => AuthorizationLevel::Authenticated,
            AuthState::Resolving | AuthState::Anonymous => AuthorizationLevel::Anonymous,
        }
    }
}

/// What subscribers observe: the public state plus the identity it refers to.
///
/// While resolving after a successful sign-in the identity may already be known but the
/// state stays `Resolving` until the admin lookup has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub state: AuthState,
    pub identity: Option<Identity>,
}

impl AuthSnapshot {
    pub fn resolving(identity: Option<Identity>) -> Self { Self { state: AuthState::Resolving, identity } }
    pub fn anonymous() -> Self { Self { state: AuthState::Anonymous, identity: None } }

    pub fn authenticated(identity: Identity, is_admin: bool) -> Self {
        let state = if is_admin { AuthState::AuthenticatedAdmin } else { AuthState::AuthenticatedNonAdmin };
        Self { state, identity: Some(identity) }
    }

    pub fn authorization_level(&self) -> AuthorizationLevel { self.state.authorization_level() }

    pub fn email(&self) -> Option<&str> { self.identity.as_ref().map(|i| i.email.as_str()) }
}
