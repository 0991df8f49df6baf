//! Identity, sign-in and admin gating for the console.
//! Keep the public surface thin and split implementation across sub-modules.

mod principal;
mod session;
mod provider;
mod authorizer;
mod authority;
pub mod guard;

pub use principal::{AuthSnapshot, AuthState, AuthorizationLevel, Identity};
pub use session::{Session, SessionManager, SessionToken};
pub use provider::{AccountStore, IdentityProvider, LocalIdentityProvider, MIN_PASSWORD_LEN};
pub use authorizer::{AdminDirectory, Role, RoleDirectory};
pub use authority::{ResolveStage, SessionAuthority, Subscription};

pub(crate) use session::gen_id;
