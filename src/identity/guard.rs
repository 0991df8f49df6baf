//! What each console surface should do for a given session snapshot.

use serde::Serialize;

use super::principal::{AuthSnapshot, AuthState};

pub const SIGN_IN_PATH: &str = "/auth";
pub const LANDING_PATH: &str = "/";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Dashboard gate. Only `Render` may show admin content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum DashboardGate {
    /// Still resolving: show a loading indication and do not redirect.
    Loading,
    RedirectToSignIn { location: &'static str },
    /// Signed in without admin rights: explain and offer sign-out, never redirect.
    AccessDenied { email: Option<String>, offer_sign_out: bool },
    Render,
}

pub fn dashboard_gate(snapshot: &AuthSnapshot) -> DashboardGate {
    match snapshot.state {
        AuthState::Resolving => DashboardGate::Loading,
        AuthState::Anonymous => DashboardGate::RedirectToSignIn { location: SIGN_IN_PATH },
        AuthState::AuthenticatedNonAdmin => DashboardGate::AccessDenied {
            email: snapshot.email().map(str::to_string),
            offer_sign_out: true,
        },
        AuthState::AuthenticatedAdmin => DashboardGate::Render,
    }
}

/// Landing page gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum LandingGate {
    Loading,
    PromptSignIn { location: &'static str },
    NotAdmin { email: String },
    RedirectToDashboard { location: &'static str },
}

pub fn landing_gate(snapshot: &AuthSnapshot) -> LandingGate {
    match snapshot.state {
        AuthState::Resolving => LandingGate::Loading,
        AuthState::Anonymous => LandingGate::PromptSignIn { location: SIGN_IN_PATH },
        AuthState::AuthenticatedNonAdmin => LandingGate::NotAdmin {
            email: snapshot.email().unwrap_or_default().to_string(),
        },
        AuthState::AuthenticatedAdmin => LandingGate::RedirectToDashboard { location: DASHBOARD_PATH },
    }
}

/// Sign-in page gate: signed-in users are sent back to the landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gate", rename_all = "snake_case")]
pub enum SignInGate {
    Loading,
    ShowForm,
    RedirectToLanding { location: &'static str },
}

pub fn sign_in_gate(snapshot: &AuthSnapshot) -> SignInGate {
    match snapshot.state {
        AuthState::Resolving => SignInGate::Loading,
        AuthState::Anonymous => SignInGate::ShowForm,
        AuthState::AuthenticatedNonAdmin | AuthState::AuthenticatedAdmin => SignInGate::RedirectToLanding { location: LANDING_PATH },
    }
}

/// Toast-style feedback for the sign-in form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub destructive: bool,
}

impl Notice {
    pub fn signed_in() -> Self {
        Notice { title: "Inicio de sesión exitoso".into(), description: "Bienvenido al panel de administración".into(), destructive: false }
    }

    pub fn sign_in_failed(message: &str) -> Self {
        Notice { title: "Error de autenticación".into(), description: message.to_string(), destructive: true }
    }

    pub fn signed_up() -> Self {
        Notice { title: "Registro exitoso".into(), description: "Revisa tu email para confirmar tu cuenta".into(), destructive: false }
    }

    pub fn sign_up_failed(message: &str) -> Self {
        Notice { title: "Error de registro".into(), description: message.to_string(), destructive: true }
    }
}
